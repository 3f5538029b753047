//! A plugin that misbehaves on request.

use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

use charlie_core::{value_or, ConfigMap, FrameBuffer, SimResult, Simulation};
use tracing::warn;

/// How long a `hang_at` update blocks.
pub const HANG: Duration = Duration::from_secs(120);

/// Failure raised every `fail_every` steps.
#[derive(Debug)]
pub struct Divergence {
    step: i64,
    residual: ResidualTooLarge,
}

/// Cause of a [`Divergence`].
#[derive(Debug)]
pub struct ResidualTooLarge {
    value: f64,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "solver diverged at step {}", self.step)
    }
}

impl Error for Divergence {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.residual)
    }
}

impl fmt::Display for ResidualTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "residual {:.1e} above tolerance", self.value)
    }
}

impl Error for ResidualTooLarge {}

/// Exercises the host's failure handling.
///
/// Config:
/// - `fail_every`: return an error from every n-th update (0 = never, default 3)
/// - `panic_at`: panic in this update (0 = never)
/// - `exit_at`: terminate the whole module process in this update (0 = never)
/// - `hang_at`: block this update for [`HANG`] (0 = never)
/// - `fail_init`: `true` makes `init` fail
#[derive(Debug, Default)]
pub struct Faulty {
    fail_every: i64,
    panic_at: i64,
    exit_at: i64,
    hang_at: i64,
    steps: i64,
}

impl Simulation for Faulty {
    fn title(&self) -> Option<String> {
        Some("Faulty".into())
    }

    fn descr(&self) -> Option<String> {
        Some("Fails, panics or exits on demand".into())
    }

    fn config(&self) -> Option<String> {
        Some("fail_every=3\npanic_at=0\nexit_at=0\nhang_at=0\nfail_init=false\n".into())
    }

    fn init(&mut self, config: &ConfigMap) -> SimResult<()> {
        if value_or(config, "fail_init", false) {
            return Err("initialisation refused by configuration".into());
        }
        self.fail_every = value_or(config, "fail_every", 3);
        self.panic_at = value_or(config, "panic_at", 0);
        self.exit_at = value_or(config, "exit_at", 0);
        self.hang_at = value_or(config, "hang_at", 0);
        self.steps = 0;
        Ok(())
    }

    fn update(&mut self, _delta_ms: i64) -> SimResult<()> {
        self.steps += 1;
        if self.steps == self.exit_at {
            warn!(step = self.steps, "exiting the module on request");
            std::process::exit(3);
        }
        if self.steps == self.hang_at {
            warn!(step = self.steps, "hanging on request");
            thread::sleep(HANG);
        }
        if self.steps == self.panic_at {
            panic!("requested panic at step {}", self.steps);
        }
        if self.fail_every > 0 && self.steps % self.fail_every == 0 {
            return Err(Box::new(Divergence {
                step: self.steps,
                residual: ResidualTooLarge {
                    value: 1e6 * self.steps as f64,
                },
            }));
        }
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>> {
        Ok(Some(crate::canvas(width, height)?))
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        Ok(Some(format!("steps={}", self.steps)))
    }

    fn end(&mut self) -> SimResult<()> {
        Ok(())
    }
}
