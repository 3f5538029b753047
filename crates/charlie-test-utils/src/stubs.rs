//! Simulation stubs with predictable behaviour.

use std::error::Error;
use std::fmt;

use charlie_core::{ConfigMap, FrameBuffer, SimResult, Simulation};

/// Default configuration reported by [`StubSim`].
pub const STUB_CONFIG: &str = "X=1\nY=2\n";

/// Well-behaved stub. Its log entry echoes the map it was initialised
/// with as `key=value` pairs joined by `;`, followed by the step count.
#[derive(Default)]
pub struct StubSim {
    config: ConfigMap,
    steps: i64,
    last_delta: i64,
}

impl Simulation for StubSim {
    fn title(&self) -> Option<String> {
        Some("Stub".into())
    }

    fn descr(&self) -> Option<String> {
        Some("Counts steps and echoes its configuration".into())
    }

    fn config(&self) -> Option<String> {
        Some(STUB_CONFIG.into())
    }

    fn meta(&self) -> Option<String> {
        Some("stub meta".into())
    }

    fn init(&mut self, config: &ConfigMap) -> SimResult<()> {
        self.config = config.clone();
        self.steps = 0;
        self.last_delta = 0;
        Ok(())
    }

    fn update(&mut self, delta_ms: i64) -> SimResult<()> {
        self.steps += 1;
        self.last_delta = delta_ms;
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>> {
        let mut frame = FrameBuffer::new(width, height)?;
        frame.fill([40, 120, 200, 255]);
        Ok(Some(frame))
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        let pairs: Vec<String> = self.config.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Ok(Some(format!(
            "{} steps={} delta={}",
            pairs.join(";"),
            self.steps,
            self.last_delta
        )))
    }

    fn end(&mut self) -> SimResult<()> {
        Ok(())
    }
}

/// Error with one underlying cause.
#[derive(Debug)]
pub struct StepError {
    step: i64,
    cause: NonFiniteState,
}

/// Cause of a [`StepError`].
#[derive(Debug)]
pub struct NonFiniteState {
    cell: usize,
}

impl fmt::Display for NonFiniteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {} is not finite", self.cell)
    }
}

impl Error for NonFiniteState {}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} diverged", self.step)
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Every `update` fails with a [`StepError`]; everything else succeeds.
#[derive(Default)]
pub struct FailingSim {
    attempts: i64,
}

impl Simulation for FailingSim {
    fn title(&self) -> Option<String> {
        Some("Failing".into())
    }

    fn init(&mut self, _config: &ConfigMap) -> SimResult<()> {
        self.attempts = 0;
        Ok(())
    }

    fn update(&mut self, _delta_ms: i64) -> SimResult<()> {
        self.attempts += 1;
        Err(Box::new(StepError {
            step: self.attempts,
            cause: NonFiniteState { cell: 7 },
        }))
    }

    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>> {
        Ok(Some(FrameBuffer::new(width, height)?))
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        Ok(Some(format!("attempts={}", self.attempts)))
    }

    fn end(&mut self) -> SimResult<()> {
        Ok(())
    }
}

/// Panics in `update` once initialised with `panic=true`, and in `end`
/// always.
#[derive(Default)]
pub struct PanickingSim {
    armed: bool,
}

impl Simulation for PanickingSim {
    fn init(&mut self, config: &ConfigMap) -> SimResult<()> {
        self.armed = config.get("panic").is_some_and(|v| v == "true");
        Ok(())
    }

    fn update(&mut self, _delta_ms: i64) -> SimResult<()> {
        if self.armed {
            panic!("armed stub exploded");
        }
        Ok(())
    }

    fn render(&mut self, _width: u32, _height: u32) -> SimResult<Option<FrameBuffer>> {
        Ok(None)
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        Ok(Some(format!("armed={}", self.armed)))
    }

    fn end(&mut self) -> SimResult<()> {
        panic!("end is not survivable")
    }
}

/// Provides none of the optional operations and never renders or logs.
#[derive(Default)]
pub struct SilentSim;

impl Simulation for SilentSim {
    fn init(&mut self, _config: &ConfigMap) -> SimResult<()> {
        Ok(())
    }

    fn update(&mut self, _delta_ms: i64) -> SimResult<()> {
        Ok(())
    }

    fn render(&mut self, _width: u32, _height: u32) -> SimResult<Option<FrameBuffer>> {
        Ok(None)
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        Ok(None)
    }

    fn end(&mut self) -> SimResult<()> {
        Ok(())
    }
}
