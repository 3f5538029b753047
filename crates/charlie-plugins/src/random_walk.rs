//! Walkers diffusing on a square torus.

use std::f64::consts::TAU;

use charlie_core::{value_or, ConfigMap, FrameBuffer, SimResult, Simulation};
use rand::prelude::*;

const WALKER: [u8; 4] = [200, 40, 40, 255];

/// `walkers` points each moving `speed` units per second in a fresh random
/// direction every update, wrapping at the edges of a `size` x `size`
/// field.
///
/// Config: `walkers` (default 25), `size` (default 100), `speed` (units
/// per second, default 20), `seed` (0 picks a random seed).
pub struct RandomWalk {
    rng: StdRng,
    size: f64,
    speed: f64,
    positions: Vec<(f64, f64)>,
    time_ms: i64,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            rng: StdRng::seed_from_u64(0),
            size: 100.0,
            speed: 20.0,
            positions: Vec::new(),
            time_ms: 0,
        }
    }
}

impl RandomWalk {
    /// Current walker positions.
    pub fn positions(&self) -> &[(f64, f64)] {
        &self.positions
    }

    fn centroid(&self) -> (f64, f64) {
        if self.positions.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.positions.len() as f64;
        let (sx, sy) = self
            .positions
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }
}

/// `v` folded into `[0, size)`. `rem_euclid` alone can round up to `size`.
fn wrap(v: f64, size: f64) -> f64 {
    let w = v.rem_euclid(size);
    if w >= size {
        0.0
    } else {
        w
    }
}

impl Simulation for RandomWalk {
    fn title(&self) -> Option<String> {
        Some("Random Walk".into())
    }

    fn descr(&self) -> Option<String> {
        Some("Independent walkers taking random steps on a torus".into())
    }

    fn config(&self) -> Option<String> {
        Some(
            "# Number of walkers\nwalkers=25\n# Field edge length\nsize=100\n\
             # Units per second\nspeed=20\n# 0 = random\nseed=0\n"
                .into(),
        )
    }

    fn meta(&self) -> Option<String> {
        Some("log: time_ms centroid_x centroid_y".into())
    }

    fn init(&mut self, config: &ConfigMap) -> SimResult<()> {
        let walkers: usize = value_or(config, "walkers", 25);
        let size: f64 = value_or(config, "size", 100.0);
        if !(size.is_finite() && size > 0.0) {
            return Err(format!("size must be a positive number, got {size}").into());
        }
        let seed: u64 = value_or(config, "seed", 0);
        self.rng = if seed == 0 {
            StdRng::seed_from_u64(rand::random())
        } else {
            StdRng::seed_from_u64(seed)
        };
        self.size = size;
        self.speed = value_or(config, "speed", 20.0);
        self.time_ms = 0;
        let centre = size / 2.0;
        self.positions = vec![(centre, centre); walkers];
        Ok(())
    }

    fn update(&mut self, delta_ms: i64) -> SimResult<()> {
        // Fixed-step runs pass the step delta; the first continuous step passes 0.
        let step = self.speed * delta_ms.max(0) as f64 / 1000.0;
        for (x, y) in &mut self.positions {
            let angle = self.rng.random::<f64>() * TAU;
            *x = wrap(*x + step * angle.cos(), self.size);
            *y = wrap(*y + step * angle.sin(), self.size);
        }
        self.time_ms += delta_ms;
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>> {
        let mut frame = crate::canvas(width, height)?;
        for &(x, y) in &self.positions {
            let px = ((x / self.size) * f64::from(width)) as u32;
            let py = ((y / self.size) * f64::from(height)) as u32;
            frame.set_pixel(px.min(width.saturating_sub(1)), py.min(height.saturating_sub(1)), WALKER);
        }
        Ok(Some(frame))
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        let (cx, cy) = self.centroid();
        Ok(Some(format!("{} {cx:.3} {cy:.3}", self.time_ms)))
    }

    fn end(&mut self) -> SimResult<()> {
        self.positions.clear();
        Ok(())
    }
}
