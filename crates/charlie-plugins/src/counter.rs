//! The smallest useful plugin.

use charlie_core::{value_or, ConfigMap, FrameBuffer, SimResult, Simulation};

/// Counts steps and the time passed to `update`.
///
/// Config: `start` (initial step count, default 0).
#[derive(Debug, Default)]
pub struct Counter {
    steps: i64,
    total_ms: i64,
}

impl Simulation for Counter {
    fn title(&self) -> Option<String> {
        Some("Counter".into())
    }

    fn descr(&self) -> Option<String> {
        Some("Counts update calls and the milliseconds passed to them".into())
    }

    fn config(&self) -> Option<String> {
        Some("# Initial step count\nstart=0\n".into())
    }

    fn init(&mut self, config: &ConfigMap) -> SimResult<()> {
        self.steps = value_or(config, "start", 0);
        self.total_ms = 0;
        Ok(())
    }

    fn update(&mut self, delta_ms: i64) -> SimResult<()> {
        self.steps += 1;
        self.total_ms += delta_ms;
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>> {
        let mut frame = crate::canvas(width, height)?;
        // A bar whose length wraps every hundred steps.
        let filled = (self.steps.rem_euclid(100) as u64 * u64::from(width) / 100) as u32;
        for y in 0..height {
            for x in 0..filled {
                frame.set_pixel(x, y, [30, 30, 30, 255]);
            }
        }
        Ok(Some(frame))
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        Ok(Some(format!("steps={} total_ms={}", self.steps, self.total_ms)))
    }

    fn end(&mut self) -> SimResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charlie_core::parse_config;

    #[test]
    fn counts_from_the_configured_start() {
        let mut counter = Counter::default();
        counter.init(&parse_config("start=10")).unwrap();
        counter.update(5).unwrap();
        counter.update(7).unwrap();
        assert_eq!(
            counter.log().unwrap().as_deref(),
            Some("steps=12 total_ms=12")
        );
    }

    #[test]
    fn bad_start_falls_back_to_zero() {
        let mut counter = Counter::default();
        counter.init(&parse_config("start=many")).unwrap();
        assert_eq!(counter.log().unwrap().as_deref(), Some("steps=0 total_ms=0"));
    }

    #[test]
    fn bar_grows_with_steps() {
        let mut counter = Counter::default();
        counter.init(&parse_config("start=50")).unwrap();
        let frame = counter.render(10, 2).unwrap().unwrap();
        assert_eq!(frame.pixel(4, 1), Some([30, 30, 30, 255]));
        assert_eq!(frame.pixel(5, 1), Some(crate::BACKGROUND));
    }
}
