//! Conway's Game of Life on a wrapping grid.

use charlie_core::{value_or, ConfigMap, FrameBuffer, SimResult, Simulation};
use rand::prelude::*;

const ALIVE: [u8; 4] = [20, 20, 20, 255];

/// Config: `width`, `height` (cells, default 64), `density` (initial live
/// fraction, default 0.3), `seed` (0 picks a random seed), `pattern`
/// (`random` or `glider`, default `random`).
#[derive(Debug, Default)]
pub struct Life {
    width: usize,
    height: usize,
    cells: Vec<bool>,
    scratch: Vec<bool>,
    generation: u64,
}

impl Life {
    /// Whether the cell at `(x, y)` is alive. Coordinates wrap.
    pub fn alive(&self, x: isize, y: isize) -> bool {
        if self.cells.is_empty() {
            return false;
        }
        let x = x.rem_euclid(self.width as isize) as usize;
        let y = y.rem_euclid(self.height as isize) as usize;
        self.cells[y * self.width + x]
    }

    /// Number of live cells.
    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    fn neighbours(&self, x: usize, y: usize) -> u8 {
        let mut n = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) != (0, 0) && self.alive(x as isize + dx, y as isize + dy) {
                    n += 1;
                }
            }
        }
        n
    }

    fn step(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let i = y * self.width + x;
                let next = matches!((self.cells[i], self.neighbours(x, y)), (true, 2) | (_, 3));
                self.scratch[i] = next;
            }
        }
        std::mem::swap(&mut self.cells, &mut self.scratch);
        self.generation += 1;
    }
}

impl Simulation for Life {
    fn title(&self) -> Option<String> {
        Some("Game of Life".into())
    }

    fn descr(&self) -> Option<String> {
        Some("Conway's Game of Life on a torus".into())
    }

    fn config(&self) -> Option<String> {
        Some(
            "width=64\nheight=64\n# Initial live fraction\ndensity=0.3\n\
             # random | glider\npattern=random\n# 0 = random\nseed=0\n"
                .into(),
        )
    }

    fn meta(&self) -> Option<String> {
        Some("log: generation population".into())
    }

    fn init(&mut self, config: &ConfigMap) -> SimResult<()> {
        let width: usize = value_or(config, "width", 64);
        let height: usize = value_or(config, "height", 64);
        if width < 3 || height < 3 {
            return Err(format!("grid must be at least 3x3, got {width}x{height}").into());
        }
        self.width = width;
        self.height = height;
        self.cells = vec![false; width * height];
        self.scratch = vec![false; width * height];
        self.generation = 0;

        match config.get("pattern").map(String::as_str).unwrap_or("random") {
            "random" => {
                let density: f64 = value_or(config, "density", 0.3);
                let seed: u64 = value_or(config, "seed", 0);
                let mut rng = if seed == 0 {
                    StdRng::seed_from_u64(rand::random())
                } else {
                    StdRng::seed_from_u64(seed)
                };
                for cell in &mut self.cells {
                    *cell = rng.random::<f64>() < density;
                }
            }
            "glider" => {
                for (x, y) in [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)] {
                    self.cells[y * width + x] = true;
                }
            }
            other => return Err(format!("unknown pattern {other:?}").into()),
        }
        Ok(())
    }

    fn update(&mut self, _delta_ms: i64) -> SimResult<()> {
        if self.cells.is_empty() {
            return Err("grid is not initialised".into());
        }
        self.step();
        Ok(())
    }

    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>> {
        let mut frame = crate::canvas(width, height)?;
        if self.cells.is_empty() {
            return Ok(Some(frame));
        }
        for py in 0..height {
            let cy = py as usize * self.height / height as usize;
            for px in 0..width {
                let cx = px as usize * self.width / width as usize;
                if self.cells[cy * self.width + cx] {
                    frame.set_pixel(px, py, ALIVE);
                }
            }
        }
        Ok(Some(frame))
    }

    fn log(&mut self) -> SimResult<Option<String>> {
        Ok(Some(format!("{} {}", self.generation, self.population())))
    }

    fn end(&mut self) -> SimResult<()> {
        Ok(())
    }
}
