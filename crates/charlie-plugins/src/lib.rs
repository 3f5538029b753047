//! Reference simulation plugins.
//!
//! | Type id | Plugin |
//! |---|---|
//! | `counter` | [`Counter`]: counts steps and elapsed time |
//! | `random-walk` | [`RandomWalk`]: walkers diffusing on a torus |
//! | `life` | [`Life`]: Conway's Game of Life |
//! | `faulty` | [`Faulty`]: fails, panics or exits on demand |
//!
//! [`registry`] registers all of them; the `charlie-plugins` binary serves
//! that registry as a plugin module.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod counter;
pub mod faulty;
pub mod life;
pub mod random_walk;

use charlie_core::{FrameBuffer, FrameError};
use charlie_plugin::Registry;

pub use counter::Counter;
pub use faulty::Faulty;
pub use life::Life;
pub use random_walk::RandomWalk;

/// Registry of every reference plugin.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register::<Counter>("counter")
        .register::<RandomWalk>("random-walk")
        .register::<Life>("life")
        .register::<Faulty>("faulty");
    registry
}

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];

fn canvas(width: u32, height: u32) -> Result<FrameBuffer, FrameError> {
    let mut frame = FrameBuffer::new(width, height)?;
    frame.fill(BACKGROUND);
    Ok(frame)
}
