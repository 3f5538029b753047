//! Benchmark inputs for the Charlie plugin runtime.
//!
//! - [`config_text`]: ConfigText documents of a given size
//! - [`gradient_frame`]: a deterministic RGBA frame
//! - [`request_mix`]: the requests one run iteration sends

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use charlie_core::{parse_config, FrameBuffer};
use charlie_wire::{Envelope, Request};

/// `entries` key/value lines with a comment every tenth line.
pub fn config_text(entries: usize) -> String {
    let mut text = String::with_capacity(entries * 16);
    for i in 0..entries {
        if i % 10 == 0 {
            text.push_str(&format!("# section {}\n", i / 10));
        }
        text.push_str(&format!("key_{i} = {}\n", i * 7));
    }
    text
}

/// A `width` x `height` frame with a colour gradient.
pub fn gradient_frame(width: u32, height: u32) -> FrameBuffer {
    let mut frame = FrameBuffer::new(width, height).expect("benchmark frame size fits");
    for y in 0..height {
        for x in 0..width {
            frame.set_pixel(x, y, [(x % 256) as u8, (y % 256) as u8, 128, 255]);
        }
    }
    frame
}

/// Init, update, render and log requests for instance 0.
pub fn request_mix() -> Vec<Envelope<Request>> {
    vec![
        Envelope::new(
            0,
            Request::Init {
                instance: 0,
                config: parse_config(&config_text(20)),
            },
        ),
        Envelope::new(
            1,
            Request::Update {
                instance: 0,
                delta_ms: 20,
            },
        ),
        Envelope::new(
            2,
            Request::Render {
                instance: 0,
                width: 400,
                height: 400,
            },
        ),
        Envelope::new(3, Request::Log { instance: 0 }),
    ]
}
