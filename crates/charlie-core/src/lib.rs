//! Core types and traits for the Charlie simulation runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! capability contract every simulation plugin implements, the frame buffer
//! a plugin renders into, the `key=value` configuration text format, and the
//! failure type that carries plugin errors across the isolation boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config_text;
pub mod contract;
pub mod error;
pub mod frame;

pub use config_text::{parse_config, value_or, ConfigMap};
pub use contract::Simulation;
pub use error::{PluginFailure, SimError, SimResult};
pub use frame::{FrameBuffer, FrameError, BYTES_PER_PIXEL};
