//! Stub plugins and fixtures for Charlie development.
//!
//! The stubs are registered in [`stub_registry`] and can be served
//! in-process through [`stub_host`], so tests exercise the full protocol
//! without building a module binary.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod stubs;

pub use fixtures::{read_run_log, run_config, stub_host, stub_registry, wait_until};
pub use stubs::{FailingSim, PanickingSim, SilentSim, StubSim, STUB_CONFIG};
