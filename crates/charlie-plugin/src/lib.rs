//! Module-side half of the Charlie plugin boundary.
//!
//! A plugin module is an executable that registers its simulation types in
//! a [`Registry`] and hands it to [`run_module`]. The host launches the
//! module, binds it to one registered type, and drives instances of that
//! type through the [`PluginProxy`] over stdin/stdout.
//!
//! ```no_run
//! use charlie_core::{ConfigMap, FrameBuffer, SimResult, Simulation};
//! use charlie_plugin::{run_module, Registry};
//!
//! #[derive(Default)]
//! struct Ticker(i64);
//!
//! impl Simulation for Ticker {
//!     fn init(&mut self, _config: &ConfigMap) -> SimResult<()> { self.0 = 0; Ok(()) }
//!     fn update(&mut self, _delta_ms: i64) -> SimResult<()> { self.0 += 1; Ok(()) }
//!     fn render(&mut self, _w: u32, _h: u32) -> SimResult<Option<FrameBuffer>> { Ok(None) }
//!     fn log(&mut self) -> SimResult<Option<String>> { Ok(Some(self.0.to_string())) }
//!     fn end(&mut self) -> SimResult<()> { Ok(()) }
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     let mut registry = Registry::new();
//!     registry.register::<Ticker>("ticker");
//!     run_module(registry)
//! }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod proxy;
pub mod registry;
pub mod stdio;
pub mod table;

pub use proxy::{serve, PluginProxy};
pub use registry::{Factory, Registry};
pub use stdio::run_module;
pub use table::InstanceTable;
