//! Charlie: a simulation plugin host and execution runtime.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Charlie sub-crates. Plugin authors implement [`types::Simulation`]
//! and serve a [`plugin::Registry`] from a module binary; applications
//! load modules with [`host::PluginHost`] and drive instances with
//! [`host::SimRun`].
//!
//! # Quick start
//!
//! ```rust
//! use charlie::prelude::*;
//!
//! #[derive(Default)]
//! struct Ticker(i64);
//!
//! impl Simulation for Ticker {
//!     fn title(&self) -> Option<String> { Some("Ticker".into()) }
//!     fn init(&mut self, _config: &ConfigMap) -> SimResult<()> { self.0 = 0; Ok(()) }
//!     fn update(&mut self, _delta_ms: i64) -> SimResult<()> { self.0 += 1; Ok(()) }
//!     fn render(&mut self, w: u32, h: u32) -> SimResult<Option<FrameBuffer>> {
//!         Ok(Some(FrameBuffer::new(w, h)?))
//!     }
//!     fn log(&mut self) -> SimResult<Option<String>> { Ok(Some(self.0.to_string())) }
//!     fn end(&mut self) -> SimResult<()> { Ok(()) }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register::<Ticker>("ticker");
//!
//! // Serve the registry in-process; `PluginHost::load` runs a module binary instead.
//! let host = PluginHost::in_process(registry, "ticker").unwrap();
//! let data = tempfile::tempdir().unwrap();
//! let config = RunConfig {
//!     data_root: Some(data.path().to_path_buf()),
//!     ..RunConfig::default()
//! };
//! let run = SimRun::new(host.spawn().unwrap(), config).unwrap();
//! run.init("");
//! run.update_sync(10);
//! assert_eq!(run.iteration(), 10);
//! run.end();
//! host.unload();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `charlie-core` | Contract trait, frames, ConfigText, failures |
//! | [`wire`] | `charlie-wire` | Boundary protocol messages and codec |
//! | [`plugin`] | `charlie-plugin` | Registry, proxy and module entry point |
//! | [`host`] | `charlie-host` | Loading, instance handles, run control, logging |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Contract trait, frames, ConfigText and failures (`charlie-core`).
pub use charlie_core as types;

/// Boundary protocol messages and codec (`charlie-wire`).
///
/// Only needed to speak the protocol directly; hosts and modules use it
/// through [`host`] and [`plugin`].
pub use charlie_wire as wire;

/// Module side: [`plugin::Registry`], [`plugin::PluginProxy`] and
/// [`plugin::run_module`] (`charlie-plugin`).
pub use charlie_plugin as plugin;

/// Host side: [`host::PluginHost`], [`host::InstanceHandle`],
/// [`host::SimRun`] and [`host::DataLogger`] (`charlie-host`).
pub use charlie_host as host;

/// Common imports for typical Charlie usage.
///
/// ```rust
/// use charlie::prelude::*;
/// ```
pub mod prelude {
    // Plugin contract
    pub use charlie_core::{
        parse_config, value_or, ConfigMap, FrameBuffer, SimError, SimResult, Simulation,
    };

    // Module side
    pub use charlie_plugin::{run_module, Registry};

    // Host side
    pub use charlie_host::{
        CallError, InstanceHandle, LoadError, ModuleRef, PluginHost, RunConfig, RunEvent,
        SimRun,
    };
}
