//! Host side of the Charlie plugin runtime.
//!
//! A [`PluginHost`] launches a plugin module in its own process, binds it
//! to one registered simulation type and spawns [`InstanceHandle`]s. A
//! [`SimRun`] drives one instance through initialisation, continuous or
//! fixed-step execution and shutdown, capturing frames and writing a
//! size-rotating run log through a [`DataLogger`].
//!
//! Failures inside plugin code never take the host down: they arrive as
//! [`CallError::Plugin`] and a run records them in its log.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod boundary;
pub mod client;
pub mod config;
pub mod host;
pub mod instance;
pub mod logger;
pub mod module_ref;
pub mod png;
pub mod run;

pub use client::{simplify, CallError, ProxyClient};
pub use config::{ConfigError, RunConfig};
pub use host::{LoadError, PluginHost};
pub use instance::InstanceHandle;
pub use logger::{DataLogger, LoggerError};
pub use module_ref::{ModuleRef, ModuleRefError};
pub use png::{encode_png, save_png, ImageError};
pub use run::{RunError, RunEvent, RunPhase, RunStats, SimRun};
