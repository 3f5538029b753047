//! Entry point for module executables.
//!
//! The protocol owns stdout. Plugin code must not print to it; diagnostics
//! go through `tracing`, which this module routes to stderr.

use std::io::{self, BufReader, BufWriter};
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::proxy::serve;
use crate::registry::Registry;

/// Serve `registry` over stdin/stdout until the host disconnects.
///
/// Log verbosity follows `RUST_LOG` and defaults to `warn`.
pub fn run_module(registry: Registry) -> ExitCode {
    init_tracing();
    info!(types = ?registry.type_ids(), "module starting");

    let reader = BufReader::new(io::stdin().lock());
    let writer = BufWriter::new(io::stdout());
    match serve(registry, reader, writer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "module stopped on a protocol error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed by the embedding binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
