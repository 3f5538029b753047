//! Plugin module serving the reference simulations.

use std::process::ExitCode;

fn main() -> ExitCode {
    charlie_plugin::run_module(charlie_plugins::registry())
}
