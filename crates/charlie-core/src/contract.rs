//! The capability contract a simulation plugin type must satisfy.

use crate::config_text::ConfigMap;
use crate::error::SimResult;
use crate::frame::FrameBuffer;

/// A simulation that can be loaded into a plugin module and driven by a
/// run controller.
///
/// The descriptive operations (`title`, `descr`, `config`, `meta`) are
/// optional: a plugin that does not override them reports an absent value.
/// The lifecycle operations are required. A plugin reports a failure by
/// returning an error; panics are also contained by the module and reported
/// the same way, but returning an error produces a more readable run log.
///
/// Instances are created with [`Default`] (see the module registry) and are
/// only ever touched by one thread at a time, so implementors need not be
/// `Send` or `Sync`.
pub trait Simulation {
    /// Human-readable name.
    fn title(&self) -> Option<String> {
        None
    }

    /// Human-readable description.
    fn descr(&self) -> Option<String> {
        None
    }

    /// Default start configuration in config text format.
    fn config(&self) -> Option<String> {
        None
    }

    /// Free-form metadata such as author, version, license.
    fn meta(&self) -> Option<String> {
        None
    }

    /// (Re)initialize internal state from a parsed configuration.
    ///
    /// Keys that are missing from `config` should fall back to defaults so
    /// that an empty map is always accepted.
    fn init(&mut self, config: &ConfigMap) -> SimResult<()>;

    /// Advance the simulation by one step. `delta_ms` is the wall-clock
    /// duration of the previous step, or a fixed nominal value in
    /// fixed-step mode.
    fn update(&mut self, delta_ms: i64) -> SimResult<()>;

    /// Produce the current visual frame at the requested size, or `None`
    /// if the simulation has nothing to draw.
    fn render(&mut self, width: u32, height: u32) -> SimResult<Option<FrameBuffer>>;

    /// Produce one textual log entry for the current iteration.
    fn log(&mut self) -> SimResult<Option<String>>;

    /// Release resources and finalize.
    fn end(&mut self) -> SimResult<()>;
}
