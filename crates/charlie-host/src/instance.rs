//! Handles to spawned plugin instances.

use std::fmt;
use std::sync::Arc;

use charlie_core::{ConfigMap, FrameBuffer};

use crate::client::{CallError, ProxyClient};

/// Reference to one instance inside a loaded module.
///
/// Cheap to clone; every clone addresses the same instance. Each method
/// forwards one contract operation through the boundary.
#[derive(Clone)]
pub struct InstanceHandle {
    client: Arc<ProxyClient>,
    id: u32,
    type_id: Arc<str>,
}

impl InstanceHandle {
    pub(crate) fn new(client: Arc<ProxyClient>, id: u32, type_id: Arc<str>) -> Self {
        Self {
            client,
            id,
            type_id,
        }
    }

    /// Instance id, unique within its module.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Type id the instance was spawned from.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Human-readable name.
    pub fn title(&self) -> Result<Option<String>, CallError> {
        self.client.title(self.id)
    }

    /// Human-readable description.
    pub fn descr(&self) -> Result<Option<String>, CallError> {
        self.client.descr(self.id)
    }

    /// Default configuration as ConfigText.
    pub fn config(&self) -> Result<Option<String>, CallError> {
        self.client.config(self.id)
    }

    /// Free-form metadata.
    pub fn meta(&self) -> Result<Option<String>, CallError> {
        self.client.meta(self.id)
    }

    /// (Re)initialise from a parsed configuration.
    pub fn init(&self, config: &ConfigMap) -> Result<(), CallError> {
        self.client.init(self.id, config)
    }

    /// Advance one step.
    pub fn update(&self, delta_ms: i64) -> Result<(), CallError> {
        self.client.update(self.id, delta_ms)
    }

    /// Render the current state at `width` x `height`.
    pub fn render(&self, width: u32, height: u32) -> Result<Option<FrameBuffer>, CallError> {
        self.client.render(self.id, width, height)
    }

    /// One log entry for the current iteration.
    pub fn log(&self) -> Result<Option<String>, CallError> {
        self.client.log(self.id)
    }

    /// Finalise.
    pub fn end(&self) -> Result<(), CallError> {
        self.client.end(self.id)
    }

    /// Drop the instance in the module. Other clones of this handle fail
    /// with [`Rejection::UnknownInstance`](charlie_wire::Rejection::UnknownInstance)
    /// afterwards.
    pub fn remove(self) -> Result<(), CallError> {
        self.client.remove(self.id)
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("type_id", &self.type_id)
            .field("id", &self.id)
            .finish()
    }
}
