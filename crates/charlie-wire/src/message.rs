//! Messages exchanged across the boundary.

use charlie_core::{ConfigMap, FrameBuffer, PluginFailure};

/// A message paired with the sequence number that ties a response to its
/// request.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<T> {
    /// Sequence number chosen by the host; echoed by the module.
    pub seq: u64,
    /// The message itself.
    pub body: T,
}

impl<T> Envelope<T> {
    /// Pair `body` with `seq`.
    pub fn new(seq: u64, body: T) -> Self {
        Self { seq, body }
    }
}

/// A host-to-module request.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// List the type ids the module registers.
    Manifest,
    /// Bind the module's proxy to one registered type.
    Bind {
        /// Registered type identifier.
        type_id: String,
    },
    /// Construct a new instance of the bound type.
    Spawn,
    /// Drop an instance.
    Remove {
        /// Target instance.
        instance: u32,
    },
    /// `Simulation::title`.
    Title {
        /// Target instance.
        instance: u32,
    },
    /// `Simulation::descr`.
    Descr {
        /// Target instance.
        instance: u32,
    },
    /// `Simulation::config`.
    Config {
        /// Target instance.
        instance: u32,
    },
    /// `Simulation::meta`.
    Meta {
        /// Target instance.
        instance: u32,
    },
    /// `Simulation::init`.
    Init {
        /// Target instance.
        instance: u32,
        /// Parsed configuration.
        config: ConfigMap,
    },
    /// `Simulation::update`.
    Update {
        /// Target instance.
        instance: u32,
        /// Step duration in milliseconds.
        delta_ms: i64,
    },
    /// `Simulation::render`.
    Render {
        /// Target instance.
        instance: u32,
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
    /// `Simulation::log`.
    Log {
        /// Target instance.
        instance: u32,
    },
    /// `Simulation::end`.
    End {
        /// Target instance.
        instance: u32,
    },
    /// Drop every instance and stop serving.
    Shutdown,
}

impl Request {
    /// The instance a per-instance request targets.
    pub fn instance(&self) -> Option<u32> {
        match self {
            Self::Remove { instance }
            | Self::Title { instance }
            | Self::Descr { instance }
            | Self::Config { instance }
            | Self::Meta { instance }
            | Self::Init { instance, .. }
            | Self::Update { instance, .. }
            | Self::Render { instance, .. }
            | Self::Log { instance }
            | Self::End { instance } => Some(*instance),
            Self::Manifest | Self::Bind { .. } | Self::Spawn | Self::Shutdown => None,
        }
    }

    /// Operation name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Bind { .. } => "bind",
            Self::Spawn => "spawn",
            Self::Remove { .. } => "remove",
            Self::Title { .. } => "title",
            Self::Descr { .. } => "descr",
            Self::Config { .. } => "config",
            Self::Meta { .. } => "meta",
            Self::Init { .. } => "init",
            Self::Update { .. } => "update",
            Self::Render { .. } => "render",
            Self::Log { .. } => "log",
            Self::End { .. } => "end",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Why the module refused a request without calling plugin code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No type with this id is registered.
    TypeNotFound {
        /// The requested id.
        type_id: String,
    },
    /// A per-instance or spawn request arrived before `Bind`.
    NotBound,
    /// `Bind` arrived after the proxy was already bound.
    AlreadyBound {
        /// The id the proxy is bound to.
        type_id: String,
    },
    /// No live instance has this id.
    UnknownInstance {
        /// The requested id.
        instance: u32,
    },
    /// The instance's worker thread could not be started.
    SpawnFailed {
        /// Description of the failure.
        reason: String,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeNotFound { type_id } => write!(f, "type '{type_id}' is not registered"),
            Self::NotBound => write!(f, "proxy is not bound to a type"),
            Self::AlreadyBound { type_id } => write!(f, "proxy is already bound to '{type_id}'"),
            Self::UnknownInstance { instance } => write!(f, "no instance with id {instance}"),
            Self::SpawnFailed { reason } => write!(f, "could not spawn instance: {reason}"),
        }
    }
}

impl std::error::Error for Rejection {}

/// A module-to-host response.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// The request completed and has no payload.
    Done,
    /// A new instance was created.
    Spawned {
        /// Id of the new instance.
        instance: u32,
    },
    /// Optional text (title, descr, config, meta, log).
    Text(Option<String>),
    /// Optional rendered frame.
    Frame(Option<FrameBuffer>),
    /// Registered type ids.
    Types(Vec<String>),
    /// Plugin code failed.
    Failed(PluginFailure),
    /// The module refused the request.
    Rejected(Rejection),
}
