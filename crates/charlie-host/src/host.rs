//! Loading, binding and unloading plugin modules.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use charlie_plugin::Registry;
use charlie_wire::{Rejection, WireError};
use tracing::{debug, info};

use crate::boundary::{Boundary, Streams};
use crate::client::{CallError, ProxyClient};
use crate::instance::InstanceHandle;
use crate::module_ref::ModuleRef;

/// How long a freshly started module has to announce the protocol.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an unloading module has to exit before it is killed.
pub const UNLOAD_GRACE: Duration = Duration::from_secs(2);

/// A module that could not be loaded. Nothing is left running.
#[derive(Debug)]
pub enum LoadError {
    /// The module path does not exist.
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },
    /// The module does not register the requested type.
    TypeNotFound {
        /// The requested type id.
        type_id: String,
        /// The type ids the module does register.
        available: Vec<String>,
    },
    /// The module process could not be started.
    Spawn(io::Error),
    /// The module did not speak the protocol.
    Handshake(WireError),
    /// Binding or listing types failed for another reason.
    Call(CallError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound { path } => {
                write!(f, "plugin module {} not found", path.display())
            }
            Self::TypeNotFound { type_id, available } => {
                write!(f, "type {type_id:?} not found in module")?;
                if !available.is_empty() {
                    write!(f, " (available: {})", available.join(", "))?;
                }
                Ok(())
            }
            Self::Spawn(e) => write!(f, "failed to start plugin module: {e}"),
            Self::Handshake(e) => write!(f, "plugin module handshake failed: {e}"),
            Self::Call(e) => write!(f, "plugin module setup failed: {e}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Handshake(e) => Some(e),
            Self::Call(e) => Some(e),
            Self::FileNotFound { .. } | Self::TypeNotFound { .. } => None,
        }
    }
}

/// A loaded module bound to one simulation type.
///
/// Owns the isolation boundary. [`unload`](Self::unload) (or dropping the
/// host) tears it down; every [`InstanceHandle`] spawned from the host then
/// fails with [`CallError::Disconnected`]. Unloading while a run over one
/// of its instances is still going is a caller error.
pub struct PluginHost {
    type_id: Arc<str>,
    module: Option<PathBuf>,
    client: Arc<ProxyClient>,
    boundary: Option<Boundary>,
}

impl PluginHost {
    /// Launch the module at `path` and bind it to `type_id`.
    pub fn load(path: impl AsRef<Path>, type_id: &str) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let (boundary, client) = open_module(path)?;
        let host = Self::bind(boundary, client, type_id, Some(path.to_path_buf()))?;
        info!(module = %path.display(), type_id, "plugin module loaded");
        Ok(host)
    }

    /// Load from a parsed `"<path>:<typeId>"` reference.
    pub fn from_ref(module: &ModuleRef) -> Result<Self, LoadError> {
        Self::load(module.path(), module.type_id())
    }

    /// Serve `registry` inside this process and bind it to `type_id`.
    pub fn in_process(registry: Registry, type_id: &str) -> Result<Self, LoadError> {
        let (boundary, streams) = Boundary::in_process(registry).map_err(LoadError::Spawn)?;
        let (boundary, client) = handshake(boundary, streams)?;
        let host = Self::bind(boundary, client, type_id, None)?;
        debug!(type_id, "in-process module loaded");
        Ok(host)
    }

    /// Type ids registered by the module at `path`.
    pub fn available_types(path: impl AsRef<Path>) -> Result<Vec<String>, LoadError> {
        let (boundary, client) = open_module(path.as_ref())?;
        let types = client.manifest();
        client.shutdown(UNLOAD_GRACE);
        boundary.close(UNLOAD_GRACE);
        client.join_reader();
        types.map_err(LoadError::Call)
    }

    fn bind(
        boundary: Boundary,
        client: ProxyClient,
        type_id: &str,
        module: Option<PathBuf>,
    ) -> Result<Self, LoadError> {
        if let Err(e) = client.bind(type_id) {
            let err = match e {
                CallError::Rejected(Rejection::TypeNotFound { type_id }) => LoadError::TypeNotFound {
                    type_id,
                    available: client.manifest().unwrap_or_default(),
                },
                other => LoadError::Call(other),
            };
            client.shutdown(UNLOAD_GRACE);
            boundary.abandon();
            return Err(err);
        }
        Ok(Self {
            type_id: Arc::from(type_id),
            module,
            client: Arc::new(client),
            boundary: Some(boundary),
        })
    }

    /// The bound type id.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Path of the module executable; `None` for in-process modules.
    pub fn module_path(&self) -> Option<&Path> {
        self.module.as_deref()
    }

    /// Whether the module is still reachable. Turns false if it crashed.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Construct a new instance of the bound type.
    pub fn spawn(&self) -> Result<InstanceHandle, CallError> {
        let id = self.client.spawn()?;
        debug!(type_id = %self.type_id, instance = id, "instance spawned");
        Ok(InstanceHandle::new(
            Arc::clone(&self.client),
            id,
            Arc::clone(&self.type_id),
        ))
    }

    /// Tear down the boundary and every instance in it.
    pub fn unload(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(boundary) = self.boundary.take() {
            self.client.shutdown(UNLOAD_GRACE);
            boundary.close(UNLOAD_GRACE);
            self.client.join_reader();
            info!(type_id = %self.type_id, "plugin module unloaded");
        }
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("type_id", &self.type_id)
            .field("module", &self.module)
            .field("client", &self.client)
            .finish()
    }
}

fn open_module(path: &Path) -> Result<(Boundary, ProxyClient), LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let (boundary, streams) = Boundary::launch(path).map_err(LoadError::Spawn)?;
    handshake(boundary, streams)
}

fn handshake(boundary: Boundary, streams: Streams) -> Result<(Boundary, ProxyClient), LoadError> {
    let Streams {
        from_module,
        to_module,
    } = streams;
    match ProxyClient::connect(from_module, to_module, HANDSHAKE_TIMEOUT) {
        Ok(client) => Ok((boundary, client)),
        Err(e) => {
            boundary.abandon();
            Err(LoadError::Handshake(e))
        }
    }
}
