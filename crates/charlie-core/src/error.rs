//! Failure types shared by plugins, the module proxy and the host.
//!
//! Plugin authors return [`SimError`] from contract operations. Before a
//! failure crosses the isolation boundary the module reduces it to a
//! [`PluginFailure`]: the plugin's own message plus its `source()` chain,
//! as plain text. Nothing from the boundary machinery is added, so the host
//! can log the failure exactly as the plugin described it.

use std::any::Any;
use std::error::Error;
use std::fmt;

/// Error type returned by plugin contract operations.
pub type SimError = Box<dyn Error + Send + Sync + 'static>;

/// Result alias for plugin contract operations.
pub type SimResult<T> = Result<T, SimError>;

/// A plugin failure, flattened to text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginFailure {
    /// The failure's own message.
    pub message: String,
    /// Messages of the `source()` chain, outermost first.
    pub causes: Vec<String>,
    /// Whether the failure was a panic rather than a returned error.
    pub panicked: bool,
}

impl PluginFailure {
    /// A failure with a message and no causes.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            panicked: false,
        }
    }

    /// Flatten an error and its `source()` chain.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut next = err.source();
        while let Some(cause) = next {
            causes.push(cause.to_string());
            next = cause.source();
        }
        Self {
            message: err.to_string(),
            causes,
            panicked: false,
        }
    }

    /// Build a failure from a caught panic payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "plugin panicked with a non-string payload".to_string()
        };
        Self {
            message,
            causes: Vec::new(),
            panicked: true,
        }
    }

    /// One line per message in the chain, each trimmed, blank lines dropped.
    pub fn summary(&self) -> String {
        let mut lines: Vec<&str> = Vec::with_capacity(1 + self.causes.len());
        for text in std::iter::once(&self.message).chain(&self.causes) {
            lines.extend(text.lines().map(str::trim).filter(|l| !l.is_empty()));
        }
        let mut out = lines.join("\n");
        if self.panicked {
            out.insert_str(0, "panic: ");
        }
        out
    }
}

impl fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.panicked {
            write!(f, "panic: ")?;
        }
        write!(f, "{}", self.message)?;
        for cause in &self.causes {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl Error for PluginFailure {}

impl From<SimError> for PluginFailure {
    fn from(err: SimError) -> Self {
        Self::from_error(err.as_ref())
    }
}
