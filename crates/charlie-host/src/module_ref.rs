//! `"<path>:<typeId>"` module references.

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A plugin module on disk and the type id to bind in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRef {
    path: PathBuf,
    type_id: String,
}

impl ModuleRef {
    /// Reference `type_id` inside the module at `path`.
    pub fn new(path: impl Into<PathBuf>, type_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            type_id: type_id.into(),
        }
    }

    /// Path of the module executable.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registered type id to bind.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.type_id)
    }
}

/// A module reference string that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleRefError {
    /// No `:` between path and type id.
    MissingSeparator {
        /// The rejected input.
        input: String,
    },
    /// Nothing before the last `:`.
    EmptyPath,
    /// Nothing after the last `:`.
    EmptyTypeId,
}

impl fmt::Display for ModuleRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator { input } => {
                write!(f, "module reference {input:?} has no ':' before the type id")
            }
            Self::EmptyPath => write!(f, "module reference has an empty path"),
            Self::EmptyTypeId => write!(f, "module reference has an empty type id"),
        }
    }
}

impl Error for ModuleRefError {}

impl FromStr for ModuleRef {
    type Err = ModuleRefError;

    /// Splits on the last `:`, so Windows drive letters stay in the path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, type_id) = s.rsplit_once(':').ok_or_else(|| ModuleRefError::MissingSeparator {
            input: s.to_string(),
        })?;
        if path.is_empty() {
            return Err(ModuleRefError::EmptyPath);
        }
        if type_id.is_empty() {
            return Err(ModuleRefError::EmptyTypeId);
        }
        Ok(Self::new(path, type_id))
    }
}
