//! Run configuration, validation, and error types.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::logger::{self, DEFAULT_MAX_BUFFER_LEN, DEFAULT_MAX_FILE_LEN};

/// Settings for one [`SimRun`](crate::run::SimRun).
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Render and pause every continuous iteration. Frames are still
    /// captured after `init` and after fixed-step runs. Default: true.
    pub render: bool,
    /// Width of captured frames. Default: 400.
    pub render_width: u32,
    /// Height of captured frames. Default: 400.
    pub render_height: u32,
    /// Pause between continuous iterations while rendering. Default: 20 ms.
    pub frame_delay: Duration,
    /// Delta passed to `update` in fixed-step modes. Default: 20 ms.
    pub step_delta_ms: i64,
    /// Sub-directory of the run log below the type's directory.
    /// Default: `"default"`.
    pub log_subdir: String,
    /// Size limit of one run log file. Default: 50 000 bytes.
    pub max_file_len: usize,
    /// Buffered bytes that trigger a flush. Default: 1 000 bytes.
    pub max_buffer_len: usize,
    /// Data root for logs and images. `None` = `$CHARLIE_DATA_DIR`, else the
    /// platform data directory.
    pub data_root: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            render: true,
            render_width: 400,
            render_height: 400,
            frame_delay: Duration::from_millis(20),
            step_delta_ms: 20,
            log_subdir: "default".to_string(),
            max_file_len: DEFAULT_MAX_FILE_LEN,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            data_root: None,
        }
    }
}

impl RunConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_width == 0 || self.render_height == 0 {
            return Err(ConfigError::EmptyRenderSize {
                width: self.render_width,
                height: self.render_height,
            });
        }
        if self.step_delta_ms <= 0 {
            return Err(ConfigError::InvalidStepDelta {
                value: self.step_delta_ms,
            });
        }
        if self.max_file_len == 0 || self.max_buffer_len == 0 {
            return Err(ConfigError::ZeroLogLimit);
        }
        let subdir = self.log_subdir.as_str();
        if subdir.is_empty()
            || subdir == "."
            || subdir == ".."
            || subdir.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidLogSubdir {
                value: self.log_subdir.clone(),
            });
        }
        Ok(())
    }

    /// The data root this run writes under.
    pub fn resolved_data_root(&self) -> Option<PathBuf> {
        self.data_root.clone().or_else(logger::default_data_root)
    }
}

/// Errors detected during [`RunConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Frames would be zero-sized.
    EmptyRenderSize {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
    },
    /// Fixed-step delta is zero or negative.
    InvalidStepDelta {
        /// The invalid value.
        value: i64,
    },
    /// A log size limit is zero.
    ZeroLogLimit,
    /// The log sub-directory is empty or not a single path component.
    InvalidLogSubdir {
        /// The invalid value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRenderSize { width, height } => {
                write!(f, "render size {width}x{height} is empty")
            }
            Self::InvalidStepDelta { value } => {
                write!(f, "step delta must be positive, got {value} ms")
            }
            Self::ZeroLogLimit => write!(f, "log size limits must be non-zero"),
            Self::InvalidLogSubdir { value } => {
                write!(f, "log sub-directory {value:?} is not a single path component")
            }
        }
    }
}

impl Error for ConfigError {}
