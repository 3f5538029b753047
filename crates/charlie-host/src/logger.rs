//! Buffered, size-rotating run log writer.
//!
//! A logger owns one run directory and one base file name. Text is
//! buffered in memory and appended to the current file in chunks; once a
//! file would grow past its limit the logger continues in `<base>-1.log`,
//! `<base>-2.log` and so on. Reading the parts in sequence order gives back
//! the logged text unchanged.

use std::error::Error;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

/// Default size limit of one log file, in bytes.
pub const DEFAULT_MAX_FILE_LEN: usize = 50_000;

/// Default buffer size that triggers a flush, in bytes.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 1_000;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "CHARLIE_DATA_DIR";

/// Directory under the data root that holds every project.
const APP_DIR: &str = "charlie";

/// Errors writing the run log.
#[derive(Debug)]
pub enum LoggerError {
    /// No data root configured and none could be discovered.
    NoDataDir,
    /// A filesystem operation failed.
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDataDir => write!(
                f,
                "no data directory available; set {DATA_DIR_ENV} or configure a data root"
            ),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for LoggerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoDataDir => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// The data root: `$CHARLIE_DATA_DIR` if set, else the platform data
/// directory.
pub fn default_data_root() -> Option<PathBuf> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::data_dir(),
    }
}

/// Run-scoped log writer.
#[derive(Debug)]
pub struct DataLogger {
    dir: PathBuf,
    base_name: String,
    max_file_len: usize,
    max_buffer_len: usize,
    buffer: String,
    part: u32,
    part_len: usize,
    files: Vec<PathBuf>,
}

impl DataLogger {
    /// A logger for `project/instance` under the default data root.
    pub fn new(project: &str, instance: &str) -> Result<Self, LoggerError> {
        let root = default_data_root().ok_or(LoggerError::NoDataDir)?;
        Self::with_root(root, project, instance)
    }

    /// A logger for `project/instance` under `root`.
    ///
    /// Creates `<root>/charlie/<project>/<instance>/` if needed and claims
    /// the first file under a base name taken from the current UTC time,
    /// suffixed `_2`, `_3`, ... when another run already holds it.
    pub fn with_root(
        root: impl AsRef<Path>,
        project: &str,
        instance: &str,
    ) -> Result<Self, LoggerError> {
        let dir = root.as_ref().join(APP_DIR).join(project).join(instance);
        fs::create_dir_all(&dir).map_err(|source| LoggerError::Io {
            path: dir.clone(),
            source,
        })?;

        let (base_name, first) = reserve_base_name(&dir)?;
        debug!(dir = %dir.display(), base = %base_name, "run log opened");

        Ok(Self {
            dir,
            base_name,
            max_file_len: DEFAULT_MAX_FILE_LEN,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            buffer: String::new(),
            part: 0,
            part_len: 0,
            files: vec![first],
        })
    }

    /// Override the size limits. Zero limits are raised to one byte.
    pub fn with_limits(mut self, max_file_len: usize, max_buffer_len: usize) -> Self {
        self.max_file_len = max_file_len.max(1);
        self.max_buffer_len = max_buffer_len.max(1);
        self
    }

    /// The run directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base file name, without part suffix or extension.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Files of this run so far, in sequence order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Bytes waiting in the buffer.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append `text`, flushing once the buffer reaches its limit.
    pub fn log(&mut self, text: &str) -> Result<(), LoggerError> {
        self.buffer.push_str(text);
        if self.buffer.len() >= self.max_buffer_len {
            self.write_buffer()?;
        }
        Ok(())
    }

    /// Append the buffer to the current file, starting a new part first if
    /// the current one would grow past the file limit.
    ///
    /// A failed write keeps the buffer so a later flush can retry.
    pub fn write_buffer(&mut self) -> Result<(), LoggerError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        if self.part_len > 0 && self.part_len + self.buffer.len() > self.max_file_len {
            self.part += 1;
            self.part_len = 0;
        }

        let path = self.part_path(self.part);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoggerError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(self.buffer.as_bytes())
            .map_err(|source| LoggerError::Io {
                path: path.clone(),
                source,
            })?;

        if self.files.last() != Some(&path) {
            self.files.push(path);
        }
        self.part_len += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }

    fn part_path(&self, part: u32) -> PathBuf {
        if part == 0 {
            self.dir.join(format!("{}.log", self.base_name))
        } else {
            self.dir.join(format!("{}-{part}.log", self.base_name))
        }
    }
}

/// Create `run-<stamp>[_n].log` exclusively, so concurrent loggers in one
/// directory never share files.
fn reserve_base_name(dir: &Path) -> Result<(String, PathBuf), LoggerError> {
    let stamp = format!("run-{}", Utc::now().format("%Y%m%d-%H%M%S"));
    let mut base_name = stamp.clone();
    let mut n = 1;
    loop {
        let path = dir.join(format!("{base_name}.log"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok((base_name, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                n += 1;
                base_name = format!("{stamp}_{n}");
            }
            Err(source) => return Err(LoggerError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read_all(logger: &DataLogger) -> String {
        logger
            .files()
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect()
    }

    #[test]
    fn creates_the_run_directory() {
        let root = tempfile::tempdir().unwrap();
        let logger = DataLogger::with_root(root.path(), "life", "default").unwrap();
        assert_eq!(logger.dir(), root.path().join("charlie/life/default"));
        assert!(logger.dir().is_dir());
        assert!(logger.base_name().starts_with("run-"));
        assert_eq!(logger.base_name().len(), "run-yyyyMMdd-HHmmss".len());
    }

    #[test]
    fn buffers_until_the_threshold() {
        let root = tempfile::tempdir().unwrap();
        let mut logger = DataLogger::with_root(root.path(), "p", "i")
            .unwrap()
            .with_limits(1_000, 10);
        logger.log("12345").unwrap();
        assert_eq!(logger.buffered_len(), 5);
        assert_eq!(read_all(&logger), "");
        logger.log("67890").unwrap();
        assert_eq!(logger.buffered_len(), 0);
        assert_eq!(read_all(&logger), "1234567890");
    }

    #[test]
    fn rotates_when_a_file_would_overflow() {
        let root = tempfile::tempdir().unwrap();
        let mut logger = DataLogger::with_root(root.path(), "p", "i")
            .unwrap()
            .with_limits(10, 1);
        for chunk in ["aaaa", "bbbb", "cccc", "dddd"] {
            logger.log(chunk).unwrap();
        }
        let names: Vec<String> = logger
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let base = logger.base_name().to_string();
        assert_eq!(names, vec![format!("{base}.log"), format!("{base}-1.log")]);
        assert_eq!(fs::read_to_string(&logger.files()[0]).unwrap(), "aaaabbbb");
        assert_eq!(read_all(&logger), "aaaabbbbccccdddd");
    }

    #[test]
    fn oversized_chunk_still_lands_in_one_part() {
        let root = tempfile::tempdir().unwrap();
        let mut logger = DataLogger::with_root(root.path(), "p", "i")
            .unwrap()
            .with_limits(4, 1);
        logger.log("0123456789").unwrap();
        logger.log("x").unwrap();
        assert_eq!(logger.files().len(), 2);
        assert_eq!(read_all(&logger), "0123456789x");
    }

    #[test]
    fn second_logger_in_the_same_second_gets_its_own_files() {
        let root = tempfile::tempdir().unwrap();
        let first = DataLogger::with_root(root.path(), "p", "i").unwrap();
        let second = DataLogger::with_root(root.path(), "p", "i").unwrap();
        assert_ne!(first.base_name(), second.base_name());
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let mut logger = DataLogger::with_root(root.path(), "p", "i").unwrap();
        logger.write_buffer().unwrap();
        assert_eq!(logger.files().len(), 1);
        assert_eq!(fs::read_dir(logger.dir()).unwrap().count(), 1);
        assert_eq!(read_all(&logger), "");
    }

    #[test]
    fn concurrent_loggers_never_share_a_base_name() {
        let root = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..4)
            .map(|_| {
                DataLogger::with_root(root.path(), "p", "i")
                    .unwrap()
                    .base_name()
                    .to_string()
            })
            .collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn parts_reassemble_to_the_logged_stream(
            chunks in prop::collection::vec("[a-z<>/=\n]{0,40}", 0..30),
            max_file in 1usize..200,
            max_buffer in 1usize..80,
        ) {
            let root = tempfile::tempdir().unwrap();
            let mut logger = DataLogger::with_root(root.path(), "p", "i")
                .unwrap()
                .with_limits(max_file, max_buffer);
            for chunk in &chunks {
                logger.log(chunk).unwrap();
            }
            logger.write_buffer().unwrap();
            prop_assert_eq!(read_all(&logger), chunks.concat());
            for (n, path) in logger.files().iter().enumerate() {
                let len = fs::metadata(path).unwrap().len() as usize;
                // Only a file holding a single oversized flush may exceed the limit.
                prop_assert!(len <= max_file.max(max_buffer + 40), "part {} is {} bytes", n, len);
            }
        }
    }
}
