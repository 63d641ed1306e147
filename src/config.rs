//! Environment-driven configuration for the bundled observability stack.
//!
//! | Variable | Effect |
//! |---|---|
//! | `FILE_LOGGING` = yes/no | File sink (yes) or console sink (no) |
//! | `LOG_FILE_NAME` | Base file name; required when file logging is on |
//! | `LOG_FILE_PATH` | Directory; must exist at init |
//! | `LOG_FILE_EXTN` | Overrides the default `.txt` |
//! | `FILE_SIZE` | Rotation limit; `K`/`M`/`G` suffixes, case-insensitive |
//!
//! There is no implicit global sink. [`init_default`] installs one behind a
//! `OnceLock` exactly once; [`default_sink`] returns it only after that
//! explicit initialisation.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::logq::{ConsoleSink, FileSink, RecordWrite, SinkError};

pub const ENV_FILE_LOGGING: &str = "FILE_LOGGING";
pub const ENV_LOG_FILE_NAME: &str = "LOG_FILE_NAME";
pub const ENV_LOG_FILE_PATH: &str = "LOG_FILE_PATH";
pub const ENV_LOG_FILE_EXTN: &str = "LOG_FILE_EXTN";
pub const ENV_FILE_SIZE: &str = "FILE_SIZE";

/// Rotation default: 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Smallest accepted rotation limit; lower values are clamped up.
pub const MIN_FILE_SIZE: u64 = 4096;

/// Errors from configuration parsing and sink construction.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// File logging requested without `LOG_FILE_NAME`.
    MissingFileName,
    /// `LOG_FILE_PATH` does not name an existing directory.
    PathMissing { path: PathBuf },
    /// `FILE_SIZE` could not be parsed.
    InvalidSize { value: String },
    /// Sink construction failed downstream.
    Sink(SinkError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFileName => {
                write!(f, "file logging enabled but {ENV_LOG_FILE_NAME} is not set")
            }
            Self::PathMissing { path } => {
                write!(f, "log directory does not exist: {}", path.display())
            }
            Self::InvalidSize { value } => write!(f, "unparseable {ENV_FILE_SIZE}: {value:?}"),
            Self::Sink(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sink(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SinkError> for ConfigError {
    fn from(err: SinkError) -> Self {
        Self::Sink(err)
    }
}

/// Resolved logging configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub file_logging: bool,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub file_extension: Option<String>,
    pub max_file_size: u64,
}

impl Default for LogConfig {
    /// Console logging with the default rotation limit.
    fn default() -> Self {
        Self {
            file_logging: false,
            file_name: None,
            file_path: None,
            file_extension: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl LogConfig {
    /// Reads the recognised environment variables. Unset variables fall back
    /// to the defaults; a malformed `FILE_SIZE` is an error rather than a
    /// silent 1 MiB.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Ok(v) = env::var(ENV_FILE_LOGGING) {
            cfg.file_logging = parse_switch(&v);
        }
        if let Ok(v) = env::var(ENV_LOG_FILE_NAME) {
            if !v.is_empty() {
                cfg.file_name = Some(v);
            }
        }
        if let Ok(v) = env::var(ENV_LOG_FILE_PATH) {
            if !v.is_empty() {
                cfg.file_path = Some(v);
            }
        }
        if let Ok(v) = env::var(ENV_LOG_FILE_EXTN) {
            if !v.is_empty() {
                cfg.file_extension = Some(v);
            }
        }
        if let Ok(v) = env::var(ENV_FILE_SIZE) {
            cfg.max_file_size = parse_size(&v)?;
        }
        Ok(cfg)
    }
}

fn parse_switch(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1" | "on"
    )
}

/// Parses `FILE_SIZE` values like `8192`, `64K`, `2m`, `1G`. The result is
/// clamped up to [`MIN_FILE_SIZE`].
pub fn parse_size(value: &str) -> Result<u64, ConfigError> {
    let trimmed = value.trim();
    let invalid = || ConfigError::InvalidSize {
        value: value.to_owned(),
    };
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let (digits, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&trimmed[..trimmed.len() - 1], 1024u64),
        Some('M') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('G') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed, 1),
    };
    let base: u64 = digits.trim().parse().map_err(|_| invalid())?;
    let bytes = base.checked_mul(multiplier).ok_or_else(invalid)?;
    Ok(bytes.max(MIN_FILE_SIZE))
}

/// The sink selected by a [`LogConfig`].
#[derive(Debug)]
pub enum LogSink {
    File(FileSink),
    Console(ConsoleSink),
}

impl LogSink {
    pub fn flush(&self) {
        match self {
            Self::File(sink) => sink.flush(),
            Self::Console(sink) => sink.flush(),
        }
    }

    pub fn errors(&self) -> Vec<crate::logq::CapturedError> {
        match self {
            Self::File(sink) => sink.errors(),
            Self::Console(sink) => sink.errors(),
        }
    }
}

impl RecordWrite for LogSink {
    fn write_record(&self, record: &str) {
        match self {
            Self::File(sink) => sink.write_record(record),
            Self::Console(sink) => sink.write_record(record),
        }
    }

    fn write_direct(&self, record: &str) {
        match self {
            Self::File(sink) => sink.write_direct(record),
            Self::Console(sink) => sink.write_direct(record),
        }
    }
}

/// Builds the sink a configuration describes.
///
/// File logging without a file name aborts setup ([`ConfigError::MissingFileName`]);
/// a configured directory must already exist.
pub fn build_sink(cfg: &LogConfig) -> Result<LogSink, ConfigError> {
    if !cfg.file_logging {
        return Ok(LogSink::Console(ConsoleSink::new()));
    }
    let name = cfg
        .file_name
        .as_deref()
        .ok_or(ConfigError::MissingFileName)?;
    if let Some(dir) = cfg.file_path.as_deref() {
        if !Path::new(dir).is_dir() {
            return Err(ConfigError::PathMissing {
                path: PathBuf::from(dir),
            });
        }
    }
    let sink = FileSink::new(
        cfg.max_file_size.max(MIN_FILE_SIZE),
        name,
        cfg.file_path.as_deref().unwrap_or(""),
        cfg.file_extension.as_deref().unwrap_or(""),
    )?;
    Ok(LogSink::File(sink))
}

static DEFAULT_SINK: OnceLock<LogSink> = OnceLock::new();

/// Installs the process-wide default sink, once. Later calls return the
/// already-installed instance and ignore the new configuration.
pub fn init_default(cfg: &LogConfig) -> Result<&'static LogSink, ConfigError> {
    if let Some(existing) = DEFAULT_SINK.get() {
        return Ok(existing);
    }
    let sink = build_sink(cfg)?;
    Ok(DEFAULT_SINK.get_or_init(|| sink))
}

/// The default sink, if [`init_default`] has run.
pub fn default_sink() -> Option<&'static LogSink> {
    DEFAULT_SINK.get()
}
