//! Error types for the sink pipeline and its terminal writers, plus the
//! captured-error ledger that outlives individual write attempts.
//!
//! A sink write failure never terminates the pipeline: it is converted to a
//! [`CapturedError`] (message plus capture-time timestamp and thread id) and
//! appended to the pipeline's ledger. The ledger is flushed to a fixed-name
//! file when the pipeline shuts down.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::clock::{local_time_str, DEFAULT_TIME_FORMAT};

/// Errors from sink construction, writes, and reads.
#[derive(Debug)]
#[non_exhaustive]
pub enum SinkError {
    /// I/O failure on the backing medium.
    Io { context: &'static str, source: io::Error },
    /// The active file hit its size limit but could not be rotated.
    Rotation { detail: String },
    /// Byte/line range out of bounds or inverted.
    RangeInvalid { detail: String },
    /// The sink's directory does not exist.
    PathMissing { path: PathBuf },
}

impl SinkError {
    /// Creates an I/O variant with a short operation label.
    #[inline]
    pub fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Rotation { detail } => write!(f, "rotation failed: {detail}"),
            Self::RangeInvalid { detail } => write!(f, "invalid range: {detail}"),
            Self::PathMissing { path } => {
                write!(f, "directory does not exist: {}", path.display())
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A sink failure frozen at its origin site.
///
/// No error object is kept alive or rethrown later (the original design
/// stored rethrowable exception pointers); the message and context are
/// captured as plain text the moment the failure happens.
#[derive(Clone, Debug)]
pub struct CapturedError {
    /// Local time at capture, `yyyymmdd_HHMMSS`.
    pub timestamp: String,
    /// Debug rendering of the capturing thread's id.
    pub thread: String,
    /// Rendered error message.
    pub message: String,
}

impl CapturedError {
    pub(crate) fn now(err: &SinkError) -> Self {
        Self {
            timestamp: local_time_str(DEFAULT_TIME_FORMAT),
            thread: format!("{:?}", std::thread::current().id()),
            message: err.to_string(),
        }
    }

    /// One ledger-file line: `|<timestamp>|<thread>|>> <message>` + newline.
    pub(crate) fn ledger_line(&self) -> String {
        format!("|{}|{}|>> {}\n", self.timestamp, self.thread, self.message)
    }
}
