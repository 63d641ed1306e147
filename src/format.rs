//! Log-record line formatting: severity tags, marker symbols, and the
//! single-line layout the sink pipeline receives.
//!
//! The formatter is deliberately dumb: it maps a structured record to one
//! newline-terminated text line and nothing else. Field layout:
//!
//! ```text
//! [<timestamp>][T:<thread>][<SEV>][<file>:<line>][<function>] <marker> <message>
//! ```
//!
//! with an optional ` | assert: <condition>` tail for assertion records.

use std::fmt::Write as _;
use std::thread::ThreadId;

use crate::clock::{local_time_str, DEFAULT_TIME_FORMAT};

/// Default marker: prefixed to ordinary messages of every severity.
pub const FORWARD_ANGLE: &str = ">";
/// Marker for entry/list-style records.
pub const FORWARD_ANGLES: &str = ">>";
/// Marker for returning/exit-style records.
pub const BACKWARD_ANGLES: &str = "<<";
/// Same glyphs as [`FORWARD_ANGLES`]; the duplication is inherited from the
/// first implementation of this layout and is kept for compatibility.
pub const BACKWARD_ANGLE: &str = ">>";

/// Record severity, in rough order of urgency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Info,
    Warn,
    Debug,
    Fatal,
    Important,
    Assert,
    Default,
}

impl Severity {
    /// Short uppercase tag used in formatted lines.
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Error => "ERR",
            Severity::Info => "INF",
            Severity::Warn => "WARN",
            Severity::Debug => "DBG",
            Severity::Fatal => "FATAL",
            Severity::Important => "IMP",
            Severity::Assert => "ASRT",
            Severity::Default => "DEFAULT",
        }
    }

    /// Parses a tag back into a severity. Unknown or empty tags map to
    /// [`Severity::Default`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ERR" => Severity::Error,
            "INF" => Severity::Info,
            "WARN" => Severity::Warn,
            "DBG" => Severity::Debug,
            "FATAL" => Severity::Fatal,
            "IMP" => Severity::Important,
            "ASRT" => Severity::Assert,
            _ => Severity::Default,
        }
    }
}

/// One structured log record, borrowed from the call site.
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub file: &'a str,
    pub function: &'a str,
    pub line: u32,
    pub thread_id: ThreadId,
    pub severity: Severity,
    pub marker: &'a str,
    pub message: &'a str,
    /// Present only for assertion records: the stringified condition.
    pub assert_condition: Option<&'a str>,
}

/// Renders a record into the single text line the pipeline consumes.
///
/// The returned string always ends in `\n`.
pub fn format_line(rec: &LogRecord<'_>) -> String {
    let mut line = String::with_capacity(96 + rec.message.len());
    let _ = write!(
        line,
        "[{}][T:{:?}][{}][{}:{}][{}] {} {}",
        local_time_str(DEFAULT_TIME_FORMAT),
        rec.thread_id,
        rec.severity.tag(),
        rec.file,
        rec.line,
        rec.function,
        rec.marker,
        rec.message,
    );
    if let Some(cond) = rec.assert_condition {
        let _ = write!(line, " | assert: {cond}");
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample<'a>(msg: &'a str, cond: Option<&'a str>) -> LogRecord<'a> {
        LogRecord {
            file: "pool/core.rs",
            function: "worker_loop",
            line: 42,
            thread_id: thread::current().id(),
            severity: Severity::Info,
            marker: FORWARD_ANGLE,
            message: msg,
            assert_condition: cond,
        }
    }

    #[test]
    fn severity_tags_round_trip() {
        for sev in [
            Severity::Error,
            Severity::Info,
            Severity::Warn,
            Severity::Debug,
            Severity::Fatal,
            Severity::Important,
            Severity::Assert,
            Severity::Default,
        ] {
            assert_eq!(Severity::from_tag(sev.tag()), sev);
        }
        assert_eq!(Severity::from_tag("nonsense"), Severity::Default);
    }

    #[test]
    fn line_is_newline_terminated_and_carries_fields() {
        let line = format_line(&sample("pool started", None));
        assert!(line.ends_with('\n'));
        assert!(line.contains("[INF]"));
        assert!(line.contains("[pool/core.rs:42]"));
        // Ordinary records carry the single-angle default marker.
        assert!(line.contains("] > pool started"));
        assert!(!line.contains(">> pool started"));
        assert!(!line.contains("assert:"));
    }

    #[test]
    fn assert_condition_is_appended() {
        let line = format_line(&sample("invariant broken", Some("queued <= outstanding")));
        assert!(line.contains("| assert: queued <= outstanding"));
    }

    #[test]
    fn marker_constants_keep_inherited_values() {
        assert_eq!(FORWARD_ANGLE, ">");
        assert_eq!(FORWARD_ANGLES, BACKWARD_ANGLE);
        assert_ne!(FORWARD_ANGLES, BACKWARD_ANGLES);
        assert_ne!(FORWARD_ANGLE, FORWARD_ANGLES);
    }
}
