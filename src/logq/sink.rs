//! The two seams of the sink pipeline.
//!
//! [`SinkWriter`] is the drain-side contract: the background thread hands a
//! whole batch to the terminal writer, which owns its own lock around the
//! backing medium. [`RecordWrite`] is the producer-side surface shared by
//! every concrete sink: text records plus the fixed-width binary overloads.

use std::collections::VecDeque;

use super::error::SinkError;
use super::record::{bits16, bits32, bits64, bits8};

/// Drain-side terminal writer.
///
/// Called from the pipeline's drain thread with a batch in push order. The
/// implementation serialises access to its backing medium; the pipeline's
/// queue lock is never held across this call. A returned error is captured
/// in the pipeline's ledger; it does not stop the stream.
pub trait SinkWriter: Send + Sync + 'static {
    fn write_batch(&self, batch: VecDeque<Box<str>>) -> Result<(), SinkError>;
}

/// Producer-side write surface shared by the concrete sinks.
///
/// The binary overloads encode each value as its fixed-width bit-string
/// representation and push it as a single record; slice overloads iterate.
pub trait RecordWrite {
    /// Pushes one text record into the sink's pipeline.
    fn write_record(&self, record: &str);

    /// Pushes-and-flushes: the synchronous variant for records that must
    /// reach the backing medium before the call returns.
    fn write_direct(&self, record: &str);

    fn write_u8(&self, v: u8) {
        self.write_record(&bits8(v));
    }

    fn write_u16(&self, v: u16) {
        self.write_record(&bits16(v));
    }

    fn write_u32(&self, v: u32) {
        self.write_record(&bits32(v));
    }

    fn write_u64(&self, v: u64) {
        self.write_record(&bits64(v));
    }

    fn write_u8_slice(&self, vs: &[u8]) {
        for &v in vs {
            self.write_u8(v);
        }
    }

    fn write_u16_slice(&self, vs: &[u16]) {
        for &v in vs {
            self.write_u16(v);
        }
    }

    fn write_u32_slice(&self, vs: &[u32]) {
        for &v in vs {
            self.write_u32(v);
        }
    }

    fn write_u64_slice(&self, vs: &[u64]) {
        for &v in vs {
            self.write_u64(v);
        }
    }

    /// Pushes every record in the slice, in order.
    fn write_all(&self, records: &[&str]) {
        for record in records {
            self.write_record(record);
        }
    }
}
