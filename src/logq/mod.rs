//! Asynchronous sink pipeline: bounded record buffering, a background drain
//! thread, and the terminal writers it feeds.
//!
//! Producers push text records (or fixed-width binary encodings) through
//! [`RecordWrite`]; the pipeline batches them and a single drain thread
//! hands batches to the configured [`SinkWriter`] — a size-rotating file
//! ([`FileSink`]) or standard output ([`ConsoleSink`]). Write failures are
//! captured, never thrown at producers, and flushed to a fixed-name ledger
//! file at shutdown.

pub mod console;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod record;
pub mod sink;

pub use console::ConsoleSink;
pub use error::{CapturedError, SinkError};
pub use file::{FileSink, DEFAULT_FILE_EXTENSION};
pub use pipeline::{Pipeline, ERROR_LEDGER_FILE};
pub use record::{bits16, bits32, bits64, bits8, BATCH_SIGNAL_LEN, RECORD_CAP};
pub use sink::{RecordWrite, SinkWriter};
