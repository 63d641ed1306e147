//! Standard-output sink with an inspectable test mode.
//!
//! Normal mode emits each batched record as one stdout line, flushed per
//! line; `BrokenPipe` is silently ignored, the standard behaviour for a
//! process whose reader exits early. Test mode redirects the batch into a
//! capture buffer — the pipeline is deliberately asynchronous, and the
//! buffer is what makes its drain observable from a test.
//!
//! Eager flush after every produced record is the default (a record headed
//! for the console is often a warning someone is waiting on) but it is a
//! latency-over-throughput policy knob, not a mandate: disable it with
//! [`ConsoleSink::with_eager_flush`] to restore batching.

use std::collections::VecDeque;
use std::io::{self, Write as _};
use std::sync::{Arc, Mutex};

use super::error::SinkError;
use super::pipeline::Pipeline;
use super::sink::{RecordWrite, SinkWriter};

enum ConsoleTarget {
    Stdout,
    Capture(String),
}

struct ConsoleBackend {
    target: Mutex<ConsoleTarget>,
}

impl SinkWriter for ConsoleBackend {
    fn write_batch(&self, batch: VecDeque<Box<str>>) -> Result<(), SinkError> {
        let mut target = self.target.lock().expect("console mutex poisoned");
        match &mut *target {
            ConsoleTarget::Stdout => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                for record in &batch {
                    let res = out
                        .write_all(record.as_bytes())
                        .and_then(|()| out.write_all(b"\n"))
                        .and_then(|()| out.flush());
                    if let Err(err) = res {
                        if err.kind() == io::ErrorKind::BrokenPipe {
                            return Ok(());
                        }
                        return Err(SinkError::io("stdout write", err));
                    }
                }
                Ok(())
            }
            ConsoleTarget::Capture(buf) => {
                for record in &batch {
                    buf.push_str(record);
                    buf.push('\n');
                }
                Ok(())
            }
        }
    }
}

/// Console sink over the asynchronous pipeline.
pub struct ConsoleSink {
    backend: Arc<ConsoleBackend>,
    pipeline: Pipeline,
    eager_flush: bool,
}

impl ConsoleSink {
    /// Stdout sink with eager flushing.
    pub fn new() -> Self {
        Self::with_target(ConsoleTarget::Stdout)
    }

    /// Capture-mode sink for tests; inspect with
    /// [`take_captured`](Self::take_captured).
    pub fn for_testing() -> Self {
        Self::with_target(ConsoleTarget::Capture(String::new()))
    }

    fn with_target(target: ConsoleTarget) -> Self {
        let backend = Arc::new(ConsoleBackend {
            target: Mutex::new(target),
        });
        let pipeline = Pipeline::new(Arc::clone(&backend) as Arc<dyn SinkWriter>);
        Self {
            backend,
            pipeline,
            eager_flush: true,
        }
    }

    /// Disables (or re-enables) the flush-per-record policy.
    pub fn with_eager_flush(mut self, eager: bool) -> Self {
        self.eager_flush = eager;
        self
    }

    /// Barrier flush of the pipeline.
    pub fn flush(&self) {
        self.pipeline.flush();
    }

    /// Captured sink errors, oldest first.
    pub fn errors(&self) -> Vec<super::error::CapturedError> {
        self.pipeline.errors()
    }

    /// Drains the test-mode capture buffer. Flushes first so everything
    /// pushed before the call is visible. Empty in stdout mode.
    pub fn take_captured(&self) -> String {
        self.pipeline.flush();
        let mut target = self.backend.target.lock().expect("console mutex poisoned");
        match &mut *target {
            ConsoleTarget::Capture(buf) => std::mem::take(buf),
            ConsoleTarget::Stdout => String::new(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordWrite for ConsoleSink {
    fn write_record(&self, record: &str) {
        if record.is_empty() {
            return;
        }
        self.pipeline.push(record);
        if self.eager_flush {
            self.pipeline.flush();
        }
    }

    fn write_direct(&self, record: &str) {
        if record.is_empty() {
            return;
        }
        self.pipeline.push(record);
        self.pipeline.flush();
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("eager_flush", &self.eager_flush)
            .finish()
    }
}
