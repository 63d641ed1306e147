//! Size-rotating, append-only file sink.
//!
//! # Rotation protocol
//!
//! Every produced write runs the same sequence the batch path relies on:
//!
//! 1. flush pending records (barrier);
//! 2. query the active file's size; when `size + incoming >= max`, rename it
//!    to `<stem>_<ddmmyyyy_HHMMSS><ext>` and recreate the active file;
//! 3. enqueue the record.
//!
//! A failed rename is captured in the pipeline's ledger and the write is
//! dropped — rotation failure must not grow the file past its limit.
//!
//! # Serialised file operations
//!
//! Every filesystem touch (create, delete, clear, rename, size query, read,
//! batch write) goes through one operation mutex held for the duration of
//! the operation, so at most one thread works on the backing file at a time.
//!
//! # Reads
//!
//! Reads flush first so the result reflects every record pushed before the
//! call. Byte ranges are half-open `[start, end)`; line ranges are 1-based
//! and inclusive on both ends.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read as _, Seek as _, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use memchr::memchr_iter;

use super::error::SinkError;
use super::pipeline::Pipeline;
use super::sink::{RecordWrite, SinkWriter};

/// Extension applied when the file name carries none and no override is
/// configured.
pub const DEFAULT_FILE_EXTENSION: &str = ".txt";

/// Mutable file identity, guarded by the operation mutex.
struct FileState {
    dir: PathBuf,
    /// Active file name, extension included.
    file_name: String,
    extension: String,
}

impl FileState {
    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// `<stem>_<stamp><ext>` next to the active file.
    fn rotated_name(&self, stamp: &str) -> String {
        let stem = self
            .file_name
            .strip_suffix(&self.extension)
            .unwrap_or(&self.file_name);
        format!("{stem}_{stamp}{}", self.extension)
    }
}

/// Drain-side writer plus the serialised file-operation state.
struct FileBackend {
    state: Mutex<FileState>,
    max_size: u64,
}

impl FileBackend {
    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().expect("file operation mutex poisoned")
    }

    fn size_locked(state: &FileState) -> Result<u64, SinkError> {
        match fs::metadata(state.path()) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(SinkError::io("file size query", err)),
        }
    }

    /// Rename-and-recreate once the size limit is hit.
    ///
    /// Second-resolution stamps can collide under rapid rotation; a numeric
    /// suffix keeps every rotated sibling, since no pushed record may be
    /// lost to an overwriting rename.
    fn rotate_locked(state: &mut FileState, stamp: &str) -> Result<(), SinkError> {
        let from = state.path();
        let mut to = state.dir.join(state.rotated_name(stamp));
        let mut n = 0u32;
        while to.exists() {
            n += 1;
            to = state.dir.join(state.rotated_name(&format!("{stamp}_{n}")));
        }
        fs::rename(&from, &to).map_err(|err| SinkError::Rotation {
            detail: format!("{} -> {}: {err}", from.display(), to.display()),
        })?;
        File::create(&from).map_err(|err| SinkError::io("recreate after rotation", err))?;
        Ok(())
    }
}

impl SinkWriter for FileBackend {
    fn write_batch(&self, batch: VecDeque<Box<str>>) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let state = self.lock();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(state.path())
            .map_err(|err| SinkError::io("open for append", err))?;
        let mut out = BufWriter::new(file);
        for record in &batch {
            out.write_all(record.as_bytes())
                .and_then(|()| out.write_all(b"\n"))
                .map_err(|err| SinkError::io("append record", err))?;
        }
        out.flush().map_err(|err| SinkError::io("flush batch", err))
    }
}

/// Normalises `(name, dir, extension)` into a file identity.
///
/// - a name without an extension gets the configured one (default `.txt`);
/// - a name with an extension keeps it, overriding the configured one;
/// - an empty dir falls back to the directory embedded in the name, else the
///   process's current directory.
fn normalise(name: &str, dir: &str, extension: &str) -> Result<FileState, SinkError> {
    let name_path = Path::new(name);
    let embedded_dir = name_path.parent().filter(|p| !p.as_os_str().is_empty());
    let bare_name = name_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (file_name, extension) = match bare_name.rfind('.') {
        // The actual extension wins over the configured one.
        Some(dot) if dot > 0 => (bare_name.clone(), bare_name[dot..].to_owned()),
        _ => {
            let ext = if extension.is_empty() {
                DEFAULT_FILE_EXTENSION.to_owned()
            } else {
                extension.to_owned()
            };
            (format!("{bare_name}{ext}"), ext)
        }
    };

    let dir = if !dir.is_empty() {
        PathBuf::from(dir)
    } else if let Some(embedded) = embedded_dir {
        embedded.to_path_buf()
    } else {
        std::env::current_dir().map_err(|err| SinkError::io("current dir", err))?
    };
    if !dir.is_dir() {
        return Err(SinkError::PathMissing { path: dir });
    }

    Ok(FileState {
        dir,
        file_name,
        extension,
    })
}

/// Append-only, size-rotating file sink over the asynchronous pipeline.
pub struct FileSink {
    backend: Arc<FileBackend>,
    pipeline: Pipeline,
}

impl FileSink {
    /// Creates a sink writing `name` under `dir`, rotating at `max_size`
    /// bytes. Empty `dir`/`extension` select the documented fallbacks; a
    /// missing directory fails with [`SinkError::PathMissing`].
    pub fn new(max_size: u64, name: &str, dir: &str, extension: &str) -> Result<Self, SinkError> {
        let state = normalise(name, dir, extension)?;
        let backend = Arc::new(FileBackend {
            state: Mutex::new(state),
            max_size,
        });
        let pipeline = Pipeline::new(Arc::clone(&backend) as Arc<dyn SinkWriter>);
        Ok(Self { backend, pipeline })
    }

    /// Path of the active file.
    pub fn path(&self) -> PathBuf {
        self.backend.lock().path()
    }

    /// Active file name, extension included.
    pub fn file_name(&self) -> String {
        self.backend.lock().file_name.clone()
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// True when the file is missing or holds no bytes. Flushes first.
    pub fn is_empty(&self) -> Result<bool, SinkError> {
        Ok(self.file_size()? == 0)
    }

    /// Size of the active file in bytes, after a flush.
    pub fn file_size(&self) -> Result<u64, SinkError> {
        self.pipeline.flush();
        let state = self.backend.lock();
        FileBackend::size_locked(&state)
    }

    /// Barrier flush of the pipeline.
    pub fn flush(&self) {
        self.pipeline.flush();
    }

    /// Captured sink errors, oldest first.
    pub fn errors(&self) -> Vec<super::error::CapturedError> {
        self.pipeline.errors()
    }

    /// Truncates the active file. Flushes first.
    pub fn clear_file(&self) -> Result<(), SinkError> {
        self.pipeline.flush();
        let state = self.backend.lock();
        File::create(state.path())
            .map(drop)
            .map_err(|err| SinkError::io("truncate", err))
    }

    /// Deletes the active file if present. Flushes first.
    pub fn delete_file(&self) -> Result<bool, SinkError> {
        self.pipeline.flush();
        let state = self.backend.lock();
        match fs::remove_file(state.path()) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(SinkError::io("delete", err)),
        }
    }

    /// Renames the active file; subsequent writes target the new name.
    /// Returns false (without touching anything) for an empty or unchanged
    /// name.
    pub fn rename_file(&self, new_name: &str) -> Result<bool, SinkError> {
        self.pipeline.flush();
        let mut state = self.backend.lock();
        if new_name.is_empty() || new_name == state.file_name {
            return Ok(false);
        }
        let from = state.path();
        let to = state.dir.join(new_name);
        fs::rename(&from, &to).map_err(|err| SinkError::io("rename", err))?;
        state.file_name = new_name.to_owned();
        if let Some(dot) = new_name.rfind('.').filter(|&d| d > 0) {
            state.extension = new_name[dot..].to_owned();
        }
        Ok(true)
    }

    /// Runs the rotation protocol for an incoming record of `incoming`
    /// bytes. Returns false when the write must be dropped.
    fn pre_write(&self, incoming: usize) -> bool {
        self.pipeline.flush();
        let mut state = self.backend.lock();
        let path = state.path();
        if !path.exists() {
            // Nothing to rotate yet; the first write brings the file into
            // existence.
            if let Err(err) = File::create(&path) {
                drop(state);
                self.pipeline
                    .capture_error(SinkError::io("create file", err));
                return false;
            }
            return true;
        }
        let size = match FileBackend::size_locked(&state) {
            Ok(size) => size,
            Err(err) => {
                drop(state);
                self.pipeline.capture_error(err);
                return false;
            }
        };
        if size + incoming as u64 >= self.backend.max_size {
            let stamp = crate::clock::local_time_str(crate::clock::ROTATION_TIME_FORMAT);
            if let Err(err) = FileBackend::rotate_locked(&mut state, &stamp) {
                drop(state);
                self.pipeline.capture_error(err);
                return false;
            }
        }
        true
    }

    /// Whole-file read, one entry per line. Flushes first.
    pub fn read_all(&self) -> Result<Vec<String>, SinkError> {
        self.pipeline.flush();
        let state = self.backend.lock();
        let bytes =
            fs::read(state.path()).map_err(|err| SinkError::io("read file", err))?;
        let mut lines = Vec::new();
        let mut start = 0;
        for nl in memchr_iter(b'\n', &bytes) {
            lines.push(String::from_utf8_lossy(&bytes[start..nl]).into_owned());
            start = nl + 1;
        }
        if start < bytes.len() {
            lines.push(String::from_utf8_lossy(&bytes[start..]).into_owned());
        }
        Ok(lines)
    }

    /// Reads the half-open byte range `[start, end)` of the active file.
    ///
    /// Out-of-range or inverted arguments fail with
    /// [`SinkError::RangeInvalid`], which is also recorded in the ledger; the
    /// file is untouched either way.
    pub fn read_byte_range(&self, start: u64, end: u64) -> Result<Vec<u8>, SinkError> {
        self.pipeline.flush();
        let state = self.backend.lock();
        let size = FileBackend::size_locked(&state)?;
        let check = if start > end {
            Err(format!("start {start} > end {end}"))
        } else if end > size {
            Err(format!("end {end} > file size {size}"))
        } else {
            Ok(())
        };
        if let Err(detail) = check {
            drop(state);
            self.pipeline.capture_error(SinkError::RangeInvalid {
                detail: detail.clone(),
            });
            return Err(SinkError::RangeInvalid { detail });
        }

        let mut file =
            File::open(state.path()).map_err(|err| SinkError::io("open for read", err))?;
        file.seek(SeekFrom::Start(start))
            .map_err(|err| SinkError::io("seek", err))?;
        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf)
            .map_err(|err| SinkError::io("read range", err))?;
        Ok(buf)
    }

    /// Reads lines `first..=last` (1-based, both ends inclusive).
    ///
    /// An inverted range fails with [`SinkError::RangeInvalid`] (recorded);
    /// a `last` past the end of the file simply stops there.
    pub fn read_line_range(&self, first: usize, last: usize) -> Result<Vec<String>, SinkError> {
        if first == 0 || first > last {
            let detail = format!("line range {first}..={last} (1-based)");
            self.pipeline.capture_error(SinkError::RangeInvalid {
                detail: detail.clone(),
            });
            return Err(SinkError::RangeInvalid { detail });
        }
        let all = self.read_all()?;
        if first > all.len() {
            return Ok(Vec::new());
        }
        let end = last.min(all.len());
        Ok(all[first - 1..end].to_vec())
    }
}

impl RecordWrite for FileSink {
    /// Rotation check, then enqueue. The record is dropped (and the failure
    /// recorded) when rotation was needed but did not succeed.
    fn write_record(&self, record: &str) {
        if record.is_empty() {
            return;
        }
        if self.pre_write(record.len()) {
            self.pipeline.push(record);
        }
    }

    fn write_direct(&self, record: &str) {
        self.write_record(record);
        self.pipeline.flush();
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("path", &self.path())
            .field("max_size", &self.backend.max_size)
            .finish()
    }
}
