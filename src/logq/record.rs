//! Record chunking and fixed-width binary encodings.
//!
//! Queued records are text chunks of at most [`RECORD_CAP`] bytes. Oversized
//! records are split on `char` boundaries so no chunk carries a torn UTF-8
//! sequence. Binary values travel as ASCII bit-strings (`8`/`16`/`32`/`64`
//! characters of `'0'`/`'1'`), one chunk per value.

use std::collections::VecDeque;

/// Maximum payload bytes per queued chunk (4 KiB).
pub const RECORD_CAP: usize = 4096;

/// Queue length at which producers signal the drain thread.
pub const BATCH_SIGNAL_LEN: usize = 256;

/// Splits `data` into chunks of at most [`RECORD_CAP`] bytes, appended to
/// `out`. Empty input produces nothing.
pub(crate) fn chunk_record(data: &str, out: &mut VecDeque<Box<str>>) {
    let mut rest = data;
    while !rest.is_empty() {
        let take = floor_char_boundary(rest, RECORD_CAP.min(rest.len()));
        // A char is at most 4 bytes, so take only hits 0 on empty input.
        debug_assert!(take > 0);
        let (head, tail) = rest.split_at(take);
        out.push_back(Box::from(head));
        rest = tail;
    }
}

/// Largest index `<= at` that lands on a char boundary.
fn floor_char_boundary(s: &str, mut at: usize) -> usize {
    while at > 0 && !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// 8-bit value as an 8-char bit-string.
pub fn bits8(v: u8) -> String {
    format!("{v:08b}")
}

/// 16-bit value as a 16-char bit-string.
pub fn bits16(v: u16) -> String {
    format!("{v:016b}")
}

/// 32-bit value as a 32-char bit-string.
pub fn bits32(v: u32) -> String {
    format!("{v:032b}")
}

/// 64-bit value as a 64-char bit-string.
pub fn bits64(v: u64) -> String {
    format!("{v:064b}")
}
