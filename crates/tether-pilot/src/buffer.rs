//! Shared capture buffer for one output stream.
//!
//! A drainer thread appends raw chunks while any number of observers take
//! snapshots. Each append updates the byte log and the decoded text under a
//! single write lock, so a snapshot always sees a consistent prefix of the
//! stream and never half of a chunk.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    bytes: Vec<u8>,
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence (at most 3).
    pending: Vec<u8>,
}

/// A cloneable handle to a lock-protected byte and text accumulator.
///
/// Clones share the same storage. UTF-8 sequences split across chunk
/// boundaries are held back from the text view until the rest arrives, so a
/// multi-byte character read in two pieces decodes correctly.
#[derive(Debug, Clone, Default)]
pub struct SyncBuffer {
    inner: Arc<RwLock<Inner>>,
}

impl SyncBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of raw bytes and its decoded text atomically.
    pub fn append(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut inner = self.write();
        inner.bytes.extend_from_slice(chunk);

        let mut data = std::mem::take(&mut inner.pending);
        data.extend_from_slice(chunk);
        let mut rest: &[u8] = &data;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    inner.text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix decodes.
                    inner.text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            inner.text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            inner.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Flush a dangling incomplete UTF-8 sequence into the text view.
    ///
    /// Called once the stream has ended and no continuation bytes can arrive.
    pub fn finish(&self) {
        let mut inner = self.write();
        if !inner.pending.is_empty() {
            let pending = std::mem::take(&mut inner.pending);
            inner.text.push_str(&String::from_utf8_lossy(&pending));
        }
    }

    /// Everything decoded so far.
    pub fn snapshot_text(&self) -> String {
        self.read().text.clone()
    }

    /// Every raw byte appended so far.
    pub fn snapshot_bytes(&self) -> Vec<u8> {
        self.read().bytes.clone()
    }

    /// Number of raw bytes captured.
    pub fn len(&self) -> usize {
        self.read().bytes.len()
    }

    /// Whether nothing has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.read().bytes.is_empty()
    }

    /// Discard everything captured so far.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.bytes.clear();
        inner.text.clear();
        inner.pending.clear();
    }

    // A panicking reader cannot leave the data half-written (appends complete
    // under the lock), so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn appends_accumulate_in_order() {
        let buf = SyncBuffer::new();
        buf.append(b"hel");
        buf.append(b"lo ");
        buf.append(b"world");
        assert_eq!(buf.snapshot_text(), "hello world");
        assert_eq!(buf.snapshot_bytes(), b"hello world");
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn empty_append_is_ignored() {
        let buf = SyncBuffer::new();
        buf.append(b"");
        assert!(buf.is_empty());
    }

    #[test]
    fn split_multibyte_character_decodes_once_complete() {
        let buf = SyncBuffer::new();
        let snowman = "\u{2603}".as_bytes();
        buf.append(&snowman[..1]);
        assert_eq!(buf.snapshot_text(), "");
        buf.append(&snowman[1..]);
        assert_eq!(buf.snapshot_text(), "\u{2603}");
        assert_eq!(buf.snapshot_bytes(), snowman);
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let buf = SyncBuffer::new();
        buf.append(b"ok\xffdone");
        assert_eq!(buf.snapshot_text(), "ok\u{fffd}done");
    }

    #[test]
    fn finish_flushes_dangling_sequence() {
        let buf = SyncBuffer::new();
        buf.append(b"tail\xe2\x98");
        assert_eq!(buf.snapshot_text(), "tail");
        buf.finish();
        assert_eq!(buf.snapshot_text(), "tail\u{fffd}");
    }

    #[test]
    fn clear_resets_both_views() {
        let buf = SyncBuffer::new();
        buf.append(b"data\xe2");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.snapshot_text(), "");
        buf.append(b"x");
        assert_eq!(buf.snapshot_text(), "x");
    }

    #[test]
    fn clones_share_storage() {
        let buf = SyncBuffer::new();
        let other = buf.clone();
        other.append(b"shared");
        assert_eq!(buf.snapshot_text(), "shared");
    }

    #[test]
    fn concurrent_readers_only_see_whole_chunks() {
        let buf = SyncBuffer::new();
        let chunk = b"abcdefgh";
        let writer = {
            let buf = buf.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    buf.append(chunk);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buf = buf.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let text = buf.snapshot_text();
                        assert_eq!(text.len() % chunk.len(), 0, "torn snapshot");
                        assert!(text.starts_with("abcdefgh") || text.is_empty());
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(buf.len(), 2000 * chunk.len());
        assert_eq!(buf.snapshot_text(), "abcdefgh".repeat(2000));
    }
}
