//! Background readers that keep a subject's output streams flowing.
//!
//! A subject that writes more than the OS pipe or PTY buffer holds blocks
//! until someone reads. Each output stream therefore gets a dedicated thread
//! that reads fixed-size chunks and appends them to a [`SyncBuffer`] until the
//! stream ends.

use std::io::{ErrorKind, Read};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::buffer::SyncBuffer;

const CHUNK_SIZE: usize = 4096;
const JOIN_POLL: Duration = Duration::from_millis(5);

/// A running drain thread for one stream.
pub struct Drainer {
    name: &'static str,
    handle: Option<JoinHandle<u64>>,
}

impl Drainer {
    /// Start draining `reader` into `buffer` on a new thread.
    ///
    /// `name` identifies the stream in logs (`"stdout"`, `"stderr"`). With
    /// `trace_chunks` set, every chunk is logged at debug level.
    pub fn spawn<R>(
        name: &'static str,
        reader: R,
        buffer: SyncBuffer,
        trace_chunks: bool,
    ) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("tether-{name}"))
            .spawn(move || drain(name, reader, &buffer, trace_chunks))?;
        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    /// Whether the stream has ended and the thread is done.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait up to `timeout` for the stream to end, without joining.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(JOIN_POLL);
        }
        true
    }

    /// Join the thread, waiting at most `timeout`.
    ///
    /// Returns the number of bytes drained. If the stream is still open when
    /// the timeout expires (for example a grandchild inherited it), the thread
    /// is detached and `None` is returned.
    pub fn join(&mut self, timeout: Duration) -> Option<u64> {
        if !self.wait(timeout) {
            warn!(stream = self.name, ?timeout, "drainer still running, detaching");
            self.handle.take();
            return None;
        }
        match self.handle.take()?.join() {
            Ok(total) => Some(total),
            Err(_) => {
                warn!(stream = self.name, "drainer thread panicked");
                None
            }
        }
    }
}

/// Read `reader` to the end, appending every chunk to `buffer`.
///
/// Read errors end the loop like EOF does: a closing process tears its
/// streams down, and on Linux the PTY master reports `EIO` once the child side
/// is gone.
fn drain<R: Read>(name: &'static str, mut reader: R, buffer: &SyncBuffer, trace_chunks: bool) -> u64 {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.append(&chunk[..n]);
                total += n as u64;
                if trace_chunks {
                    debug!(
                        stream = name,
                        bytes = n,
                        text = %String::from_utf8_lossy(&chunk[..n]),
                        "captured output"
                    );
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(stream = name, error = %e, "stream closed with error");
                break;
            }
        }
    }
    buffer.finish();
    debug!(stream = name, total, "stream drained");
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Yields the given chunks one read at a time, then an error.
    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
        fail_with: Option<ErrorKind>,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return match self.fail_with.take() {
                    Some(kind) => Err(io::Error::new(kind, "closed")),
                    None => Ok(0),
                };
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn drains_reader_to_eof() {
        let buffer = SyncBuffer::new();
        let data = vec![b'x'; CHUNK_SIZE * 3 + 17];
        let mut drainer =
            Drainer::spawn("stdout", Cursor::new(data.clone()), buffer.clone(), false).unwrap();
        assert_eq!(drainer.join(Duration::from_secs(5)), Some(data.len() as u64));
        assert_eq!(buffer.snapshot_bytes(), data);
    }

    #[test]
    fn preserves_chunk_order() {
        let buffer = SyncBuffer::new();
        let reader = ChunkedReader {
            chunks: vec![b"one ".to_vec(), b"two ".to_vec(), b"three".to_vec()],
            fail_with: None,
        };
        let mut drainer = Drainer::spawn("stdout", reader, buffer.clone(), true).unwrap();
        drainer.join(Duration::from_secs(5));
        assert_eq!(buffer.snapshot_text(), "one two three");
    }

    #[test]
    fn io_error_ends_stream_normally() {
        let buffer = SyncBuffer::new();
        let reader = ChunkedReader {
            chunks: vec![b"partial".to_vec()],
            fail_with: Some(ErrorKind::BrokenPipe),
        };
        let mut drainer = Drainer::spawn("stderr", reader, buffer.clone(), false).unwrap();
        assert_eq!(drainer.join(Duration::from_secs(5)), Some(7));
        assert_eq!(buffer.snapshot_text(), "partial");
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let buffer = SyncBuffer::new();
        let reader = ChunkedReader {
            chunks: vec![b"before".to_vec()],
            fail_with: Some(ErrorKind::Interrupted),
        };
        // After the Interrupted error the reader reports EOF.
        let mut drainer = Drainer::spawn("stdout", reader, buffer.clone(), false).unwrap();
        assert_eq!(drainer.join(Duration::from_secs(5)), Some(6));
    }

    #[test]
    fn split_utf8_across_reads_is_flushed_at_eof() {
        let buffer = SyncBuffer::new();
        let reader = ChunkedReader {
            chunks: vec![b"caf\xc3".to_vec(), b"\xa9 ok".to_vec(), b"\xe2".to_vec()],
            fail_with: None,
        };
        let mut drainer = Drainer::spawn("stdout", reader, buffer.clone(), false).unwrap();
        drainer.join(Duration::from_secs(5));
        assert_eq!(buffer.snapshot_text(), "caf\u{e9} ok\u{fffd}");
    }

    #[test]
    fn join_times_out_on_a_stream_that_never_ends() {
        struct Blocking;
        impl Read for Blocking {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                thread::sleep(Duration::from_secs(3600));
                Ok(0)
            }
        }

        let mut drainer = Drainer::spawn("stdout", Blocking, SyncBuffer::new(), false).unwrap();
        let started = Instant::now();
        assert_eq!(drainer.join(Duration::from_millis(100)), None);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(drainer.is_finished(), "detached drainer counts as finished");
    }
}
