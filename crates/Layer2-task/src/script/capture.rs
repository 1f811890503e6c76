//! Bounded output capture
//!
//! The reader keeps draining the pipe after the budget is exhausted so the
//! child never blocks on a full pipe; excess bytes are discarded, not kept.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 8 * 1024;

/// Byte-capped buffer shared between a pipe reader and the run supervisor
#[derive(Debug, Clone)]
pub struct OutputCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    limit: usize,
    dropped: Arc<AtomicUsize>,
}

impl OutputCapture {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::new())),
            limit,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append what fits; count the rest as dropped
    pub fn push(&self, chunk: &[u8]) {
        let mut buf = self.buf.lock();
        let room = self.limit.saturating_sub(buf.len());
        let take = room.min(chunk.len());
        buf.extend_from_slice(&chunk[..take]);
        if take < chunk.len() {
            self.dropped.fetch_add(chunk.len() - take, Ordering::Relaxed);
        }
    }

    /// Read `reader` to EOF
    pub async fn drain_from<R>(&self, mut reader: R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            self.push(&chunk[..n]);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().is_empty()
    }

    /// Bytes discarded past the limit
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Captured bytes as text; invalid UTF-8 is replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_limit() {
        let capture = OutputCapture::new(5);
        capture.push(b"abc");
        capture.push(b"defgh");
        assert_eq!(capture.text(), "abcde");
        assert_eq!(capture.dropped(), 3);

        capture.push(b"zzz");
        assert_eq!(capture.len(), 5);
        assert_eq!(capture.dropped(), 6);
    }

    #[tokio::test]
    async fn test_drain_reads_to_eof() {
        let data = vec![b'x'; 3 * CHUNK_SIZE];
        let capture = OutputCapture::new(CHUNK_SIZE);
        capture.drain_from(&data[..]).await.unwrap();

        assert_eq!(capture.len(), CHUNK_SIZE);
        assert_eq!(capture.dropped(), 2 * CHUNK_SIZE);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let capture = OutputCapture::new(16);
        capture.push(&[b'o', b'k', 0xff]);
        assert_eq!(capture.text(), "ok\u{fffd}");
    }
}
