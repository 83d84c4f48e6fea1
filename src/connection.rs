//! A single framed connection to a shard.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// A connection speaking RESP over an async byte stream.
///
/// Besides the plain request/response pair
/// ([`write_frame`](Connection::write_frame) /
/// [`read_frame`](Connection::read_frame)), the connection supports the
/// batching the pipeline is built on: [`queue_frame`](Connection::queue_frame)
/// encodes a command into a local outbound buffer without any socket I/O,
/// and [`flush_queued`](Connection::flush_queued) writes the whole buffer
/// at once. Until `flush_queued` runs, nothing queued has touched the
/// network, so discarding an aborted batch is purely a memory operation.
pub struct Connection<S> {
    stream: S,
    decoder: Decoder,
    outbound: Encoder,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<S> Connection<S> {
    /// Wraps a stream with no timeouts configured.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            outbound: Encoder::new(),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Configures read and write timeouts. `None` disables the timeout.
    pub fn with_timeouts(
        mut self,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Encodes a frame into the outbound buffer. No socket I/O happens.
    pub fn queue_frame(&mut self, frame: &Frame) {
        trace!(?frame, "queueing frame");
        self.outbound.encode(frame);
    }

    /// Returns true if queued frames are waiting to be flushed.
    pub fn has_queued(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Drops every queued-but-unflushed frame.
    pub fn clear_queued(&mut self) {
        self.outbound.clear();
    }

    /// Drops any buffered input bytes that were never decoded.
    pub fn discard_input(&mut self) {
        self.decoder.clear();
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes every queued frame to the socket in one burst.
    pub async fn flush_queued(&mut self) -> Result<()> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        let data = self.outbound.take();
        trace!(bytes = data.len(), "flushing queued frames");
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream.write_all(&data))
                .await
                .map_err(|_| timed_out("write"))??,
            None => self.stream.write_all(&data).await?,
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Queues a frame and flushes immediately (single request).
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.queue_frame(frame);
        self.flush_queued().await
    }

    /// Reads the next complete frame, blocking until one arrives.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.decode()? {
                trace!(?frame, "received frame");
                return Ok(frame);
            }
            let mut buf = [0u8; 4096];
            let n = match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, self.stream.read(&mut buf))
                    .await
                    .map_err(|_| timed_out("read"))??,
                None => self.stream.read(&mut buf).await?,
            };
            if n == 0 {
                return Err(Error::Protocol {
                    message: "connection closed by peer".to_string(),
                });
            }
            self.decoder.append(&buf[..n]);
        }
    }
}

fn timed_out(op: &str) -> Error {
    Error::Io {
        source: io::Error::new(io::ErrorKind::TimedOut, format!("{} timed out", op)),
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("queued", &self.has_queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_request_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let server_barrier = barrier.clone();
        let server = async move {
            server_barrier.wait().await;
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let frame = conn.read_frame().await.unwrap();
            assert_eq!(
                frame,
                Frame::Array(vec![Frame::BulkString(Some("PING".into()))])
            );
            conn.write_frame(&Frame::SimpleString(b"PONG".to_vec()))
                .await
                .unwrap();
        };

        let client = async {
            barrier.wait().await;
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut conn = Connection::new(stream);
            conn.write_frame(&Frame::Array(vec![Frame::BulkString(Some("PING".into()))]))
                .await
                .unwrap();
            assert_eq!(
                conn.read_frame().await.unwrap(),
                Frame::SimpleString(b"PONG".to_vec())
            );
        };

        tokio::join!(server, client);
    }

    #[tokio::test]
    async fn test_queued_frames_stay_local_until_flush() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            // Both frames arrive only after the single flush.
            assert_eq!(conn.read_frame().await.unwrap(), Frame::Integer(1));
            assert_eq!(conn.read_frame().await.unwrap(), Frame::Integer(2));
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream);
        conn.queue_frame(&Frame::Integer(1));
        conn.queue_frame(&Frame::Integer(2));
        assert!(conn.has_queued());
        conn.flush_queued().await.unwrap();
        assert!(!conn.has_queued());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_queued_discards_without_io() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream);
        conn.queue_frame(&Frame::Integer(42));
        conn.clear_queued();
        assert!(!conn.has_queued());
        // Flushing after clear is a no-op.
        conn.flush_queued().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout_fires() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _guard = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn =
            Connection::new(stream).with_timeouts(Some(Duration::from_millis(50)), None);
        match conn.read_frame().await {
            Err(Error::Io { source }) => assert_eq!(source.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
