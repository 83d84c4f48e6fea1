use bytes::{BufMut, BytesMut};

use crate::proto::frame::Frame;

/// A RESP encoder that serializes [`Frame`]s into an accumulating buffer.
///
/// Frames are only appended; nothing is written to any socket here. The
/// pipeline relies on this to queue many commands per shard and flush
/// them in one write via [`take`](Encoder::take).
///
/// # Example
///
/// ```
/// use shardpipe::proto::codec::Encoder;
/// use shardpipe::proto::frame::Frame;
///
/// let mut enc = Encoder::new();
/// enc.encode(&Frame::SimpleString(b"OK".to_vec()));
/// assert_eq!(enc.take().as_ref(), b"+OK\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates an encoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one frame to the buffer in RESP wire format.
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => self.put_line(b'+', s),
            Frame::Error(e) => self.put_line(b'-', e),
            Frame::Integer(n) => self.put_line(b':', n.to_string().as_bytes()),
            Frame::BulkString(Some(data)) => {
                self.put_line(b'$', data.len().to_string().as_bytes());
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::BulkString(None) => self.buf.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                self.put_line(b'*', items.len().to_string().as_bytes());
                for item in items {
                    self.encode(item);
                }
            }
            Frame::Null => self.buf.extend_from_slice(b"*-1\r\n"),
        }
    }

    fn put_line(&mut self, marker: u8, payload: &[u8]) {
        self.buf.put_u8(marker);
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Drains the accumulated bytes, leaving the encoder reusable.
    pub fn take(&mut self) -> BytesMut {
        self.buf.split()
    }

    /// Discards everything queued so far without writing it anywhere.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_encode_simple_string() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::SimpleString(b"OK".to_vec()));
        assert_eq!(enc.take().as_ref(), b"+OK\r\n");
    }

    #[test]
    fn test_encode_error() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::Error(b"ERR boom".to_vec()));
        assert_eq!(enc.take().as_ref(), b"-ERR boom\r\n");
    }

    #[test]
    fn test_encode_integer() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::Integer(-7));
        assert_eq!(enc.take().as_ref(), b":-7\r\n");
    }

    #[test]
    fn test_encode_bulk_string() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::BulkString(Some(Bytes::from("hello"))));
        assert_eq!(enc.take().as_ref(), b"$5\r\nhello\r\n");
    }

    #[test]
    fn test_encode_null_bulk_string() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::BulkString(None));
        assert_eq!(enc.take().as_ref(), b"$-1\r\n");
    }

    #[test]
    fn test_encode_array() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::Array(vec![
            Frame::BulkString(Some(Bytes::from("HMSET"))),
            Frame::BulkString(Some(Bytes::from("key"))),
        ]));
        assert_eq!(enc.take().as_ref(), b"*2\r\n$5\r\nHMSET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn test_accumulates_across_frames() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::Integer(1));
        enc.encode(&Frame::Integer(2));
        assert_eq!(enc.take().as_ref(), b":1\r\n:2\r\n");
        assert!(enc.is_empty());
    }

    #[test]
    fn test_clear_discards() {
        let mut enc = Encoder::new();
        enc.encode(&Frame::Integer(1));
        enc.clear();
        assert!(enc.is_empty());
        assert_eq!(enc.take().len(), 0);
    }
}
