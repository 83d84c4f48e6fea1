use bytes::Bytes;

/// A RESP (Redis Serialization Protocol) frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (`+OK`).
    SimpleString(Vec<u8>),
    /// Error reply (`-MOVED 3999 127.0.0.1:7001`).
    Error(Vec<u8>),
    /// Integer (`:1000`).
    Integer(i64),
    /// Bulk string (`$6\r\nfoobar`); `None` is the null bulk string.
    BulkString(Option<Bytes>),
    /// Array of frames (`*2\r\n...`).
    Array(Vec<Frame>),
    /// Null array (`*-1`).
    Null,
}

impl Frame {
    /// Returns true if this frame is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }
}
