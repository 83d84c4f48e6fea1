use bytes::{Buf, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

// A hard ceiling on buffered input. CLUSTER SLOTS replies and write acks
// are tiny; anything near this limit means a desynced stream.
const MAX_BUFFERED: usize = 64 * 1024 * 1024;

/// An incremental RESP decoder.
///
/// Feed raw socket bytes with [`append`](Decoder::append), then call
/// [`decode`](Decoder::decode) until it returns `Ok(None)` (more input
/// needed). Partial frames are left in the buffer untouched, so a decode
/// attempt never consumes bytes it cannot finish.
///
/// # Example
///
/// ```
/// use shardpipe::proto::codec::Decoder;
/// use shardpipe::proto::frame::Frame;
///
/// let mut dec = Decoder::new();
/// dec.append(b"+OK\r\n");
/// assert_eq!(dec.decode().unwrap(), Some(Frame::SimpleString(b"OK".to_vec())));
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    buf: BytesMut,
}

impl Decoder {
    /// Creates a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes received from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Discards any buffered, not-yet-decoded input.
    ///
    /// Used when a batch is torn down and stray reply bytes must not leak
    /// into the next user of the connection.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Returns true if no input is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Attempts to decode one complete frame from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed and
    /// [`Error::Protocol`] when the input is malformed.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() > MAX_BUFFERED {
            return Err(Error::Protocol {
                message: "input buffer exceeded maximum frame size".to_string(),
            });
        }
        // Parse against a scratch view; only commit consumed bytes once a
        // whole frame (arrays included) turned out to be complete.
        let mut pos = 0;
        match parse_frame(&self.buf, &mut pos)? {
            Some(frame) => {
                self.buf.advance(pos);
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

fn parse_frame(buf: &[u8], pos: &mut usize) -> Result<Option<Frame>> {
    let Some((marker, line)) = take_line(buf, pos)? else {
        return Ok(None);
    };
    match marker {
        b'+' => Ok(Some(Frame::SimpleString(line))),
        b'-' => Ok(Some(Frame::Error(line))),
        b':' => Ok(Some(Frame::Integer(parse_int(&line)?))),
        b'$' => parse_bulk(buf, pos, parse_int(&line)?),
        b'*' => parse_array(buf, pos, parse_int(&line)?),
        other => Err(Error::Protocol {
            message: format!("unknown frame marker: {}", other as char),
        }),
    }
}

fn parse_bulk(buf: &[u8], pos: &mut usize, len: i64) -> Result<Option<Frame>> {
    if len == -1 {
        return Ok(Some(Frame::BulkString(None)));
    }
    let len = usize::try_from(len).map_err(|_| Error::Protocol {
        message: format!("invalid bulk string length: {}", len),
    })?;
    if buf.len() < *pos + len + 2 {
        return Ok(None);
    }
    let data = BytesMut::from(&buf[*pos..*pos + len]).freeze();
    *pos += len + 2;
    Ok(Some(Frame::BulkString(Some(data))))
}

fn parse_array(buf: &[u8], pos: &mut usize, len: i64) -> Result<Option<Frame>> {
    if len == -1 {
        return Ok(Some(Frame::Null));
    }
    let len = usize::try_from(len).map_err(|_| Error::Protocol {
        message: format!("invalid array length: {}", len),
    })?;
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        match parse_frame(buf, pos)? {
            Some(frame) => items.push(frame),
            None => return Ok(None),
        }
    }
    Ok(Some(Frame::Array(items)))
}

/// Takes the next `\r\n`-terminated line starting at `pos`, returning its
/// marker byte and payload, or `None` if the line is still incomplete.
fn take_line(buf: &[u8], pos: &mut usize) -> Result<Option<(u8, Vec<u8>)>> {
    let rest = &buf[*pos..];
    if rest.len() < 3 {
        return Ok(None);
    }
    let marker = rest[0];
    for i in 1..rest.len() - 1 {
        if rest[i] == b'\r' && rest[i + 1] == b'\n' {
            let line = rest[1..i].to_vec();
            *pos += i + 2;
            return Ok(Some((marker, line)));
        }
    }
    Ok(None)
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::Protocol {
            message: format!("invalid integer: {:?}", String::from_utf8_lossy(line)),
        })
}
