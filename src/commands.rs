//! Command construction and reply conversion helpers.

use bytes::Bytes;

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// A Redis command under construction.
///
/// # Example
///
/// ```
/// use shardpipe::commands::Cmd;
///
/// let cmd = Cmd::new("EXPIRE").arg("user:1").arg("60");
/// let frame = cmd.into_frame();
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Starts a command with the given name.
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Converts the command into its RESP array frame.
    pub fn into_frame(self) -> Frame {
        Frame::Array(
            self.args
                .into_iter()
                .map(|arg| Frame::BulkString(Some(arg)))
                .collect(),
        )
    }
}

/// `HMSET key field value [field value ...]`.
pub fn hmset<K, F, V>(key: K, fields: impl IntoIterator<Item = (F, V)>) -> Cmd
where
    K: Into<Bytes>,
    F: Into<Bytes>,
    V: Into<Bytes>,
{
    let mut cmd = Cmd::new("HMSET").arg(key);
    for (field, value) in fields {
        cmd = cmd.arg(field).arg(value);
    }
    cmd
}

/// `EXPIRE key seconds`.
pub fn expire(key: impl Into<Bytes>, seconds: u64) -> Cmd {
    Cmd::new("EXPIRE").arg(key).arg(seconds.to_string())
}

/// `HGETALL key`.
pub fn hgetall(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("HGETALL").arg(key)
}

/// `TTL key`.
pub fn ttl(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("TTL").arg(key)
}

/// `DEL key`.
pub fn del(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Builds the `CLUSTER SLOTS` topology discovery query.
pub fn cluster_slots() -> Cmd {
    Cmd::new("CLUSTER").arg("SLOTS")
}

/// `AUTH password` or `AUTH username password`.
pub fn auth(username: Option<&str>, password: &str) -> Cmd {
    match username {
        Some(user) => Cmd::new("AUTH")
            .arg(user.to_string())
            .arg(password.to_string()),
        None => Cmd::new("AUTH").arg(password.to_string()),
    }
}

/// Extracts an integer reply, surfacing server errors.
pub fn frame_to_int(frame: Frame) -> Result<i64> {
    match frame {
        Frame::Integer(n) => Ok(n),
        Frame::Error(raw) => Err(crate::redirect::classify_error_reply(&raw)),
        other => Err(Error::Protocol {
            message: format!("expected integer reply, got {:?}", other),
        }),
    }
}

/// Extracts a flat field/value array (the `HGETALL` reply shape).
pub fn frame_to_pairs(frame: Frame) -> Result<Vec<(Bytes, Bytes)>> {
    let items = match frame {
        Frame::Array(items) => items,
        Frame::Null => Vec::new(),
        Frame::Error(raw) => return Err(crate::redirect::classify_error_reply(&raw)),
        other => {
            return Err(Error::Protocol {
                message: format!("expected array reply, got {:?}", other),
            })
        }
    };
    if items.len() % 2 != 0 {
        return Err(Error::Protocol {
            message: "field/value reply has odd element count".to_string(),
        });
    }
    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        match (field, value) {
            (Frame::BulkString(Some(field)), Frame::BulkString(Some(value))) => {
                pairs.push((field, value));
            }
            (field, _) => {
                return Err(Error::Protocol {
                    message: format!("non-bulk entry in field/value reply: {:?}", field),
                })
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(frame: Frame) -> Vec<Bytes> {
        let Frame::Array(items) = frame else {
            panic!("command frame must be an array");
        };
        items
            .into_iter()
            .map(|f| match f {
                Frame::BulkString(Some(b)) => b,
                other => panic!("command args must be bulk strings, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_hmset_frame() {
        let cmd = hmset("user:1", [("age", "30"), ("name", "a")]);
        assert_eq!(
            args(cmd.into_frame()),
            vec![
                Bytes::from("HMSET"),
                Bytes::from("user:1"),
                Bytes::from("age"),
                Bytes::from("30"),
                Bytes::from("name"),
                Bytes::from("a"),
            ]
        );
    }

    #[test]
    fn test_expire_frame() {
        let cmd = expire("user:1", 60);
        assert_eq!(
            args(cmd.into_frame()),
            vec![Bytes::from("EXPIRE"), Bytes::from("user:1"), Bytes::from("60")]
        );
    }

    #[test]
    fn test_cluster_slots_frame() {
        assert_eq!(
            args(cluster_slots().into_frame()),
            vec![Bytes::from("CLUSTER"), Bytes::from("SLOTS")]
        );
    }

    #[test]
    fn test_auth_frames() {
        assert_eq!(
            args(auth(None, "secret").into_frame()),
            vec![Bytes::from("AUTH"), Bytes::from("secret")]
        );
        assert_eq!(
            args(auth(Some("admin"), "secret").into_frame()),
            vec![
                Bytes::from("AUTH"),
                Bytes::from("admin"),
                Bytes::from("secret")
            ]
        );
    }

    #[test]
    fn test_frame_to_int() {
        assert_eq!(frame_to_int(Frame::Integer(60)).unwrap(), 60);
        assert!(frame_to_int(Frame::Null).is_err());
        assert!(matches!(
            frame_to_int(Frame::Error(b"ERR nope".to_vec())),
            Err(Error::Server { .. })
        ));
    }

    #[test]
    fn test_frame_to_pairs() {
        let frame = Frame::Array(vec![
            Frame::BulkString(Some(Bytes::from("age"))),
            Frame::BulkString(Some(Bytes::from("30"))),
        ]);
        assert_eq!(
            frame_to_pairs(frame).unwrap(),
            vec![(Bytes::from("age"), Bytes::from("30"))]
        );
    }

    #[test]
    fn test_frame_to_pairs_odd_count() {
        let frame = Frame::Array(vec![Frame::BulkString(Some(Bytes::from("age")))]);
        assert!(frame_to_pairs(frame).is_err());
    }

    #[test]
    fn test_frame_to_pairs_empty() {
        assert!(frame_to_pairs(Frame::Array(Vec::new())).unwrap().is_empty());
    }
}
