//! Classification of Redis Cluster error replies.
//!
//! Cluster shards answer misrouted commands with redirection errors:
//! `MOVED <slot> <host>:<port>` when slot ownership changed permanently,
//! `ASK <slot> <host>:<port>` while a slot is mid-migration, and
//! `CLUSTERDOWN ...` when the cluster cannot serve at all. Everything
//! else is an ordinary server error.

use crate::proto::error::Error;

/// Converts a raw error reply payload into a typed [`Error`].
pub fn classify_error_reply(raw: &[u8]) -> Error {
    let msg = String::from_utf8_lossy(raw);
    let msg = msg.trim();

    if let Some(rest) = msg.strip_prefix("MOVED ") {
        if let Some((slot, address)) = split_redirect(rest) {
            return Error::Moved { slot, address };
        }
    }
    if let Some(rest) = msg.strip_prefix("ASK ") {
        if let Some((slot, address)) = split_redirect(rest) {
            return Error::Ask { slot, address };
        }
    }
    if msg.starts_with("CLUSTERDOWN") {
        return Error::ClusterDown;
    }

    Error::Server {
        message: msg.to_string(),
    }
}

/// Splits `"<slot> <host>:<port>"` redirect arguments.
fn split_redirect(rest: &str) -> Option<(u16, String)> {
    let mut parts = rest.split_whitespace();
    let slot = parts.next()?.parse::<u16>().ok()?;
    let address = parts.next()?.to_string();
    if parts.next().is_some() {
        return None;
    }
    Some((slot, address))
}
