use std::io;

use thiserror::Error;

/// Result type alias for shardpipe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by cluster routing, pooling, and batch flushing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred (dialing a shard, socket read/write, timeout).
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer sent bytes the RESP decoder could not make sense of, or a
    /// reply had an unexpected shape.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server returned an ordinary error reply.
    #[error("server error: {message}")]
    Server {
        /// Error message from the server.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed")]
    Auth,

    /// Invalid argument provided (bad seed string, empty seed list).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Slot ownership moved permanently to another shard.
    ///
    /// The flush path refreshes the topology snapshot once before
    /// propagating this; the caller must resubmit the affected commands.
    #[error("MOVED slot {slot} to {address}")]
    Moved {
        /// The slot number (0-16383).
        slot: u16,
        /// The shard now owning the slot (e.g. "127.0.0.1:7001").
        address: String,
    },

    /// Slot is mid-migration; the contacted shard issued a transient
    /// redirect. Propagated without a topology refresh.
    #[error("ASK slot {slot} at {address}")]
    Ask {
        /// The slot number (0-16383).
        slot: u16,
        /// The shard temporarily serving the slot.
        address: String,
    },

    /// The cluster reported itself down.
    #[error("CLUSTERDOWN cluster is down")]
    ClusterDown,

    /// A topology refresh exhausted every known shard without an answer.
    #[error("cluster unavailable: no shard answered a topology query")]
    ClusterUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_io() {
        let err = Error::from(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_display_moved() {
        let err = Error::Moved {
            slot: 3999,
            address: "127.0.0.1:7001".to_string(),
        };
        assert_eq!(err.to_string(), "MOVED slot 3999 to 127.0.0.1:7001");
    }

    #[test]
    fn test_display_ask() {
        let err = Error::Ask {
            slot: 42,
            address: "127.0.0.1:7002".to_string(),
        };
        assert_eq!(err.to_string(), "ASK slot 42 at 127.0.0.1:7002");
    }

    #[test]
    fn test_display_cluster_unavailable() {
        assert!(Error::ClusterUnavailable.to_string().contains("no shard"));
    }

    #[test]
    fn test_from_io() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, Error::Io { .. }));
    }
}
