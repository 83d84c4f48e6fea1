//! # Shardpipe
//!
//! Pipelined bulk writes for Redis Cluster. Commands are routed to the
//! shard owning their key's slot, buffered per shard connection, and
//! flushed in one round trip per shard.
//!
//! The crate deliberately keeps the batching model explicit: a
//! [`Pipeline`] accumulates commands without touching the network, and
//! [`Pipeline::sync`] flushes every buffered command and drains all
//! replies in submission order. Redirects (`MOVED`/`ASK`) are surfaced as
//! typed errors; a `MOVED` reply additionally refreshes the topology
//! snapshot exactly once per flush so the caller can resubmit against the
//! corrected slot map. There is no automatic retry.
//!
//! ## Example
//!
//! ```no_run
//! use shardpipe::ClusterClient;
//!
//! #[tokio::main]
//! async fn main() -> shardpipe::Result<()> {
//!     let client = ClusterClient::connect("127.0.0.1:7000,127.0.0.1:7001").await?;
//!     let mut pipe = client.pipeline();
//!
//!     pipe.hmset("user:1", [("name", "a"), ("age", "30")]).await?;
//!     pipe.expire("user:1", 60).await?;
//!     let replies = pipe.sync().await?;
//!     assert_eq!(replies.len(), 2);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod commands;
pub mod proto;

mod builder;
mod client;
mod connection;
mod pipeline;
mod pool;
mod redirect;
mod slot;
mod topology;

pub use crate::builder::ClusterClientBuilder;
pub use crate::client::ClusterClient;
pub use crate::connection::Connection;
pub use crate::pipeline::{PendingReply, Pipeline};
pub use crate::proto::error::{Error, Result};
pub use crate::proto::frame::Frame;
pub use crate::slot::{key_slot, SLOT_COUNT};
pub use crate::topology::{ShardAddr, SlotRange, Topology};
