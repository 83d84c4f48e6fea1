//! Slot-routed command batching.
//!
//! A [`Pipeline`] accumulates commands locally, grouped by the shard
//! that owns each key's slot. Nothing is written to any socket until
//! [`sync`](Pipeline::sync), which flushes every shard's queue in one
//! burst, reads the replies back in submission order, and returns the
//! held connections to the pool.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::client::ClusterClient;
use crate::commands::{self, Cmd};
use crate::connection::Connection;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;
use crate::redirect::classify_error_reply;
use crate::slot::key_slot;
use crate::topology::ShardAddr;

/// A receipt for one submitted command.
///
/// Its [`index`](PendingReply::index) is the command's position in the
/// batch, which is also the position of its reply in the `Vec` that
/// [`Pipeline::sync`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    index: usize,
    shard: ShardAddr,
}

impl PendingReply {
    /// Zero-based submission position within the current batch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The shard this command was routed to.
    pub fn shard(&self) -> &ShardAddr {
        &self.shard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Idle,
    Filling,
}

/// A batch of commands routed per shard and flushed together.
///
/// # Example
///
/// ```no_run
/// use shardpipe::ClusterClient;
///
/// # #[tokio::main]
/// # async fn main() -> shardpipe::Result<()> {
/// let client = ClusterClient::connect("127.0.0.1:7000").await?;
/// let mut pipe = client.pipeline();
/// for i in 0..1000u32 {
///     let key = format!("user:{}", i);
///     pipe.hmset(&key, [("age", "30")]).await?;
///     pipe.expire(&key, 60).await?;
/// }
/// let replies = pipe.sync().await?;
/// assert_eq!(replies.len(), 2000);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    client: ClusterClient,
    conns: HashMap<ShardAddr, Connection<TcpStream>>,
    pending: Vec<ShardAddr>,
    state: BatchState,
}

impl Pipeline {
    pub(crate) fn new(client: ClusterClient) -> Self {
        Self {
            client,
            conns: HashMap::new(),
            pending: Vec::new(),
            state: BatchState::Idle,
        }
    }

    /// Number of commands queued in the current batch.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of shard connections the batch currently holds.
    pub fn held_connections(&self) -> usize {
        self.conns.len()
    }

    /// Returns true when no commands are queued.
    pub fn is_idle(&self) -> bool {
        self.state == BatchState::Idle
    }

    /// Queues a command routed by `key`. The command is encoded into the
    /// owning shard's local buffer; no network I/O happens until
    /// [`sync`](Pipeline::sync).
    ///
    /// # Errors
    ///
    /// Fails when the key's slot has no owner in the current topology
    /// snapshot or when a first connection to the owning shard cannot be
    /// established.
    pub async fn submit(&mut self, key: &str, cmd: Cmd) -> Result<PendingReply> {
        let slot = key_slot(key.as_bytes());
        let shard = self.client.shard_for_slot(slot).await?;

        if !self.conns.contains_key(&shard) {
            let conn = self.client.pool().checkout(&shard).await?;
            self.conns.insert(shard.clone(), conn);
        }
        let conn = self.conns.get_mut(&shard).ok_or_else(|| Error::Protocol {
            message: "connection map out of sync".to_string(),
        })?;
        conn.queue_frame(&cmd.into_frame());

        let reply = PendingReply {
            index: self.pending.len(),
            shard: shard.clone(),
        };
        self.pending.push(shard);
        self.state = BatchState::Filling;
        Ok(reply)
    }

    /// Queues `HMSET key field value [field value ...]`.
    pub async fn hmset<F, V>(
        &mut self,
        key: &str,
        fields: impl IntoIterator<Item = (F, V)>,
    ) -> Result<PendingReply>
    where
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        self.submit(key, commands::hmset(key.to_string(), fields))
            .await
    }

    /// Queues `EXPIRE key seconds`.
    pub async fn expire(&mut self, key: &str, seconds: u64) -> Result<PendingReply> {
        self.submit(key, commands::expire(key.to_string(), seconds))
            .await
    }

    /// Flushes every shard's queued commands and collects the replies in
    /// submission order.
    ///
    /// On success every held connection is returned to the pool and the
    /// pipeline is empty again. On the first failure the batch is
    /// abandoned: collected replies are discarded, the remaining replies
    /// already on the wire are drained best-effort so pooled connections
    /// stay in protocol sync, and the error is returned. A `MOVED`
    /// redirect additionally triggers exactly one topology refresh before
    /// returning; the batch itself is never retried. An `ASK` redirect
    /// and a `CLUSTERDOWN` reply surface without touching the topology.
    #[tracing::instrument(skip(self), fields(commands = self.pending.len(), shards = self.conns.len()))]
    pub async fn sync(&mut self) -> Result<Vec<Frame>> {
        if self.pending.is_empty() {
            self.state = BatchState::Idle;
            return Ok(Vec::new());
        }
        debug!("flushing batch");

        let mut expected: HashMap<ShardAddr, usize> = HashMap::new();
        for shard in &self.pending {
            *expected.entry(shard.clone()).or_insert(0) += 1;
        }

        let mut failure: Option<Error> = None;
        let mut flushed: Vec<ShardAddr> = Vec::new();
        let mut dead: Vec<ShardAddr> = Vec::new();

        // One write burst per shard.
        for (shard, conn) in self.conns.iter_mut() {
            if !conn.has_queued() {
                continue;
            }
            match conn.flush_queued().await {
                Ok(()) => flushed.push(shard.clone()),
                Err(err) => {
                    warn!(shard = %shard, error = %err, "batch flush failed");
                    dead.push(shard.clone());
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }

        // Replies come back per shard in the order that shard received
        // its commands, so walking the submission log and reading from
        // each command's shard reconstructs global submission order.
        let mut replies = Vec::with_capacity(self.pending.len());
        let mut consumed: HashMap<ShardAddr, usize> = HashMap::new();
        let mut needs_refresh = false;

        if failure.is_none() {
            for shard in &self.pending {
                let conn = match self.conns.get_mut(shard) {
                    Some(conn) => conn,
                    None => break,
                };
                match conn.read_frame().await {
                    Ok(Frame::Error(raw)) => {
                        *consumed.entry(shard.clone()).or_insert(0) += 1;
                        let err = classify_error_reply(&raw);
                        if matches!(err, Error::Moved { .. }) {
                            needs_refresh = true;
                        }
                        failure = Some(err);
                        break;
                    }
                    Ok(frame) => {
                        *consumed.entry(shard.clone()).or_insert(0) += 1;
                        replies.push(frame);
                    }
                    Err(err) => {
                        warn!(shard = %shard, error = %err, "batch read failed");
                        dead.push(shard.clone());
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        if failure.is_some() {
            // Drain replies still in flight so reused connections do not
            // hand a stale reply to the next batch. Cleanup errors are
            // logged and swallowed; the original failure is what the
            // caller sees.
            for shard in &flushed {
                if dead.contains(shard) {
                    continue;
                }
                let Some(conn) = self.conns.get_mut(shard) else {
                    continue;
                };
                let remaining = expected.get(shard).copied().unwrap_or(0)
                    - consumed.get(shard).copied().unwrap_or(0);
                for _ in 0..remaining {
                    if let Err(err) = conn.read_frame().await {
                        warn!(shard = %shard, error = %err, "batch drain failed");
                        dead.push(shard.clone());
                        break;
                    }
                }
            }
        }

        // Release connections: clean ones go back to the pool, failed
        // ones are closed by dropping them.
        for (shard, mut conn) in self.conns.drain() {
            if dead.contains(&shard) {
                continue;
            }
            conn.clear_queued();
            conn.discard_input();
            self.client.pool().checkin(shard, conn).await;
        }
        self.pending.clear();
        self.state = BatchState::Idle;

        if needs_refresh {
            if let Err(err) = self.client.refresh_topology().await {
                warn!(error = %err, "topology refresh after redirect failed");
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(replies),
        }
    }

    /// Discards every queued command without sending it and returns the
    /// held connections to the pool. Calling this on an empty pipeline is
    /// a no-op; the pipeline stays usable for a new batch afterwards.
    pub async fn close(&mut self) {
        for (shard, mut conn) in self.conns.drain() {
            conn.clear_queued();
            conn.discard_input();
            self.client.pool().checkin(shard, conn).await;
        }
        self.pending.clear();
        self.state = BatchState::Idle;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pending", &self.pending.len())
            .field("shards", &self.conns.len())
            .field("state", &self.state)
            .finish()
    }
}
