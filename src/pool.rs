//! Per-shard connection reuse.
//!
//! The pool keeps idle, already-authenticated connections per shard.
//! [`NodePool::checkout`] hands ownership of a connection to the caller
//! (dialing a fresh one when no idle connection exists);
//! [`NodePool::checkin`] returns it for later reuse. The pool itself is
//! internally synchronized, so multiple batches may check out distinct
//! connections to the same shard concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::builder::ClusterConfig;
use crate::commands;
use crate::connection::Connection;
use crate::proto::error::{Error, Result};
use crate::topology::ShardAddr;

pub(crate) struct NodePool {
    config: Arc<ClusterConfig>,
    idle: Mutex<HashMap<ShardAddr, Vec<Connection<TcpStream>>>>,
}

impl NodePool {
    pub(crate) fn new(config: Arc<ClusterConfig>) -> Self {
        Self {
            config,
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Takes an idle connection for `addr`, dialing a new one if none is
    /// pooled. Dialing applies the configured connect timeout and
    /// authenticates when credentials are set.
    pub(crate) async fn checkout(&self, addr: &ShardAddr) -> Result<Connection<TcpStream>> {
        if let Some(conn) = self.idle.lock().await.get_mut(addr).and_then(Vec::pop) {
            debug!(shard = %addr, "reusing pooled connection");
            return Ok(conn);
        }
        self.dial(addr).await
    }

    /// Returns a connection for later reuse; closes it instead when the
    /// shard already holds the configured number of idle connections.
    pub(crate) async fn checkin(&self, addr: ShardAddr, conn: Connection<TcpStream>) {
        let mut idle = self.idle.lock().await;
        let bucket = idle.entry(addr).or_default();
        if bucket.len() < self.config.max_idle_per_shard {
            bucket.push(conn);
        }
        // Dropping the connection closes the socket.
    }

    async fn dial(&self, addr: &ShardAddr) -> Result<Connection<TcpStream>> {
        debug!(shard = %addr, "dialing shard");
        let target = format!("{}:{}", addr.host, addr.port);
        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| Error::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", target),
                ),
            })??;

        let mut conn = Connection::new(stream)
            .with_timeouts(self.config.read_timeout, self.config.write_timeout);

        if let Some(password) = &self.config.password {
            let cmd = commands::auth(self.config.username.as_deref(), password);
            conn.write_frame(&cmd.into_frame()).await?;
            if conn.read_frame().await?.is_error() {
                return Err(Error::Auth);
            }
        }

        Ok(conn)
    }
}

impl std::fmt::Debug for NodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePool").finish_non_exhaustive()
    }
}
