//! Cluster client: seed management, topology cache, and direct commands.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::builder::{ClusterClientBuilder, ClusterConfig};
use crate::commands::{self, Cmd};
use crate::pipeline::Pipeline;
use crate::pool::NodePool;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;
use crate::redirect::classify_error_reply;
use crate::slot::key_slot;
use crate::topology::{ShardAddr, Topology};

/// A Redis Cluster client with slot-based routing and an explicit,
/// publicly refreshable topology cache.
///
/// Cloning is cheap; clones share the topology snapshot and the
/// connection pool. Use [`pipeline`](ClusterClient::pipeline) to batch
/// writes; the direct commands here each cost one round trip.
#[derive(Clone)]
pub struct ClusterClient {
    seeds: Arc<Vec<ShardAddr>>,
    topology: Arc<RwLock<Arc<Topology>>>,
    pool: Arc<NodePool>,
}

impl ClusterClient {
    /// Connects using comma-separated seed addresses and discovers the
    /// initial topology.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty or malformed seed
    /// list and [`Error::ClusterUnavailable`] when no seed answers the
    /// topology query.
    pub async fn connect(addresses: &str) -> Result<Self> {
        Self::connect_with(addresses, ClusterConfig::default()).await
    }

    /// Returns a builder for non-default connection settings.
    pub fn builder() -> ClusterClientBuilder {
        ClusterClientBuilder::new()
    }

    pub(crate) async fn connect_with(addresses: &str, config: ClusterConfig) -> Result<Self> {
        let seeds = parse_seeds(addresses)?;
        let client = Self {
            seeds: Arc::new(seeds),
            topology: Arc::new(RwLock::new(Arc::new(Topology::default()))),
            pool: Arc::new(NodePool::new(Arc::new(config))),
        };
        client.refresh_topology().await?;
        Ok(client)
    }

    /// Returns the current topology snapshot.
    ///
    /// The snapshot is immutable; it stays valid (if possibly stale)
    /// while a refresh replaces the cached one.
    pub async fn current_topology(&self) -> Arc<Topology> {
        self.topology.read().await.clone()
    }

    /// Reloads the slot-to-shard mapping from the live cluster and
    /// atomically replaces the cached snapshot.
    ///
    /// Seeds are tried first, then every shard of the current snapshot;
    /// the first one to answer `CLUSTER SLOTS` wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClusterUnavailable`] when no candidate answers.
    pub async fn refresh_topology(&self) -> Result<()> {
        let mut candidates: Vec<ShardAddr> = self.seeds.as_ref().clone();
        for shard in self.current_topology().await.shards() {
            if !candidates.contains(shard) {
                candidates.push(shard.clone());
            }
        }

        for addr in &candidates {
            match self.fetch_topology(addr).await {
                Ok(topology) => {
                    debug!(shard = %addr, ranges = topology.ranges().len(), "topology refreshed");
                    *self.topology.write().await = Arc::new(topology);
                    return Ok(());
                }
                Err(err) => {
                    warn!(shard = %addr, error = %err, "topology query failed");
                }
            }
        }
        Err(Error::ClusterUnavailable)
    }

    async fn fetch_topology(&self, addr: &ShardAddr) -> Result<Topology> {
        let mut conn = self.pool.checkout(addr).await?;
        conn.write_frame(&commands::cluster_slots().into_frame())
            .await?;
        let reply = conn.read_frame().await?;
        if let Frame::Error(raw) = reply {
            // Connection is still in sync; keep it.
            self.pool.checkin(addr.clone(), conn).await;
            return Err(classify_error_reply(&raw));
        }
        let topology = Topology::from_cluster_slots(reply)?;
        self.pool.checkin(addr.clone(), conn).await;
        Ok(topology)
    }

    /// Resolves the shard owning `slot` in the current snapshot.
    pub(crate) async fn shard_for_slot(&self, slot: u16) -> Result<ShardAddr> {
        self.current_topology()
            .await
            .shard_for_slot(slot)
            .cloned()
            .ok_or_else(|| Error::Protocol {
                message: format!("no shard owns slot {}", slot),
            })
    }

    pub(crate) fn pool(&self) -> &NodePool {
        &self.pool
    }

    /// Starts an empty pipeline bound to this client.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.clone())
    }

    /// Fetches the hash's field/value pairs with `HGETALL`.
    pub async fn hgetall(&self, key: &str) -> Result<Vec<(Bytes, Bytes)>> {
        let reply = self.execute(key, commands::hgetall(key.to_string())).await?;
        commands::frame_to_pairs(reply)
    }

    /// Returns the key's remaining time to live in seconds: -1 without
    /// an expiry, -2 for a missing key.
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let reply = self.execute(key, commands::ttl(key.to_string())).await?;
        commands::frame_to_int(reply)
    }

    /// Deletes the key, returning the number of keys removed.
    pub async fn del(&self, key: &str) -> Result<i64> {
        let reply = self.execute(key, commands::del(key.to_string())).await?;
        commands::frame_to_int(reply)
    }

    /// Routes one command by its key and performs a single round trip.
    ///
    /// Redirection errors are surfaced as-is; unlike the pipeline flush
    /// path, direct commands never trigger a topology refresh.
    async fn execute(&self, key: &str, cmd: Cmd) -> Result<Frame> {
        let slot = key_slot(key.as_bytes());
        let addr = self.shard_for_slot(slot).await?;
        let mut conn = self.pool.checkout(&addr).await?;

        let outcome = async {
            conn.write_frame(&cmd.into_frame()).await?;
            conn.read_frame().await
        }
        .await;

        match outcome {
            Ok(Frame::Error(raw)) => {
                self.pool.checkin(addr, conn).await;
                Err(classify_error_reply(&raw))
            }
            Ok(frame) => {
                self.pool.checkin(addr, conn).await;
                Ok(frame)
            }
            // IO/protocol failure leaves the stream position unknown;
            // drop the connection rather than pooling it.
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("seeds", &self.seeds)
            .finish_non_exhaustive()
    }
}

/// Parses a comma-separated seed list. Plain `host:port` entries and
/// `redis://host:port` URLs are both accepted.
fn parse_seeds(addresses: &str) -> Result<Vec<ShardAddr>> {
    let mut seeds = Vec::new();
    for part in addresses.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let addr = if part.contains("://") {
            let parsed = url::Url::parse(part).map_err(|_| Error::InvalidArgument {
                message: format!("invalid seed URL: {:?}", part),
            })?;
            if parsed.scheme() != "redis" {
                return Err(Error::InvalidArgument {
                    message: format!("unsupported scheme in seed: {:?}", part),
                });
            }
            let host = parsed.host_str().ok_or_else(|| Error::InvalidArgument {
                message: format!("seed URL missing host: {:?}", part),
            })?;
            ShardAddr::new(host, parsed.port().unwrap_or(6379))
        } else {
            part.parse()?
        };
        seeds.push(addr);
    }
    if seeds.is_empty() {
        return Err(Error::InvalidArgument {
            message: "no seed addresses provided".to_string(),
        });
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seeds_plain() {
        let seeds = parse_seeds("127.0.0.1:7000,127.0.0.1:7001").unwrap();
        assert_eq!(
            seeds,
            vec![
                ShardAddr::new("127.0.0.1", 7000),
                ShardAddr::new("127.0.0.1", 7001),
            ]
        );
    }

    #[test]
    fn test_parse_seeds_url() {
        let seeds = parse_seeds("redis://10.0.0.1:7002").unwrap();
        assert_eq!(seeds, vec![ShardAddr::new("10.0.0.1", 7002)]);
    }

    #[test]
    fn test_parse_seeds_url_default_port() {
        let seeds = parse_seeds("redis://10.0.0.1").unwrap();
        assert_eq!(seeds, vec![ShardAddr::new("10.0.0.1", 6379)]);
    }

    #[test]
    fn test_parse_seeds_rejects_empty() {
        assert!(matches!(
            parse_seeds(""),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_seeds(" , "),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_seeds_rejects_bad_scheme() {
        assert!(parse_seeds("http://10.0.0.1:7000").is_err());
    }

    #[test]
    fn test_parse_seeds_tolerates_whitespace() {
        let seeds = parse_seeds("  127.0.0.1:7000 , 127.0.0.1:7001  ").unwrap();
        assert_eq!(seeds.len(), 2);
    }
}
