use std::time::Duration;

use crate::client::ClusterClient;
use crate::proto::error::Result;

/// Connection settings shared by every shard connection.
#[derive(Debug, Clone)]
pub(crate) struct ClusterConfig {
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) write_timeout: Option<Duration>,
    pub(crate) max_idle_per_shard: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: None,
            write_timeout: None,
            max_idle_per_shard: 4,
        }
    }
}

/// Builder for configuring and creating a [`ClusterClient`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use shardpipe::ClusterClientBuilder;
///
/// # #[tokio::main]
/// # async fn main() -> shardpipe::Result<()> {
/// let client = ClusterClientBuilder::new()
///     .seeds("127.0.0.1:7000,127.0.0.1:7001")
///     .password("secret")
///     .connect_timeout(Duration::from_secs(3))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClusterClientBuilder {
    seeds: Option<String>,
    username: Option<String>,
    password: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    max_idle_per_shard: Option<usize>,
}

impl ClusterClientBuilder {
    /// Creates a builder with every option unset.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the comma-separated seed addresses
    /// (e.g. `"127.0.0.1:7000,127.0.0.1:7001"`; a `redis://` scheme is
    /// accepted too).
    #[inline]
    pub fn seeds(mut self, seeds: impl Into<String>) -> Self {
        self.seeds = Some(seeds.into());
        self
    }

    /// Sets the username for ACL authentication.
    #[inline]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password sent on every new shard connection.
    #[inline]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the dial timeout for new shard connections (default 5 s).
    #[inline]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-read socket timeout. `None` (the default) blocks
    /// indefinitely.
    #[inline]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the per-write socket timeout. `None` (the default) blocks
    /// indefinitely.
    #[inline]
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets how many idle connections the pool keeps per shard
    /// (default 4). Excess connections returned to the pool are closed.
    #[inline]
    pub fn max_idle_per_shard(mut self, max: usize) -> Self {
        self.max_idle_per_shard = Some(max);
        self
    }

    /// Connects to the cluster and discovers the initial topology.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if no seeds were set and
    /// [`crate::Error::ClusterUnavailable`] if no seed answers the
    /// topology query.
    pub async fn build(self) -> Result<ClusterClient> {
        let defaults = ClusterConfig::default();
        let config = ClusterConfig {
            username: self.username,
            password: self.password,
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            max_idle_per_shard: self
                .max_idle_per_shard
                .unwrap_or(defaults.max_idle_per_shard),
        };
        ClusterClient::connect_with(self.seeds.as_deref().unwrap_or(""), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::error::Error;

    #[test]
    fn test_config_defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_idle_per_shard, 4);
        assert!(config.password.is_none());
        assert!(config.read_timeout.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let builder = ClusterClientBuilder::new()
            .seeds("127.0.0.1:7000")
            .username("admin")
            .password("secret")
            .connect_timeout(Duration::from_secs(1))
            .max_idle_per_shard(2);

        assert_eq!(builder.seeds, Some("127.0.0.1:7000".to_string()));
        assert_eq!(builder.username, Some("admin".to_string()));
        assert_eq!(builder.password, Some("secret".to_string()));
        assert_eq!(builder.connect_timeout, Some(Duration::from_secs(1)));
        assert_eq!(builder.max_idle_per_shard, Some(2));
    }

    #[tokio::test]
    async fn test_build_without_seeds() {
        let result = ClusterClientBuilder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }
}
