//! Redis bit store.
//!
//! Issues `GETBIT`, `SETBIT`, `BITCOUNT` and `BITFIELD GET` against a
//! standalone server or, with the `cluster` feature, a Redis Cluster.
//!
//! # Connection Reuse
//!
//! One connection is cached per store behind a `Mutex`. A command takes it
//! and puts it back on success; after a failure it is dropped and the next
//! command reconnects.
//!
//! # Command Timeout
//!
//! Connections use a read/write timeout (5 seconds unless configured) so an
//! unresponsive server cannot block a caller indefinitely. There are no
//! retries; failures surface as [`crate::Error::RemoteStore`].

#[cfg(feature = "redis")]
mod implementation {
    use crate::config::StoreSettings;
    use crate::models::BitFieldType;
    use crate::storage::metrics::record_operation_metrics;
    use crate::storage::traits::BitStore;
    use crate::{Error, Result};
    use redis::{Client, Connection, ConnectionLike, RedisResult};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tracing::instrument;

    /// Default timeout for Redis commands.
    const REDIS_TIMEOUT: Duration = Duration::from_secs(5);

    const BACKEND: &str = "redis";

    /// Where connections come from.
    enum Target {
        Standalone(Client),
        #[cfg(feature = "cluster")]
        Cluster(redis::cluster::ClusterClient),
    }

    /// A live connection of either flavour.
    enum StoreConnection {
        Standalone(Connection),
        #[cfg(feature = "cluster")]
        Cluster(redis::cluster::ClusterConnection),
    }

    impl StoreConnection {
        fn as_connection_like(&mut self) -> &mut dyn ConnectionLike {
            match self {
                Self::Standalone(conn) => conn,
                #[cfg(feature = "cluster")]
                Self::Cluster(conn) => conn,
            }
        }
    }

    /// Redis-backed bit store.
    pub struct RedisBitStore {
        target: Target,
        timeout: Duration,
        /// Cached connection for reuse.
        connection: Mutex<Option<StoreConnection>>,
    }

    impl RedisBitStore {
        /// Opens a store for a standalone server.
        ///
        /// No connection is made until the first command (or [`BitStore::ping`]).
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidStoreHandle`] if the URL cannot be parsed.
        pub fn open(url: &str) -> Result<Self> {
            Self::open_with_timeout(url, REDIS_TIMEOUT)
        }

        /// Opens a store for a standalone server with a custom command timeout.
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidStoreHandle`] if the URL cannot be parsed.
        pub fn open_with_timeout(url: &str, timeout: Duration) -> Result<Self> {
            let client = Client::open(url)
                .map_err(|e| Error::InvalidStoreHandle(format!("redis url rejected: {e}")))?;
            Ok(Self::with_target(Target::Standalone(client), timeout))
        }

        /// Opens a store for a Redis Cluster.
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidStoreHandle`] if the node list is empty or
        /// a node URL cannot be parsed.
        #[cfg(feature = "cluster")]
        pub fn open_cluster(nodes: &[String], timeout: Duration) -> Result<Self> {
            if nodes.is_empty() {
                return Err(Error::InvalidStoreHandle(
                    "redis cluster needs at least one node".to_string(),
                ));
            }
            let client = redis::cluster::ClusterClient::new(nodes.to_vec()).map_err(|e| {
                Error::InvalidStoreHandle(format!("redis cluster nodes rejected: {e}"))
            })?;
            Ok(Self::with_target(Target::Cluster(client), timeout))
        }

        /// Opens the store described by `settings`.
        ///
        /// Cluster nodes win over a standalone URL when both are set.
        ///
        /// # Errors
        ///
        /// Returns [`Error::InvalidStoreHandle`] if nothing usable is
        /// configured, and [`Error::FeatureNotEnabled`] if cluster nodes are
        /// configured without the `cluster` feature.
        pub fn from_settings(settings: &StoreSettings) -> Result<Self> {
            if !settings.cluster_nodes.is_empty() {
                #[cfg(feature = "cluster")]
                return Self::open_cluster(&settings.cluster_nodes, settings.timeout);
                #[cfg(not(feature = "cluster"))]
                return Err(Error::FeatureNotEnabled("cluster".to_string()));
            }

            match settings.url.as_deref() {
                Some(url) => Self::open_with_timeout(url, settings.timeout),
                None => Err(Error::InvalidStoreHandle(
                    "no redis url or cluster nodes configured".to_string(),
                )),
            }
        }

        /// Creates a store with default settings (`redis://localhost:6379`).
        ///
        /// # Errors
        ///
        /// Returns an error if the default URL cannot be parsed.
        pub fn with_defaults() -> Result<Self> {
            Self::open(crate::config::defaults::DEFAULT_REDIS_URL)
        }

        fn with_target(target: Target, timeout: Duration) -> Self {
            Self {
                target,
                timeout,
                connection: Mutex::new(None),
            }
        }

        /// Opens a fresh connection with the command timeout applied.
        fn connect(&self) -> RedisResult<StoreConnection> {
            match &self.target {
                Target::Standalone(client) => {
                    let conn = client.get_connection()?;
                    conn.set_read_timeout(Some(self.timeout))?;
                    conn.set_write_timeout(Some(self.timeout))?;
                    Ok(StoreConnection::Standalone(conn))
                },
                #[cfg(feature = "cluster")]
                Target::Cluster(client) => {
                    let conn = client.get_connection()?;
                    conn.set_read_timeout(Some(self.timeout))?;
                    conn.set_write_timeout(Some(self.timeout))?;
                    Ok(StoreConnection::Cluster(conn))
                },
            }
        }

        /// Takes the cached connection, or opens one.
        fn take_connection(&self) -> Result<Option<StoreConnection>> {
            let mut guard = self.connection.lock().map_err(|e| Error::RemoteStore {
                operation: "redis_lock_connection".to_string(),
                cause: e.to_string(),
            })?;
            Ok(guard.take())
        }

        /// Returns a connection to the cache for reuse.
        fn return_connection(&self, conn: StoreConnection) {
            if let Ok(mut guard) = self.connection.lock() {
                *guard = Some(conn);
            }
        }

        /// Runs one command on a pooled connection and records its metrics.
        fn run<T>(
            &self,
            operation: &'static str,
            command: impl FnOnce(&mut dyn ConnectionLike) -> RedisResult<T>,
        ) -> Result<T> {
            let start = Instant::now();
            let result = self.run_inner(operation, command);
            let status = if result.is_ok() { "success" } else { "error" };
            record_operation_metrics(BACKEND, operation, start, status);
            result
        }

        fn run_inner<T>(
            &self,
            operation: &'static str,
            command: impl FnOnce(&mut dyn ConnectionLike) -> RedisResult<T>,
        ) -> Result<T> {
            let mut conn = match self.take_connection()? {
                Some(conn) => conn,
                None => self.connect().map_err(|e| Error::RemoteStore {
                    operation: "redis_connect".to_string(),
                    cause: e.to_string(),
                })?,
            };

            match command(conn.as_connection_like()) {
                Ok(value) => {
                    self.return_connection(conn);
                    Ok(value)
                },
                Err(e) => {
                    // The connection may be mid-reply; reconnect next time.
                    drop(conn);
                    Err(Error::RemoteStore {
                        operation: operation.to_string(),
                        cause: e.to_string(),
                    })
                },
            }
        }
    }

    impl BitStore for RedisBitStore {
        #[instrument(skip(self), fields(backend = "redis"))]
        fn get_bit(&self, key: &str, offset: u64) -> Result<bool> {
            let bit: i64 = self.run("getbit", |conn| {
                redis::cmd("GETBIT").arg(key).arg(offset).query(conn)
            })?;
            Ok(bit != 0)
        }

        #[instrument(skip(self), fields(backend = "redis"))]
        fn set_bit(&self, key: &str, offset: u64, value: bool) -> Result<bool> {
            let previous: i64 = self.run("setbit", |conn| {
                redis::cmd("SETBIT")
                    .arg(key)
                    .arg(offset)
                    .arg(i32::from(value))
                    .query(conn)
            })?;
            Ok(previous != 0)
        }

        #[instrument(skip(self), fields(backend = "redis"))]
        fn bit_count(&self, key: &str, start_byte: i64, end_byte: i64) -> Result<u64> {
            self.run("bitcount", |conn| {
                redis::cmd("BITCOUNT")
                    .arg(key)
                    .arg(start_byte)
                    .arg(end_byte)
                    .query(conn)
            })
        }

        #[instrument(skip(self), fields(backend = "redis"))]
        fn bit_field_get(
            &self,
            key: &str,
            field: BitFieldType,
            offset: u64,
        ) -> Result<Option<i64>> {
            let values: Vec<Option<i64>> = self.run("bitfield", |conn| {
                redis::cmd("BITFIELD")
                    .arg(key)
                    .arg("GET")
                    .arg(field.to_string())
                    .arg(offset)
                    .query(conn)
            })?;
            tracing::debug!(replies = values.len(), "BITFIELD GET reply");
            Ok(values.into_iter().next().flatten())
        }

        fn ping(&self) -> Result<()> {
            let reply: String = self.run("ping", |conn| redis::cmd("PING").query(conn))?;
            tracing::debug!(reply = %reply, "Redis ping");
            Ok(())
        }

        fn close(&self) -> Result<()> {
            drop(self.take_connection()?);
            Ok(())
        }
    }

}

#[cfg(feature = "redis")]
pub use implementation::RedisBitStore;

#[cfg(not(feature = "redis"))]
mod stub {
    use crate::config::StoreSettings;
    use crate::models::BitFieldType;
    use crate::storage::traits::BitStore;
    use crate::{Error, Result};
    use std::time::Duration;

    /// Stub Redis store when the feature is not enabled.
    pub struct RedisBitStore;

    impl RedisBitStore {
        /// Always fails: the `redis` feature is disabled.
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn open(_url: &str) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        /// Always fails: the `redis` feature is disabled.
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn open_with_timeout(_url: &str, _timeout: Duration) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        /// Always fails: the `redis` feature is disabled.
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn from_settings(_settings: &StoreSettings) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        /// Always fails: the `redis` feature is disabled.
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn with_defaults() -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    impl BitStore for RedisBitStore {
        fn get_bit(&self, _key: &str, _offset: u64) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn set_bit(&self, _key: &str, _offset: u64, _value: bool) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn bit_count(&self, _key: &str, _start_byte: i64, _end_byte: i64) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn bit_field_get(
            &self,
            _key: &str,
            _field: BitFieldType,
            _offset: u64,
        ) -> Result<Option<i64>> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }
}

#[cfg(not(feature = "redis"))]
pub use stub::RedisBitStore;
