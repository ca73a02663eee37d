use super::config::ConnectionConfig;
use crate::core::StoreError;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Opens raw connections for a [`ConnectionPool`].
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Send + 'static;

    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, StoreError>;
}

/// Opens SQLite connections on the configured database file.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

impl ConnectionFactory for SqliteConnector {
    type Connection = rusqlite::Connection;

    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Connection, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Connection(format!("Failed to create database directory: {}", e))
                })?;
            }
        }
        let conn = rusqlite::Connection::open(&config.path)?;
        conn.busy_timeout(config.connect_timeout)?;
        Ok(conn)
    }
}

/// Connection pool
///
/// Hands out connections through [`PoolGuard`], which checks the connection
/// back in when dropped, on success and on error alike.
pub struct ConnectionPool<F: ConnectionFactory> {
    /// Pool configuration
    config: ConnectionConfig,
    factory: F,
    /// Available connections
    available: Arc<Mutex<VecDeque<PooledConnection<F::Connection>>>>,
    /// Total number of connections created and not yet discarded
    total_connections: Arc<AtomicUsize>,
}

/// A connection from the pool
struct PooledConnection<C> {
    connection: C,
    created_at: Instant,
    last_used: Instant,
}

impl<C> PooledConnection<C> {
    fn new(connection: C) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(config: ConnectionConfig, factory: F) -> Result<Self, StoreError> {
        config.validate_pool().map_err(StoreError::Connection)?;

        let pool = Self {
            config,
            factory,
            available: Arc::new(Mutex::new(VecDeque::new())),
            total_connections: Arc::new(AtomicUsize::new(0)),
        };

        // Pre-create minimum connections
        pool.ensure_min_connections()?;

        Ok(pool)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Check out a connection, waiting up to `connect_timeout` for one to free up.
    pub async fn get_connection(&self) -> Result<PoolGuard<F::Connection>, StoreError> {
        let start = Instant::now();

        loop {
            // Try to get an available connection
            if let Some(pooled) = self.try_get_available()? {
                return Ok(self.guard(pooled.connection, pooled.created_at));
            }

            // Try to create a new connection if under limit
            if let Some(conn) = self.try_create_connection()? {
                return Ok(self.guard(conn, Instant::now()));
            }

            // Check timeout
            if start.elapsed() > self.config.connect_timeout {
                return Err(StoreError::PoolTimeout(
                    "no connections available".to_string(),
                ));
            }

            // Wait a bit before retrying
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn guard(&self, connection: F::Connection, created_at: Instant) -> PoolGuard<F::Connection> {
        PoolGuard {
            connection: Some(connection),
            created_at,
            pool: Arc::clone(&self.available),
        }
    }

    /// Try to get an available connection from the pool
    fn try_get_available(&self) -> Result<Option<PooledConnection<F::Connection>>, StoreError> {
        let mut available = self
            .available
            .lock()
            .map_err(|e| StoreError::LockError(e.to_string()))?;

        let before = available.len();
        let max_lifetime = self.config.max_lifetime;
        let idle_timeout = self.config.idle_timeout;
        available.retain(|pooled| {
            !(pooled.is_expired(max_lifetime) || pooled.is_idle_too_long(idle_timeout))
        });

        let removed = before - available.len();
        if removed > 0 {
            debug!(removed, "discarded stale pooled connections");
            self.total_connections.fetch_sub(removed, Ordering::SeqCst);
        }

        Ok(available.pop_front())
    }

    /// Try to create a new connection if under limit
    fn try_create_connection(&self) -> Result<Option<F::Connection>, StoreError> {
        let reserved = self
            .total_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
                (total < self.config.max_connections).then_some(total + 1)
            })
            .is_ok();
        if !reserved {
            return Ok(None);
        }

        match self.factory.connect(&self.config) {
            Ok(connection) => Ok(Some(connection)),
            Err(err) => {
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Ensure minimum number of connections
    fn ensure_min_connections(&self) -> Result<(), StoreError> {
        let mut available = self
            .available
            .lock()
            .map_err(|e| StoreError::LockError(e.to_string()))?;

        while self.total_connections.load(Ordering::SeqCst) < self.config.min_connections {
            let connection = self.factory.connect(&self.config)?;
            available.push_back(PooledConnection::new(connection));
            self.total_connections.fetch_add(1, Ordering::SeqCst);
        }

        Ok(())
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let available = self.available.lock().map(|a| a.len()).unwrap_or(0);
        let total = self.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.config.max_connections,
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}

/// RAII guard for pooled connections
///
/// Returns the connection to the pool when dropped
pub struct PoolGuard<C: Send + 'static> {
    connection: Option<C>,
    created_at: Instant,
    pool: Arc<Mutex<VecDeque<PooledConnection<C>>>>,
}

impl<C: Send + 'static> Deref for PoolGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.connection
            .as_ref()
            .expect("Connection already returned to pool")
    }
}

impl<C: Send + 'static> DerefMut for PoolGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.connection
            .as_mut()
            .expect("Connection already returned to pool")
    }
}

impl<C: Send + 'static> Drop for PoolGuard<C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let returned = PooledConnection {
                connection,
                created_at: self.created_at,
                last_used: Instant::now(),
            };
            // A poisoned lock still holds a consistent queue.
            match self.pool.lock() {
                Ok(mut pool) => pool.push_back(returned),
                Err(poisoned) => {
                    warn!("connection pool lock poisoned; recovering");
                    poisoned.into_inner().push_back(returned);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sqlite_pool(dir: &TempDir, min: usize, max: usize) -> ConnectionPool<SqliteConnector> {
        let config = ConnectionConfig::embedded(dir.path().join("pool.db"))
            .min_connections(min)
            .max_connections(max)
            .connect_timeout(Duration::from_millis(100));
        ConnectionPool::new(config, SqliteConnector).unwrap()
    }

    #[tokio::test]
    async fn test_pool_creation() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir, 2, 5);
        let stats = pool.stats();

        assert_eq!(stats.total_connections, 2); // min_connections
        assert_eq!(stats.available_connections, 2);
    }

    #[tokio::test]
    async fn test_get_connection_runs_sql() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir, 1, 5);
        let conn = pool.get_connection().await.unwrap();

        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_connection_return_to_pool() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir, 1, 5);

        {
            let _conn = pool.get_connection().await.unwrap();
            let stats = pool.stats();
            assert_eq!(stats.active_connections, 1);
            assert_eq!(stats.available_connections, 0);
        } // Connection returned here

        let stats = pool.stats();
        assert_eq!(stats.available_connections, 1);
        assert_eq!(stats.total_connections, 1);
    }

    #[tokio::test]
    async fn test_connection_returned_after_failed_query() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir, 0, 1);

        async fn failing(pool: &ConnectionPool<SqliteConnector>) -> Result<(), StoreError> {
            let conn = pool.get_connection().await?;
            conn.execute_batch("SELECT * FROM missing_table")?;
            Ok(())
        }

        assert!(failing(&pool).await.is_err());
        assert!(pool.get_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_max_connections_limit() {
        let dir = TempDir::new().unwrap();
        let pool = sqlite_pool(&dir, 0, 2);

        let _conn1 = pool.get_connection().await.unwrap();
        let _conn2 = pool.get_connection().await.unwrap();

        // Third connection should timeout
        let result = pool.get_connection().await;
        assert!(matches!(result, Err(StoreError::PoolTimeout(_))));
    }

    #[tokio::test]
    async fn test_invalid_limits_rejected() {
        let dir = TempDir::new().unwrap();
        let config = ConnectionConfig::embedded(dir.path().join("pool.db")).max_connections(0);
        assert!(ConnectionPool::new(config, SqliteConnector).is_err());
    }
}
