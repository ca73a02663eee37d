pub mod config;
pub mod pool;

pub use config::ConnectionConfig;
pub use pool::{ConnectionFactory, ConnectionPool, PoolGuard, PoolStats, SqliteConnector};
