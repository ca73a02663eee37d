pub mod engine;
#[cfg(feature = "mariadb")]
pub mod mariadb;
pub mod migration;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use engine::StorageBackend;
#[cfg(feature = "mariadb")]
pub use mariadb::MariaDbBackend;
pub use schema::{AdditiveColumn, Dialect, MigrationReport};
pub use sqlite::SqliteBackend;
pub use store::{IdentityGuard, PlayerStore, StoreStats};
