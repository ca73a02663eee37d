use super::schema::AdditiveColumn;
use crate::core::{LifeState, PlayerId, PlayerRecord, StoreError};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Storage backend trait - allows pluggable storage backends
///
/// Implementations differ only in SQL dialect and connection handling; the
/// dirty-tracking and migration policy live in [`super::PlayerStore`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Create the table in its original shape if it does not exist
    async fn create_schema(&self) -> Result<(), StoreError>;

    /// Names of the columns currently present in the table
    async fn existing_columns(&self) -> Result<BTreeSet<String>, StoreError>;

    /// Add one column with its default value
    async fn add_column(&self, column: &AdditiveColumn) -> Result<(), StoreError>;

    /// Fetch a single record, `None` when no row exists
    async fn fetch(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError>;

    /// Insert or replace the full row of a record
    async fn upsert(&self, record: &PlayerRecord) -> Result<(), StoreError>;

    /// All records currently in the given life-state
    async fn fetch_all_in_state(&self, state: LifeState)
    -> Result<Vec<PlayerRecord>, StoreError>;
}
