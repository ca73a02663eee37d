use super::engine::StorageBackend;
use super::schema::{self, AdditiveColumn, Dialect, SQLITE_BASE_SCHEMA, TABLE};
use crate::connection::{ConnectionConfig, ConnectionPool, PoolStats, SqliteConnector};
use crate::core::{LifeState, PlayerId, PlayerRecord, RecordRow, StoreError};
use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, params};
use std::collections::BTreeSet;
use tracing::debug;

/// Embedded single-file backend.
///
/// Statements run inline on a pooled connection; the guard returns the
/// connection to the pool when it goes out of scope.
pub struct SqliteBackend {
    pool: ConnectionPool<SqliteConnector>,
}

impl SqliteBackend {
    pub fn open(config: ConnectionConfig) -> Result<Self, StoreError> {
        let pool = ConnectionPool::new(config, SqliteConnector)?;
        debug!(path = %pool.config().path.display(), "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        uuid: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        maxhp: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
        has_been_revived: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        crafted_hearts: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        crafted_revives: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        killed_other_players: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
        first_join: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        life_state: row
            .get::<_, Option<String>>(8)?
            .unwrap_or_else(|| LifeState::Alive.as_str().to_string()),
        afterlife_release_time: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
        prestige_count: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
    })
}

fn materialize(row: RecordRow) -> Result<PlayerRecord, StoreError> {
    PlayerRecord::from_row(row).map_err(StoreError::InvalidData)
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        let conn = self.pool.get_connection().await?;
        conn.execute_batch(SQLITE_BASE_SCHEMA)?;
        Ok(())
    }

    async fn existing_columns(&self) -> Result<BTreeSet<String>, StoreError> {
        let conn = self.pool.get_connection().await?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", TABLE))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(columns)
    }

    async fn add_column(&self, column: &AdditiveColumn) -> Result<(), StoreError> {
        let conn = self.pool.get_connection().await?;
        conn.execute_batch(&column.add_column_sql(Dialect::Sqlite))?;
        Ok(())
    }

    async fn fetch(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        let conn = self.pool.get_connection().await?;
        let sql = format!(
            "SELECT {} FROM {} WHERE uuid = ?1",
            schema::select_columns(),
            TABLE
        );
        let row = conn
            .query_row(&sql, params![id.to_string()], read_row)
            .optional()?;
        row.map(materialize).transpose()
    }

    async fn upsert(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let row = record.to_row();
        let conn = self.pool.get_connection().await?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            TABLE,
            schema::select_columns(),
            schema::placeholders()
        );
        conn.execute(
            &sql,
            params![
                row.uuid,
                row.name,
                row.maxhp,
                row.has_been_revived,
                row.crafted_hearts,
                row.crafted_revives,
                row.killed_other_players,
                row.first_join,
                row.life_state,
                row.afterlife_release_time,
                row.prestige_count,
            ],
        )?;
        Ok(())
    }

    async fn fetch_all_in_state(
        &self,
        state: LifeState,
    ) -> Result<Vec<PlayerRecord>, StoreError> {
        let conn = self.pool.get_connection().await?;
        let sql = format!(
            "SELECT {} FROM {} WHERE lifeState = ?1 ORDER BY uuid",
            schema::select_columns(),
            TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![state.as_str()], read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(materialize).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(dir: &TempDir) -> SqliteBackend {
        SqliteBackend::open(ConnectionConfig::embedded(dir.path().join("userData.db"))).unwrap()
    }

    #[tokio::test]
    async fn test_base_schema_has_only_original_columns() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.create_schema().await.unwrap();

        let columns = backend.existing_columns().await.unwrap();
        assert!(columns.contains("maxhp"));
        assert!(!columns.contains("lifeState"));
    }

    #[tokio::test]
    async fn test_query_before_migration_reports_missing_column() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.create_schema().await.unwrap();

        let err = backend.fetch(PlayerId::random()).await.unwrap_err();
        assert!(matches!(err, StoreError::ColumnNotFound(_, _)));
    }

    #[tokio::test]
    async fn test_legacy_row_reads_with_column_defaults() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        backend.create_schema().await.unwrap();

        let id = PlayerId::random();
        {
            let conn = backend.pool.get_connection().await.unwrap();
            conn.execute(
                "INSERT INTO hearts (uuid, name, maxhp, hasbeenRevived, craftedHearts, craftedRevives, killedOtherPlayers) VALUES (?1, 'Old', 14.0, 2, 0, 0, 5)",
                params![id.to_string()],
            )
            .unwrap();
        }
        for column in schema::ADDITIVE_COLUMNS {
            backend.add_column(column).await.unwrap();
        }

        let record = backend.fetch(id).await.unwrap().unwrap();
        assert_eq!(record.capacity(), 14.0);
        assert_eq!(record.revival_count(), 2);
        assert_eq!(record.elimination_kills(), 5);
        assert_eq!(record.life_state(), LifeState::Alive);
        assert_eq!(record.prestige_level(), 0);
        assert!(!record.is_dirty());
    }
}
