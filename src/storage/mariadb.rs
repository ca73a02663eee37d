use super::engine::StorageBackend;
use super::schema::{self, AdditiveColumn, Dialect, MARIADB_BASE_SCHEMA, TABLE};
use crate::connection::ConnectionConfig;
use crate::core::{LifeState, PlayerId, PlayerRecord, RecordRow, StoreError};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use std::collections::BTreeSet;
use tracing::info;

/// Integer columns are read through `CAST(.. AS SIGNED)` so that unsigned
/// column types decode uniformly as `i64`.
const SELECT_COLUMNS: &str = "uuid, name, maxhp, \
    CAST(hasbeenRevived AS SIGNED), CAST(craftedHearts AS SIGNED), \
    CAST(craftedRevives AS SIGNED), CAST(killedOtherPlayers AS SIGNED), \
    CAST(firstJoin AS SIGNED), lifeState, \
    CAST(afterlifeReleaseTime AS SIGNED), CAST(prestigeCount AS SIGNED)";

/// Networked relational backend over a `sqlx` MySQL pool.
pub struct MariaDbBackend {
    pool: MySqlPool,
}

impl MariaDbBackend {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, StoreError> {
        config.validate().map_err(StoreError::Connection)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections as u32)
            .min_connections(config.min_connections as u32)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(&config.driver_url())
            .await?;
        info!(url = %config.to_url(), "connected to mariadb store");
        Ok(Self { pool })
    }
}

fn read_row(row: &MySqlRow) -> Result<RecordRow, sqlx::Error> {
    Ok(RecordRow {
        uuid: row.try_get(0)?,
        name: row.try_get::<Option<String>, _>(1)?.unwrap_or_default(),
        maxhp: row.try_get::<Option<f64>, _>(2)?.unwrap_or(0.0),
        has_been_revived: row.try_get::<Option<i64>, _>(3)?.unwrap_or(0),
        crafted_hearts: row.try_get::<Option<i64>, _>(4)?.unwrap_or(0),
        crafted_revives: row.try_get::<Option<i64>, _>(5)?.unwrap_or(0),
        killed_other_players: row.try_get::<Option<i64>, _>(6)?.unwrap_or(0),
        first_join: row.try_get::<Option<i64>, _>(7)?.unwrap_or(0),
        life_state: row
            .try_get::<Option<String>, _>(8)?
            .unwrap_or_else(|| LifeState::Alive.as_str().to_string()),
        afterlife_release_time: row.try_get::<Option<i64>, _>(9)?.unwrap_or(0),
        prestige_count: row.try_get::<Option<i64>, _>(10)?.unwrap_or(0),
    })
}

fn materialize(row: &MySqlRow) -> Result<PlayerRecord, StoreError> {
    let row = read_row(row)?;
    PlayerRecord::from_row(row).map_err(StoreError::InvalidData)
}

#[async_trait]
impl StorageBackend for MariaDbBackend {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    async fn create_schema(&self) -> Result<(), StoreError> {
        sqlx::query(MARIADB_BASE_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn existing_columns(&self) -> Result<BTreeSet<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(TABLE)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(StoreError::from))
            .collect()
    }

    async fn add_column(&self, column: &AdditiveColumn) -> Result<(), StoreError> {
        sqlx::query(&column.add_column_sql(Dialect::Mariadb))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch(&self, id: PlayerId) -> Result<Option<PlayerRecord>, StoreError> {
        let sql = format!("SELECT {} FROM {} WHERE uuid = ?", SELECT_COLUMNS, TABLE);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(materialize).transpose()
    }

    async fn upsert(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        let row = record.to_row();
        let sql = format!(
            "REPLACE INTO {} ({}) VALUES ({})",
            TABLE,
            schema::select_columns(),
            schema::placeholders()
        );
        sqlx::query(&sql)
            .bind(row.uuid)
            .bind(row.name)
            .bind(row.maxhp)
            .bind(row.has_been_revived)
            .bind(row.crafted_hearts)
            .bind(row.crafted_revives)
            .bind(row.killed_other_players)
            .bind(row.first_join)
            .bind(row.life_state)
            .bind(row.afterlife_release_time)
            .bind(row.prestige_count)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_all_in_state(
        &self,
        state: LifeState,
    ) -> Result<Vec<PlayerRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE lifeState = ? ORDER BY uuid",
            SELECT_COLUMNS, TABLE
        );
        let rows = sqlx::query(&sql)
            .bind(state.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(materialize).collect()
    }
}
