use super::types::PlayerId;
use thiserror::Error;

/// Failures reported by the storage engine and its backends.
///
/// A record that does not exist is not an error: `load` returns `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection pool timeout: {0}")]
    PoolTimeout(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl StoreError {
    /// Transient failures leave the in-memory record untouched and may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_) | StoreError::PoolTimeout(_) | StoreError::LockError(_)
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Connection(err.to_string())
            }
            _ => {
                let message = err.to_string();
                match missing_column(&message) {
                    Some(column) => StoreError::ColumnNotFound(column.to_string(), "hearts".into()),
                    None => StoreError::Query(message),
                }
            }
        }
    }
}

/// Column named by SQLite's "no such column: x" message, which the bundled
/// build may suffix with " in <sql> at offset N".
fn missing_column(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("no such column: ")?;
    let column = rest.split_once(" in ").map_or(rest, |(column, _)| column);
    Some(column.trim())
}

#[cfg(feature = "mariadb")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::PoolTimeout(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::Tls(_) => {
                StoreError::Connection(err.to_string())
            }
            sqlx::Error::ColumnNotFound(column) => {
                StoreError::ColumnNotFound(column, "hearts".into())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Read(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serde(String),
}

/// Provisioning failures of the holding world.
#[derive(Error, Debug)]
pub enum WorldError {
    #[error("Failed to create world '{0}'")]
    CreateFailed(String),

    #[error("World '{0}' refused to unload")]
    UnloadRefused(String),

    #[error("World '{0}' is still loaded")]
    StillLoaded(String),

    #[error("Failed to delete storage of world '{0}': {1}")]
    DeleteFailed(String, String),
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("No record for player {0}")]
    NotFound(PlayerId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error("Invalid value: {0}")]
    ConfigInvalid(String),

    #[error("Denied: {key}")]
    Denied { key: &'static str },
}

pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_reported_not_generic() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE hearts (uuid TEXT PRIMARY KEY)")
            .unwrap();
        let err = conn
            .query_row("SELECT prestigeCount FROM hearts", [], |row| row.get::<_, i64>(0))
            .unwrap_err();

        match StoreError::from(err) {
            StoreError::ColumnNotFound(column, table) => {
                assert_eq!(column, "prestigeCount");
                assert_eq!(table, "hearts");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_column_ignores_statement_suffix() {
        assert_eq!(
            missing_column("no such column: prestigeCount in SELECT prestigeCount FROM hearts at offset 7"),
            Some("prestigeCount")
        );
        assert_eq!(missing_column("no such column: lifeState"), Some("lifeState"));
        assert_eq!(missing_column("no such table: hearts"), None);
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Connection("down".into()).is_transient());
        assert!(StoreError::PoolTimeout("busy".into()).is_transient());
        assert!(!StoreError::InvalidData("bad".into()).is_transient());
    }
}
