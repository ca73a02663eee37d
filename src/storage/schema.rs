//! Table layout of the `hearts` table and the additive column registry.

pub const TABLE: &str = "hearts";

/// Original (v1) shape of the table, embedded dialect.
pub const SQLITE_BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hearts (
  uuid TEXT PRIMARY KEY,
  name TEXT,
  maxhp REAL,
  hasbeenRevived INTEGER,
  craftedHearts INTEGER,
  craftedRevives INTEGER,
  killedOtherPlayers INTEGER
);
"#;

/// Original (v1) shape of the table, networked dialect.
pub const MARIADB_BASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS hearts (
  uuid VARCHAR(36) PRIMARY KEY,
  name VARCHAR(255),
  maxhp DOUBLE,
  hasbeenRevived INT,
  craftedHearts INT,
  craftedRevives INT,
  killedOtherPlayers INT
)
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mariadb,
}

/// A column introduced after v1. Only ever added, never altered or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdditiveColumn {
    pub name: &'static str,
    pub since: u32,
    sqlite_type: &'static str,
    mariadb_type: &'static str,
    default: &'static str,
}

impl AdditiveColumn {
    pub fn column_type(&self, dialect: Dialect) -> &'static str {
        match dialect {
            Dialect::Sqlite => self.sqlite_type,
            Dialect::Mariadb => self.mariadb_type,
        }
    }

    pub fn default_literal(&self) -> &'static str {
        self.default
    }

    pub fn add_column_sql(&self, dialect: Dialect) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {} DEFAULT {}",
            TABLE,
            self.name,
            self.column_type(dialect),
            self.default
        )
    }
}

/// Every column added since v1, in the order they were introduced.
pub const ADDITIVE_COLUMNS: &[AdditiveColumn] = &[
    AdditiveColumn {
        name: "firstJoin",
        since: 2,
        sqlite_type: "INTEGER",
        mariadb_type: "BIGINT",
        default: "0",
    },
    AdditiveColumn {
        name: "lifeState",
        since: 3,
        sqlite_type: "TEXT",
        mariadb_type: "VARCHAR(16)",
        default: "'ALIVE'",
    },
    AdditiveColumn {
        name: "afterlifeReleaseTime",
        since: 3,
        sqlite_type: "INTEGER",
        mariadb_type: "BIGINT",
        default: "0",
    },
    AdditiveColumn {
        name: "prestigeCount",
        since: 4,
        sqlite_type: "INTEGER",
        mariadb_type: "SMALLINT UNSIGNED",
        default: "0",
    },
];

/// Full column list in row order, used by reads and upserts.
pub const COLUMNS: &[&str] = &[
    "uuid",
    "name",
    "maxhp",
    "hasbeenRevived",
    "craftedHearts",
    "craftedRevives",
    "killedOtherPlayers",
    "firstJoin",
    "lifeState",
    "afterlifeReleaseTime",
    "prestigeCount",
];

pub fn select_columns() -> String {
    COLUMNS.join(", ")
}

pub fn placeholders() -> String {
    vec!["?"; COLUMNS.len()].join(", ")
}

/// Schema bookkeeping produced by a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub added: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn changed(&self) -> bool {
        !self.added.is_empty()
    }
}
