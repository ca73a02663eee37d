use super::engine::StorageBackend;
use super::schema::{ADDITIVE_COLUMNS, MigrationReport, TABLE};
use tracing::{error, info};

/// Brings the table up to the current column set.
///
/// Creates the base table when absent, then adds each registered column the
/// table lacks. Existing columns are never altered, so a second run against a
/// migrated table performs no statements beyond the introspection query.
/// Failures are logged and collected; the caller keeps running on whatever
/// columns exist.
pub async fn run_additive_migration(backend: &dyn StorageBackend) -> MigrationReport {
    let mut report = MigrationReport::default();

    if let Err(err) = backend.create_schema().await {
        error!(backend = backend.name(), error = %err, "failed to create base table");
        report.failed.push((TABLE.to_string(), err.to_string()));
        return report;
    }

    let existing = match backend.existing_columns().await {
        Ok(columns) => columns,
        Err(err) => {
            error!(backend = backend.name(), error = %err, "failed to inspect table columns");
            report.failed.push((TABLE.to_string(), err.to_string()));
            return report;
        }
    };

    for column in ADDITIVE_COLUMNS {
        if existing.contains(column.name) {
            continue;
        }
        match backend.add_column(column).await {
            Ok(()) => {
                info!(
                    backend = backend.name(),
                    column = column.name,
                    since = column.since,
                    "added column"
                );
                report.added.push(column.name.to_string());
            }
            Err(err) => {
                error!(
                    backend = backend.name(),
                    column = column.name,
                    error = %err,
                    "failed to add column"
                );
                report.failed.push((column.name.to_string(), err.to_string()));
            }
        }
    }

    report
}
