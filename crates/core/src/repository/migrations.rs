//! Schema steps for the site repository.
//!
//! Each step runs in its own transaction together with its `_migrations`
//! row, so a failed step leaves the schema at the previous version.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

/// Ordered schema steps, keyed by version.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_sites.sql")),
    (2, include_str!("../../migrations/002_images.sql")),
];

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// Returns `MigrationFailed` naming the version whose SQL was rejected.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| apply(conn, MIGRATIONS)).await.map_err(Error::from)
}

fn apply(conn: &mut rusqlite::Connection, steps: &[(i64, &str)]) -> Result<(), Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

    for &(version, sql) in steps.iter().filter(|(version, _)| *version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
        tx.execute(
            "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        tracing::debug!(version, "schema step applied");
    }

    Ok(())
}
