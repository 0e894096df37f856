//! Connection bootstrap.
//!
//! # Invariants
//! - Returned connections enforce foreign keys, wait up to
//!   [`BUSY_TIMEOUT`] for locks and are migrated to the latest version.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::logging::elapsed_ms;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) the database file at `path`.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    connect("file", || Connection::open(path))
}

/// Volatile database that lives as long as the returned connection.
pub fn open_db_in_memory() -> DbResult<Connection> {
    connect("memory", Connection::open_in_memory)
}

fn connect(
    backend: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result: DbResult<Connection> = open().map_err(Into::into).and_then(|mut conn| {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok backend={} duration_ms={}",
            backend,
            elapsed_ms(started_at)
        ),
        Err(err) => error!(
            "event=db_open module=db status=error backend={} duration_ms={} error=\"{}\"",
            backend,
            elapsed_ms(started_at),
            err
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::open_db_in_memory;

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open_db_in_memory().unwrap();
        let enabled: bool = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }
}
