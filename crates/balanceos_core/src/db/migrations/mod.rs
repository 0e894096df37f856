//! Ordered schema migrations.
//!
//! # Invariants
//! - Versions start at 1 and increase by one per entry.
//! - `PRAGMA user_version` always equals the last applied version.
//! - Pending steps run in one immediate transaction, so two processes
//!   opening a fresh file cannot both migrate it.

use crate::db::{DbError, DbResult};
use crate::logging::elapsed_ms;
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "health_tracking",
        sql: include_str!("0001_init.sql"),
    },
    Step {
        version: 2,
        name: "finance",
        sql: include_str!("0002_finance.sql"),
    },
    Step {
        version: 3,
        name: "blocker_notifications",
        sql: include_str!("0003_blocker_notifications.sql"),
    },
    Step {
        version: 4,
        name: "fitbit_tokens",
        sql: include_str!("0004_fitbit_tokens.sql"),
    },
];

/// Schema version this binary migrates to.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `Migration` naming the first step whose SQL failed; nothing of the
///   batch is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let latest = latest_version();
    if user_version(conn)? == latest {
        return Ok(());
    }

    let started_at = Instant::now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Re-read under the write lock; another connection may have finished first.
    let from = user_version(&tx)?;
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }
    for step in STEPS.iter().filter(|step| step.version > from) {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                name: step.name,
                source,
            })?;
    }
    tx.commit()?;

    if from < latest {
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={} duration_ms={}",
            from,
            latest,
            elapsed_ms(started_at)
        );
    }
    Ok(())
}

fn user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
