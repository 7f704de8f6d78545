//! Connection bootstrap utilities for the SQLite document store.
//!
//! # Responsibility
//! - Open file or in-memory stores for seeding and tests.
//! - Open existing stores read-only for reconciliation runs.
//!
//! # Invariants
//! - Writable connections have migrations fully applied.
//! - Read-only connections never run migrations; they are rejected instead
//!   when the schema is not current.

use super::migrations::{apply_migrations, ensure_current};
use super::DbResult;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) a store file and applies pending migrations.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_store(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path.as_ref()), migrate_connection)
}

/// Opens an in-memory store with all migrations applied.
pub fn open_store_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory, migrate_connection)
}

/// Opens an existing store file without write access.
///
/// Fails with [`super::DbError::UninitializedStore`] when the file was never
/// seeded, and never creates a missing file.
pub fn open_store_read_only(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(
        "read_only",
        || {
            Connection::open_with_flags(
                path.as_ref(),
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        },
        |conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            ensure_current(conn)
        },
    )
}

fn open_with<O, B>(mode: &str, opener: O, bootstrap: B) -> DbResult<Connection>
where
    O: FnOnce() -> rusqlite::Result<Connection>,
    B: FnOnce(&mut Connection) -> DbResult<()>,
{
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode={mode}");

    let mut conn = match opener() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code=store_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }
    };

    match bootstrap(&mut conn) {
        Ok(()) => {
            info!(
                "event=store_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code=store_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn migrate_connection(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
