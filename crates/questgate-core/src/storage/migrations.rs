//! Database schema migrations for questgate.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use indoc::indoc;
use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: accounts, quests and focus sessions.
///
/// Timestamps are RFC 3339 text in UTC with fixed microsecond precision so
/// they sort lexically. `last_active_date` is a plain `YYYY-MM-DD` day in the
/// settlement time zone.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS accounts (
            user_id          TEXT PRIMARY KEY,
            xp               INTEGER NOT NULL DEFAULT 0,
            gold             INTEGER NOT NULL DEFAULT 0,
            streak           INTEGER NOT NULL DEFAULT 0,
            last_active_date TEXT,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quests (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            title       TEXT NOT NULL,
            description TEXT,
            weight      INTEGER NOT NULL DEFAULT 1,
            status      TEXT NOT NULL DEFAULT 'open',
            due_at      TEXT,
            tags        TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS focus_sessions (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL,
            quest_id       TEXT,
            rank           TEXT NOT NULL DEFAULT 'E',
            start_at       TEXT NOT NULL,
            end_at         TEXT,
            target_minutes INTEGER NOT NULL,
            outcome        TEXT,
            xp_earned      INTEGER NOT NULL DEFAULT 0,
            gold_earned    INTEGER NOT NULL DEFAULT 0,
            CHECK ((end_at IS NULL) = (outcome IS NULL))
        );
    "})?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: owner lookups for history and quest lists.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc! {"
        CREATE INDEX IF NOT EXISTS idx_focus_sessions_user_start
            ON focus_sessions(user_id, start_at);
        CREATE INDEX IF NOT EXISTS idx_quests_user_created
            ON quests(user_id, created_at);
    "})?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
