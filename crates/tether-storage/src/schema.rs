//! Database schema and migrations.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StorageError};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "Database schema version {} is newer than this build supports ({})",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < SCHEMA_VERSION {
        info!(
            "Running migrations from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        if current_version < 1 {
            migrate_v1(conn)?;
        }

        if current_version < 2 {
            migrate_v2(conn)?;
        }

        set_schema_version(conn, SCHEMA_VERSION)?;
        info!("Migrations complete");
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    // Create schema_version table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration to version 1: Initial schema.
fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Applying migration v1: Initial schema");

    // Follow-ups table - one row per tracked follow-up. Timestamps are
    // RFC3339 UTC strings, so string comparison orders them correctly.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS follow_ups (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            contact_label TEXT,
            web_url TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            notify INTEGER NOT NULL DEFAULT 1,
            due_at TEXT,
            snoozed_until TEXT,
            last_scheduled_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Index for due-date scans
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_follow_ups_due_at ON follow_ups (due_at)",
        [],
    )?;

    // Index for notify-eligibility filtering
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_follow_ups_eligible ON follow_ups (completed, notify)",
        [],
    )?;

    // Settings table - key-value JSON blobs
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Migration to version 2: Overdue alert bookkeeping.
fn migrate_v2(conn: &Connection) -> Result<()> {
    info!("Applying migration v2: Overdue alert bookkeeping");

    // Tracks when an overdue alert last fired per follow-up, so alerts
    // stay at most once per calendar day.
    conn.execute(
        "ALTER TABLE follow_ups ADD COLUMN last_overdue_notified_at TEXT",
        [],
    )?;

    Ok(())
}
