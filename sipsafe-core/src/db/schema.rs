//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: drink history
    r#"
    -- Append-only history used for analytics
    CREATE TABLE IF NOT EXISTS drink_logs (
        id                         TEXT PRIMARY KEY,
        label                      TEXT NOT NULL,
        created_at                 DATETIME NOT NULL,
        volume_ml                  REAL,
        abv_percent                REAL,
        pure_alcohol_ml            REAL,
        estimated_bac_contribution REAL
    );

    CREATE INDEX IF NOT EXISTS idx_drink_logs_created_at ON drink_logs(created_at);
    "#,
    // Version 2: persisted live session
    r#"
    -- Single row: the session the CLI resumes between invocations
    CREATE TABLE IF NOT EXISTS session_state (
        id                  INTEGER PRIMARY KEY CHECK (id = 1),
        session_id          TEXT NOT NULL,
        started_at          DATETIME NOT NULL,
        active              INTEGER NOT NULL DEFAULT 1,
        water_nudge_counter INTEGER NOT NULL DEFAULT 0,
        auto_alert_sent     INTEGER NOT NULL DEFAULT 0,
        last_zone           TEXT NOT NULL DEFAULT 'SOBER',
        current_bac         REAL NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS session_drinks (
        id          TEXT PRIMARY KEY,
        session_id  TEXT NOT NULL,
        position    INTEGER NOT NULL,   -- 0 = newest
        label       TEXT NOT NULL,
        kind        TEXT NOT NULL,      -- 'standard_drinks' | 'volume'
        quantity    REAL,
        volume_ml   REAL,
        abv_percent REAL,
        bac_at_log  REAL NOT NULL DEFAULT 0,
        logged_at   DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_session_drinks_position ON session_drinks(session_id, position);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get current schema version
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        assert_eq!(MIGRATIONS.len() as i32, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["drink_logs", "session_state", "session_drinks"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {} should exist", table);
        }
    }

    #[test]
    fn test_session_state_is_single_row() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let second = conn.execute(
            "INSERT INTO session_state (id, session_id, started_at) VALUES (2, 's', '2026-10-17T21:00:00Z')",
            [],
        );
        assert!(second.is_err());
    }
}
