//! Database repository layer
//!
//! Drink history queries plus save/load of the live session.

use crate::bac::Zone;
use crate::collaborators::{DrinkLogSource, DrinkRecorder};
use crate::error::Result;
use crate::session::SessionState;
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamps so text order matches time order.
fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_sql(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL so a `watch` in one terminal doesn't block `log` in another
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Drink history
    // ============================================

    /// Append a drink log. Re-inserting the same id is a no-op.
    pub fn insert_drink_log(&self, record: &DrinkLogRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR IGNORE INTO drink_logs (id, label, created_at, volume_ml, abv_percent,
                                              pure_alcohol_ml, estimated_bac_contribution)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id,
                record.label,
                ts_to_sql(&record.created_at),
                record.volume_ml,
                record.abv_percent,
                record.pure_alcohol_ml,
                record.estimated_bac_contribution,
            ],
        )?;
        Ok(())
    }

    /// Most recent drink logs, newest first, optionally only those at or after `since`.
    pub fn list_drink_logs(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DrinkLogRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM drink_logs
            WHERE (?1 IS NULL OR created_at >= ?1)
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(
            params![since.as_ref().map(ts_to_sql), limit as i64],
            Self::row_to_drink_log,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_drink_logs(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM drink_logs", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_drink_log(row: &Row) -> rusqlite::Result<DrinkLogRecord> {
        Ok(DrinkLogRecord {
            id: row.get("id")?,
            label: row.get("label")?,
            created_at: ts_from_sql(row, "created_at")?,
            volume_ml: row.get("volume_ml")?,
            abv_percent: row.get("abv_percent")?,
            pure_alcohol_ml: row.get("pure_alcohol_ml")?,
            estimated_bac_contribution: row.get("estimated_bac_contribution")?,
        })
    }

    // ============================================
    // Live session
    // ============================================

    /// Replace the persisted session with `state`.
    pub fn save_session(&self, state: &SessionState) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO session_state (id, session_id, started_at, active, water_nudge_counter,
                                       auto_alert_sent, last_zone, current_bac)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                session_id = excluded.session_id,
                started_at = excluded.started_at,
                active = excluded.active,
                water_nudge_counter = excluded.water_nudge_counter,
                auto_alert_sent = excluded.auto_alert_sent,
                last_zone = excluded.last_zone,
                current_bac = excluded.current_bac
            "#,
            params![
                state.session_id,
                ts_to_sql(&state.started_at),
                state.active,
                state.water_nudge_counter,
                state.auto_alert_sent,
                state.zone.label(),
                state.current_bac,
            ],
        )?;

        tx.execute("DELETE FROM session_drinks", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO session_drinks (id, session_id, position, label, kind, quantity,
                                            volume_ml, abv_percent, bac_at_log, logged_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for (position, event) in state.drinks.iter().enumerate() {
                let (kind, quantity, volume_ml, abv_percent) = match event.amount {
                    DrinkAmount::StandardDrinks(std) => ("standard_drinks", Some(std), None, None),
                    DrinkAmount::Volume {
                        volume_ml,
                        abv_percent,
                    } => ("volume", None, Some(volume_ml), Some(abv_percent)),
                };
                stmt.execute(params![
                    event.id,
                    state.session_id,
                    position as i64,
                    event.label,
                    kind,
                    quantity,
                    volume_ml,
                    abv_percent,
                    event.bac_at_log,
                    ts_to_sql(&event.timestamp),
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            session_id = %state.session_id,
            drinks = state.drinks.len(),
            "Session saved"
        );
        Ok(())
    }

    /// Load the persisted session, if one was ever saved.
    pub fn load_session(&self) -> Result<Option<SessionState>> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT * FROM session_state WHERE id = 1",
                [],
                Self::row_to_session_state,
            )
            .optional()?;

        let Some(mut state) = state else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT * FROM session_drinks WHERE session_id = ? ORDER BY position ASC",
        )?;
        let drinks = stmt
            .query_map([&state.session_id], Self::row_to_session_drink)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        state.drinks = drinks;

        Ok(Some(state))
    }

    fn row_to_session_state(row: &Row) -> rusqlite::Result<SessionState> {
        let zone_str: String = row.get("last_zone")?;
        Ok(SessionState {
            session_id: row.get("session_id")?,
            started_at: ts_from_sql(row, "started_at")?,
            active: row.get("active")?,
            drinks: Vec::new(),
            current_bac: row.get("current_bac")?,
            zone: Zone::parse(&zone_str).unwrap_or_default(),
            water_nudge_counter: row.get("water_nudge_counter")?,
            auto_alert_sent: row.get("auto_alert_sent")?,
        })
    }

    fn row_to_session_drink(row: &Row) -> rusqlite::Result<DrinkEvent> {
        let kind: String = row.get("kind")?;
        let amount = match kind.as_str() {
            "volume" => DrinkAmount::Volume {
                volume_ml: row.get::<_, Option<f64>>("volume_ml")?.unwrap_or(0.0),
                abv_percent: row.get::<_, Option<f64>>("abv_percent")?.unwrap_or(0.0),
            },
            _ => DrinkAmount::StandardDrinks(row.get::<_, Option<f64>>("quantity")?.unwrap_or(0.0)),
        };
        Ok(DrinkEvent {
            id: row.get("id")?,
            label: row.get("label")?,
            amount,
            timestamp: ts_from_sql(row, "logged_at")?,
            bac_at_log: row.get("bac_at_log")?,
        })
    }
}

impl DrinkLogSource for Database {
    async fn list_drink_logs(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<DrinkLogRecord>> {
        Database::list_drink_logs(self, limit, since)
    }
}

impl DrinkRecorder for Database {
    async fn record_drink(&self, record: &DrinkLogRecord) -> Result<()> {
        self.insert_drink_log(record)
    }
}
