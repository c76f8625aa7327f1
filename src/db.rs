//! Session store
//!
//! Per-user dialogue state with expiry, a bounded conversation log and
//! the buyers waiting on products nobody sells yet. Backed by SQLite.

mod schema;

pub use schema::*;

use crate::state_machine::state::{ConversationState, HistoryEntry, Sender};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Default number of history entries kept per user
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt state for {user_id}: {source}")]
    CorruptState {
        user_id: String,
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    history_limit: usize,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            history_limit: DEFAULT_HISTORY_LIMIT,
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Keep at most `limit` history entries per user
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Cheap round-trip used by the health check
    pub fn ping(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ==================== Dialogue State ====================

    /// Get the live state for a user. Expired rows are deleted and reported
    /// as absent; reading never extends the expiry.
    pub fn get_state(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<ConversationState>> {
        let conn = self.lock()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT state, expires_at FROM user_state WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((state_json, expires_at)) = row else {
            return Ok(None);
        };

        if parse_datetime(&expires_at) <= now {
            conn.execute("DELETE FROM user_state WHERE user_id = ?1", params![user_id])?;
            tracing::debug!(user_id, "Dropped expired dialogue state");
            return Ok(None);
        }

        serde_json::from_str(&state_json)
            .map(Some)
            .map_err(|source| DbError::CorruptState {
                user_id: user_id.to_string(),
                source,
            })
    }

    /// Store the state for a user; every write restarts the expiry window
    pub fn set_state(
        &self,
        user_id: &str,
        state: &ConversationState,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let json = serde_json::to_string(state)?;
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_state (user_id, state, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                state = excluded.state,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![user_id, json, expires_at.to_rfc3339(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn clear_state(&self, user_id: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM user_state WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    // ==================== Conversation History ====================

    /// Append one entry and trim the log to the newest `history_limit` entries
    pub fn append_history(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO history (user_id, sender, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, sender.as_str(), text, now.to_rfc3339()],
        )?;
        tx.execute(
            "DELETE FROM history
             WHERE user_id = ?1
               AND id NOT IN (
                   SELECT id FROM history WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
               )",
            params![user_id, i64::try_from(self.history_limit).unwrap_or(i64::MAX)],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// History for a user, oldest first
    pub fn get_history(&self, user_id: &str) -> DbResult<Vec<HistoryEntry>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT sender, text FROM history WHERE user_id = ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![user_id], |row| {
            let sender: String = row.get(0)?;
            Ok(HistoryEntry {
                sender: Sender::parse(&sender).unwrap_or(Sender::Bot),
                text: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn clear_history(&self, user_id: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM history WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    // ==================== Unfulfilled Demand ====================

    /// Remember that a buyer wants a product in a location (idempotent per triple)
    pub fn record_demand(
        &self,
        user_id: &str,
        product_name: &str,
        location: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO demand_alerts (user_id, product_name, location, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, product_name, location) DO UPDATE SET
                created_at = excluded.created_at",
            params![user_id, product_name, location, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove and return every buyer waiting on this product and location.
    /// Both columns compare case-insensitively.
    pub fn take_demand(&self, product_name: &str, location: &str) -> DbResult<Vec<DemandAlert>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let alerts = {
            let mut stmt = tx.prepare(
                "SELECT user_id, product_name, location, created_at FROM demand_alerts
                 WHERE product_name = ?1 COLLATE NOCASE AND location = ?2 COLLATE NOCASE
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![product_name, location], |row| {
                Ok(DemandAlert {
                    user_id: row.get(0)?,
                    product_name: row.get(1)?,
                    location: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.execute(
            "DELETE FROM demand_alerts
             WHERE product_name = ?1 COLLATE NOCASE AND location = ?2 COLLATE NOCASE",
            params![product_name, location],
        )?;
        tx.commit()?;
        Ok(alerts)
    }

    /// Overwrite a user's stored state with something that is not JSON
    #[cfg(test)]
    pub fn corrupt_state_for_test(&self, user_id: &str) {
        let conn = self.lock().unwrap();
        conn.execute(
            "UPDATE user_state SET state = '{not json' WHERE user_id = ?1",
            params![user_id],
        )
        .unwrap();
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or(DateTime::<Utc>::MIN_UTC, |dt| dt.with_timezone(&Utc))
}
