use std::path::Path;

use chrono::Utc;
use healthpulse_common::{Error, HealthRecord, Result, User};
use rusqlite::{Connection, params};
use tracing::info;

use crate::parse_timestamp;

/// Persistent storage for accounts and health measurements.
pub struct HealthStore {
    conn: Connection,
}

impl HealthStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening health store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    name TEXT,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS health_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    type TEXT NOT NULL,
                    value REAL NOT NULL,
                    unit TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_records_user
                    ON health_records(user_id, created_at);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create an account. A duplicate email is a validation failure, not a
    /// store failure, so the gateway can report it as a client error.
    pub fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<User> {
        let created_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO users (email, name, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, name, password_hash, created_at.to_rfc3339()],
            )
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint failed") {
                    Error::Validation("email already registered".to_string())
                } else {
                    Error::Database(format!("failed to create user: {e}"))
                }
            })?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            email: email.to_string(),
            name: name.map(|s| s.to_string()),
            created_at,
        })
    }

    pub fn user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, name, created_at FROM users WHERE id = ?1")
            .map_err(|e| Error::Database(format!("failed to prepare user query: {e}")))?;

        let user = stmt
            .query_row(params![user_id], user_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Database(format!("failed to load user: {other}"))),
            })?;
        Ok(user)
    }

    /// Look up an account with its password hash for credential checks.
    pub fn user_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, email, name, created_at, password_hash
                 FROM users WHERE email = ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare user query: {e}")))?;

        let row = stmt
            .query_row(params![email], |row| {
                let user = user_from_row(row)?;
                let hash: String = row.get(4)?;
                Ok((user, hash))
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(Error::Database(format!("failed to load user: {other}"))),
            })?;
        Ok(row)
    }

    pub fn add_record(
        &self,
        user_id: i64,
        kind: &str,
        value: f64,
        unit: Option<&str>,
    ) -> Result<HealthRecord> {
        let created_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO health_records (user_id, type, value, unit, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, kind, value, unit, created_at.to_rfc3339()],
            )
            .map_err(|e| Error::Database(format!("failed to add record: {e}")))?;

        Ok(HealthRecord {
            id: self.conn.last_insert_rowid(),
            user_id,
            kind: kind.to_string(),
            value,
            unit: unit.map(|s| s.to_string()),
            created_at,
        })
    }

    /// The `limit` newest measurements for prompt context, newest first.
    pub fn recent_records(&self, user_id: i64, limit: usize) -> Result<Vec<HealthRecord>> {
        self.query_records(
            "SELECT id, user_id, type, value, unit, created_at
             FROM health_records
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
            params![user_id, limit as i64],
        )
    }

    /// All of a user's measurements, newest first, for display.
    pub fn list_records(&self, user_id: i64) -> Result<Vec<HealthRecord>> {
        self.query_records(
            "SELECT id, user_id, type, value, unit, created_at
             FROM health_records
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC",
            params![user_id],
        )
    }

    /// Delete one measurement, scoped to its owner. Returns whether a row
    /// was actually removed.
    pub fn delete_record(&self, user_id: i64, record_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM health_records WHERE id = ?1 AND user_id = ?2",
                params![record_id, user_id],
            )
            .map_err(|e| Error::Database(format!("failed to delete record: {e}")))?;
        Ok(deleted > 0)
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<HealthRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare record query: {e}")))?;

        let rows = stmt
            .query_map(params, |row| {
                let created_at_raw: String = row.get(5)?;
                Ok(HealthRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    value: row.get(3)?,
                    unit: row.get(4)?,
                    created_at: parse_timestamp(&created_at_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to load records: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records
                .push(row.map_err(|e| Error::Database(format!("failed to read record row: {e}")))?);
        }
        Ok(records)
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at_raw: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_timestamp(&created_at_raw),
    })
}
