//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Timestamp format used for all datetime columns.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();

        // Cascading deletes from services to history/alert rows depend on this
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::Migration(format!("Enabling foreign keys failed: {}", e)))?;

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    // --- Service CRUD ---

    /// Add a new service and return its ID.
    pub fn add_service(&self, service: &mut Service) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO services (name, url, created_at) VALUES (?1, ?2, ?3)",
            params![service.name, service.url, fmt_time(service.created_at)],
        )?;
        let id = conn.last_insert_rowid();
        service.id = id;
        Ok(id)
    }

    /// Get all services, ordered by ID.
    pub fn get_services(&self) -> Result<Vec<Service>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, url, created_at FROM services ORDER BY id")?;

        let services = stmt
            .query_map([], map_service_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(services)
    }

    /// Get a service by ID.
    pub fn get_service(&self, id: i64) -> Result<Service, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, url, created_at FROM services WHERE id = ?1",
            params![id],
            map_service_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Delete a service. History and alert state rows cascade.
    pub fn delete_service(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // --- Check History ---

    /// Persist a single check record and fill in its generated ID.
    pub fn add_check(&self, record: &mut CheckHistory) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO check_history (service_id, status, status_code, latency, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.service_id,
                record.status,
                record.status_code,
                record.latency,
                fmt_time(record.checked_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        record.id = id;
        Ok(id)
    }

    /// Get check history for a service, newest first.
    pub fn get_history(
        &self,
        service_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CheckHistory>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, service_id, status, status_code, latency, checked_at
             FROM check_history
             WHERE service_id = ?1
             ORDER BY checked_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
        )?;

        let history = stmt
            .query_map(params![service_id, limit, offset], map_check_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(history)
    }

    /// Count all check records for a service.
    pub fn count_checks(&self, service_id: i64) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM check_history WHERE service_id = ?1",
            params![service_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Alert State ---

    /// Get the alert state for a service, if one has been materialized.
    pub fn get_alert_state(&self, service_id: i64) -> Result<Option<AlertState>, DbError> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT id, service_id, last_status, failure_count, last_alert_at, created_at, updated_at
                 FROM alert_states WHERE service_id = ?1",
                params![service_id],
                map_alert_row,
            )
            .optional()?;
        Ok(state)
    }

    /// Upsert the alert state for a service and return the stored row.
    ///
    /// Creates the row on a service's first probe; subsequent writes keep
    /// `created_at` and `last_alert_at` and refresh `updated_at`.
    pub fn save_alert_state(
        &self,
        service_id: i64,
        last_status: ServiceStatus,
        failure_count: i64,
        now: DateTime<Utc>,
    ) -> Result<AlertState, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alert_states (service_id, last_status, failure_count, last_alert_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?4)
             ON CONFLICT(service_id) DO UPDATE SET
             last_status=excluded.last_status, failure_count=excluded.failure_count, updated_at=excluded.updated_at",
            params![service_id, last_status, failure_count, fmt_time(now)],
        )?;

        let state = conn.query_row(
            "SELECT id, service_id, last_status, failure_count, last_alert_at, created_at, updated_at
             FROM alert_states WHERE service_id = ?1",
            params![service_id],
            map_alert_row,
        )?;
        Ok(state)
    }
}

fn map_service_row(row: &Row<'_>) -> SqlResult<Service> {
    let created: String = row.get(3)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        created_at: parse_db_time(&created).unwrap_or_else(Utc::now),
    })
}

fn map_check_row(row: &Row<'_>) -> SqlResult<CheckHistory> {
    let checked: String = row.get(5)?;
    Ok(CheckHistory {
        id: row.get(0)?,
        service_id: row.get(1)?,
        status: row.get(2)?,
        status_code: row.get(3)?,
        latency: row.get(4)?,
        checked_at: parse_db_time(&checked).unwrap_or_else(Utc::now),
    })
}

fn map_alert_row(row: &Row<'_>) -> SqlResult<AlertState> {
    let last_alert: Option<String> = row.get(4)?;
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(AlertState {
        id: row.get(0)?,
        service_id: row.get(1)?,
        last_status: row.get(2)?,
        failure_count: row.get(3)?,
        last_alert_at: last_alert.as_deref().and_then(parse_db_time),
        created_at: parse_db_time(&created).unwrap_or_else(Utc::now),
        updated_at: parse_db_time(&updated).unwrap_or_else(Utc::now),
    })
}

/// Format a datetime for database storage.
fn fmt_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Try various formats
    let formats = [
        TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.9fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    // Try ISO 8601
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
