//! Database model types.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Observed status of a service, as recorded by a probe.
///
/// `Up` means the target answered with *any* HTTP response, including
/// 4xx/5xx. `Down` means no HTTP response was obtained at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Up,
    Down,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Up => "UP",
            ServiceStatus::Down => "DOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UP" => Some(ServiceStatus::Up),
            "DOWN" => Some(ServiceStatus::Down),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ServiceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ServiceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ServiceStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("invalid status: {}", s).into()))
    }
}

/// A registered service to monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// One immutable record of a single probe outcome.
#[derive(Debug, Clone, Serialize)]
pub struct CheckHistory {
    pub id: i64,
    pub service_id: i64,
    pub status: ServiceStatus,
    /// HTTP status code, or 0 when no HTTP response was obtained.
    pub status_code: i64,
    /// Wall-clock duration of the probe attempt in seconds.
    pub latency: f64,
    pub checked_at: DateTime<Utc>,
}

/// Rolling alert bookkeeping per service, one-to-one with `Service`.
///
/// Materialized lazily on a service's first probe. `last_alert_at` is
/// reserved for a future notifier and is never written by this crate.
#[derive(Debug, Clone, Serialize)]
pub struct AlertState {
    pub id: i64,
    pub service_id: i64,
    pub last_status: ServiceStatus,
    pub failure_count: i64,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(ServiceStatus::parse("UP"), Some(ServiceStatus::Up));
        assert_eq!(ServiceStatus::parse("DOWN"), Some(ServiceStatus::Down));
        assert_eq!(ServiceStatus::parse("unknown"), None);
        assert_eq!(ServiceStatus::Up.as_str(), "UP");
        assert_eq!(ServiceStatus::Down.as_str(), "DOWN");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ServiceStatus::Down).unwrap(),
            "\"DOWN\""
        );
    }
}
