//! Alert-state transition tracking.
//!
//! Tracks the last observed status and consecutive-failure streak per
//! service. Notification dispatch is out of scope; this module only exposes
//! the transitions a future notifier would consume.

use chrono::{DateTime, Utc};

use crate::db::{DbError, ServiceStatus, Store};

/// The failure-count transition produced by recording one probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTransition {
    pub last_status: ServiceStatus,
    pub previous_count: i64,
    pub failure_count: i64,
}

impl AlertTransition {
    /// True when a healthy service just recorded its first failure.
    pub fn is_new_failure(&self) -> bool {
        self.previous_count == 0 && self.failure_count > 0
    }

    /// True when a failing service just came back up.
    pub fn is_recovery(&self) -> bool {
        self.previous_count > 0 && self.failure_count == 0
    }
}

/// Compute the next consecutive-failure count.
///
/// UP resets the streak; DOWN extends it by exactly one.
pub fn next_failure_count(previous_count: i64, status: ServiceStatus) -> i64 {
    match status {
        ServiceStatus::Up => 0,
        ServiceStatus::Down => previous_count + 1,
    }
}

/// Apply one probe outcome to a service's alert state.
///
/// A missing row is the UP/0 baseline; the first probe materializes it, so
/// exactly one row per service exists from then on.
pub fn track_alert(
    store: &Store,
    service_id: i64,
    status: ServiceStatus,
    now: DateTime<Utc>,
) -> Result<AlertTransition, DbError> {
    let previous_count = store
        .get_alert_state(service_id)?
        .map(|state| state.failure_count)
        .unwrap_or(0);

    let failure_count = next_failure_count(previous_count, status);
    let state = store.save_alert_state(service_id, status, failure_count, now)?;

    Ok(AlertTransition {
        last_status: state.last_status,
        previous_count,
        failure_count: state.failure_count,
    })
}
