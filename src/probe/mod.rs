//! Probe module for service reachability checks.
//!
//! A probe answers one question: did the target produce an HTTP response?
//! Application-level status codes (4xx/5xx) still count as reachable.

mod http;

pub use http::*;

use crate::db::ServiceStatus;
use std::time::Duration;

/// Classified result of a single probe attempt.
///
/// Probes are total: transport failures are classified here instead of
/// being returned as errors, so a single malformed target can never abort
/// the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Any HTTP response was received, regardless of status code.
    Reachable { code: u16 },
    /// No response within the probe timeout.
    TimedOut { after: Duration },
    /// DNS resolution failure, connection refused, network unreachable.
    ConnectionFailed { detail: String },
    /// Anything else that went wrong during the attempt.
    OtherError { detail: String },
}

impl ProbeOutcome {
    /// The service status this outcome maps to.
    pub fn status(&self) -> ServiceStatus {
        match self {
            ProbeOutcome::Reachable { .. } => ServiceStatus::Up,
            _ => ServiceStatus::Down,
        }
    }

    /// The HTTP status code, or 0 when no response was obtained.
    pub fn status_code(&self) -> u16 {
        match self {
            ProbeOutcome::Reachable { code } => *code,
            _ => 0,
        }
    }

    /// Human-readable diagnostic, present only on failed probes.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            ProbeOutcome::Reachable { .. } => None,
            ProbeOutcome::TimedOut { after } => {
                Some(format!("Timeout after {}s", after.as_secs()))
            }
            ProbeOutcome::ConnectionFailed { detail } => {
                Some(format!("ConnectionError: {}", detail))
            }
            ProbeOutcome::OtherError { detail } => {
                Some(format!("Unexpected error: {}", detail))
            }
        }
    }
}
