//! Configuration module for the SLA monitor.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Server configuration, loaded once at startup and passed by reference
/// into each component's constructor. There is no global settings object.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "sla-monitor.db")
    pub db_path: String,
    /// Interval between scheduled health check passes (default: 120s)
    pub check_interval: Duration,
    /// Timeout for each individual probe (default: 5s)
    pub probe_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "sla-monitor.db".to_string(),
            check_interval: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SLA_MONITOR_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SLA_MONITOR_DB_PATH`: Database file path (default: "sla-monitor.db")
    /// - `SLA_MONITOR_CHECK_INTERVAL_SECS`: Seconds between passes (default: 120)
    /// - `SLA_MONITOR_PROBE_TIMEOUT_SECS`: Per-probe timeout (default: 5)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("SLA_MONITOR_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("SLA_MONITOR_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(secs_str) = env::var("SLA_MONITOR_CHECK_INTERVAL_SECS") {
            if let Ok(secs) = secs_str.parse::<u64>() {
                if secs > 0 {
                    cfg.check_interval = Duration::from_secs(secs);
                }
            }
        }

        if let Ok(secs_str) = env::var("SLA_MONITOR_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = secs_str.parse::<u64>() {
                if secs > 0 {
                    cfg.probe_timeout = Duration::from_secs(secs);
                }
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "sla-monitor.db");
        assert_eq!(cfg.check_interval, Duration::from_secs(120));
        assert_eq!(cfg.probe_timeout, Duration::from_secs(5));
    }
}
