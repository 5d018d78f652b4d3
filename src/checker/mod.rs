//! Health check pipeline: probe, record, track.
//!
//! Entry points for the scheduled batch pass over all services and for the
//! on-demand check triggered right after a service is registered.

mod alert;

pub use alert::*;

use crate::db::{CheckHistory, DbError, Service, Store};
use crate::probe::{HttpProber, ProbeOutcome};

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Upper bound on concurrent probes within one batch pass.
const MAX_CONCURRENT_CHECKS: usize = 5;

/// Result of one pipeline run for a single service.
#[derive(Debug, Clone)]
pub struct Checked {
    pub record: CheckHistory,
    pub transition: AlertTransition,
}

/// Probe one service, persist the outcome, and update its alert state.
pub async fn check_service(
    prober: &HttpProber,
    store: &Store,
    service: &Service,
) -> Result<Checked, DbError> {
    let (outcome, latency) = prober.probe(&service.url).await;

    match &outcome {
        ProbeOutcome::Reachable { code } => {
            tracing::info!(
                "Health check OK | service_id={} url={} status_code={}",
                service.id,
                service.url,
                code
            );
        }
        _ => {
            tracing::warn!(
                "Health check FAILED | service_id={} url={} reason={}",
                service.id,
                service.url,
                outcome.failure_reason().unwrap_or_default()
            );
        }
    }

    let checked_at = Utc::now();
    let mut record = CheckHistory {
        id: 0,
        service_id: service.id,
        status: outcome.status(),
        status_code: outcome.status_code() as i64,
        latency,
        checked_at,
    };
    store.add_check(&mut record)?;

    let transition = track_alert(store, service.id, record.status, checked_at)?;
    if transition.is_recovery() {
        tracing::info!(
            "Service recovered | service_id={} after {} failed checks",
            service.id,
            transition.previous_count
        );
    }

    Ok(Checked { record, transition })
}

/// Run one health check pass over every registered service.
///
/// Safe to call with zero services. Pipeline failures are logged and
/// isolated per service; the pass itself never aborts early. Returns the
/// number of services that were checked.
pub async fn run_health_checks(prober: &HttpProber, store: &Store) -> usize {
    let services = match store.get_services() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Health check pass: failed to list services: {}", e);
            return 0;
        }
    };

    if services.is_empty() {
        tracing::debug!("Health check pass: no services registered");
        return 0;
    }

    tracing::info!("Running health checks for {} services", services.len());
    let count = services.len();

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_CHECKS));
    let mut tasks = JoinSet::new();

    for service in services {
        let prober = prober.clone();
        let store = store.clone();
        let semaphore = semaphore.clone();

        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return, // semaphore closed, shutting down
            };
            // One bad service must not kill checks for all the others
            if let Err(e) = check_service(&prober, &store, &service).await {
                tracing::error!(
                    "Health check pipeline failed | service_id={} name={}: {}",
                    service.id,
                    service.name,
                    e
                );
            }
        });
    }

    while tasks.join_next().await.is_some() {}

    tracing::info!("Health check pass complete");
    count
}

/// Run the pipeline once for a single service, outside the schedule.
///
/// Used right after registration so the first data point is available
/// within seconds instead of after the next scheduled pass. Never fails:
/// a vanished service is a no-op, any other error is logged and swallowed.
pub async fn run_immediate_check(prober: &HttpProber, store: &Store, service_id: i64) {
    let service = match store.get_service(service_id) {
        Ok(s) => s,
        Err(DbError::NotFound) => {
            tracing::debug!(
                "Immediate check skipped, service {} no longer exists",
                service_id
            );
            return;
        }
        Err(e) => {
            tracing::error!(
                "Immediate check failed to load service_id={}: {}",
                service_id,
                e
            );
            return;
        }
    };

    match check_service(prober, store, &service).await {
        Ok(_) => tracing::info!("Immediate check complete for service_id={}", service_id),
        Err(e) => tracing::error!(
            "Immediate check failed for service_id={}: {}",
            service_id,
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_store() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    fn register(store: &Store, name: &str, url: &str) -> Service {
        let mut service = Service {
            id: 0,
            name: name.to_string(),
            url: url.to_string(),
            created_at: Utc::now(),
        };
        store.add_service(&mut service).unwrap();
        service
    }

    /// Spawn a local server that answers every request with `response`.
    async fn spawn_canned_server(response: &'static str) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        addr
    }

    /// A localhost URL with nothing listening behind it.
    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}/", listener.local_addr().unwrap())
    }

    #[tokio::test]
    async fn test_check_service_records_up_with_error_code() {
        let (_tmp, store) = test_store();
        let addr = spawn_canned_server(
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let service = register(&store, "NotFound", &format!("http://{}/", addr));

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let checked = check_service(&prober, &store, &service).await.unwrap();

        // Reachable despite the error code
        assert_eq!(checked.record.status, ServiceStatus::Up);
        assert_eq!(checked.record.status_code, 404);
        assert!(checked.record.latency >= 0.0);
        assert!(checked.record.id > 0);
        assert_eq!(checked.transition.failure_count, 0);

        let history = store.get_history(service.id, 50, 0).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status_code, 404);
    }

    #[tokio::test]
    async fn test_check_service_down_increments_failures() {
        let (_tmp, store) = test_store();
        let service = register(&store, "Dead", &dead_url());

        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();

        for expected in 1..=3 {
            let checked = check_service(&prober, &store, &service).await.unwrap();
            assert_eq!(checked.record.status, ServiceStatus::Down);
            assert_eq!(checked.record.status_code, 0);
            assert_eq!(checked.transition.failure_count, expected);
            assert_eq!(checked.transition.previous_count, expected - 1);
        }

        let state = store.get_alert_state(service.id).unwrap().unwrap();
        assert_eq!(state.last_status, ServiceStatus::Down);
        assert_eq!(state.failure_count, 3);
        assert_eq!(store.count_checks(service.id).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_health_checks_with_no_services() {
        let (_tmp, store) = test_store();
        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();

        assert_eq!(run_health_checks(&prober, &store).await, 0);
    }

    #[tokio::test]
    async fn test_run_health_checks_isolates_failures() {
        let (_tmp, store) = test_store();
        let addr = spawn_canned_server(
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let dead = register(&store, "Dead", &dead_url());
        let alive = register(&store, "Alive", &format!("http://{}/", addr));

        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();
        assert_eq!(run_health_checks(&prober, &store).await, 2);

        // The unreachable service did not stop the healthy one from
        // receiving its history row
        assert_eq!(store.count_checks(dead.id).unwrap(), 1);
        assert_eq!(store.count_checks(alive.id).unwrap(), 1);

        let dead_history = store.get_history(dead.id, 50, 0).unwrap();
        assert_eq!(dead_history[0].status, ServiceStatus::Down);
        let alive_history = store.get_history(alive.id, 50, 0).unwrap();
        assert_eq!(alive_history[0].status, ServiceStatus::Up);
    }

    #[tokio::test]
    async fn test_immediate_check_for_missing_service_is_noop() {
        let (_tmp, store) = test_store();
        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();

        // Must not panic or create rows
        run_immediate_check(&prober, &store, 999).await;
        assert_eq!(store.count_checks(999).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_immediate_check_records_first_data_point() {
        let (_tmp, store) = test_store();
        let addr = spawn_canned_server(
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let service = register(&store, "Alive", &format!("http://{}/", addr));

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        run_immediate_check(&prober, &store, service.id).await;

        assert_eq!(store.count_checks(service.id).unwrap(), 1);
        let state = store.get_alert_state(service.id).unwrap().unwrap();
        assert_eq!(state.last_status, ServiceStatus::Up);
    }
}
