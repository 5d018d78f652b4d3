//! HTTP probe implementation.

use std::time::{Duration, Instant};

use super::ProbeOutcome;

/// Issues HTTP GET probes with a bounded timeout.
///
/// Holds a single shared `reqwest::Client`; cloning is cheap and clones
/// share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    /// Create a prober whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Probe the given URL with a single GET request and classify the result.
    ///
    /// Returns the outcome and the wall-clock latency in seconds. Latency is
    /// measured from just before the request until the outcome is known, so
    /// failed and timed-out probes still yield a meaningful value.
    pub async fn probe(&self, url: &str) -> (ProbeOutcome, f64) {
        let start = Instant::now();

        let outcome = match self.client.get(url).send().await {
            Ok(response) => ProbeOutcome::Reachable {
                code: response.status().as_u16(),
            },
            Err(e) if e.is_timeout() => ProbeOutcome::TimedOut {
                after: self.timeout,
            },
            Err(e) if e.is_connect() => ProbeOutcome::ConnectionFailed {
                detail: e.to_string(),
            },
            Err(e) => ProbeOutcome::OtherError {
                detail: e.to_string(),
            },
        };

        (outcome, start.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

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

    /// Spawn a local server that accepts connections and never responds.
    async fn spawn_silent_server() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let _socket = socket;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });
        addr
    }

    /// An address on localhost with nothing listening on it.
    fn unused_local_addr() -> std::net::SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_probe_error_response_is_reachable() {
        let addr = spawn_canned_server(
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;

        let prober = HttpProber::new(Duration::from_secs(5)).unwrap();
        let (outcome, latency) = prober.probe(&format!("http://{}/", addr)).await;

        assert_eq!(outcome, ProbeOutcome::Reachable { code: 404 });
        assert_eq!(outcome.status(), ServiceStatus::Up);
        assert!(latency >= 0.0);
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let addr = spawn_silent_server().await;

        let prober = HttpProber::new(Duration::from_millis(250)).unwrap();
        let (outcome, latency) = prober.probe(&format!("http://{}/", addr)).await;

        assert!(matches!(outcome, ProbeOutcome::TimedOut { .. }));
        assert_eq!(outcome.status(), ServiceStatus::Down);
        assert_eq!(outcome.status_code(), 0);
        assert!(outcome.failure_reason().unwrap().contains("Timeout"));
        // The attempt blocked for roughly the timeout before giving up
        assert!(latency >= 0.2);
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let addr = unused_local_addr();

        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();
        let (outcome, latency) = prober.probe(&format!("http://{}/", addr)).await;

        assert!(matches!(outcome, ProbeOutcome::ConnectionFailed { .. }));
        assert_eq!(outcome.status_code(), 0);
        assert!(outcome
            .failure_reason()
            .unwrap()
            .starts_with("ConnectionError:"));
        assert!(latency >= 0.0);
    }

    #[tokio::test]
    async fn test_probe_invalid_url_never_panics() {
        let prober = HttpProber::new(Duration::from_secs(1)).unwrap();
        let (outcome, _) = prober.probe("not a url").await;

        assert_eq!(outcome.status(), ServiceStatus::Down);
        assert_eq!(outcome.status_code(), 0);
        assert!(outcome.failure_reason().is_some());
    }
}
