//! Scheduler module driving periodic health check passes.

use crate::checker::run_health_checks;
use crate::config::ServerConfig;
use crate::db::Store;
use crate::probe::HttpProber;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Runs a health check pass over all registered services on a fixed interval.
pub struct Scheduler {
    store: Arc<Store>,
    prober: HttpProber,
    check_interval: Duration,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(config: &ServerConfig, store: Arc<Store>, prober: HttpProber) -> Self {
        Self {
            store,
            prober,
            check_interval: config.check_interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the periodic check loop in a background task.
    ///
    /// The first pass runs immediately, then once per interval. A pass that
    /// outlasts the interval delays the next tick instead of stacking.
    pub fn start(&self) {
        let store = self.store.clone();
        let prober = self.prober.clone();
        let check_interval = self.check_interval;
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        run_health_checks(&prober, &store).await;
                    }
                }
            }
        });
    }

    /// Stop the periodic check loop.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}
