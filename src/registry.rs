use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::RegistryClient;
use crate::error::RegistryError;
use crate::service::Service;

/// One row of the registration table: the advertised record plus the
/// outcome of its most recent heartbeat attempt.
#[derive(Debug, Clone)]
pub struct RegistrationEntry {
    pub service: Service,
    /// Unix seconds of the last re-assertion attempt, 0 = never attempted.
    pub last_attempt: i64,
    /// Error string of the last attempt, `None` when it succeeded or no
    /// attempt has run yet.
    pub last_error: Option<String>,
}

/// Registration table plus its background heartbeat scheduler.
///
/// `register` only records the intent locally; a single background task,
/// started lazily on the first registration, re-asserts every table entry
/// through the [`RegistryClient`] on a fixed period so records survive
/// store-side pruning. Keep one `Registry` per process.
pub struct Registry {
    client: RegistryClient,
    table: Arc<DashMap<String, RegistrationEntry>>,
    heartbeat_started: AtomicBool,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Registry {
    pub fn new(client: RegistryClient) -> Self {
        Self {
            client,
            table: Arc::new(DashMap::new()),
            heartbeat_started: AtomicBool::new(false),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &RegistryClient {
        &self.client
    }

    /// Declare a (service, port) advertisement. Overwrites any previous
    /// entry under the same name (last writer wins) and starts the
    /// heartbeat scheduler on first use. Never contacts the store and
    /// never fails; store outcomes land on the entry each cycle.
    pub fn register(&self, name: &str, port: i64) {
        let svc = Service::new(name, port);
        tracing::info!(
            service_name = %name,
            port,
            host = %svc.host,
            "Adding service to registration table"
        );
        self.table.insert(
            name.to_string(),
            RegistrationEntry {
                service: svc,
                last_attempt: 0,
                last_error: None,
            },
        );
        self.ensure_heartbeat();
    }

    /// Drop a (service, port) advertisement: removes the table entry so
    /// the scheduler stops re-asserting it, then deletes the store key
    /// through the retrying client.
    pub async fn unregister(&self, name: &str, port: i64) -> Result<(), RegistryError> {
        if self.table.remove(name).is_some() {
            tracing::info!(
                service_name = %name,
                port,
                "Removed service from registration table"
            );
        }
        self.client.unregister(name, port).await
    }

    /// Everything currently advertised in the store, in key order.
    pub async fn services(&self) -> Result<Vec<Service>, RegistryError> {
        self.client.services().await
    }

    /// Point-in-time copy of the registration table.
    pub fn snapshot(&self) -> HashMap<String, RegistrationEntry> {
        self.table
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Stop the scheduler, wait for the in-flight cycle to drain, then
    /// best-effort unregister every remaining table entry.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down registry");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        let remaining: Vec<(String, i64)> = self
            .table
            .iter()
            .map(|e| (e.key().clone(), e.value().service.port))
            .collect();
        for (name, port) in remaining {
            if let Err(e) = self.client.unregister(&name, port).await {
                tracing::warn!(
                    service_name = %name,
                    port,
                    error = %e,
                    "Failed to unregister service during shutdown"
                );
            }
            self.table.remove(&name);
        }
    }

    // 只启动一次心跳任务
    fn ensure_heartbeat(&self) {
        if self.heartbeat_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let client = self.client.clone();
        let table = self.table.clone();
        let shutdown = self.shutdown.clone();
        let period = client.config().heartbeat_interval();

        self.tracker.spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Heartbeat scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {}
                }
                Self::heartbeat_cycle(&client, &table).await;
            }
        });
    }

    /// One heartbeat cycle: snapshot the table, re-assert every entry
    /// concurrently, join all of them, write each outcome back. A failed
    /// entry never affects its siblings or the cycle.
    async fn heartbeat_cycle(client: &RegistryClient, table: &DashMap<String, RegistrationEntry>) {
        let snapshot: Vec<(String, Service)> = table
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().service.clone()))
            .collect();

        tracing::debug!(services = snapshot.len(), "Starting heartbeat cycle");

        let tasks = snapshot.into_iter().map(|(name, svc)| async move {
            let attempted_at = unix_now();
            let result = client.register(&svc).await;
            (name, attempted_at, result)
        });

        for (name, attempted_at, result) in futures::future::join_all(tasks).await {
            if let Err(ref e) = result {
                tracing::warn!(
                    service_name = %name,
                    error = %e,
                    "Heartbeat re-assertion failed"
                );
            }
            // 条目可能在本周期内被并发注销
            if let Some(mut entry) = table.get_mut(&name) {
                entry.last_attempt = attempted_at;
                entry.last_error = result.err().map(|e| e.to_string());
            }
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
