use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::error::RegistryError;
use crate::service::Service;
use crate::store::{EtcdStore, KeyValueStore, StoreError};

/// Store client with bounded retries.
///
/// Each operation wraps one store call in a retry loop: every attempt is
/// bounded by `request_timeout`, timeouts sleep `2^attempt` ms and retry,
/// any other failure returns immediately. After `max_retries` attempts of
/// nothing but timeouts the operation fails with
/// [`RegistryError::RetriesExhausted`].
#[derive(Clone)]
pub struct RegistryClient {
    store: Arc<dyn KeyValueStore>,
    config: Config,
}

impl RegistryClient {
    pub fn new(store: Arc<dyn KeyValueStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Connect to the etcd endpoints named in the configuration.
    pub async fn connect(config: Config) -> Result<Self, RegistryError> {
        let store = EtcdStore::connect(&config.endpoints).await?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Advertise a service record, overwriting any previous record under
    /// the same name and port. Validation failures return immediately
    /// without touching the store.
    pub async fn register(&self, svc: &Service) -> Result<(), RegistryError> {
        svc.validate().map_err(|e| {
            tracing::error!(
                service_name = %svc.name,
                port = svc.port,
                error = %e,
                "Service validation failed"
            );
            e
        })?;

        let bytes = svc.encode()?;
        let key = svc.key(&self.config.registry_root);

        self.with_retry("register", Some(svc.name.as_str()), Some(svc.port), || {
            self.store.put(&key, bytes.clone())
        })
        .await?;

        tracing::info!(
            service_name = %svc.name,
            port = svc.port,
            key = %key,
            "Successfully registered service"
        );
        Ok(())
    }

    /// Remove a (service, port) advertisement. Removing a key the store
    /// does not hold counts as success.
    pub async fn unregister(&self, name: &str, port: i64) -> Result<(), RegistryError> {
        let svc = Service::new(name, port);
        svc.validate().map_err(|e| {
            tracing::error!(
                service_name = %name,
                port,
                error = %e,
                "Service validation failed"
            );
            e
        })?;

        let key = svc.key(&self.config.registry_root);
        let store = self.store.as_ref();
        let key_ref = key.as_str();

        self.with_retry("unregister", Some(name), Some(port), || async move {
            match store.delete(key_ref).await {
                // 幂等删除：键不存在视为成功
                Err(StoreError::NotFound(_)) => Ok(()),
                other => other,
            }
        })
        .await?;

        tracing::info!(
            service_name = %name,
            port,
            key = %key,
            "Successfully unregistered service"
        );
        Ok(())
    }

    /// Enumerate every service currently advertised under the registry
    /// root, in the store's key order. One undecodable record fails the
    /// whole call; enumeration never silently drops entries.
    pub async fn services(&self) -> Result<Vec<Service>, RegistryError> {
        let root = self.config.registry_root.clone();
        let entries = self
            .with_retry("services", None, None, || self.store.list(&root))
            .await?;

        let services = entries
            .iter()
            .map(|(key, value)| Service::decode(key, value))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(services = services.len(), "Enumerated registered services");
        Ok(services)
    }

    // 所有操作共用的重试循环；services 操作没有单个服务名
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        service_name: Option<&str>,
        port: Option<i64>,
        mut call: F,
    ) -> Result<T, RegistryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut last = StoreError::Timeout;

        for attempt in 0..self.config.max_retries {
            let outcome = tokio::time::timeout(self.config.request_timeout(), call()).await;
            match outcome {
                Ok(Ok(value)) => return Ok(value),
                // 后端自身报告的超时同样按瞬时错误重试
                Ok(Err(e)) if e.is_timeout() => {
                    tracing::warn!(
                        operation,
                        service_name,
                        port,
                        attempt,
                        error = %e,
                        "Store request timed out, retrying"
                    );
                    last = e;
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        operation,
                        service_name,
                        port,
                        attempt,
                        error = %e,
                        "Store request failed"
                    );
                    return Err(RegistryError::Store(e));
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        operation,
                        service_name,
                        port,
                        attempt,
                        timeout_secs = self.config.request_timeout,
                        "Store request exceeded deadline, retrying"
                    );
                    last = StoreError::Timeout;
                }
            }

            if attempt + 1 < self.config.max_retries {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        tracing::error!(
            operation,
            service_name,
            port,
            attempts = self.config.max_retries,
            "Retries exhausted"
        );
        Err(RegistryError::RetriesExhausted {
            attempts: self.config.max_retries,
            last,
        })
    }
}
