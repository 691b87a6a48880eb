use async_trait::async_trait;
use etcd_client::{Client, GetOptions, KvClient};
use tonic::Code;

use super::{KeyValueStore, StoreError};

/// etcd-backed store. `KvClient` is a cheaply clonable channel handle, so
/// each request clones its own and concurrent calls never serialize.
pub struct EtcdStore {
    kv: KvClient,
}

impl EtcdStore {
    /// Connect to the given etcd endpoints.
    pub async fn connect(endpoints: &[String]) -> Result<Self, StoreError> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect to etcd: {e}")))?;
        Ok(Self {
            kv: client.kv_client(),
        })
    }
}

// DEADLINE_EXCEEDED 可能来自服务端或代理，同样按瞬时错误处理
fn map_err(e: etcd_client::Error) -> StoreError {
    match e {
        etcd_client::Error::GRpcStatus(status) if status.code() == Code::DeadlineExceeded => {
            StoreError::Timeout
        }
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl KeyValueStore for EtcdStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.kv
            .clone()
            .put(key, value, None)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let resp = self.kv.clone().delete(key, None).await.map_err(map_err)?;
        if resp.deleted() == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let resp = self
            .kv
            .clone()
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(map_err)?;

        // etcd range reads come back ordered by key
        let mut entries = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            let key = kv
                .key_str()
                .map_err(|e| StoreError::Backend(format!("non-utf8 key in range read: {e}")))?;
            entries.push((key.to_string(), kv.value().to_vec()));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use tonic::Status;

    use super::*;

    #[test]
    fn deadline_exceeded_status_is_transient() {
        let err = map_err(etcd_client::Error::GRpcStatus(Status::deadline_exceeded(
            "context deadline exceeded",
        )));
        assert!(err.is_timeout());
    }

    #[test]
    fn other_statuses_are_terminal() {
        for status in [
            Status::permission_denied("no"),
            Status::unavailable("etcd down"),
            Status::internal("boom"),
        ] {
            let err = map_err(etcd_client::Error::GRpcStatus(status));
            assert!(matches!(err, StoreError::Backend(_)));
        }
    }
}
