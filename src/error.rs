use crate::store::StoreError;

/// 注册表错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Service lacks a name")]
    InvalidName,
    #[error("Service {name} port {port} is outside valid range [1, 65535]")]
    InvalidPort { name: String, port: i64 },
    #[error("Failed to encode service record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to decode service record at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Store request failed: {0}")]
    Store(#[from] StoreError),
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: StoreError,
    },
}
