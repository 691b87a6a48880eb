//! Service port registry backed by a shared key-value store (etcd).
//!
//! A process advertises the services it exposes as `(name, port, host)`
//! records under a common key prefix, keeps them alive through a periodic
//! heartbeat, removes them on shutdown, and enumerates everything other
//! processes have advertised.
//!
//! Two entry points:
//! - [`RegistryClient`]: one-shot register/unregister/services calls with
//!   bounded retries and per-attempt deadlines.
//! - [`Registry`]: a registration table whose entries a background
//!   scheduler re-asserts every `heartbeat_interval` so store-side pruning
//!   never drops a live service.

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod service;
pub mod store;

// Re-export commonly used items
pub use client::RegistryClient;
pub use config::Config;
pub use error::RegistryError;
pub use registry::{Registry, RegistrationEntry};
pub use service::Service;
pub use store::{EtcdStore, KeyValueStore, MemoryStore, StoreError};
