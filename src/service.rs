use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// A mapping between a service name and port. It may also carry the
/// hostname (or container ID) where the service runs in the `host` field,
/// taken from the `HOSTNAME` environment variable when not set explicitly.
///
/// The JSON field names and their order are the wire format shared with
/// every other build reading the same store; do not rename or reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub port: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
}

impl Service {
    /// Build a record with the host taken from the `HOSTNAME` environment
    /// variable, empty if unset.
    pub fn new(name: impl Into<String>, port: i64) -> Self {
        Self::with_host(name, port, std::env::var("HOSTNAME").unwrap_or_default())
    }

    pub fn with_host(name: impl Into<String>, port: i64, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port,
            host: host.into(),
        }
    }

    // 校验服务名与端口范围
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.is_empty() {
            return Err(RegistryError::InvalidName);
        }
        if !(1..=65535).contains(&self.port) {
            return Err(RegistryError::InvalidPort {
                name: self.name.clone(),
                port: self.port,
            });
        }
        Ok(())
    }

    /// The complete key of the service in the store. A pure function of
    /// the registry root, name and port; `host` is metadata only, so two
    /// records differing only in host collide to the same key.
    pub fn key(&self, registry_root: &str) -> String {
        format!("{}/{}:{}", registry_root, self.name, self.port)
    }

    /// Serialize the record to its JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, RegistryError> {
        serde_json::to_vec(self).map_err(RegistryError::Encode)
    }

    /// Deserialize a record from its JSON wire form. Does not re-run
    /// `validate`; a decoded record reflects whatever the store holds.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, RegistryError> {
        serde_json::from_slice(bytes).map_err(|source| RegistryError::Decode {
            key: key.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_name() {
        let svc = Service::with_host("", 8080, "");
        assert!(matches!(svc.validate(), Err(RegistryError::InvalidName)));
    }

    #[test]
    fn validate_rejects_out_of_range_ports() {
        for port in [0, -1, 65536] {
            let svc = Service::with_host("svc", port, "");
            assert!(
                matches!(svc.validate(), Err(RegistryError::InvalidPort { .. })),
                "port {port} should be rejected"
            );
        }
    }

    #[test]
    fn validate_accepts_port_bounds() {
        assert!(Service::with_host("svc", 1, "").validate().is_ok());
        assert!(Service::with_host("svc", 65535, "").validate().is_ok());
    }

    #[test]
    fn encode_decode_round_trip() {
        let svc = Service::with_host("web", 8080, "node-1");
        let bytes = svc.encode().unwrap();
        let decoded = Service::decode("k", &bytes).unwrap();
        assert_eq!(decoded, svc);
    }

    #[test]
    fn encode_omits_empty_host() {
        let svc = Service::with_host("web", 8080, "");
        let json = String::from_utf8(svc.encode().unwrap()).unwrap();
        assert_eq!(json, r#"{"name":"web","port":8080}"#);

        let decoded = Service::decode("k", json.as_bytes()).unwrap();
        assert_eq!(decoded, svc);
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert!(matches!(
            Service::decode("k", b"not json"),
            Err(RegistryError::Decode { .. })
        ));
    }

    #[test]
    fn key_ignores_host() {
        let a = Service::with_host("web", 8080, "node-1");
        let b = Service::with_host("web", 8080, "node-2");
        assert_eq!(a.key("/registry"), "/registry/web:8080");
        assert_eq!(a.key("/registry"), b.key("/registry"));
    }
}
