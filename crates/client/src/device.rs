//! Stable per-installation device identifier.

use std::sync::Arc;

use uuid::Uuid;

use crate::storage::{StorageBackend, keys};

/// Identifier reported when the backend cannot be read at all.
pub const ANONYMOUS_DEVICE_ID: &str = "anonymous";

/// Generates the device id once and hands out the persisted value afterwards.
#[derive(Clone)]
pub struct DeviceIdentity {
    backend: Arc<dyn StorageBackend>,
}

impl DeviceIdentity {
    /// Create an identity over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// The persisted device id, generating and storing a v4 UUID on first use.
    ///
    /// If the new id cannot be stored it is still returned, but the next call
    /// will generate a different one.
    #[must_use]
    pub fn device_id(&self) -> String {
        match self.backend.get(keys::DEVICE_ID) {
            Ok(Some(existing)) if !existing.is_empty() => return existing,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Device id unreadable, reporting anonymous device");
                return ANONYMOUS_DEVICE_ID.to_string();
            }
        }

        let generated = Uuid::new_v4().to_string();
        if let Err(e) = self.backend.set(keys::DEVICE_ID, &generated) {
            tracing::warn!(error = %e, "Failed to persist device id");
        } else {
            tracing::debug!(device_id = %generated, "Generated device id");
        }
        generated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageError};

    #[test]
    fn test_generates_once_and_reuses() {
        let backend = Arc::new(MemoryBackend::new());
        let identity = DeviceIdentity::new(backend.clone());

        let first = identity.device_id();
        assert!(Uuid::parse_str(&first).is_ok());
        assert_eq!(identity.device_id(), first);
        assert_eq!(DeviceIdentity::new(backend).device_id(), first);
    }

    #[test]
    fn test_keeps_existing_value_verbatim() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set(keys::DEVICE_ID, "tt-1700000000000-abc123").unwrap();
        let identity = DeviceIdentity::new(backend);
        assert_eq!(identity.device_id(), "tt-1700000000000-abc123");
    }

    #[test]
    fn test_unwritable_backend_still_returns_an_id() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_fail_writes(true);
        let identity = DeviceIdentity::new(backend);

        let id = identity.device_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    struct UnreadableBackend;

    impl StorageBackend for UnreadableBackend {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("denied".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("denied".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("denied".to_string()))
        }
    }

    #[test]
    fn test_unreadable_backend_is_anonymous() {
        let identity = DeviceIdentity::new(Arc::new(UnreadableBackend));
        assert_eq!(identity.device_id(), ANONYMOUS_DEVICE_ID);
    }
}
