//! Durable key-value backend the client stores persist into.
//!
//! The backend is an abstract synchronous get/set/remove-by-key store with
//! process-wide scope and no built-in expiry. Stores never let a backend
//! failure escape: reads of missing, unparseable or wrongly-shaped values
//! resolve to the entity's empty form, and failed writes are logged and
//! dropped. Callers must not assume a write is durable.

pub mod file;
pub mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Backend keys owned by the client stores.
pub mod keys {
    /// Key for the authenticated session record.
    pub const SESSION: &str = "tt_session";

    /// Key for the cart line items.
    pub const CART: &str = "tt_cart";

    /// Key for the persisted device identifier.
    pub const DEVICE_ID: &str = "tt_device_id";

    /// Prefix for per-action rate-limit records.
    pub const RATE_LIMIT_PREFIX: &str = "tt_rl_";

    /// Backend key for the rate-limit record of `action`.
    #[must_use]
    pub fn rate_limit(action: &str) -> String {
        format!("{RATE_LIMIT_PREFIX}{action}")
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The backend refuses writes (disabled storage, quota exceeded).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Synchronous key-value store with string values.
pub trait StorageBackend: Send + Sync {
    /// Get the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the write.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the write.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON record, failing open to `None`.
pub(crate) fn load<T: DeserializeOwned>(backend: &dyn StorageBackend, key: &str) -> Option<T> {
    let raw = match backend.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Storage read failed, treating record as absent");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed stored record");
            None
        }
    }
}

/// Encode and store a JSON record, swallowing failures.
pub(crate) fn save<T: Serialize + ?Sized>(backend: &dyn StorageBackend, key: &str, value: &T) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to encode record, write dropped");
            return;
        }
    };

    if let Err(e) = backend.set(key, &encoded) {
        tracing::warn!(key, error = %e, "Storage write failed, write dropped");
    }
}

/// Remove a record, swallowing failures.
pub(crate) fn discard(backend: &dyn StorageBackend, key: &str) {
    if let Err(e) = backend.remove(key) {
        tracing::warn!(key, error = %e, "Storage remove failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(keys::rate_limit("login"), "tt_rl_login");
    }

    #[test]
    fn test_load_fails_open_on_garbage() {
        let backend = MemoryBackend::new();
        backend.set("k", "{not json").unwrap();
        assert!(load::<serde_json::Value>(&backend, "k").is_none());
        assert!(load::<serde_json::Value>(&backend, "missing").is_none());
    }

    #[test]
    fn test_save_swallows_backend_failure() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        save(&backend, "k", &vec![1, 2, 3]);
        discard(&backend, "k");
        backend.set_fail_writes(false);
        assert_eq!(backend.get("k").unwrap(), None);
    }
}
