//! State backend trait and error types

use std::collections::HashMap;

use async_trait::async_trait;
use azrm_core::resource::Value;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

/// Errors that can occur when interacting with a state backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The state is locked by another writer
    #[error("State is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
    },

    /// The backend type is not supported
    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    /// Configuration error
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    /// State file is corrupted or invalid
    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// State lineage mismatch (prevents accidental state overwrites)
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    /// A write would not move the serial forward
    #[error("Stale state: stored serial {stored} is not older than {writing}")]
    StaleSerial { stored: u64, writing: u64 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    /// Create an unsupported backend error
    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }

    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Trait for state storage backends
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state from the backend
    ///
    /// Returns `None` if no state exists (first-time use)
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state to the backend
    ///
    /// The state's serial number must be incremented before calling this.
    /// Fails if the stored state has another lineage or a serial at least as
    /// high, or
    /// if another writer holds the state lock.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;
}

/// Configuration for a state backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend type (e.g., "local")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    /// Local backend at `path`
    pub fn local(path: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("path".to_string(), Value::String(path.into()));
        Self {
            backend_type: "local".to_string(),
            attributes,
        }
    }

    /// Get a string attribute value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let error = BackendError::LineageMismatch {
            expected: "a".to_string(),
            actual: "b".to_string(),
        };
        assert_eq!(error.to_string(), "State lineage mismatch: expected a, got b");

        let error = BackendError::unsupported_backend("s3");
        assert_eq!(error.to_string(), "Unsupported backend type: s3");
    }

    #[test]
    fn test_backend_config_get_string() {
        let config = BackendConfig::local("prod.state.json");
        assert_eq!(config.backend_type, "local");
        assert_eq!(config.get_string("path"), Some("prod.state.json"));
        assert_eq!(config.get_string("missing"), None);
    }
}
