//! Management client - the seam to the remote management API
//!
//! Resources never talk HTTP themselves; they go through [`ManagementClient`],
//! keyed by canonical resource IDs. Mutating calls start long-running
//! operations whose handles are polled until done (see [`crate::poll`]).

mod memory;

pub use memory::InMemoryClient;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by the management API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The addressed object does not exist
    #[error("resource {0:?} was not found")]
    NotFound(String),

    /// The request conflicts with the current state of the object
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success response
    #[error("unexpected status {code}: {message}")]
    Status { code: u16, message: String },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// An object as returned by the management API
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    /// Remote-assigned canonical ID
    pub id: String,
    /// Full response body (`name`, `location`, `properties`, ...)
    pub body: serde_json::Value,
}

impl RemoteObject {
    /// Look up a field inside `properties`
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.body.get("properties").and_then(|p| p.get(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateOrUpdate,
    Delete,
}

/// Handle of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationHandle {
    pub operation_id: String,
    pub kind: OperationKind,
    /// ID of the object the operation acts on
    pub resource_id: String,
}

/// Progress of a long-running operation
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    InProgress,
    /// Finished; create/update operations carry the resulting object
    Succeeded(Option<RemoteObject>),
    Failed(String),
}

#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Fetch an object by ID
    async fn get(&self, id: &str) -> ApiResult<RemoteObject>;

    /// Start creating or replacing an object
    async fn begin_create_or_update(
        &self,
        id: &str,
        body: serde_json::Value,
    ) -> ApiResult<OperationHandle>;

    /// Merge `patch` into an existing object's `properties` and return the result
    async fn update(&self, id: &str, patch: serde_json::Value) -> ApiResult<RemoteObject>;

    /// Start deleting an object
    async fn begin_delete(&self, id: &str) -> ApiResult<OperationHandle>;

    /// Check on a long-running operation
    async fn poll(&self, operation: &OperationHandle) -> ApiResult<PollStatus>;
}
