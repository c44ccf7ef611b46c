//! Operation timeouts and cancellation
//!
//! Every CRUD operation runs inside an [`OperationContext`]: a deadline derived
//! from the resource's timeout for that operation, and a cancellation token
//! that is a child of the provider's stop token. Remote calls and polling
//! loops are raced against both.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::provider::{ProviderError, ProviderResult};

pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

// Deadline used when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// The four operations of the resource contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Renders as the verb used in error messages ("creating", "retrieving", ...)
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Create => "creating",
            Operation::Read => "retrieving",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
        };
        f.write_str(verb)
    }
}

/// Per-operation timeouts of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_CREATE_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            update: DEFAULT_UPDATE_TIMEOUT,
            delete: DEFAULT_DELETE_TIMEOUT,
        }
    }
}

impl ResourceTimeouts {
    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Replace the timeouts that `overrides` sets
    pub fn with_overrides(mut self, overrides: &TimeoutOverrides) -> Self {
        if let Some(d) = overrides.create {
            self.create = d;
        }
        if let Some(d) = overrides.read {
            self.read = d;
        }
        if let Some(d) = overrides.update {
            self.update = d;
        }
        if let Some(d) = overrides.delete {
            self.delete = d;
        }
        self
    }

    pub fn for_create(&self, stop: &CancellationToken) -> OperationContext {
        OperationContext::new(Operation::Create, self.create, stop)
    }

    pub fn for_read(&self, stop: &CancellationToken) -> OperationContext {
        OperationContext::new(Operation::Read, self.read, stop)
    }

    pub fn for_update(&self, stop: &CancellationToken) -> OperationContext {
        OperationContext::new(Operation::Update, self.update, stop)
    }

    pub fn for_delete(&self, stop: &CancellationToken) -> OperationContext {
        OperationContext::new(Operation::Delete, self.delete, stop)
    }

    /// Create timeout for new resources, update timeout otherwise
    pub fn for_create_update(&self, is_new: bool, stop: &CancellationToken) -> OperationContext {
        if is_new {
            self.for_create(stop)
        } else {
            self.for_update(stop)
        }
    }
}

/// Timeouts set in provider configuration, applied over every resource's defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutOverrides {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

/// Deadline and cancellation for one operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    operation: Operation,
    timeout: Duration,
    deadline: Instant,
    cancel: CancellationToken,
}

impl OperationContext {
    pub fn new(operation: Operation, timeout: Duration, stop: &CancellationToken) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            operation,
            timeout,
            deadline,
            cancel: stop.child_token(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Cancel this operation only
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `future` unless the deadline passes or the operation is cancelled
    ///
    /// `id` describes the resource for the error raised in either case.
    pub async fn run<F: Future>(&self, id: &str, future: F) -> ProviderResult<F::Output> {
        tokio::select! {
            output = future => Ok(output),
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled {
                operation: self.operation,
                id: id.to_string(),
            }),
            _ = tokio::time::sleep_until(self.deadline) => Err(ProviderError::Timeout {
                operation: self.operation,
                id: id.to_string(),
                after: self.timeout,
            }),
        }
    }

    /// Sleep for `duration`, cut short by the deadline or cancellation
    pub async fn sleep(&self, id: &str, duration: Duration) -> ProviderResult<()> {
        self.run(id, tokio::time::sleep(duration)).await
    }
}
