//! Waiting on long-running operations

use std::future::Future;
use std::time::Duration;

use log::debug;

use crate::client::{ManagementClient, OperationHandle, PollStatus, RemoteObject};
use crate::provider::{ProviderError, ProviderResult};
use crate::timeouts::OperationContext;

/// Interval between polls of a long-running operation
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Poll `handle` until the operation finishes, bounded by `ctx`
///
/// Returns the resulting object for create/update operations. A failed
/// operation becomes [`ProviderError::OperationFailed`].
pub async fn poll_until_done(
    ctx: &OperationContext,
    client: &dyn ManagementClient,
    handle: &OperationHandle,
    interval: Duration,
) -> ProviderResult<Option<RemoteObject>> {
    let id = handle.resource_id.as_str();
    let mut polls = 0u32;
    loop {
        polls += 1;
        let status = ctx
            .run(id, client.poll(handle))
            .await?
            .map_err(|e| ProviderError::from_api(ctx.operation(), id, e))?;

        match status {
            PollStatus::InProgress => {
                debug!("{} still in progress after {} polls", handle.operation_id, polls);
                ctx.sleep(id, interval).await?;
            }
            PollStatus::Succeeded(object) => {
                debug!("{} finished after {} polls", handle.operation_id, polls);
                return Ok(object);
            }
            PollStatus::Failed(message) => {
                return Err(ProviderError::OperationFailed {
                    operation: ctx.operation(),
                    id: id.to_string(),
                    message,
                });
            }
        }
    }
}

/// Wait for a refreshed value to reach one of the `target` states
///
/// `refresh` returns the current value with its state string. While the state
/// is one of `pending` the refresh is repeated every `min_interval`; any other
/// state fails the wait.
pub struct StateWait<F> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub refresh: F,
    pub min_interval: Duration,
}

impl<F, Fut, T> StateWait<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<(T, String)>>,
{
    pub async fn wait(mut self, ctx: &OperationContext, id: &str) -> ProviderResult<T> {
        loop {
            let (value, state) = ctx.run(id, (self.refresh)()).await??;
            if self.target.iter().any(|t| *t == state) {
                return Ok(value);
            }
            if !self.pending.iter().any(|p| *p == state) {
                return Err(ProviderError::OperationFailed {
                    operation: ctx.operation(),
                    id: id.to_string(),
                    message: format!(
                        "unexpected state {:?}, wanted one of {:?}",
                        state, self.target
                    ),
                });
            }
            debug!("{} is {:?}, waiting for {:?}", id, state, self.target);
            ctx.sleep(id, self.min_interval).await?;
        }
    }
}
