//! In-memory management client for tests and local experiments

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::debug;
use serde_json::Value as Json;

use super::{
    ApiError, ApiResult, ManagementClient, OperationHandle, OperationKind, PollStatus,
    RemoteObject,
};

#[derive(Debug)]
struct PendingOperation {
    handle: OperationHandle,
    body: Option<Json>,
    remaining_polls: u32,
    failure: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Json>,
    operations: HashMap<String, PendingOperation>,
    next_operation: u64,
    polls_before_done: u32,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    operation_failures: VecDeque<String>,
    calls: Vec<(&'static str, String)>,
}

impl Inner {
    fn record(&mut self, method: &'static str, id: &str) -> ApiResult<()> {
        self.calls.push((method, id.to_string()));
        match self.failures.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn start(&mut self, kind: OperationKind, id: &str, body: Option<Json>) -> OperationHandle {
        self.next_operation += 1;
        let handle = OperationHandle {
            operation_id: format!("op-{}", self.next_operation),
            kind,
            resource_id: id.to_string(),
        };
        let pending = PendingOperation {
            handle: handle.clone(),
            body,
            remaining_polls: self.polls_before_done,
            failure: self.operation_failures.pop_front(),
        };
        self.operations
            .insert(handle.operation_id.clone(), pending);
        handle
    }
}

/// A [`ManagementClient`] backed by a map of ID to JSON body
///
/// Long-running operations stay in progress for a configurable number of
/// polls. Failures can be queued per method name (`"get"`,
/// `"begin_create_or_update"`, `"update"`, `"begin_delete"`, `"poll"`).
#[derive(Debug, Default)]
pub struct InMemoryClient {
    inner: Mutex<Inner>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep each long-running operation in progress for `polls` polls
    pub fn with_polls_before_done(self, polls: u32) -> Self {
        self.lock().polls_before_done = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing object
    pub fn insert(&self, id: impl Into<String>, body: Json) {
        let id = id.into();
        let body = with_identity(&id, body);
        self.lock().objects.insert(id, body);
    }

    pub fn object(&self, id: &str) -> Option<Json> {
        self.lock().objects.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().objects.contains_key(id)
    }

    /// Make the next call of `method` fail with `err`
    pub fn fail_next(&self, method: &'static str, err: ApiError) {
        self.lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(err);
    }

    /// Make the next long-running operation report failure
    pub fn fail_next_operation(&self, message: impl Into<String>) {
        self.lock().operation_failures.push_back(message.into());
    }

    /// Calls made so far as `(method, id)` pairs
    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.lock().calls.clone()
    }
}

/// Stamp `id` and `name` onto a body the way the API echoes them back
fn with_identity(id: &str, mut body: Json) -> Json {
    if let Json::Object(map) = &mut body {
        let name = id.rsplit('/').next().unwrap_or_default();
        map.insert("id".to_string(), Json::String(id.to_string()));
        map.insert("name".to_string(), Json::String(name.to_string()));
    }
    body
}

#[async_trait]
impl ManagementClient for InMemoryClient {
    async fn get(&self, id: &str) -> ApiResult<RemoteObject> {
        let mut inner = self.lock();
        inner.record("get", id)?;
        match inner.objects.get(id) {
            Some(body) => Ok(RemoteObject {
                id: id.to_string(),
                body: body.clone(),
            }),
            None => Err(ApiError::NotFound(id.to_string())),
        }
    }

    async fn begin_create_or_update(&self, id: &str, body: Json) -> ApiResult<OperationHandle> {
        let mut inner = self.lock();
        inner.record("begin_create_or_update", id)?;
        let handle = inner.start(OperationKind::CreateOrUpdate, id, Some(body));
        debug!("started {} for {}", handle.operation_id, id);
        Ok(handle)
    }

    async fn update(&self, id: &str, patch: Json) -> ApiResult<RemoteObject> {
        let mut inner = self.lock();
        inner.record("update", id)?;
        let body = inner
            .objects
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;

        if let (Json::Object(target), Json::Object(patch)) = (body, patch) {
            let properties = target
                .entry("properties")
                .or_insert_with(|| Json::Object(Default::default()));
            if let Json::Object(properties) = properties {
                for (key, value) in patch {
                    if value.is_null() {
                        properties.remove(&key);
                    } else {
                        properties.insert(key, value);
                    }
                }
            }
        }

        let body = inner.objects.get(id).cloned().unwrap_or(Json::Null);
        Ok(RemoteObject {
            id: id.to_string(),
            body,
        })
    }

    async fn begin_delete(&self, id: &str) -> ApiResult<OperationHandle> {
        let mut inner = self.lock();
        inner.record("begin_delete", id)?;
        if !inner.objects.contains_key(id) {
            return Err(ApiError::NotFound(id.to_string()));
        }
        let handle = inner.start(OperationKind::Delete, id, None);
        debug!("started {} for {}", handle.operation_id, id);
        Ok(handle)
    }

    async fn poll(&self, operation: &OperationHandle) -> ApiResult<PollStatus> {
        let mut inner = self.lock();
        inner.record("poll", &operation.resource_id)?;

        let pending = inner
            .operations
            .get_mut(&operation.operation_id)
            .ok_or_else(|| ApiError::NotFound(operation.operation_id.clone()))?;
        if pending.remaining_polls > 0 {
            pending.remaining_polls -= 1;
            return Ok(PollStatus::InProgress);
        }

        let Some(pending) = inner.operations.remove(&operation.operation_id) else {
            return Err(ApiError::NotFound(operation.operation_id.clone()));
        };
        if let Some(message) = pending.failure {
            return Ok(PollStatus::Failed(message));
        }

        let id = pending.handle.resource_id;
        match pending.handle.kind {
            OperationKind::CreateOrUpdate => {
                let body = with_identity(&id, pending.body.unwrap_or(Json::Null));
                inner.objects.insert(id.clone(), body.clone());
                Ok(PollStatus::Succeeded(Some(RemoteObject { id, body })))
            }
            OperationKind::Delete => {
                inner.objects.remove(&id);
                Ok(PollStatus::Succeeded(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Maps/accounts/acc1";

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let client = InMemoryClient::new();
        let err = client.get(ID).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_completes_after_polls() {
        let client = InMemoryClient::new().with_polls_before_done(2);
        let handle = client
            .begin_create_or_update(ID, json!({"location": "westeurope"}))
            .await
            .unwrap();

        assert_eq!(client.poll(&handle).await.unwrap(), PollStatus::InProgress);
        assert_eq!(client.poll(&handle).await.unwrap(), PollStatus::InProgress);
        assert!(!client.contains(ID));

        let PollStatus::Succeeded(Some(object)) = client.poll(&handle).await.unwrap() else {
            panic!("expected the operation to succeed");
        };
        assert_eq!(object.id, ID);
        assert_eq!(object.body["name"], json!("acc1"));
        assert!(client.contains(ID));
    }

    #[tokio::test]
    async fn test_update_merges_properties() {
        let client = InMemoryClient::new();
        client.insert(ID, json!({"properties": {"a": 1, "b": 2}}));

        let object = client
            .update(ID, json!({"b": null, "c": 3}))
            .await
            .unwrap();
        assert_eq!(object.body["properties"], json!({"a": 1, "c": 3}));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let client = InMemoryClient::new();
        assert!(client.begin_delete(ID).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let client = InMemoryClient::new();
        client.insert(ID, json!({}));
        client.fail_next("get", ApiError::Transport("connection reset".to_string()));
        client.fail_next_operation("quota exceeded");

        assert!(matches!(client.get(ID).await, Err(ApiError::Transport(_))));
        assert!(client.get(ID).await.is_ok());

        let handle = client.begin_delete(ID).await.unwrap();
        assert_eq!(
            client.poll(&handle).await.unwrap(),
            PollStatus::Failed("quota exceeded".to_string())
        );
        assert!(client.contains(ID));
        assert_eq!(client.calls().len(), 4);
    }
}
