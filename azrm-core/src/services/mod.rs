//! Built-in resources, one module per resource type

mod data_migration_project;
mod firewall_policy_rule_collection_group;
mod maps_creator;
mod storage_account_custom_domain;

pub use data_migration_project::DataMigrationProject;
pub use firewall_policy_rule_collection_group::FirewallPolicyRuleCollectionGroup;
pub use maps_creator::MapsCreator;
pub use storage_account_custom_domain::StorageAccountCustomDomain;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use heck::{ToLowerCamelCase, ToSnakeCase};
use log::warn;
use serde_json::Value as Json;

use crate::client::{ApiResult, RemoteObject};
use crate::provider::{ProviderContext, ProviderError, ProviderResult, Resource};
use crate::resource::{ResourceData, Value};
use crate::timeouts::OperationContext;

/// Every built-in resource
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(DataMigrationProject),
        Arc::new(FirewallPolicyRuleCollectionGroup),
        Arc::new(MapsCreator),
        Arc::new(StorageAccountCustomDomain),
    ]
}

/// Run a management API call inside `ctx`, classifying its error
pub(crate) async fn remote<T>(
    ctx: &OperationContext,
    id: &str,
    call: impl Future<Output = ApiResult<T>>,
) -> ProviderResult<T> {
    ctx.run(id, call)
        .await?
        .map_err(|e| ProviderError::from_api(ctx.operation(), id, e))
}

/// Fail with `RequiresImport` when `id` already exists remotely
///
/// Skipped when the provider is configured not to check.
pub(crate) async fn ensure_absent(
    provider: &ProviderContext,
    ctx: &OperationContext,
    resource_type: &str,
    id: &str,
) -> ProviderResult<()> {
    if !provider.config.check_existing_on_create {
        return Ok(());
    }
    match remote(ctx, id, provider.client.get(id)).await {
        Ok(existing) => Err(ProviderError::RequiresImport {
            resource_type: resource_type.to_string(),
            id: existing.id,
        }),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Fetch `id`, or `None` when it no longer exists
pub(crate) async fn get_unless_gone(
    provider: &ProviderContext,
    ctx: &OperationContext,
    id: &str,
) -> ProviderResult<Option<RemoteObject>> {
    match remote(ctx, id, provider.client.get(id)).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => {
            warn!("{} was not found - removing from state", id);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Lower-case a location and strip its spaces ("West Europe" -> "westeurope")
pub(crate) fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

pub(crate) fn expand_tags(data: &ResourceData) -> Json {
    match data.get("tags") {
        Some(Value::Map(tags)) => Json::Object(
            tags.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), Json::String(s.to_string()))))
                .collect(),
        ),
        _ => Json::Object(Default::default()),
    }
}

/// Copy `location` and `tags` of a remote object into `attributes`
pub(crate) fn flatten_location_and_tags(object: &RemoteObject, attributes: &mut HashMap<String, Value>) {
    if let Some(location) = object.body.get("location").and_then(Json::as_str) {
        attributes.insert("location".to_string(), Value::from(normalize_location(location)));
    }
    let tags = object
        .body
        .get("tags")
        .and_then(Value::from_json)
        .unwrap_or_else(|| Value::Map(HashMap::new()));
    attributes.insert("tags".to_string(), tags);
}

/// Attribute block to a wire object, snake_case keys becoming camelCase
pub(crate) fn block_to_wire(value: &Value) -> Json {
    match value {
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.to_lower_camel_case(), block_to_wire(v)))
                .collect(),
        ),
        Value::List(items) => Json::Array(items.iter().map(block_to_wire).collect()),
        other => other.to_json(),
    }
}

/// Wire object to an attribute block, camelCase keys becoming snake_case
pub(crate) fn wire_to_block(json: &Json) -> Option<Value> {
    match json {
        Json::Object(map) => Some(Value::Map(
            map.iter()
                .filter_map(|(k, v)| wire_to_block(v).map(|v| (k.to_snake_case(), v)))
                .collect(),
        )),
        Json::Array(items) => Some(Value::List(items.iter().filter_map(wire_to_block).collect())),
        other => Value::from_json(other),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::client::InMemoryClient;
    use crate::config::{Environment, ProviderConfig};
    use crate::timeouts::{Operation, TimeoutOverrides};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    pub const SUB: &str = "12345678-1234-9876-4563-123456789012";

    pub fn provider_with(client: Arc<InMemoryClient>) -> ProviderContext {
        let config = ProviderConfig {
            subscription_id: SUB.to_string(),
            environment: Environment::Public,
            check_existing_on_create: true,
            timeouts: TimeoutOverrides::default(),
        };
        ProviderContext::new(client, config)
    }

    pub fn context(provider: &ProviderContext, operation: Operation) -> OperationContext {
        OperationContext::new(operation, Duration::from_secs(30 * 60), &provider.stop)
    }

    pub fn standalone(operation: Operation, timeout: Duration) -> OperationContext {
        OperationContext::new(operation, timeout, &CancellationToken::new())
    }
}
