use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value as Json, json};

use super::{ensure_absent, get_unless_gone, remote, wire_to_block, block_to_wire};
use crate::poll::{DEFAULT_POLL_INTERVAL, poll_until_done};
use crate::provider::{ProviderContext, ProviderError, ProviderResult, Resource};
use crate::resource::{ResourceData, State, Value};
use crate::resource_id::{
    FirewallPolicyId, FirewallPolicyRuleCollectionGroupId, ParseError, ResourceIdentifier,
};
use crate::timeouts::OperationContext;
use crate::validate;

const RESOURCE_TYPE: &str = "azurerm_firewall_policy_rule_collection_group";
/// Lock namespace shared by everything that mutates a firewall policy
const FIREWALL_POLICY_RESOURCE_NAME: &str = "azurerm_firewall_policy";

const FILTER_COLLECTION: &str = "FirewallPolicyFilterRuleCollection";
const NAT_COLLECTION: &str = "FirewallPolicyNatRuleCollection";

/// Rule collection block attribute, collection type and rule type
const COLLECTION_KINDS: &[(&str, &str, &str)] = &[
    ("application_rule_collection", FILTER_COLLECTION, "ApplicationRule"),
    ("network_rule_collection", FILTER_COLLECTION, "NetworkRule"),
    ("nat_rule_collection", NAT_COLLECTION, "NatRule"),
];

/// A rule collection group of a firewall policy
///
/// Groups of one policy are serialized on the policy's name: the API rejects
/// concurrent writes to sibling groups.
pub struct FirewallPolicyRuleCollectionGroup;

impl FirewallPolicyRuleCollectionGroup {
    fn expand(&self, data: &ResourceData) -> ProviderResult<Json> {
        let priority = data.get_int("priority").ok_or_else(|| {
            ProviderError::InvalidConfig(format!("{}: `priority` is required", data.address))
        })?;
        if !(100..=65000).contains(&priority) {
            return Err(ProviderError::InvalidConfig(format!(
                "{}: `priority` must be between 100 and 65000",
                data.address
            )));
        }

        let mut collections = Vec::new();
        for (attribute, collection_type, rule_type) in COLLECTION_KINDS {
            let Some(Value::List(blocks)) = data.get(attribute) else {
                continue;
            };
            for block in blocks {
                collections.push(expand_collection(attribute, block, collection_type, rule_type)?);
            }
        }

        Ok(json!({
            "properties": {
                "priority": priority,
                "ruleCollections": collections,
            }
        }))
    }

    async fn create_update(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let name = data.required_string("name")?;
        let policy_id: FirewallPolicyId =
            validate::resource_id("firewall_policy_id", data.required_string("firewall_policy_id")?)?;
        let id = FirewallPolicyRuleCollectionGroupId::new(
            &policy_id.subscription_id,
            &policy_id.resource_group,
            &policy_id.name,
            name,
        )
        .id();

        if data.is_new_resource() {
            ensure_absent(provider, ctx, RESOURCE_TYPE, &id).await?;
        }

        let body = self.expand(data)?;
        let _lock = ctx
            .run(&id, provider.locks.by_name(&policy_id.name, FIREWALL_POLICY_RESOURCE_NAME))
            .await?;

        let handle = remote(ctx, &id, provider.client.begin_create_or_update(&id, body)).await?;
        poll_until_done(ctx, provider.client.as_ref(), &handle, DEFAULT_POLL_INTERVAL).await?;

        let object = remote(ctx, &id, provider.client.get(&id)).await?;
        if object.id.is_empty() {
            return Err(ProviderError::Decode {
                id,
                message: "empty ID returned".to_string(),
            });
        }
        let parsed = FirewallPolicyRuleCollectionGroupId::parse(&object.id)
            .map_err(|e| ProviderError::invalid_id(&object.id, e))?;

        Ok(State::existing(data.address.clone(), flatten(&parsed, &object.body))
            .with_identifier(parsed.id()))
    }
}

fn expand_collection(
    attribute: &str,
    block: &Value,
    collection_type: &str,
    rule_type: &str,
) -> ProviderResult<Json> {
    let Value::Map(block) = block else {
        return Err(ProviderError::InvalidConfig(format!("`{}` entries must be blocks", attribute)));
    };
    let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
    validate::no_empty_strings(&format!("{}.name", attribute), name)?;
    let priority = block.get("priority").and_then(Value::as_int).unwrap_or_default();
    let action = block.get("action").and_then(Value::as_str).unwrap_or_default();
    let allowed_actions: &[&str] = if collection_type == NAT_COLLECTION {
        &["Dnat"]
    } else {
        &["Allow", "Deny"]
    };
    validate::one_of(&format!("{}.action", attribute), action, allowed_actions)?;

    let rules: Vec<Json> = match block.get("rule") {
        Some(Value::List(rules)) => rules
            .iter()
            .map(|rule| {
                let mut wire = block_to_wire(rule);
                if let Json::Object(map) = &mut wire {
                    map.insert("ruleType".to_string(), Json::String(rule_type.to_string()));
                }
                wire
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(json!({
        "ruleCollectionType": collection_type,
        "name": name,
        "priority": priority,
        "action": { "type": action },
        "rules": rules,
    }))
}

/// Which block a wire rule collection belongs in
fn collection_attribute(collection: &Json) -> Option<&'static str> {
    let collection_type = collection.get("ruleCollectionType").and_then(Json::as_str)?;
    if collection_type == NAT_COLLECTION {
        return Some("nat_rule_collection");
    }
    let network = collection
        .get("rules")
        .and_then(Json::as_array)
        .is_some_and(|rules| {
            rules
                .iter()
                .any(|r| r.get("ruleType").and_then(Json::as_str) == Some("NetworkRule"))
        });
    Some(if network {
        "network_rule_collection"
    } else {
        "application_rule_collection"
    })
}

fn flatten_collection(collection: &Json) -> Value {
    let mut block = HashMap::new();
    if let Some(name) = collection.get("name").and_then(Json::as_str) {
        block.insert("name".to_string(), Value::from(name));
    }
    if let Some(priority) = collection.get("priority").and_then(Json::as_i64) {
        block.insert("priority".to_string(), Value::from(priority));
    }
    if let Some(action) = collection.pointer("/action/type").and_then(Json::as_str) {
        block.insert("action".to_string(), Value::from(action));
    }
    let rules = collection
        .get("rules")
        .and_then(Json::as_array)
        .map(|rules| {
            rules
                .iter()
                .filter_map(|rule| {
                    let mut rule = rule.clone();
                    if let Json::Object(map) = &mut rule {
                        map.remove("ruleType");
                    }
                    wire_to_block(&rule)
                })
                .collect()
        })
        .unwrap_or_default();
    block.insert("rule".to_string(), Value::List(rules));
    Value::Map(block)
}

fn flatten(id: &FirewallPolicyRuleCollectionGroupId, body: &Json) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    attributes.insert(
        "name".to_string(),
        Value::from(id.rule_collection_group_name.clone()),
    );
    attributes.insert(
        "firewall_policy_id".to_string(),
        Value::from(id.firewall_policy_id().id()),
    );

    let properties = body.get("properties");
    let priority = properties
        .and_then(|p| p.get("priority"))
        .and_then(Json::as_i64)
        .unwrap_or_default();
    attributes.insert("priority".to_string(), Value::from(priority));

    for (attribute, _, _) in COLLECTION_KINDS {
        attributes.insert(attribute.to_string(), Value::List(Vec::new()));
    }
    let collections = properties
        .and_then(|p| p.get("ruleCollections"))
        .and_then(Json::as_array);
    for collection in collections.into_iter().flatten() {
        let Some(attribute) = collection_attribute(collection) else {
            continue;
        };
        if let Some(Value::List(blocks)) = attributes.get_mut(attribute) {
            blocks.push(flatten_collection(collection));
        }
    }
    attributes
}

#[async_trait]
impl Resource for FirewallPolicyRuleCollectionGroup {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn validate_id(&self, id: &str) -> Result<(), ParseError> {
        FirewallPolicyRuleCollectionGroupId::parse(id).map(|_| ())
    }

    async fn create(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        self.create_update(provider, ctx, data).await
    }

    async fn read(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let raw = data.required_id()?;
        let id = FirewallPolicyRuleCollectionGroupId::parse(raw)
            .map_err(|e| ProviderError::invalid_id(raw, e))?;

        let Some(object) = get_unless_gone(provider, ctx, &id.id()).await? else {
            return Ok(State::not_found(data.address.clone()));
        };
        Ok(State::existing(data.address.clone(), flatten(&id, &object.body)).with_identifier(id.id()))
    }

    async fn update(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        self.create_update(provider, ctx, data).await
    }

    async fn delete(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<()> {
        let raw = data.required_id()?;
        let id = FirewallPolicyRuleCollectionGroupId::parse(raw)
            .map_err(|e| ProviderError::invalid_id(raw, e))?;
        let canonical = id.id();

        let _lock = ctx
            .run(
                &canonical,
                provider
                    .locks
                    .by_name(&id.firewall_policy_name, FIREWALL_POLICY_RESOURCE_NAME),
            )
            .await?;

        let handle = match remote(ctx, &canonical, provider.client.begin_delete(&canonical)).await {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        poll_until_done(ctx, provider.client.as_ref(), &handle, DEFAULT_POLL_INTERVAL).await?;
        Ok(())
    }
}
