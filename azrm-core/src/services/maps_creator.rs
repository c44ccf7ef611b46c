use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use super::{ensure_absent, expand_tags, flatten_location_and_tags, get_unless_gone, normalize_location, remote};
use crate::poll::{DEFAULT_POLL_INTERVAL, poll_until_done};
use crate::provider::{ProviderContext, ProviderError, ProviderResult, Resource};
use crate::resource::{ResourceData, State, Value};
use crate::resource_id::{CreatorId, MapsAccountId, ParseError, ResourceIdentifier};
use crate::timeouts::OperationContext;
use crate::validate;

const RESOURCE_TYPE: &str = "azurerm_maps_creator";

/// A Creator of a Maps account
pub struct MapsCreator;

impl MapsCreator {
    async fn create_update(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let name = data.required_string("name")?;
        let account_id: MapsAccountId =
            validate::resource_id("maps_account_id", data.required_string("maps_account_id")?)?;
        let location = normalize_location(data.required_string("location")?);
        let id = CreatorId::new(
            &account_id.subscription_id,
            &account_id.resource_group,
            &account_id.name,
            name,
        );
        let canonical = id.id();

        if data.is_new_resource() {
            ensure_absent(provider, ctx, RESOURCE_TYPE, &canonical).await?;
        }

        let storage_units = data.get_int("storage_units").unwrap_or(1);
        if !(1..=100).contains(&storage_units) {
            return Err(ProviderError::InvalidConfig(format!(
                "{}: `storage_units` must be between 1 and 100",
                data.address
            )));
        }
        let body = json!({
            "location": location,
            "properties": { "storageUnits": storage_units },
            "tags": expand_tags(data),
        });

        let handle = remote(ctx, &canonical, provider.client.begin_create_or_update(&canonical, body)).await?;
        poll_until_done(ctx, provider.client.as_ref(), &handle, DEFAULT_POLL_INTERVAL).await?;

        let data = data.clone().with_id(canonical);
        let state = self.read(provider, ctx, &data).await?;
        if !state.exists {
            return Err(ProviderError::NotFound {
                operation: ctx.operation(),
                id: id.id(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl Resource for MapsCreator {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn validate_id(&self, id: &str) -> Result<(), ParseError> {
        CreatorId::parse(id).map(|_| ())
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
        let id = CreatorId::parse(raw).map_err(|e| ProviderError::invalid_id(raw, e))?;

        let Some(object) = get_unless_gone(provider, ctx, &id.id()).await? else {
            return Ok(State::not_found(data.address.clone()));
        };

        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::from(id.name.clone()));
        attributes.insert("maps_account_id".to_string(), Value::from(id.account_id().id()));
        if let Some(units) = object.property("storageUnits").and_then(|u| u.as_i64()) {
            attributes.insert("storage_units".to_string(), Value::from(units));
        }
        flatten_location_and_tags(&object, &mut attributes);
        Ok(State::existing(data.address.clone(), attributes).with_identifier(id.id()))
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
        let id = CreatorId::parse(raw)
            .map_err(|e| ProviderError::invalid_id(raw, e))?
            .id();

        let handle = match remote(ctx, &id, provider.client.begin_delete(&id)).await {
            Ok(handle) => handle,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        poll_until_done(ctx, provider.client.as_ref(), &handle, DEFAULT_POLL_INTERVAL).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, InMemoryClient};
    use crate::services::testing::{SUB, context, provider_with};
    use crate::timeouts::Operation;
    use std::sync::Arc;

    fn account_id() -> String {
        format!("/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.Maps/accounts/acc1", SUB)
    }

    fn creator_id() -> String {
        format!("{}/creators/creator1", account_id())
    }

    fn creator() -> ResourceData {
        let tags = HashMap::from([("env".to_string(), Value::from("test"))]);
        ResourceData::new(RESOURCE_TYPE, "main")
            .with_attribute("name", "creator1")
            .with_attribute("maps_account_id", account_id())
            .with_attribute("location", "West Europe")
            .with_attribute("storage_units", 3i64)
            .with_attribute("tags", Value::Map(tags))
    }

    #[tokio::test]
    async fn test_create() {
        let client = Arc::new(InMemoryClient::new());
        let provider = provider_with(client.clone());

        let ctx = context(&provider, Operation::Create);
        let state = MapsCreator.create(&provider, &ctx, &creator()).await.unwrap();

        assert_eq!(state.identifier, Some(creator_id()));
        assert_eq!(state.attributes.get("location"), Some(&Value::from("westeurope")));
        assert_eq!(state.attributes.get("storage_units"), Some(&Value::from(3i64)));
        assert_eq!(
            state.attributes.get("tags"),
            Some(&Value::Map(HashMap::from([("env".to_string(), Value::from("test"))])))
        );
        assert!(client.contains(&creator_id()));
    }

    #[tokio::test]
    async fn test_update_skips_existence_check() {
        let client = Arc::new(InMemoryClient::new());
        client.insert(creator_id(), json!({"location": "westeurope", "properties": {"storageUnits": 1}}));
        let provider = provider_with(client.clone());
        let data = creator().with_id(creator_id());

        let ctx = context(&provider, Operation::Update);
        let state = MapsCreator.update(&provider, &ctx, &data).await.unwrap();
        assert_eq!(state.attributes.get("storage_units"), Some(&Value::from(3i64)));
    }

    #[tokio::test]
    async fn test_create_existing_requires_import() {
        let client = Arc::new(InMemoryClient::new());
        client.insert(creator_id(), json!({}));
        let provider = provider_with(client);

        let ctx = context(&provider, Operation::Create);
        let err = MapsCreator.create(&provider, &ctx, &creator()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequiresImport { .. }));
    }

    #[tokio::test]
    async fn test_existence_check_can_be_disabled() {
        let client = Arc::new(InMemoryClient::new());
        client.insert(creator_id(), json!({}));
        let mut provider = provider_with(client);
        provider.config.check_existing_on_create = false;

        let ctx = context(&provider, Operation::Create);
        assert!(MapsCreator.create(&provider, &ctx, &creator()).await.is_ok());
    }

    #[tokio::test]
    async fn test_existence_check_error_is_reported() {
        let client = Arc::new(InMemoryClient::new());
        client.fail_next(
            "get",
            ApiError::Status {
                code: 403,
                message: "AuthorizationFailed".to_string(),
            },
        );
        let provider = provider_with(client);

        let ctx = context(&provider, Operation::Create);
        let err = MapsCreator.create(&provider, &ctx, &creator()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RemoteCall { .. }));
    }

    #[tokio::test]
    async fn test_read_and_delete_of_missing_creator() {
        let provider = provider_with(Arc::new(InMemoryClient::new()));
        let data = creator().with_id(creator_id());

        let ctx = context(&provider, Operation::Read);
        assert!(!MapsCreator.read(&provider, &ctx, &data).await.unwrap().exists);

        let ctx = context(&provider, Operation::Delete);
        assert!(MapsCreator.delete(&provider, &ctx, &data).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_rejects_foreign_id() {
        let provider = provider_with(Arc::new(InMemoryClient::new()));
        let data = creator().with_id(account_id());

        let ctx = context(&provider, Operation::Read);
        let err = MapsCreator.read(&provider, &ctx, &data).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidId { .. }));
    }
}
