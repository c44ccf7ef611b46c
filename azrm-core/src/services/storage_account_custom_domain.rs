use std::collections::HashMap;

use async_trait::async_trait;
use log::info;
use serde_json::{Value as Json, json};

use super::remote;
use crate::client::RemoteObject;
use crate::provider::{ProviderContext, ProviderError, ProviderResult, Resource};
use crate::resource::{ResourceData, State, Value};
use crate::resource_id::{ParseError, ResourceIdentifier, StorageAccountCustomDomainId, StorageAccountId};
use crate::timeouts::OperationContext;
use crate::validate;

const RESOURCE_TYPE: &str = "azurerm_storage_account_custom_domain";
const STORAGE_ACCOUNT_RESOURCE_NAME: &str = "azurerm_storage_account";

/// The custom domain of a storage account
///
/// Lives inside the account's `customDomain` property, so every write is a
/// patch of the account taken under the account's lock.
pub struct StorageAccountCustomDomain;

fn custom_domain(account: &RemoteObject) -> Option<&Json> {
    account.property("customDomain").filter(|d| {
        d.get("name")
            .and_then(Json::as_str)
            .is_some_and(|name| !name.is_empty())
    })
}

fn parse_id(data: &ResourceData) -> ProviderResult<StorageAccountCustomDomainId> {
    let raw = data.required_id()?;
    StorageAccountCustomDomainId::parse(raw).map_err(|e| ProviderError::invalid_id(raw, e))
}

async fn patch_account(
    provider: &ProviderContext,
    ctx: &OperationContext,
    account_id: &StorageAccountId,
    custom_domain: Json,
) -> ProviderResult<RemoteObject> {
    let account = account_id.id();
    let _lock = ctx
        .run(&account, provider.locks.by_name(&account_id.name, STORAGE_ACCOUNT_RESOURCE_NAME))
        .await?;
    remote(
        ctx,
        &account,
        provider.client.update(&account, json!({ "customDomain": custom_domain })),
    )
    .await
}

#[async_trait]
impl Resource for StorageAccountCustomDomain {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn validate_id(&self, id: &str) -> Result<(), ParseError> {
        StorageAccountCustomDomainId::parse(id).map(|_| ())
    }

    async fn create(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let name = data.required_string("name")?;
        let account_id: StorageAccountId =
            validate::resource_id("storage_account_id", data.required_string("storage_account_id")?)?;
        validate::storage_account_name("storage_account_id", &account_id.name)?;
        let use_subdomain = data.get_bool_or("use_subdomain", false);
        let id = StorageAccountCustomDomainId::new(
            &account_id.subscription_id,
            &account_id.resource_group,
            &account_id.name,
            name,
        );

        let account = account_id.id();
        let existing = remote(ctx, &account, provider.client.get(&account)).await?;
        if custom_domain(&existing).is_some() {
            return Err(ProviderError::RequiresImport {
                resource_type: RESOURCE_TYPE.to_string(),
                id: id.id(),
            });
        }

        patch_account(
            provider,
            ctx,
            &account_id,
            json!({ "name": name, "useSubDomainName": use_subdomain }),
        )
        .await?;
        info!("bound custom domain {:?} to {}", name, account);

        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::from(name));
        attributes.insert("storage_account_id".to_string(), Value::from(account));
        attributes.insert("use_subdomain".to_string(), Value::from(use_subdomain));
        Ok(State::existing(data.address.clone(), attributes).with_identifier(id.id()))
    }

    async fn read(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let id = parse_id(data)?;
        let account = id.storage_account_id().id();

        let existing = match remote(ctx, &account, provider.client.get(&account)).await {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => return Ok(State::not_found(data.address.clone())),
            Err(e) => return Err(e),
        };
        let Some(domain) = custom_domain(&existing) else {
            return Ok(State::not_found(data.address.clone()));
        };

        let mut attributes = HashMap::new();
        if let Some(name) = domain.get("name").and_then(Json::as_str) {
            attributes.insert("name".to_string(), Value::from(name));
        }
        attributes.insert("storage_account_id".to_string(), Value::from(account));
        let use_subdomain = domain
            .get("useSubDomainName")
            .and_then(Json::as_bool)
            .unwrap_or(false);
        attributes.insert("use_subdomain".to_string(), Value::from(use_subdomain));
        Ok(State::existing(data.address.clone(), attributes).with_identifier(id.id()))
    }

    async fn update(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let id = parse_id(data)?;
        let account_id = id.storage_account_id();
        let account = account_id.id();

        let existing = remote(ctx, &account, provider.client.get(&account)).await?;
        let Some(domain) = custom_domain(&existing) else {
            return Err(ProviderError::NotFound {
                operation: ctx.operation(),
                id: id.id(),
            });
        };

        let mut domain = domain.clone();
        if let (Json::Object(map), Some(use_subdomain)) = (&mut domain, data.get_bool("use_subdomain")) {
            map.insert("useSubDomainName".to_string(), Json::Bool(use_subdomain));
        }
        patch_account(provider, ctx, &account_id, domain).await?;

        self.read(provider, ctx, data).await
    }

    async fn delete(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<()> {
        let id = parse_id(data)?;
        match patch_account(provider, ctx, &id.storage_account_id(), json!({})).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryClient;
    use crate::services::testing::{SUB, context, provider_with};
    use crate::timeouts::Operation;
    use std::sync::Arc;
    use std::time::Duration;

    fn account_id() -> String {
        format!(
            "/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/acct1",
            SUB
        )
    }

    fn domain_id() -> String {
        format!("{}/customDomains/www.example.com", account_id())
    }

    fn domain() -> ResourceData {
        ResourceData::new(RESOURCE_TYPE, "main")
            .with_attribute("name", "www.example.com")
            .with_attribute("storage_account_id", account_id())
            .with_attribute("use_subdomain", true)
    }

    fn client_with_account(properties: Json) -> Arc<InMemoryClient> {
        let client = Arc::new(InMemoryClient::new());
        client.insert(account_id(), json!({ "properties": properties }));
        client
    }

    #[tokio::test]
    async fn test_create_patches_account() {
        let client = client_with_account(json!({"accessTier": "Hot"}));
        let provider = provider_with(client.clone());

        let ctx = context(&provider, Operation::Create);
        let state = StorageAccountCustomDomain
            .create(&provider, &ctx, &domain())
            .await
            .unwrap();
        assert_eq!(state.identifier, Some(domain_id()));

        let account = client.object(&account_id()).unwrap();
        assert_eq!(
            account["properties"]["customDomain"],
            json!({"name": "www.example.com", "useSubDomainName": true})
        );
        assert_eq!(account["properties"]["accessTier"], "Hot");
    }

    #[tokio::test]
    async fn test_create_with_existing_domain_requires_import() {
        let client = client_with_account(json!({"customDomain": {"name": "other.example.com"}}));
        let provider = provider_with(client.clone());

        let ctx = context(&provider, Operation::Create);
        let err = StorageAccountCustomDomain
            .create(&provider, &ctx, &domain())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RequiresImport { .. }));
        assert!(!client.calls().iter().any(|(m, _)| *m == "update"));
    }

    #[tokio::test]
    async fn test_read_and_update() {
        let client = client_with_account(json!({
            "customDomain": {"name": "www.example.com", "useSubDomainName": false}
        }));
        let provider = provider_with(client.clone());
        let data = domain().with_id(domain_id());

        let ctx = context(&provider, Operation::Read);
        let state = StorageAccountCustomDomain.read(&provider, &ctx, &data).await.unwrap();
        assert_eq!(state.attributes.get("use_subdomain"), Some(&Value::from(false)));
        assert_eq!(
            state.attributes.get("storage_account_id"),
            Some(&Value::from(account_id()))
        );

        let ctx = context(&provider, Operation::Update);
        let state = StorageAccountCustomDomain.update(&provider, &ctx, &data).await.unwrap();
        assert_eq!(state.attributes.get("use_subdomain"), Some(&Value::from(true)));
    }

    #[tokio::test]
    async fn test_read_without_domain_is_not_found_state() {
        let provider = provider_with(client_with_account(json!({})));
        let data = domain().with_id(domain_id());

        let ctx = context(&provider, Operation::Read);
        let state = StorageAccountCustomDomain.read(&provider, &ctx, &data).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn test_delete_clears_domain() {
        let client = client_with_account(json!({"customDomain": {"name": "www.example.com"}}));
        let provider = provider_with(client.clone());
        let data = domain().with_id(domain_id());

        let ctx = context(&provider, Operation::Delete);
        StorageAccountCustomDomain.delete(&provider, &ctx, &data).await.unwrap();

        let account = client.object(&account_id()).unwrap();
        assert_eq!(account["properties"]["customDomain"], json!({}));

        let ctx = context(&provider, Operation::Read);
        let state = StorageAccountCustomDomain.read(&provider, &ctx, &data).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn test_delete_of_missing_account_succeeds() {
        let provider = provider_with(Arc::new(InMemoryClient::new()));
        let data = domain().with_id(domain_id());

        let ctx = context(&provider, Operation::Delete);
        assert!(StorageAccountCustomDomain.delete(&provider, &ctx, &data).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_account_lock() {
        let provider = provider_with(client_with_account(json!({})));
        let _held = provider
            .locks
            .by_name("acct1", STORAGE_ACCOUNT_RESOURCE_NAME)
            .await;

        let ctx = context(&provider, Operation::Create);
        let stopper = provider.stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        let err = StorageAccountCustomDomain
            .create(&provider, &ctx, &domain())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled { .. }));
    }
}
