use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value as Json, json};

use super::{
    ensure_absent, expand_tags, flatten_location_and_tags, get_unless_gone, normalize_location,
    remote,
};
use crate::client::RemoteObject;
use crate::connection_info::ConnectionInfo;
use crate::poll::{DEFAULT_POLL_INTERVAL, StateWait, poll_until_done};
use crate::provider::{ProviderContext, ProviderError, ProviderResult, Resource};
use crate::resource::{ResourceData, State, Value};
use crate::resource_id::{DataMigrationProjectId, ParseError, ResourceIdentifier};
use crate::timeouts::OperationContext;
use crate::validate;

const RESOURCE_TYPE: &str = "azurerm_data_migration_service_project";

const SOURCE_PLATFORMS: &[&str] = &["SQL"];
const TARGET_PLATFORMS: &[&str] = &["SQLDB"];

/// Interval between provisioning state checks after a write
const PROVISIONING_INTERVAL: Duration = Duration::from_secs(30);

/// A migration project inside a Data Migration Service
pub struct DataMigrationProject;

fn connection_info(data: &ResourceData, key: &str) -> ProviderResult<Option<Json>> {
    match data.get(key) {
        Some(Value::Map(block)) => Ok(Some(ConnectionInfo::expand(block)?.to_json()?)),
        Some(_) => Err(ProviderError::InvalidConfig(format!(
            "{}: `{}` must be a block",
            data.address, key
        ))),
        None => Ok(None),
    }
}

fn provisioning_state(object: &RemoteObject) -> String {
    object
        .property("provisioningState")
        .and_then(Json::as_str)
        .unwrap_or("Succeeded")
        .to_string()
}

impl DataMigrationProject {
    fn expand(&self, data: &ResourceData) -> ProviderResult<Json> {
        let location = normalize_location(data.required_string("location")?);
        let source_platform = data.required_string("source_platform")?;
        validate::one_of("source_platform", source_platform, SOURCE_PLATFORMS)?;
        let target_platform = data.required_string("target_platform")?;
        validate::one_of("target_platform", target_platform, TARGET_PLATFORMS)?;

        let mut properties = json!({
            "sourcePlatform": source_platform,
            "targetPlatform": target_platform,
        });
        if let Some(Value::List(databases)) = data.get("source_databases") {
            let databases: Vec<Json> = databases
                .iter()
                .filter_map(Value::as_str)
                .map(|name| json!({ "sourceDatabaseName": name }))
                .collect();
            properties["databasesInfo"] = Json::Array(databases);
        }
        if let Some(info) = connection_info(data, "source_connection_info")? {
            properties["sourceConnectionInfo"] = info;
        }
        if let Some(info) = connection_info(data, "target_connection_info")? {
            properties["targetConnectionInfo"] = info;
        }

        Ok(json!({
            "location": location,
            "properties": properties,
            "tags": expand_tags(data),
        }))
    }

    async fn create_update(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State> {
        let name = data.required_string("name")?;
        validate::data_migration_name("name", name)?;
        let service_name = data.required_string("service_name")?;
        validate::data_migration_name("service_name", service_name)?;
        let resource_group = data.required_string("resource_group_name")?;
        let id = DataMigrationProjectId::new(
            &provider.config.subscription_id,
            resource_group,
            service_name,
            name,
        )
        .id();

        if data.is_new_resource() {
            ensure_absent(provider, ctx, RESOURCE_TYPE, &id).await?;
        }

        let body = self.expand(data)?;
        let handle = remote(ctx, &id, provider.client.begin_create_or_update(&id, body)).await?;
        poll_until_done(ctx, provider.client.as_ref(), &handle, DEFAULT_POLL_INTERVAL).await?;

        let client = provider.client.as_ref();
        let project: &str = &id;
        let wait = StateWait {
            pending: vec!["Creating".to_string(), "Updating".to_string()],
            target: vec!["Succeeded".to_string()],
            refresh: move || async move {
                let object = remote(ctx, project, client.get(project)).await?;
                let state = provisioning_state(&object);
                Ok::<_, ProviderError>((object, state))
            },
            min_interval: PROVISIONING_INTERVAL,
        };
        let object = wait.wait(ctx, &id).await?;

        let parsed = DataMigrationProjectId::parse(&object.id)
            .map_err(|e| ProviderError::invalid_id(&object.id, e))?;
        Ok(State::existing(data.address.clone(), flatten(&parsed, &object)?)
            .with_identifier(parsed.id()))
    }
}

fn flatten(id: &DataMigrationProjectId, object: &RemoteObject) -> ProviderResult<HashMap<String, Value>> {
    let mut attributes = HashMap::new();
    attributes.insert("name".to_string(), Value::from(id.name.clone()));
    attributes.insert("service_name".to_string(), Value::from(id.service_name.clone()));
    attributes.insert(
        "resource_group_name".to_string(),
        Value::from(id.resource_group.clone()),
    );
    flatten_location_and_tags(object, &mut attributes);

    for (attribute, property) in [
        ("source_platform", "sourcePlatform"),
        ("target_platform", "targetPlatform"),
    ] {
        if let Some(platform) = object.property(property).and_then(Json::as_str) {
            attributes.insert(attribute.to_string(), Value::from(platform));
        }
    }

    let databases = object
        .property("databasesInfo")
        .and_then(Json::as_array)
        .map(|infos| {
            infos
                .iter()
                .filter_map(|info| info.get("sourceDatabaseName").and_then(Json::as_str))
                .map(Value::from)
                .collect()
        })
        .unwrap_or_default();
    attributes.insert("source_databases".to_string(), Value::List(databases));

    for (attribute, property) in [
        ("source_connection_info", "sourceConnectionInfo"),
        ("target_connection_info", "targetConnectionInfo"),
    ] {
        if let Some(wire) = object.property(property).filter(|w| !w.is_null()) {
            let info = ConnectionInfo::from_json(&object.id, wire)?;
            attributes.insert(attribute.to_string(), Value::Map(info.flatten()));
        }
    }
    Ok(attributes)
}

#[async_trait]
impl Resource for DataMigrationProject {
    fn resource_type(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn validate_id(&self, id: &str) -> Result<(), ParseError> {
        DataMigrationProjectId::parse(id).map(|_| ())
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
        let id = DataMigrationProjectId::parse(raw).map_err(|e| ProviderError::invalid_id(raw, e))?;

        let Some(object) = get_unless_gone(provider, ctx, &id.id()).await? else {
            return Ok(State::not_found(data.address.clone()));
        };
        Ok(State::existing(data.address.clone(), flatten(&id, &object)?).with_identifier(id.id()))
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
        let id = DataMigrationProjectId::parse(raw)
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
