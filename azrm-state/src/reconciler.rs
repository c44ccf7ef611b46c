//! Drives a provider's CRUD contract and keeps the state file in step with it
//!
//! State is only written after the remote call it records has succeeded:
//! a failed create or update leaves the state untouched, a refresh that
//! finds the remote object gone drops it, and destroying an object that no
//! longer exists still removes it from state.

use azrm_core::provider::{Provider, ProviderError};
use azrm_core::resource::{Address, ResourceData, State};
use log::{info, warn};
use thiserror::Error;

use crate::backend::{BackendError, StateBackend};
use crate::state::{ResourceState, StateFile};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0} is not in the state")]
    NotInState(Address),

    #[error("{0} is already in the state")]
    AlreadyInState(Address),

    #[error("{0} reported success without an identifier")]
    MissingIdentifier(Address),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// What a refresh found
#[derive(Debug, Clone, PartialEq)]
pub enum Refreshed {
    Present(ResourceState),
    /// The remote object was gone and has been dropped from state
    Dropped(ResourceState),
}

pub struct Reconciler<P: Provider> {
    provider: P,
    backend: Box<dyn StateBackend>,
    state: StateFile,
}

impl<P: Provider> Reconciler<P> {
    /// Load the current state from `backend`, starting a new lineage if none exists
    pub async fn load(provider: P, backend: Box<dyn StateBackend>) -> ReconcileResult<Self> {
        let state = backend.read_state().await?.unwrap_or_default();
        Ok(Self {
            provider,
            backend,
            state,
        })
    }

    pub fn state(&self) -> &StateFile {
        &self.state
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Create the resource described by `data` and record it
    pub async fn create(&mut self, data: &ResourceData) -> ReconcileResult<ResourceState> {
        if self
            .state
            .find_resource(&data.address.resource_type, &data.address.name)
            .is_some()
        {
            return Err(ReconcileError::AlreadyInState(data.address.clone()));
        }

        let mut data = data.clone();
        data.id = None;
        let state = self.provider.create(&data).await?;
        self.record(state).await
    }

    /// Update a recorded resource in place with the attributes in `data`
    pub async fn update(&mut self, data: &ResourceData) -> ReconcileResult<ResourceState> {
        let recorded = self.recorded(&data.address)?;
        let data = data.clone().with_id(recorded.id.clone());
        let state = self.provider.update(&data).await?;
        self.record(state).await
    }

    /// Record the result of an import
    pub async fn adopt(&mut self, state: State) -> ReconcileResult<ResourceState> {
        if self
            .state
            .find_resource(&state.address.resource_type, &state.address.name)
            .is_some()
        {
            return Err(ReconcileError::AlreadyInState(state.address));
        }
        self.record(state).await
    }

    /// Read a recorded resource back, dropping it from state if it is gone
    pub async fn refresh(&mut self, address: &Address) -> ReconcileResult<Refreshed> {
        let recorded = self.recorded(address)?;
        let state = self.provider.read(&recorded.to_resource_data()).await?;

        if !state.exists {
            warn!(
                "{} ({}) no longer exists, removing it from state",
                address, recorded.id
            );
            self.state
                .remove_resource(&address.resource_type, &address.name);
            self.persist().await?;
            return Ok(Refreshed::Dropped(recorded));
        }

        // Reads of an existing object always carry its ID; fall back to the recorded one.
        let state = match state.identifier {
            Some(_) => state,
            None => state.with_identifier(recorded.id.clone()),
        };
        self.record(state).await.map(Refreshed::Present)
    }

    /// Delete a recorded resource and remove it from state
    pub async fn destroy(&mut self, address: &Address) -> ReconcileResult<ResourceState> {
        let recorded = self.recorded(address)?;
        match self.provider.delete(&recorded.to_resource_data()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!("{} ({}) was already deleted", address, recorded.id);
            }
            Err(e) => return Err(e.into()),
        }

        self.state
            .remove_resource(&address.resource_type, &address.name);
        self.persist().await?;
        Ok(recorded)
    }

    fn recorded(&self, address: &Address) -> ReconcileResult<ResourceState> {
        self.state
            .find_resource(&address.resource_type, &address.name)
            .cloned()
            .ok_or_else(|| ReconcileError::NotInState(address.clone()))
    }

    async fn record(&mut self, state: State) -> ReconcileResult<ResourceState> {
        let recorded = ResourceState::from_state(&state)
            .ok_or_else(|| ReconcileError::MissingIdentifier(state.address.clone()))?;
        self.state.upsert_resource(recorded.clone());
        self.persist().await?;
        Ok(recorded)
    }

    async fn persist(&mut self) -> ReconcileResult<()> {
        let mut next = self.state.clone();
        next.increment_serial();
        self.backend.write_state(&next).await?;
        info!(
            "state serial {} written ({} resources)",
            next.serial,
            next.resources.len()
        );
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LocalBackend;
    use azrm_core::client::{ApiError, InMemoryClient};
    use azrm_core::config::{Environment, ProviderConfig};
    use azrm_core::provider::{AzureProvider, ProviderContext};
    use azrm_core::resource::Value;
    use azrm_core::timeouts::TimeoutOverrides;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    fn account_id() -> String {
        format!(
            "/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.Maps/accounts/acc1",
            SUB
        )
    }

    fn creator_id() -> String {
        format!("{}/creators/creator1", account_id())
    }

    fn provider(client: Arc<InMemoryClient>) -> AzureProvider {
        let config = ProviderConfig {
            subscription_id: SUB.to_string(),
            environment: Environment::Public,
            check_existing_on_create: true,
            timeouts: TimeoutOverrides::default(),
        };
        AzureProvider::with_builtin_resources(ProviderContext::new(client, config))
    }

    fn creator(units: i64) -> ResourceData {
        ResourceData::new("azurerm_maps_creator", "main")
            .with_attribute("name", "creator1")
            .with_attribute("maps_account_id", account_id())
            .with_attribute("location", "westeurope")
            .with_attribute("storage_units", units)
    }

    async fn reconciler(
        client: Arc<InMemoryClient>,
        path: &Path,
    ) -> Reconciler<AzureProvider> {
        Reconciler::load(provider(client), Box::new(LocalBackend::with_path(path)))
            .await
            .unwrap()
    }

    async fn stored(path: &Path) -> StateFile {
        LocalBackend::with_path(path)
            .read_state()
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_update_destroy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let client = Arc::new(InMemoryClient::new());
        let mut reconciler = reconciler(client.clone(), &path).await;

        let created = reconciler.create(&creator(1)).await.unwrap();
        assert_eq!(created.id, creator_id());
        assert_eq!(stored(&path).await.serial, 1);

        let updated = reconciler.update(&creator(5)).await.unwrap();
        assert_eq!(updated.attributes.get("storage_units"), Some(&json!(5)));
        let state = stored(&path).await;
        assert_eq!(state.serial, 2);
        assert_eq!(state.resources.len(), 1);

        let address = Address::new("azurerm_maps_creator", "main");
        reconciler.destroy(&address).await.unwrap();
        assert!(!client.contains(&creator_id()));
        assert!(stored(&path).await.resources.is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let client = Arc::new(InMemoryClient::new());
        client.insert(creator_id(), json!({}));
        let mut reconciler = reconciler(client, &path).await;

        let err = reconciler.create(&creator(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Provider(ProviderError::RequiresImport { .. })
        ));
        assert!(reconciler.state().resources.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_attributes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let client = Arc::new(InMemoryClient::new());
        let mut reconciler = reconciler(client.clone(), &path).await;
        reconciler.create(&creator(1)).await.unwrap();

        client.fail_next(
            "begin_create_or_update",
            ApiError::Status {
                code: 409,
                message: "Conflict".to_string(),
            },
        );
        assert!(reconciler.update(&creator(9)).await.is_err());

        let state = stored(&path).await;
        assert_eq!(state.serial, 1);
        assert_eq!(
            state.resources[0].attributes.get("storage_units"),
            Some(&json!(1))
        );
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_resource() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let client = Arc::new(InMemoryClient::new());
        let mut reconciler = reconciler(client.clone(), &path).await;
        reconciler.create(&creator(1)).await.unwrap();
        let address = Address::new("azurerm_maps_creator", "main");

        assert!(matches!(
            reconciler.refresh(&address).await.unwrap(),
            Refreshed::Present(_)
        ));

        let fresh = Arc::new(InMemoryClient::new());
        let mut reconciler = Reconciler::load(
            provider(fresh),
            Box::new(LocalBackend::with_path(&path)),
        )
        .await
        .unwrap();
        let refreshed = reconciler.refresh(&address).await.unwrap();
        assert!(matches!(refreshed, Refreshed::Dropped(r) if r.id == creator_id()));
        assert!(stored(&path).await.resources.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_of_absent_object_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let client = Arc::new(InMemoryClient::new());
        let mut reconciler = reconciler(client.clone(), &path).await;
        reconciler.create(&creator(1)).await.unwrap();

        client.fail_next("begin_delete", ApiError::NotFound(creator_id()));
        let address = Address::new("azurerm_maps_creator", "main");
        reconciler.destroy(&address).await.unwrap();
        assert!(reconciler.state().resources.is_empty());

        let err = reconciler.destroy(&address).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotInState(_)));
    }

    #[tokio::test]
    async fn test_adopt_imported_resource() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("azrm.state.json");
        let client = Arc::new(InMemoryClient::new());
        client.insert(
            creator_id(),
            json!({"location": "westeurope", "properties": {"storageUnits": 2}}),
        );
        let mut reconciler = reconciler(client, &path).await;

        let imported = reconciler
            .provider()
            .import("azurerm_maps_creator", "main", &creator_id())
            .await
            .unwrap();
        let recorded = reconciler.adopt(imported.clone()).await.unwrap();
        assert_eq!(recorded.id, creator_id());
        assert_eq!(
            recorded.to_resource_data().get("storage_units"),
            Some(&Value::from(2i64))
        );

        let err = reconciler.adopt(imported).await.unwrap_err();
        assert!(matches!(err, ReconcileError::AlreadyInState(_)));
    }
}
