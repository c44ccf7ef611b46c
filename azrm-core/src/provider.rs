//! Provider - The CRUD contract every resource implements
//!
//! A [`Resource`] maps one resource type onto management API calls. The
//! [`AzureProvider`] owns the registered resources together with the shared
//! [`ProviderContext`] (client, lock registry, configuration, stop token) and
//! wraps each call in an [`OperationContext`] built from the resource's
//! timeouts.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::{ApiError, ManagementClient};
use crate::config::ProviderConfig;
use crate::locks::LockRegistry;
use crate::resource::{ResourceData, State};
use crate::resource_id::ParseError;
use crate::timeouts::{Operation, OperationContext, ResourceTimeouts};

/// Error type for resource operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("parsing {input:?}: {source}")]
    InvalidId {
        input: String,
        #[source]
        source: ParseError,
    },

    #[error("{operation} {id}: not found")]
    NotFound { operation: Operation, id: String },

    #[error("{operation} {id}: {source}")]
    RemoteCall {
        operation: Operation,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("a resource with the ID {id:?} already exists - to be managed it needs to be imported into the state (see the {resource_type} import docs)")]
    RequiresImport { resource_type: String, id: String },

    #[error("timed out after {after:?} {operation} {id}")]
    Timeout {
        operation: Operation,
        id: String,
        after: Duration,
    },

    #[error("{operation} {id}: cancelled")]
    Cancelled { operation: Operation, id: String },

    #[error("waiting for {operation} {id}: {message}")]
    OperationFailed {
        operation: Operation,
        id: String,
        message: String,
    },

    #[error("decoding {id}: {message}")]
    Decode { id: String, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),
}

impl ProviderError {
    /// Classify a management API error raised while running `operation` on `id`
    pub fn from_api(operation: Operation, id: &str, err: ApiError) -> Self {
        match err {
            ApiError::NotFound(_) => ProviderError::NotFound {
                operation,
                id: id.to_string(),
            },
            source => ProviderError::RemoteCall {
                operation,
                id: id.to_string(),
                source,
            },
        }
    }

    pub fn invalid_id(input: &str, source: ParseError) -> Self {
        ProviderError::InvalidId {
            input: input.to_string(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a resource operation shares with the rest of the provider
#[derive(Clone)]
pub struct ProviderContext {
    pub client: Arc<dyn ManagementClient>,
    pub locks: Arc<LockRegistry>,
    pub config: ProviderConfig,
    /// Cancelled when the host asks the provider to stop
    pub stop: CancellationToken,
}

impl ProviderContext {
    pub fn new(client: Arc<dyn ManagementClient>, config: ProviderConfig) -> Self {
        Self {
            client,
            locks: Arc::new(LockRegistry::new()),
            config,
            stop: CancellationToken::new(),
        }
    }
}

/// One manageable resource type
///
/// `read` returns [`State::not_found`] when the remote object is gone; `delete`
/// of an object that is already gone succeeds.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name (e.g., "azurerm_maps_creator")
    fn resource_type(&self) -> &'static str;

    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::default()
    }

    /// Check that `id` is an identifier of this resource type
    fn validate_id(&self, id: &str) -> Result<(), ParseError>;

    async fn create(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State>;

    async fn read(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State>;

    async fn update(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<State>;

    async fn delete(
        &self,
        provider: &ProviderContext,
        ctx: &OperationContext,
        data: &ResourceData,
    ) -> ProviderResult<()>;
}

/// Main Provider trait
///
/// Dispatches on `data.address.resource_type`. All operations are async and
/// involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "azurerm")
    fn name(&self) -> &'static str;

    /// Resource types this Provider can handle
    fn resource_types(&self) -> Vec<&'static str>;

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the canonical resource ID
    fn create(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<&'static str> {
        (**self).resource_types()
    }

    fn read(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(data)
    }

    fn create(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(data)
    }

    fn update(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(data)
    }

    fn delete(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(data)
    }
}

/// Provider over the management API
pub struct AzureProvider {
    context: ProviderContext,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
}

impl AzureProvider {
    pub fn new(context: ProviderContext) -> Self {
        Self {
            context,
            resources: BTreeMap::new(),
        }
    }

    /// Provider with every built-in resource registered
    pub fn with_builtin_resources(context: ProviderContext) -> Self {
        crate::services::all()
            .into_iter()
            .fold(Self::new(context), |provider, resource| provider.register(resource))
    }

    pub fn register(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.insert(resource.resource_type(), resource);
        self
    }

    pub fn context(&self) -> &ProviderContext {
        &self.context
    }

    /// Ask every in-flight and future operation to stop
    pub fn stop(&self) {
        self.context.stop.cancel();
    }

    fn resource(&self, resource_type: &str) -> ProviderResult<Arc<dyn Resource>> {
        self.resources
            .get(resource_type)
            .cloned()
            .ok_or_else(|| ProviderError::UnsupportedResourceType(resource_type.to_string()))
    }

    fn timeouts_for(&self, resource: &dyn Resource) -> ResourceTimeouts {
        resource
            .timeouts()
            .with_overrides(&self.context.config.timeouts)
    }

    /// Adopt an existing remote object into management
    ///
    /// The ID must parse as the resource type's identifier; the object is then
    /// read back. Importing an ID whose object does not exist is an error.
    pub async fn import(
        &self,
        resource_type: &str,
        name: &str,
        id: &str,
    ) -> ProviderResult<State> {
        let resource = self.resource(resource_type)?;
        resource
            .validate_id(id)
            .map_err(|e| ProviderError::invalid_id(id, e))?;

        let data = ResourceData::new(resource_type, name).with_id(id);
        let state = self.read(&data).await?;
        if !state.exists {
            return Err(ProviderError::NotFound {
                operation: Operation::Read,
                id: id.to_string(),
            });
        }
        Ok(state)
    }
}

impl Provider for AzureProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    fn read(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>> {
        let data = data.clone();
        Box::pin(async move {
            let resource = self.resource(&data.address.resource_type)?;
            let ctx = self.timeouts_for(resource.as_ref()).for_read(&self.context.stop);
            debug!("reading {}", data.address);
            resource.read(&self.context, &ctx, &data).await
        })
    }

    fn create(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>> {
        let data = data.clone();
        Box::pin(async move {
            let resource = self.resource(&data.address.resource_type)?;
            let ctx = self.timeouts_for(resource.as_ref()).for_create(&self.context.stop);
            debug!("creating {}", data.address);
            resource.create(&self.context, &ctx, &data).await
        })
    }

    fn update(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<State>> {
        let data = data.clone();
        Box::pin(async move {
            let resource = self.resource(&data.address.resource_type)?;
            let ctx = self.timeouts_for(resource.as_ref()).for_update(&self.context.stop);
            debug!("updating {}", data.address);
            resource.update(&self.context, &ctx, &data).await
        })
    }

    fn delete(&self, data: &ResourceData) -> BoxFuture<'_, ProviderResult<()>> {
        let data = data.clone();
        Box::pin(async move {
            let resource = self.resource(&data.address.resource_type)?;
            let ctx = self.timeouts_for(resource.as_ref()).for_delete(&self.context.stop);
            debug!("deleting {}", data.address);
            resource.delete(&self.context, &ctx, &data).await
        })
    }
}
