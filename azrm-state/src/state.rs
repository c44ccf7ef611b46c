//! State file structures for persisting managed resources

use std::collections::HashMap;

use azrm_core::resource::{Address, ResourceData, State, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of azrm that last modified this state
    pub azrm_version: String,
    /// When the state was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// All managed resources
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            azrm_version: env!("CARGO_PKG_VERSION").to_string(),
            updated_at: None,
            resources: Vec::new(),
        }
    }

    /// Increment serial and stamp version and time for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.azrm_version = env!("CARGO_PKG_VERSION").to_string();
        self.updated_at = Some(Utc::now());
    }

    /// Find a resource by type and name
    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Find a resource by its canonical ID
    pub fn find_by_id(&self, id: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.id == id)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Remove a resource by its canonical ID
    pub fn remove_by_id(&mut self, id: &str) -> Option<ResourceState> {
        let pos = self.resources.iter().position(|r| r.id == id)?;
        Some(self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "azurerm_maps_creator")
    pub resource_type: String,
    /// Local name of the resource
    pub name: String,
    /// Canonical resource ID
    pub id: String,
    /// Attributes as last read back, as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    /// Set an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Record the state returned by a provider; `None` unless it exists with an ID
    pub fn from_state(state: &State) -> Option<Self> {
        let id = state.identifier.as_ref().filter(|_| state.exists)?;
        Some(Self {
            resource_type: state.address.resource_type.clone(),
            name: state.address.name.clone(),
            id: id.clone(),
            attributes: state
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        })
    }

    pub fn address(&self) -> Address {
        Address::new(&self.resource_type, &self.name)
    }

    /// Rebuild the resource data the provider reads and deletes from
    pub fn to_resource_data(&self) -> ResourceData {
        let attributes: HashMap<String, Value> = self
            .attributes
            .iter()
            .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect();
        ResourceData {
            address: self.address(),
            id: Some(self.id.clone()),
            attributes,
        }
    }
}
