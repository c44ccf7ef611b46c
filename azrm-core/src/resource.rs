//! Resource - Declared configuration and the state read back from the remote API

use std::collections::HashMap;
use std::fmt;

use crate::provider::{ProviderError, ProviderResult};

/// Local address of a resource (e.g. `azurerm_maps_account_creator.main`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Resource type (e.g., "azurerm_storage_account_custom_domain")
    pub resource_type: String,
    /// Name given to the block in configuration
    pub name: String,
}

impl Address {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON value returned by the management API
    ///
    /// `null` has no attribute representation and yields `None`; non-integer
    /// numbers are kept as their string form.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            }),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => {
                Some(Value::List(items.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Some(Value::Map(
                map.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Declared configuration of one resource, plus its ID once it exists
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
    pub address: Address,
    /// Canonical resource ID; `None` until the resource has been created
    pub id: Option<String>,
    pub attributes: HashMap<String, Value>,
}

impl ResourceData {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: Address::new(resource_type, name),
            id: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// True while the resource has no ID (it is about to be created)
    pub fn is_new_resource(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// A string attribute that must be set and non-empty
    pub fn required_string(&self, key: &str) -> ProviderResult<&str> {
        match self.get_string(key) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(ProviderError::InvalidConfig(format!(
                "{}: `{}` is required",
                self.address, key
            ))),
        }
    }

    /// The resource ID, which must be set for read/update/delete
    pub fn required_id(&self) -> ProviderResult<&str> {
        self.id.as_deref().ok_or_else(|| {
            ProviderError::InvalidConfig(format!("{}: resource has no ID", self.address))
        })
    }
}

/// Current state fetched from the management API
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub address: Address,
    /// Canonical resource ID
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(address: Address) -> Self {
        Self {
            address,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(address: Address, attributes: HashMap<String, Value>) -> Self {
        Self {
            address,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}
