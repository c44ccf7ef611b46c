//! Provider configuration
//!
//! Built from the provider block's attributes, falling back to `ARM_*`
//! environment variables for values the block leaves out.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::provider::{ProviderError, ProviderResult};
use crate::resource::Value;
use crate::timeouts::TimeoutOverrides;
use crate::validate;

pub const SUBSCRIPTION_ID_ENV: &str = "ARM_SUBSCRIPTION_ID";
pub const ENVIRONMENT_ENV: &str = "ARM_ENVIRONMENT";

/// Cloud the management API lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl Environment {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "public" => Some(Environment::Public),
            "usgovernment" => Some(Environment::UsGovernment),
            "china" => Some(Environment::China),
            _ => None,
        }
    }

    pub fn management_endpoint(&self) -> &'static str {
        match self {
            Environment::Public => "https://management.azure.com/",
            Environment::UsGovernment => "https://management.usgovcloudapi.net/",
            Environment::China => "https://management.chinacloudapi.cn/",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Public => "public",
            Environment::UsGovernment => "usgovernment",
            Environment::China => "china",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub subscription_id: String,
    pub environment: Environment,
    /// Look for an existing remote object before creating, failing with
    /// `RequiresImport` when one is found
    pub check_existing_on_create: bool,
    pub timeouts: TimeoutOverrides,
}

impl ProviderConfig {
    /// Read configuration from provider attributes and the process environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> ProviderResult<Self> {
        Self::from_attributes_with_env(attributes, |key| std::env::var(key).ok())
    }

    /// Like [`ProviderConfig::from_attributes`] with an explicit environment lookup
    pub fn from_attributes_with_env(
        attributes: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> ProviderResult<Self> {
        let subscription_id = attributes
            .get("subscription_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| env(SUBSCRIPTION_ID_ENV))
            .ok_or_else(|| {
                ProviderError::InvalidConfig(format!(
                    "`subscription_id` is required (or set {})",
                    SUBSCRIPTION_ID_ENV
                ))
            })?;
        validate::guid("subscription_id", &subscription_id)?;

        let environment = match attributes
            .get("environment")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| env(ENVIRONMENT_ENV))
        {
            Some(name) => Environment::from_name(&name).ok_or_else(|| {
                ProviderError::InvalidConfig(format!("unknown environment {:?}", name))
            })?,
            None => Environment::default(),
        };

        let check_existing_on_create = attributes
            .get("check_existing_on_create")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let timeouts = match attributes.get("timeouts") {
            Some(Value::Map(map)) => parse_timeouts(map)?,
            Some(_) => {
                return Err(ProviderError::InvalidConfig(
                    "`timeouts` must be a map of operation to minutes".to_string(),
                ));
            }
            None => TimeoutOverrides::default(),
        };

        Ok(Self {
            subscription_id,
            environment,
            check_existing_on_create,
            timeouts,
        })
    }
}

fn parse_timeouts(map: &HashMap<String, Value>) -> ProviderResult<TimeoutOverrides> {
    let mut overrides = TimeoutOverrides::default();
    for (operation, value) in map {
        let minutes = match value.as_int() {
            Some(m) if m > 0 => m as u64,
            _ => {
                return Err(ProviderError::InvalidConfig(format!(
                    "timeouts.{}: expected a positive number of minutes",
                    operation
                )));
            }
        };
        let seconds = minutes.checked_mul(60).ok_or_else(|| {
            ProviderError::InvalidConfig(format!(
                "timeouts.{}: {} minutes is out of range",
                operation, minutes
            ))
        })?;
        let duration = Some(Duration::from_secs(seconds));
        match operation.as_str() {
            "create" => overrides.create = duration,
            "read" => overrides.read = duration,
            "update" => overrides.update = duration,
            "delete" => overrides.delete = duration,
            other => {
                return Err(ProviderError::InvalidConfig(format!(
                    "timeouts: unknown operation {:?}",
                    other
                )));
            }
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_from_attributes() {
        let mut attributes = HashMap::new();
        attributes.insert("subscription_id".to_string(), Value::from(SUB));
        attributes.insert("environment".to_string(), Value::from("china"));
        attributes.insert("check_existing_on_create".to_string(), Value::from(false));

        let config = ProviderConfig::from_attributes_with_env(&attributes, no_env).unwrap();
        assert_eq!(config.subscription_id, SUB);
        assert_eq!(config.environment, Environment::China);
        assert!(!config.check_existing_on_create);
        assert_eq!(config.timeouts, TimeoutOverrides::default());
    }

    #[test]
    fn test_environment_fallback() {
        let env = |key: &str| match key {
            SUBSCRIPTION_ID_ENV => Some(SUB.to_string()),
            ENVIRONMENT_ENV => Some("USGovernment".to_string()),
            _ => None,
        };

        let config = ProviderConfig::from_attributes_with_env(&HashMap::new(), env).unwrap();
        assert_eq!(config.subscription_id, SUB);
        assert_eq!(config.environment, Environment::UsGovernment);
        assert!(config.check_existing_on_create);
        assert_eq!(
            config.environment.management_endpoint(),
            "https://management.usgovcloudapi.net/"
        );
    }

    #[test]
    fn test_missing_subscription() {
        let err = ProviderConfig::from_attributes_with_env(&HashMap::new(), no_env).unwrap_err();
        assert!(err.to_string().contains(SUBSCRIPTION_ID_ENV));
    }

    #[test]
    fn test_subscription_must_be_guid() {
        let mut attributes = HashMap::new();
        attributes.insert("subscription_id".to_string(), Value::from("sub1"));
        assert!(ProviderConfig::from_attributes_with_env(&attributes, no_env).is_err());
    }

    #[test]
    fn test_unknown_environment() {
        let mut attributes = HashMap::new();
        attributes.insert("subscription_id".to_string(), Value::from(SUB));
        attributes.insert("environment".to_string(), Value::from("mars"));
        assert!(ProviderConfig::from_attributes_with_env(&attributes, no_env).is_err());
    }

    #[test]
    fn test_timeout_overrides() {
        let mut timeouts = HashMap::new();
        timeouts.insert("read".to_string(), Value::from(2i64));
        timeouts.insert("delete".to_string(), Value::from(90i64));
        let mut attributes = HashMap::new();
        attributes.insert("subscription_id".to_string(), Value::from(SUB));
        attributes.insert("timeouts".to_string(), Value::Map(timeouts));

        let config = ProviderConfig::from_attributes_with_env(&attributes, no_env).unwrap();
        assert_eq!(config.timeouts.read, Some(Duration::from_secs(120)));
        assert_eq!(config.timeouts.delete, Some(Duration::from_secs(90 * 60)));
        assert_eq!(config.timeouts.create, None);
    }

    #[test]
    fn test_invalid_timeouts() {
        let mut timeouts = HashMap::new();
        timeouts.insert("refresh".to_string(), Value::from(2i64));
        let mut attributes = HashMap::new();
        attributes.insert("subscription_id".to_string(), Value::from(SUB));
        attributes.insert("timeouts".to_string(), Value::Map(timeouts));
        assert!(ProviderConfig::from_attributes_with_env(&attributes, no_env).is_err());

        let mut timeouts = HashMap::new();
        timeouts.insert("read".to_string(), Value::from(0i64));
        attributes.insert("timeouts".to_string(), Value::Map(timeouts));
        assert!(ProviderConfig::from_attributes_with_env(&attributes, no_env).is_err());
    }

    #[test]
    fn test_huge_timeouts_are_rejected_or_saturate() {
        let mut timeouts = HashMap::new();
        timeouts.insert("create".to_string(), Value::from(i64::MAX));
        let mut attributes = HashMap::new();
        attributes.insert("subscription_id".to_string(), Value::from(SUB));
        attributes.insert("timeouts".to_string(), Value::Map(timeouts));
        let err = ProviderConfig::from_attributes_with_env(&attributes, no_env).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(msg) if msg.contains("out of range")));

        let mut timeouts = HashMap::new();
        timeouts.insert("create".to_string(), Value::from(200_000_000_000_000_000i64));
        attributes.insert("timeouts".to_string(), Value::Map(timeouts));
        let config = ProviderConfig::from_attributes_with_env(&attributes, no_env).unwrap();

        let stop = tokio_util::sync::CancellationToken::new();
        let ctx = crate::timeouts::ResourceTimeouts::default()
            .with_overrides(&config.timeouts)
            .for_create(&stop);
        assert!(ctx.remaining() > Duration::from_secs(86400));
    }
}
