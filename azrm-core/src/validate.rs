//! Attribute validators
//!
//! Each validator takes the attribute key (for the error message) and the
//! value, and fails with [`ProviderError::InvalidConfig`].

use std::sync::LazyLock;

use regex::Regex;

use crate::provider::{ProviderError, ProviderResult};
use crate::resource_id::ResourceIdentifier;

// Character classes are ASCII-only; `\w` and `\d` would also admit Unicode letters and digits.
static DATA_MIGRATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^[0-9A-Za-z_]+[0-9A-Za-z_\-.]*$"));
static STORAGE_ACCOUNT_NAME: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-z0-9]{3,24}$"));
static GUID: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
});

fn pattern(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|e| panic!("invalid validator pattern {:?}: {}", source, e))
}

fn invalid(key: &str, message: impl std::fmt::Display) -> ProviderError {
    ProviderError::InvalidConfig(format!("{:?}: {}", key, message))
}

/// Name of a data migration service or project
pub fn data_migration_name(key: &str, value: &str) -> ProviderResult<()> {
    if DATA_MIGRATION_NAME.is_match(value) {
        Ok(())
    } else {
        Err(invalid(key, "invalid format"))
    }
}

/// Storage account name: 3 to 24 lowercase letters and digits
pub fn storage_account_name(key: &str, value: &str) -> ProviderResult<()> {
    if STORAGE_ACCOUNT_NAME.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            key,
            "only lowercase alphanumeric characters allowed, between 3 and 24 characters",
        ))
    }
}

pub fn guid(key: &str, value: &str) -> ProviderResult<()> {
    if GUID.is_match(value) {
        Ok(())
    } else {
        Err(invalid(key, format!("{:?} is not a GUID", value)))
    }
}

pub fn no_empty_strings(key: &str, value: &str) -> ProviderResult<()> {
    if value.trim().is_empty() {
        Err(invalid(key, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Case-sensitive membership in `allowed`
pub fn one_of(key: &str, value: &str, allowed: &[&str]) -> ProviderResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            key,
            format!("expected one of [{}], got {:?}", allowed.join(", "), value),
        ))
    }
}

/// The value must parse as identifier `T`
pub fn resource_id<T: ResourceIdentifier>(key: &str, value: &str) -> ProviderResult<T> {
    T::parse(value).map_err(|e| invalid(key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_id::FirewallPolicyId;

    #[test]
    fn test_data_migration_name() {
        for valid in ["project1", "my-project.v2", "a", "x_y"] {
            assert!(data_migration_name("name", valid).is_ok(), "{}", valid);
        }
        for invalid in ["", "-project", ".hidden", "has space", "proj/1", "проект", "proj٣"] {
            assert!(data_migration_name("name", invalid).is_err(), "{}", invalid);
        }
    }

    #[test]
    fn test_storage_account_name() {
        assert!(storage_account_name("name", "acct1").is_ok());
        assert!(storage_account_name("name", "ab").is_err());
        assert!(storage_account_name("name", "Acct1").is_err());
        assert!(storage_account_name("name", "acct-1").is_err());
        assert!(storage_account_name("name", &"a".repeat(25)).is_err());
    }

    #[test]
    fn test_guid() {
        assert!(guid("subscription_id", "12345678-1234-9876-4563-123456789012").is_ok());
        let err = guid("subscription_id", "not-a-guid").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: \"subscription_id\": \"not-a-guid\" is not a GUID"
        );
    }

    #[test]
    fn test_one_of_is_case_sensitive() {
        assert!(one_of("source_platform", "SQL", &["SQL"]).is_ok());
        assert!(one_of("source_platform", "sql", &["SQL"]).is_err());
    }

    #[test]
    fn test_no_empty_strings() {
        assert!(no_empty_strings("user_name", "admin").is_ok());
        assert!(no_empty_strings("user_name", "  ").is_err());
    }

    #[test]
    fn test_resource_id() {
        let id = resource_id::<FirewallPolicyId>(
            "firewall_policy_id",
            "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Network/firewallPolicies/p1",
        )
        .unwrap();
        assert_eq!(id.name, "p1");

        assert!(resource_id::<FirewallPolicyId>("firewall_policy_id", "/subscriptions/s1").is_err());
    }
}
