//! Typed identifiers for the resources this provider manages

use super::{ParseError, ResourceIdentifier, Segment};

resource_id! {
    /// A Logic App workflow
    pub struct LogicAppWorkflowId("Logic App Workflow") {
        providers("Microsoft.Logic") {
            name: "workflows" => "Name",
        }
    }
}

resource_id! {
    /// A trigger nested under a Logic App workflow
    pub struct LogicAppTriggerId("Logic App Trigger") {
        providers("Microsoft.Logic") {
            workflow_name: "workflows" => "Workflow Name",
            trigger_name: "triggers" => "Trigger Name",
        }
    }
}

impl LogicAppTriggerId {
    pub fn workflow_id(&self) -> LogicAppWorkflowId {
        LogicAppWorkflowId::new(&self.subscription_id, &self.resource_group, &self.workflow_name)
    }
}

resource_id! {
    pub struct MapsAccountId("Maps Account") {
        providers("Microsoft.Maps") {
            name: "accounts" => "Name",
        }
    }
}

resource_id! {
    pub struct CreatorId("Creator") {
        providers("Microsoft.Maps") {
            account_name: "accounts" => "Account Name",
            name: "creators" => "Name",
        }
    }
}

impl CreatorId {
    pub fn account_id(&self) -> MapsAccountId {
        MapsAccountId::new(&self.subscription_id, &self.resource_group, &self.account_name)
    }
}

resource_id! {
    pub struct StorageAccountId("Storage Account") {
        providers("Microsoft.Storage") {
            name: "storageAccounts" => "Name",
        }
    }
}

resource_id! {
    /// The custom domain bound to a storage account
    ///
    /// The management API has no standalone object for it; the ID is synthesized
    /// locally and the domain lives inside the account's properties.
    pub struct StorageAccountCustomDomainId("Storage Account Custom Domain") {
        providers("Microsoft.Storage") {
            storage_account_name: "storageAccounts" => "Storage Account Name",
            custom_domain_name: "customDomains" => "Custom Domain Name",
        }
    }
}

impl StorageAccountCustomDomainId {
    pub fn storage_account_id(&self) -> StorageAccountId {
        StorageAccountId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.storage_account_name,
        )
    }
}

resource_id! {
    pub struct FirewallPolicyId("Firewall Policy") {
        providers("Microsoft.Network") {
            name: "firewallPolicies" => "Name",
        }
    }
}

resource_id! {
    pub struct FirewallPolicyRuleCollectionGroupId("Firewall Policy Rule Collection Group") {
        providers("Microsoft.Network") {
            firewall_policy_name: "firewallPolicies" => "Firewall Policy Name",
            rule_collection_group_name: "ruleCollectionGroups" => "Rule Collection Group Name",
        }
    }
}

impl FirewallPolicyRuleCollectionGroupId {
    pub fn firewall_policy_id(&self) -> FirewallPolicyId {
        FirewallPolicyId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.firewall_policy_name,
        )
    }
}

resource_id! {
    pub struct LoadBalancerId("Load Balancer") {
        providers("Microsoft.Network") {
            name: "loadBalancers" => "Name",
        }
    }
}

resource_id! {
    pub struct LoadBalancerBackendAddressPoolId("Load Balancer Backend Address Pool") {
        providers("Microsoft.Network") {
            load_balancer_name: "loadBalancers" => "Load Balancer Name",
            backend_address_pool_name: "backendAddressPools" => "Backend Address Pool Name",
        }
    }
}

impl LoadBalancerBackendAddressPoolId {
    pub fn load_balancer_id(&self) -> LoadBalancerId {
        LoadBalancerId::new(&self.subscription_id, &self.resource_group, &self.load_balancer_name)
    }
}

resource_id! {
    /// A Sentinel alert rule, an extension resource of a Log Analytics workspace
    pub struct SentinelAlertRuleId("Alert Rule") {
        providers("Microsoft.OperationalInsights") {
            workspace_name: "workspaces" => "Workspace Name",
        }
        providers("Microsoft.SecurityInsights") {
            name: "alertRules" => "Name",
        }
    }
}

resource_id! {
    pub struct SentinelAlertRuleActionId("Action") {
        providers("Microsoft.OperationalInsights") {
            workspace_name: "workspaces" => "Workspace Name",
        }
        providers("Microsoft.SecurityInsights") {
            alert_rule_name: "alertRules" => "Alert Rule Name",
            name: "actions" => "Name",
        }
    }
}

impl SentinelAlertRuleActionId {
    pub fn alert_rule_id(&self) -> SentinelAlertRuleId {
        SentinelAlertRuleId::new(
            &self.subscription_id,
            &self.resource_group,
            &self.workspace_name,
            &self.alert_rule_name,
        )
    }
}

resource_id! {
    pub struct DataMigrationServiceId("Data Migration Service") {
        providers("Microsoft.DataMigration") {
            name: "services" => "Name",
        }
    }
}

resource_id! {
    pub struct DataMigrationProjectId("Data Migration Project") {
        providers("Microsoft.DataMigration") {
            service_name: "services" => "Service Name",
            name: "projects" => "Name",
        }
    }
}

impl DataMigrationProjectId {
    pub fn service_id(&self) -> DataMigrationServiceId {
        DataMigrationServiceId::new(&self.subscription_id, &self.resource_group, &self.service_name)
    }
}

/// Result of parsing a path as one of the known kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedId {
    pub description: String,
    pub canonical: String,
}

/// A typed identifier kind, addressable by its short name
#[derive(Clone, Copy)]
pub struct IdKind {
    /// Short name used on the command line (e.g. "maps_account_creator")
    pub name: &'static str,
    pub kind: &'static str,
    pub segments: &'static [Segment],
    parse: fn(&str) -> Result<DescribedId, ParseError>,
}

impl IdKind {
    fn of<T: ResourceIdentifier + std::fmt::Display>(name: &'static str) -> Self {
        Self {
            name,
            kind: T::KIND,
            segments: T::SEGMENTS,
            parse: |input| {
                let id = T::parse(input)?;
                Ok(DescribedId {
                    description: id.to_string(),
                    canonical: id.id(),
                })
            },
        }
    }

    pub fn parse(&self, input: &str) -> Result<DescribedId, ParseError> {
        (self.parse)(input)
    }
}

impl std::fmt::Debug for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdKind")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Every typed identifier kind known to this crate
pub fn kinds() -> Vec<IdKind> {
    vec![
        IdKind::of::<LogicAppWorkflowId>("logic_app_workflow"),
        IdKind::of::<LogicAppTriggerId>("logic_app_trigger"),
        IdKind::of::<MapsAccountId>("maps_account"),
        IdKind::of::<CreatorId>("maps_account_creator"),
        IdKind::of::<StorageAccountId>("storage_account"),
        IdKind::of::<StorageAccountCustomDomainId>("storage_account_custom_domain"),
        IdKind::of::<FirewallPolicyId>("firewall_policy"),
        IdKind::of::<FirewallPolicyRuleCollectionGroupId>("firewall_policy_rule_collection_group"),
        IdKind::of::<LoadBalancerId>("lb"),
        IdKind::of::<LoadBalancerBackendAddressPoolId>("lb_backend_address_pool"),
        IdKind::of::<SentinelAlertRuleId>("sentinel_alert_rule"),
        IdKind::of::<SentinelAlertRuleActionId>("sentinel_alert_rule_action"),
        IdKind::of::<DataMigrationServiceId>("data_migration_service"),
        IdKind::of::<DataMigrationProjectId>("data_migration_service_project"),
    ]
}

/// Look up a kind by its short name
pub fn kind(name: &str) -> Option<IdKind> {
    kinds().into_iter().find(|k| k.name == name)
}
