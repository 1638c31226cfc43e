//! Typed request and response bodies for the ARM REST API.
//!
//! Requests carry only the fields the workflow sets; ARM fills in service
//! defaults for everything else. Responses are read through a generic
//! resource envelope because the workflow only needs the id, name, location,
//! and a handful of well-known property fields per kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub(super) struct ResourceGroupBody {
    pub location: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SqlServerBody {
    pub location: String,
    pub properties: SqlServerProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SqlServerProperties {
    pub administrator_login: String,
    pub administrator_login_password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SqlDatabaseBody {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<SkuBody>,
    pub properties: SqlDatabaseProperties,
}

#[derive(Debug, Serialize)]
pub(super) struct SkuBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SqlDatabaseProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_database_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct FirewallRuleBody {
    pub properties: FirewallRuleProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FirewallRuleProperties {
    pub start_ip_address: String,
    pub end_ip_address: String,
}

#[derive(Debug, Serialize)]
pub(super) struct VirtualNetworkBody {
    pub location: String,
    pub properties: VirtualNetworkProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VirtualNetworkProperties {
    pub address_space: AddressSpaceBody,
    pub subnets: Vec<SubnetBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddressSpaceBody {
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SubnetBody {
    pub name: String,
    pub properties: SubnetProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SubnetProperties {
    pub address_prefix: String,
}

#[derive(Debug, Serialize)]
pub(super) struct PublicIpBody {
    pub location: String,
    pub properties: PublicIpProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PublicIpProperties {
    pub public_ip_allocation_method: String,
}

#[derive(Debug, Serialize)]
pub(super) struct NetworkInterfaceBody {
    pub location: String,
    pub properties: NetworkInterfaceProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NetworkInterfaceProperties {
    pub ip_configurations: Vec<IpConfigurationBody>,
}

#[derive(Debug, Serialize)]
pub(super) struct IpConfigurationBody {
    pub name: String,
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IpConfigurationProperties {
    pub private_ip_allocation_method: String,
    pub subnet: ResourceRefBody,
    pub public_ip_address: ResourceRefBody,
}

#[derive(Debug, Serialize)]
pub(super) struct ResourceRefBody {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct VirtualMachineBody {
    pub location: String,
    pub properties: VirtualMachineProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VirtualMachineProperties {
    pub hardware_profile: HardwareProfileBody,
    pub storage_profile: StorageProfileBody,
    pub os_profile: OsProfileBody,
    pub network_profile: NetworkProfileBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct HardwareProfileBody {
    pub vm_size: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StorageProfileBody {
    pub image_reference: ImageReferenceBody,
    pub os_disk: OsDiskBody,
}

#[derive(Debug, Serialize)]
pub(super) struct ImageReferenceBody {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OsDiskBody {
    pub name: String,
    pub create_option: String,
    pub caching: String,
    pub managed_disk: ManagedDiskBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ManagedDiskBody {
    pub storage_account_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OsProfileBody {
    pub computer_name: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NetworkProfileBody {
    pub network_interfaces: Vec<NicReferenceBody>,
}

#[derive(Debug, Serialize)]
pub(super) struct NicReferenceBody {
    pub id: String,
    pub properties: NicReferenceProperties,
}

#[derive(Debug, Serialize)]
pub(super) struct NicReferenceProperties {
    pub primary: bool,
}

// ============================================================================
// Response bodies
// ============================================================================

/// Generic ARM resource envelope.
///
/// Every tracked resource comes back as `{id, name, location, properties}`;
/// the accessors below pull out the property fields the workflow reads.
#[derive(Debug, Deserialize)]
pub(super) struct ArmResource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

impl ArmResource {
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .get("provisioningState")
            .and_then(Value::as_str)
    }

    pub fn ip_address(&self) -> Option<String> {
        self.properties
            .get("ipAddress")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn start_ip_address(&self) -> Option<String> {
        self.properties
            .get("startIpAddress")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn end_ip_address(&self) -> Option<String> {
        self.properties
            .get("endIpAddress")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Subnet resource ids, in the order the service reports them.
    pub fn subnet_ids(&self) -> Vec<String> {
        self.properties
            .get("subnets")
            .and_then(Value::as_array)
            .map(|subnets| {
                subnets
                    .iter()
                    .filter_map(|subnet| subnet.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Collection responses wrap their items in a `value` array.
#[derive(Debug, Deserialize)]
pub(super) struct ListEnvelope {
    #[serde(default)]
    pub value: Vec<ArmResource>,
}

/// ARM error payload: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
pub(super) struct ArmErrorEnvelope {
    pub error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ArmErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
