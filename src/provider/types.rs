//! Resource specs and handles exchanged with the cloud provider.
//!
//! A *spec* describes the desired shape of a resource for a createOrUpdate
//! call; a *handle* is what the provider hands back once the resource exists.
//! Handles are transient - the workflow keeps them in local variables for the
//! duration of one run and never persists them.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Desired shape of a resource group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroupSpec {
    /// Azure region the group is homed in (e.g. "eastus")
    pub location: String,
}

/// Handle for a created resource group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    pub name: String,
    pub location: String,
}

/// Desired shape of a SQL server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlServerSpec {
    pub location: String,
    pub administrator_login: String,
    pub administrator_password: String,
}

/// Handle for a created SQL server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlServer {
    /// Fully qualified resource id
    pub id: String,
    pub name: String,
    pub location: String,
}

/// How a database is created on its server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum DatabaseCreateMode {
    /// Standalone database
    Default,
    /// Read-only replica continuously synchronized from an existing primary.
    /// The source database must already exist when the call is issued.
    Secondary { source_database_id: String },
}

/// Desired shape of a SQL database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlDatabaseSpec {
    pub location: String,
    pub create_mode: DatabaseCreateMode,
    /// Pricing tier (e.g. "Basic"); provider default when not set
    pub sku: Option<String>,
}

/// Handle for a created SQL database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlDatabase {
    /// Fully qualified resource id, used as the replication source for
    /// secondary databases
    pub id: String,
    pub name: String,
}

/// Desired shape of a SQL server firewall rule (an IP allow-list entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRuleSpec {
    pub start_ip_address: String,
    pub end_ip_address: String,
}

impl FirewallRuleSpec {
    /// Allow rule for a single address (start = end).
    pub fn single_address(address: &str) -> Self {
        Self {
            start_ip_address: address.to_string(),
            end_ip_address: address.to_string(),
        }
    }
}

/// Handle for a firewall rule, also returned by list calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    pub name: String,
    pub start_ip_address: String,
    pub end_ip_address: String,
}

/// Subnet inside a virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetSpec {
    pub name: String,
    pub address_prefix: String,
}

/// Desired shape of a virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNetworkSpec {
    pub location: String,
    pub address_prefixes: Vec<String>,
    pub subnets: Vec<SubnetSpec>,
}

/// Handle for a created virtual network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNetwork {
    pub id: String,
    pub name: String,
    pub location: String,
    /// Resource ids of the network's subnets, in creation order
    pub subnet_ids: Vec<String>,
}

/// Public IP allocation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpAllocationMethod {
    /// Address assigned asynchronously by the provider, possibly only once
    /// the IP is attached to a running resource
    Dynamic,
    Static,
}

/// Desired shape of a public IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIpSpec {
    pub location: String,
    pub allocation_method: IpAllocationMethod,
}

/// Handle for a public IP address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIp {
    pub id: String,
    pub name: String,
    /// `None` until the provider has assigned an address
    pub ip_address: Option<String>,
}

/// Desired shape of a network interface with one IP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    pub location: String,
    /// Subnet the interface's IP configuration joins
    pub subnet_id: String,
    /// Public IP bound to the interface's IP configuration
    pub public_ip_id: String,
}

/// Handle for a created network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    pub location: String,
}

/// OS image a virtual machine boots from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

impl ImageReference {
    /// The fixed Windows desktop image the demo fleet uses.
    pub fn windows_desktop() -> Self {
        Self {
            publisher: constants::VM_IMAGE_PUBLISHER.to_string(),
            offer: constants::VM_IMAGE_OFFER.to_string(),
            sku: constants::VM_IMAGE_SKU.to_string(),
            version: constants::VM_IMAGE_VERSION.to_string(),
        }
    }
}

/// Desired shape of a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineSpec {
    pub location: String,
    /// Size SKU (e.g. "Standard_DS1_v2")
    pub size: String,
    pub image: ImageReference,
    /// Name for the managed OS disk created from the image
    pub os_disk_name: String,
    pub admin_username: String,
    pub admin_password: String,
    /// Resource id of the primary network interface
    pub network_interface_id: String,
}

/// Handle for a created virtual machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub location: String,
}
