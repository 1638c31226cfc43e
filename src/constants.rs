//! # Constants
//!
//! Shared defaults for the provisioning workflow.
//!
//! These values reproduce the fixed topology of the demo: one primary SQL
//! region, two geo-replica regions, and five VM regions. Regions and naming
//! can be overridden through [`crate::config::WorkflowConfig`]; the network
//! layout and VM shape are fixed.

/// Region the resource group and primary SQL server are created in
pub const PRIMARY_REGION: &str = "eastus";

/// Regions that receive a SQL server with a secondary (read-replica) database
pub const SECONDARY_REGIONS: [&str; 2] = ["southcentralus", "westeurope"];

/// Regions that each receive one virtual network and one VM
pub const VM_REGIONS: [&str; 5] = [
    "eastus",
    "westus",
    "northeurope",
    "southeastasia",
    "japaneast",
];

/// Address space of every demo virtual network
pub const VNET_ADDRESS_SPACE: &str = "10.0.0.0/16";

/// Address prefix of the single subnet in every demo virtual network
pub const SUBNET_ADDRESS_PREFIX: &str = "10.0.2.0/24";

/// Static allow ranges registered on the primary SQL server before any VM
/// exists
pub const STATIC_ALLOW_RANGES: [(&str, &str); 2] =
    [("10.2.0.1", "10.2.0.10"), ("10.0.0.1", "10.0.0.10")];

/// Administrator login shared by the SQL servers and the VMs
pub const ADMIN_LOGIN: &str = "fleetadmin";

/// Pricing tier of the primary database
pub const DATABASE_SKU: &str = "Basic";

/// VM size SKU
pub const VM_SIZE: &str = "Standard_DS1_v2";

/// Fixed desktop OS image the fleet VMs boot from
pub const VM_IMAGE_PUBLISHER: &str = "MicrosoftWindowsDesktop";
pub const VM_IMAGE_OFFER: &str = "Windows-10";
pub const VM_IMAGE_SKU: &str = "win10-21h2-ent";
pub const VM_IMAGE_VERSION: &str = "latest";

/// Interval between polls of a long-running operation (seconds)
pub const LRO_POLL_INTERVAL_SECS: u64 = 10;

/// Deadline for a single long-running operation (seconds)
pub const LRO_DEADLINE_SECS: u64 = 1800;

/// Attempts to resolve a VM's public IP before giving up
pub const IP_RESOLVE_ATTEMPTS: u32 = 10;

/// Interval between public IP resolution attempts (seconds)
pub const IP_RESOLVE_INTERVAL_SECS: u64 = 10;
