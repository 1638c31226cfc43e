//! # Workflow Configuration
//!
//! Run-scoped configuration for the provisioning workflow plus the
//! service-principal credentials the ARM client authenticates with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::naming;

/// Topology and credentials for one provisioning run.
///
/// The default configuration reproduces the demo fleet: a primary SQL server
/// in east US, replicas in south-central US and west Europe, and one VM in
/// each of five regions. The admin password is derived fresh per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// Name prefix for the resource group
    pub group_prefix: String,
    /// Region for the resource group and the primary SQL server
    pub primary_region: String,
    /// Regions that each receive a SQL server with a secondary database
    pub secondary_regions: Vec<String>,
    /// Regions that each receive one virtual network and one VM
    pub vm_regions: Vec<String>,
    /// Administrator login for the SQL servers and VMs
    pub admin_login: String,
    /// Administrator password (derived per run, never persisted)
    pub admin_password: String,
    /// Name shared by the primary database and its replicas
    pub database_name: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            group_prefix: "rg-sqlfleet".to_string(),
            primary_region: constants::PRIMARY_REGION.to_string(),
            secondary_regions: constants::SECONDARY_REGIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            vm_regions: constants::VM_REGIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            admin_login: constants::ADMIN_LOGIN.to_string(),
            admin_password: naming::derive_password(),
            database_name: naming::random_name("fleetdb"),
        }
    }
}

/// Service-principal credentials for the Azure Resource Manager API.
#[derive(Debug, Clone)]
pub struct ArmCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl ArmCredentials {
    /// Load credentials from the process environment.
    ///
    /// Accepts the `AZURE_`-prefixed names the Azure tooling conventionally
    /// exports, falling back to the bare names for compatibility with older
    /// sample environments.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: env_any(&["AZURE_CLIENT_ID", "CLIENT_ID"])
                .context("AZURE_CLIENT_ID (or CLIENT_ID) is not set")?,
            client_secret: env_any(&["AZURE_CLIENT_SECRET", "CLIENT_SECRET"])
                .context("AZURE_CLIENT_SECRET (or CLIENT_SECRET) is not set")?,
            tenant_id: env_any(&["AZURE_TENANT_ID", "TENANT_ID"])
                .context("AZURE_TENANT_ID (or TENANT_ID) is not set")?,
            subscription_id: env_any(&["AZURE_SUBSCRIPTION_ID", "SUBSCRIPTION_ID"])
                .context("AZURE_SUBSCRIPTION_ID (or SUBSCRIPTION_ID) is not set")?,
        })
    }
}

fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.is_empty()))
}
