//! # SQL Fleet Provisioner
//!
//! Demo workflow that provisions a geo-replicated Azure SQL fleet and tears
//! it down again.
//!
//! ## Overview
//!
//! One run drives this fixed sequence against the Azure Resource Manager
//! API:
//!
//! 1. **Resource group** - one container in the primary region, always
//!    deleted at the end of the run
//! 2. **Primary SQL server** - with two static firewall rules and a primary
//!    database
//! 3. **Replica SQL servers** - one per secondary region, each with a
//!    secondary (read-replica) database sourced from the primary
//! 4. **VM fleet** - one virtual network and one VM (with NIC and dynamic
//!    public IP) in each of five regions
//! 5. **Firewall sync** - one allow rule per (SQL server, VM address) pair,
//!    then a report of every server's rules
//! 6. **Teardown** - SQL servers first, then the resource group
//!
//! ## Usage
//!
//! Export `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`, `AZURE_TENANT_ID`, and
//! `AZURE_SUBSCRIPTION_ID` (a local `.env` works too) and run the binary.
//! Progress is logged per stage; the process exits non-zero if any
//! provisioning stage fails.

use anyhow::{Context, Result};
use tracing::info;

use sql_fleet_provisioner::config::{ArmCredentials, WorkflowConfig};
use sql_fleet_provisioner::orchestrator;
use sql_fleet_provisioner::provider::arm::ArmClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Service-principal credentials may live in a local .env for dev runs
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sql_fleet_provisioner=info".into()),
        )
        .init();

    info!("Starting SQL fleet provisioning demo");

    let credentials = ArmCredentials::from_env()
        .context("Failed to load Azure credentials from environment")?;
    let provider = ArmClient::new(credentials)
        .await
        .context("Failed to initialize ARM client")?;
    let config = WorkflowConfig::default();

    orchestrator::run(&provider, &config).await?;

    info!("Provisioning demo finished");
    Ok(())
}
