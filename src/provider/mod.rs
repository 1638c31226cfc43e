//! # Cloud Provider Seam
//!
//! Abstract interface for the resource-management service the workflow drives.
//!
//! Every resource kind exposes the same three-operation surface: an
//! idempotent createOrUpdate that waits for the underlying long-running
//! operation to reach a terminal state, a list over a parent collection, and
//! a delete that likewise waits for completion. The orchestrator only ever
//! talks to this trait, which keeps the staged workflow testable against an
//! in-memory double.

use async_trait::async_trait;
use thiserror::Error;

pub mod arm;
pub mod types;

pub use types::{
    DatabaseCreateMode, FirewallRule, FirewallRuleSpec, ImageReference, IpAllocationMethod,
    NetworkInterface, NetworkInterfaceSpec, PublicIp, PublicIpSpec, ResourceGroup,
    ResourceGroupSpec, SqlDatabase, SqlDatabaseSpec, SqlServer, SqlServerSpec, SubnetSpec,
    VirtualMachine, VirtualMachineSpec, VirtualNetwork, VirtualNetworkSpec,
};

/// Errors surfaced by a [`CloudProvider`] implementation.
///
/// Provider-side request failures (validation errors, quota limits, name
/// conflicts) are not distinguished from each other; they all surface as
/// [`ProviderError::Api`] with whatever detail the service returned.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Token acquisition or credential problems
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service rejected or failed a request
    #[error("{resource}: request failed with HTTP {status}: {message}")]
    Api {
        resource: String,
        status: u16,
        message: String,
    },

    /// A read found no such resource
    #[error("{resource}: not found")]
    NotFound { resource: String },

    /// A long-running operation did not reach a terminal state in time
    #[error("{resource}: timed out waiting for operation to complete")]
    OperationTimeout { resource: String },

    /// Transport-level failure before any service response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("unexpected response body: {0}")]
    Body(#[from] serde_json::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Management surface the provisioning workflow consumes.
///
/// All createOrUpdate operations are upserts: re-issuing a call with the same
/// name and spec must not create a duplicate resource. All mutating
/// operations block until the provider reports the operation complete.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Create or update the top-level container for every other resource.
    async fn create_resource_group(
        &self,
        name: &str,
        spec: &ResourceGroupSpec,
    ) -> ProviderResult<ResourceGroup>;

    /// Delete a resource group and everything in it.
    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()>;

    async fn create_sql_server(
        &self,
        group: &str,
        name: &str,
        spec: &SqlServerSpec,
    ) -> ProviderResult<SqlServer>;

    /// Delete a SQL server; its databases and firewall rules go with it.
    async fn delete_sql_server(&self, group: &str, name: &str) -> ProviderResult<()>;

    /// Create a database on a server. For
    /// [`DatabaseCreateMode::Secondary`] the referenced source database must
    /// already exist or the provider rejects the call.
    async fn create_sql_database(
        &self,
        group: &str,
        server: &str,
        name: &str,
        spec: &SqlDatabaseSpec,
    ) -> ProviderResult<SqlDatabase>;

    async fn create_firewall_rule(
        &self,
        group: &str,
        server: &str,
        name: &str,
        spec: &FirewallRuleSpec,
    ) -> ProviderResult<FirewallRule>;

    async fn list_firewall_rules(
        &self,
        group: &str,
        server: &str,
    ) -> ProviderResult<Vec<FirewallRule>>;

    async fn create_virtual_network(
        &self,
        group: &str,
        name: &str,
        spec: &VirtualNetworkSpec,
    ) -> ProviderResult<VirtualNetwork>;

    async fn create_public_ip(
        &self,
        group: &str,
        name: &str,
        spec: &PublicIpSpec,
    ) -> ProviderResult<PublicIp>;

    /// Read a public IP; the address field stays `None` until the provider
    /// has assigned one.
    async fn get_public_ip(&self, group: &str, name: &str) -> ProviderResult<PublicIp>;

    async fn create_network_interface(
        &self,
        group: &str,
        name: &str,
        spec: &NetworkInterfaceSpec,
    ) -> ProviderResult<NetworkInterface>;

    async fn create_virtual_machine(
        &self,
        group: &str,
        name: &str,
        spec: &VirtualMachineSpec,
    ) -> ProviderResult<VirtualMachine>;
}
