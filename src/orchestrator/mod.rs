//! # Provisioning Orchestrator
//!
//! Drives the fixed stage pipeline of the demo:
//!
//! 1. Create a resource group and capture its name for the finalizer.
//! 2. Create the primary SQL server with two static firewall rules and the
//!    primary database.
//! 3. Create a replica SQL server and a secondary database in each replica
//!    region, sourced from the primary database.
//! 4. Create one virtual network and one VM (with NIC and public IP) per
//!    region, resolve the VMs' public addresses.
//! 5. Register one allow rule per (SQL server, VM address) pair, then log
//!    each server's rules.
//! 6. Delete the SQL servers, and always delete the resource group on the
//!    way out.
//!
//! The first failure in any stage aborts the remaining forward stages; the
//! resource-group deletion still runs, and its own failure is logged rather
//! than propagated so it can never mask the workflow's outcome.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use tracing::{debug, error, info};

use crate::config::WorkflowConfig;
use crate::constants;
use crate::naming;
use crate::provider::{
    CloudProvider, DatabaseCreateMode, FirewallRuleSpec, ImageReference, IpAllocationMethod,
    NetworkInterfaceSpec, PublicIpSpec, ResourceGroup, ResourceGroupSpec, SqlDatabase,
    SqlDatabaseSpec, SqlServer, SqlServerSpec, SubnetSpec, VirtualMachine, VirtualMachineSpec,
    VirtualNetwork, VirtualNetworkSpec,
};

/// Run the full provision-and-teardown workflow against `provider`.
///
/// The returned result reflects the forward stages only; cleanup runs on
/// every exit path and its outcome is logged, never returned.
pub async fn run(provider: &dyn CloudProvider, config: &WorkflowConfig) -> Result<()> {
    let mut captured_group: Option<String> = None;
    let orchestrator = Orchestrator { provider, config };

    let outcome = orchestrator.provision(&mut captured_group).await;
    if let Err(workflow_error) = &outcome {
        error!("Provisioning workflow failed: {workflow_error:#}");
    }

    cleanup(provider, captured_group.as_deref()).await;
    outcome
}

/// Final cleanup: delete the resource group if one was captured.
///
/// Runs unconditionally; a deletion failure is logged and swallowed.
async fn cleanup(provider: &dyn CloudProvider, group_name: Option<&str>) {
    let Some(name) = group_name else {
        debug!("No resource group was created; nothing to clean up");
        return;
    };
    info!("Deleting resource group {name}...");
    match provider.delete_resource_group(name).await {
        Ok(()) => info!("Deleted resource group {name}"),
        Err(cleanup_error) => {
            error!("Failed to delete resource group {name}: {cleanup_error}");
        }
    }
}

struct Orchestrator<'a> {
    provider: &'a dyn CloudProvider,
    config: &'a WorkflowConfig,
}

impl Orchestrator<'_> {
    async fn provision(&self, captured_group: &mut Option<String>) -> Result<()> {
        let group = self.create_group().await?;
        // Captured before anything depends on the group so the finalizer can
        // find it on every exit path
        *captured_group = Some(group.name.clone());

        let (primary_server, primary_database) = self.provision_primary(&group.name).await?;
        let mut servers = self
            .provision_secondaries(&group.name, &primary_database)
            .await?;
        servers.push(primary_server);

        let networks = self.build_networks(&group.name).await?;
        let machines = self.build_machines(&group.name, &networks).await?;
        let addresses = self.resolve_addresses(&group.name, &machines).await?;

        self.sync_firewall_rules(&group.name, &servers, &addresses)
            .await?;
        self.report_firewall_rules(&group.name, &servers).await?;
        self.delete_sql_servers(&group.name, &servers).await?;
        Ok(())
    }

    async fn create_group(&self) -> Result<ResourceGroup> {
        let name = naming::random_name(&self.config.group_prefix);
        info!(
            "Creating resource group {name} in {}...",
            self.config.primary_region
        );
        let group = self
            .provider
            .create_resource_group(
                &name,
                &ResourceGroupSpec {
                    location: self.config.primary_region.clone(),
                },
            )
            .await
            .context("failed to create resource group")?;
        info!("Created resource group {}", group.name);
        Ok(group)
    }

    fn sql_server_spec(&self, region: &str) -> SqlServerSpec {
        SqlServerSpec {
            location: region.to_string(),
            administrator_login: self.config.admin_login.clone(),
            administrator_password: self.config.admin_password.clone(),
        }
    }

    /// Primary SQL server, its two static allow ranges, and the primary
    /// database whose id seeds the replicas.
    async fn provision_primary(&self, group: &str) -> Result<(SqlServer, SqlDatabase)> {
        let server_name = naming::random_name("fleetsql-primary-");
        info!(
            "Creating primary SQL server {server_name} in {}...",
            self.config.primary_region
        );
        let server = self
            .provider
            .create_sql_server(group, &server_name, &self.sql_server_spec(&self.config.primary_region))
            .await
            .context("failed to create primary SQL server")?;
        info!("Created primary SQL server {}", server.name);

        info!("Creating static firewall rules on {}...", server.name);
        for (index, (start, end)) in constants::STATIC_ALLOW_RANGES.iter().enumerate() {
            let rule_name = naming::random_name(&format!("allow-range-{index}-"));
            self.provider
                .create_firewall_rule(
                    group,
                    &server.name,
                    &rule_name,
                    &FirewallRuleSpec {
                        start_ip_address: (*start).to_string(),
                        end_ip_address: (*end).to_string(),
                    },
                )
                .await
                .context("failed to create static firewall rule")?;
            debug!("Created firewall rule {rule_name} ({start}-{end})");
        }

        info!(
            "Creating primary database {} on {}...",
            self.config.database_name, server.name
        );
        let database = self
            .provider
            .create_sql_database(
                group,
                &server.name,
                &self.config.database_name,
                &SqlDatabaseSpec {
                    location: self.config.primary_region.clone(),
                    create_mode: DatabaseCreateMode::Default,
                    sku: Some(constants::DATABASE_SKU.to_string()),
                },
            )
            .await
            .context("failed to create primary database")?;
        info!("Created primary database {}", database.name);
        Ok((server, database))
    }

    /// Replica servers and their secondary databases.
    ///
    /// Secondary databases reference the primary database id, so this stage
    /// must not start until the primary database exists.
    async fn provision_secondaries(
        &self,
        group: &str,
        primary: &SqlDatabase,
    ) -> Result<Vec<SqlServer>> {
        let mut servers = Vec::with_capacity(self.config.secondary_regions.len());
        for region in &self.config.secondary_regions {
            let server_name = naming::random_name("fleetsql-replica-");
            info!("Creating replica SQL server {server_name} in {region}...");
            let server = self
                .provider
                .create_sql_server(group, &server_name, &self.sql_server_spec(region))
                .await
                .with_context(|| format!("failed to create replica SQL server in {region}"))?;

            info!(
                "Creating secondary database {} on {}...",
                self.config.database_name, server.name
            );
            self.provider
                .create_sql_database(
                    group,
                    &server.name,
                    &self.config.database_name,
                    &SqlDatabaseSpec {
                        location: region.clone(),
                        create_mode: DatabaseCreateMode::Secondary {
                            source_database_id: primary.id.clone(),
                        },
                        sku: None,
                    },
                )
                .await
                .with_context(|| format!("failed to create secondary database in {region}"))?;
            info!("Created secondary database on {}", server.name);
            servers.push(server);
        }
        Ok(servers)
    }

    /// One virtual network per region. Creations are independent, so they
    /// fan out concurrently and join before the VM stage; results come back
    /// ordered by region index.
    async fn build_networks(&self, group: &str) -> Result<Vec<VirtualNetwork>> {
        info!(
            "Creating {} virtual networks...",
            self.config.vm_regions.len()
        );
        let provider = self.provider;
        let creations = self.config.vm_regions.iter().map(|region| {
            let name = naming::random_name("fleetnet");
            let spec = VirtualNetworkSpec {
                location: region.clone(),
                address_prefixes: vec![constants::VNET_ADDRESS_SPACE.to_string()],
                subnets: vec![SubnetSpec {
                    name: naming::random_name("subnet"),
                    address_prefix: constants::SUBNET_ADDRESS_PREFIX.to_string(),
                }],
            };
            async move {
                let network = provider
                    .create_virtual_network(group, &name, &spec)
                    .await
                    .with_context(|| {
                        format!("failed to create virtual network in {}", spec.location)
                    })?;
                info!(
                    "Created virtual network {} in {}",
                    network.name, network.location
                );
                Ok::<_, anyhow::Error>(network)
            }
        });
        try_join_all(creations).await
    }

    /// One VM per network: public IP, NIC bound to subnet + IP, then the
    /// machine itself. Independent per network, fanned out like the
    /// networks.
    async fn build_machines(
        &self,
        group: &str,
        networks: &[VirtualNetwork],
    ) -> Result<Vec<VirtualMachine>> {
        if networks.is_empty() {
            return Ok(Vec::new());
        }
        info!("Creating one virtual machine per network...");
        let provider = self.provider;
        let config = self.config;
        let creations = networks.iter().map(|network| {
            let machine_name = naming::random_name("fleetvm");
            async move {
                let subnet_id = network
                    .subnet_ids
                    .first()
                    .with_context(|| format!("virtual network {} has no subnet", network.name))?
                    .clone();

                // The public IP shares the VM name so the address can be
                // looked up by machine name later
                let public_ip = provider
                    .create_public_ip(
                        group,
                        &machine_name,
                        &PublicIpSpec {
                            location: network.location.clone(),
                            allocation_method: IpAllocationMethod::Dynamic,
                        },
                    )
                    .await
                    .with_context(|| format!("failed to create public IP for {machine_name}"))?;

                let nic_name = naming::random_name("fleetnic");
                let nic = provider
                    .create_network_interface(
                        group,
                        &nic_name,
                        &NetworkInterfaceSpec {
                            location: network.location.clone(),
                            subnet_id,
                            public_ip_id: public_ip.id.clone(),
                        },
                    )
                    .await
                    .with_context(|| {
                        format!("failed to create network interface for {machine_name}")
                    })?;

                let machine = provider
                    .create_virtual_machine(
                        group,
                        &machine_name,
                        &VirtualMachineSpec {
                            location: network.location.clone(),
                            size: constants::VM_SIZE.to_string(),
                            image: ImageReference::windows_desktop(),
                            os_disk_name: naming::random_name("fleetdisk"),
                            admin_username: config.admin_login.clone(),
                            admin_password: config.admin_password.clone(),
                            network_interface_id: nic.id.clone(),
                        },
                    )
                    .await
                    .with_context(|| format!("failed to create virtual machine {machine_name}"))?;
                info!(
                    "Created virtual machine {} in {}",
                    machine.name, machine.location
                );
                Ok::<_, anyhow::Error>(machine)
            }
        });
        try_join_all(creations).await
    }

    /// Resolve each machine's public address into an ordered
    /// (machine name, address) list.
    ///
    /// Dynamic addresses are assigned asynchronously by the provider, so
    /// each lookup retries briefly until an address appears.
    async fn resolve_addresses(
        &self,
        group: &str,
        machines: &[VirtualMachine],
    ) -> Result<Vec<(String, String)>> {
        let mut addresses = Vec::with_capacity(machines.len());
        for machine in machines {
            let address = self.wait_for_address(group, &machine.name).await?;
            info!("Virtual machine {} has public IP {address}", machine.name);
            addresses.push((machine.name.clone(), address));
        }
        Ok(addresses)
    }

    async fn wait_for_address(&self, group: &str, machine_name: &str) -> Result<String> {
        for attempt in 1..=constants::IP_RESOLVE_ATTEMPTS {
            let public_ip = self
                .provider
                .get_public_ip(group, machine_name)
                .await
                .with_context(|| format!("failed to read public IP for {machine_name}"))?;
            if let Some(address) = public_ip.ip_address {
                return Ok(address);
            }
            // No point sleeping once the last attempt has come up empty
            if attempt == constants::IP_RESOLVE_ATTEMPTS {
                break;
            }
            debug!("Public IP for {machine_name} not assigned yet (attempt {attempt})");
            tokio::time::sleep(std::time::Duration::from_secs(
                constants::IP_RESOLVE_INTERVAL_SECS,
            ))
            .await;
        }
        anyhow::bail!("public IP for {machine_name} was not assigned in time")
    }

    /// One allow rule per (server, machine address) pair. The rule reuses
    /// the machine name and allows exactly its address (start = end).
    async fn sync_firewall_rules(
        &self,
        group: &str,
        servers: &[SqlServer],
        addresses: &[(String, String)],
    ) -> Result<()> {
        info!(
            "Registering firewall rules for {} machines on {} SQL servers...",
            addresses.len(),
            servers.len()
        );
        for server in servers {
            for (machine_name, address) in addresses {
                self.provider
                    .create_firewall_rule(
                        group,
                        &server.name,
                        machine_name,
                        &FirewallRuleSpec::single_address(address),
                    )
                    .await
                    .with_context(|| {
                        format!("failed to create firewall rule {machine_name} on {}", server.name)
                    })?;
            }
        }
        Ok(())
    }

    /// Read-only report: log every server's firewall rules.
    async fn report_firewall_rules(&self, group: &str, servers: &[SqlServer]) -> Result<()> {
        for server in servers {
            let rules = self
                .provider
                .list_firewall_rules(group, &server.name)
                .await
                .with_context(|| format!("failed to list firewall rules on {}", server.name))?;
            info!(
                "SQL server {} ({}) has {} firewall rules:",
                server.name,
                server.location,
                rules.len()
            );
            for rule in rules {
                info!(
                    "  {} allows {}-{}",
                    rule.name, rule.start_ip_address, rule.end_ip_address
                );
            }
        }
        Ok(())
    }

    /// Server deletion cascades to databases and firewall rules at the
    /// provider.
    async fn delete_sql_servers(&self, group: &str, servers: &[SqlServer]) -> Result<()> {
        info!("Deleting all SQL servers...");
        for server in servers {
            self.provider
                .delete_sql_server(group, &server.name)
                .await
                .with_context(|| format!("failed to delete SQL server {}", server.name))?;
            info!("Deleted SQL server {}", server.name);
        }
        Ok(())
    }
}
