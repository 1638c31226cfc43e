//! In-memory cloud provider double for workflow tests.
//!
//! Mirrors the management service closely enough to exercise the workflow:
//! createOrUpdate calls are upserts keyed by name, secondary databases are
//! rejected unless their source database exists, and dynamic public IPs only
//! receive an address once a machine is attached to them. Every call lands in
//! an ordered log so tests can assert on sequencing, and any operation can be
//! made to fail on demand.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use sql_fleet_provisioner::provider::{
    CloudProvider, DatabaseCreateMode, FirewallRule, FirewallRuleSpec, NetworkInterface,
    NetworkInterfaceSpec, ProviderError, ProviderResult, PublicIp, PublicIpSpec, ResourceGroup,
    ResourceGroupSpec, SqlDatabase, SqlDatabaseSpec, SqlServer, SqlServerSpec, VirtualMachine,
    VirtualMachineSpec, VirtualNetwork, VirtualNetworkSpec,
};

const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000fa4";

/// Operations the double can count or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateResourceGroup,
    DeleteResourceGroup,
    CreateSqlServer,
    DeleteSqlServer,
    CreateSqlDatabase,
    CreateFirewallRule,
    ListFirewallRules,
    CreateVirtualNetwork,
    CreatePublicIp,
    GetPublicIp,
    CreateNetworkInterface,
    CreateVirtualMachine,
}

/// One recorded provider call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateResourceGroup {
        name: String,
    },
    DeleteResourceGroup {
        name: String,
    },
    CreateSqlServer {
        group: String,
        name: String,
        region: String,
    },
    DeleteSqlServer {
        group: String,
        name: String,
    },
    CreateSqlDatabase {
        group: String,
        server: String,
        name: String,
        /// Source database id for secondary databases, `None` for primaries
        source: Option<String>,
    },
    CreateFirewallRule {
        group: String,
        server: String,
        name: String,
        start: String,
        end: String,
    },
    ListFirewallRules {
        group: String,
        server: String,
    },
    CreateVirtualNetwork {
        group: String,
        name: String,
        region: String,
    },
    CreatePublicIp {
        group: String,
        name: String,
    },
    GetPublicIp {
        group: String,
        name: String,
    },
    CreateNetworkInterface {
        group: String,
        name: String,
    },
    CreateVirtualMachine {
        group: String,
        name: String,
        region: String,
    },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::CreateResourceGroup { .. } => Op::CreateResourceGroup,
            Call::DeleteResourceGroup { .. } => Op::DeleteResourceGroup,
            Call::CreateSqlServer { .. } => Op::CreateSqlServer,
            Call::DeleteSqlServer { .. } => Op::DeleteSqlServer,
            Call::CreateSqlDatabase { .. } => Op::CreateSqlDatabase,
            Call::CreateFirewallRule { .. } => Op::CreateFirewallRule,
            Call::ListFirewallRules { .. } => Op::ListFirewallRules,
            Call::CreateVirtualNetwork { .. } => Op::CreateVirtualNetwork,
            Call::CreatePublicIp { .. } => Op::CreatePublicIp,
            Call::GetPublicIp { .. } => Op::GetPublicIp,
            Call::CreateNetworkInterface { .. } => Op::CreateNetworkInterface,
            Call::CreateVirtualMachine { .. } => Op::CreateVirtualMachine,
        }
    }
}

#[derive(Default)]
struct PublicIpState {
    address: Option<String>,
    /// Reads that still return no address even after assignment
    reads_until_visible: u32,
}

#[derive(Default)]
struct State {
    groups: BTreeMap<String, ResourceGroupSpec>,
    /// Keyed "group/name"
    sql_servers: BTreeMap<String, SqlServerSpec>,
    /// Keyed "group/server/name"
    databases: BTreeMap<String, SqlDatabaseSpec>,
    /// Keyed "group/server/name"
    firewall_rules: BTreeMap<String, FirewallRuleSpec>,
    /// Keyed "group/name"
    networks: BTreeMap<String, VirtualNetworkSpec>,
    subnet_ids: HashSet<String>,
    /// Keyed "group/name"
    public_ips: BTreeMap<String, PublicIpState>,
    /// Public IP resource id -> "group/name" key
    public_ip_index: BTreeMap<String, String>,
    /// Keyed "group/name"
    nics: BTreeMap<String, NetworkInterfaceSpec>,
    /// NIC resource id -> bound public IP resource id
    nic_public_ips: BTreeMap<String, String>,
    /// Keyed "group/name"
    machines: BTreeMap<String, VirtualMachineSpec>,
    next_host: u8,
    /// Applied to each address at assignment time
    assignment_delay_reads: u32,
    calls: Vec<Call>,
    fail_ops: HashSet<Op>,
}

/// The double itself. Interior mutability keeps the provider usable behind
/// the `&self` trait surface.
pub struct FakeCloud {
    state: Mutex<State>,
}

fn group_path(name: &str) -> String {
    format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{name}")
}

fn sql_server_id(group: &str, name: &str) -> String {
    format!(
        "{}/providers/Microsoft.Sql/servers/{name}",
        group_path(group)
    )
}

fn database_id(group: &str, server: &str, name: &str) -> String {
    format!("{}/databases/{name}", sql_server_id(group, server))
}

fn network_id(group: &str, kind: &str, name: &str) -> String {
    format!(
        "{}/providers/Microsoft.Network/{kind}/{name}",
        group_path(group)
    )
}

fn machine_id(group: &str, name: &str) -> String {
    format!(
        "{}/providers/Microsoft.Compute/virtualMachines/{name}",
        group_path(group)
    )
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Make every subsequent call to `op` fail with an injected API error.
    pub fn fail_on(&self, op: Op) {
        self.lock().fail_ops.insert(op);
    }

    /// Newly assigned addresses stay invisible for this many reads, to
    /// exercise the caller's retry loop.
    pub fn delay_ip_assignment(&self, reads: u32) {
        self.lock().assignment_delay_reads = reads;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.lock().groups.keys().cloned().collect()
    }

    pub fn sql_server_count(&self) -> usize {
        self.lock().sql_servers.len()
    }

    pub fn network_count(&self) -> usize {
        self.lock().networks.len()
    }

    pub fn machine_count(&self) -> usize {
        self.lock().machines.len()
    }

    pub fn public_ip_count(&self) -> usize {
        self.lock().public_ips.len()
    }

    pub fn firewall_rules_on(&self, group: &str, server: &str) -> Vec<FirewallRule> {
        let state = self.lock();
        let prefix = format!("{group}/{server}/");
        state
            .firewall_rules
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, spec)| FirewallRule {
                name: key[prefix.len()..].to_string(),
                start_ip_address: spec.start_ip_address.clone(),
                end_ip_address: spec.end_ip_address.clone(),
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("state mutex poisoned")
    }

    /// Record the call, then fail it if its operation is marked.
    fn begin(state: &mut State, call: Call) -> ProviderResult<()> {
        let op = call.op();
        state.calls.push(call);
        if state.fail_ops.contains(&op) {
            return Err(ProviderError::Api {
                resource: format!("{op:?}"),
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn require_group(state: &State, group: &str) -> ProviderResult<()> {
        if state.groups.contains_key(group) {
            Ok(())
        } else {
            Err(ProviderError::Api {
                resource: group.to_string(),
                status: 404,
                message: format!("resource group {group} does not exist"),
            })
        }
    }

    fn require_server(state: &State, group: &str, server: &str) -> ProviderResult<()> {
        if state.sql_servers.contains_key(&format!("{group}/{server}")) {
            Ok(())
        } else {
            Err(ProviderError::Api {
                resource: server.to_string(),
                status: 404,
                message: format!("SQL server {server} does not exist in {group}"),
            })
        }
    }
}

impl Default for FakeCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn create_resource_group(
        &self,
        name: &str,
        spec: &ResourceGroupSpec,
    ) -> ProviderResult<ResourceGroup> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreateResourceGroup {
                name: name.to_string(),
            },
        )?;
        state.groups.insert(name.to_string(), spec.clone());
        Ok(ResourceGroup {
            name: name.to_string(),
            location: spec.location.clone(),
        })
    }

    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::DeleteResourceGroup {
                name: name.to_string(),
            },
        )?;
        // Cascade: everything keyed under the group goes with it
        state.groups.remove(name);
        let prefix = format!("{name}/");
        state.sql_servers.retain(|key, _| !key.starts_with(&prefix));
        state.databases.retain(|key, _| !key.starts_with(&prefix));
        state
            .firewall_rules
            .retain(|key, _| !key.starts_with(&prefix));
        state.networks.retain(|key, _| !key.starts_with(&prefix));
        state.public_ips.retain(|key, _| !key.starts_with(&prefix));
        state.nics.retain(|key, _| !key.starts_with(&prefix));
        state.machines.retain(|key, _| !key.starts_with(&prefix));
        let group_prefix = group_path(name);
        state.subnet_ids.retain(|id| !id.starts_with(&group_prefix));
        state
            .public_ip_index
            .retain(|id, _| !id.starts_with(&group_prefix));
        state
            .nic_public_ips
            .retain(|id, _| !id.starts_with(&group_prefix));
        Ok(())
    }

    async fn create_sql_server(
        &self,
        group: &str,
        name: &str,
        spec: &SqlServerSpec,
    ) -> ProviderResult<SqlServer> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreateSqlServer {
                group: group.to_string(),
                name: name.to_string(),
                region: spec.location.clone(),
            },
        )?;
        Self::require_group(&state, group)?;
        state
            .sql_servers
            .insert(format!("{group}/{name}"), spec.clone());
        Ok(SqlServer {
            id: sql_server_id(group, name),
            name: name.to_string(),
            location: spec.location.clone(),
        })
    }

    async fn delete_sql_server(&self, group: &str, name: &str) -> ProviderResult<()> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::DeleteSqlServer {
                group: group.to_string(),
                name: name.to_string(),
            },
        )?;
        state.sql_servers.remove(&format!("{group}/{name}"));
        let prefix = format!("{group}/{name}/");
        state.databases.retain(|key, _| !key.starts_with(&prefix));
        state
            .firewall_rules
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn create_sql_database(
        &self,
        group: &str,
        server: &str,
        name: &str,
        spec: &SqlDatabaseSpec,
    ) -> ProviderResult<SqlDatabase> {
        let mut state = self.lock();
        let source = match &spec.create_mode {
            DatabaseCreateMode::Default => None,
            DatabaseCreateMode::Secondary { source_database_id } => {
                Some(source_database_id.clone())
            }
        };
        Self::begin(
            &mut state,
            Call::CreateSqlDatabase {
                group: group.to_string(),
                server: server.to_string(),
                name: name.to_string(),
                source: source.clone(),
            },
        )?;
        Self::require_group(&state, group)?;
        Self::require_server(&state, group, server)?;
        if let Some(source_id) = &source {
            let known = state
                .databases
                .keys()
                .any(|key| id_for_database_key(key) == *source_id);
            if !known {
                return Err(ProviderError::Api {
                    resource: name.to_string(),
                    status: 400,
                    message: format!("source database {source_id} does not exist"),
                });
            }
        }
        state
            .databases
            .insert(format!("{group}/{server}/{name}"), spec.clone());
        Ok(SqlDatabase {
            id: database_id(group, server, name),
            name: name.to_string(),
        })
    }

    async fn create_firewall_rule(
        &self,
        group: &str,
        server: &str,
        name: &str,
        spec: &FirewallRuleSpec,
    ) -> ProviderResult<FirewallRule> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreateFirewallRule {
                group: group.to_string(),
                server: server.to_string(),
                name: name.to_string(),
                start: spec.start_ip_address.clone(),
                end: spec.end_ip_address.clone(),
            },
        )?;
        Self::require_group(&state, group)?;
        Self::require_server(&state, group, server)?;
        state
            .firewall_rules
            .insert(format!("{group}/{server}/{name}"), spec.clone());
        Ok(FirewallRule {
            name: name.to_string(),
            start_ip_address: spec.start_ip_address.clone(),
            end_ip_address: spec.end_ip_address.clone(),
        })
    }

    async fn list_firewall_rules(
        &self,
        group: &str,
        server: &str,
    ) -> ProviderResult<Vec<FirewallRule>> {
        {
            let mut state = self.lock();
            Self::begin(
                &mut state,
                Call::ListFirewallRules {
                    group: group.to_string(),
                    server: server.to_string(),
                },
            )?;
            Self::require_server(&state, group, server)?;
        }
        Ok(self.firewall_rules_on(group, server))
    }

    async fn create_virtual_network(
        &self,
        group: &str,
        name: &str,
        spec: &VirtualNetworkSpec,
    ) -> ProviderResult<VirtualNetwork> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreateVirtualNetwork {
                group: group.to_string(),
                name: name.to_string(),
                region: spec.location.clone(),
            },
        )?;
        Self::require_group(&state, group)?;
        let network_resource_id = network_id(group, "virtualNetworks", name);
        let subnet_ids: Vec<String> = spec
            .subnets
            .iter()
            .map(|subnet| format!("{network_resource_id}/subnets/{}", subnet.name))
            .collect();
        for id in &subnet_ids {
            state.subnet_ids.insert(id.clone());
        }
        state
            .networks
            .insert(format!("{group}/{name}"), spec.clone());
        Ok(VirtualNetwork {
            id: network_resource_id,
            name: name.to_string(),
            location: spec.location.clone(),
            subnet_ids,
        })
    }

    async fn create_public_ip(
        &self,
        group: &str,
        name: &str,
        _spec: &PublicIpSpec,
    ) -> ProviderResult<PublicIp> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreatePublicIp {
                group: group.to_string(),
                name: name.to_string(),
            },
        )?;
        Self::require_group(&state, group)?;
        let id = network_id(group, "publicIPAddresses", name);
        let key = format!("{group}/{name}");
        state.public_ips.entry(key.clone()).or_default();
        state.public_ip_index.insert(id.clone(), key);
        Ok(PublicIp {
            id,
            name: name.to_string(),
            ip_address: None,
        })
    }

    async fn get_public_ip(&self, group: &str, name: &str) -> ProviderResult<PublicIp> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::GetPublicIp {
                group: group.to_string(),
                name: name.to_string(),
            },
        )?;
        let key = format!("{group}/{name}");
        let Some(ip) = state.public_ips.get_mut(&key) else {
            return Err(ProviderError::NotFound { resource: key });
        };
        let visible = if ip.reads_until_visible > 0 {
            ip.reads_until_visible -= 1;
            None
        } else {
            ip.address.clone()
        };
        Ok(PublicIp {
            id: network_id(group, "publicIPAddresses", name),
            name: name.to_string(),
            ip_address: visible,
        })
    }

    async fn create_network_interface(
        &self,
        group: &str,
        name: &str,
        spec: &NetworkInterfaceSpec,
    ) -> ProviderResult<NetworkInterface> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreateNetworkInterface {
                group: group.to_string(),
                name: name.to_string(),
            },
        )?;
        Self::require_group(&state, group)?;
        if !state.subnet_ids.contains(&spec.subnet_id) {
            return Err(ProviderError::Api {
                resource: name.to_string(),
                status: 400,
                message: format!("subnet {} does not exist", spec.subnet_id),
            });
        }
        if !state.public_ip_index.contains_key(&spec.public_ip_id) {
            return Err(ProviderError::Api {
                resource: name.to_string(),
                status: 400,
                message: format!("public IP {} does not exist", spec.public_ip_id),
            });
        }
        let id = network_id(group, "networkInterfaces", name);
        state.nics.insert(format!("{group}/{name}"), spec.clone());
        state
            .nic_public_ips
            .insert(id.clone(), spec.public_ip_id.clone());
        Ok(NetworkInterface {
            id,
            name: name.to_string(),
            location: spec.location.clone(),
        })
    }

    async fn create_virtual_machine(
        &self,
        group: &str,
        name: &str,
        spec: &VirtualMachineSpec,
    ) -> ProviderResult<VirtualMachine> {
        let mut state = self.lock();
        Self::begin(
            &mut state,
            Call::CreateVirtualMachine {
                group: group.to_string(),
                name: name.to_string(),
                region: spec.location.clone(),
            },
        )?;
        Self::require_group(&state, group)?;
        let Some(public_ip_id) = state.nic_public_ips.get(&spec.network_interface_id).cloned()
        else {
            return Err(ProviderError::Api {
                resource: name.to_string(),
                status: 400,
                message: format!(
                    "network interface {} does not exist",
                    spec.network_interface_id
                ),
            });
        };
        // Attaching a machine is what makes a dynamic address materialize
        if let Some(key) = state.public_ip_index.get(&public_ip_id).cloned() {
            state.next_host += 1;
            let host = state.next_host;
            let delay = state.assignment_delay_reads;
            if let Some(ip) = state.public_ips.get_mut(&key) {
                if ip.address.is_none() {
                    ip.address = Some(format!("203.0.113.{host}"));
                    ip.reads_until_visible = delay;
                }
            }
        }
        state
            .machines
            .insert(format!("{group}/{name}"), spec.clone());
        Ok(VirtualMachine {
            id: machine_id(group, name),
            name: name.to_string(),
            location: spec.location.clone(),
        })
    }
}

fn id_for_database_key(key: &str) -> String {
    let mut parts = key.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(group), Some(server), Some(name)) => database_id(group, server, name),
        _ => String::new(),
    }
}
