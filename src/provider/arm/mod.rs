//! # Azure Resource Manager Client
//!
//! Native REST implementation of [`CloudProvider`] against the ARM API.
//! Uses reqwest for HTTP requests and OAuth2 client-credentials for
//! authentication.
//!
//! Every createOrUpdate is a `PUT` on the resource path; ARM accepts the
//! request and runs the operation asynchronously, so the client polls the
//! resource until `properties.provisioningState` reaches a terminal state
//! before returning. Deletes poll until the resource reads back 404. Both
//! polls run under a deadline so a wedged operation cannot hang a run
//! forever.
//!
//! References:
//! - [ARM REST API](https://learn.microsoft.com/rest/api/resources/)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

mod auth;
mod bodies;

use bodies::{
    AddressSpaceBody, ArmErrorEnvelope, ArmResource, FirewallRuleBody, FirewallRuleProperties,
    HardwareProfileBody, ImageReferenceBody, IpConfigurationBody, IpConfigurationProperties,
    ListEnvelope, ManagedDiskBody, NetworkInterfaceBody, NetworkInterfaceProperties,
    NetworkProfileBody, NicReferenceBody, NicReferenceProperties, OsDiskBody, OsProfileBody,
    PublicIpBody, PublicIpProperties, ResourceGroupBody, ResourceRefBody, SkuBody,
    SqlDatabaseBody, SqlDatabaseProperties, SqlServerBody, SqlServerProperties,
    StorageProfileBody, SubnetBody, SubnetProperties, VirtualMachineBody,
    VirtualMachineProperties, VirtualNetworkBody, VirtualNetworkProperties,
};

use crate::config::ArmCredentials;
use crate::constants;
use crate::provider::types::{
    DatabaseCreateMode, FirewallRule, FirewallRuleSpec, IpAllocationMethod, NetworkInterface,
    NetworkInterfaceSpec, PublicIp, PublicIpSpec, ResourceGroup, ResourceGroupSpec, SqlDatabase,
    SqlDatabaseSpec, SqlServer, SqlServerSpec, VirtualMachine, VirtualMachineSpec,
    VirtualNetwork, VirtualNetworkSpec,
};
use crate::provider::{CloudProvider, ProviderError, ProviderResult};

const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const RESOURCE_API_VERSION: &str = "2021-04-01";
const SQL_API_VERSION: &str = "2021-11-01";
const NETWORK_API_VERSION: &str = "2023-04-01";
const COMPUTE_API_VERSION: &str = "2023-03-01";

/// ARM REST client scoped to one subscription.
pub struct ArmClient {
    http: Client,
    management_endpoint: String,
    subscription_id: String,
    access_token: String,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("management_endpoint", &self.management_endpoint)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// Create a client and fetch an access token for the management scope.
    ///
    /// `ARM_MANAGEMENT_ENDPOINT` and `ARM_AUTHORITY_HOST` override the
    /// public cloud endpoints, which lets the client run against sovereign
    /// clouds or a local mock server.
    pub async fn new(credentials: ArmCredentials) -> ProviderResult<Self> {
        let management_endpoint = std::env::var("ARM_MANAGEMENT_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_MANAGEMENT_ENDPOINT.to_string());
        let authority_host = std::env::var("ARM_AUTHORITY_HOST")
            .unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string());

        info!(
            "Initializing ARM client for subscription {}",
            credentials.subscription_id
        );

        let http = Client::builder().build()?;
        let access_token =
            auth::fetch_access_token(&http, &authority_host, &credentials, MANAGEMENT_SCOPE)
                .await?;

        Ok(Self {
            http,
            management_endpoint,
            subscription_id: credentials.subscription_id,
            access_token,
        })
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!(
            "{}/subscriptions/{}/{}?api-version={}",
            self.management_endpoint.trim_end_matches('/'),
            self.subscription_id,
            path,
            api_version
        )
    }

    fn sql_server_path(group: &str, server: &str) -> String {
        format!("resourceGroups/{group}/providers/Microsoft.Sql/servers/{server}")
    }

    fn network_path(group: &str, kind: &str, name: &str) -> String {
        format!("resourceGroups/{group}/providers/Microsoft.Network/{kind}/{name}")
    }

    /// PUT the resource, then poll it until provisioning completes.
    async fn put_and_wait<B: Serialize + Sync>(
        &self,
        path: &str,
        api_version: &str,
        body: &B,
        resource: &str,
    ) -> ProviderResult<ArmResource> {
        let response = self
            .http
            .put(self.url(path, api_version))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        let accepted = Self::parse_or_error(response, resource).await?;
        self.wait_provisioned(path, api_version, resource, accepted)
            .await
    }

    async fn get_resource(
        &self,
        path: &str,
        api_version: &str,
        resource: &str,
    ) -> ProviderResult<ArmResource> {
        let response = self
            .http
            .get(self.url(path, api_version))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                resource: resource.to_string(),
            });
        }
        Self::parse_or_error(response, resource).await
    }

    /// DELETE the resource, then poll until it reads back 404.
    async fn delete_and_wait_gone(
        &self,
        path: &str,
        api_version: &str,
        resource: &str,
    ) -> ProviderResult<()> {
        let response = self
            .http
            .delete(self.url(path, api_version))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status();
        // 404 means the resource is already gone, which is all delete asks for
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(resource, status, body));
        }

        let deadline = Instant::now() + Duration::from_secs(constants::LRO_DEADLINE_SECS);
        loop {
            match self.get_resource(path, api_version, resource).await {
                Err(ProviderError::NotFound { .. }) => return Ok(()),
                Ok(current) => debug!(
                    "{} still present (state {:?})",
                    resource,
                    current.provisioning_state()
                ),
                Err(other) => return Err(other),
            }
            if Instant::now() >= deadline {
                return Err(ProviderError::OperationTimeout {
                    resource: resource.to_string(),
                });
            }
            sleep(Duration::from_secs(constants::LRO_POLL_INTERVAL_SECS)).await;
        }
    }

    /// Poll the resource until `provisioningState` is terminal.
    ///
    /// Resources without a provisioning state (resource groups respond with
    /// `Succeeded` immediately, firewall rules have none at all) return on
    /// the first pass.
    async fn wait_provisioned(
        &self,
        path: &str,
        api_version: &str,
        resource: &str,
        initial: ArmResource,
    ) -> ProviderResult<ArmResource> {
        let deadline = Instant::now() + Duration::from_secs(constants::LRO_DEADLINE_SECS);
        let mut current = initial;
        loop {
            match current.provisioning_state() {
                None | Some("Succeeded") => return Ok(current),
                Some(state @ ("Failed" | "Canceled")) => {
                    return Err(ProviderError::Api {
                        resource: resource.to_string(),
                        status: 200,
                        message: format!("operation ended in state {state}"),
                    });
                }
                Some(state) => debug!("{} provisioning state: {}", resource, state),
            }
            if Instant::now() >= deadline {
                return Err(ProviderError::OperationTimeout {
                    resource: resource.to_string(),
                });
            }
            sleep(Duration::from_secs(constants::LRO_POLL_INTERVAL_SECS)).await;
            current = self.get_resource(path, api_version, resource).await?;
        }
    }

    async fn parse_or_error(response: Response, resource: &str) -> ProviderResult<ArmResource> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(resource, status, body));
        }
        Ok(response.json::<ArmResource>().await?)
    }

    /// Build the firewall-rule handle from the service response, falling
    /// back to the requested addresses when the response omits them.
    ///
    /// Reads the property accessors before taking the name so the envelope
    /// is only consumed once everything else is extracted.
    fn firewall_rule_handle(created: ArmResource, spec: &FirewallRuleSpec) -> FirewallRule {
        FirewallRule {
            start_ip_address: created
                .start_ip_address()
                .unwrap_or_else(|| spec.start_ip_address.clone()),
            end_ip_address: created
                .end_ip_address()
                .unwrap_or_else(|| spec.end_ip_address.clone()),
            name: created.name,
        }
    }

    fn api_error(resource: &str, status: StatusCode, body: String) -> ProviderError {
        let message = match serde_json::from_str::<ArmErrorEnvelope>(&body) {
            Ok(envelope) => format!("{}: {}", envelope.error.code, envelope.error.message),
            Err(_) => body,
        };
        ProviderError::Api {
            resource: resource.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl CloudProvider for ArmClient {
    async fn create_resource_group(
        &self,
        name: &str,
        spec: &ResourceGroupSpec,
    ) -> ProviderResult<ResourceGroup> {
        let path = format!("resourcegroups/{name}");
        let body = ResourceGroupBody {
            location: spec.location.clone(),
        };
        let created = self
            .put_and_wait(&path, RESOURCE_API_VERSION, &body, name)
            .await?;
        Ok(ResourceGroup {
            name: created.name,
            location: created.location.unwrap_or_else(|| spec.location.clone()),
        })
    }

    async fn delete_resource_group(&self, name: &str) -> ProviderResult<()> {
        let path = format!("resourcegroups/{name}");
        self.delete_and_wait_gone(&path, RESOURCE_API_VERSION, name)
            .await
    }

    async fn create_sql_server(
        &self,
        group: &str,
        name: &str,
        spec: &SqlServerSpec,
    ) -> ProviderResult<SqlServer> {
        let path = Self::sql_server_path(group, name);
        let body = SqlServerBody {
            location: spec.location.clone(),
            properties: SqlServerProperties {
                administrator_login: spec.administrator_login.clone(),
                administrator_login_password: spec.administrator_password.clone(),
            },
        };
        let created = self.put_and_wait(&path, SQL_API_VERSION, &body, name).await?;
        Ok(SqlServer {
            id: created.id,
            name: created.name,
            location: created.location.unwrap_or_else(|| spec.location.clone()),
        })
    }

    async fn delete_sql_server(&self, group: &str, name: &str) -> ProviderResult<()> {
        let path = Self::sql_server_path(group, name);
        self.delete_and_wait_gone(&path, SQL_API_VERSION, name).await
    }

    async fn create_sql_database(
        &self,
        group: &str,
        server: &str,
        name: &str,
        spec: &SqlDatabaseSpec,
    ) -> ProviderResult<SqlDatabase> {
        let path = format!("{}/databases/{name}", Self::sql_server_path(group, server));
        let (create_mode, source_database_id) = match &spec.create_mode {
            DatabaseCreateMode::Default => (None, None),
            DatabaseCreateMode::Secondary { source_database_id } => (
                Some("Secondary".to_string()),
                Some(source_database_id.clone()),
            ),
        };
        let body = SqlDatabaseBody {
            location: spec.location.clone(),
            sku: spec.sku.clone().map(|name| SkuBody { name }),
            properties: SqlDatabaseProperties {
                create_mode,
                source_database_id,
            },
        };
        let created = self.put_and_wait(&path, SQL_API_VERSION, &body, name).await?;
        Ok(SqlDatabase {
            id: created.id,
            name: created.name,
        })
    }

    async fn create_firewall_rule(
        &self,
        group: &str,
        server: &str,
        name: &str,
        spec: &FirewallRuleSpec,
    ) -> ProviderResult<FirewallRule> {
        let path = format!(
            "{}/firewallRules/{name}",
            Self::sql_server_path(group, server)
        );
        let body = FirewallRuleBody {
            properties: FirewallRuleProperties {
                start_ip_address: spec.start_ip_address.clone(),
                end_ip_address: spec.end_ip_address.clone(),
            },
        };
        let created = self.put_and_wait(&path, SQL_API_VERSION, &body, name).await?;
        Ok(Self::firewall_rule_handle(created, spec))
    }

    async fn list_firewall_rules(
        &self,
        group: &str,
        server: &str,
    ) -> ProviderResult<Vec<FirewallRule>> {
        let path = format!("{}/firewallRules", Self::sql_server_path(group, server));
        let response = self
            .http
            .get(self.url(&path, SQL_API_VERSION))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::api_error(server, status, body));
        }
        let envelope: ListEnvelope = response.json().await?;
        Ok(envelope
            .value
            .into_iter()
            .map(|rule| FirewallRule {
                start_ip_address: rule.start_ip_address().unwrap_or_default(),
                end_ip_address: rule.end_ip_address().unwrap_or_default(),
                name: rule.name,
            })
            .collect())
    }

    async fn create_virtual_network(
        &self,
        group: &str,
        name: &str,
        spec: &VirtualNetworkSpec,
    ) -> ProviderResult<VirtualNetwork> {
        let path = Self::network_path(group, "virtualNetworks", name);
        let body = VirtualNetworkBody {
            location: spec.location.clone(),
            properties: VirtualNetworkProperties {
                address_space: AddressSpaceBody {
                    address_prefixes: spec.address_prefixes.clone(),
                },
                subnets: spec
                    .subnets
                    .iter()
                    .map(|subnet| SubnetBody {
                        name: subnet.name.clone(),
                        properties: SubnetProperties {
                            address_prefix: subnet.address_prefix.clone(),
                        },
                    })
                    .collect(),
            },
        };
        let created = self
            .put_and_wait(&path, NETWORK_API_VERSION, &body, name)
            .await?;
        Ok(VirtualNetwork {
            subnet_ids: created.subnet_ids(),
            id: created.id,
            name: created.name,
            location: created.location.unwrap_or_else(|| spec.location.clone()),
        })
    }

    async fn create_public_ip(
        &self,
        group: &str,
        name: &str,
        spec: &PublicIpSpec,
    ) -> ProviderResult<PublicIp> {
        let path = Self::network_path(group, "publicIPAddresses", name);
        let allocation = match spec.allocation_method {
            IpAllocationMethod::Dynamic => "Dynamic",
            IpAllocationMethod::Static => "Static",
        };
        let body = PublicIpBody {
            location: spec.location.clone(),
            properties: PublicIpProperties {
                public_ip_allocation_method: allocation.to_string(),
            },
        };
        let created = self
            .put_and_wait(&path, NETWORK_API_VERSION, &body, name)
            .await?;
        Ok(PublicIp {
            ip_address: created.ip_address(),
            id: created.id,
            name: created.name,
        })
    }

    async fn get_public_ip(&self, group: &str, name: &str) -> ProviderResult<PublicIp> {
        let path = Self::network_path(group, "publicIPAddresses", name);
        let current = self.get_resource(&path, NETWORK_API_VERSION, name).await?;
        Ok(PublicIp {
            ip_address: current.ip_address(),
            id: current.id,
            name: current.name,
        })
    }

    async fn create_network_interface(
        &self,
        group: &str,
        name: &str,
        spec: &NetworkInterfaceSpec,
    ) -> ProviderResult<NetworkInterface> {
        let path = Self::network_path(group, "networkInterfaces", name);
        let body = NetworkInterfaceBody {
            location: spec.location.clone(),
            properties: NetworkInterfaceProperties {
                ip_configurations: vec![IpConfigurationBody {
                    name: "default-config".to_string(),
                    properties: IpConfigurationProperties {
                        private_ip_allocation_method: "Dynamic".to_string(),
                        subnet: ResourceRefBody {
                            id: spec.subnet_id.clone(),
                        },
                        public_ip_address: ResourceRefBody {
                            id: spec.public_ip_id.clone(),
                        },
                    },
                }],
            },
        };
        let created = self
            .put_and_wait(&path, NETWORK_API_VERSION, &body, name)
            .await?;
        Ok(NetworkInterface {
            id: created.id,
            name: created.name,
            location: created.location.unwrap_or_else(|| spec.location.clone()),
        })
    }

    async fn create_virtual_machine(
        &self,
        group: &str,
        name: &str,
        spec: &VirtualMachineSpec,
    ) -> ProviderResult<VirtualMachine> {
        let path = format!(
            "resourceGroups/{group}/providers/Microsoft.Compute/virtualMachines/{name}"
        );
        let body = VirtualMachineBody {
            location: spec.location.clone(),
            properties: VirtualMachineProperties {
                hardware_profile: HardwareProfileBody {
                    vm_size: spec.size.clone(),
                },
                storage_profile: StorageProfileBody {
                    image_reference: ImageReferenceBody {
                        publisher: spec.image.publisher.clone(),
                        offer: spec.image.offer.clone(),
                        sku: spec.image.sku.clone(),
                        version: spec.image.version.clone(),
                    },
                    os_disk: OsDiskBody {
                        name: spec.os_disk_name.clone(),
                        create_option: "FromImage".to_string(),
                        caching: "ReadOnly".to_string(),
                        managed_disk: ManagedDiskBody {
                            storage_account_type: "Standard_LRS".to_string(),
                        },
                    },
                },
                os_profile: OsProfileBody {
                    computer_name: name.to_string(),
                    admin_username: spec.admin_username.clone(),
                    admin_password: spec.admin_password.clone(),
                },
                network_profile: NetworkProfileBody {
                    network_interfaces: vec![NicReferenceBody {
                        id: spec.network_interface_id.clone(),
                        properties: NicReferenceProperties { primary: true },
                    }],
                },
            },
        };
        let created = self
            .put_and_wait(&path, COMPUTE_API_VERSION, &body, name)
            .await?;
        Ok(VirtualMachine {
            id: created.id,
            name: created.name,
            location: created.location.unwrap_or_else(|| spec.location.clone()),
        })
    }
}
