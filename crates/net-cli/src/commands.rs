//! CLI commands

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use l3_icontrol::IControlClient;
use l3_net_core::Device;
use l3_port_registry::PortRegistry;
use l3_selfip::{DefaultNamingResolver, SelfIpManager};
use l3_shared_types::{LoadBalancer, Service, SubnetInfo};

use crate::config::AgentConfig;

/// Reconciler wired to one appliance and the local port registry
pub struct Agent {
    device: Device,
    manager: SelfIpManager,
    registry: Arc<PortRegistry>,
}

impl Agent {
    pub async fn bootstrap(config: &AgentConfig) -> Result<Self> {
        let registry = Arc::new(PortRegistry::new(
            config.port_registry.name.clone(),
            config.port_registry.storage_dir.clone(),
        ));
        registry
            .load_from_storage()
            .await
            .context("Failed to load port registry")?;

        let client = IControlClient::new(config.icontrol.clone())
            .context("Failed to create appliance client")?
            .with_common_partition(config.reconciler.common_partition.clone());
        log::debug!(
            "Appliance {} at {}, common partition {}",
            config.device.name,
            client.base_url(),
            client.common_partition()
        );
        let device = Device::from_client(config.device.name.clone(), Arc::new(client));

        let naming = Arc::new(DefaultNamingResolver::new(config.naming.clone()));
        let manager = SelfIpManager::new(config.reconciler.clone(), naming, registry.clone());

        Ok(Self {
            device,
            manager,
            registry,
        })
    }

    pub async fn assure_selfip(&self, subnet_info: &SubnetInfo, tenant_id: &str) -> Result<()> {
        let service = Service {
            loadbalancer: LoadBalancer {
                id: format!("l3ctl-{}", subnet_info.subnet.id),
                tenant_id: tenant_id.to_string(),
            },
        };

        self.manager
            .assure_self_ip(&self.device, &service, subnet_info)
            .await
            .with_context(|| {
                format!(
                    "Failed to assure self-IP for subnet {} on {}",
                    subnet_info.subnet.id,
                    self.device.name()
                )
            })?;

        println!(
            "Self-IP for subnet {} assured on {}",
            subnet_info.subnet.id,
            self.device.name()
        );
        Ok(())
    }

    pub async fn assure_gateway(
        &self,
        subnet_info: &SubnetInfo,
        traffic_group: &str,
    ) -> Result<()> {
        self.manager
            .assure_gateway(&self.device, subnet_info, traffic_group)
            .await
            .with_context(|| {
                format!(
                    "Failed to assure gateway for subnet {} on {}",
                    subnet_info.subnet.id,
                    self.device.name()
                )
            })?;

        println!(
            "Gateway for subnet {} assured on {} in {}",
            subnet_info.subnet.id,
            self.device.name(),
            traffic_group
        );
        Ok(())
    }

    pub async fn delete_gateway(&self, subnet_info: &SubnetInfo) -> Result<()> {
        let deleted = self
            .manager
            .delete_gateway(&self.device, subnet_info)
            .await
            .with_context(|| {
                format!(
                    "Failed to delete gateway of subnet {} on {}",
                    subnet_info.subnet.id,
                    self.device.name()
                )
            })?;

        match deleted {
            Some(name) => println!("Gateway {} removed from {}", name, self.device.name()),
            None => println!(
                "Subnet {} has no network, nothing to remove",
                subnet_info.subnet.id
            ),
        }
        Ok(())
    }

    pub async fn register_subnet(&self, subnet_info: &SubnetInfo) -> Result<()> {
        self.registry
            .add_subnet(&subnet_info.subnet)
            .await
            .with_context(|| format!("Failed to register subnet {}", subnet_info.subnet.id))?;

        println!(
            "Subnet {} ({}) registered",
            subnet_info.subnet.id, subnet_info.subnet.cidr
        );
        Ok(())
    }
}

/// Read a subnet description from a JSON file
pub fn read_subnet_info(path: &Path) -> Result<SubnetInfo> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read subnet info: {}", path.display()))?;

    let subnet_info = SubnetInfo::from_json(&content)
        .with_context(|| format!("Failed to parse subnet info: {}", path.display()))?;

    subnet_info
        .subnet
        .validate()
        .with_context(|| format!("Invalid subnet in {}", path.display()))?;

    Ok(subnet_info)
}

pub fn show_config(config: &AgentConfig) -> Result<()> {
    let rendered = config.to_toml().context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
