//! Self-IP manager
//!
//! Assures per-device local self-IPs and per-subnet floating gateways, and
//! tears gateways down again.

use std::net::IpAddr;
use std::sync::Arc;

use l3_net_core::{
    AddressBindingRegistrar, AssuranceState, DeleteOutcome, Device, NamingResolver,
    NetworkError, PortClient, Result,
};
use l3_shared_types::{
    gateway_name, local_selfip_name, Network, SelfIpAddress, SelfIpModel, Service, Subnet,
    SubnetInfo, VirtualServiceModel, WILDCARD_DESTINATION,
};

use crate::config::ReconcilerConfig;

/// Result of converging one self-IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfIpOutcome {
    Created,
    AlreadyPresent,
    /// The self-IP is not in place; dependent objects must not be created
    Failed(String),
}

impl SelfIpOutcome {
    pub fn is_converged(&self) -> bool {
        !matches!(self, SelfIpOutcome::Failed(_))
    }
}

pub struct SelfIpManager {
    config: ReconcilerConfig,
    naming: Arc<dyn NamingResolver>,
    ports: Arc<dyn PortClient>,
    binding: Option<Arc<dyn AddressBindingRegistrar>>,
    state: AssuranceState,
}

impl SelfIpManager {
    pub fn new(
        config: ReconcilerConfig,
        naming: Arc<dyn NamingResolver>,
        ports: Arc<dyn PortClient>,
    ) -> Self {
        Self {
            config,
            naming,
            ports,
            binding: None,
            state: AssuranceState::new(),
        }
    }

    /// Announce assigned addresses through `registrar`
    pub fn with_address_binding(mut self, registrar: Arc<dyn AddressBindingRegistrar>) -> Self {
        self.binding = Some(registrar);
        self
    }

    /// Share an assurance store with other managers
    pub fn with_state(mut self, state: AssuranceState) -> Self {
        self.state = state;
        self
    }

    /// Assurance store, used by the periodic invalidation
    pub fn state(&self) -> &AssuranceState {
        &self.state
    }

    /// Create `model` on `device` unless a self-IP of that name already exists
    /// in its partition.
    ///
    /// A create rejected because the VLAN is not part of the route domain is
    /// remediated once by attaching the VLAN and retrying. A retry that fails
    /// again yields [`SelfIpOutcome::Failed`]. Every other remote error is
    /// returned unchanged.
    pub async fn create_self_ip(
        &self,
        device: &Device,
        model: &SelfIpModel,
    ) -> Result<SelfIpOutcome> {
        if model.name.is_empty() {
            log::error!("Refusing to create a self-IP without name on {}", device.name());
            return Ok(SelfIpOutcome::Failed("self-IP name is empty".to_string()));
        }

        if device.self_ips.exists(&model.name, &model.partition).await? {
            log::debug!(
                "Self-IP {} already exists in partition {} on {}",
                model.name,
                model.partition,
                device.name()
            );
            return Ok(SelfIpOutcome::AlreadyPresent);
        }

        let err = match device.self_ips.create(model).await {
            Ok(()) => {
                log::info!(
                    "Created self-IP {} ({}) in partition {} on {}",
                    model.name,
                    model.address,
                    model.partition,
                    device.name()
                );
                return Ok(SelfIpOutcome::Created);
            }
            Err(err) => err,
        };

        if !err.is_route_domain_vlan_error() {
            return Err(err);
        }

        log::warn!(
            "VLAN {} is not in the route domain of partition {} on {}, attaching it",
            model.vlan,
            model.partition,
            device.name()
        );
        device
            .network
            .add_vlan_to_domain(&model.vlan, &model.partition, model.preserve_vlan_name)
            .await?;

        match device.self_ips.create(model).await {
            Ok(()) => {
                log::info!(
                    "Created self-IP {} in partition {} on {} after route domain update",
                    model.name,
                    model.partition,
                    device.name()
                );
                Ok(SelfIpOutcome::Created)
            }
            Err(NetworkError::Remote { status, message }) => {
                log::error!(
                    "Error creating self-IP {} on {}. Response status code: {}. Response message: {}",
                    model.name,
                    device.name(),
                    status,
                    message
                );
                Ok(SelfIpOutcome::Failed(format!("status {}: {}", status, message)))
            }
            Err(err) => Err(err),
        }
    }

    /// Make sure `device` holds its local, non-floating self-IP on the subnet
    pub async fn assure_self_ip(
        &self,
        device: &Device,
        service: &Service,
        subnet_info: &SubnetInfo,
    ) -> Result<()> {
        let network = match subnet_info.network.as_ref() {
            Some(network) => network,
            None => {
                log::error!(
                    "Attempted to create self-IP for subnet {} without network, skipping",
                    subnet_info.subnet.id
                );
                return Ok(());
            }
        };
        let subnet = &subnet_info.subnet;
        let tenant_id = service.tenant_id();

        if self
            .state
            .is_tenant_subnet_assured(device.name(), tenant_id, &subnet.id)
            .await
        {
            return Ok(());
        }

        let ip = self.selfip_address(device, subnet).await?;
        let address = SelfIpAddress::new(ip, Some(route_domain(network)), subnet.prefix_len());

        let partition = if self.naming.is_common_network(network) {
            self.config.common_partition.clone()
        } else {
            self.naming.folder_name(tenant_id)
        };
        let (vlan, preserve_vlan_name) = self.naming.network_name(device.name(), network)?;

        let model = SelfIpModel {
            name: local_selfip_name(device.name(), &subnet.id),
            address,
            vlan,
            partition,
            floating: false,
            traffic_group: None,
            preserve_vlan_name,
        };
        log::debug!("Assuring local self-IP {:?} on {}", model, device.name());

        self.converge_self_ip(device, &model).await?;

        if let Some(binding) = &self.binding {
            binding.bind_address(&subnet.id, &ip).await?;
        }

        self.state
            .mark_tenant_subnet_assured(device.name(), tenant_id, &subnet.id)
            .await;
        Ok(())
    }

    /// Make sure the subnet's floating gateway self-IP, its wildcard
    /// forwarding virtual and the virtual address traffic group exist
    pub async fn assure_gateway(
        &self,
        device: &Device,
        subnet_info: &SubnetInfo,
        traffic_group: &str,
    ) -> Result<()> {
        let subnet = &subnet_info.subnet;
        if self.state.is_gateway_assured(device.name(), &subnet.id).await {
            return Ok(());
        }

        let network = match subnet_info.network.as_ref() {
            Some(network) => network,
            None => {
                log::error!(
                    "Attempted to create default gateway for subnet {} without network, skipping",
                    subnet.id
                );
                return Ok(());
            }
        };
        let gateway_ip = match subnet.gateway_ip {
            Some(ip) => ip,
            None => {
                log::error!("Subnet {} has no gateway address, skipping", subnet.id);
                return Ok(());
            }
        };

        let (mut vlan, preserve_vlan_name) = self.naming.network_name(device.name(), network)?;
        let partition = if self.naming.is_common_network(network) {
            vlan = format!("/{}/{}", self.config.common_partition, vlan);
            self.config.common_partition.clone()
        } else {
            self.naming.folder_name(&subnet.tenant_id)
        };

        let name = gateway_name(&subnet.id);
        let model = SelfIpModel {
            name: name.clone(),
            address: SelfIpAddress::new(gateway_ip, None, subnet.prefix_len()),
            vlan: vlan.clone(),
            partition: partition.clone(),
            floating: true,
            traffic_group: Some(traffic_group.to_string()),
            preserve_vlan_name,
        };

        self.converge_self_ip(device, &model).await?;

        if let Some(binding) = &self.binding {
            binding.bind_address(&subnet.id, &gateway_ip).await?;
        }

        let forwarding =
            VirtualServiceModel::forwarding(name, partition.clone(), vlan, preserve_vlan_name);
        self.assure_forwarding_virtual(device, forwarding).await?;

        let mut virtual_address = device
            .virtual_addresses
            .load(WILDCARD_DESTINATION, &partition)
            .await?;
        virtual_address.traffic_group = Some(traffic_group.to_string());
        device.virtual_addresses.update(&virtual_address).await?;

        self.state.mark_gateway_assured(device.name(), &subnet.id).await;
        log::info!(
            "Default gateway for subnet {} assured on {} in traffic group {}",
            subnet.id,
            device.name(),
            traffic_group
        );
        Ok(())
    }

    /// Remove the subnet's floating gateway from `device`.
    ///
    /// Returns the gateway object name, or `None` when the subnet carries no
    /// network.
    pub async fn delete_gateway(
        &self,
        device: &Device,
        subnet_info: &SubnetInfo,
    ) -> Result<Option<String>> {
        let subnet = &subnet_info.subnet;
        let network = match subnet_info.network.as_ref() {
            Some(network) => network,
            None => {
                log::error!(
                    "Attempted to delete default gateway for subnet {} without network, skipping",
                    subnet.id
                );
                return Ok(None);
            }
        };

        let partition = if self.naming.is_common_network(network) {
            self.config.common_partition.clone()
        } else {
            self.naming.folder_name(&subnet.tenant_id)
        };
        let name = gateway_name(&subnet.id);

        if self.config.populate_static_arp {
            let removed = device
                .network
                .arp_delete_by_subnet(&partition, &subnet.cidr, None)
                .await?;
            log::debug!(
                "Removed {} ARP entries of subnet {} on {}",
                removed.len(),
                subnet.cidr,
                device.name()
            );
        }

        let outcome = match device.network.delete_selfip(&name, &partition).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_not_found() => DeleteOutcome::AlreadyAbsent,
            Err(err) => return Err(err),
        };
        log::debug!("Gateway self-IP {} on {}: {:?}", name, device.name(), outcome);

        if let (Some(binding), Some(gateway_ip)) = (&self.binding, subnet.gateway_ip) {
            binding.unbind_address(&subnet.id, &gateway_ip).await?;
        }

        if device.virtual_services.exists(&name, &partition).await? {
            device.virtual_services.load(&name, &partition).await?;
            match device.virtual_services.delete(&name, &partition).await {
                Ok(()) => log::info!("Deleted forwarding virtual {} on {}", name, device.name()),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        self.state.clear_gateway(device.name(), &subnet.id).await;
        Ok(Some(name))
    }

    async fn converge_self_ip(&self, device: &Device, model: &SelfIpModel) -> Result<()> {
        match self.create_self_ip(device, model).await? {
            SelfIpOutcome::Failed(reason) => Err(NetworkError::SelfIpNotConverged {
                name: model.name.clone(),
                reason,
            }),
            _ => Ok(()),
        }
    }

    /// Address of the device's local self-IP, allocating a port when the
    /// device has none on the subnet yet
    async fn selfip_address(&self, device: &Device, subnet: &Subnet) -> Result<IpAddr> {
        let name = local_selfip_name(device.name(), &subnet.id);

        let port = match self.ports.get_port_by_name(&name).await?.into_iter().next() {
            Some(port) => port,
            None => {
                self.ports
                    .create_port_on_subnet(&subnet.id, None, &name, 1)
                    .await?
            }
        };

        port.first_ip().ok_or_else(|| NetworkError::Allocation {
            port: name,
            message: format!("no fixed address on subnet {}", subnet.id),
        })
    }

    async fn assure_forwarding_virtual(
        &self,
        device: &Device,
        desired: VirtualServiceModel,
    ) -> Result<()> {
        let services = &device.virtual_services;

        if !services.exists(&desired.name, &desired.partition).await? {
            services.create(&desired).await?;
            log::info!(
                "Created forwarding virtual {} in partition {} on {}",
                desired.name,
                desired.partition,
                device.name()
            );
            return Ok(());
        }

        let current = services.load(&desired.name, &desired.partition).await?;
        let drift = desired.drift(&current);
        if !drift.is_empty() {
            log::warn!(
                "Forwarding virtual {} on {} drifted on {:?}, updating",
                desired.name,
                device.name(),
                drift
            );
            services.update(&desired).await?;
        }
        Ok(())
    }
}

fn route_domain(network: &Network) -> u16 {
    match network.route_domain_id {
        Some(id) => id,
        None => {
            log::error!("Network {} has no route domain set, using 0", network.id);
            0
        }
    }
}
