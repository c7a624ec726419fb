//! Collaborator contracts the reconciler drives

use std::net::IpAddr;

use async_trait::async_trait;
use ipnet::IpNet;
use l3_shared_types::{Network, Port, SelfIpModel, VirtualAddress, VirtualServiceModel};

use crate::Result;

/// Outcome of an idempotent delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Self-IP collection of one appliance, keyed by (name, partition)
#[async_trait]
pub trait SelfIpResource: Send + Sync {
    async fn exists(&self, name: &str, partition: &str) -> Result<bool>;
    async fn create(&self, model: &SelfIpModel) -> Result<()>;
    async fn load(&self, name: &str, partition: &str) -> Result<SelfIpModel>;
}

#[async_trait]
pub trait VirtualServiceResource: Send + Sync {
    async fn exists(&self, name: &str, partition: &str) -> Result<bool>;
    async fn create(&self, model: &VirtualServiceModel) -> Result<()>;
    async fn load(&self, name: &str, partition: &str) -> Result<VirtualServiceModel>;
    async fn update(&self, model: &VirtualServiceModel) -> Result<()>;
    async fn delete(&self, name: &str, partition: &str) -> Result<()>;
}

#[async_trait]
pub trait VirtualAddressResource: Send + Sync {
    async fn load(&self, name: &str, partition: &str) -> Result<VirtualAddress>;
    async fn update(&self, address: &VirtualAddress) -> Result<()>;
}

/// Low-level network operations on one appliance
#[async_trait]
pub trait NetworkHelper: Send + Sync {
    /// Attach a VLAN to the route domain serving `partition`. With
    /// `preserve_vlan_name` the VLAN name is used as given instead of being
    /// placed in `partition`.
    async fn add_vlan_to_domain(
        &self,
        vlan: &str,
        partition: &str,
        preserve_vlan_name: bool,
    ) -> Result<()>;

    async fn delete_selfip(&self, name: &str, partition: &str) -> Result<DeleteOutcome>;

    /// Remove ARP entries in `partition` whose address falls into `subnet`.
    /// Returns the addresses that were removed.
    async fn arp_delete_by_subnet(
        &self,
        partition: &str,
        subnet: &IpNet,
        mask: Option<&str>,
    ) -> Result<Vec<IpAddr>>;
}

/// Port/IPAM service handing out fixed addresses
#[async_trait]
pub trait PortClient: Send + Sync {
    async fn get_port_by_name(&self, name: &str) -> Result<Vec<Port>>;

    async fn create_port_on_subnet(
        &self,
        subnet_id: &str,
        mac_address: Option<&str>,
        name: &str,
        fixed_address_count: usize,
    ) -> Result<Port>;
}

/// Maps networks to device-local VLAN names and partitions
pub trait NamingResolver: Send + Sync {
    /// VLAN name for `network` on `device_name`, and whether that name must be
    /// used verbatim
    fn network_name(&self, device_name: &str, network: &Network) -> Result<(String, bool)>;

    /// Shared networks live in the `Common` partition
    fn is_common_network(&self, network: &Network) -> bool;

    fn folder_name(&self, tenant_id: &str) -> String;
}

/// External announcement (e.g. route advertisement) of assigned addresses
#[async_trait]
pub trait AddressBindingRegistrar: Send + Sync {
    async fn bind_address(&self, subnet_id: &str, ip_address: &IpAddr) -> Result<()>;
    async fn unbind_address(&self, subnet_id: &str, ip_address: &IpAddr) -> Result<()>;
}
