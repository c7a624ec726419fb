//! Collaborator contracts served by the REST client

use std::net::IpAddr;

use async_trait::async_trait;
use ipnet::IpNet;
use reqwest::Method;
use serde_json::json;

use l3_net_core::{
    ConfigError, DeleteOutcome, NetworkHelper, Result, SelfIpResource, VirtualAddressResource,
    VirtualServiceResource,
};
use l3_shared_types::{base_name, qualify, SelfIpModel, VirtualAddress, VirtualServiceModel};

use crate::client::{
    object_path, IControlClient, ARP_PATH, ROUTE_DOMAIN_PATH, SELF_IP_PATH, VIRTUAL_ADDRESS_PATH,
    VIRTUAL_PATH,
};
use crate::payload::{
    ArpEntry, Collection, RouteDomainPayload, SelfIpPayload, VirtualAddressPayload, VirtualPayload,
};

#[async_trait]
impl SelfIpResource for IControlClient {
    async fn exists(&self, name: &str, partition: &str) -> Result<bool> {
        self.object_exists(SELF_IP_PATH, partition, name).await
    }

    async fn create(&self, model: &SelfIpModel) -> Result<()> {
        let payload = SelfIpPayload::from(model);
        self.api_call(Method::POST, SELF_IP_PATH, Some(&payload)).await
    }

    async fn load(&self, name: &str, partition: &str) -> Result<SelfIpModel> {
        let path = object_path(SELF_IP_PATH, partition, name);
        let payload: SelfIpPayload = self.api_request(Method::GET, &path, None::<&()>).await?;
        payload.into_model()
    }
}

#[async_trait]
impl VirtualServiceResource for IControlClient {
    async fn exists(&self, name: &str, partition: &str) -> Result<bool> {
        self.object_exists(VIRTUAL_PATH, partition, name).await
    }

    async fn create(&self, model: &VirtualServiceModel) -> Result<()> {
        let payload = VirtualPayload::from(model);
        self.api_call(Method::POST, VIRTUAL_PATH, Some(&payload)).await
    }

    async fn load(&self, name: &str, partition: &str) -> Result<VirtualServiceModel> {
        let path = object_path(VIRTUAL_PATH, partition, name);
        let payload: VirtualPayload = self.api_request(Method::GET, &path, None::<&()>).await?;
        Ok(payload.into())
    }

    async fn update(&self, model: &VirtualServiceModel) -> Result<()> {
        let path = object_path(VIRTUAL_PATH, &model.partition, &model.name);
        let payload = VirtualPayload::from(model);
        self.api_call(Method::PUT, &path, Some(&payload)).await
    }

    async fn delete(&self, name: &str, partition: &str) -> Result<()> {
        let path = object_path(VIRTUAL_PATH, partition, name);
        self.api_call(Method::DELETE, &path, None::<&()>).await
    }
}

#[async_trait]
impl VirtualAddressResource for IControlClient {
    async fn load(&self, name: &str, partition: &str) -> Result<VirtualAddress> {
        let path = object_path(VIRTUAL_ADDRESS_PATH, partition, name);
        let payload: VirtualAddressPayload =
            self.api_request(Method::GET, &path, None::<&()>).await?;
        Ok(payload.into())
    }

    async fn update(&self, address: &VirtualAddress) -> Result<()> {
        let path = object_path(VIRTUAL_ADDRESS_PATH, &address.partition, &address.name);
        let body = json!({ "trafficGroup": address.traffic_group });
        self.api_call(Method::PATCH, &path, Some(&body)).await
    }
}

#[async_trait]
impl NetworkHelper for IControlClient {
    async fn add_vlan_to_domain(
        &self,
        vlan: &str,
        partition: &str,
        preserve_vlan_name: bool,
    ) -> Result<()> {
        let path = route_domain_path(partition, &self.common_partition);
        let domain: RouteDomainPayload = self.api_request(Method::GET, &path, None::<&()>).await?;

        let mut vlans: Vec<String> = domain
            .vlans
            .iter()
            .map(|member| qualify(member, partition))
            .collect();

        let (vlan, present) = if preserve_vlan_name {
            let present = vlans.iter().any(|member| {
                member.as_str() == vlan || (!vlan.starts_with('/') && base_name(member) == vlan)
            });
            (vlan.to_string(), present)
        } else {
            let vlan = qualify(vlan, partition);
            let present = vlans.contains(&vlan);
            (vlan, present)
        };

        if present {
            log::debug!("VLAN {} already in route domain {}", vlan, domain.name);
            return Ok(());
        }

        vlans.push(vlan.clone());
        self.api_call(Method::PATCH, &path, Some(&json!({ "vlans": vlans })))
            .await?;

        log::info!("Added VLAN {} to route domain {}", vlan, domain.name);
        Ok(())
    }

    async fn delete_selfip(&self, name: &str, partition: &str) -> Result<DeleteOutcome> {
        if !self.object_exists(SELF_IP_PATH, partition, name).await? {
            log::debug!("Self-IP {} not present in partition {}", name, partition);
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        let path = object_path(SELF_IP_PATH, partition, name);
        match self.api_call(Method::DELETE, &path, None::<&()>).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }

    async fn arp_delete_by_subnet(
        &self,
        partition: &str,
        subnet: &IpNet,
        mask: Option<&str>,
    ) -> Result<Vec<IpAddr>> {
        let network = match mask {
            Some(mask) => apply_mask(subnet, mask)?,
            None => subnet.trunc(),
        };

        let path = format!(
            "{}?$filter=partition+eq+{}",
            ARP_PATH,
            urlencoding::encode(partition)
        );
        let entries: Collection<ArpEntry> =
            self.api_request(Method::GET, &path, None::<&()>).await?;

        let mut removed = Vec::new();
        for entry in entries.items {
            let ip = match entry.ip() {
                Some(ip) => ip,
                None => {
                    log::warn!(
                        "Skipping ARP entry {} with address {}",
                        entry.name,
                        entry.ip_address
                    );
                    continue;
                }
            };
            if !network.contains(&ip) {
                continue;
            }

            let entry_path = object_path(ARP_PATH, partition, &entry.name);
            match self.api_call(Method::DELETE, &entry_path, None::<&()>).await {
                Ok(()) => removed.push(ip),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        log::debug!("Removed ARP entries {:?} of {} in {}", removed, network, partition);
        Ok(removed)
    }
}

/// Route domain serving `partition`: `0` for the common partition, otherwise
/// the domain named after the partition
pub(crate) fn route_domain_path(partition: &str, common_partition: &str) -> String {
    if partition == common_partition {
        object_path(ROUTE_DOMAIN_PATH, common_partition, "0")
    } else {
        object_path(ROUTE_DOMAIN_PATH, partition, partition)
    }
}

/// Re-derive the network of `subnet` using a dotted (or colon) netmask
pub(crate) fn apply_mask(subnet: &IpNet, mask: &str) -> Result<IpNet> {
    let invalid = || ConfigError::InvalidValue {
        field: "netmask".to_string(),
        value: mask.to_string(),
    };

    let bits = match (subnet, mask.parse::<IpAddr>().map_err(|_| invalid())?) {
        (IpNet::V4(_), IpAddr::V4(mask)) => prefix_len(u32::from(mask).into(), 32),
        (IpNet::V6(_), IpAddr::V6(mask)) => prefix_len(u128::from(mask), 128),
        _ => None,
    }
    .ok_or_else(invalid)?;

    let network = IpNet::new(subnet.addr(), bits).map_err(|_| invalid())?;
    Ok(network.trunc())
}

fn prefix_len(mask: u128, width: u32) -> Option<u8> {
    let shifted = mask << (128 - width);
    let ones = shifted.leading_ones();
    if shifted.count_ones() == ones {
        u8::try_from(ones).ok()
    } else {
        None
    }
}
