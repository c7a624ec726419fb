//! Wire representations of appliance objects

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use l3_net_core::{NetworkError, Result};
use l3_shared_types::{
    qualify, SelfIpAddress, SelfIpModel, SourceAddressTranslation, VirtualAddress,
    VirtualServiceModel,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SelfIpPayload {
    pub name: String,
    pub partition: String,
    pub address: String,
    pub vlan: String,
    /// `enabled` or `disabled`
    #[serde(default)]
    pub floating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_group: Option<String>,
}

impl From<&SelfIpModel> for SelfIpPayload {
    fn from(model: &SelfIpModel) -> Self {
        let vlan = if model.preserve_vlan_name {
            model.vlan.clone()
        } else {
            qualify(&model.vlan, &model.partition)
        };

        Self {
            name: model.name.clone(),
            partition: model.partition.clone(),
            address: model.address.to_string(),
            vlan,
            floating: Some(enabled(model.floating)),
            traffic_group: model.traffic_group.clone(),
        }
    }
}

impl SelfIpPayload {
    pub fn into_model(self) -> Result<SelfIpModel> {
        let address: SelfIpAddress = self
            .address
            .parse()
            .map_err(|e| NetworkError::InvalidResponse(format!("self-IP {}: {}", self.name, e)))?;

        Ok(SelfIpModel {
            name: self.name,
            address,
            vlan: self.vlan,
            partition: self.partition,
            floating: self.floating.as_deref() == Some("enabled"),
            traffic_group: self.traffic_group,
            preserve_vlan_name: false,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TranslationPayload {
    #[serde(rename = "type")]
    pub kind: SourceAddressTranslation,
}

impl Default for TranslationPayload {
    fn default() -> Self {
        Self {
            kind: SourceAddressTranslation::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VirtualPayload {
    pub name: String,
    pub partition: String,
    pub destination: String,
    pub mask: String,
    #[serde(default)]
    pub vlans_enabled: bool,
    #[serde(default)]
    pub vlans: Vec<String>,
    #[serde(default)]
    pub source_address_translation: TranslationPayload,
    #[serde(default)]
    pub ip_forward: bool,
}

impl From<&VirtualServiceModel> for VirtualPayload {
    fn from(model: &VirtualServiceModel) -> Self {
        Self {
            name: model.name.clone(),
            partition: model.partition.clone(),
            destination: qualify(&model.destination, &model.partition),
            mask: model.mask.clone(),
            vlans_enabled: model.vlans_enabled,
            vlans: model.qualified_vlans(),
            source_address_translation: TranslationPayload {
                kind: model.source_address_translation,
            },
            ip_forward: model.ip_forward,
        }
    }
}

impl From<VirtualPayload> for VirtualServiceModel {
    fn from(payload: VirtualPayload) -> Self {
        Self {
            name: payload.name,
            partition: payload.partition,
            destination: payload.destination,
            mask: payload.mask,
            vlans_enabled: payload.vlans_enabled,
            vlans: payload.vlans,
            source_address_translation: payload.source_address_translation.kind,
            ip_forward: payload.ip_forward,
            preserve_vlan_name: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VirtualAddressPayload {
    pub name: String,
    pub partition: String,
    #[serde(default)]
    pub traffic_group: Option<String>,
}

impl From<VirtualAddressPayload> for VirtualAddress {
    fn from(payload: VirtualAddressPayload) -> Self {
        Self {
            name: payload.name,
            partition: payload.partition,
            traffic_group: payload.traffic_group,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RouteDomainPayload {
    pub name: String,
    #[serde(default)]
    pub vlans: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArpEntry {
    pub name: String,
    /// May carry a `%<route domain>` suffix
    pub ip_address: String,
}

impl ArpEntry {
    pub fn ip(&self) -> Option<IpAddr> {
        let host = self
            .ip_address
            .split_once('%')
            .map(|(host, _)| host)
            .unwrap_or(&self.ip_address);
        host.parse().ok()
    }
}

/// Collection answer, `items` is omitted when empty
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

fn enabled(flag: bool) -> String {
    let value = if flag { "enabled" } else { "disabled" };
    value.to_string()
}
