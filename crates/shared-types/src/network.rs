use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{SharedResult, SharedTypeError};

/// Tenant network as handed over by the service layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Routing domain tag. Absent on networks that were never placed in a
    /// route domain; callers fall back to domain 0. Accepted as number or
    /// numeric string.
    #[serde(default, deserialize_with = "route_domain_id")]
    pub route_domain_id: Option<u16>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default, rename = "provider:network_type")]
    pub network_type: Option<String>,
    #[serde(default, rename = "provider:segmentation_id")]
    pub segmentation_id: Option<u32>,
}

impl Network {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            route_domain_id: None,
            shared: false,
            network_type: None,
            segmentation_id: None,
        }
    }
}

fn route_domain_id<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RouteDomainId {
        Number(u16),
        Text(String),
    }

    match Option::<RouteDomainId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RouteDomainId::Number(id)) => Ok(Some(id)),
        Some(RouteDomainId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RouteDomainId::Text(text)) => text.trim().parse().map(Some).map_err(|_| {
            serde::de::Error::custom(format!("invalid route_domain_id '{}'", text))
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub cidr: IpNet,
    #[serde(default)]
    pub gateway_ip: Option<IpAddr>,
    pub tenant_id: String,
    #[serde(default)]
    pub network_id: Option<String>,
}

impl Subnet {
    pub fn new(id: impl Into<String>, cidr: IpNet, tenant_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cidr,
            gateway_ip: None,
            tenant_id: tenant_id.into(),
            network_id: None,
        }
    }

    /// Prefix length of the subnet CIDR
    pub fn prefix_len(&self) -> u8 {
        self.cidr.prefix_len()
    }

    /// Dotted netmask of the subnet CIDR
    pub fn netmask(&self) -> IpAddr {
        self.cidr.netmask()
    }

    pub fn validate(&self) -> SharedResult<()> {
        if self.id.is_empty() {
            return Err(SharedTypeError::InvalidValue {
                field: "subnet.id",
                value: String::new(),
            });
        }

        if let Some(gateway) = self.gateway_ip {
            if !self.cidr.contains(&gateway) {
                return Err(SharedTypeError::InvalidValue {
                    field: "subnet.gateway_ip",
                    value: gateway.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// A subnet together with the network it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetInfo {
    pub subnet: Subnet,
    #[serde(default)]
    pub network: Option<Network>,
}

impl SubnetInfo {
    pub fn new(subnet: Subnet, network: Option<Network>) -> Self {
        Self { subnet, network }
    }

    pub fn from_json(content: &str) -> SharedResult<Self> {
        serde_json::from_str(content).map_err(|e| SharedTypeError::ParseError(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancer {
    pub id: String,
    pub tenant_id: String,
}

/// Service definition the self-IP assurance is performed for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub loadbalancer: LoadBalancer,
}

impl Service {
    pub fn tenant_id(&self) -> &str {
        &self.loadbalancer.tenant_id
    }
}
