use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedTypeError;

/// Self-IP address as the appliance expects it: `<ip>[%<route domain>]/<prefix>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIpAddress {
    pub ip: IpAddr,
    pub route_domain: Option<u16>,
    pub prefix_len: u8,
}

impl SelfIpAddress {
    pub fn new(ip: IpAddr, route_domain: Option<u16>, prefix_len: u8) -> Self {
        Self {
            ip,
            route_domain,
            prefix_len,
        }
    }
}

impl fmt::Display for SelfIpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.route_domain {
            Some(rd) => write!(f, "{}%{}/{}", self.ip, rd, self.prefix_len),
            None => write!(f, "{}/{}", self.ip, self.prefix_len),
        }
    }
}

impl FromStr for SelfIpAddress {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, prefix) = s
            .split_once('/')
            .ok_or_else(|| SharedTypeError::ParseError(format!("missing prefix length in {}", s)))?;

        let prefix_len: u8 = prefix.parse().map_err(|_| SharedTypeError::InvalidValue {
            field: "prefix_len",
            value: prefix.to_string(),
        })?;

        let (ip, route_domain) = match host.split_once('%') {
            Some((ip, rd)) => {
                let rd: u16 = rd.parse().map_err(|_| SharedTypeError::InvalidValue {
                    field: "route_domain",
                    value: rd.to_string(),
                })?;
                (ip, Some(rd))
            }
            None => (host, None),
        };

        let ip: IpAddr = ip.parse().map_err(|_| SharedTypeError::InvalidValue {
            field: "ip",
            value: ip.to_string(),
        })?;

        Ok(Self::new(ip, route_domain, prefix_len))
    }
}

/// Desired state of a self-IP on one appliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfIpModel {
    pub name: String,
    pub address: SelfIpAddress,
    pub vlan: String,
    pub partition: String,
    pub floating: bool,
    #[serde(default)]
    pub traffic_group: Option<String>,
    /// Use the VLAN name verbatim instead of qualifying it with the partition
    #[serde(default)]
    pub preserve_vlan_name: bool,
}

/// Name of the non-floating self-IP a device holds on a subnet
pub fn local_selfip_name(device_name: &str, subnet_id: &str) -> String {
    format!("local-{}-{}", device_name, subnet_id)
}

/// Name shared by the floating gateway self-IP and its forwarding virtual
pub fn gateway_name(subnet_id: &str) -> String {
    format!("gw-{}", subnet_id)
}
