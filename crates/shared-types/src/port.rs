use std::net::IpAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixedIp {
    pub subnet_id: String,
    pub ip_address: IpAddr,
}

/// Port holding the fixed addresses handed out for a subnet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub id: String,
    pub name: String,
    pub subnet_id: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

impl Port {
    /// First fixed address, if the allocation produced any
    pub fn first_ip(&self) -> Option<IpAddr> {
        self.fixed_ips.first().map(|fixed| fixed.ip_address)
    }
}
