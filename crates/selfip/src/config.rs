//! Reconciler settings

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub const COMMON_PARTITION: &str = "Common";
pub const DEFAULT_ENVIRONMENT_PREFIX: &str = "Project";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Static ARP entries are populated for subnets, so gateway teardown
    /// has to remove them
    pub populate_static_arp: bool,
    /// Partition holding shared networks, served by route domain `0`
    pub common_partition: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            populate_static_arp: false,
            common_partition: COMMON_PARTITION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Prefix of tenant partitions, `<prefix>_<tenant id>`
    pub environment_prefix: String,
    /// Networks placed in the common partition even when not flagged shared
    pub common_network_ids: HashSet<String>,
    /// network id -> VLAN name used verbatim
    pub vlan_name_overrides: HashMap<String, String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            environment_prefix: DEFAULT_ENVIRONMENT_PREFIX.to_string(),
            common_network_ids: HashSet::new(),
            vlan_name_overrides: HashMap::new(),
        }
    }
}
