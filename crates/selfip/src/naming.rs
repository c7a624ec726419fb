//! Config driven VLAN and partition naming

use l3_net_core::{ConfigError, NamingResolver, Result};
use l3_shared_types::Network;

use crate::config::NamingConfig;

/// Longest VLAN name generated for untagged networks
const MAX_FLAT_NAME_LEN: usize = 15;

pub struct DefaultNamingResolver {
    config: NamingConfig,
}

impl DefaultNamingResolver {
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }

    fn segmentation_id(network: &Network) -> Result<u32> {
        network.segmentation_id.ok_or_else(|| {
            ConfigError::MissingField {
                field: format!("provider:segmentation_id of network {}", network.id),
            }
            .into()
        })
    }
}

impl NamingResolver for DefaultNamingResolver {
    fn network_name(&self, device_name: &str, network: &Network) -> Result<(String, bool)> {
        if let Some(name) = self.config.vlan_name_overrides.get(&network.id) {
            log::debug!(
                "Using configured VLAN {} for network {} on {}",
                name,
                network.id,
                device_name
            );
            return Ok((name.clone(), true));
        }

        let name = match network.network_type.as_deref() {
            Some("vlan") => format!("vlan-{}", Self::segmentation_id(network)?),
            Some("flat") | None => {
                let mut name = format!("flat-{}", network.id);
                name.truncate(MAX_FLAT_NAME_LEN);
                name
            }
            Some(tunnel) => format!("tunnel-{}-{}", tunnel, Self::segmentation_id(network)?),
        };

        Ok((name, false))
    }

    fn is_common_network(&self, network: &Network) -> bool {
        network.shared || self.config.common_network_ids.contains(&network.id)
    }

    fn folder_name(&self, tenant_id: &str) -> String {
        let prefix = format!("{}_", self.config.environment_prefix);
        if tenant_id.starts_with(&prefix) {
            tenant_id.to_string()
        } else {
            format!("{}{}", prefix, tenant_id)
        }
    }
}
