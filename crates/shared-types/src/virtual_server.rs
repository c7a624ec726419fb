use serde::{Deserialize, Serialize};

/// Destination of the wildcard forwarding virtual and name of its virtual address
pub const WILDCARD_DESTINATION: &str = "0.0.0.0:0";
pub const WILDCARD_MASK: &str = "0.0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceAddressTranslation {
    None,
    Automap,
    Snat,
}

impl std::fmt::Display for SourceAddressTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceAddressTranslation::None => write!(f, "none"),
            SourceAddressTranslation::Automap => write!(f, "automap"),
            SourceAddressTranslation::Snat => write!(f, "snat"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualServiceModel {
    pub name: String,
    pub partition: String,
    pub destination: String,
    pub mask: String,
    pub vlans_enabled: bool,
    #[serde(default)]
    pub vlans: Vec<String>,
    pub source_address_translation: SourceAddressTranslation,
    pub ip_forward: bool,
    /// VLAN names are sent as given instead of being placed in `partition`
    #[serde(default)]
    pub preserve_vlan_name: bool,
}

impl VirtualServiceModel {
    /// Wildcard IP-forwarding virtual bound to a single VLAN
    pub fn forwarding(
        name: String,
        partition: String,
        vlan: String,
        preserve_vlan_name: bool,
    ) -> Self {
        Self {
            name,
            partition,
            destination: WILDCARD_DESTINATION.to_string(),
            mask: WILDCARD_MASK.to_string(),
            vlans_enabled: true,
            vlans: vec![vlan],
            source_address_translation: SourceAddressTranslation::Automap,
            ip_forward: true,
            preserve_vlan_name,
        }
    }

    /// VLAN names qualified with the virtual's partition, or verbatim when
    /// the names are preserved
    pub fn qualified_vlans(&self) -> Vec<String> {
        if self.preserve_vlan_name {
            return self.vlans.clone();
        }
        self.vlans
            .iter()
            .map(|vlan| qualify(vlan, &self.partition))
            .collect()
    }

    /// Names of the fields on which `other` differs from `self`. Destination
    /// names are compared without their partition path. A preserved relative
    /// VLAN name matches the last path segment of the loaded VLAN.
    pub fn drift(&self, other: &VirtualServiceModel) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if base_name(&self.destination) != base_name(&other.destination) {
            fields.push("destination");
        }
        if self.mask != other.mask {
            fields.push("mask");
        }
        if self.vlans_enabled != other.vlans_enabled {
            fields.push("vlans_enabled");
        }
        if !self.same_vlans(other) {
            fields.push("vlans");
        }
        if self.source_address_translation != other.source_address_translation {
            fields.push("source_address_translation");
        }
        if self.ip_forward != other.ip_forward {
            fields.push("ip_forward");
        }
        fields
    }

    fn same_vlans(&self, other: &VirtualServiceModel) -> bool {
        if !self.preserve_vlan_name {
            return self.qualified_vlans() == other.qualified_vlans();
        }

        self.vlans.len() == other.vlans.len()
            && self.vlans.iter().zip(&other.vlans).all(|(wanted, loaded)| {
                if wanted.starts_with('/') {
                    wanted == loaded
                } else {
                    wanted == base_name(loaded)
                }
            })
    }
}

/// Prefix a relative object name with `/<partition>/`
pub fn qualify(name: &str, partition: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}/{}", partition, name)
    }
}

/// Object name without its `/<partition>/` path
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualAddress {
    pub name: String,
    pub partition: String,
    #[serde(default)]
    pub traffic_group: Option<String>,
}
