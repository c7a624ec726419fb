//! File backed port registry

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use l3_net_core::{ConfigError, DeleteOutcome, NetworkError, PortClient, Result};
use l3_shared_types::{FixedIp, Port, Subnet};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubnetEntry {
    id: String,
    cidr: IpNet,
    gateway: Option<IpAddr>,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PortEntry {
    port: Port,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryData {
    #[serde(default)]
    subnets: HashMap<String, SubnetEntry>,
    /// Keyed by port name
    #[serde(default)]
    ports: HashMap<String, PortEntry>,
}

impl RegistryData {
    fn assigned_ips(&self, subnet_id: &str) -> HashSet<IpAddr> {
        self.ports
            .values()
            .flat_map(|entry| entry.port.fixed_ips.iter())
            .filter(|fixed| fixed.subnet_id == subnet_id)
            .map(|fixed| fixed.ip_address)
            .collect()
    }

    /// First `count` host addresses that are neither assigned nor the gateway
    fn find_free_ips(&self, subnet: &SubnetEntry, count: usize) -> Vec<IpAddr> {
        let assigned = self.assigned_ips(&subnet.id);
        let cidr = subnet.cidr;

        cidr.hosts()
            .filter(|ip| {
                // Skip network and broadcast addresses for IPv4
                !(ip.is_ipv4() && (*ip == cidr.network() || *ip == cidr.broadcast()))
            })
            .filter(|ip| Some(*ip) != subnet.gateway && !assigned.contains(ip))
            .take(count)
            .collect()
    }
}

/// Port registry persisted as `<storage dir>/<name>.json`
pub struct PortRegistry {
    name: String,
    storage_dir: PathBuf,
    data: Arc<RwLock<RegistryData>>,
}

impl PortRegistry {
    pub fn new(name: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            storage_dir: storage_dir.into(),
            data: Arc::new(RwLock::new(RegistryData::default())),
        }
    }

    fn storage_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}.json", self.name))
    }

    /// Load ports and subnets from storage, starting fresh when no file exists
    pub async fn load_from_storage(&self) -> Result<()> {
        let storage_path = self.storage_path();

        match tokio::fs::read_to_string(&storage_path).await {
            Ok(content) => {
                let loaded: RegistryData = serde_json::from_str(&content)?;
                log::info!(
                    "Loaded {} ports on {} subnets from {}",
                    loaded.ports.len(),
                    loaded.subnets.len(),
                    storage_path.display()
                );
                *self.data.write().await = loaded;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(
                    "No port registry found at {}, starting fresh",
                    storage_path.display()
                );
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    "Failed to load port registry from {}: {}",
                    storage_path.display(),
                    e
                );
                Err(e.into())
            }
        }
    }

    async fn save_to_storage(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;

        let storage_path = self.storage_path();
        let content = {
            let data = self.data.read().await;
            serde_json::to_string_pretty(&*data)?
        };

        // Write atomically using temporary file
        let temp_path = storage_path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &storage_path).await?;

        log::debug!("Saved port registry to {}", storage_path.display());
        Ok(())
    }

    /// Register a subnet so ports can be allocated on it
    pub async fn add_subnet(&self, subnet: &Subnet) -> Result<()> {
        subnet.validate().map_err(|e| ConfigError::InvalidValue {
            field: format!("subnet {}", subnet.id),
            value: e.to_string(),
        })?;

        let entry = SubnetEntry {
            id: subnet.id.clone(),
            cidr: subnet.cidr,
            gateway: subnet.gateway_ip,
            registered_at: Utc::now(),
        };

        let mut data = self.data.write().await;
        if data.subnets.insert(subnet.id.clone(), entry).is_some() {
            log::debug!("Subnet {} re-registered", subnet.id);
        }
        drop(data);

        self.save_to_storage().await?;
        log::info!("Registered subnet {} ({})", subnet.id, subnet.cidr);
        Ok(())
    }

    pub async fn remove_subnet(&self, subnet_id: &str) -> Result<()> {
        let mut data = self.data.write().await;

        let in_use = data.assigned_ips(subnet_id).len();
        if in_use > 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("subnet {}", subnet_id),
                value: format!("{} addresses still assigned", in_use),
            }
            .into());
        }

        if data.subnets.remove(subnet_id).is_none() {
            return Err(ConfigError::MissingField {
                field: format!("subnet {}", subnet_id),
            }
            .into());
        }
        drop(data);

        self.save_to_storage().await?;
        log::info!("Removed subnet {}", subnet_id);
        Ok(())
    }

    pub async fn delete_port(&self, name: &str) -> Result<DeleteOutcome> {
        let mut data = self.data.write().await;
        if data.ports.remove(name).is_none() {
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        drop(data);

        self.save_to_storage().await?;
        log::info!("Deleted port {}", name);
        Ok(DeleteOutcome::Deleted)
    }

    /// Ports with an address on `subnet_id`, ordered by name
    pub async fn list_ports(&self, subnet_id: &str) -> Vec<Port> {
        let data = self.data.read().await;
        let mut ports: Vec<Port> = data
            .ports
            .values()
            .filter(|entry| entry.port.subnet_id == subnet_id)
            .map(|entry| entry.port.clone())
            .collect();
        ports.sort_by(|a, b| a.name.cmp(&b.name));
        ports
    }
}

#[async_trait]
impl PortClient for PortRegistry {
    async fn get_port_by_name(&self, name: &str) -> Result<Vec<Port>> {
        let data = self.data.read().await;
        Ok(data
            .ports
            .get(name)
            .map(|entry| entry.port.clone())
            .into_iter()
            .collect())
    }

    async fn create_port_on_subnet(
        &self,
        subnet_id: &str,
        mac_address: Option<&str>,
        name: &str,
        fixed_address_count: usize,
    ) -> Result<Port> {
        let allocation_error = |message: String| NetworkError::Allocation {
            port: name.to_string(),
            message,
        };

        if fixed_address_count == 0 {
            return Err(allocation_error("no fixed address requested".to_string()));
        }

        let mut data = self.data.write().await;
        if data.ports.contains_key(name) {
            return Err(allocation_error("port already exists".to_string()));
        }

        let subnet = data
            .subnets
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| allocation_error(format!("subnet {} is not registered", subnet_id)))?;

        let ips = data.find_free_ips(&subnet, fixed_address_count);
        if ips.len() < fixed_address_count {
            return Err(allocation_error(format!(
                "subnet {} has {} free addresses, {} requested",
                subnet_id,
                ips.len(),
                fixed_address_count
            )));
        }

        let port = Port {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            subnet_id: subnet_id.to_string(),
            mac_address: mac_address.map(str::to_string),
            fixed_ips: ips
                .into_iter()
                .map(|ip_address| FixedIp {
                    subnet_id: subnet_id.to_string(),
                    ip_address,
                })
                .collect(),
        };
        data.ports.insert(
            name.to_string(),
            PortEntry {
                port: port.clone(),
                created_at: Utc::now(),
            },
        );
        drop(data);

        self.save_to_storage().await?;
        log::info!(
            "Created port {} on subnet {} with {:?}",
            name,
            subnet_id,
            port.fixed_ips
        );
        Ok(port)
    }
}
