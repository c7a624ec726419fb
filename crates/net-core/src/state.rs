//! Process-local record of subnets already assured per device
//!
//! Entries are written only after every remote object of a subnet converged.
//! A periodic external invalidation clears them to force re-verification.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Assurance entries of one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAssurance {
    /// tenant id -> subnet ids with a local self-IP in place
    pub tenant_subnets: HashMap<String, HashSet<String>>,
    /// subnet ids with gateway self-IP, forwarding virtual and traffic group in place
    pub gateway_subnets: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssuranceState {
    devices: Arc<RwLock<HashMap<String, DeviceAssurance>>>,
}

impl AssuranceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_tenant_subnet_assured(
        &self,
        device: &str,
        tenant_id: &str,
        subnet_id: &str,
    ) -> bool {
        let devices = self.devices.read().await;
        devices
            .get(device)
            .and_then(|d| d.tenant_subnets.get(tenant_id))
            .map_or(false, |subnets| subnets.contains(subnet_id))
    }

    pub async fn mark_tenant_subnet_assured(
        &self,
        device: &str,
        tenant_id: &str,
        subnet_id: &str,
    ) {
        let mut devices = self.devices.write().await;
        devices
            .entry(device.to_string())
            .or_default()
            .tenant_subnets
            .entry(tenant_id.to_string())
            .or_default()
            .insert(subnet_id.to_string());
    }

    pub async fn is_gateway_assured(&self, device: &str, subnet_id: &str) -> bool {
        let devices = self.devices.read().await;
        devices
            .get(device)
            .map_or(false, |d| d.gateway_subnets.contains(subnet_id))
    }

    pub async fn mark_gateway_assured(&self, device: &str, subnet_id: &str) {
        let mut devices = self.devices.write().await;
        devices
            .entry(device.to_string())
            .or_default()
            .gateway_subnets
            .insert(subnet_id.to_string());
    }

    /// Returns whether an entry was present
    pub async fn clear_gateway(&self, device: &str, subnet_id: &str) -> bool {
        let mut devices = self.devices.write().await;
        devices
            .get_mut(device)
            .map_or(false, |d| d.gateway_subnets.remove(subnet_id))
    }

    pub async fn invalidate_device(&self, device: &str) {
        let mut devices = self.devices.write().await;
        if devices.remove(device).is_some() {
            log::debug!("Invalidated assurance entries of device {}", device);
        }
    }

    pub async fn invalidate_all(&self) {
        let mut devices = self.devices.write().await;
        let count = devices.len();
        devices.clear();
        log::debug!("Invalidated assurance entries of {} devices", count);
    }

    pub async fn snapshot(&self, device: &str) -> DeviceAssurance {
        let devices = self.devices.read().await;
        devices.get(device).cloned().unwrap_or_default()
    }
}
