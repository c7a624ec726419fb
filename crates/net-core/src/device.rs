//! Appliance handle

use std::fmt;
use std::sync::Arc;

use crate::resources::{
    NetworkHelper, SelfIpResource, VirtualAddressResource, VirtualServiceResource,
};

/// One appliance together with the clients bound to it
#[derive(Clone)]
pub struct Device {
    name: String,
    pub self_ips: Arc<dyn SelfIpResource>,
    pub virtual_services: Arc<dyn VirtualServiceResource>,
    pub virtual_addresses: Arc<dyn VirtualAddressResource>,
    pub network: Arc<dyn NetworkHelper>,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        self_ips: Arc<dyn SelfIpResource>,
        virtual_services: Arc<dyn VirtualServiceResource>,
        virtual_addresses: Arc<dyn VirtualAddressResource>,
        network: Arc<dyn NetworkHelper>,
    ) -> Self {
        Self {
            name: name.into(),
            self_ips,
            virtual_services,
            virtual_addresses,
            network,
        }
    }

    /// Build a device whose resources are all served by one client
    pub fn from_client<C>(name: impl Into<String>, client: Arc<C>) -> Self
    where
        C: SelfIpResource
            + VirtualServiceResource
            + VirtualAddressResource
            + NetworkHelper
            + 'static,
    {
        Self {
            name: name.into(),
            self_ips: client.clone(),
            virtual_services: client.clone(),
            virtual_addresses: client.clone(),
            network: client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("name", &self.name).finish()
    }
}
