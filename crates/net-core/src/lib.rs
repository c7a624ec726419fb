//! Appliance network core
//!
//! Error taxonomy, collaborator contracts and reconciliation state shared by
//! the self-IP reconciler and its clients.

pub mod device;
pub mod error;
pub mod resources;
pub mod state;

pub use device::Device;
pub use error::{ConfigError, NetworkError, ROUTE_DOMAIN_VLAN_MESSAGE};
pub use resources::{
    AddressBindingRegistrar, DeleteOutcome, NamingResolver, NetworkHelper, PortClient,
    SelfIpResource, VirtualAddressResource, VirtualServiceResource,
};
pub use state::{AssuranceState, DeviceAssurance};

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, NetworkError>;
