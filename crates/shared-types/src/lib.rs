//! Data model shared by the self-IP reconciler, its collaborators and the CLI

pub mod error;
pub mod network;
pub mod port;
pub mod selfip;
pub mod virtual_server;

pub use error::{SharedResult, SharedTypeError};
pub use network::{LoadBalancer, Network, Service, Subnet, SubnetInfo};
pub use port::{FixedIp, Port};
pub use selfip::{gateway_name, local_selfip_name, SelfIpAddress, SelfIpModel};
pub use virtual_server::{
    base_name, qualify, SourceAddressTranslation, VirtualAddress, VirtualServiceModel,
    WILDCARD_DESTINATION, WILDCARD_MASK,
};
