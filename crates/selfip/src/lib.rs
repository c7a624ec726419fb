//! Self-IP and gateway reconciliation
//!
//! Converges per-device local self-IPs and per-subnet floating gateways
//! (self-IP, wildcard forwarding virtual and traffic group) on an appliance.

pub mod config;
pub mod manager;
pub mod naming;

#[cfg(test)]
mod tests;

pub use config::{NamingConfig, ReconcilerConfig};
pub use manager::{SelfIpManager, SelfIpOutcome};
pub use naming::DefaultNamingResolver;
