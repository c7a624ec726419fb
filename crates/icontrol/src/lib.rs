//! Appliance REST client
//!
//! Implements the self-IP, virtual server, virtual address and network
//! helper contracts of `l3-net-core` on top of the appliance management API.

pub mod client;
pub mod config;
mod payload;
mod resources;


pub use client::IControlClient;
pub use config::IControlConfig;
