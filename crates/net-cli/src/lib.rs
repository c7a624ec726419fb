//! Operator CLI for self-IP and gateway reconciliation
//!
//! Wires the reconciler to one appliance REST client and the local port
//! registry, driven by an agent configuration file.

pub mod commands;
pub mod config;
