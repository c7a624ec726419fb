//! Port registry
//!
//! Hands out fixed addresses for named ports on registered subnets and keeps
//! the assignments in a JSON file.

pub mod registry;


pub use registry::PortRegistry;
