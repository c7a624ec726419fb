//! Error types for appliance reconciliation

use thiserror::Error;

/// Message fragment the appliance returns when a self-IP references a VLAN
/// that is not yet a member of the route domain of its address.
pub const ROUTE_DOMAIN_VLAN_MESSAGE: &str =
    "must be one of the vlans in the associated route domain";

/// Main error type for reconciliation operations
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The appliance answered with a non-success status
    #[error("Remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response from appliance: {0}")]
    InvalidResponse(String),

    #[error("Address allocation for port {port} failed: {message}")]
    Allocation { port: String, message: String },

    #[error("Self-IP {name} could not be converged: {reason}")]
    SelfIpNotConverged { name: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NetworkError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        NetworkError::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            NetworkError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Remote 4xx answer
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Validation failure that is fixed by attaching the VLAN to the route domain
    pub fn is_route_domain_vlan_error(&self) -> bool {
        match self {
            NetworkError::Remote { message, .. } => {
                self.is_client_error() && message.contains(ROUTE_DOMAIN_VLAN_MESSAGE)
            }
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}
