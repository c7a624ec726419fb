use serde::{Deserialize, Serialize};

/// Connection settings for one appliance
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IControlConfig {
    /// Base URL of the management API, e.g. `https://10.0.0.245`
    pub url: String,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

impl Default for IControlConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            verify_tls: true,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for IControlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IControlConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
