//! HTTP plumbing for the appliance management API

use std::time::Duration;

use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};

use l3_net_core::{NetworkError, Result};

use crate::config::IControlConfig;

pub(crate) const SELF_IP_PATH: &str = "/mgmt/tm/net/self";
pub(crate) const VIRTUAL_PATH: &str = "/mgmt/tm/ltm/virtual";
pub(crate) const VIRTUAL_ADDRESS_PATH: &str = "/mgmt/tm/ltm/virtual-address";
pub(crate) const ROUTE_DOMAIN_PATH: &str = "/mgmt/tm/net/route-domain";
pub(crate) const ARP_PATH: &str = "/mgmt/tm/net/arp";

/// Partition whose route domain is `0` unless configured otherwise
pub const DEFAULT_COMMON_PARTITION: &str = "Common";

/// Client for one appliance
pub struct IControlClient {
    config: IControlConfig,
    client: Client,
    base_url: String,
    pub(crate) common_partition: String,
}

impl IControlClient {
    pub fn new(config: IControlConfig) -> Result<Self> {
        if !config.verify_tls {
            log::warn!("TLS certificate verification disabled for {}", config.url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .no_proxy()
            .build()
            .map_err(transport)?;

        let base_url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            config,
            client,
            base_url,
            common_partition: DEFAULT_COMMON_PARTITION.to_string(),
        })
    }

    /// Use `partition` as the shared partition served by route domain `0`
    pub fn with_common_partition(mut self, partition: impl Into<String>) -> Self {
        self.common_partition = partition.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn common_partition(&self) -> &str {
        &self.common_partition
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NetworkError::remote(status.as_u16(), text));
        }

        Ok(response)
    }

    /// Issue a request and decode the JSON answer
    pub(crate) async fn api_request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body).await?;
        response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }

    /// Issue a request whose answer body is not needed
    pub(crate) async fn api_call(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<()> {
        self.send(method, path, body).await?;
        Ok(())
    }

    pub(crate) async fn object_exists(
        &self,
        collection: &str,
        partition: &str,
        name: &str,
    ) -> Result<bool> {
        let path = object_path(collection, partition, name);
        match self.api_call(Method::GET, &path, None::<&()>).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Path of a partition scoped object, `<collection>/~<partition>~<name>`
pub fn object_path(collection: &str, partition: &str, name: &str) -> String {
    format!(
        "{}/~{}~{}",
        collection,
        urlencoding::encode(partition),
        urlencoding::encode(name)
    )
}

fn transport(e: reqwest::Error) -> NetworkError {
    NetworkError::Transport(e.to_string())
}
