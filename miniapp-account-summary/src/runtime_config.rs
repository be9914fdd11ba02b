//! Runtime configuration of a widget instance, fetched when it attaches.
use std::time::Duration;

use reqwest::header;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

pub const DEFAULT_APP_NAME: &str = "Account Summary";
pub const DEFAULT_BFF_URL: &str = "http://localhost:8080";

/// Resolved configuration handed to the presentation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub app_name: String,
    /// Absolute base url of the gateway.
    pub bff_url: String,
    pub version: String,
}

/// The configuration document as served. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RuntimeConfig {
    #[serde(rename = "APP_NAME", default)]
    pub app_name: Option<String>,
    #[serde(rename = "BFF_URL", default)]
    pub bff_url: Option<String>,
}

impl RuntimeConfig {
    /// Applies defaults. The instance `version` is used as is: the document has no
    /// say on it.
    pub fn into_widget_config(self, version: &str) -> Result<WidgetConfig, ConfigError> {
        let bff_url = self.bff_url.unwrap_or_else(|| DEFAULT_BFF_URL.to_owned());
        Url::parse(&bff_url).map_err(|e| ConfigError::InvalidBffUrl {
            url: bff_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(WidgetConfig {
            app_name: self.app_name.unwrap_or_else(|| DEFAULT_APP_NAME.to_owned()),
            bff_url,
            version: version.to_owned(),
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("failed to fetch configuration: {0}")]
    Request(reqwest::Error),
    #[error("configuration endpoint answered with an error: {0}")]
    Status(reqwest::Error),
    #[error("malformed configuration document: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("BFF_URL {url} is not an absolute url: {reason}")]
    InvalidBffUrl { url: String, reason: String },
}

/// Fetches configuration documents, bypassing any cache.
#[derive(Clone)]
pub struct ConfigResolver {
    client: reqwest::Client,
}

impl ConfigResolver {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent("miniapp-account-summary")
            .timeout(timeout)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, url: Url, version: &str) -> Result<WidgetConfig, ConfigError> {
        let response = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-store")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await
            .map_err(ConfigError::Request)?
            .error_for_status()
            .map_err(ConfigError::Status)?;

        let body = response.bytes().await.map_err(ConfigError::Request)?;
        let document: RuntimeConfig = serde_json::from_slice(&body)?;
        tracing::debug!(?document, "fetched runtime configuration");

        document.into_widget_config(version)
    }
}
