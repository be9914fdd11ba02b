//! Loading a widget bundle from one candidate location.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use miniapp_sdk::{BundleCatalog, BundleManifest, WidgetBundle};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::resolver::LoadCandidate;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid module url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to fetch module: {0}")]
    Request(reqwest::Error),
    #[error("module host answered with an error: {0}")]
    Status(reqwest::Error),
    #[error("malformed bundle manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("bundle {0} is not linked into this shell")]
    UnknownBundle(String),
    #[error("bundle {bundle} defines {found}, manifest announces {announced}")]
    ElementMismatch {
        bundle: String,
        announced: String,
        found: String,
    },
    #[error("module load timed out after {0:?}")]
    Timeout(Duration),
}

/// A bundle ready to register its element.
pub struct LoadedModule {
    /// Where the manifest was fetched from. Bundle assets resolve against it.
    pub url: Url,
    pub manifest: BundleManifest,
    pub bundle: Arc<dyn WidgetBundle>,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("url", &self.url.as_str())
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, candidate: &LoadCandidate) -> Result<LoadedModule, LoadError>;
}

/// Fetches the bundle manifest over HTTP and looks the bundle up in the
/// catalog linked into the shell.
pub struct HttpModuleLoader {
    client: reqwest::Client,
    catalog: BundleCatalog,
}

impl HttpModuleLoader {
    pub fn new(client: reqwest::Client, catalog: BundleCatalog) -> Self {
        Self { client, catalog }
    }
}

#[async_trait]
impl ModuleLoader for HttpModuleLoader {
    #[instrument(skip_all, fields(candidate = %candidate))]
    async fn load(&self, candidate: &LoadCandidate) -> Result<LoadedModule, LoadError> {
        let url = candidate
            .module_url()
            .map_err(|e| LoadError::InvalidUrl {
                url: candidate.to_string(),
                reason: e.to_string(),
            })?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(LoadError::Request)?
            .error_for_status()
            .map_err(LoadError::Status)?;
        let body = response.bytes().await.map_err(LoadError::Request)?;
        let manifest: BundleManifest = serde_json::from_slice(&body)?;

        let bundle = self
            .catalog
            .get(&manifest.bundle)
            .ok_or_else(|| LoadError::UnknownBundle(manifest.bundle.clone()))?;
        if bundle.element() != manifest.element {
            return Err(LoadError::ElementMismatch {
                bundle: manifest.bundle,
                announced: manifest.element,
                found: bundle.element().to_owned(),
            });
        }

        Ok(LoadedModule {
            url,
            manifest,
            bundle,
        })
    }
}
