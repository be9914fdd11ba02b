//! The account summary miniapp: a custom element that loads its configuration at
//! runtime, renders the account card inside its own isolation boundary and
//! reports READY/HEALTH to whatever page embeds it.
use std::sync::Arc;
use std::time::Duration;

use miniapp_sdk::{
    BundleManifest, Component, CustomElementRegistry, DomError, WidgetBundle,
};
use url::Url;

pub mod bridge;
pub mod config;
pub mod gateway;
pub mod render;
pub mod runtime_config;
pub mod server;
pub mod summary;

use bridge::{BridgeOptions, LifecycleBridge};
use runtime_config::ConfigResolver;

pub const BUNDLE_NAME: &str = "account-summary";
pub const ELEMENT_NAME: &str = "kitx-account-summary";
/// Stylesheet location, relative to the bundle manifest.
pub const STYLESHEET_PATH: &str = "styles.css";

/// Entry point of the miniapp: defines [`ELEMENT_NAME`] with a
/// [`LifecycleBridge`] per element.
pub struct AccountSummaryBundle {
    resolver: ConfigResolver,
    http: reqwest::Client,
    config_timeout: Duration,
}

impl AccountSummaryBundle {
    pub fn new(config_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent("miniapp-account-summary")
            .build()?;
        Ok(Self {
            resolver: ConfigResolver::with_client(http.clone()),
            http,
            config_timeout,
        })
    }

    pub fn manifest(version: &str) -> BundleManifest {
        BundleManifest {
            bundle: BUNDLE_NAME.to_owned(),
            element: ELEMENT_NAME.to_owned(),
            version: version.to_owned(),
        }
    }
}

impl WidgetBundle for AccountSummaryBundle {
    fn name(&self) -> &str {
        BUNDLE_NAME
    }

    fn element(&self) -> &str {
        ELEMENT_NAME
    }

    fn register(&self, registry: &CustomElementRegistry, module_url: &Url) -> Result<(), DomError> {
        let stylesheet = module_url
            .join(STYLESHEET_PATH)
            .map_err(|e| DomError::InvalidUrl {
                url: module_url.to_string(),
                reason: e.to_string(),
            })?;
        let options = BridgeOptions {
            config_timeout: self.config_timeout,
            stylesheet_href: stylesheet.to_string(),
        };
        let resolver = self.resolver.clone();
        let http = self.http.clone();

        registry.define(
            ELEMENT_NAME,
            Arc::new(move || -> Arc<dyn Component> {
                Arc::new(LifecycleBridge::new(
                    resolver.clone(),
                    http.clone(),
                    options.clone(),
                ))
            }),
        )
    }
}
