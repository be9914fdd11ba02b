//! The custom element that hosts the account summary.
//!
//! The bridge owns the element's isolation boundary and drives the render root
//! mounted in it. Every attachment runs configuration → mount → signals, and
//! ends with exactly one HEALTH signal unless the element is detached first.
//!
//! ```text
//! Unattached ──connected──► Configuring ──mounted──► Mounted
//!     ▲                         │                       │
//!     │                         └──error──► Failed ◄────┘
//!     └──────────────disconnected───────────────────────┘
//! ```
//!
//! Each attachment gets a generation number. Detaching bumps it, so a
//! configuration response or error arriving afterwards finds a stale
//! generation and is dropped.
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use miniapp_sdk::{
    emit_health, emit_ready, Component, DomError, ElementContext, HealthStatus,
    IsolationBoundary, Page, ReadyDetail,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gateway::GatewayClient;
use crate::render::RenderRoot;
use crate::runtime_config::{ConfigError, ConfigResolver, WidgetConfig};
use crate::summary::AccountSummary;

pub const DEFAULT_CONFIG_PATH: &str = "/config.json";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_APP_ID: &str = "account-summary";

pub use miniapp_sdk::{APP_ID_ATTRIBUTE, CONFIG_URL_ATTRIBUTE, VERSION_ATTRIBUTE};

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Upper bound for fetching the configuration document.
    pub config_timeout: Duration,
    /// Stylesheet linked into the isolation boundary.
    pub stylesheet_href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unattached,
    Configuring,
    Mounted,
    Failed,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("invalid configuration url: {0}")]
    ConfigUrl(DomError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("configuration request timed out after {0:?}")]
    ConfigTimeout(Duration),
    #[error("render root unavailable: {0}")]
    Boundary(DomError),
    #[error("failed to mount presentation: {0}")]
    Mount(#[from] DomError),
}

enum Attachment {
    Mounted,
    /// The element was detached while the attachment was in flight.
    Abandoned,
}

struct BridgeState {
    phase: Phase,
    generation: u64,
    config: Option<WidgetConfig>,
    root: Option<RenderRoot>,
}

pub struct LifecycleBridge {
    resolver: ConfigResolver,
    http: reqwest::Client,
    options: BridgeOptions,
    state: Mutex<BridgeState>,
}

impl LifecycleBridge {
    pub fn new(resolver: ConfigResolver, http: reqwest::Client, options: BridgeOptions) -> Self {
        Self {
            resolver,
            http,
            options,
            state: Mutex::new(BridgeState {
                phase: Phase::Unattached,
                generation: 0,
                config: None,
                root: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn config(&self) -> Option<WidgetConfig> {
        self.lock().config.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().root.as_ref().is_some_and(RenderRoot::is_mounted)
    }

    fn begin_attachment(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.phase = Phase::Configuring;
        state.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        state.generation == generation && state.phase == Phase::Configuring
    }

    /// Runs `emit` while holding the state, provided the attachment is still
    /// `generation` in `phase`. A concurrent detach waits for it to finish.
    fn emit_if_current(&self, generation: u64, phase: Phase, emit: impl FnOnce()) -> bool {
        let state = self.lock();
        if state.generation != generation || state.phase != phase {
            return false;
        }
        emit();
        true
    }

    /// Marks the attachment as failed and runs `emit`, unless it went stale.
    fn fail(&self, generation: u64, emit: impl FnOnce()) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.phase = Phase::Failed;
        emit();
        true
    }

    async fn configure_and_mount(
        &self,
        ctx: &ElementContext,
        generation: u64,
        version: &str,
    ) -> Result<Attachment, BridgeError> {
        let reference = ctx
            .attribute(CONFIG_URL_ATTRIBUTE)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
        let url = ctx
            .page()
            .resolve_url(&reference)
            .map_err(BridgeError::ConfigUrl)?;

        let config = tokio::time::timeout(
            self.options.config_timeout,
            self.resolver.resolve(url, version),
        )
        .await
        .map_err(|_| BridgeError::ConfigTimeout(self.options.config_timeout))??;
        if !self.is_current(generation) {
            return Ok(Attachment::Abandoned);
        }

        let boundary = ctx.update_complete().await.map_err(BridgeError::Boundary)?;
        if !self.is_current(generation) {
            return Ok(Attachment::Abandoned);
        }

        self.mount(ctx.page(), boundary, config, generation)
    }

    fn mount(
        &self,
        page: &Page,
        boundary: IsolationBoundary,
        config: WidgetConfig,
        generation: u64,
    ) -> Result<Attachment, BridgeError> {
        let mut state = self.lock();
        if state.generation != generation || state.phase != Phase::Configuring {
            return Ok(Attachment::Abandoned);
        }
        if let Some(previous) = state.root.take() {
            release(page, previous);
        }

        self.ensure_stylesheet(page, boundary)?;

        let host = page.create_element("div");
        page.append_child(boundary.root(), host)?;
        let mut root = RenderRoot::create(page.clone(), host);
        let view = AccountSummary::new(
            config.clone(),
            GatewayClient::new(self.http.clone(), &config.bff_url),
        );
        if let Err(e) = root.render(&view) {
            release(page, root);
            return Err(e.into());
        }

        metrics::counter!("miniapp_mounts_total").increment(1);
        state.root = Some(root);
        state.config = Some(config);
        state.phase = Phase::Mounted;
        Ok(Attachment::Mounted)
    }

    /// Links the stylesheet into the boundary unless it already is.
    fn ensure_stylesheet(&self, page: &Page, boundary: IsolationBoundary) -> Result<(), DomError> {
        let href = self.options.stylesheet_href.as_str();
        let linked = page
            .find_by_attribute(boundary.root(), "href", href)
            .into_iter()
            .any(|node| page.tag_name(node).as_deref() == Some("link"));
        if linked {
            return Ok(());
        }

        let link = page.create_element("link");
        page.set_attribute(link, "rel", "stylesheet")?;
        page.set_attribute(link, "href", href)?;
        page.append_child(boundary.root(), link)
    }
}

/// Unmounts `root` and removes its container from the boundary.
fn release(page: &Page, mut root: RenderRoot) {
    root.unmount();
    let host = root.container();
    if let Some(parent) = page.parent(host) {
        if let Err(e) = page.remove_child(parent, host) {
            warn!("failed to remove render container: {}", e);
        }
    }
}

#[async_trait]
impl Component for LifecycleBridge {
    async fn connected(&self, ctx: ElementContext) {
        if !ctx.is_connected() {
            debug!(element = %ctx.element(), "detached before the connected hook ran");
            return;
        }
        let version = ctx
            .attribute(VERSION_ATTRIBUTE)
            .unwrap_or_else(|| DEFAULT_VERSION.to_owned());
        let app = ctx
            .attribute(APP_ID_ATTRIBUTE)
            .unwrap_or_else(|| DEFAULT_APP_ID.to_owned());
        let generation = self.begin_attachment();
        metrics::counter!("miniapp_attachments_total").increment(1);

        match self.configure_and_mount(&ctx, generation, &version).await {
            Ok(Attachment::Mounted) => {
                let signalled = self.emit_if_current(generation, Phase::Mounted, || {
                    emit_ready(
                        ctx.page(),
                        ctx.element(),
                        ReadyDetail {
                            app: app.clone(),
                            version: version.clone(),
                        },
                    );
                    emit_health(ctx.page(), ctx.element(), HealthStatus::healthy(&app, &version));
                });
                if signalled {
                    info!(app = %app, version = %version, "miniapp mounted");
                } else {
                    debug!(app = %app, "element detached after mounting, dropping signals");
                }
            }
            Ok(Attachment::Abandoned) => {
                debug!(app = %app, "element detached while attaching, dropping result");
            }
            Err(e) => {
                let reported = self.fail(generation, || {
                    emit_health(
                        ctx.page(),
                        ctx.element(),
                        HealthStatus::unhealthy(&app, &version, &e.to_string()),
                    );
                });
                if !reported {
                    debug!(app = %app, "element detached while attaching, dropping error: {}", e);
                    return;
                }
                metrics::counter!("miniapp_attach_failures_total").increment(1);
                warn!(app = %app, version = %version, "miniapp failed to attach: {}", e);
            }
        }
    }

    fn disconnected(&self, ctx: &ElementContext) {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(root) = state.root.take() {
            release(ctx.page(), root);
        }
        state.config = None;
        state.phase = Phase::Unattached;
    }
}
