#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use miniapp_sdk::{Component, Page, SignalEvent, SignalKind};
use miniapp_account_summary::bridge::{BridgeOptions, LifecycleBridge};
use miniapp_account_summary::runtime_config::ConfigResolver;
use miniapp_account_summary::ELEMENT_NAME;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Notify;
use url::Url;

pub const STYLESHEET_HREF: &str = "http://assets.test/assets/styles.css";

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_router(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { notify.notified().await })
                .await
                .unwrap()
        });

        Self { addr, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}

/// Serves `document` at `/config.json`.
pub async fn config_server(document: Value) -> ServerHandle {
    let router = Router::new().route(
        "/config.json",
        get(move || {
            let document = document.clone();
            async move { Json(document) }
        }),
    );
    ServerHandle::for_router(router).await
}

/// Serves `document` at `/config.json`, but only once `release` is notified.
pub async fn delayed_config_server(document: Value, release: Arc<Notify>) -> ServerHandle {
    let router = Router::new().route(
        "/config.json",
        get(move || {
            let document = document.clone();
            let release = release.clone();
            async move {
                release.notified().await;
                Json(document)
            }
        }),
    );
    ServerHandle::for_router(router).await
}

/// Answers every `/graphql` query with `response`.
pub async fn gateway_stub(response: Value) -> ServerHandle {
    let router = Router::new().route(
        "/graphql",
        post(move || {
            let response = response.clone();
            async move { Json(response) }
        }),
    );
    ServerHandle::for_router(router).await
}

pub fn bridge(config_timeout: Duration) -> Arc<LifecycleBridge> {
    let http = reqwest::Client::new();
    Arc::new(LifecycleBridge::new(
        ConfigResolver::with_client(http.clone()),
        http,
        BridgeOptions {
            config_timeout,
            stylesheet_href: STYLESHEET_HREF.to_owned(),
        },
    ))
}

/// A page where the account summary element is backed by `bridge`.
pub fn page_with(bridge: Arc<LifecycleBridge>) -> Page {
    let page = Page::new(Url::parse("http://localhost:5173/").unwrap());
    page.custom_elements()
        .define(
            ELEMENT_NAME,
            Arc::new(move || -> Arc<dyn Component> { bridge.clone() }),
        )
        .unwrap();
    page
}

pub struct Listeners {
    pub ready: Receiver<SignalEvent>,
    pub health: Receiver<SignalEvent>,
}

impl Listeners {
    pub fn on_root(page: &Page) -> Self {
        Self {
            ready: page.subscribe(page.root(), SignalKind::Ready).unwrap(),
            health: page.subscribe(page.root(), SignalKind::Health).unwrap(),
        }
    }
}

pub async fn next_signal(rx: &mut Receiver<SignalEvent>) -> SignalEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a signal")
        .unwrap()
}

/// Polls until `condition` holds, for up to five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not met in time");
}
