#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use miniapp_account_summary::AccountSummaryBundle;
use miniapp_sdk::{BundleCatalog, SignalEvent};
use serde_json::Value;
use shell_host::loader::HttpModuleLoader;
use shell_host::resolver::{LoadCandidate, ModuleResolver};
use tokio::net::TcpListener;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Notify;

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

    /// The widget asset server, pointing its miniapps at `bff_url`.
    pub async fn for_widget(bff_url: &str) -> Self {
        let config = miniapp_account_summary::config::Config {
            address: "127.0.0.1:0".parse().unwrap(),
            app_name: "Accounts".to_owned(),
            bff_url: bff_url.to_owned(),
            bundle_version: "1.0.0".to_owned(),
        };
        Self::for_router(miniapp_account_summary::server::router(&config)).await
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

/// An origin nothing listens on.
pub async fn dead_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    format!("http://{addr}")
}

pub fn candidate(url: &str) -> LoadCandidate {
    LoadCandidate::parse(url).unwrap()
}

pub fn resolver() -> ModuleResolver {
    let bundle = AccountSummaryBundle::new(Duration::from_secs(5)).unwrap();
    let catalog = BundleCatalog::new().with_bundle(Arc::new(bundle));
    ModuleResolver::new(
        Arc::new(HttpModuleLoader::new(reqwest::Client::new(), catalog)),
        Duration::from_secs(5),
    )
}

pub async fn next_signal(rx: &mut Receiver<SignalEvent>) -> SignalEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a signal")
        .unwrap()
}
