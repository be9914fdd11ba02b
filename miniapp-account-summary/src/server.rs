//! Asset server for the miniapp: publishes the runtime configuration, the
//! bundle manifest shells load, and the stylesheet.
use std::future::Future;

use axum::{
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use miniapp_sdk::BundleManifest;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::AccountSummaryBundle;

pub const CONFIG_PATH: &str = "/config.json";
pub const MANIFEST_PATH: &str = "/assets/manifest.json";
pub const STYLESHEET_ROUTE: &str = "/assets/styles.css";

const STYLES: &str = include_str!("../assets/styles.css");

#[derive(Clone)]
struct State {
    runtime_config: Value,
    manifest: BundleManifest,
}

async fn index() -> &'static str {
    "miniapp-account-summary"
}

async fn config_document(state: axum::extract::State<State>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(state.runtime_config.clone()),
    )
}

async fn manifest(state: axum::extract::State<State>) -> Json<BundleManifest> {
    Json(state.manifest.clone())
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], STYLES)
}

pub fn router(config: &Config) -> Router {
    let state = State {
        runtime_config: json!({
            "APP_NAME": config.app_name,
            "BFF_URL": config.bff_url,
        }),
        manifest: AccountSummaryBundle::manifest(&config.bundle_version),
    };

    Router::new()
        .route("/", get(index))
        .route(CONFIG_PATH, get(config_document))
        .route(MANIFEST_PATH, get(manifest))
        .route(STYLESHEET_ROUTE, get(stylesheet))
        .layer(TraceLayer::new_for_http())
        // Shells load the miniapp from their own origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(&config);

    tracing::info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
