use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use miniapp_account_summary::runtime_config::{
    ConfigError, ConfigResolver, WidgetConfig, DEFAULT_APP_NAME, DEFAULT_BFF_URL,
};
use serde_json::json;
use url::Url;

use crate::common::*;

mod common;

fn resolver() -> ConfigResolver {
    ConfigResolver::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn resolves_served_document_with_instance_version() {
    let server = config_server(json!({
        "APP_NAME": "Accounts",
        "BFF_URL": "https://x",
    }))
    .await;

    let config = resolver()
        .resolve(Url::parse(&server.url("/config.json")).unwrap(), "2.0.0")
        .await
        .unwrap();

    assert_eq!(
        config,
        WidgetConfig {
            app_name: "Accounts".to_owned(),
            bff_url: "https://x".to_owned(),
            version: "2.0.0".to_owned(),
        }
    );
}

#[tokio::test]
async fn empty_document_falls_back_to_defaults() {
    let server = config_server(json!({})).await;

    let config = resolver()
        .resolve(Url::parse(&server.url("/config.json")).unwrap(), "1.0.0")
        .await
        .unwrap();

    assert_eq!(config.app_name, DEFAULT_APP_NAME);
    assert_eq!(config.bff_url, DEFAULT_BFF_URL);
    assert_eq!(config.version, "1.0.0");
}

#[tokio::test]
async fn malformed_document_is_an_error() {
    let router = Router::new().route("/config.json", get(|| async { "{not json" }));
    let server = ServerHandle::for_router(router).await;

    let err = resolver()
        .resolve(Url::parse(&server.url("/config.json")).unwrap(), "1.0.0")
        .await
        .unwrap_err();

    assert!(matches!(err, ConfigError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn error_status_is_an_error() {
    let router = Router::new().route(
        "/config.json",
        get(|| async { (StatusCode::NOT_FOUND, "missing") }),
    );
    let server = ServerHandle::for_router(router).await;

    let err = resolver()
        .resolve(Url::parse(&server.url("/config.json")).unwrap(), "1.0.0")
        .await
        .unwrap_err();

    assert!(matches!(err, ConfigError::Status(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/config.json", listener.local_addr().unwrap())).unwrap();
    drop(listener);

    let err = resolver().resolve(url, "1.0.0").await.unwrap_err();

    assert!(matches!(err, ConfigError::Request(_)), "got {err:?}");
}

#[tokio::test]
async fn asks_intermediaries_not_to_cache() {
    let router = Router::new().route(
        "/config.json",
        get(|headers: HeaderMap| async move {
            let fresh = headers.get("cache-control").and_then(|v| v.to_str().ok()) == Some("no-store")
                && headers.get("pragma").and_then(|v| v.to_str().ok()) == Some("no-cache");
            if fresh {
                (StatusCode::OK, r#"{"APP_NAME":"Fresh"}"#)
            } else {
                (StatusCode::BAD_REQUEST, "cached request")
            }
        }),
    );
    let server = ServerHandle::for_router(router).await;

    let config = resolver()
        .resolve(Url::parse(&server.url("/config.json")).unwrap(), "1.0.0")
        .await
        .unwrap();

    assert_eq!(config.app_name, "Fresh");
}
