use std::future::ready;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::extract::State as AxumState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::accounts::AccountsApi;
use crate::api::{ApiError, HealthResponse};
use crate::graphql::{self, GraphQLRequest, GraphQLResponse};
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::time::TimeSource;

/// Largest accepted `/graphql` body.
pub const MAX_QUERY_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct State {
    pub accounts: Arc<dyn AccountsApi>,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
}

async fn index() -> &'static str {
    "bff-account-summary"
}

async fn health(state: AxumState<State>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        ts: state.timesource.current_millis(),
    })
}

#[instrument(skip_all)]
async fn query(
    state: AxumState<State>,
    request: Result<Json<GraphQLRequest>, JsonRejection>,
) -> Result<Json<GraphQLResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::RequestDecodingError(e.body_text()))?;
    tracing::debug!(operation = ?request.operation_name, "executing query");

    let document = graphql::parse(&request.query)?;
    graphql::validate(&document)?;
    metrics::counter!("bff_queries_total").increment(1);

    Ok(Json(graphql::execute(&document, state.accounts.as_ref()).await))
}

pub fn router<TZ: TimeSource + Send + Sync + 'static, A: AccountsApi + 'static>(
    timesource: TZ,
    accounts: A,
    metrics: bool,
) -> Router {
    let state = State {
        accounts: Arc::new(accounts),
        timesource: Arc::new(timesource),
    };

    let router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(
            "/graphql",
            post(query).layer(DefaultBodyLimit::max(MAX_QUERY_BODY_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when the gateway is used as a library (during tests etc)
    // does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
