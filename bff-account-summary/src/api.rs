use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graphql::{ErrorMessage, GraphQLError, GraphQLResponse};

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Epoch milliseconds.
    pub ts: i64,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to decode request: {0}")]
    RequestDecodingError(String),
    #[error(transparent)]
    GraphQL(#[from] GraphQLError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let messages = match &self {
            ApiError::RequestDecodingError(_) => vec![self.to_string()],
            ApiError::GraphQL(e) => e.messages(),
        };
        let body = GraphQLResponse {
            data: None,
            errors: messages.into_iter().map(ErrorMessage::new).collect(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
