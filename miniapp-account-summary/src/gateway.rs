//! Client for the account summary gateway.
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub const SUMMARY_QUERY: &str = "query { me { name } account { balance } }";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Me {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Account {
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SummaryData {
    pub me: Me,
    pub account: Account,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Option<SummaryData>,
    errors: Option<Vec<QueryError>>,
}

impl QueryResponse {
    /// Any `errors` member fails the query, even an empty one.
    fn into_summary(self) -> Result<SummaryData, GatewayError> {
        if let Some(errors) = self.errors {
            let message = errors
                .into_iter()
                .next()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "GraphQL error".to_owned());
            return Err(GatewayError::Query(message));
        }

        self.data
            .ok_or_else(|| GatewayError::Query("GraphQL error".to_owned()))
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    /// The gateway answered with errors; holds the first message.
    #[error("{0}")]
    Query(String),
}

#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GatewayClient {
    pub fn new(client: reqwest::Client, bff_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/graphql", bff_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn fetch_summary(&self) -> Result<SummaryData, GatewayError> {
        let response: QueryResponse = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": SUMMARY_QUERY }))
            .send()
            .await?
            .json()
            .await?;

        response.into_summary()
    }
}
