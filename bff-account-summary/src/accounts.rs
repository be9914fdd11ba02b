//! The accounts datasource the gateway resolves its fields from.
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: String,
    pub balance: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountsError {
    #[error("accounts service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AccountsApi: Send + Sync {
    /// The signed in user.
    async fn me(&self) -> Result<User, AccountsError>;

    /// The signed in user's account.
    async fn account(&self) -> Result<Account, AccountsError>;
}

/// Serves canned data in place of the accounts service at `base_url`.
#[derive(Clone)]
pub struct MockAccounts {
    base_url: Url,
}

impl MockAccounts {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl AccountsApi for MockAccounts {
    async fn me(&self) -> Result<User, AccountsError> {
        Ok(User {
            id: "u1".to_owned(),
            name: "Jane Doe".to_owned(),
        })
    }

    async fn account(&self) -> Result<Account, AccountsError> {
        Ok(Account {
            id: "a1".to_owned(),
            balance: 12543.77,
        })
    }
}
