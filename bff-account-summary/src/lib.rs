pub mod accounts;
pub mod api;
pub mod config;
pub mod graphql;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod time;
