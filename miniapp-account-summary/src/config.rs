use std::net::SocketAddr;

use envconfig::Envconfig;

/// Settings of the asset server publishing the miniapp.
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:8081")]
    pub address: SocketAddr,

    /// Served as `APP_NAME` in `/config.json`.
    #[envconfig(default = "Account Summary")]
    pub app_name: String,

    /// Served as `BFF_URL` in `/config.json`.
    #[envconfig(default = "http://localhost:8080")]
    pub bff_url: String,

    #[envconfig(default = "1.0.0")]
    pub bundle_version: String,
}
