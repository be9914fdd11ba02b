use std::net::SocketAddr;

use envconfig::Envconfig;
use url::Url;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:8080")]
    pub address: SocketAddr,

    /// Upstream accounts service.
    #[envconfig(default = "https://example.org/mock/")]
    pub accounts_base_url: Url,

    #[envconfig(default = "false")]
    pub export_prometheus: bool,
}
