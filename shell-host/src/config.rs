use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use url::Url;

use crate::resolver::{CandidateError, LoadCandidate};

#[derive(Envconfig, Clone)]
pub struct Config {
    /// Base url of the page widgets are attached to.
    #[envconfig(default = "http://localhost:5173/")]
    pub shell_origin: Url,

    /// Comma separated module urls, tried in order.
    #[envconfig(
        default = "http://localhost:8081/assets/manifest.json,http://127.0.0.1:8081/assets/manifest.json"
    )]
    pub shell_candidates: CandidateList,

    #[envconfig(default = "1.0.0")]
    pub widget_version: String,

    #[envconfig(default = "account-summary")]
    pub app_id: String,

    #[envconfig(default = "5000")]
    pub load_timeout_ms: EnvMsDuration,

    #[envconfig(default = "10000")]
    pub config_timeout_ms: EnvMsDuration,

    #[envconfig(default = "30000")]
    pub health_wait_ms: EnvMsDuration,
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList(pub Vec<LoadCandidate>);

impl FromStr for CandidateList {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(LoadCandidate::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(CandidateList)
    }
}
