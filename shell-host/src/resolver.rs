//! Multi-candidate module resolution.
//!
//! Candidates are tried strictly in order, one at a time. The first one that
//! loads wins and the rest are never attempted. The widget's configuration
//! endpoint is derived from the origin of the winning candidate only.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};
use url::{Position, Url};

use crate::loader::{LoadError, LoadedModule, ModuleLoader};

/// Path of the configuration document, relative to a candidate's origin.
pub const CONFIG_DOCUMENT_PATH: &str = "/config.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CandidateError {
    #[error("invalid candidate url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("candidate {0} has no http origin")]
    OpaqueOrigin(String),
}

/// Where a module may be loaded from: an origin and a path on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCandidate {
    base: Url,
    path: String,
}

impl LoadCandidate {
    pub fn new(base: &str, path: &str) -> Result<Self, CandidateError> {
        let parsed = Url::parse(base).map_err(|e| CandidateError::InvalidUrl {
            url: base.to_owned(),
            reason: e.to_string(),
        })?;
        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(CandidateError::OpaqueOrigin(base.to_owned()));
        }
        let base = Url::parse(&origin.ascii_serialization()).map_err(|e| {
            CandidateError::InvalidUrl {
                url: base.to_owned(),
                reason: e.to_string(),
            }
        })?;

        let path = if path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        };
        Ok(Self { base, path })
    }

    /// Splits a full module url into origin and path.
    pub fn parse(url: &str) -> Result<Self, CandidateError> {
        let parsed = Url::parse(url).map_err(|e| CandidateError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        Self::new(url, &parsed[Position::BeforePath..])
    }

    /// The origin, serialized with a trailing slash.
    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn module_url(&self) -> Result<Url, url::ParseError> {
        self.base.join(&self.path)
    }

    pub fn config_url(&self) -> Url {
        let mut url = self.base.clone();
        url.set_path(CONFIG_DOCUMENT_PATH);
        url
    }
}

impl fmt::Display for LoadCandidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.base.as_str().trim_end_matches('/'), self.path)
    }
}

/// Outcome of a successful resolution.
#[derive(Debug)]
pub struct Resolution {
    pub candidate: LoadCandidate,
    /// `/config.json` on the winning candidate's origin.
    pub config_url: Url,
    pub module: LoadedModule,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no module candidates configured")]
    NoCandidates,
    #[error("all {attempts} module candidates failed, last error: {last}")]
    Exhausted { attempts: usize, last: LoadError },
}

pub struct ModuleResolver {
    loader: Arc<dyn ModuleLoader>,
    attempt_timeout: Duration,
}

impl ModuleResolver {
    pub fn new(loader: Arc<dyn ModuleLoader>, attempt_timeout: Duration) -> Self {
        Self {
            loader,
            attempt_timeout,
        }
    }

    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn resolve(&self, candidates: &[LoadCandidate]) -> Result<Resolution, ResolveError> {
        let mut last = None;

        for candidate in candidates {
            metrics::counter!("shell_module_load_attempts_total").increment(1);
            let attempt = tokio::time::timeout(self.attempt_timeout, self.loader.load(candidate))
                .await
                .unwrap_or(Err(LoadError::Timeout(self.attempt_timeout)));

            match attempt {
                Ok(module) => {
                    let config_url = candidate.config_url();
                    info!(
                        candidate = %candidate,
                        config_url = %config_url,
                        bundle = %module.manifest.bundle,
                        "module loaded"
                    );
                    return Ok(Resolution {
                        candidate: candidate.clone(),
                        config_url,
                        module,
                    });
                }
                Err(e) => {
                    metrics::counter!("shell_module_load_failures_total").increment(1);
                    warn!(candidate = %candidate, "failed to load module: {}", e);
                    last = Some(e);
                }
            }
        }

        match last {
            Some(last) => Err(ResolveError::Exhausted {
                attempts: candidates.len(),
                last,
            }),
            None => Err(ResolveError::NoCandidates),
        }
    }
}
