use miniapp_sdk::DomError;
use thiserror::Error;

use crate::resolver::ResolveError;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("failed to load widget: {0}")]
    Resolve(#[from] ResolveError),
    #[error("failed to attach widget: {0}")]
    Attach(#[from] DomError),
}
