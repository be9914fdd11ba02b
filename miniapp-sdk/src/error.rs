use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised by page and custom element operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0} cannot have children")]
    NotAContainer(NodeId),
    #[error("node {0} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("inserting node {0} would create a cycle")]
    Cycle(NodeId),
    #[error("element {0} already hosts a shadow root")]
    ShadowRootExists(NodeId),
    #[error("element {0} has no shadow root")]
    NoShadowRoot(NodeId),
    #[error("element {0} was detached before its update cycle completed")]
    Detached(NodeId),
    #[error("{0} is not a valid custom element name")]
    InvalidElementName(String),
    #[error("custom element {0} is already defined")]
    AlreadyDefined(String),
    #[error("custom elements can only be upgraded inside a tokio runtime")]
    NoRuntime,
    #[error("failed to resolve url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
