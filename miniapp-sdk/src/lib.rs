//! Contract shared by miniapps and the shells that embed them: the page model,
//! custom element lifecycle, lifecycle signals and the bundle format.
pub mod bundle;
pub mod component;
pub mod dom;
pub mod error;
pub mod signal;

pub use bundle::{
    BundleCatalog, BundleManifest, WidgetBundle, APP_ID_ATTRIBUTE, CONFIG_URL_ATTRIBUTE,
    VERSION_ATTRIBUTE,
};
pub use component::{
    Component, ComponentFactory, CustomElementRegistry, ElementContext, IsolationBoundary,
};
pub use dom::{NodeId, NodeKind, Page};
pub use error::DomError;
pub use signal::{
    ErrorDetail, HealthStatus, ReadyDetail, Signal, SignalBus, SignalEvent, SignalKind,
};

/// Raises READY on `element`.
pub fn emit_ready(page: &Page, element: NodeId, detail: ReadyDetail) {
    page.dispatch(element, Signal::Ready(detail))
}

/// Raises HEALTH on `element`.
pub fn emit_health(page: &Page, element: NodeId, status: HealthStatus) {
    page.dispatch(element, Signal::Health(status))
}

/// Raises ERROR on `element`.
pub fn emit_error(page: &Page, element: NodeId, error: impl ToString) {
    page.dispatch(
        element,
        Signal::Error(ErrorDetail {
            error: error.to_string(),
        }),
    )
}
