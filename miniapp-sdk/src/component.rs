use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::dom::{NodeId, Page};
use crate::error::DomError;
use crate::signal::Signal;

/// Behaviour attached to a custom element.
///
/// One instance exists per upgraded element and lives as long as the page. The
/// page calls `connected` every time the element becomes connected and
/// `disconnected` every time it is removed; the latter runs before the element's
/// subtree is detached.
#[async_trait]
pub trait Component: Send + Sync {
    async fn connected(&self, ctx: ElementContext);

    fn disconnected(&self, ctx: &ElementContext);
}

pub trait ComponentFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Component>;
}

impl<F> ComponentFactory for F
where
    F: Fn() -> Arc<dyn Component> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Component> {
        self()
    }
}

/// Maps custom element names to the factories that upgrade them.
#[derive(Default)]
pub struct CustomElementRegistry {
    definitions: RwLock<HashMap<String, Arc<dyn ComponentFactory>>>,
}

impl CustomElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines `name`. Names must be lowercase, start with a letter and contain a
    /// hyphen; a name can only be defined once.
    pub fn define(&self, name: &str, factory: Arc<dyn ComponentFactory>) -> Result<(), DomError> {
        if !is_valid_element_name(name) {
            return Err(DomError::InvalidElementName(name.to_owned()));
        }
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if definitions.contains_key(name) {
            return Err(DomError::AlreadyDefined(name.to_owned()));
        }
        drop(definitions.insert(name.to_owned(), factory));
        tracing::info!("defined custom element {}", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ComponentFactory>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

fn is_valid_element_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.contains('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || c == '.')
}

/// The isolation boundary of an element, once its first update cycle completed.
///
/// Only [`ElementContext::update_complete`] hands these out, so holding one
/// proves the boundary exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationBoundary {
    host: NodeId,
    root: NodeId,
}

impl IsolationBoundary {
    pub fn host(&self) -> NodeId {
        self.host
    }

    /// The shadow root nodes are mounted under.
    pub fn root(&self) -> NodeId {
        self.root
    }
}

/// What a component sees of its element.
#[derive(Clone)]
pub struct ElementContext {
    page: Page,
    element: NodeId,
    updates: watch::Receiver<u64>,
}

impl ElementContext {
    pub(crate) fn new(page: Page, element: NodeId, updates: watch::Receiver<u64>) -> Self {
        Self {
            page,
            element,
            updates,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.page.attribute(self.element, name)
    }

    pub fn is_connected(&self) -> bool {
        self.page.is_connected(self.element)
    }

    /// Waits for the element's first update cycle and returns its boundary.
    pub async fn update_complete(&self) -> Result<IsolationBoundary, DomError> {
        let mut updates = self.updates.clone();
        drop(updates
            .wait_for(|completed| *completed > 0)
            .await
            .map_err(|_| DomError::Detached(self.element))?);

        let root = self
            .page
            .shadow_root(self.element)
            .ok_or(DomError::NoShadowRoot(self.element))?;
        Ok(IsolationBoundary {
            host: self.element,
            root,
        })
    }

    /// Raises `signal` on the element.
    pub fn emit(&self, signal: Signal) {
        self.page.dispatch(self.element, signal)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::signal::{ReadyDetail, SignalKind};

    #[derive(Default)]
    struct Probe {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Component for Probe {
        async fn connected(&self, ctx: ElementContext) {
            let boundary = ctx.update_complete().await.unwrap();
            self.calls
                .lock()
                .unwrap()
                .push(format!("connected:{}", ctx.attribute("app-id").unwrap_or_default()));
            let marker = ctx.page().create_element("div");
            ctx.page().append_child(boundary.root(), marker).unwrap();
            ctx.emit(Signal::Ready(ReadyDetail {
                app: "probe".to_owned(),
                version: "1.0.0".to_owned(),
            }));
        }

        fn disconnected(&self, ctx: &ElementContext) {
            assert!(ctx.is_connected(), "hook runs before detachment");
            self.calls.lock().unwrap().push("disconnected".to_owned());
        }
    }

    fn page() -> Page {
        Page::new(Url::parse("http://localhost:5173/").unwrap())
    }

    #[test]
    fn validates_and_rejects_duplicate_definitions() {
        let registry = CustomElementRegistry::new();
        let factory: Arc<dyn ComponentFactory> =
            Arc::new(|| -> Arc<dyn Component> { Arc::new(Probe::default()) });

        assert_eq!(
            registry.define("Widget", factory.clone()).unwrap_err(),
            DomError::InvalidElementName("Widget".to_owned())
        );
        assert_eq!(
            registry.define("widget", factory.clone()).unwrap_err(),
            DomError::InvalidElementName("widget".to_owned())
        );
        registry.define("kitx-probe", factory.clone()).unwrap();
        assert!(registry.is_defined("kitx-probe"));
        assert_eq!(
            registry.define("kitx-probe", factory).unwrap_err(),
            DomError::AlreadyDefined("kitx-probe".to_owned())
        );
    }

    #[tokio::test]
    async fn upgrades_connected_elements_and_runs_hooks() {
        let page = page();
        let probe = Arc::new(Probe::default());
        let shared = probe.clone();
        page.custom_elements()
            .define(
                "kitx-probe",
                Arc::new(move || -> Arc<dyn Component> { shared.clone() }),
            )
            .unwrap();

        let mut ready = page.subscribe(page.root(), SignalKind::Ready).unwrap();
        let el = page.create_element("kitx-probe");
        page.set_attribute(el, "app-id", "probe").unwrap();
        page.append_child(page.root(), el).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), ready.recv())
            .await
            .expect("ready signal")
            .unwrap();
        assert_eq!(event.origin, el);

        let shadow = page.shadow_root(el).expect("render root created");
        assert_eq!(page.children(shadow).unwrap().len(), 1);

        page.remove_child(page.root(), el).unwrap();
        assert!(!page.is_connected(el));
        assert_eq!(
            *probe.calls.lock().unwrap(),
            vec!["connected:probe".to_owned(), "disconnected".to_owned()]
        );
    }

    #[test]
    fn upgrading_requires_a_runtime() {
        let page = page();
        page.custom_elements()
            .define(
                "kitx-probe",
                Arc::new(|| -> Arc<dyn Component> { Arc::new(Probe::default()) }),
            )
            .unwrap();
        let el = page.create_element("kitx-probe");

        assert_eq!(
            page.append_child(page.root(), el),
            Err(DomError::NoRuntime)
        );
        assert!(!page.is_connected(el));
        assert_eq!(page.parent(el), None);
    }
}
