//! A minimal page model: a containment tree of nodes where shadow roots act as
//! isolation boundaries.
//!
//! Shadow roots hang off their host element but are not part of its children, so
//! tree queries never cross into them. Signal dispatch does cross them: the
//! composed path of a node inside a shadow root continues at the host.
//!
//! The page is shared behind a mutex. The lock is never held while calling into a
//! component or while awaiting, so components are free to use the page from
//! their lifecycle hooks.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::debug;
use url::Url;

use crate::component::{Component, CustomElementRegistry, ElementContext};
use crate::error::DomError;
use crate::signal::{Signal, SignalBus, SignalEvent, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The document node every page starts with.
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element { tag: String },
    Text(String),
    ShadowRoot { host: NodeId },
}

#[derive(Clone)]
struct Upgrade {
    component: Arc<dyn Component>,
    updates: Arc<watch::Sender<u64>>,
}

struct NodeData {
    kind: NodeKind,
    /// For shadow roots this is the host element.
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    shadow_root: Option<NodeId>,
    connected: bool,
    bus: Option<SignalBus>,
    upgrade: Option<Upgrade>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            shadow_root: None,
            connected: false,
            bus: None,
            upgrade: None,
        }
    }

    fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }
}

struct PageInner {
    nodes: Vec<NodeData>,
}

impl PageInner {
    fn node(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        NodeId(self.nodes.len() - 1)
    }

    /// `id` and everything below it, shadow trees included, in tree order.
    fn composed_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Ok(node) = self.node(current) else {
                continue;
            };
            out.push(current);
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
            if let Some(shadow) = node.shadow_root {
                stack.push(shadow);
            }
        }
        out
    }

    /// Light-tree descendants of `id`, excluding `id`, in tree order.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.node(id) {
            Ok(node) => node.children.iter().rev().copied().collect(),
            Err(_) => return out,
        };
        while let Some(current) = stack.pop() {
            if let Ok(node) = self.node(current) {
                out.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// The node itself, then every ancestor up to the root, hopping from shadow
    /// roots to their hosts.
    fn composed_path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Ok(node) = self.node(node_id) else {
                break;
            };
            path.push(node_id);
            current = node.parent;
        }
        path
    }
}

/// Shared handle to a page. Cloning is cheap and yields the same page.
#[derive(Clone)]
pub struct Page {
    inner: Arc<Mutex<PageInner>>,
    base_url: Arc<Url>,
    registry: Arc<CustomElementRegistry>,
}

impl Page {
    pub fn new(base_url: Url) -> Self {
        Self::with_registry(base_url, Arc::new(CustomElementRegistry::new()))
    }

    pub fn with_registry(base_url: Url, registry: Arc<CustomElementRegistry>) -> Self {
        let mut document = NodeData::new(NodeKind::Document);
        document.connected = true;
        Self {
            inner: Arc::new(Mutex::new(PageInner {
                nodes: vec![document],
            })),
            base_url: Arc::new(base_url),
            registry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a possibly relative reference against the page's base url.
    pub fn resolve_url(&self, reference: &str) -> Result<Url, DomError> {
        self.base_url
            .join(reference)
            .map_err(|e| DomError::InvalidUrl {
                url: reference.to_owned(),
                reason: e.to_string(),
            })
    }

    pub fn custom_elements(&self) -> &Arc<CustomElementRegistry> {
        &self.registry
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.lock().insert(NodeData::new(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        }))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.lock()
            .insert(NodeData::new(NodeKind::Text(text.to_owned())))
    }

    pub fn kind(&self, node: NodeId) -> Result<NodeKind, DomError> {
        Ok(self.lock().node(node)?.kind.clone())
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.lock()
            .node(node)
            .ok()
            .and_then(|n| n.tag().map(str::to_owned))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().node(node).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, DomError> {
        Ok(self.lock().node(node)?.children.clone())
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.lock().node(node).map(|n| n.connected).unwrap_or(false)
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut inner = self.lock();
        let data = inner.node_mut(node)?;
        if data.tag().is_none() {
            return Err(DomError::NotAnElement(node));
        }
        drop(data.attributes.insert(name.to_owned(), value.to_owned()));
        Ok(())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lock()
            .node(node)
            .ok()
            .and_then(|n| n.attributes.get(name).cloned())
    }

    /// Creates the isolation boundary of an element. An element hosts at most one.
    pub fn attach_shadow(&self, host: NodeId) -> Result<NodeId, DomError> {
        let mut inner = self.lock();
        let data = inner.node(host)?;
        if data.tag().is_none() {
            return Err(DomError::NotAnElement(host));
        }
        if data.shadow_root.is_some() {
            return Err(DomError::ShadowRootExists(host));
        }
        let connected = data.connected;

        let mut shadow = NodeData::new(NodeKind::ShadowRoot { host });
        shadow.parent = Some(host);
        shadow.connected = connected;
        let shadow_id = inner.insert(shadow);
        inner.node_mut(host)?.shadow_root = Some(shadow_id);
        Ok(shadow_id)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.lock().node(host).ok().and_then(|n| n.shadow_root)
    }

    /// Appends `child` under `parent`. Custom elements that become connected are
    /// upgraded: their first update cycle and their `connected` hook are scheduled
    /// on the current tokio runtime.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let scheduled = {
            let mut inner = self.lock();
            let parent_data = inner.node(parent)?;
            if matches!(parent_data.kind, NodeKind::Text(_)) {
                return Err(DomError::NotAContainer(parent));
            }
            let parent_connected = parent_data.connected;
            if inner.node(child)?.parent.is_some() || child == NodeId::ROOT {
                return Err(DomError::AlreadyAttached(child));
            }
            if inner.composed_path(parent).contains(&child) {
                return Err(DomError::Cycle(child));
            }

            let subtree = inner.composed_subtree(child);
            let to_upgrade: Vec<(NodeId, String)> = if parent_connected {
                subtree
                    .iter()
                    .filter_map(|id| {
                        let tag = inner.node(*id).ok()?.tag()?;
                        self.registry.is_defined(tag).then(|| (*id, tag.to_owned()))
                    })
                    .collect()
            } else {
                Vec::new()
            };
            let runtime = if to_upgrade.is_empty() {
                None
            } else {
                Some(Handle::try_current().map_err(|_| DomError::NoRuntime)?)
            };

            inner.node_mut(child)?.parent = Some(parent);
            inner.node_mut(parent)?.children.push(child);
            if parent_connected {
                for id in &subtree {
                    inner.node_mut(*id)?.connected = true;
                }
            }

            let mut scheduled = Vec::with_capacity(to_upgrade.len());
            for (id, tag) in to_upgrade {
                let data = inner.node_mut(id)?;
                if data.upgrade.is_none() {
                    let Some(factory) = self.registry.get(&tag) else {
                        continue;
                    };
                    debug!(element = %id, tag = %tag, "upgrading custom element");
                    data.upgrade = Some(Upgrade {
                        component: factory.create(),
                        updates: Arc::new(watch::channel(0).0),
                    });
                }
                if let Some(upgrade) = data.upgrade.clone() {
                    scheduled.push((id, upgrade));
                }
            }
            runtime.map(|runtime| (runtime, scheduled))
        };

        if let Some((runtime, scheduled)) = scheduled {
            for (id, upgrade) in scheduled {
                self.schedule_lifecycle(&runtime, id, upgrade);
            }
        }
        Ok(())
    }

    fn schedule_lifecycle(&self, runtime: &Handle, element: NodeId, upgrade: Upgrade) {
        let page = self.clone();
        let updates = upgrade.updates.clone();
        runtime.spawn(async move {
            tokio::task::yield_now().await;
            page.perform_update(element, &updates);
        });

        let ctx = ElementContext::new(self.clone(), element, upgrade.updates.subscribe());
        let component = upgrade.component;
        runtime.spawn(async move { component.connected(ctx).await });
    }

    /// One update cycle of an upgraded element: its render root exists once the
    /// cycle completes.
    fn perform_update(&self, element: NodeId, updates: &watch::Sender<u64>) {
        if self.shadow_root(element).is_none() {
            if let Err(e) = self.attach_shadow(element) {
                tracing::warn!(element = %element, "failed to create render root: {}", e);
                return;
            }
        }
        updates.send_modify(|completed| *completed += 1);
    }

    /// Removes `child` from `parent`. Upgraded elements in the removed subtree get
    /// their `disconnected` hook before the subtree is detached.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let disconnecting: Vec<(NodeId, Upgrade)> = {
            let inner = self.lock();
            if !inner.node(parent)?.children.contains(&child) {
                return Err(DomError::NotAChild { parent, child });
            }
            if !inner.node(child)?.connected {
                Vec::new()
            } else {
                inner
                    .composed_subtree(child)
                    .into_iter()
                    .filter_map(|id| Some((id, inner.node(id).ok()?.upgrade.clone()?)))
                    .collect()
            }
        };

        for (id, upgrade) in disconnecting {
            let ctx = ElementContext::new(self.clone(), id, upgrade.updates.subscribe());
            upgrade.component.disconnected(&ctx);
        }

        let mut inner = self.lock();
        let siblings = &mut inner.node_mut(parent)?.children;
        if let Some(position) = siblings.iter().position(|id| *id == child) {
            _ = siblings.remove(position);
        }
        inner.node_mut(child)?.parent = None;
        for id in inner.composed_subtree(child) {
            inner.node_mut(id)?.connected = false;
        }
        Ok(())
    }

    pub fn clear_children(&self, node: NodeId) -> Result<(), DomError> {
        for child in self.children(node)? {
            self.remove_child(node, child)?;
        }
        Ok(())
    }

    /// Concatenated text of the light-tree descendants of `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.lock();
        inner
            .descendants(node)
            .into_iter()
            .filter_map(|id| match &inner.node(id).ok()?.kind {
                NodeKind::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// First light-tree descendant of `scope` with the given tag name.
    pub fn query_selector(&self, scope: NodeId, tag: &str) -> Option<NodeId> {
        let tag = tag.to_ascii_lowercase();
        let inner = self.lock();
        inner
            .descendants(scope)
            .into_iter()
            .find(|id| inner.node(*id).ok().and_then(NodeData::tag) == Some(tag.as_str()))
    }

    /// Light-tree descendants of `scope` carrying `name="value"`.
    pub fn find_by_attribute(&self, scope: NodeId, name: &str, value: &str) -> Vec<NodeId> {
        let inner = self.lock();
        inner
            .descendants(scope)
            .into_iter()
            .filter(|id| {
                inner
                    .node(*id)
                    .ok()
                    .and_then(|n| n.attributes.get(name))
                    .is_some_and(|v| v == value)
            })
            .collect()
    }

    /// Listens for signals of `kind` raised at `node` or anywhere below it,
    /// shadow trees included.
    pub fn subscribe(
        &self,
        node: NodeId,
        kind: SignalKind,
    ) -> Result<broadcast::Receiver<SignalEvent>, DomError> {
        let mut inner = self.lock();
        let data = inner.node_mut(node)?;
        Ok(data.bus.get_or_insert_with(SignalBus::new).subscribe(kind))
    }

    /// Raises `signal` at `origin`. Every node of the composed path with
    /// listeners receives it, crossing shadow roots to their hosts.
    pub fn dispatch(&self, origin: NodeId, signal: Signal) {
        let buses: Vec<SignalBus> = {
            let inner = self.lock();
            inner
                .composed_path(origin)
                .into_iter()
                .filter_map(|id| inner.node(id).ok()?.bus.clone())
                .collect()
        };
        debug!(origin = %origin, kind = %signal.kind(), listeners = buses.len(), "dispatching signal");

        let event = SignalEvent::new(origin, signal);
        for bus in buses {
            bus.publish(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ErrorDetail, ReadyDetail};

    fn page() -> Page {
        Page::new(Url::parse("http://localhost:5173/").unwrap())
    }

    fn ready() -> Signal {
        Signal::Ready(ReadyDetail {
            app: "account-summary".to_owned(),
            version: "1.0.0".to_owned(),
        })
    }

    #[test]
    fn appending_connects_the_subtree() {
        let page = page();
        let outer = page.create_element("div");
        let inner = page.create_element("span");
        page.append_child(outer, inner).unwrap();
        assert!(!page.is_connected(inner));

        page.append_child(page.root(), outer).unwrap();
        assert!(page.is_connected(outer));
        assert!(page.is_connected(inner));

        page.remove_child(page.root(), outer).unwrap();
        assert!(!page.is_connected(inner));
        assert_eq!(page.parent(outer), None);
    }

    #[test]
    fn rejects_invalid_insertions() {
        let page = page();
        let a = page.create_element("div");
        let b = page.create_element("div");
        let text = page.create_text("hello");
        page.append_child(a, b).unwrap();

        assert_eq!(page.append_child(b, a), Err(DomError::Cycle(a)));
        assert_eq!(page.append_child(a, b), Err(DomError::AlreadyAttached(b)));
        assert_eq!(page.append_child(text, a), Err(DomError::NotAContainer(text)));
        assert_eq!(
            page.remove_child(page.root(), b),
            Err(DomError::NotAChild {
                parent: page.root(),
                child: b
            })
        );
        assert_eq!(
            page.set_attribute(text, "role", "alert"),
            Err(DomError::NotAnElement(text))
        );
    }

    #[test]
    fn queries_do_not_enter_shadow_roots() {
        let page = page();
        let host = page.create_element("kitx-widget");
        page.append_child(page.root(), host).unwrap();
        let shadow = page.attach_shadow(host).unwrap();
        let hidden = page.create_element("section");
        page.append_child(shadow, hidden).unwrap();
        page.append_child(hidden, page.create_text("secret")).unwrap();

        assert!(page.is_connected(hidden));
        assert_eq!(page.query_selector(page.root(), "section"), None);
        assert_eq!(page.query_selector(shadow, "section"), Some(hidden));
        assert_eq!(page.text_content(page.root()), "");
        assert_eq!(page.text_content(shadow), "secret");
        assert_eq!(
            page.attach_shadow(host),
            Err(DomError::ShadowRootExists(host))
        );
    }

    #[test]
    fn finds_nodes_by_attribute() {
        let page = page();
        let card = page.create_element("div");
        let alert = page.create_element("div");
        page.set_attribute(alert, "role", "alert").unwrap();
        page.append_child(card, alert).unwrap();

        assert_eq!(page.find_by_attribute(card, "role", "alert"), vec![alert]);
        assert!(page.find_by_attribute(card, "role", "region").is_empty());
        assert_eq!(page.attribute(alert, "role").as_deref(), Some("alert"));
    }

    #[test]
    fn signals_cross_shadow_roots_to_the_document() {
        let page = page();
        let host = page.create_element("kitx-widget");
        page.append_child(page.root(), host).unwrap();
        let shadow = page.attach_shadow(host).unwrap();
        let deep = page.create_element("div");
        page.append_child(shadow, deep).unwrap();

        let mut at_root = page.subscribe(page.root(), SignalKind::Ready).unwrap();
        let mut at_host = page.subscribe(host, SignalKind::Ready).unwrap();
        let mut errors = page.subscribe(page.root(), SignalKind::Error).unwrap();

        page.dispatch(deep, ready());

        let event = at_root.try_recv().unwrap();
        assert_eq!(event.origin, deep);
        assert_eq!(event.signal, ready());
        assert_eq!(at_host.try_recv().unwrap().origin, deep);
        assert!(errors.try_recv().is_err());
    }

    #[test]
    fn late_listeners_miss_earlier_signals() {
        let page = page();
        let el = page.create_element("div");
        page.append_child(page.root(), el).unwrap();

        page.dispatch(
            el,
            Signal::Error(ErrorDetail {
                error: "boom".to_owned(),
            }),
        );
        let mut late = page.subscribe(page.root(), SignalKind::Error).unwrap();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn resolves_relative_urls_against_the_base() {
        let page = page();
        assert_eq!(
            page.resolve_url("/config.json").unwrap().as_str(),
            "http://localhost:5173/config.json"
        );
        assert_eq!(
            page.resolve_url("http://localhost:8081/config.json")
                .unwrap()
                .as_str(),
            "http://localhost:8081/config.json"
        );
    }
}
