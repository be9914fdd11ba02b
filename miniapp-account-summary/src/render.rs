//! The rendering layer the bridge drives. A [`RenderRoot`] owns exactly one
//! container node and never touches anything outside of it.
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use miniapp_sdk::{DomError, NodeId, Page};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Something that can be rendered into a container.
pub trait View: Send + Sync {
    fn render(&self, scope: &RenderScope) -> Result<(), DomError>;
}

/// Handed to views while rendering: the container and a way to run effects
/// that live exactly as long as the mount.
#[derive(Clone)]
pub struct RenderScope {
    page: Page,
    container: NodeId,
    effects: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RenderScope {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn spawn_effect<F>(&self, effect: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no runtime available, render effect skipped");
            return;
        };
        let handle = runtime.spawn(effect);
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    fn abort_effects(&self) {
        let effects = std::mem::take(
            &mut *self.effects.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for effect in effects {
            effect.abort();
        }
    }
}

pub struct RenderRoot {
    scope: RenderScope,
    mounted: bool,
}

impl RenderRoot {
    pub fn create(page: Page, container: NodeId) -> Self {
        Self {
            scope: RenderScope {
                page,
                container,
                effects: Default::default(),
            },
            mounted: false,
        }
    }

    pub fn container(&self) -> NodeId {
        self.scope.container
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Replaces whatever is rendered in the container with `view`.
    pub fn render(&mut self, view: &dyn View) -> Result<(), DomError> {
        self.unmount();
        view.render(&self.scope)?;
        self.mounted = true;
        Ok(())
    }

    /// Stops effects and empties the container. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        self.scope.abort_effects();
        if let Err(e) = self.scope.page.clear_children(self.scope.container) {
            tracing::warn!("failed to clear render container: {}", e);
        }
        self.mounted = false;
    }
}

impl Drop for RenderRoot {
    fn drop(&mut self) {
        self.scope.abort_effects();
    }
}
