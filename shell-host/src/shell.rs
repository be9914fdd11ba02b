//! Embedding widgets into a page.
use miniapp_sdk::{
    emit_error, NodeId, Page, APP_ID_ATTRIBUTE, CONFIG_URL_ATTRIBUTE, VERSION_ATTRIBUTE,
};
use tracing::{error, info, instrument};

use crate::error::ShellError;
use crate::resolver::{LoadCandidate, ModuleResolver, Resolution};

/// Per-instance attributes the shell hands to a widget.
#[derive(Debug, Clone)]
pub struct WidgetOptions {
    pub version: String,
    pub app_id: String,
}

/// A widget attached to the page.
#[derive(Debug)]
pub struct AttachedWidget {
    pub element: NodeId,
    pub resolution: Resolution,
}

pub struct Shell {
    page: Page,
    resolver: ModuleResolver,
}

impl Shell {
    pub fn new(page: Page, resolver: ModuleResolver) -> Self {
        Self { page, resolver }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Loads the widget from the first working candidate and attaches it to
    /// `container`.
    ///
    /// A failure is logged and raised as an ERROR signal on `container`, once,
    /// and no element is created.
    #[instrument(skip_all, fields(container = %container))]
    pub async fn load_widget(
        &self,
        container: NodeId,
        candidates: &[LoadCandidate],
        options: &WidgetOptions,
    ) -> Result<AttachedWidget, ShellError> {
        let result = self.try_load_widget(container, candidates, options).await;
        if let Err(e) = &result {
            error!("failed to load widget: {}", e);
            emit_error(&self.page, container, e);
        }
        result
    }

    /// Like [`Shell::load_widget`], for hosts that carry on without the widget.
    pub async fn load_widget_or_report(
        &self,
        container: NodeId,
        candidates: &[LoadCandidate],
        options: &WidgetOptions,
    ) -> Option<AttachedWidget> {
        self.load_widget(container, candidates, options).await.ok()
    }

    async fn try_load_widget(
        &self,
        container: NodeId,
        candidates: &[LoadCandidate],
        options: &WidgetOptions,
    ) -> Result<AttachedWidget, ShellError> {
        let resolution = self.resolver.resolve(candidates).await?;
        let module = &resolution.module;
        let tag = module.bundle.element();

        let registry = self.page.custom_elements();
        if !registry.is_defined(tag) {
            module.bundle.register(registry, &module.url)?;
        }

        // Attributes go on before the element connects, so the widget sees them
        // when it upgrades.
        let element = self.page.create_element(tag);
        self.page
            .set_attribute(element, CONFIG_URL_ATTRIBUTE, resolution.config_url.as_str())?;
        self.page
            .set_attribute(element, VERSION_ATTRIBUTE, &options.version)?;
        self.page.set_attribute(element, APP_ID_ATTRIBUTE, &options.app_id)?;
        self.page.append_child(container, element)?;

        info!(
            element = %element,
            tag = %tag,
            config_url = %resolution.config_url,
            "widget attached"
        );
        Ok(AttachedWidget {
            element,
            resolution,
        })
    }
}
