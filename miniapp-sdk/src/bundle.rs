use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::component::CustomElementRegistry;
use crate::error::DomError;

/// Absolute or page-relative url of the widget's configuration document.
pub const CONFIG_URL_ATTRIBUTE: &str = "config-url";
pub const VERSION_ATTRIBUTE: &str = "version";
pub const APP_ID_ATTRIBUTE: &str = "app-id";

/// Describes a published widget bundle. Served by the widget next to its
/// assets and read by shells when loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Name of the bundle in the shell's [`BundleCatalog`].
    pub bundle: String,
    /// Custom element the bundle defines.
    pub element: String,
    pub version: String,
}

/// An independently built widget that can be activated on a page.
pub trait WidgetBundle: Send + Sync {
    fn name(&self) -> &str;

    /// Custom element name the bundle defines.
    fn element(&self) -> &str;

    /// Defines the bundle's element. `module_url` is where the bundle was loaded
    /// from; relative assets resolve against it.
    fn register(&self, registry: &CustomElementRegistry, module_url: &Url) -> Result<(), DomError>;
}

/// Bundles a shell is able to activate, keyed by name.
#[derive(Default, Clone)]
pub struct BundleCatalog {
    bundles: HashMap<String, Arc<dyn WidgetBundle>>,
}

impl BundleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bundle(mut self, bundle: Arc<dyn WidgetBundle>) -> Self {
        drop(self.bundles.insert(bundle.name().to_owned(), bundle));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WidgetBundle>> {
        self.bundles.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl WidgetBundle for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn element(&self) -> &str {
            "kitx-account-summary"
        }

        fn register(&self, _: &CustomElementRegistry, _: &Url) -> Result<(), DomError> {
            Ok(())
        }
    }

    #[test]
    fn catalog_is_keyed_by_bundle_name() {
        let catalog = BundleCatalog::new();
        assert!(catalog.is_empty());

        let catalog = catalog
            .with_bundle(Arc::new(Named("account-summary")))
            .with_bundle(Arc::new(Named("transactions")));
        assert!(!catalog.is_empty());
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("account-summary").map(|b| b.name().to_owned()),
            Some("account-summary".to_owned())
        );
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn a_later_bundle_replaces_one_with_the_same_name() {
        let catalog = BundleCatalog::new()
            .with_bundle(Arc::new(Named("account-summary")))
            .with_bundle(Arc::new(Named("account-summary")));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn manifest_uses_plain_field_names() {
        let manifest: BundleManifest = serde_json::from_str(
            r#"{"bundle":"account-summary","element":"kitx-account-summary","version":"1.0.0"}"#,
        )
        .unwrap();
        assert_eq!(manifest.bundle, "account-summary");
        assert_eq!(manifest.element, "kitx-account-summary");
    }
}
