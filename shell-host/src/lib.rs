//! A shell that locates widget bundles at runtime and embeds them into its page.
pub mod config;
pub mod error;
pub mod events;
pub mod loader;
pub mod resolver;
pub mod shell;
