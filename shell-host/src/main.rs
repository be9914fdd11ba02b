//! Load the account summary widget into a page and report what it signals.
use std::sync::Arc;

use envconfig::Envconfig;
use eyre::Result;
use miniapp_account_summary::AccountSummaryBundle;
use miniapp_sdk::{BundleCatalog, Page, Signal, SignalKind};
use tracing_subscriber::EnvFilter;

use shell_host::config::Config;
use shell_host::events::EventLog;
use shell_host::loader::HttpModuleLoader;
use shell_host::resolver::ModuleResolver;
use shell_host::shell::{Shell, WidgetOptions};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::init_from_env()?;

    let catalog = BundleCatalog::new().with_bundle(Arc::new(AccountSummaryBundle::new(
        config.config_timeout_ms.0,
    )?));
    let client = reqwest::Client::builder().user_agent("shell-host").build()?;
    let resolver = ModuleResolver::new(
        Arc::new(HttpModuleLoader::new(client, catalog)),
        config.load_timeout_ms.0,
    );

    let page = Page::new(config.shell_origin.clone());
    let events = EventLog::attach(&page)?;
    let mut health = page.subscribe(page.root(), SignalKind::Health)?;
    let container = page.create_element("main");
    page.append_child(page.root(), container)?;

    let shell = Shell::new(page, resolver);
    let options = WidgetOptions {
        version: config.widget_version.clone(),
        app_id: config.app_id.clone(),
    };

    let deadline = tokio::time::Instant::now() + config.health_wait_ms.0;
    let expected = match shell
        .load_widget_or_report(container, &config.shell_candidates.0, &options)
        .await
    {
        None => {
            tracing::warn!("continuing without the widget");
            SignalKind::Error
        }
        Some(widget) => {
            match tokio::time::timeout_at(deadline, health.recv()).await {
                Ok(Ok(event)) => match event.signal {
                    Signal::Health(status) if status.ok => {
                        tracing::info!(element = %widget.element, "widget is healthy")
                    }
                    _ => tracing::warn!(element = %widget.element, "widget reported unhealthy"),
                },
                Ok(Err(e)) => tracing::warn!("stopped listening for health: {}", e),
                Err(_) => tracing::warn!(
                    "no health report within {:?}",
                    config.health_wait_ms.0
                ),
            }
            SignalKind::Health
        }
    };

    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
    if !events.wait_for(expected, remaining).await {
        tracing::warn!(kind = %expected, "event log has no entry for the last signal");
    }
    for line in events.lines() {
        println!("{line}");
    }

    Ok(())
}
