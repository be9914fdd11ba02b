use miniapp_sdk::{DomError, NodeId, Page};

use crate::gateway::{GatewayClient, GatewayError, SummaryData};
use crate::render::{RenderScope, View};
use crate::runtime_config::WidgetConfig;

/// Card showing the account owner and balance, loaded from the gateway.
pub struct AccountSummary {
    config: WidgetConfig,
    gateway: GatewayClient,
}

impl AccountSummary {
    pub fn new(config: WidgetConfig, gateway: GatewayClient) -> Self {
        Self { config, gateway }
    }
}

impl View for AccountSummary {
    fn render(&self, scope: &RenderScope) -> Result<(), DomError> {
        let page = scope.page();
        let card = element(
            page,
            "div",
            &[
                ("class", "card"),
                ("role", "region"),
                ("aria-label", "Account summary"),
            ],
            None,
        )?;
        page.append_child(scope.container(), card)?;

        let header = element(page, "div", &[("class", "header")], Some(self.config.app_name.as_str()))?;
        page.append_child(card, header)?;
        let loading = element(page, "div", &[], Some("Loading…"))?;
        page.append_child(card, loading)?;

        let page = page.clone();
        let gateway = self.gateway.clone();
        let config = self.config.clone();
        scope.spawn_effect(async move {
            let result = gateway.fetch_summary().await;
            if let Err(e) = &result {
                tracing::warn!(endpoint = gateway.endpoint(), "account summary query failed: {}", e);
            }
            if let Err(e) = show_result(&page, card, loading, &config, result) {
                tracing::warn!("failed to render account summary: {}", e);
            }
        });
        Ok(())
    }
}

fn show_result(
    page: &Page,
    card: NodeId,
    loading: NodeId,
    config: &WidgetConfig,
    result: Result<SummaryData, GatewayError>,
) -> Result<(), DomError> {
    page.remove_child(card, loading)?;

    match result {
        Err(e) => {
            let message = format!("Error: {e}");
            let alert = element(page, "div", &[("role", "alert")], Some(message.as_str()))?;
            page.append_child(card, alert)
        }
        Ok(data) => {
            let balance = format!("$ {}", format_amount(data.account.balance));
            let owner = format!("Owner: {}", data.me.name);
            let version = format!("Version: {}", config.version);
            for (class, text) in [("balance", balance), ("meta", owner), ("meta", version)] {
                let node = element(page, "div", &[("class", class)], Some(text.as_str()))?;
                page.append_child(card, node)?;
            }
            Ok(())
        }
    }
}

fn element(
    page: &Page,
    tag: &str,
    attributes: &[(&str, &str)],
    text: Option<&str>,
) -> Result<NodeId, DomError> {
    let node = page.create_element(tag);
    for (name, value) in attributes {
        page.set_attribute(node, name, value)?;
    }
    if let Some(text) = text {
        page.append_child(node, page.create_text(text))?;
    }
    Ok(node)
}

/// Formats an amount the way `en-US` locales do: grouped thousands, at most
/// three fraction digits.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.3}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && (integer != "0" || !fraction.is_empty()) {
        "-"
    } else {
        ""
    };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    }
}
