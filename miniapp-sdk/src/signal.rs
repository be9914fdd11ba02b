//! Lifecycle signals raised by widgets and observed by their hosts.
//!
//! Signals are one-directional and fire-and-forget: a widget raises them on its
//! own element, the page delivers them to every node of the composed path (see
//! [`crate::dom::Page::dispatch`]), and nobody answers. A listener only sees
//! signals raised after it subscribed.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::dom::NodeId;

/// Capacity of each per-kind channel on a [`SignalBus`].
const BUS_CAPACITY: usize = 64;

static SIGNAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// The closed set of signals a widget can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Ready,
    Health,
    Error,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Ready, SignalKind::Health, SignalKind::Error];

    /// Event name used on the wire and in host logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Ready => "miniapp:ready",
            SignalKind::Health => "miniapp:health",
            SignalKind::Error => "miniapp:error",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyDetail {
    pub app: String,
    pub version: String,
}

/// Point-in-time health report of a widget instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub app: String,
    pub version: String,
    pub ok: bool,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl HealthStatus {
    pub fn healthy(app: &str, version: &str) -> Self {
        Self {
            app: app.to_owned(),
            version: version.to_owned(),
            ok: true,
            timestamp: now_millis(),
            details: None,
        }
    }

    pub fn unhealthy(app: &str, version: &str, error: &str) -> Self {
        let details = HashMap::from([("error".to_owned(), Value::String(error.to_owned()))]);
        Self {
            app: app.to_owned(),
            version: version.to_owned(),
            ok: false,
            timestamp: now_millis(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub error: String,
}

/// A signal together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Ready(ReadyDetail),
    Health(HealthStatus),
    Error(ErrorDetail),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Ready(_) => SignalKind::Ready,
            Signal::Health(_) => SignalKind::Health,
            Signal::Error(_) => SignalKind::Error,
        }
    }

    /// The payload as JSON, shaped like the `detail` of the dispatched event.
    pub fn detail(&self) -> Value {
        let detail = match self {
            Signal::Ready(detail) => serde_json::to_value(detail),
            Signal::Health(status) => serde_json::to_value(status),
            Signal::Error(detail) => serde_json::to_value(detail),
        };
        // The payload types only hold strings, numbers and JSON values.
        detail.unwrap_or(Value::Null)
    }
}

/// A signal as observed by a listener: what was raised, and where.
///
/// `seq` grows monotonically across the process, so listeners subscribed to
/// several kinds can restore the order signals were raised in.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub seq: u64,
    pub origin: NodeId,
    pub signal: Signal,
}

impl SignalEvent {
    pub fn new(origin: NodeId, signal: Signal) -> Self {
        Self {
            seq: SIGNAL_SEQ.fetch_add(1, Ordering::Relaxed),
            origin,
            signal,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.signal.kind()
    }
}

/// Broadcast bus with one channel per [`SignalKind`].
///
/// Publishing never blocks and never fails: with no receivers the event is
/// dropped. Receivers only observe events sent after they subscribed.
#[derive(Clone, Debug)]
pub struct SignalBus {
    ready: broadcast::Sender<SignalEvent>,
    health: broadcast::Sender<SignalEvent>,
    error: broadcast::Sender<SignalEvent>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self {
            ready: broadcast::channel(BUS_CAPACITY).0,
            health: broadcast::channel(BUS_CAPACITY).0,
            error: broadcast::channel(BUS_CAPACITY).0,
        }
    }

    fn sender(&self, kind: SignalKind) -> &broadcast::Sender<SignalEvent> {
        match kind {
            SignalKind::Ready => &self.ready,
            SignalKind::Health => &self.health,
            SignalKind::Error => &self.error,
        }
    }

    pub fn publish(&self, event: SignalEvent) {
        drop(self.sender(event.kind()).send(event));
    }

    pub fn subscribe(&self, kind: SignalKind) -> broadcast::Receiver<SignalEvent> {
        self.sender(kind).subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn kinds_have_stable_event_names() {
        assert_eq!(SignalKind::Ready.as_str(), "miniapp:ready");
        assert_eq!(SignalKind::Health.as_str(), "miniapp:health");
        assert_eq!(SignalKind::Error.to_string(), "miniapp:error");
    }

    #[test]
    fn healthy_status_omits_details() {
        let status = HealthStatus {
            timestamp: 1700000000000,
            ..HealthStatus::healthy("account-summary", "1.0.0")
        };
        assert_json_eq!(
            Signal::Health(status).detail(),
            json!({
                "app": "account-summary",
                "version": "1.0.0",
                "ok": true,
                "timestamp": 1700000000000i64,
            })
        );
    }

    #[test]
    fn unhealthy_status_carries_the_error() {
        let status = HealthStatus::unhealthy("account-summary", "2.0.0", "connection refused");
        assert!(!status.ok);
        assert_eq!(
            status.details.unwrap().get("error"),
            Some(&json!("connection refused"))
        );
    }

    #[tokio::test]
    async fn bus_routes_by_kind_and_does_not_replay() {
        let bus = SignalBus::new();
        let event = SignalEvent::new(
            NodeId::ROOT,
            Signal::Error(ErrorDetail {
                error: "boom".to_owned(),
            }),
        );

        // Nobody listening yet: dropped.
        bus.publish(event.clone());

        let mut errors = bus.subscribe(SignalKind::Error);
        let mut ready = bus.subscribe(SignalKind::Ready);
        assert!(errors.try_recv().is_err());

        bus.publish(event.clone());
        assert_eq!(errors.try_recv().unwrap(), event);
        assert!(ready.try_recv().is_err());
    }
}
