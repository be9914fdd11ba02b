//! Host-side record of the signals widgets raise.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use miniapp_sdk::{DomError, Page, SignalEvent, SignalKind};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Listens at the document root for every signal kind and keeps one line per
/// signal, in arrival order per kind.
pub struct EventLog {
    records: Arc<Records>,
    listeners: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Records {
    entries: Mutex<Vec<(SignalKind, String)>>,
    recorded: Notify,
}

impl Records {
    fn entries(&self) -> MutexGuard<'_, Vec<(SignalKind, String)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, kind: SignalKind, line: String) {
        self.entries().push((kind, line));
        self.recorded.notify_waiters();
    }

    fn contains(&self, kind: SignalKind) -> bool {
        self.entries().iter().any(|(recorded, _)| *recorded == kind)
    }
}

impl EventLog {
    /// Must be called from within a tokio runtime.
    pub fn attach(page: &Page) -> Result<Self, DomError> {
        let records = Arc::new(Records::default());
        let mut listeners = Vec::with_capacity(SignalKind::ALL.len());

        for kind in SignalKind::ALL {
            let mut rx = page.subscribe(page.root(), kind)?;
            let records = records.clone();
            listeners.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            let line = format_line(&event);
                            info!(kind = %event.kind(), origin = %event.origin, "{}", line);
                            records.push(kind, line);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(kind = %kind, skipped, "event log fell behind");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }));
        }

        Ok(Self { records, listeners })
    }

    pub fn lines(&self) -> Vec<String> {
        self.records
            .entries()
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Waits until a `kind` signal has been recorded. Returns false if none was
    /// within `timeout`.
    pub async fn wait_for(&self, kind: SignalKind, timeout: Duration) -> bool {
        let recorded = async {
            loop {
                let notified = self.records.recorded.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.records.contains(kind) {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, recorded).await.is_ok()
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

pub fn format_line(event: &SignalEvent) -> String {
    let label = match event.kind() {
        SignalKind::Ready => "READY",
        SignalKind::Health => "HEALTH",
        SignalKind::Error => "ERROR",
    };
    format!("{} → {}", label, event.signal.detail())
}
