use std::sync::{Arc, OnceLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::hub::{SignalChannel, SignalEvent};
use crate::settings::Settings;

/// Fire-and-forget sender for outbound signals.
///
/// Events go through one queue drained by a single delivery task, so they
/// reach the signal channel in the order they were emitted. Without a
/// channel every emission is a no-op. Failures reported by the channel are
/// logged and dropped; nothing is retried.
#[derive(Clone, Default)]
pub struct Emitter {
    queue: Option<mpsc::UnboundedSender<SignalEvent>>,
}

impl Emitter {
    /// Starts the delivery task for `signals` on the current runtime.
    pub fn start(signals: Arc<dyn SignalChannel>) -> Self {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                target: "gridapp::signals",
                "No async runtime to deliver signals, emissions are disabled"
            );
            return Self::default();
        };

        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(deliver(signals, rx));
        Self { queue: Some(tx) }
    }

    pub fn is_connected(&self) -> bool {
        self.queue.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn emit(&self, event: SignalEvent) {
        let Some(queue) = &self.queue else {
            debug!(
                target: "gridapp::signals",
                kind = event.kind(),
                "Signals unavailable, dropping event"
            );
            return;
        };

        if let Err(mpsc::error::SendError(event)) = queue.send(event) {
            debug!(
                target: "gridapp::signals",
                kind = event.kind(),
                "Signal delivery stopped, dropping event"
            );
        }
    }
}

async fn deliver(signals: Arc<dyn SignalChannel>, mut queue: mpsc::UnboundedReceiver<SignalEvent>) {
    while let Some(event) = queue.recv().await {
        let kind = event.kind();
        match signals.emit(event).await {
            Ok(()) => debug!(target: "gridapp::signals", kind, "Emitted signal"),
            Err(e) => warn!(
                target: "gridapp::signals",
                kind,
                error = %e,
                "Failed to emit signal"
            ),
        }
    }
    debug!(target: "gridapp::signals", "Signal delivery finished");
}

/// Decides the single content-view emission of a mount: the first time
/// settings carry a product name.
#[derive(Debug, Default)]
pub struct ContentViewGate {
    sent: OnceLock<SignalEvent>,
}

impl ContentViewGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content-view event to send, at most once per gate.
    pub fn observe(&self, settings: &Settings) -> Option<SignalEvent> {
        let title = settings.product_name()?;
        let event = SignalEvent::ContentView {
            title: title.to_string(),
        };
        self.sent.set(event.clone()).ok().map(|()| event)
    }

    pub fn sent(&self) -> Option<&SignalEvent> {
        self.sent.get()
    }
}
