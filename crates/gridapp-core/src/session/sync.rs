use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::HubError;
use crate::hub::{OnSnapshot, SignalChannel, Subscription, Topic};
use crate::snapshot::{ItemId, SessionSnapshot};

type Projection = Arc<watch::Sender<Option<SessionSnapshot>>>;

/// Owns a [`Subscription`] and stops it exactly once, at the latest on drop.
pub struct SubscriptionGuard {
    topic: Topic,
    inner: Box<dyn Subscription>,
    active: Arc<AtomicBool>,
}

impl SubscriptionGuard {
    pub fn new(topic: Topic, inner: Box<dyn Subscription>) -> Self {
        Self::with_flag(topic, inner, Arc::new(AtomicBool::new(true)))
    }

    fn with_flag(topic: Topic, inner: Box<dyn Subscription>, active: Arc<AtomicBool>) -> Self {
        Self {
            topic,
            inner,
            active,
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.inner.stop();
            debug!(target: "gridapp::sync", topic = %self.topic, "Subscription stopped");
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Live mirror of remote session state, one subscription per topic.
///
/// Each update replaces the topic's snapshot wholesale. After
/// [`shutdown`](Self::shutdown) every subscription is stopped, late
/// subscribe results are released on arrival and late updates are ignored.
#[derive(Clone)]
pub struct SessionStateSync {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    live: Arc<AtomicBool>,
    state: Mutex<SyncState>,
}

#[derive(Default)]
struct SyncState {
    subscriptions: HashMap<Topic, SubscriptionGuard>,
    projections: HashMap<Topic, Projection>,
}

impl SyncState {
    fn projection(&mut self, topic: &Topic) -> Projection {
        self.projections
            .entry(topic.clone())
            .or_insert_with(|| Arc::new(watch::channel(None).0))
            .clone()
    }
}

impl Default for SessionStateSync {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateSync {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SyncInner {
                live: Arc::new(AtomicBool::new(true)),
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_live(&self) -> bool {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Subscribes to `topic` on `signals`, replacing any existing
    /// subscription for that topic.
    ///
    /// A failure is logged here and leaves the current snapshot untouched.
    /// Subscribing after shutdown is a no-op.
    pub async fn subscribe(
        &self,
        signals: &Arc<dyn SignalChannel>,
        topic: Topic,
    ) -> Result<(), HubError> {
        let (projection, previous) = {
            let mut state = self.lock();
            if !self.is_live() {
                debug!(target: "gridapp::sync", topic = %topic, "Sync stopped, not subscribing");
                return Ok(());
            }
            (state.projection(&topic), state.subscriptions.remove(&topic))
        };

        if let Some(previous) = previous {
            previous.stop();
        }

        let active = Arc::new(AtomicBool::new(true));
        let on_update: OnSnapshot = {
            let active = active.clone();
            let live = self.inner.live.clone();
            Arc::new(move |snapshot| {
                if active.load(Ordering::SeqCst) && live.load(Ordering::SeqCst) {
                    projection.send_replace(Some(snapshot));
                }
            })
        };

        let subscription = match signals.subscribe(topic.clone(), on_update).await {
            Ok(subscription) => subscription,
            Err(e) => {
                active.store(false, Ordering::SeqCst);
                warn!(
                    target: "gridapp::sync",
                    topic = %topic,
                    error = %e,
                    "Failed to subscribe to session state"
                );
                return Err(e);
            }
        };

        let guard = SubscriptionGuard::with_flag(topic.clone(), subscription, active);

        let mut state = self.lock();
        if !self.is_live() {
            drop(state);
            debug!(
                target: "gridapp::sync",
                topic = %topic,
                "Sync stopped while subscribing, releasing subscription"
            );
            guard.stop();
            return Ok(());
        }
        let displaced = state.subscriptions.insert(topic.clone(), guard);
        drop(state);

        if let Some(displaced) = displaced {
            displaced.stop();
        }

        debug!(target: "gridapp::sync", topic = %topic, "Subscribed to session state");
        Ok(())
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.lock()
            .subscriptions
            .get(topic)
            .is_some_and(SubscriptionGuard::is_active)
    }

    /// Latest snapshot for `topic`, if any update has arrived.
    pub fn snapshot(&self, topic: &Topic) -> Option<SessionSnapshot> {
        self.lock()
            .projections
            .get(topic)
            .and_then(|p| p.borrow().clone())
    }

    pub fn quantity_of(&self, topic: &Topic, item: &ItemId) -> u32 {
        self.snapshot(topic)
            .map_or(0, |snapshot| snapshot.quantity_of(item))
    }

    pub fn watch(&self, topic: &Topic) -> watch::Receiver<Option<SessionSnapshot>> {
        self.lock().projection(topic).subscribe()
    }

    /// Stops every subscription and refuses new ones. Idempotent.
    pub fn shutdown(&self) {
        let guards: Vec<SubscriptionGuard> = {
            let mut state = self.lock();
            self.inner.live.store(false, Ordering::SeqCst);
            state.subscriptions.drain().map(|(_, guard)| guard).collect()
        };

        for guard in &guards {
            guard.stop();
        }
    }
}
