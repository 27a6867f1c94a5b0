use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{ClientHandle, HubConnector, OnSnapshot, SignalChannel, SignalEvent, Subscription, Topic};
use crate::dev_mode::load_fallback_settings;
use crate::error::{FallbackError, HubError};
use crate::settings::Settings;
use crate::snapshot::SessionSnapshot;

/// In-process hub runtime.
///
/// Cart-add signals update a shared cart and push the new snapshot to every
/// live `cart` subscriber, so a single process can exercise the full
/// connect/subscribe/emit loop without an external runtime.
#[derive(Clone)]
pub struct LocalHub {
    inner: Arc<LocalHubInner>,
}

struct LocalHubInner {
    settings: Settings,
    /// Held across snapshot callbacks, taken before `state`. Keeps
    /// subscribers seeing cart snapshots in the order they were produced.
    delivery: Mutex<()>,
    state: Mutex<LocalHubState>,
}

#[derive(Default)]
struct LocalHubState {
    next_id: u64,
    open_handles: usize,
    cart: SessionSnapshot,
    subscribers: BTreeMap<u64, Subscriber>,
    journal: Vec<SignalEvent>,
}

struct Subscriber {
    handle_id: u64,
    topic: Topic,
    on_update: OnSnapshot,
}

impl LocalHub {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(LocalHubInner {
                settings,
                delivery: Mutex::new(()),
                state: Mutex::new(LocalHubState::default()),
            }),
        }
    }

    /// Hub serving the settings from a settings document.
    pub fn from_settings_file(path: &Path) -> Result<Self, FallbackError> {
        load_fallback_settings(path).map(Self::new)
    }

    /// Every event emitted through any channel, in emission order.
    pub fn emitted(&self) -> Vec<SignalEvent> {
        self.lock().journal.clone()
    }

    pub fn cart(&self) -> SessionSnapshot {
        self.lock().cart.clone()
    }

    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    pub fn live_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, LocalHubState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver_in_order(&self) -> MutexGuard<'_, ()> {
        self.inner
            .delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: SignalEvent) {
        let _delivery = self.deliver_in_order();
        let (snapshot, listeners) = {
            let mut state = self.lock();
            state.journal.push(event.clone());

            let SignalEvent::CartAdd {
                product_id,
                quantity,
            } = event
            else {
                return;
            };

            state.cart.add(product_id, quantity);
            let listeners: Vec<OnSnapshot> = state
                .subscribers
                .values()
                .filter(|s| s.topic.as_str() == Topic::CART)
                .map(|s| s.on_update.clone())
                .collect();
            (state.cart.clone(), listeners)
        };

        for on_update in listeners {
            on_update(snapshot.clone());
        }
    }

    fn release_handle(&self, handle_id: u64) {
        let mut state = self.lock();
        state.subscribers.retain(|_, s| s.handle_id != handle_id);
        state.open_handles = state.open_handles.saturating_sub(1);
        debug!(
            target: "gridapp::local_hub",
            handle_id,
            open_handles = state.open_handles,
            "Released client handle"
        );
    }
}

#[async_trait]
impl HubConnector for LocalHub {
    async fn connect(&self) -> Result<Arc<dyn ClientHandle>, HubError> {
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            state.open_handles += 1;
            state.next_id
        };
        debug!(target: "gridapp::local_hub", handle_id = id, "Opened client handle");

        Ok(Arc::new(LocalClientHandle {
            hub: self.clone(),
            id,
            released: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct LocalClientHandle {
    hub: LocalHub,
    id: u64,
    released: Arc<AtomicBool>,
}

impl LocalClientHandle {
    fn ensure_open(&self) -> Result<(), HubError> {
        if self.released.load(Ordering::SeqCst) {
            Err(HubError::Released)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ClientHandle for LocalClientHandle {
    async fn get_settings(&self) -> Result<Settings, HubError> {
        self.ensure_open()?;
        Ok(self.hub.inner.settings.clone())
    }

    async fn initialize_signals(&self) -> Result<Arc<dyn SignalChannel>, HubError> {
        self.ensure_open()?;
        Ok(Arc::new(LocalSignalChannel {
            hub: self.hub.clone(),
            handle_id: self.id,
            released: self.released.clone(),
        }))
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.hub.release_handle(self.id);
        }
    }
}

struct LocalSignalChannel {
    hub: LocalHub,
    handle_id: u64,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl SignalChannel for LocalSignalChannel {
    async fn emit(&self, event: SignalEvent) -> Result<(), HubError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(HubError::ChannelClosed);
        }
        self.hub.record(event);
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: Topic,
        on_update: OnSnapshot,
    ) -> Result<Box<dyn Subscription>, HubError> {
        let _delivery = self.hub.deliver_in_order();
        let (id, initial) = {
            let mut state = self.hub.lock();
            if self.released.load(Ordering::SeqCst) {
                return Err(HubError::ChannelClosed);
            }
            state.next_id += 1;
            let id = state.next_id;
            let initial = (topic.as_str() == Topic::CART).then(|| state.cart.clone());
            state.subscribers.insert(
                id,
                Subscriber {
                    handle_id: self.handle_id,
                    topic,
                    on_update: on_update.clone(),
                },
            );
            (id, initial)
        };

        if let Some(snapshot) = initial {
            on_update(snapshot);
        }

        Ok(Box::new(LocalSubscription {
            hub: self.hub.clone(),
            id,
        }))
    }
}

struct LocalSubscription {
    hub: LocalHub,
    id: u64,
}

impl Subscription for LocalSubscription {
    fn stop(&self) {
        self.hub.lock().subscribers.remove(&self.id);
    }
}
