use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gridapp_core::hub::OnSnapshot;
use gridapp_core::{
    ClientHandle, HubConnector, HubError, SessionSnapshot, Settings, SignalChannel, SignalEvent,
    Subscription, Topic,
};
use tokio::sync::watch;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Blocks a scripted step until released.
#[derive(Clone)]
pub struct Gate(Arc<watch::Sender<bool>>);

impl Gate {
    pub fn open() -> Self {
        Self(Arc::new(watch::channel(true).0))
    }

    pub fn closed() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }

    pub fn release(&self) {
        self.0.send_replace(true);
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

pub struct ScriptConfig {
    pub settings: Result<Settings, HubError>,
    pub connect_error: Option<HubError>,
    pub signals_error: Option<HubError>,
    pub subscribe_error: Option<HubError>,
    pub emit_error: Option<HubError>,
    pub connect_gate: Gate,
    pub signals_gate: Gate,
    pub settings_gate: Gate,
    pub subscribe_gate: Gate,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            settings: Ok(Settings::new("Lamp", "10 USD")),
            connect_error: None,
            signals_error: None,
            subscribe_error: None,
            emit_error: None,
            connect_gate: Gate::open(),
            signals_gate: Gate::open(),
            settings_gate: Gate::open(),
            subscribe_gate: Gate::open(),
        }
    }
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    handles_created: AtomicUsize,
    releases: AtomicUsize,
    signal_inits: AtomicUsize,
    settings_fetches: AtomicUsize,
    subscribes: AtomicUsize,
    stops: AtomicUsize,
}

struct Listener {
    topic: Topic,
    on_update: OnSnapshot,
    stopped: Arc<AtomicBool>,
}

struct ScriptInner {
    config: ScriptConfig,
    counters: Counters,
    listeners: Mutex<Vec<Listener>>,
    emitted: Mutex<Vec<SignalEvent>>,
}

/// Hub double whose every step is scripted and counted.
#[derive(Clone)]
pub struct ScriptedHub {
    inner: Arc<ScriptInner>,
}

impl ScriptedHub {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            inner: Arc::new(ScriptInner {
                config,
                counters: Counters::default(),
                listeners: Mutex::new(Vec::new()),
                emitted: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn ready() -> Self {
        Self::new(ScriptConfig::default())
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.inner.config
    }

    pub fn connects(&self) -> usize {
        self.inner.counters.connects.load(Ordering::SeqCst)
    }

    pub fn handles_created(&self) -> usize {
        self.inner.counters.handles_created.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.inner.counters.releases.load(Ordering::SeqCst)
    }

    pub fn signal_inits(&self) -> usize {
        self.inner.counters.signal_inits.load(Ordering::SeqCst)
    }

    pub fn settings_fetches(&self) -> usize {
        self.inner.counters.settings_fetches.load(Ordering::SeqCst)
    }

    pub fn subscribes(&self) -> usize {
        self.inner.counters.subscribes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.inner.counters.stops.load(Ordering::SeqCst)
    }

    pub fn live_subscriptions(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|l| !l.stopped.load(Ordering::SeqCst))
            .count()
    }

    pub fn emitted(&self) -> Vec<SignalEvent> {
        self.inner.emitted.lock().unwrap().clone()
    }

    /// Pushes `snapshot` to every live listener of `topic`.
    pub fn push(&self, topic: &Topic, snapshot: &SessionSnapshot) {
        let listeners: Vec<OnSnapshot> = self
            .inner
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|l| &l.topic == topic && !l.stopped.load(Ordering::SeqCst))
            .map(|l| l.on_update.clone())
            .collect();
        for on_update in listeners {
            on_update(snapshot.clone());
        }
    }

    /// Pushes `snapshot` to every listener ever registered, stopped or not.
    pub fn push_to_all(&self, topic: &Topic, snapshot: &SessionSnapshot) {
        let listeners: Vec<OnSnapshot> = self
            .inner
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|l| &l.topic == topic)
            .map(|l| l.on_update.clone())
            .collect();
        for on_update in listeners {
            on_update(snapshot.clone());
        }
    }
}

#[async_trait]
impl HubConnector for ScriptedHub {
    async fn connect(&self) -> Result<Arc<dyn ClientHandle>, HubError> {
        self.inner.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.config.connect_gate.pass().await;
        if let Some(err) = &self.inner.config.connect_error {
            return Err(err.clone());
        }
        self.inner
            .counters
            .handles_created
            .fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedHandle {
            hub: self.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

struct ScriptedHandle {
    hub: ScriptedHub,
    released: AtomicBool,
}

#[async_trait]
impl ClientHandle for ScriptedHandle {
    async fn get_settings(&self) -> Result<Settings, HubError> {
        let inner = &self.hub.inner;
        inner.counters.settings_fetches.fetch_add(1, Ordering::SeqCst);
        inner.config.settings_gate.pass().await;
        inner.config.settings.clone()
    }

    async fn initialize_signals(&self) -> Result<Arc<dyn SignalChannel>, HubError> {
        let inner = &self.hub.inner;
        inner.counters.signal_inits.fetch_add(1, Ordering::SeqCst);
        inner.config.signals_gate.pass().await;
        if let Some(err) = &inner.config.signals_error {
            return Err(err.clone());
        }
        Ok(Arc::new(ScriptedChannel {
            hub: self.hub.clone(),
        }))
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.hub
                .inner
                .counters
                .releases
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct ScriptedChannel {
    hub: ScriptedHub,
}

#[async_trait]
impl SignalChannel for ScriptedChannel {
    async fn emit(&self, event: SignalEvent) -> Result<(), HubError> {
        let inner = &self.hub.inner;
        if let Some(err) = &inner.config.emit_error {
            return Err(err.clone());
        }
        inner.emitted.lock().unwrap().push(event);
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: Topic,
        on_update: OnSnapshot,
    ) -> Result<Box<dyn Subscription>, HubError> {
        let inner = &self.hub.inner;
        inner.counters.subscribes.fetch_add(1, Ordering::SeqCst);
        inner.config.subscribe_gate.pass().await;
        if let Some(err) = &inner.config.subscribe_error {
            return Err(err.clone());
        }
        let stopped = Arc::new(AtomicBool::new(false));
        inner.listeners.lock().unwrap().push(Listener {
            topic,
            on_update,
            stopped: stopped.clone(),
        });
        Ok(Box::new(ScriptedSubscription {
            hub: self.hub.clone(),
            stopped,
        }))
    }
}

struct ScriptedSubscription {
    hub: ScriptedHub,
    stopped: Arc<AtomicBool>,
}

impl Subscription for ScriptedSubscription {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.hub.inner.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lets spawned tasks run until `condition` holds, failing after a bounded
/// number of scheduler turns.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    assert!(condition(), "condition not reached");
}

/// Gives spawned tasks a chance to run.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Tracing layer counting events per level.
#[derive(Clone, Default)]
pub struct LevelCounter {
    errors: Arc<AtomicUsize>,
    warnings: Arc<AtomicUsize>,
}

impl LevelCounter {
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            Level::WARN => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

/// Installs a [`LevelCounter`] as the thread's default subscriber.
pub fn count_logs() -> (LevelCounter, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::prelude::*;

    let counter = LevelCounter::default();
    let guard = tracing_subscriber::registry()
        .with(counter.clone())
        .set_default();
    (counter, guard)
}
