//! Client lifecycle: one [`MountedSession`] per mounted front-end.
//!
//! Mounting either resolves fallback settings (dev mode) or runs
//! connect → initialize signals → fetch settings → subscribe against the
//! injected hub. Dropping or unmounting the session releases the client
//! handle and every subscription, and discards results that arrive later.

pub mod emit;
pub mod sync;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strum::Display;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::GridAppConfig;
use crate::dev_mode;
use crate::error::{ConnectError, HubError, Stage};
use crate::hub::{ClientHandle, HubConnector, SignalChannel, SignalEvent, Topic};
use crate::settings::Settings;
use crate::snapshot::{ItemId, SessionSnapshot};

pub use emit::{ContentViewGate, Emitter};
pub use sync::{SessionStateSync, SubscriptionGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectionStatus {
    #[default]
    Uninitialized,
    Connecting,
    Ready,
    FallingBack,
    Failed,
}

impl ConnectionStatus {
    /// Whether the mount has left its connect attempt for good.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Ready | Self::FallingBack | Self::Failed)
    }
}

/// Read-only projection handed to front-ends.
///
/// `settings` is `None` while loading. `signals` is only present once the
/// session is [`ConnectionStatus::Ready`].
#[derive(Clone, Default)]
pub struct SessionView {
    pub status: ConnectionStatus,
    pub settings: Option<Arc<Settings>>,
    pub signals: Option<Arc<dyn SignalChannel>>,
    pub error: Option<ConnectError>,
}

impl fmt::Debug for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionView")
            .field("status", &self.status)
            .field("settings", &self.settings)
            .field("signals", &self.signals.as_ref().map(|_| "Arc<dyn SignalChannel>"))
            .field("error", &self.error)
            .finish()
    }
}

impl SessionView {
    pub fn is_loading(&self) -> bool {
        self.settings.is_none()
    }
}

struct SessionShared {
    resources: Mutex<Resources>,
    view_tx: watch::Sender<SessionView>,
    sync: SessionStateSync,
    content_view: ContentViewGate,
}

struct Resources {
    mounted: bool,
    handle: Option<Arc<dyn ClientHandle>>,
    emitter: Option<Emitter>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, Resources> {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.view_tx.send_modify(|view| view.status = status);
    }

    /// Stores `handle` as the session's connection, releasing any handle it
    /// supersedes. After unmount the handle is released right away instead.
    fn adopt_handle(&self, handle: Arc<dyn ClientHandle>) -> bool {
        let mut resources = self.lock();
        if !resources.mounted {
            drop(resources);
            debug!(target: "gridapp::session", "Unmounted during connect, releasing handle");
            handle.release();
            return false;
        }
        let superseded = resources.handle.replace(handle);
        drop(resources);

        if let Some(superseded) = superseded {
            superseded.release();
        }
        true
    }

    /// Publishes the ready view. The content view is queued before the view
    /// changes, so it precedes anything emitted by observers of `Ready`.
    fn apply_ready(&self, settings: Settings, signals: Arc<dyn SignalChannel>) -> bool {
        let mut resources = self.lock();
        if !resources.mounted {
            return false;
        }
        let emitter = Emitter::start(signals.clone());
        self.announce(&settings, &emitter);
        resources.emitter = Some(emitter);

        self.view_tx.send_replace(SessionView {
            status: ConnectionStatus::Ready,
            settings: Some(Arc::new(settings)),
            signals: Some(signals),
            error: None,
        });
        true
    }

    fn apply_failure(&self, err: ConnectError) {
        let handle = {
            let mut resources = self.lock();
            if !resources.mounted {
                debug!(
                    target: "gridapp::session",
                    stage = %err.stage,
                    error = %err.source,
                    "Discarding connect failure after unmount"
                );
                return;
            }
            error!(
                target: "gridapp::session",
                stage = %err.stage,
                error = %err.source,
                "Failed to initialize hub client"
            );
            self.view_tx.send_modify(|view| {
                view.status = ConnectionStatus::Failed;
                view.error = Some(err);
            });
            resources.handle.take()
        };

        if let Some(handle) = handle {
            handle.release();
        }
    }

    fn announce(&self, settings: &Settings, emitter: &Emitter) {
        if let Some(event) = self.content_view.observe(settings) {
            emitter.emit(event);
        }
    }

    fn teardown(&self) {
        let handle = {
            let mut resources = self.lock();
            if !resources.mounted {
                return;
            }
            resources.mounted = false;
            resources.emitter = None;
            resources.handle.take()
        };

        self.sync.shutdown();
        if let Some(handle) = handle {
            handle.release();
        }
        debug!(target: "gridapp::session", "Session unmounted");
    }
}

/// A mounted gridapp session.
///
/// Exactly one client handle and at most one subscription per topic are held
/// at any time. Dropping the session is the unmount.
pub struct MountedSession {
    shared: Arc<SessionShared>,
    product_id: ItemId,
}

impl MountedSession {
    /// Mounts a session. In dev mode the hub is never contacted; otherwise a
    /// connect attempt is spawned on the current Tokio runtime; without one
    /// the session fails at the connect stage.
    pub fn mount(config: &GridAppConfig, connector: Arc<dyn HubConnector>) -> Self {
        let (view_tx, _) = watch::channel(SessionView::default());
        let shared = Arc::new(SessionShared {
            resources: Mutex::new(Resources {
                mounted: true,
                handle: None,
                emitter: None,
            }),
            view_tx,
            sync: SessionStateSync::new(),
            content_view: ContentViewGate::new(),
        });

        shared.set_status(ConnectionStatus::Connecting);

        if config.dev_mode {
            let settings = dev_mode::fallback_settings(&config.fallback_settings_path);
            info!(
                target: "gridapp::session",
                product = %settings.product_name,
                "Dev mode, using fallback settings"
            );
            shared.view_tx.send_replace(SessionView {
                status: ConnectionStatus::FallingBack,
                settings: Some(Arc::new(settings.clone())),
                signals: None,
                error: None,
            });
            shared.announce(&settings, &Emitter::default());
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(run_connect(
                shared.clone(),
                connector,
                config.topics.clone(),
            ));
        } else {
            shared.apply_failure(ConnectError::new(
                Stage::Connect,
                HubError::Unavailable("no async runtime to connect on".to_string()),
            ));
        }

        Self {
            shared,
            product_id: config.product_id.clone(),
        }
    }

    /// Receiver over the exposed view; changes only on state transitions.
    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.shared.view_tx.subscribe()
    }

    pub fn current(&self) -> SessionView {
        self.shared.view_tx.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.view_tx.borrow().status
    }

    pub fn settings(&self) -> Option<Arc<Settings>> {
        self.shared.view_tx.borrow().settings.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.is_mounted()
    }

    /// Resolves once the mount settles and returns the settled status.
    /// Stays pending while a connect attempt hangs.
    pub async fn wait_ready(&self) -> ConnectionStatus {
        let mut rx = self.view();
        match rx.wait_for(|view| view.status.is_settled()).await {
            Ok(view) => view.status,
            Err(_) => self.status(),
        }
    }

    pub fn product_id(&self) -> &ItemId {
        &self.product_id
    }

    /// The content-view event sent for this mount, once decided.
    pub fn content_view(&self) -> Option<&SignalEvent> {
        self.shared.content_view.sent()
    }

    /// The session's ordered emitter; disconnected until the session is ready.
    pub fn emitter(&self) -> Emitter {
        self.shared.lock().emitter.clone().unwrap_or_default()
    }

    /// Fire-and-forget emission; a no-op until the session is ready.
    pub fn emit(&self, event: SignalEvent) {
        self.emitter().emit(event);
    }

    pub fn add_to_cart(&self, quantity: u32) {
        self.emit(SignalEvent::CartAdd {
            product_id: self.product_id.clone(),
            quantity,
        });
    }

    pub fn sync(&self) -> &SessionStateSync {
        &self.shared.sync
    }

    pub fn snapshot(&self, topic: &Topic) -> Option<SessionSnapshot> {
        self.shared.sync.snapshot(topic)
    }

    pub fn watch_topic(&self, topic: &Topic) -> watch::Receiver<Option<SessionSnapshot>> {
        self.shared.sync.watch(topic)
    }

    /// Cart quantity of the configured product; zero when absent.
    pub fn cart_count(&self) -> u32 {
        self.shared.sync.quantity_of(&Topic::cart(), &self.product_id)
    }

    /// Unmounts the session, releasing the client handle and subscriptions.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for MountedSession {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

async fn run_connect(
    shared: Arc<SessionShared>,
    connector: Arc<dyn HubConnector>,
    topics: Vec<Topic>,
) {
    let (signals, settings) = match establish(&shared, connector.as_ref()).await {
        Ok(Some(parts)) => parts,
        Ok(None) => return,
        Err(err) => {
            shared.apply_failure(err);
            return;
        }
    };

    if !shared.apply_ready(settings.clone(), signals.clone()) {
        debug!(target: "gridapp::session", "Unmounted before ready, discarding settings");
        return;
    }
    info!(
        target: "gridapp::session",
        product = %settings.product_name,
        "Hub client ready"
    );

    for topic in topics {
        if !shared.is_mounted() {
            break;
        }
        // failures are logged by the synchronizer
        let _ = shared.sync.subscribe(&signals, topic).await;
    }
}

/// Runs the connect sequence. `Ok(None)` means the session was unmounted
/// along the way and any acquired handle has been released.
async fn establish(
    shared: &SessionShared,
    connector: &dyn HubConnector,
) -> Result<Option<(Arc<dyn SignalChannel>, Settings)>, ConnectError> {
    debug!(target: "gridapp::session", "Connecting to hub runtime");
    let handle = connector.connect().await.map_err(ConnectError::at(Stage::Connect))?;

    if !shared.adopt_handle(handle.clone()) {
        return Ok(None);
    }

    let signals = handle
        .initialize_signals()
        .await
        .map_err(ConnectError::at(Stage::InitializeSignals))?;
    if !shared.is_mounted() {
        return Ok(None);
    }

    let settings = handle
        .get_settings()
        .await
        .map_err(ConnectError::at(Stage::FetchSettings))?;
    if !shared.is_mounted() {
        return Ok(None);
    }

    Ok(Some((signals, settings)))
}
