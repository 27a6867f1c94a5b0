//! Capability boundary to the hub runtime.
//!
//! The runtime is injected as a [`HubConnector`] so the session never reaches
//! for ambient global state; [`LocalHub`](local::LocalHub) is the in-process
//! implementation and tests substitute their own doubles.

pub mod local;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HubError;
use crate::settings::Settings;
use crate::snapshot::{ItemId, SessionSnapshot};

pub use local::LocalHub;

/// Callback receiving the full snapshot of a topic on every update.
pub type OnSnapshot = Arc<dyn Fn(SessionSnapshot) + Send + Sync>;

/// Establishes connections to the hub runtime.
#[async_trait]
pub trait HubConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ClientHandle>, HubError>;
}

/// An established connection. Owns the lifetime of every signal channel and
/// subscription obtained through it.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    async fn get_settings(&self) -> Result<Settings, HubError>;

    async fn initialize_signals(&self) -> Result<Arc<dyn SignalChannel>, HubError>;

    /// Releases the connection. Must be idempotent.
    fn release(&self);
}

/// Outbound events and inbound session-state topics bound to a client handle.
#[async_trait]
pub trait SignalChannel: Send + Sync {
    async fn emit(&self, event: SignalEvent) -> Result<(), HubError>;

    async fn subscribe(
        &self,
        topic: Topic,
        on_update: OnSnapshot,
    ) -> Result<Box<dyn Subscription>, HubError>;
}

/// A live registration on a session-state topic.
pub trait Subscription: Send + Sync {
    /// Stops delivery. Calling it again, or after the owning handle was
    /// released, is a no-op.
    fn stop(&self);
}

/// A session-state topic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub const CART: &'static str = "cart";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn cart() -> Self {
        Self::new(Self::CART)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound commerce telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SignalEvent {
    ContentView {
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    CartAdd {
        product_id: ItemId,
        quantity: u32,
    },
}

impl SignalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContentView { .. } => "content-view",
            Self::CartAdd { .. } => "cart-add",
        }
    }
}

/// Connector used when no hub runtime is attached to the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHub;

#[async_trait]
impl HubConnector for DetachedHub {
    async fn connect(&self) -> Result<Arc<dyn ClientHandle>, HubError> {
        Err(HubError::Unavailable(
            "no hub runtime attached to this process".to_string(),
        ))
    }
}
