//! Client session lifecycle and signal synchronization for the gridapp display.
//!
//! A [`MountedSession`](session::MountedSession) drives an injected
//! [`HubConnector`](hub::HubConnector) from "not connected" to "connected,
//! configured, subscribed", or resolves local fallback settings when dev mode
//! is on. Front-ends read the exposed [`SessionView`](session::SessionView)
//! and trigger outbound signals through the session.

pub mod config;
pub mod dev_mode;
pub mod error;
pub mod hub;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod utils;

pub use config::GridAppConfig;
pub use error::{ConfigError, ConnectError, FallbackError, HubError, Stage};
pub use hub::{ClientHandle, HubConnector, SignalChannel, SignalEvent, Subscription, Topic};
pub use session::{ConnectionStatus, MountedSession, SessionView};
pub use settings::Settings;
pub use snapshot::{ItemId, SessionSnapshot};
