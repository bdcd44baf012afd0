//! Session orchestration for flow chat dialogs.
//!
//! Provides:
//! - `SessionController` - Send/clear/close against one live channel
//! - `ChatConfig` - Endpoint and timing settings
//! - Notifier implementations

pub mod config;
pub mod controller;
pub mod notify;

pub use config::{ChatConfig, ConfigError};
pub use controller::{DialogHost, FlowInfo, SendError, SessionController};
pub use notify::ChannelNotifier;
