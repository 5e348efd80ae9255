//! Infrastructure layer for balance-notify.
//!
//! # Responsibilities
//!
//! - Opening the WebSocket to the backend (tokio-tungstenite)
//! - Turning WebSocket frames into the text payloads the bridge understands
//! - Providing an in-memory transport so the bridge can be driven without a
//!   network
//! - Reading the TOML settings file
//!
//! # What does NOT belong here?
//!
//! - Deciding what a payload means or who gets notified (application layer)
//! - Retry timing (application layer)

pub mod channel_transport;
pub mod config_file;
pub mod ws_transport;

pub use channel_transport::{channel_pair, AcceptMode, ChannelConnector, ChannelServer, RemotePeer};
pub use config_file::{load_config, AppConfig, ConfigFileError};
pub use ws_transport::WsConnector;
