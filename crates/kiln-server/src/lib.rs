//! Preview server with live reload for kiln sites.
//!
//! Serves the output directory, watches the source tree and pushes reload
//! messages to connected browsers over a WebSocket.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevSession, DevSessionConfig, ServerError, RELOAD_SCRIPT_PATH, RELOAD_SOCKET_PATH};
pub use watcher::{FileWatcher, BATCH_WINDOW};
pub use websocket::{reload_client_script, ReloadHub, ReloadMessage};
