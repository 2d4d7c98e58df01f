//! Transport layer.
//!
//! - `browser`: WebSocket, one action envelope per text frame
//! - `editor`: TCP, one RPC message per line
//! - `slot`: the single-occupant connection slot both sides are built on
//! - `assets`: static diagram-viewer bundle served next to the socket

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use diagram_relay_core::ActionEnvelope;

pub mod assets;
pub mod browser;
pub mod editor;
pub mod slot;

pub use browser::BrowserTransport;
pub use editor::EditorTransport;
pub use slot::{Attached, ConnId, ConnectionSlot};

/// Connect/disconnect callback.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving one decoded envelope.
pub type ActionHandler = Arc<dyn Fn(ActionEnvelope) + Send + Sync>;

/// Resolve once `shutdown` flips to true (or its sender is gone).
pub fn shutdown_requested(mut shutdown: watch::Receiver<bool>) -> impl Future<Output = ()> {
    async move {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    }
}
