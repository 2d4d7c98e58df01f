//! Browser-facing WebSocket transport.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS on the configured path
//! - Own the browser connection slot (one client, last connect wins)
//! - Decode each text frame once into an `ActionEnvelope`
//! - Lifecycle: ping + optional idle timeout, single detach path on any exit
//!
//! A replaced browser is closed explicitly: dropping its queue sender makes
//! its session loop send a close frame and exit.

use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use diagram_relay_core::{ActionEnvelope, RelayError, Side};

use crate::app_state::AppState;
use crate::config::BrowserSection;
use crate::obs::RelayMetrics;
use crate::transport::slot::{Attached, ConnId, ConnectionSlot};
use crate::transport::{ActionHandler, LifecycleHandler};

#[derive(Default, Clone)]
struct BrowserHandlers {
    on_connect: Option<LifecycleHandler>,
    on_disconnect: Option<LifecycleHandler>,
    on_action: Option<ActionHandler>,
}

pub struct BrowserTransport {
    slot: ConnectionSlot<String>,
    handlers: RwLock<BrowserHandlers>,
    metrics: Arc<RelayMetrics>,
    max_frame_bytes: usize,
}

impl BrowserTransport {
    pub fn new(cfg: &BrowserSection, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            slot: ConnectionSlot::new(Side::Browser, cfg.queue_capacity),
            handlers: RwLock::new(BrowserHandlers::default()),
            metrics,
            max_frame_bytes: cfg.max_frame_bytes,
        }
    }

    fn handlers(&self) -> BrowserHandlers {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_handlers(&self, f: impl FnOnce(&mut BrowserHandlers)) {
        f(&mut self.handlers.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Replaces any previously registered connect handler.
    pub fn on_connect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.set_handlers(|h| h.on_connect = Some(Arc::new(f)));
    }

    /// Replaces any previously registered disconnect handler.
    pub fn on_disconnect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.set_handlers(|h| h.on_disconnect = Some(Arc::new(f)));
    }

    /// Replaces any previously registered action handler.
    pub fn on_action(&self, f: impl Fn(ActionEnvelope) + Send + Sync + 'static) {
        self.set_handlers(|h| h.on_action = Some(Arc::new(f)));
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    /// Queue one frame for the connected browser. Best effort: without a
    /// browser, or with its queue full, the envelope is dropped and logged.
    pub fn send_action_to_browser(&self, env: &ActionEnvelope) {
        match self.slot.try_send(env.as_json().to_owned()) {
            Ok(()) => {
                self.metrics.forwarded.inc(&[("to", "browser")]);
                tracing::debug!(kind = %env.kind(), "action queued for browser");
            }
            Err(e) => {
                self.metrics.dropped.inc(&[("to", "browser"), ("reason", e.kind())]);
                tracing::warn!(kind = %env.kind(), error = %e, "dropping action for browser");
            }
        }
    }

    /// Accept a new browser connection into the slot.
    ///
    /// The connect handler fires only on `Disconnected -> Connected`, inside
    /// the slot lock, so connect/disconnect notifications keep event order.
    pub fn connect(&self) -> (ConnId, mpsc::Receiver<String>) {
        let handlers = self.handlers();
        self.slot.attach_with(|id, attached| match attached {
            Attached::Fresh => {
                self.metrics.lifecycle.inc(&[("side", "browser"), ("event", "connected")]);
                tracing::info!(conn_id = id, "browser connected");
                if let Some(h) = &handlers.on_connect {
                    h();
                }
            }
            Attached::Replaced { previous } => {
                self.metrics.lifecycle.inc(&[("side", "browser"), ("event", "replaced")]);
                tracing::info!(conn_id = id, previous, "browser replaced previous connection");
            }
        })
    }

    /// Release the slot if `id` still holds it; fires the disconnect handler
    /// exactly once per transition.
    pub fn disconnect(&self, id: ConnId) {
        let handlers = self.handlers();
        let detached = self.slot.detach_with(id, || {
            self.metrics.lifecycle.inc(&[("side", "browser"), ("event", "disconnected")]);
            if let Some(h) = &handlers.on_disconnect {
                h();
            }
        });
        if detached {
            tracing::info!(conn_id = id, "browser disconnected");
        }
    }

    /// Handle one inbound text frame from connection `id`.
    pub fn receive_frame(&self, id: ConnId, text: &str) {
        if !self.slot.is_current(id) {
            tracing::debug!(conn_id = id, "frame from replaced browser ignored");
            return;
        }

        let len = text.len();
        let decoded = if len > self.max_frame_bytes {
            Err(RelayError::FrameTooLarge { len, max: self.max_frame_bytes })
        } else {
            text.parse::<ActionEnvelope>()
        };

        match decoded {
            Ok(env) => {
                tracing::debug!(kind = %env.kind(), client_id = ?env.client_id(), "action from browser");
                if let Some(h) = self.handlers().on_action {
                    h(env);
                }
            }
            Err(e) => {
                self.metrics
                    .decode_errors
                    .inc(&[("side", "browser"), ("kind", e.kind())]);
                tracing::warn!(conn_id = id, error = %e, "dropping browser frame");
            }
        }
    }
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max = app.cfg().browser.max_frame_bytes;
    // Leave headroom so oversized frames reach `receive_frame` and are
    // counted there instead of killing the socket.
    ws.max_message_size(max.saturating_mul(2).max(64 * 1024))
        .on_upgrade(move |socket| run_session(app, socket))
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, socket: WebSocket) {
    let browser = app.browser();
    let (id, mut out_rx) = browser.connect();
    let span = tracing::info_span!("browser_session", conn_id = id);

    async move {
        let (mut ws_tx, mut ws_rx) = socket.split();

        let cfg = &app.cfg().browser;
        let idle_timeout = (cfg.idle_timeout_ms > 0).then(|| Duration::from_millis(cfg.idle_timeout_ms));
        let mut ping_tick = tokio::time::interval(Duration::from_millis(cfg.ping_interval_ms));
        ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // One deadline for the whole session, pushed back on inbound traffic.
        let idle_after = idle_timeout.unwrap_or(Duration::from_secs(86_400));
        let idle = tokio::time::sleep(idle_after);
        tokio::pin!(idle);

        let reason = loop {
            tokio::select! {
                // outbound writer
                maybe_out = out_rx.recv() => {
                    match maybe_out {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text)).await.is_err() {
                                break "write error";
                            }
                        }
                        None => break "replaced",
                    }
                }

                // inbound reader
                incoming = ws_rx.next() => {
                    let Some(incoming) = incoming else { break "closed"; };
                    let Ok(msg) = incoming else { break "read error"; };

                    idle.as_mut().reset(Instant::now() + idle_after);

                    match msg {
                        Message::Text(s) => browser.receive_frame(id, &s),
                        Message::Binary(b) => {
                            app.metrics()
                                .decode_errors
                                .inc(&[("side", "browser"), ("kind", "binary_frame")]);
                            tracing::warn!(len = b.len(), "dropping binary frame");
                        }
                        // pongs to client pings are queued by the ws layer itself
                        Message::Ping(_) | Message::Pong(_) => {}
                        Message::Close(_) => break "closed",
                    }
                }

                // ping
                _ = ping_tick.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                        break "write error";
                    }
                }

                // idle timeout
                _ = &mut idle, if idle_timeout.is_some() => break "idle timeout",
            }
        };

        browser.disconnect(id);
        let _ = ws_tx.close().await;
        tracing::info!(reason, "browser session ended");
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn transport(max_frame_bytes: usize) -> BrowserTransport {
        let cfg = BrowserSection {
            max_frame_bytes,
            ..BrowserSection::default()
        };
        BrowserTransport::new(&cfg, Arc::new(RelayMetrics::default()))
    }

    #[test]
    fn last_registered_handler_wins() {
        let t = transport(1024);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        t.on_action(move |env| s.lock().unwrap().push(format!("first:{}", env.kind())));
        let s = Arc::clone(&seen);
        t.on_action(move |env| s.lock().unwrap().push(format!("second:{}", env.kind())));

        let (id, _rx) = t.connect();
        t.receive_frame(id, r#"{"action":{"kind":"fit"}}"#);
        assert_eq!(*seen.lock().unwrap(), vec!["second:fit".to_string()]);
    }

    #[test]
    fn malformed_and_oversized_frames_are_dropped() {
        let t = transport(64);
        let seen = Arc::new(Mutex::new(0));
        let s = Arc::clone(&seen);
        t.on_action(move |_| *s.lock().unwrap() += 1);

        let (id, _rx) = t.connect();
        t.receive_frame(id, "not json");
        t.receive_frame(id, r#"{"clientId":"x"}"#);
        t.receive_frame(id, &format!(r#"{{"action":{{"kind":"{}"}}}}"#, "k".repeat(100)));
        t.receive_frame(id, r#"{"action":{"kind":"ok"}}"#);

        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(t.metrics.decode_errors.get(&[("side", "browser"), ("kind", "parse")]), 1);
        assert_eq!(
            t.metrics.decode_errors.get(&[("side", "browser"), ("kind", "malformed_envelope")]),
            1
        );
        assert_eq!(
            t.metrics.decode_errors.get(&[("side", "browser"), ("kind", "frame_too_large")]),
            1
        );
    }

    #[test]
    fn send_without_browser_is_a_logged_drop() {
        let t = transport(1024);
        let env: ActionEnvelope = r#"{"action":{"kind":"setModel"}}"#.parse().unwrap();
        t.send_action_to_browser(&env);
        assert_eq!(
            t.metrics.dropped.get(&[("to", "browser"), ("reason", "no_destination")]),
            1
        );

        let (_id, mut rx) = t.connect();
        t.send_action_to_browser(&env);
        assert_eq!(rx.try_recv().unwrap(), r#"{"action":{"kind":"setModel"}}"#);
    }
}
