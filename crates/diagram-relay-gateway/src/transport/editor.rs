//! Editor-facing line-delimited TCP transport.
//!
//! One editor connection at a time; a new one replaces the old, whose session
//! then shuts its socket down. Outbound messages are encoded to exactly one
//! line each and written one `write_all` per line, in queue order.

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use diagram_relay_core::protocol::{encode_line, LineDecoder, RpcMessage};
use diagram_relay_core::{ActionEnvelope, Result, Side};

use crate::app_state::AppState;
use crate::config::EditorSection;
use crate::obs::RelayMetrics;
use crate::transport::slot::{Attached, ConnId, ConnectionSlot};
use crate::transport::{ActionHandler, LifecycleHandler};

#[derive(Default, Clone)]
struct EditorHandlers {
    on_connect: Option<LifecycleHandler>,
    on_disconnect: Option<LifecycleHandler>,
    on_action: Option<ActionHandler>,
}

pub struct EditorTransport {
    slot: ConnectionSlot<Bytes>,
    handlers: RwLock<EditorHandlers>,
    metrics: Arc<RelayMetrics>,
    max_line_bytes: usize,
}

impl EditorTransport {
    pub fn new(cfg: &EditorSection, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            slot: ConnectionSlot::new(Side::Editor, cfg.queue_capacity),
            handlers: RwLock::new(EditorHandlers::default()),
            metrics,
            max_line_bytes: cfg.max_line_bytes,
        }
    }

    fn handlers(&self) -> EditorHandlers {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_handlers(&self, f: impl FnOnce(&mut EditorHandlers)) {
        f(&mut self.handlers.write().unwrap_or_else(PoisonError::into_inner));
    }

    /// Replaces any previously registered action handler.
    pub fn on_action(&self, f: impl Fn(ActionEnvelope) + Send + Sync + 'static) {
        self.set_handlers(|h| h.on_action = Some(Arc::new(f)));
    }

    /// Fired after a fresh editor connection is installed.
    pub fn on_connect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.set_handlers(|h| h.on_connect = Some(Arc::new(f)));
    }

    /// Fired after the current editor connection goes away.
    pub fn on_disconnect(&self, f: impl Fn() + Send + Sync + 'static) {
        self.set_handlers(|h| h.on_disconnect = Some(Arc::new(f)));
    }

    pub fn is_connected(&self) -> bool {
        self.slot.is_connected()
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    pub fn send_action_to_neovim(&self, env: &ActionEnvelope) {
        tracing::debug!(kind = %env.kind(), "action for editor");
        self.send(&RpcMessage::DiagramAction(env.clone()));
    }

    pub fn notify_browser_connected(&self) {
        self.send(&RpcMessage::BrowserConnected);
    }

    pub fn notify_browser_disconnected(&self) {
        self.send(&RpcMessage::BrowserDisconnected);
    }

    fn send(&self, msg: &RpcMessage) {
        let method = msg.method();
        let queued = encode_line(msg).and_then(|line| self.slot.try_send(line));
        match queued {
            Ok(()) => {
                self.metrics.forwarded.inc(&[("to", "editor")]);
            }
            Err(e) => {
                self.metrics.dropped.inc(&[("to", "editor"), ("reason", e.kind())]);
                tracing::warn!(method, error = %e, "dropping message for editor");
            }
        }
    }

    /// Accept a new editor connection into the slot.
    ///
    /// Unlike the browser side, lifecycle handlers run after the slot lock is
    /// released: they may call back into the browser transport, and the lock
    /// order is browser slot before editor slot.
    pub fn connect(&self) -> (ConnId, mpsc::Receiver<Bytes>) {
        let (id, rx, attached) = self.slot.attach();
        match attached {
            Attached::Fresh => {
                self.metrics.lifecycle.inc(&[("side", "editor"), ("event", "connected")]);
                tracing::info!(conn_id = id, "editor connected");
                if let Some(h) = self.handlers().on_connect {
                    h();
                }
            }
            Attached::Replaced { previous } => {
                self.metrics.lifecycle.inc(&[("side", "editor"), ("event", "replaced")]);
                tracing::info!(conn_id = id, previous, "editor replaced previous connection");
            }
        }
        (id, rx)
    }

    pub fn disconnect(&self, id: ConnId) {
        if self.slot.detach(id) {
            self.metrics.lifecycle.inc(&[("side", "editor"), ("event", "disconnected")]);
            tracing::info!(conn_id = id, "editor disconnected");
            if let Some(h) = self.handlers().on_disconnect {
                h();
            }
        }
    }

    /// Handle one decode result from connection `id`'s line decoder.
    pub fn receive(&self, id: ConnId, decoded: Result<RpcMessage>) {
        if !self.slot.is_current(id) {
            tracing::debug!(conn_id = id, "line from replaced editor ignored");
            return;
        }

        match decoded {
            Ok(RpcMessage::DiagramAction(env)) => {
                tracing::debug!(kind = %env.kind(), client_id = ?env.client_id(), "action from editor");
                if let Some(h) = self.handlers().on_action {
                    h(env);
                }
            }
            Ok(other) => {
                self.metrics
                    .decode_errors
                    .inc(&[("side", "editor"), ("kind", "unexpected_method")]);
                tracing::warn!(method = other.method(), "editor sent a relay-only method; ignored");
            }
            Err(e) => {
                self.metrics
                    .decode_errors
                    .inc(&[("side", "editor"), ("kind", e.kind())]);
                tracing::warn!(conn_id = id, error = %e, "dropping editor line");
            }
        }
    }
}

/// Accept loop for the editor listener. Runs until `shutdown` flips to true.
pub async fn serve(app: AppState, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accept = listener.accept() => {
                match accept {
                    Ok((stream, peer)) => {
                        let app = app.clone();
                        let span = tracing::info_span!("editor_session", %peer);
                        tokio::spawn(run_session(app, stream).instrument(span));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "editor accept failed");
                    }
                }
            }
        }
    }
    tracing::info!("editor listener stopped");
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, stream: TcpStream) {
    let editor = app.editor();
    let (id, mut out_rx) = editor.connect();
    let _ = stream.set_nodelay(true);
    let (mut rd, mut wr) = stream.into_split();
    let mut dec = LineDecoder::new(editor.max_line_bytes());

    let reason = loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(line) => {
                        if wr.write_all(&line).await.is_err() {
                            break "write error";
                        }
                    }
                    None => break "replaced",
                }
            }

            // inbound reader
            read = rd.read_buf(dec.buffer_mut()) => {
                match read {
                    Ok(0) => break "eof",
                    Ok(_) => {
                        while let Some(decoded) = dec.next_message() {
                            editor.receive(id, decoded);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "editor read failed");
                        break "read error";
                    }
                }
            }
        }
    };

    editor.disconnect(id);
    let _ = wr.shutdown().await;
    tracing::info!(conn_id = id, reason, pending = dec.buffered(), "editor session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn transport() -> EditorTransport {
        EditorTransport::new(&EditorSection::default(), Arc::new(RelayMetrics::default()))
    }

    fn line(rx: &mut mpsc::Receiver<Bytes>) -> String {
        String::from_utf8(rx.try_recv().unwrap().to_vec()).unwrap()
    }

    #[test]
    fn outbound_lines_are_terminated_once() {
        let t = transport();
        let (_id, mut rx) = t.connect();
        let env: ActionEnvelope = r#"{"action":{"kind":"refreshDiagram"}}"#.parse().unwrap();

        t.notify_browser_connected();
        t.send_action_to_neovim(&env);
        t.notify_browser_disconnected();

        assert_eq!(line(&mut rx), "{\"method\":\"browser/connected\"}\n");
        assert_eq!(
            line(&mut rx),
            "{\"method\":\"diagram/action\",\"params\":{\"action\":{\"kind\":\"refreshDiagram\"}}}\n"
        );
        assert_eq!(line(&mut rx), "{\"method\":\"browser/disconnected\"}\n");
    }

    #[test]
    fn inbound_non_action_methods_are_not_forwarded() {
        let t = transport();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        t.on_action(move |env| s.lock().unwrap().push(env.kind().to_string()));

        let (id, _rx) = t.connect();
        let mut dec = LineDecoder::default();
        dec.feed(b"{\"method\":\"browser/connected\"}\n{\"method\":\"x/y\"}\n{\"method\":\"diagram/action\",\"params\":{\"action\":{\"kind\":\"a\"}}}\n");
        while let Some(decoded) = dec.next_message() {
            t.receive(id, decoded);
        }

        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(
            t.metrics.decode_errors.get(&[("side", "editor"), ("kind", "unexpected_method")]),
            1
        );
        assert_eq!(
            t.metrics.decode_errors.get(&[("side", "editor"), ("kind", "unknown_method")]),
            1
        );
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let cfg = EditorSection {
            queue_capacity: 1,
            ..EditorSection::default()
        };
        let t = EditorTransport::new(&cfg, Arc::new(RelayMetrics::default()));
        let (_id, mut rx) = t.connect();

        t.notify_browser_connected();
        t.notify_browser_disconnected();

        assert_eq!(t.metrics.dropped.get(&[("to", "editor"), ("reason", "queue_full")]), 1);
        assert_eq!(line(&mut rx), "{\"method\":\"browser/connected\"}\n");
        assert!(rx.try_recv().is_err());
    }
}
