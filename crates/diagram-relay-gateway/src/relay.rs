//! Action router: the only place the two transports meet.
//!
//! Wiring:
//! - browser action       -> editor `diagram/action`
//! - editor action        -> browser frame
//! - browser connect      -> editor `browser/connected`
//! - browser disconnect   -> editor `browser/disconnected`
//! - (optional) editor connect/disconnect -> browser `editor/*` action
//!
//! Delivery is at-most-once and best effort. Nothing is queued here, retried,
//! or inspected beyond what the transports already validated.

use std::sync::{Arc, Weak};

use serde_json::json;

use diagram_relay_core::{ActionEnvelope, Result};

use crate::config::RoutingSection;
use crate::transport::{BrowserTransport, EditorTransport};

pub const KIND_EDITOR_CONNECTED: &str = "editor/connected";
pub const KIND_EDITOR_DISCONNECTED: &str = "editor/disconnected";

pub struct ActionRouter {
    browser: Arc<BrowserTransport>,
    editor: Arc<EditorTransport>,
}

impl ActionRouter {
    /// Register the router's handlers on both transports.
    ///
    /// Handlers hold `Weak` references so the transports do not keep each
    /// other alive.
    pub fn wire(
        browser: Arc<BrowserTransport>,
        editor: Arc<EditorTransport>,
        routing: &RoutingSection,
    ) -> Result<Self> {
        let to_editor = Arc::downgrade(&editor);
        let to_browser = Arc::downgrade(&browser);

        browser.on_action(action(&to_editor, |editor, env| editor.send_action_to_neovim(&env)));
        editor.on_action(action(&to_browser, |browser, env| browser.send_action_to_browser(&env)));

        browser.on_connect(lifecycle(&to_editor, |editor| editor.notify_browser_connected()));
        browser.on_disconnect(lifecycle(&to_editor, |editor| editor.notify_browser_disconnected()));

        if routing.notify_browser_of_editor {
            let connected = ActionEnvelope::new(None, json!({ "kind": KIND_EDITOR_CONNECTED }))?;
            let disconnected = ActionEnvelope::new(None, json!({ "kind": KIND_EDITOR_DISCONNECTED }))?;
            editor.on_connect(lifecycle(&to_browser, move |browser| browser.send_action_to_browser(&connected)));
            editor.on_disconnect(lifecycle(&to_browser, move |browser| {
                browser.send_action_to_browser(&disconnected)
            }));
        }

        Ok(Self { browser, editor })
    }

    pub fn browser(&self) -> &Arc<BrowserTransport> {
        &self.browser
    }

    pub fn editor(&self) -> &Arc<EditorTransport> {
        &self.editor
    }
}

/// Adapt `f` into an action handler that is a no-op once the target is gone.
fn action<T, F>(target: &Weak<T>, f: F) -> impl Fn(ActionEnvelope) + Send + Sync + 'static
where
    T: Send + Sync + 'static,
    F: Fn(&T, ActionEnvelope) + Send + Sync + 'static,
{
    let target = target.clone();
    move |env| {
        if let Some(t) = target.upgrade() {
            f(&t, env);
        }
    }
}

fn lifecycle<T, F>(target: &Weak<T>, f: F) -> impl Fn() + Send + Sync + 'static
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let target = target.clone();
    move || {
        if let Some(t) = target.upgrade() {
            f(&t);
        }
    }
}
