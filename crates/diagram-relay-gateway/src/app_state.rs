//! Shared application state for the diagram relay.
//!
//! Built once at process start and handed (cloned) to both listeners; there
//! is no global mutable state.

use std::sync::Arc;

use diagram_relay_core::error::Result;

use crate::config::RelayConfig;
use crate::obs::RelayMetrics;
use crate::relay::ActionRouter;
use crate::transport::{BrowserTransport, EditorTransport};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: RelayConfig,
    router: ActionRouter,
    metrics: Arc<RelayMetrics>,
}

impl AppState {
    /// Build both transports and wire the router between them.
    pub fn new(cfg: RelayConfig) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(RelayMetrics::default());
        let browser = Arc::new(BrowserTransport::new(&cfg.browser, Arc::clone(&metrics)));
        let editor = Arc::new(EditorTransport::new(&cfg.editor, Arc::clone(&metrics)));
        let router = ActionRouter::wire(browser, editor, &cfg.routing)?;

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, router, metrics }),
        })
    }

    pub fn cfg(&self) -> &RelayConfig {
        &self.inner.cfg
    }

    pub fn browser(&self) -> Arc<BrowserTransport> {
        Arc::clone(self.inner.router.browser())
    }

    pub fn editor(&self) -> Arc<EditorTransport> {
        Arc::clone(self.inner.router.editor())
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.inner.metrics
    }

    pub fn set_draining(&self) {
        self.inner.metrics.set_draining();
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Point-in-time gauges rendered next to the counters.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("diagram_relay_browser_connected", self.browser().is_connected() as u64),
            ("diagram_relay_editor_connected", self.editor().is_connected() as u64),
        ]
    }
}
