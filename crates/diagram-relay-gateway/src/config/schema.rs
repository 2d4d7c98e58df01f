use std::net::SocketAddr;

use serde::Deserialize;
use diagram_relay_core::error::{RelayError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub version: u32,

    #[serde(default)]
    pub browser: BrowserSection,

    #[serde(default)]
    pub editor: EditorSection,

    #[serde(default)]
    pub routing: RoutingSection,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            browser: BrowserSection::default(),
            editor: EditorSection::default(),
            routing: RoutingSection::default(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::UnsupportedVersion);
        }

        self.browser.validate()?;
        self.editor.validate()?;

        let b = self.browser.listen_addr()?;
        let e = self.editor.listen_addr()?;
        if b.port() != 0 && b == e {
            return Err(RelayError::BadConfig(
                "browser.listen and editor.listen must differ".into(),
            ));
        }

        Ok(())
    }
}

/// Fixed routes on the browser listener; `ws_path` may not shadow them.
pub const OPS_PATHS: [&str; 3] = ["/healthz", "/readyz", "/metrics"];

/// Browser-facing WebSocket + static bundle listener.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowserSection {
    #[serde(default = "default_browser_listen")]
    pub listen: String,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Root of the diagram-viewer bundle. Unset: static paths return 404.
    #[serde(default)]
    pub assets_dir: Option<String>,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// 0 disables the idle timeout.
    #[serde(default)]
    pub idle_timeout_ms: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            listen: default_browser_listen(),
            ws_path: default_ws_path(),
            assets_dir: None,
            max_frame_bytes: default_max_frame_bytes(),
            queue_capacity: default_queue_capacity(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: 0,
        }
    }
}

impl BrowserSection {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| RelayError::BadConfig(format!("browser.listen is not a socket address: {}", self.listen)))
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !self.ws_path.starts_with('/') {
            return Err(RelayError::BadConfig("browser.ws_path must start with '/'".into()));
        }
        if OPS_PATHS.contains(&self.ws_path.as_str()) {
            return Err(RelayError::BadConfig(format!(
                "browser.ws_path {} is taken by an ops endpoint",
                self.ws_path
            )));
        }
        if self.ws_path.contains(|c: char| c == ':' || c == '*') {
            return Err(RelayError::BadConfig(
                "browser.ws_path must be a literal path (no ':' or '*')".into(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(RelayError::BadConfig("browser.max_frame_bytes must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::BadConfig("browser.queue_capacity must be > 0".into()));
        }
        if !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(RelayError::BadConfig(
                "browser.ping_interval_ms must be between 1000 and 120000".into(),
            ));
        }
        if self.idle_timeout_ms != 0 && self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(RelayError::BadConfig(
                "browser.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Editor-facing line-delimited TCP listener.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditorSection {
    #[serde(default = "default_editor_listen")]
    pub listen: String,

    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            listen: default_editor_listen(),
            max_line_bytes: default_max_line_bytes(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl EditorSection {
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| RelayError::BadConfig(format!("editor.listen is not a socket address: {}", self.listen)))
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.max_line_bytes == 0 {
            return Err(RelayError::BadConfig("editor.max_line_bytes must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(RelayError::BadConfig("editor.queue_capacity must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingSection {
    /// Also tell the browser when the editor connects/disconnects.
    #[serde(default)]
    pub notify_browser_of_editor: bool,
}

fn default_browser_listen() -> String {
    "127.0.0.1:5007".into()
}
fn default_editor_listen() -> String {
    "127.0.0.1:5008".into()
}
fn default_ws_path() -> String {
    "/ws".into()
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}
fn default_max_line_bytes() -> usize {
    diagram_relay_core::protocol::DEFAULT_MAX_LINE_BYTES
}
fn default_queue_capacity() -> usize {
    256
}
fn default_ping_interval_ms() -> u64 {
    20000
}
