//! Wire formats for both sides of the relay.
//!
//! - Browser side: one action envelope per WebSocket text frame.
//! - Editor side: RPC messages, one JSON object per `\n`-terminated line.
//!
//! All parsers are panic-free: malformed input is reported as `RelayError`
//! and never indexes past what was actually received.

pub mod envelope;
pub mod line;
pub mod rpc;

pub use envelope::ActionEnvelope;
pub use line::{encode_line, LineDecoder, DEFAULT_MAX_LINE_BYTES};
pub use rpc::{RpcMessage, METHOD_BROWSER_CONNECTED, METHOD_BROWSER_DISCONNECTED, METHOD_DIAGRAM_ACTION};
