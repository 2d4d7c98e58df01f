//! Editor-facing RPC messages.
//!
//! The method set is closed. `params` is only meaningful for
//! `diagram/action`; lifecycle notifications carry none and any `params` sent
//! with them is ignored.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{RelayError, Result};
use crate::protocol::envelope::ActionEnvelope;

pub const METHOD_DIAGRAM_ACTION: &str = "diagram/action";
pub const METHOD_BROWSER_CONNECTED: &str = "browser/connected";
pub const METHOD_BROWSER_DISCONNECTED: &str = "browser/disconnected";

/// One message on the editor channel.
#[derive(Debug, Clone)]
pub enum RpcMessage {
    DiagramAction(ActionEnvelope),
    BrowserConnected,
    BrowserDisconnected,
}

#[derive(Deserialize)]
struct RpcHead {
    method: String,
    #[serde(default)]
    params: Option<Box<RawValue>>,
}

#[derive(Serialize)]
struct RpcOut<'a> {
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a ActionEnvelope>,
}

impl RpcMessage {
    pub fn method(&self) -> &'static str {
        match self {
            RpcMessage::DiagramAction(_) => METHOD_DIAGRAM_ACTION,
            RpcMessage::BrowserConnected => METHOD_BROWSER_CONNECTED,
            RpcMessage::BrowserDisconnected => METHOD_BROWSER_DISCONNECTED,
        }
    }

    /// Decode one line's worth of JSON (delimiter already stripped).
    pub fn from_slice(line: &[u8]) -> Result<Self> {
        let head: RpcHead = serde_json::from_slice(line)
            .map_err(|e| RelayError::Parse(format!("invalid rpc json: {e}")))?;

        match head.method.as_str() {
            METHOD_DIAGRAM_ACTION => {
                let params = head
                    .params
                    .ok_or_else(|| RelayError::MalformedEnvelope("diagram/action without params".into()))?;
                Ok(RpcMessage::DiagramAction(ActionEnvelope::from_raw(params)?))
            }
            METHOD_BROWSER_CONNECTED => Ok(RpcMessage::BrowserConnected),
            METHOD_BROWSER_DISCONNECTED => Ok(RpcMessage::BrowserDisconnected),
            other => Err(RelayError::UnknownMethod(other.to_owned())),
        }
    }

    /// Serialize to JSON without the line delimiter.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let out = RpcOut {
            method: self.method(),
            params: match self {
                RpcMessage::DiagramAction(env) => Some(env),
                _ => None,
            },
        };
        serde_json::to_vec(&out).map_err(|e| RelayError::Internal(format!("rpc encode failed: {e}")))
    }
}
