//! Action envelope (shared by both transports).
//!
//! The envelope is kept as the raw JSON text it arrived as. Only `clientId` and
//! `action.kind` are peeked at, for validation and logging; everything else is
//! forwarded byte-for-byte.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::{RelayError, Result};

/// One diagram action plus the optional session id it belongs to.
///
/// Wire shape: `{ "clientId"?: string, "action": { "kind": string, ... } }`.
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ActionEnvelope {
    raw: Box<RawValue>,
    client_id: Option<String>,
    kind: String,
}

/// Top-level members, left undecoded. Only JSON objects deserialize into a
/// map, so arrays and scalars are rejected here.
type Members = BTreeMap<String, Box<RawValue>>;

impl ActionEnvelope {
    /// Validate an already-parsed JSON value as an envelope.
    pub fn from_raw(raw: Box<RawValue>) -> Result<Self> {
        let head: Members = serde_json::from_str(raw.get())
            .map_err(|e| RelayError::MalformedEnvelope(format!("not an envelope object: {e}")))?;

        let client_id = match head.get("clientId") {
            Some(v) => serde_json::from_str::<Option<String>>(v.get())
                .map_err(|_| RelayError::MalformedEnvelope("clientId must be a string".into()))?,
            None => None,
        };

        let action = head
            .get("action")
            .ok_or_else(|| RelayError::MalformedEnvelope("missing action".into()))?;

        let action: Members = serde_json::from_str(action.get())
            .map_err(|e| RelayError::MalformedEnvelope(format!("action is not an object: {e}")))?;

        let kind = match action.get("kind") {
            Some(k) => serde_json::from_str::<String>(k.get())
                .map_err(|_| RelayError::MalformedEnvelope("action.kind must be a string".into()))?,
            None => return Err(RelayError::MalformedEnvelope("missing action.kind".into())),
        };

        // The editor side is line-framed; pretty-printed input must not leak
        // raw newlines into an encoded line.
        let raw = if raw.get().contains(|c: char| c == '\n' || c == '\r') {
            RawValue::from_string(compact(raw.get()))
                .map_err(|e| RelayError::Internal(format!("compact envelope failed: {e}")))?
        } else {
            raw
        };

        Ok(Self {
            raw,
            client_id,
            kind,
        })
    }

    /// Build an envelope originating in the relay itself.
    pub fn new(client_id: Option<&str>, action: serde_json::Value) -> Result<Self> {
        let mut obj = serde_json::Map::new();
        if let Some(id) = client_id {
            obj.insert("clientId".into(), serde_json::Value::String(id.to_owned()));
        }
        obj.insert("action".into(), action);
        let raw = serde_json::value::to_raw_value(&obj)
            .map_err(|e| RelayError::Internal(format!("envelope encode failed: {e}")))?;
        Self::from_raw(raw)
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The action discriminator. Opaque to the relay; used for logging.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Exact JSON text of the envelope, as it will be forwarded.
    pub fn as_json(&self) -> &str {
        self.raw.get()
    }
}

impl FromStr for ActionEnvelope {
    type Err = RelayError;

    /// Parse one browser frame. Invalid JSON is a `Parse` error; valid JSON
    /// that is not an envelope is a `MalformedEnvelope` error.
    fn from_str(s: &str) -> Result<Self> {
        let raw: Box<RawValue> =
            serde_json::from_str(s).map_err(|e| RelayError::Parse(format!("invalid json: {e}")))?;
        Self::from_raw(raw)
    }
}

impl Serialize for ActionEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ActionEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Self::from_raw(raw).map_err(D::Error::custom)
    }
}

/// Strip insignificant whitespace, preserving key order and string contents.
fn compact(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_str = false;
    let mut escaped = false;
    for c in json.chars() {
        if in_str {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_str = false;
            }
        } else if c == '"' {
            in_str = true;
            out.push(c);
        } else if !c.is_ascii_whitespace() {
            out.push(c);
        }
    }
    out
}
