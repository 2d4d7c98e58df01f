//! JSON test vector loader shared by line and envelope tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::fs;

use serde::Deserialize;

/// Chunks fed to a `LineDecoder` in order, and what must come out.
#[derive(Debug, Deserialize)]
pub struct LineVector {
    pub description: String,
    pub chunks: Vec<String>,
    pub expect: Vec<Expect>,
}

#[derive(Debug, Deserialize)]
pub struct Expect {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One browser frame and its expected classification.
#[derive(Debug, Deserialize)]
pub struct FrameVector {
    pub description: String,
    pub frame: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub fn load<T: serde::de::DeserializeOwned>(name: &str) -> T {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}
