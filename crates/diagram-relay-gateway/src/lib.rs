//! Diagram relay gateway library entry.
//!
//! This crate wires the browser and editor transports, the action router, the
//! config loader, and the ops endpoints into the sidecar process. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod relay;
pub mod router;
pub mod transport;
