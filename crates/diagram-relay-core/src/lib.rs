//! Diagram relay core: transport-agnostic wire contracts and the error surface.
//!
//! This crate defines the action envelope shared by both sides of the relay,
//! the editor-facing RPC messages, and the line-delimited codec that frames
//! them. It carries no runtime or socket dependencies so the editor plugin's
//! tooling and tests can use it directly.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input from either peer must surface as `RelayError`, never as a
//! crash of the relay process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

pub use error::{RelayError, Result, Side};
pub use protocol::{ActionEnvelope, LineDecoder, RpcMessage};
