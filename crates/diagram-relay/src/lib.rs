//! Top-level facade crate for the diagram relay.
//!
//! Re-exports the wire contracts and the gateway library so the editor plugin's
//! tooling can depend on a single crate.

pub mod core {
    pub use diagram_relay_core::*;
}

pub mod gateway {
    pub use diagram_relay_gateway::*;
}
