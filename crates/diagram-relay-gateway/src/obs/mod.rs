//! Lightweight in-process metrics (dependency-free beyond `dashmap`).
//!
//! Counters are stored as atomics and rendered by the `/metrics` handler.

pub mod metrics;

pub use metrics::RelayMetrics;
