//! Minimal metrics registry for the relay.
//!
//! Counters with dynamic labels backed by `DashMap`. Labels are flattened into
//! sorted key vectors to keep deterministic ordering.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let label_str = r
                .key()
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str, val);
        }
    }
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

#[derive(Default)]
pub struct RelayMetrics {
    /// Messages handed to a destination queue, by `to` side.
    pub forwarded: CounterVec,
    /// Messages dropped before reaching a destination, by `to` side and `reason`.
    pub dropped: CounterVec,
    /// Inbound frames/lines rejected, by `side` and error `kind`.
    pub decode_errors: CounterVec,
    /// Slot transitions, by `side` and `event` (connected/replaced/disconnected).
    pub lifecycle: CounterVec,
    draining: AtomicBool,
}

impl RelayMetrics {
    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }
    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render all registered metrics plus any extra lines provided by callers.
    pub fn render(&self, extra: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.forwarded.render("diagram_relay_forwarded_total", &mut out);
        self.dropped.render("diagram_relay_dropped_total", &mut out);
        self.decode_errors.render("diagram_relay_decode_errors_total", &mut out);
        self.lifecycle.render("diagram_relay_lifecycle_events_total", &mut out);

        let _ = writeln!(
            out,
            "# TYPE diagram_relay_draining gauge\ndiagram_relay_draining {}",
            if self.is_draining() { 1 } else { 0 }
        );
        for (k, v) in extra {
            let _ = writeln!(out, "{} {}", k, v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_order_does_not_matter() {
        let m = RelayMetrics::default();
        m.dropped.inc(&[("to", "editor"), ("reason", "no_destination")]);
        m.dropped.inc(&[("reason", "no_destination"), ("to", "editor")]);
        assert_eq!(m.dropped.get(&[("to", "editor"), ("reason", "no_destination")]), 2);
        assert_eq!(m.dropped.get(&[("to", "browser"), ("reason", "no_destination")]), 0);
    }

    #[test]
    fn renders_prometheus_text() {
        let m = RelayMetrics::default();
        m.forwarded.inc(&[("to", "browser")]);
        let text = m.render(&[("diagram_relay_browser_connected", 1)]);
        assert!(text.contains("diagram_relay_forwarded_total{to=\"browser\"} 1"));
        assert!(text.contains("diagram_relay_draining 0"));
        assert!(text.contains("diagram_relay_browser_connected 1"));
    }
}
