#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use diagram_relay_gateway::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
browser:
  listen: "127.0.0.1:5007"
editor:
  listn: "127.0.0.1:5008" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind(), "bad_config");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.browser.listen, "127.0.0.1:5007");
    assert_eq!(cfg.browser.ws_path, "/ws");
    assert_eq!(cfg.editor.listen, "127.0.0.1:5008");
    assert!(cfg.browser.assets_dir.is_none());
    assert!(!cfg.routing.notify_browser_of_editor);
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
browser:
  listen: "127.0.0.1:7000"
  ws_path: "/diagram"
  assets_dir: "./viewer/dist"
  max_frame_bytes: 65536
  queue_capacity: 32
  ping_interval_ms: 5000
  idle_timeout_ms: 30000
editor:
  listen: "127.0.0.1:7001"
  max_line_bytes: 131072
  queue_capacity: 64
routing:
  notify_browser_of_editor: true
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.browser.ws_path, "/diagram");
    assert_eq!(cfg.browser.assets_dir.as_deref(), Some("./viewer/dist"));
    assert_eq!(cfg.editor.max_line_bytes, 131072);
    assert!(cfg.routing.notify_browser_of_editor);
}

#[test]
fn rejects_bad_values() {
    let cases = [
        ("version: 2\n", "unsupported_version"),
        ("version: 1\nbrowser: { listen: \"localhost\" }\n", "bad_config"),
        ("version: 1\nbrowser: { ws_path: \"ws\" }\n", "bad_config"),
        ("version: 1\nbrowser: { ws_path: \"/metrics\" }\n", "bad_config"),
        ("version: 1\nbrowser: { ws_path: \"/healthz\" }\n", "bad_config"),
        ("version: 1\nbrowser: { ws_path: \"/ws/:id\" }\n", "bad_config"),
        ("version: 1\nbrowser: { ws_path: \"/ws/*rest\" }\n", "bad_config"),
        ("version: 1\neditor: { queue_capacity: 0 }\n", "bad_config"),
        ("version: 1\nbrowser: { ping_interval_ms: 20000, idle_timeout_ms: 10000 }\n", "bad_config"),
        (
            "version: 1\nbrowser: { listen: \"127.0.0.1:9000\" }\neditor: { listen: \"127.0.0.1:9000\" }\n",
            "bad_config",
        ),
    ];

    for (yaml, kind) in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.kind(), kind, "yaml={yaml}");
    }
}

#[test]
fn validated_ws_path_builds_router() {
    use diagram_relay_gateway::{app_state::AppState, router};

    for path in ["/ws", "/diagram/socket"] {
        let yaml = format!("version: 1\nbrowser: {{ ws_path: \"{path}\" }}\n");
        let cfg = config::load_from_str(&yaml).expect("must parse");
        let state = AppState::new(cfg).expect("state");
        let _ = router::build_router(state);
    }
}
