//! Browser frame classification vectors.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use diagram_relay_core::protocol::ActionEnvelope;

mod vector_loader;
use vector_loader::FrameVector;

#[test]
fn envelope_frames() {
    let vectors: Vec<FrameVector> = vector_loader::load("envelope_frames.json");

    for v in vectors {
        let res = v.frame.parse::<ActionEnvelope>();

        if let Some(code) = v.error {
            let e = res.expect_err("expected error");
            assert_eq!(e.kind(), code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected envelope");
        assert_eq!(Some(env.kind()), v.kind.as_deref(), "vector={}", v.description);
        assert_eq!(env.client_id(), v.client_id.as_deref(), "vector={}", v.description);
        assert_eq!(env.as_json(), v.frame, "vector={}", v.description);
    }
}
