//! Line codec vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use diagram_relay_core::protocol::LineDecoder;

mod vector_loader;
use vector_loader::LineVector;

#[test]
fn line_vectors() {
    let files = [
        "line_split_object.json",
        "line_batched_reads.json",
        "line_malformed_then_valid.json",
        "line_empty_and_crlf.json",
        "line_rejected_messages.json",
    ];

    for f in files {
        let v: LineVector = vector_loader::load(f);
        let mut dec = LineDecoder::default();
        let mut got = Vec::new();
        for chunk in &v.chunks {
            dec.feed(chunk.as_bytes());
            while let Some(res) = dec.next_message() {
                got.push(res);
            }
        }

        assert_eq!(got.len(), v.expect.len(), "vector={}", v.description);
        assert_eq!(dec.buffered(), 0, "vector={}", v.description);

        for (res, ex) in got.into_iter().zip(&v.expect) {
            if let Some(code) = &ex.error {
                let e = res.expect_err("expected error");
                assert_eq!(e.kind(), code.as_str(), "vector={}", v.description);
                continue;
            }
            let msg = res.expect("expected message");
            let json: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
            assert_eq!(Some(&json), ex.message.as_ref(), "vector={}", v.description);
        }
    }
}
