//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Property and integration tests for the escape notation codec

use avemu_escapecodec::{CodecError, decode, encode};
use proptest::prelude::*;

proptest! {
    #[test]
    fn decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let text = encode(&bytes);
        prop_assert_eq!(&decode(&text).unwrap()[..], &bytes[..]);
    }

    #[test]
    fn encode_is_printable_ascii(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let text = encode(&bytes);
        prop_assert!(text.bytes().all(|b| (0x20..=0x7e).contains(&b)));
    }

    #[test]
    fn reencoding_is_stable(text in "[ -~]{0,64}") {
        // Any printable text that decodes must re-render to a fixed point
        if let Ok(bytes) = decode(&text) {
            let canonical = encode(&bytes);
            prop_assert_eq!(encode(&decode(&canonical).unwrap()), canonical);
        }
    }
}

#[test]
fn test_device_protocol_samples() {
    // Samples in the style of projector and switcher control protocols
    let cases: &[(&str, &[u8])] = &[
        (r"PWR ON\x0d", b"PWR ON\r"),
        (r"\x02\x30\x31\x03", b"\x0201\x03"),
        (r"%1POWR 1\r", b"%1POWR 1\r"),
        (r"*pow=?#\r\n", b"*pow=?#\r\n"),
        ("ON_CONNECT", b"ON_CONNECT"),
    ];
    for (text, expected) in cases {
        assert_eq!(&decode(text).unwrap()[..], *expected, "decoding {text}");
    }
}

#[test]
fn test_malformed_hex_reports_escape_offset() {
    let err = decode(r"MUTE\x1").unwrap_err();
    assert_eq!(err, CodecError::TruncatedHex { position: 4 });
    assert_eq!(err.position(), 4);
}
