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

use crate::{CodecError, CodecResult};
use bytes::{BufMut, Bytes, BytesMut};
use std::iter::Peekable;
use std::str::CharIndices;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Decodes escape notation into the raw bytes it describes.
///
/// Literal characters map to their Latin-1 byte, `\xHH` yields one byte, and
/// `\\`, `\r`, `\n`, `\t` yield their control bytes. Any other escape is kept
/// verbatim, backslash included. An empty string decodes to an empty buffer.
///
/// # Errors
///
/// Fails with [`CodecError`] when a `\x` escape is not followed by two hex
/// digits, or when a literal character is above U+00FF.
///
/// # Example
/// ```
/// use avemu_escapecodec::decode;
///
/// assert_eq!(&decode(r"\x02STX\x03").unwrap()[..], b"\x02STX\x03");
/// assert_eq!(&decode(r"C:\dir").unwrap()[..], br"C:\dir");
/// assert!(decode(r"\xZZ").is_err());
/// ```
pub fn decode(escaped: &str) -> CodecResult<Bytes> {
    let mut out = BytesMut::with_capacity(escaped.len());
    let mut chars = escaped.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        if ch != '\\' {
            out.put_u8(latin1(position, ch)?);
            continue;
        }

        let byte = match chars.peek().map(|&(_, next)| next) {
            Some('x') => {
                chars.next();
                let high = hex_digit(&mut chars, position)?;
                let low = hex_digit(&mut chars, position)?;
                (high << 4) | low
            }
            Some('\\') => {
                chars.next();
                b'\\'
            }
            Some('r') => {
                chars.next();
                b'\r'
            }
            Some('n') => {
                chars.next();
                b'\n'
            }
            Some('t') => {
                chars.next();
                b'\t'
            }
            // Unrecognized: keep the backslash, the next char is read as a literal
            _ => b'\\',
        };
        out.put_u8(byte);
    }

    Ok(out.freeze())
}

/// Encodes raw bytes into canonical escape notation.
///
/// Printable ASCII other than the backslash is written literally, the
/// backslash as `\\`, and every other byte as a lowercase `\xHH` escape, so
/// that `decode(&encode(b)) == b` holds for any input.
///
/// # Example
/// ```
/// use avemu_escapecodec::encode;
///
/// assert_eq!(encode(b"PWR\r"), r"PWR\x0d");
/// assert_eq!(encode(br"a\b"), r"a\\b");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str(r"\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                out.push_str(r"\x");
                out.push(HEX_DIGITS[usize::from(byte >> 4)] as char);
                out.push(HEX_DIGITS[usize::from(byte & 0x0f)] as char);
            }
        }
    }
    out
}

fn latin1(position: usize, character: char) -> CodecResult<u8> {
    u8::try_from(u32::from(character)).map_err(|_| CodecError::Unrepresentable {
        position,
        character,
    })
}

fn hex_digit(chars: &mut Peekable<CharIndices<'_>>, position: usize) -> CodecResult<u8> {
    match chars.next() {
        None => Err(CodecError::TruncatedHex { position }),
        Some((_, found)) => found
            .to_digit(16)
            .map(|digit| digit as u8)
            .ok_or(CodecError::InvalidHex { position, found }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_ascii() {
        assert_eq!(&decode("PING").unwrap()[..], b"PING");
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_mixed_hex() {
        assert_eq!(&decode(r"hello\x0d\x0a").unwrap()[..], b"hello\r\n");
        assert_eq!(&decode(r"\x35\x75\x0D\x0A").unwrap()[..], b"5u\r\n");
    }

    #[test]
    fn test_decode_control_escapes() {
        assert_eq!(&decode(r"hello\r\n").unwrap()[..], b"hello\r\n");
        assert_eq!(&decode(r"a\tb").unwrap()[..], b"a\tb");
        assert_eq!(&decode(r"a\\b").unwrap()[..], br"a\b");
    }

    #[test]
    fn test_decode_escaped_backslash_before_x() {
        // `\\x41` is a literal backslash followed by the text x41
        assert_eq!(&decode(r"\\x41").unwrap()[..], br"\x41");
    }

    #[test]
    fn test_decode_unrecognized_escape_passes_through() {
        assert_eq!(&decode(r"\q").unwrap()[..], br"\q");
        assert_eq!(&decode(r"\X41").unwrap()[..], br"\X41");
        assert_eq!(&decode("end\\").unwrap()[..], b"end\\");
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(&decode("\u{e9}").unwrap()[..], &[0xe9]);
        assert_eq!(
            decode("ab\u{20ac}"),
            Err(CodecError::Unrepresentable {
                position: 2,
                character: '\u{20ac}'
            })
        );
    }

    #[test]
    fn test_decode_invalid_hex() {
        assert_eq!(
            decode(r"ok\xg0"),
            Err(CodecError::InvalidHex {
                position: 2,
                found: 'g'
            })
        );
        assert_eq!(
            decode(r"\x4z"),
            Err(CodecError::InvalidHex {
                position: 0,
                found: 'z'
            })
        );
    }

    #[test]
    fn test_decode_truncated_hex() {
        assert_eq!(decode(r"\x"), Err(CodecError::TruncatedHex { position: 0 }));
        assert_eq!(
            decode(r"abc\x4"),
            Err(CodecError::TruncatedHex { position: 3 })
        );
    }

    #[test]
    fn test_encode_canonical() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"PONG"), "PONG");
        assert_eq!(encode(b"\x00\xff"), r"\x00\xff");
        assert_eq!(encode(b"\\"), r"\\");
        assert_eq!(encode(b"\r\n"), r"\x0d\x0a");
    }

    #[test]
    fn test_reencode_is_canonical() {
        let canonical = encode(&decode(r"hello\r\n\X").unwrap());
        assert_eq!(canonical, r"hello\x0d\x0a\\X");
        assert_eq!(encode(&decode(&canonical).unwrap()), canonical);
    }
}
