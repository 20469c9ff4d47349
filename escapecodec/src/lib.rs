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

//! # Avemu Escape Notation Codec
//!
//! Device protocols are authored as text: a mix of printable ASCII and `\xHH`
//! hex escapes, for example `PWR ON\x0d` or `\x02\x30\x31\x03`. This crate
//! converts that notation into the exact bytes written on the wire and back.
//!
//! ## Grammar
//!
//! | Text       | Bytes                        |
//! |------------|------------------------------|
//! | `a`        | `0x61` (any char up to U+00FF maps to its Latin-1 byte) |
//! | `\xHH`     | one byte, hex digits in either case |
//! | `\\`       | `0x5C`                       |
//! | `\r` `\n` `\t` | `0x0D` `0x0A` `0x09`     |
//! | `\q`       | `\q` (unrecognized escapes pass through verbatim) |
//!
//! ## Storage
//!
//! Device files are JSON, which has its own backslash escaping. A query typed
//! as `PWR\x0d` is therefore stored as `"PWR\\x0d"`; the JSON layer removes one
//! backslash and [`decode`] interprets what remains. [`encode`] produces the
//! single-layer form and the JSON serializer re-applies the doubling.
//!
//! ## Example
//!
//! ```
//! use avemu_escapecodec::{decode, encode};
//!
//! let bytes = decode(r"hello\x0d\x0a").unwrap();
//! assert_eq!(&bytes[..], b"hello\r\n");
//! assert_eq!(encode(&bytes), r"hello\x0d\x0a");
//! ```

mod codec;
mod result;

pub use codec::{decode, encode};
pub use result::{CodecError, CodecResult};
