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

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while decoding escape notation.
///
/// Positions are byte offsets into the escaped text, pointing at the
/// backslash that starts the offending escape (or at the offending character).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A `\x` escape was followed by something other than a hex digit.
    #[error("invalid hex digit {found:?} in escape at offset {position}")]
    InvalidHex {
        /// Offset of the `\x` escape
        position: usize,
        /// The character found where a hex digit was expected
        found: char,
    },

    /// The text ended before both hex digits of a `\x` escape were read.
    #[error("truncated hex escape at offset {position}")]
    TruncatedHex {
        /// Offset of the `\x` escape
        position: usize,
    },

    /// A literal character has no single-byte representation.
    #[error("character {character:?} at offset {position} does not fit in one byte")]
    Unrepresentable {
        /// Offset of the character
        position: usize,
        /// The character itself
        character: char,
    },
}

impl CodecError {
    /// Offset into the escaped text where the error was detected
    pub fn position(&self) -> usize {
        match self {
            CodecError::InvalidHex { position, .. }
            | CodecError::TruncatedHex { position }
            | CodecError::Unrepresentable { position, .. } => *position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::InvalidHex {
            position: 3,
            found: 'g',
        };
        assert_eq!(err.to_string(), "invalid hex digit 'g' in escape at offset 3");

        let err = CodecError::TruncatedHex { position: 0 };
        assert_eq!(err.to_string(), "truncated hex escape at offset 0");
    }

    #[test]
    fn test_error_position() {
        let err = CodecError::Unrepresentable {
            position: 7,
            character: '€',
        };
        assert_eq!(err.position(), 7);
    }
}
