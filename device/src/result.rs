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

//! Error types for device file handling

use avemu_escapecodec::CodecError;
use std::fmt;
use std::path::PathBuf;

/// Result type for device operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which side of a command record failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandField {
    /// The query text
    Query,
    /// The response text
    Response,
}

impl fmt::Display for CommandField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Response => write!(f, "response"),
        }
    }
}

/// Errors raised while loading or saving a device file.
///
/// A failed load never yields a partial device; callers keep whatever they
/// had loaded before.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not a well formed device description
    #[error("Malformed device file: {0}")]
    Json(#[from] serde_json::Error),

    /// A query or response is not valid escape notation
    #[error("Command {index} {field}: {source}")]
    Codec {
        /// Position of the record in the command list
        index: usize,
        /// Field that failed
        field: CommandField,
        /// Codec failure
        #[source]
        source: CodecError,
    },

    /// The delay is negative, not finite, or not a number
    #[error("Invalid response delay: {0}")]
    InvalidDelay(String),

    /// The port does not fit in 16 bits
    #[error("Invalid port: {0}")]
    InvalidPort(u64),
}
