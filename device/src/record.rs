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

//! Command records

use avemu_escapecodec::{CodecResult, decode};
use bytes::Bytes;

/// Reserved token marking the record sent automatically on connect
pub const ON_CONNECT: &str = "ON_CONNECT";

/// A single configured query and its canned response.
///
/// Both byte sequences are exact and immutable once the record is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    description: String,
    query: Bytes,
    response: Bytes,
}

impl CommandRecord {
    /// Create a record from raw bytes
    pub fn new(
        description: impl Into<String>,
        query: impl Into<Bytes>,
        response: impl Into<Bytes>,
    ) -> Self {
        Self {
            description: description.into(),
            query: query.into(),
            response: response.into(),
        }
    }

    /// Create a record from escape notation
    ///
    /// # Example
    /// ```
    /// use avemu_device::CommandRecord;
    ///
    /// let record = CommandRecord::from_escaped("Power", r"PWR\x0d", "OK").unwrap();
    /// assert_eq!(&record.query()[..], b"PWR\r");
    /// ```
    pub fn from_escaped(
        description: impl Into<String>,
        query: &str,
        response: &str,
    ) -> CodecResult<Self> {
        Ok(Self::new(description, decode(query)?, decode(response)?))
    }

    /// The human readable label of this record
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Bytes that trigger this record
    pub fn query(&self) -> &Bytes {
        &self.query
    }

    /// Bytes written back when the query matches
    pub fn response(&self) -> &Bytes {
        &self.response
    }

    /// Whether this is the connect sentinel.
    ///
    /// Either the description or the query may carry the token.
    pub fn is_on_connect(&self) -> bool {
        self.description == ON_CONNECT || self.query.as_ref() == ON_CONNECT.as_bytes()
    }
}
