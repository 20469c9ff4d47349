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

//! Exact-match command table

use crate::CommandRecord;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Ordered query/response pairs with exact-equality lookup.
///
/// The index maps each distinct query to the first record carrying it, so
/// duplicate queries resolve to the earliest entry in table order. The
/// connect sentinel is kept out of the index and can never be matched by
/// inbound data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandTable {
    records: Vec<CommandRecord>,
    index: HashMap<Bytes, usize>,
    on_connect: Option<usize>,
}

impl CommandTable {
    /// Build a table from records in their configured order
    pub fn new(records: Vec<CommandRecord>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        let mut on_connect = None;

        for (position, record) in records.iter().enumerate() {
            if record.is_on_connect() {
                if on_connect.is_none() {
                    on_connect = Some(position);
                } else {
                    debug!(position, "Ignoring additional connect sentinel");
                }
                continue;
            }
            index.entry(record.query().clone()).or_insert(position);
        }

        Self {
            records,
            index,
            on_connect,
        }
    }

    /// Find the record whose query equals `received` exactly
    ///
    /// # Example
    /// ```
    /// use avemu_device::{CommandRecord, CommandTable};
    ///
    /// let table = CommandTable::new(vec![CommandRecord::new("Ping", "PING", "PONG")]);
    /// assert!(table.lookup(b"PING").is_some());
    /// assert!(table.lookup(b"PING\r").is_none());
    /// ```
    pub fn lookup(&self, received: &[u8]) -> Option<&CommandRecord> {
        self.index
            .get(received)
            .and_then(|&position| self.records.get(position))
    }

    /// The connect sentinel, if the table has one
    pub fn on_connect(&self) -> Option<&CommandRecord> {
        self.on_connect
            .and_then(|position| self.records.get(position))
    }

    /// All records in configured order, sentinel included
    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    /// Iterate over records in configured order
    pub fn iter(&self) -> impl Iterator<Item = &CommandRecord> {
        self.records.iter()
    }

    /// Number of records, sentinel included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records at all
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<CommandRecord> for CommandTable {
    fn from_iter<I: IntoIterator<Item = CommandRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ON_CONNECT;

    fn table(entries: &[(&str, &str, &str)]) -> CommandTable {
        entries
            .iter()
            .map(|&(description, query, response)| {
                CommandRecord::new(
                    description,
                    Bytes::copy_from_slice(query.as_bytes()),
                    Bytes::copy_from_slice(response.as_bytes()),
                )
            })
            .collect()
    }

    #[test]
    fn test_exact_match_only() {
        let table = table(&[("Ping", "PING", "PONG")]);
        assert_eq!(&table.lookup(b"PING").unwrap().response()[..], b"PONG");
        assert!(table.lookup(b"ping").is_none());
        assert!(table.lookup(b"PIN").is_none());
        assert!(table.lookup(b"PING\r\n").is_none());
    }

    #[test]
    fn test_duplicate_queries_first_wins() {
        let table = table(&[("One", "X", "1"), ("Two", "X", "2")]);
        for _ in 0..10 {
            assert_eq!(&table.lookup(b"X").unwrap().response()[..], b"1");
        }
    }

    #[test]
    fn test_sentinel_located_by_content() {
        let table = table(&[
            ("Ping", "PING", "PONG"),
            (ON_CONNECT, ON_CONNECT, "READY"),
        ]);
        assert_eq!(&table.on_connect().unwrap().response()[..], b"READY");
    }

    #[test]
    fn test_sentinel_never_matched() {
        let table = table(&[(ON_CONNECT, ON_CONNECT, "READY")]);
        assert!(table.lookup(ON_CONNECT.as_bytes()).is_none());
    }

    #[test]
    fn test_first_sentinel_is_meaningful() {
        let table = table(&[
            (ON_CONNECT, ON_CONNECT, "FIRST"),
            (ON_CONNECT, ON_CONNECT, "SECOND"),
        ]);
        assert_eq!(&table.on_connect().unwrap().response()[..], b"FIRST");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_table() {
        let table = CommandTable::default();
        assert!(table.is_empty());
        assert!(table.on_connect().is_none());
        assert!(table.lookup(b"").is_none());
    }
}
