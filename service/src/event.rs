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

//! Events reported to observers

use crate::types::SessionId;
use avemu_escapecodec::encode;
use bytes::Bytes;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of an engine event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Bytes received from a peer
    Inbound,
    /// Bytes written to a peer
    Outbound,
    /// Lifecycle notice
    Info,
    /// Something failed
    Error,
    /// Hook output delivered as if the device pushed it
    FeedbackPush,
}

impl EventKind {
    /// Two letter direction tag used in log lines
    pub fn tag(self) -> &'static str {
        match self {
            Self::Inbound => "IN",
            Self::Outbound => "OU",
            Self::Info => "--",
            Self::Error => "ER",
            Self::FeedbackPush => "FB",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Raw bytes as seen on the wire
    Bytes(Bytes),
    /// Human readable text
    Text(String),
}

impl EventPayload {
    /// Payload bytes, if this is a byte payload
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(_) => None,
        }
    }

    /// Payload text, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Bytes(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
        }
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.write_str(&encode(bytes)),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A timestamped engine event
#[derive(Debug, Clone)]
pub struct EngineEvent {
    /// Event kind
    pub kind: EventKind,
    /// Session the event belongs to, if any
    pub session: Option<SessionId>,
    /// Event payload
    pub payload: EventPayload,
    /// When the event was produced
    pub timestamp: SystemTime,
}

impl EngineEvent {
    fn new(kind: EventKind, session: Option<SessionId>, payload: EventPayload) -> Self {
        Self {
            kind,
            session,
            payload,
            timestamp: SystemTime::now(),
        }
    }

    /// Bytes received on a session
    pub fn inbound(session: SessionId, bytes: Bytes) -> Self {
        Self::new(EventKind::Inbound, Some(session), EventPayload::Bytes(bytes))
    }

    /// Bytes written to a session
    pub fn outbound(session: SessionId, bytes: Bytes) -> Self {
        Self::new(EventKind::Outbound, Some(session), EventPayload::Bytes(bytes))
    }

    /// Lifecycle notice
    pub fn info(session: Option<SessionId>, text: impl Into<String>) -> Self {
        Self::new(EventKind::Info, session, EventPayload::Text(text.into()))
    }

    /// Failure notice
    pub fn error(session: Option<SessionId>, text: impl Into<String>) -> Self {
        Self::new(EventKind::Error, session, EventPayload::Text(text.into()))
    }

    /// Hook output pushed to observers instead of the peer
    pub fn feedback(session: Option<SessionId>, bytes: Bytes) -> Self {
        Self::new(EventKind::FeedbackPush, session, EventPayload::Bytes(bytes))
    }

    /// Render as `DIR | HH:MM:SS.mmm | payload`
    ///
    /// With `byte_count` set, byte payloads get a ` (N bytes)` suffix.
    pub fn display_line(&self, byte_count: bool) -> String {
        let mut line = format!(
            "{} | {} | {}",
            self.kind.tag(),
            clock(self.timestamp),
            self.payload
        );
        if byte_count && let EventPayload::Bytes(bytes) = &self.payload {
            line.push_str(&format!(" ({} bytes)", bytes.len()));
        }
        line
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line(false))
    }
}

/// UTC wall clock time of day as `HH:MM:SS.mmm`
fn clock(timestamp: SystemTime) -> String {
    let since_epoch = timestamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since_epoch.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
        since_epoch.subsec_millis()
    )
}
