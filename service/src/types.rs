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

//! Core types for the emulation engine

use crate::MetricsSnapshot;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Unique identifier for a session (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Session state (stored as atomic u8 for lock-free state management)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Socket accepted, connect sequence not yet run
    Connecting = 0,
    /// Processing inbound data
    Open = 1,
    /// Terminal state
    Closed = 2,
}

impl SessionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the session is in its terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Check if the session is processing data
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Session information snapshot
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session ID
    pub id: SessionId,
    /// Current state
    pub state: SessionState,
    /// Remote peer address
    pub peer_addr: SocketAddr,
    /// When the socket was accepted
    pub opened_at: Instant,
    /// Total bytes written to the peer
    pub bytes_sent: u64,
    /// Total bytes read from the peer
    pub bytes_received: u64,
}

impl SessionInfo {
    /// Time since the socket was accepted
    pub fn duration(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// Point in time view of the engine
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    /// Whether the listener is open
    pub listening: bool,
    /// Port the listener is bound to (0 when closed)
    pub bound_port: u16,
    /// Session receiving operator sends
    pub active_session: Option<SessionId>,
    /// Number of open sessions
    pub session_count: usize,
    /// `Manufacturer - Model` of the loaded device
    pub device: Option<String>,
    /// Whether an extension hook is installed
    pub hook_loaded: bool,
    /// Whether unmatched input is answered silently
    pub hook_suppressed_logging: bool,
    /// Engine counters
    pub metrics: MetricsSnapshot,
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = self.device.as_deref().unwrap_or("no device");
        if self.listening {
            write!(f, "{} on port {}", device, self.bound_port)?;
        } else {
            write!(f, "{} (port closed)", device)?;
        }
        match self.active_session {
            Some(id) => write!(f, ", {} sessions, active {}", self.session_count, id),
            None => write!(f, ", {} sessions, no active session", self.session_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id() {
        let id1 = SessionId::new(1);
        let id2 = SessionId::new(2);

        assert_eq!(id1.as_u64(), 1);
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id2.to_string(), "session-2");
    }

    #[test]
    fn test_session_state_conversion() {
        for state in [
            SessionState::Connecting,
            SessionState::Open,
            SessionState::Closed,
        ] {
            assert_eq!(SessionState::from_u8(state.as_u8()), state);
        }
        assert_eq!(SessionState::from_u8(200), SessionState::Closed);
    }

    #[test]
    fn test_session_state_predicates() {
        assert!(!SessionState::Connecting.is_open());
        assert!(SessionState::Open.is_open());
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Open.is_terminal());
    }
}
