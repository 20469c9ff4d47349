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

//! Error types for the emulation engine

use crate::types::SessionId;
use avemu_device::ConfigError;
use avemu_escapecodec::CodecError;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Reasons a listener refuses to open.
///
/// In every case the engine stays closed.
#[derive(Debug, Error)]
pub enum BindError {
    /// Port below the configured minimum
    #[error("Port {port} is below {minimum}")]
    PrivilegedPort {
        /// Requested port
        port: u16,
        /// Lowest acceptable port
        minimum: u16,
    },

    /// No device has been loaded
    #[error("No device emulator file has been loaded")]
    NoConfig,

    /// The loaded device has no commands
    #[error("Device has no commands")]
    EmptyTable,

    /// A listener is already open
    #[error("Already listening on port {0}")]
    AlreadyListening(u16),

    /// The operating system refused the bind
    #[error("Failed to bind port {port}: {source}")]
    Io {
        /// Requested port
        port: u16,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Failures at the extension hook boundary
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook raised an error while running
    #[error("Script raised: {0}")]
    Raised(String),

    /// The hook returned text that is not valid escape notation
    #[error("Script returned malformed text: {0}")]
    Malformed(#[from] CodecError),

    /// The hook could not be loaded
    #[error("Script import failed: {0}")]
    Load(String),

    /// Custom function index outside `1..=5`
    #[error("No custom function {0}")]
    InvalidIndex(usize),
}

/// Failures writing to a session
#[derive(Debug, Error)]
pub enum WriteError {
    /// The session is closed
    #[error("Session closed")]
    Closed,

    /// The socket write failed
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine error types
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operator text is not valid escape notation
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Device file could not be loaded
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Listener could not be opened
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    /// Extension hook failed
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    /// Session write failed
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No session is active
    #[error("No TCP connection detected")]
    NoConnection,

    /// No extension hook is installed
    #[error("No script functions are loaded")]
    NoHook,

    /// No device file path is known to reload from
    #[error("No device emulator file has been loaded")]
    NoConfigPath,

    /// Operation requires the listener to be closed
    #[error("Please close the open port first")]
    PortOpen,

    /// Session with the given ID was not found
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),
}

impl EngineError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors leave the engine usable; retrying later (with a
    /// peer connected, a fixed file, another port) may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Io(_))
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            EngineError::NoConnection
                | EngineError::SessionNotFound(_)
                | EngineError::Write(_)
                | EngineError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_connection_error() {
        assert!(EngineError::NoConnection.is_connection_error());
        assert!(EngineError::Write(WriteError::Closed).is_connection_error());
        assert!(!EngineError::NoHook.is_connection_error());
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(EngineError::Bind(BindError::NoConfig).is_recoverable());
        assert!(EngineError::PortOpen.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::from(BindError::PrivilegedPort {
            port: 80,
            minimum: 1024,
        });
        assert_eq!(err.to_string(), "Bind error: Port 80 is below 1024");

        let err = EngineError::SessionNotFound(SessionId::new(7));
        assert_eq!(err.to_string(), "Session session-7 not found");
    }
}
