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

//! Session I/O handle

use crate::error::WriteError;
use crate::types::{SessionId, SessionInfo, SessionState};
use crate::worker::ControlMessage;
use bytes::Bytes;
use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tracing::{debug, info, instrument, trace, warn};

/// Inbound half of a session, owned by its worker
pub(crate) type SessionReader = FramedRead<OwnedReadHalf, BytesCodec>;

/// Cloneable handle to one accepted connection
///
/// The read half belongs to the session's worker. The write half is shared
/// between the worker and operator sends, serialized by a mutex so chunks are
/// never interleaved.
#[derive(Clone)]
pub struct SessionHandle {
    writer: Arc<Mutex<FramedWrite<OwnedWriteHalf, BytesCodec>>>,
    control_tx: mpsc::Sender<ControlMessage>,

    id: SessionId,
    peer_addr: SocketAddr,
    opened_at: Instant,

    state: Arc<AtomicU8>,
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Split an accepted socket into a handle, its reader and control receiver
    #[instrument(skip(socket), fields(session_id = %id))]
    pub(crate) fn wrap(
        socket: TcpStream,
        id: SessionId,
        control_buffer_size: usize,
    ) -> std::io::Result<(Self, SessionReader, mpsc::Receiver<ControlMessage>)> {
        let peer_addr = socket.peer_addr()?;
        // Device protocols are small request/response exchanges
        socket.set_nodelay(true)?;
        info!(peer_addr = %peer_addr, "Wrapping new session");

        let (read_half, write_half) = socket.into_split();
        let (control_tx, control_rx) = mpsc::channel(control_buffer_size);

        let handle = Self {
            writer: Arc::new(Mutex::new(FramedWrite::new(write_half, BytesCodec::new()))),
            control_tx,
            id,
            peer_addr,
            opened_at: Instant::now(),
            state: Arc::new(AtomicU8::new(SessionState::Connecting.as_u8())),
            bytes_sent: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
        };
        let reader = FramedRead::new(read_half, BytesCodec::new());
        Ok((handle, reader, control_rx))
    }

    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Move to `Closed`, returning `false` if the session was already closed
    pub(crate) fn mark_closed(&self) -> bool {
        let closed = SessionState::Closed.as_u8();
        self.state.swap(closed, Ordering::AcqRel) != closed
    }

    /// Get bytes written to the peer
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Get bytes read from the peer
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub(crate) fn record_received(&self, count: usize) {
        self.bytes_received
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Snapshot of this session
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            state: self.state(),
            peer_addr: self.peer_addr,
            opened_at: self.opened_at,
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
        }
    }

    /// Write bytes to the peer
    ///
    /// Fails with [`WriteError::Closed`] once the session has closed.
    #[instrument(skip(self, bytes), fields(session_id = %self.id, bytes = bytes.len()))]
    pub async fn send(&self, bytes: Bytes) -> Result<(), WriteError> {
        if self.state().is_terminal() {
            return Err(WriteError::Closed);
        }
        let len = bytes.len();
        trace!("Sending bytes");

        let mut writer = self.writer.lock().await;
        match writer.send(bytes).await {
            Ok(()) => {
                self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to send bytes");
                Err(WriteError::Io(e))
            }
        }
    }

    /// Ask the worker to close the session
    ///
    /// Returns `false` if the worker is already gone.
    pub(crate) async fn request_close(&self) -> bool {
        self.control_tx.send(ControlMessage::Close).await.is_ok()
    }

    /// Shut down the write half so the peer sees end of stream
    pub(crate) async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.get_mut().shutdown().await {
            debug!(session_id = %self.id, error = %e, "Write half already closed");
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}
