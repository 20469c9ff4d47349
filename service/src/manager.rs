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

//! Session manager
//!
//! The SessionManager is responsible for:
//! - Tracking all open sessions
//! - Spawning one worker task per session
//! - Closing single sessions on request
//! - Graceful shutdown with a bounded wait

use crate::dispatch::Dispatcher;
use crate::error::{EngineError, Result};
use crate::session::SessionHandle;
use crate::state::EngineState;
use crate::types::{SessionId, SessionInfo};
use crate::worker::SessionWorker;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Managed session entry
struct ManagedSession {
    handle: SessionHandle,
    worker_handle: JoinHandle<()>,
}

/// Session manager
pub struct SessionManager {
    /// Open sessions (lock-free concurrent map)
    sessions: Arc<DashMap<SessionId, ManagedSession>>,
    /// Next session ID (monotonically increasing, never reset)
    next_id: AtomicU64,
    state: Arc<EngineState>,
}

impl SessionManager {
    pub(crate) fn new(state: Arc<EngineState>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            state,
        }
    }

    fn next_session_id(&self) -> SessionId {
        SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register an accepted socket and spawn its worker
    pub(crate) fn add_session(&self, socket: TcpStream) -> Result<SessionId> {
        let id = self.next_session_id();
        let (handle, reader, control_rx) =
            SessionHandle::wrap(socket, id, self.state.config.control_buffer_size)?;
        let worker = SessionWorker::new(
            handle.clone(),
            reader,
            control_rx,
            Dispatcher::new(self.state.clone()),
        );

        // The worker waits until its entry is in the map, so its own removal
        // can never run before the insert
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let sessions = self.sessions.clone();
        let worker_handle = tokio::spawn(async move {
            if ready_rx.await.is_err() {
                return;
            }
            worker.run().await;
            sessions.remove(&id);
        });

        info!(session_id = %id, peer_addr = %handle.peer_addr(), "Session established");
        self.sessions.insert(
            id,
            ManagedSession {
                handle,
                worker_handle,
            },
        );
        self.state.metrics.session_opened();
        let _ = ready_tx.send(());

        Ok(id)
    }

    /// Close one session and wait for its worker
    pub async fn close_session(&self, id: SessionId) -> Result<()> {
        match self.sessions.remove(&id) {
            Some((_, managed)) => {
                self.stop(id, managed).await;
                Ok(())
            }
            None => Err(EngineError::SessionNotFound(id)),
        }
    }

    /// Get session info
    pub fn session_info(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|entry| entry.handle.info())
    }

    /// Get all session IDs
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Get all session infos, oldest first
    pub fn all_session_infos(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().handle.info())
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get the number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Close every session
    ///
    /// Sessions are stopped concurrently. Workers that do not finish within the
    /// shutdown timeout are aborted and their close is reported here.
    pub async fn shutdown(&self) {
        // Collect first so no map guard is held across an await
        let ids = self.session_ids();
        debug!(count = ids.len(), "Closing all sessions");
        let stopping: Vec<_> = ids
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .map(|(id, managed)| self.stop(id, managed))
            .collect();
        join_all(stopping).await;
    }

    async fn stop(&self, id: SessionId, managed: ManagedSession) {
        let ManagedSession {
            handle,
            mut worker_handle,
        } = managed;
        // Best effort, the worker may already be gone
        handle.request_close().await;

        let timeout = self.state.config.shutdown_timeout;
        if tokio::time::timeout(timeout, &mut worker_handle)
            .await
            .is_err()
        {
            warn!(session_id = %id, "Session did not close in time, aborting");
            worker_handle.abort();
            let _ = worker_handle.await;
            handle.shutdown().await;
            if handle.mark_closed() {
                Dispatcher::new(self.state.clone())
                    .session_closed(&handle)
                    .await;
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session_count", &self.session_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
