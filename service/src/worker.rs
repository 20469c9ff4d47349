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

//! Session worker
//!
//! Each accepted connection is driven by one worker task. The worker runs
//! the connect sequence, then handles inbound chunks one at a time so a
//! session's replies always follow the order of its queries. A close request
//! is honoured at once, even while a reply waits out the response delay.

use crate::dispatch::Dispatcher;
use crate::event::EngineEvent;
use crate::session::{SessionHandle, SessionReader};
use crate::types::SessionState;
use futures_util::StreamExt;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Control messages for the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Gracefully close the session
    Close,
}

/// Why the event loop ended
#[derive(Debug)]
enum Exit {
    PeerClosed,
    CloseRequested,
    ReadFailed(std::io::Error),
}

/// Worker that drives a single session
pub(crate) struct SessionWorker {
    session: SessionHandle,
    reader: SessionReader,
    control_rx: mpsc::Receiver<ControlMessage>,
    dispatcher: Dispatcher,
}

impl SessionWorker {
    pub(crate) fn new(
        session: SessionHandle,
        reader: SessionReader,
        control_rx: mpsc::Receiver<ControlMessage>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            session,
            reader,
            control_rx,
            dispatcher,
        }
    }

    /// Run the worker until the peer disconnects or a close is requested
    pub(crate) async fn run(mut self) {
        self.session.set_state(SessionState::Open);
        self.dispatcher.session_opened(&self.session).await;

        let exit = self.event_loop().await;
        debug!(session_id = %self.session.id(), ?exit, "Session loop ended");

        if let Exit::ReadFailed(e) = &exit {
            warn!(session_id = %self.session.id(), error = %e, "Read failed");
            self.dispatcher
                .state()
                .events
                .emit(EngineEvent::error(
                    Some(self.session.id()),
                    format!("Connection error: {}", e),
                ))
                .await;
        }

        self.cleanup().await;
    }

    async fn event_loop(&mut self) -> Exit {
        loop {
            select! {
                frame = self.reader.next() => {
                    match frame {
                        Some(Ok(chunk)) => {
                            self.session.record_received(chunk.len());
                            // A close during the response delay drops the pending reply
                            select! {
                                _ = self.dispatcher.dispatch(&self.session, chunk.freeze()) => {}
                                msg = self.control_rx.recv() => {
                                    debug!(
                                        session_id = %self.session.id(),
                                        ?msg,
                                        "Closed mid dispatch"
                                    );
                                    return Exit::CloseRequested;
                                }
                            }
                        }
                        Some(Err(e)) => return Exit::ReadFailed(e),
                        None => return Exit::PeerClosed,
                    }
                }

                msg = self.control_rx.recv() => {
                    match msg {
                        Some(ControlMessage::Close) | None => return Exit::CloseRequested,
                    }
                }
            }
        }
    }

    async fn cleanup(&mut self) {
        let first = self.session.mark_closed();
        self.session.shutdown().await;

        // Drain any remaining control messages
        while self.control_rx.try_recv().is_ok() {}

        if first {
            self.dispatcher.session_closed(&self.session).await;
        }
    }
}

impl std::fmt::Debug for SessionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWorker")
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::event::EventKind;
    use crate::observer::ChannelObserver;
    use crate::state::EngineState;
    use crate::types::SessionId;
    use avemu_device::{CommandRecord, CommandTable, DeviceConfig};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn start_worker() -> (
        Arc<EngineState>,
        SessionHandle,
        TcpStream,
        tokio::task::JoinHandle<()>,
        tokio::sync::mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server, _) = listener.accept().await.unwrap();
        let client = client_task.await.unwrap();

        let state = Arc::new(EngineState::new(EngineConfig::default()));
        let mut device = DeviceConfig::template("Acme", "Box", "Display", 5000).with_commands(
            CommandTable::new(vec![CommandRecord::new("ping", "PING", "PONG")]),
        );
        device.response_delay_seconds = 0.0;
        state.set_device(Arc::new(device));
        let (observer, rx) = ChannelObserver::new();
        state.events.subscribe(Arc::new(observer));

        let (session, reader, control_rx) = SessionHandle::wrap(server, SessionId::new(1), 4).unwrap();
        let worker = SessionWorker::new(
            session.clone(),
            reader,
            control_rx,
            Dispatcher::new(state.clone()),
        );
        let task = tokio::spawn(worker.run());
        (state, session, client, task, rx)
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let (state, session, mut client, task, mut rx) = start_worker().await;

        client.write_all(b"PING").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG");
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(state.active().map(|h| h.id()), Some(session.id()));

        drop(client);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert!(state.active().is_none());

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.kind, EventKind::Info);
        assert!(last.payload.as_text().unwrap().ends_with("disconnected"));
    }

    #[tokio::test]
    async fn test_worker_close_request() {
        let (_state, session, mut client, task, _rx) = start_worker().await;

        assert!(session.request_close().await);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        // Peer sees end of stream
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
