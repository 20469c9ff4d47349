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

//! Query matching and replies
//!
//! For every inbound chunk the dispatcher reports the chunk, looks it up in
//! the command table, and answers with the configured response after the
//! device's response delay. A miss goes to the extension hook when one is
//! installed, and anything still unanswered gets a diagnostic unless hook
//! logging is suppressed.

use crate::error::{HookError, WriteError};
use crate::event::EngineEvent;
use crate::hook::{HookOutput, call_blocking};
use crate::session::SessionHandle;
use crate::state::EngineState;
use crate::types::SessionId;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Diagnostic sent when no hook is installed
pub const NO_MATCH: &str = "Error - no match found with query";

/// Diagnostic sent when the hook produced nothing either
pub const NO_MATCH_WITH_HOOK: &str = "Error - no match found in query or script";

#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    state: Arc<EngineState>,
}

impl Dispatcher {
    pub(crate) fn new(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// Run the connect sequence for a newly opened session
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    pub(crate) async fn session_opened(&self, session: &SessionHandle) {
        self.state.set_active(session.clone());
        self.state
            .events
            .emit(EngineEvent::info(
                Some(session.id()),
                format!("Client {} connected", session.peer_addr()),
            ))
            .await;

        let greeting = self
            .state
            .device()
            .and_then(|device| device.commands.on_connect().map(|rec| rec.response().clone()));
        if let Some(response) = greeting {
            debug!("Sending connect response");
            self.respond(session, response).await;
        }
    }

    /// Report a closed session and release the active slot
    pub(crate) async fn session_closed(&self, session: &SessionHandle) {
        self.state.clear_active_if(session.id());
        self.state.metrics.session_closed();
        self.state
            .events
            .emit(EngineEvent::info(
                Some(session.id()),
                format!("Client {} disconnected", session.peer_addr()),
            ))
            .await;
    }

    /// Handle one inbound chunk
    #[instrument(skip(self, session, received), fields(session_id = %session.id(), bytes = received.len()))]
    pub(crate) async fn dispatch(&self, session: &SessionHandle, received: Bytes) {
        self.state.metrics.bytes_received(received.len());
        self.state
            .events
            .emit(EngineEvent::inbound(session.id(), received.clone()))
            .await;

        // One snapshot per chunk; a concurrent reload publishes a new Arc
        let device = self.state.device();
        let matched = device.as_ref().and_then(|device| {
            device
                .commands
                .lookup(&received)
                .map(|rec| (rec.response().clone(), device.response_delay()))
        });

        if let Some((response, delay)) = matched {
            self.state.metrics.command_matched();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.respond(session, response).await;
            return;
        }

        self.state.metrics.command_unmatched();
        let hook = self.state.hook();
        if let Some(hook) = hook.as_ref() {
            let info = session.info();
            let data = received.clone();
            let answer = call_blocking(hook.clone(), move |hook| hook.handle(&info, &data))
                .await
                .and_then(|text| text.map(|text| HookOutput::parse(&text)).transpose());
            match answer {
                Ok(Some(HookOutput::Reply(bytes))) => {
                    self.respond(session, bytes).await;
                    return;
                }
                Ok(Some(HookOutput::Feedback(bytes))) => {
                    self.push_feedback(Some(session.id()), bytes).await;
                    return;
                }
                Ok(None) => debug!("Hook produced no answer"),
                Err(e) => self.hook_failed(Some(session.id()), &e).await,
            }
        }

        self.unmatched(session, hook.is_some()).await;
    }

    /// Deliver hook output to observers as if the device pushed it
    pub(crate) async fn push_feedback(&self, session: Option<SessionId>, bytes: Bytes) {
        self.state.metrics.feedback_push();
        self.state
            .events
            .emit(EngineEvent::feedback(session, bytes))
            .await;
    }

    /// Report a failed hook call
    pub(crate) async fn hook_failed(&self, session: Option<SessionId>, error: &HookError) {
        self.state.metrics.hook_error();
        self.state
            .events
            .emit(EngineEvent::error(session, error.to_string()))
            .await;
    }

    /// Write to a session and report the outbound bytes
    pub(crate) async fn write(&self, session: &SessionHandle, bytes: Bytes) -> Result<(), WriteError> {
        let len = bytes.len();
        session.send(bytes.clone()).await?;
        self.state.metrics.bytes_sent(len);
        self.state
            .events
            .emit(EngineEvent::outbound(session.id(), bytes))
            .await;
        Ok(())
    }

    /// Write a reply, dropping it if the session is gone
    async fn respond(&self, session: &SessionHandle, bytes: Bytes) {
        if let Err(e) = self.write(session, bytes).await {
            warn!(session_id = %session.id(), error = %e, "Dropping reply");
            self.state.metrics.write_error();
            self.state
                .events
                .emit(EngineEvent::error(
                    Some(session.id()),
                    format!("Failed to send to {}: {}", session.peer_addr(), e),
                ))
                .await;
        }
    }

    async fn unmatched(&self, session: &SessionHandle, hook_present: bool) {
        if self.state.hook_suppressed_logging() {
            return;
        }
        let text = if hook_present {
            NO_MATCH_WITH_HOOK
        } else {
            NO_MATCH
        };
        self.respond(session, Bytes::from_static(text.as_bytes()))
            .await;
        self.state
            .events
            .emit(EngineEvent::error(Some(session.id()), text))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::event::EventKind;
    use crate::hook::FnHook;
    use crate::observer::ChannelObserver;
    use crate::types::SessionState;
    use avemu_device::{CommandRecord, CommandTable, DeviceConfig, ON_CONNECT};
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn open_session() -> (SessionHandle, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server, _) = listener.accept().await.unwrap();
        let client = client_task.await.unwrap();

        let (handle, _reader, _control_rx) = SessionHandle::wrap(server, SessionId::new(1), 4).unwrap();
        handle.set_state(SessionState::Open);
        (handle, client)
    }

    fn engine(records: Vec<CommandRecord>) -> (Dispatcher, UnboundedReceiver<EngineEvent>) {
        let state = Arc::new(EngineState::new(EngineConfig::default()));
        let mut device = DeviceConfig::template("Acme", "Box", "Display", 5000)
            .with_commands(CommandTable::new(records));
        device.response_delay_seconds = 0.0;
        state.set_device(Arc::new(device));

        let (observer, rx) = ChannelObserver::new();
        state.events.subscribe(Arc::new(observer));
        (Dispatcher::new(state), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_matched_query_replies() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        let (session, mut client) = open_session().await;

        dispatcher.dispatch(&session, Bytes::from_static(b"PING")).await;

        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG");

        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Inbound, EventKind::Outbound]);
    }

    #[tokio::test]
    async fn test_unmatched_without_hook_sends_diagnostic() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        let (session, mut client) = open_session().await;

        dispatcher.dispatch(&session, Bytes::from_static(b"???")).await;

        let mut buf = vec![0u8; NO_MATCH.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, NO_MATCH.as_bytes());

        let events = drain(&mut rx);
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Inbound, EventKind::Outbound, EventKind::Error]
        );
        assert_eq!(events[2].payload.as_text(), Some(NO_MATCH));
    }

    #[tokio::test]
    async fn test_unmatched_suppressed_is_silent() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        dispatcher.state.set_hook_suppressed_logging(true);
        let (session, _client) = open_session().await;

        dispatcher.dispatch(&session, Bytes::from_static(b"???")).await;

        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Inbound]);
        assert_eq!(session.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn test_hook_feedback_is_not_written() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        dispatcher
            .state
            .set_hook(Some(Arc::new(FnHook::new(|_, _| Ok(Some("$$$abc".to_string()))))));
        let (session, _client) = open_session().await;

        dispatcher.dispatch(&session, Bytes::from_static(b"STATUS")).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::FeedbackPush);
        assert_eq!(events[1].payload.as_bytes().unwrap(), &Bytes::from_static(b"abc"));
        assert_eq!(session.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn test_hook_error_falls_through_to_diagnostic() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        dispatcher.state.set_hook(Some(Arc::new(FnHook::new(|_, _| {
            Err(HookError::Raised("boom".to_string()))
        }))));
        let (session, mut client) = open_session().await;

        dispatcher.dispatch(&session, Bytes::from_static(b"X")).await;

        let mut buf = vec![0u8; NO_MATCH_WITH_HOOK.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, NO_MATCH_WITH_HOOK.as_bytes());

        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Inbound,
                EventKind::Error,
                EventKind::Outbound,
                EventKind::Error
            ]
        );
        assert_eq!(dispatcher.state.metrics.snapshot().hook_errors, 1);
    }

    #[tokio::test]
    async fn test_slow_hook_does_not_stall_other_sessions() {
        let (dispatcher, _rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        dispatcher.state.set_hook(Some(Arc::new(FnHook::new(|_, _| {
            std::thread::sleep(std::time::Duration::from_millis(500));
            Ok(Some("LATE".to_string()))
        }))));
        let (slow, _slow_client) = open_session().await;
        let (fast, mut fast_client) = open_session().await;

        let started = tokio::time::Instant::now();
        let pending = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(&slow, Bytes::from_static(b"SLOW"))
                    .await
            })
        };
        tokio::task::yield_now().await;

        dispatcher.dispatch(&fast, Bytes::from_static(b"PING")).await;
        let mut buf = [0u8; 4];
        fast_client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG");
        assert!(started.elapsed() < std::time::Duration::from_millis(400));

        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_hook_is_reported() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        dispatcher
            .state
            .set_hook(Some(Arc::new(FnHook::new(|_, _| panic!("script crashed")))));
        let (session, mut client) = open_session().await;

        dispatcher.dispatch(&session, Bytes::from_static(b"X")).await;

        let mut buf = vec![0u8; NO_MATCH_WITH_HOOK.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, NO_MATCH_WITH_HOOK.as_bytes());
        assert_eq!(dispatcher.state.metrics.snapshot().hook_errors, 1);
        drain(&mut rx);
    }

    #[tokio::test]
    async fn test_session_opened_sends_greeting_once() {
        let (dispatcher, mut rx) = engine(vec![
            CommandRecord::new(ON_CONNECT, ON_CONNECT, "HELLO"),
            CommandRecord::new("ping", "PING", "PONG"),
        ]);
        let (session, mut client) = open_session().await;

        dispatcher.session_opened(&session).await;
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"HELLO");
        assert_eq!(
            dispatcher.state.active().map(|h| h.id()),
            Some(session.id())
        );

        // The sentinel is never matched against inbound data
        dispatcher.state.set_hook_suppressed_logging(true);
        dispatcher
            .dispatch(&session, Bytes::from_static(ON_CONNECT.as_bytes()))
            .await;
        assert_eq!(session.bytes_sent(), 5);
        drain(&mut rx);
    }

    #[tokio::test]
    async fn test_write_to_closed_session_is_reported() {
        let (dispatcher, mut rx) = engine(vec![CommandRecord::new("ping", "PING", "PONG")]);
        let (session, _client) = open_session().await;
        session.set_state(SessionState::Closed);

        dispatcher.dispatch(&session, Bytes::from_static(b"PING")).await;

        let kinds: Vec<_> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Inbound, EventKind::Error]);
        assert_eq!(dispatcher.state.metrics.snapshot().write_errors, 1);
    }
}
