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

//! Observer traits and the event bus

use crate::event::{EngineEvent, EventKind};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

/// Engine observer trait
///
/// Implement this trait to receive every event the engine produces. Events
/// from one session arrive in the order they happened on that session.
///
/// # Example
///
/// ```no_run
/// use avemu_service::{EngineEvent, EngineObserver};
/// use async_trait::async_trait;
///
/// struct Printer;
///
/// #[async_trait]
/// impl EngineObserver for Printer {
///     async fn on_event(&self, event: &EngineEvent) {
///         println!("{}", event.display_line(true));
///     }
/// }
/// ```
#[async_trait]
pub trait EngineObserver: Send + Sync + 'static {
    /// Called for every engine event
    async fn on_event(&self, event: &EngineEvent);
}

/// Callback-based observer implementation
///
/// # Example
///
/// ```no_run
/// use avemu_service::CallbackObserver;
///
/// let observer = CallbackObserver {
///     on_event: Some(Box::new(|event| println!("{}", event))),
///     on_error: Some(Box::new(|event| eprintln!("{}", event.payload))),
/// };
/// ```
#[derive(Default)]
pub struct CallbackObserver {
    /// Called for every event
    pub on_event: Option<Box<dyn Fn(&EngineEvent) + Send + Sync + 'static>>,
    /// Called for error events only
    pub on_error: Option<Box<dyn Fn(&EngineEvent) + Send + Sync + 'static>>,
}

#[async_trait]
impl EngineObserver for CallbackObserver {
    async fn on_event(&self, event: &EngineEvent) {
        if let Some(ref f) = self.on_event {
            f(event);
        }
        if event.kind == EventKind::Error
            && let Some(ref f) = self.on_error
        {
            f(event);
        }
    }
}

/// Observer that forwards events into a channel
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EngineObserver for ChannelObserver {
    async fn on_event(&self, event: &EngineEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Fans events out to subscribed observers and the log
#[derive(Default)]
pub(crate) struct EventBus {
    observers: RwLock<Vec<Arc<dyn EngineObserver>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Log the event and deliver it to every observer
    pub(crate) async fn emit(&self, event: EngineEvent) {
        log_event(&event);

        // Clone the list so no lock is held across an await
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_event(&event).await;
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observer_count())
            .finish()
    }
}

fn log_event(event: &EngineEvent) {
    let session = event
        .session
        .map(|id| id.to_string())
        .unwrap_or_default();
    match event.kind {
        EventKind::Inbound | EventKind::Outbound => tracing::debug!(
            session_id = %session,
            direction = event.kind.tag(),
            bytes = event.payload.len(),
            payload = %event.payload,
        ),
        EventKind::Info => tracing::info!(session_id = %session, "{}", event.payload),
        EventKind::Error => tracing::warn!(session_id = %session, "{}", event.payload),
        EventKind::FeedbackPush => tracing::info!(
            session_id = %session,
            bytes = event.payload.len(),
            "Feedback: {}",
            event.payload
        ),
    }
}
