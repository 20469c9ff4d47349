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

//! Shared engine state

use crate::config::EngineConfig;
use crate::hook::ExtensionHook;
use crate::metrics::EngineMetrics;
use crate::observer::EventBus;
use crate::session::SessionHandle;
use crate::types::SessionId;
use avemu_device::{CommandTable, DeviceConfig};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// State shared by the emulator, its sessions and their workers
///
/// The loaded device is published as an `Arc` and replaced whole, so a
/// reader either sees the old table or the new one.
pub(crate) struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) events: EventBus,
    pub(crate) metrics: EngineMetrics,

    listening: AtomicBool,
    bound_port: AtomicU16,
    hook_suppressed_logging: AtomicBool,

    active: Mutex<Option<SessionHandle>>,
    device: RwLock<Option<Arc<DeviceConfig>>>,
    hook: RwLock<Option<Arc<dyn ExtensionHook>>>,
}

impl EngineState {
    pub(crate) fn new(config: EngineConfig) -> Self {
        let suppressed = config.hook_suppressed_logging;
        Self {
            config,
            events: EventBus::default(),
            metrics: EngineMetrics::new(),
            listening: AtomicBool::new(false),
            bound_port: AtomicU16::new(0),
            hook_suppressed_logging: AtomicBool::new(suppressed),
            active: Mutex::new(None),
            device: RwLock::new(None),
            hook: RwLock::new(None),
        }
    }

    // Listener

    pub(crate) fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub(crate) fn bound_port(&self) -> u16 {
        self.bound_port.load(Ordering::Acquire)
    }

    pub(crate) fn set_listening(&self, port: Option<u16>) {
        self.bound_port.store(port.unwrap_or(0), Ordering::Release);
        self.listening.store(port.is_some(), Ordering::Release);
    }

    // Unmatched input handling

    pub(crate) fn hook_suppressed_logging(&self) -> bool {
        self.hook_suppressed_logging.load(Ordering::Relaxed)
    }

    pub(crate) fn set_hook_suppressed_logging(&self, suppressed: bool) {
        self.hook_suppressed_logging
            .store(suppressed, Ordering::Relaxed);
    }

    // Active session

    pub(crate) fn active(&self) -> Option<SessionHandle> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make `handle` the active session, replacing any previous one
    pub(crate) fn set_active(&self, handle: SessionHandle) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Clear the active session if it is `id`
    pub(crate) fn clear_active_if(&self, id: SessionId) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|handle| handle.id() == id) {
            *active = None;
            true
        } else {
            false
        }
    }

    // Device

    pub(crate) fn device(&self) -> Option<Arc<DeviceConfig>> {
        self.device
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_device(&self, device: Arc<DeviceConfig>) {
        *self.device.write().unwrap_or_else(PoisonError::into_inner) = Some(device);
    }

    /// Publish a copy of the current device carrying `commands`
    ///
    /// Returns `false` when no device is loaded.
    pub(crate) fn swap_commands(&self, commands: CommandTable) -> bool {
        let mut device = self.device.write().unwrap_or_else(PoisonError::into_inner);
        match device.as_ref() {
            Some(current) => {
                let next = current.as_ref().clone().with_commands(commands);
                *device = Some(Arc::new(next));
                true
            }
            None => false,
        }
    }

    // Hook

    pub(crate) fn hook(&self) -> Option<Arc<dyn ExtensionHook>> {
        self.hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_hook(&self, hook: Option<Arc<dyn ExtensionHook>>) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = hook;
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("listening", &self.is_listening())
            .field("bound_port", &self.bound_port())
            .field("active", &self.active().map(|handle| handle.id()))
            .field("hook_loaded", &self.hook().is_some())
            .finish()
    }
}
