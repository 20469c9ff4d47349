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

//! Device emulator
//!
//! The Emulator owns the listener, the session manager and the shared
//! engine state, and exposes the operator commands.

use crate::config::{EngineConfig, MIN_UNPRIVILEGED_PORT};
use crate::dispatch::Dispatcher;
use crate::error::{BindError, EngineError, HookError, Result, WriteError};
use crate::event::EngineEvent;
use crate::hook::{
    ExtensionHook, HookOutput, call_blocking, check_index, default_function_names,
};
use crate::lua::LuaHook;
use crate::manager::SessionManager;
use crate::observer::EngineObserver;
use crate::state::EngineState;
use crate::types::{EngineSnapshot, SessionInfo};
use avemu_device::DeviceConfig;
use avemu_escapecodec::decode;
use bytes::Bytes;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const NO_CONNECTION: &str = "No TCP connection detected";

/// Running listener
struct ListenerTask {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    accept_handle: JoinHandle<()>,
}

/// TCP device emulator
///
/// # Example
///
/// ```no_run
/// use avemu_service::{ChannelObserver, Emulator, EngineConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let emulator = Emulator::new(EngineConfig::default());
///     let (observer, mut events) = ChannelObserver::new();
///     emulator.subscribe(Arc::new(observer));
///
///     emulator.load_config("projector.json").await?;
///     emulator.open().await?;
///
///     while let Some(event) = events.recv().await {
///         println!("{}", event.display_line(true));
///     }
///     Ok(())
/// }
/// ```
pub struct Emulator {
    state: Arc<EngineState>,
    manager: Arc<SessionManager>,
    config_path: std::sync::Mutex<Option<PathBuf>>,
    listener: Mutex<Option<ListenerTask>>,
}

impl Emulator {
    /// Create an emulator with no device loaded and the port closed
    pub fn new(config: EngineConfig) -> Self {
        let state = Arc::new(EngineState::new(config));
        let manager = Arc::new(SessionManager::new(state.clone()));
        Self {
            state,
            manager,
            config_path: std::sync::Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    /// Session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.manager
    }

    /// Register an observer for engine events
    pub fn subscribe(&self, observer: Arc<dyn EngineObserver>) {
        self.state.events.subscribe(observer);
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.state.clone())
    }

    async fn emit(&self, event: EngineEvent) {
        self.state.events.emit(event).await;
    }

    // Device and hook

    /// Load a device file, and its script when the file asks for one
    ///
    /// Refused while the port is open. A script that fails to load leaves
    /// the device loaded without a hook and is reported as an error event.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn load_config(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.state.is_listening() {
            return Err(EngineError::PortOpen);
        }

        let device = DeviceConfig::load(path)?;
        let hook_enabled = device.hook_enabled;
        let label = device.label();
        self.state.set_device(Arc::new(device));
        *self
            .config_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.to_path_buf());
        self.emit(EngineEvent::info(None, format!("Loaded {}", label)))
            .await;

        if hook_enabled {
            if let Err(e) = self.install_script(path).await {
                self.state.set_hook(None);
                self.emit(EngineEvent::error(None, e.to_string())).await;
            }
        } else {
            self.state.set_hook(None);
        }
        Ok(())
    }

    async fn install_script(&self, device_path: &Path) -> std::result::Result<(), HookError> {
        let script = LuaHook::load(&DeviceConfig::hook_path(device_path))?;
        if let Some(problem) = script.name_problem() {
            self.emit(EngineEvent::error(None, problem)).await;
        }
        self.state.set_hook(Some(Arc::new(script)));
        self.emit(EngineEvent::info(None, "Script loaded")).await;
        Ok(())
    }

    /// Install a device directly, without touching the hook
    pub fn set_device(&self, device: DeviceConfig) {
        self.state.set_device(Arc::new(device));
    }

    /// Currently loaded device
    pub fn device(&self) -> Option<Arc<DeviceConfig>> {
        self.state.device()
    }

    /// Install or remove the extension hook
    pub fn set_hook(&self, hook: Option<Arc<dyn ExtensionHook>>) {
        self.state.set_hook(hook);
    }

    /// Replace the command table with the one in `path`
    ///
    /// Only commands change; delay, port and hook stay as loaded. Allowed
    /// while the port is open. A failed load keeps the previous table.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn reload_config(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let commands = DeviceConfig::load_commands(path)?;
        let count = commands.len();
        if !self.state.swap_commands(commands) {
            return Err(EngineError::NoConfigPath);
        }
        *self
            .config_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path.to_path_buf());
        self.emit(EngineEvent::info(
            None,
            format!("Reloaded {} commands", count),
        ))
        .await;
        Ok(())
    }

    /// Reload the command table from the last loaded file
    pub async fn reload_commands(&self) -> Result<()> {
        let path = self.config_path().ok_or(EngineError::NoConfigPath)?;
        self.reload_config(path).await
    }

    /// Reload the script next to the last loaded file
    pub async fn reload_hook(&self) -> Result<()> {
        let path = self.config_path().ok_or(EngineError::NoConfigPath)?;
        if let Err(e) = self.install_script(&path).await {
            self.emit(EngineEvent::error(None, e.to_string())).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Path of the last loaded device file
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // Listener

    /// Open the listener on the device's configured port
    pub async fn open(&self) -> Result<u16> {
        let port = self
            .state
            .device()
            .map(|device| device.port)
            .ok_or(BindError::NoConfig)?;
        self.open_port(port).await
    }

    /// Open the listener on `port`
    ///
    /// Fails with [`BindError`] and leaves the port closed when a listener is
    /// already open, the port is below the configured minimum, no device or
    /// an empty command table is loaded, or the bind itself fails.
    #[instrument(skip(self))]
    pub async fn open_port(&self, port: u16) -> Result<u16> {
        let mut slot = self.listener.lock().await;
        if slot.is_some() {
            return Err(BindError::AlreadyListening(self.state.bound_port()).into());
        }
        let minimum = self.state.config.min_port.max(MIN_UNPRIVILEGED_PORT);
        if port < minimum {
            return Err(BindError::PrivilegedPort { port, minimum }.into());
        }
        let device = self.state.device().ok_or(BindError::NoConfig)?;
        if device.commands.is_empty() {
            return Err(BindError::EmptyTable.into());
        }

        let listener = TcpListener::bind((self.state.config.bind_ip, port))
            .await
            .map_err(|source| BindError::Io { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BindError::Io { port, source })?;
        info!(%local_addr, device = %device.label(), "Listening");

        let shutdown = Arc::new(Notify::new());
        let accept_handle = self.spawn_accept_loop(listener, shutdown.clone());
        *slot = Some(ListenerTask {
            local_addr,
            shutdown,
            accept_handle,
        });
        self.state.set_listening(Some(local_addr.port()));
        drop(slot);

        self.emit(EngineEvent::info(
            None,
            format!("Port {} is open", local_addr.port()),
        ))
        .await;
        Ok(local_addr.port())
    }

    fn spawn_accept_loop(&self, listener: TcpListener, shutdown: Arc<Notify>) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    result = listener.accept() => result,
                    _ = shutdown.notified() => break,
                };

                match accepted {
                    Ok((socket, peer_addr)) => {
                        debug!(%peer_addr, "Accepted connection");
                        if let Err(e) = manager.add_session(socket) {
                            warn!(%peer_addr, error = %e, "Failed to add session");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        state
                            .events
                            .emit(EngineEvent::error(None, format!("Accept failed: {}", e)))
                            .await;
                    }
                }
            }
            debug!("Accept loop stopped");
        })
    }

    /// Close the listener and every session
    ///
    /// Closing an already closed port is a no-op.
    #[instrument(skip(self))]
    pub async fn close_port(&self) -> Result<()> {
        let Some(task) = self.listener.lock().await.take() else {
            return Ok(());
        };

        // notify_one stores a permit, so a loop busy in add_session still sees it
        task.shutdown.notify_one();
        if let Err(e) = task.accept_handle.await {
            warn!(error = %e, "Accept loop ended abnormally");
        }
        self.manager.shutdown().await;
        self.state.set_listening(None);
        info!(local_addr = %task.local_addr, "Listener closed");

        self.emit(EngineEvent::info(None, "Port is closed")).await;
        Ok(())
    }

    /// Whether the listener is open
    pub fn is_listening(&self) -> bool {
        self.state.is_listening()
    }

    /// Address the listener is bound to
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .await
            .as_ref()
            .map(|task| task.local_addr)
    }

    // Operator sends

    /// Write raw bytes to the active session
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn send_raw(&self, bytes: Bytes) -> Result<()> {
        let Some(session) = self.state.active() else {
            return Err(self.no_connection().await);
        };
        match self.dispatcher().write(&session, bytes).await {
            Ok(()) => Ok(()),
            // Closed between lookup and write
            Err(WriteError::Closed) => Err(self.no_connection().await),
            Err(e) => {
                self.emit(EngineEvent::error(Some(session.id()), e.to_string()))
                    .await;
                Err(e.into())
            }
        }
    }

    /// Decode escape notation and write it to the active session
    pub async fn send_escaped(&self, text: &str) -> Result<()> {
        let bytes = decode(text)?;
        self.send_raw(bytes).await
    }

    async fn no_connection(&self) -> EngineError {
        self.emit(EngineEvent::info(None, NO_CONNECTION)).await;
        EngineError::NoConnection
    }

    /// Run custom function `index` (1 based) of the hook
    ///
    /// Replies go to the active session; feedback goes to observers.
    #[instrument(skip(self))]
    pub async fn trigger_hook_func(&self, index: usize) -> Result<()> {
        let hook = self.state.hook().ok_or(EngineError::NoHook)?;
        check_index(index)?;

        let active = self.state.active().map(|session| session.id());
        let output = call_blocking(hook, move |hook| hook.custom_func(index))
            .await
            .and_then(|text| text.map(|text| HookOutput::parse(&text)).transpose());
        let dispatcher = self.dispatcher();
        match output {
            Ok(Some(HookOutput::Reply(bytes))) => self.send_raw(bytes).await,
            Ok(Some(HookOutput::Feedback(bytes))) => {
                dispatcher.push_feedback(active, bytes).await;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                dispatcher.hook_failed(active, &e).await;
                Err(e.into())
            }
        }
    }

    /// Close the active session, leaving the listener open
    pub async fn disconnect(&self) -> Result<()> {
        let Some(session) = self.state.active() else {
            return Err(self.no_connection().await);
        };
        match self.manager.close_session(session.id()).await {
            Err(EngineError::SessionNotFound(_)) => Err(self.no_connection().await),
            other => other,
        }
    }

    // Settings and introspection

    /// Answer unmatched input silently
    pub fn set_hook_suppressed_logging(&self, suppressed: bool) {
        self.state.set_hook_suppressed_logging(suppressed);
    }

    /// Whether unmatched input is answered silently
    pub fn hook_suppressed_logging(&self) -> bool {
        self.state.hook_suppressed_logging()
    }

    /// Custom function display names
    pub fn function_names(&self) -> Vec<String> {
        self.state
            .hook()
            .map(|hook| hook.function_names())
            .unwrap_or_else(default_function_names)
    }

    /// Info for the session receiving operator sends
    pub fn active_session(&self) -> Option<SessionInfo> {
        self.state.active().map(|session| session.info())
    }

    /// Point in time view of the engine
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            listening: self.state.is_listening(),
            bound_port: self.state.bound_port(),
            active_session: self.state.active().map(|session| session.id()),
            session_count: self.manager.session_count(),
            device: self.state.device().map(|device| device.label()),
            hook_loaded: self.state.hook().is_some(),
            hook_suppressed_logging: self.state.hook_suppressed_logging(),
            metrics: self.state.metrics.snapshot(),
        }
    }
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("state", &self.state)
            .field("manager", &self.manager)
            .finish()
    }
}
