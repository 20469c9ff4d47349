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

//! # Avemu Emulation Engine
//!
//! Emulates a TCP attached device for control protocol development. A
//! listener accepts clients and answers byte exact queries with the
//! configured byte exact responses, optionally handing unmatched input to an
//! extension hook.
//!
//! # Architecture
//!
//! ```text
//! Emulator (operator commands)
//!     ↓
//! SessionManager
//!     ↓
//! SessionWorker → Dispatcher → CommandTable / ExtensionHook
//!     ↓
//! SessionHandle
//! ```
//!
//! Every session runs on its own task and handles its inbound chunks in
//! order. The response delay suspends only that task. Everything the engine
//! does is reported to [`EngineObserver`]s as [`EngineEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use avemu_device::{CommandRecord, CommandTable, DeviceConfig};
//! use avemu_service::{CallbackObserver, Emulator, EngineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let emulator = Emulator::new(EngineConfig::default());
//!     emulator.subscribe(Arc::new(CallbackObserver {
//!         on_event: Some(Box::new(|event| println!("{}", event))),
//!         ..Default::default()
//!     }));
//!
//!     let commands = CommandTable::new(vec![CommandRecord::new("Ping", "PING", "PONG")]);
//!     emulator.set_device(DeviceConfig::template("Acme", "Box", "Test", 5000).with_commands(commands));
//!     emulator.open().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     emulator.close_port().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod dispatch;
mod emulator;
mod error;
mod event;
mod hook;
mod lua;
mod manager;
mod metrics;
mod observer;
mod session;
mod state;
mod types;
mod worker;

pub use config::{EngineConfig, MIN_UNPRIVILEGED_PORT};
pub use dispatch::{NO_MATCH, NO_MATCH_WITH_HOOK};
pub use emulator::Emulator;
pub use error::{BindError, EngineError, HookError, Result, WriteError};
pub use event::{EngineEvent, EventKind, EventPayload};
pub use hook::{
    CUSTOM_FUNC_COUNT, ExtensionHook, FEEDBACK_PREFIX, FnHook, HookOutput, HookResult,
    check_index, default_function_names,
};
pub use lua::LuaHook;
pub use manager::SessionManager;
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use observer::{CallbackObserver, ChannelObserver, EngineObserver};
pub use session::SessionHandle;
pub use types::{EngineSnapshot, SessionId, SessionInfo, SessionState};
pub use worker::ControlMessage;
