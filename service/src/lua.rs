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

//! Lua extension hook
//!
//! A device file with `"Script": true` is paired with a Lua 5.4 script of the
//! same base name. The script may define:
//!
//! ```lua
//! funcName = { "Power On", "Power Off", "Input 1", "Input 2", "Status" }
//!
//! function rxscript(conn, data)
//!   -- conn.id, conn.peer; data is the raw byte string
//!   if data == "TEMP?" then return "TEMP=21\\x0d" end
//! end
//!
//! function customFunc(index)
//!   return "$$$ALARM " .. index
//! end
//! ```
//!
//! A `log` table (`log.debug`, `log.info`, `log.warn`, `log.error`) routes
//! script messages into `tracing`.

use crate::error::HookError;
use crate::hook::{CUSTOM_FUNC_COUNT, ExtensionHook, HookResult, check_index};
use crate::types::SessionInfo;
use mlua::{Function, Lua, Table, Value};
use std::path::Path;
use tracing::{debug, info, instrument};

const NAME_PROBLEM: &str = "Problem with Custom Function names";

/// Extension hook backed by a Lua script
pub struct LuaHook {
    lua: Lua,
    chunk_name: String,
    names: Vec<String>,
    name_problem: Option<String>,
}

impl LuaHook {
    /// Load and run the script at `path`
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, HookError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| HookError::Load(format!("{}: {}", path.display(), e)))?;
        let hook = Self::from_source(&path.display().to_string(), &source)?;
        info!("Script loaded");
        Ok(hook)
    }

    /// Run `source` as a script named `chunk_name`
    pub fn from_source(chunk_name: &str, source: &str) -> Result<Self, HookError> {
        let lua = Lua::new();
        install_log_table(&lua).map_err(load_error)?;
        lua.load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(load_error)?;

        let (names, name_problem) = read_names(&lua);
        debug!(?names, "Custom function names");

        Ok(Self {
            lua,
            chunk_name: chunk_name.to_string(),
            names,
            name_problem,
        })
    }

    /// Describes a missing or incomplete `funcName` table
    pub fn name_problem(&self) -> Option<&str> {
        self.name_problem.as_deref()
    }

    /// Name the script was loaded under
    pub fn chunk_name(&self) -> &str {
        &self.chunk_name
    }

    fn global_function(&self, name: &str) -> Result<Option<Function>, HookError> {
        self.lua
            .globals()
            .get::<Option<Function>>(name)
            .map_err(raised)
    }
}

impl ExtensionHook for LuaHook {
    fn function_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn handle(&self, session: &SessionInfo, received: &[u8]) -> HookResult {
        let Some(rxscript) = self.global_function("rxscript")? else {
            return Ok(None);
        };

        let conn = self.lua.create_table().map_err(raised)?;
        conn.set("id", session.id.as_u64()).map_err(raised)?;
        conn.set("peer", session.peer_addr.to_string())
            .map_err(raised)?;
        let data = self.lua.create_string(received).map_err(raised)?;

        let value = rxscript.call::<Value>((conn, data)).map_err(raised)?;
        into_text("rxscript", value)
    }

    fn custom_func(&self, index: usize) -> HookResult {
        check_index(index)?;
        let Some(custom) = self.global_function("customFunc")? else {
            return Err(HookError::Raised("customFunc is not defined".to_string()));
        };
        let value = custom.call::<Value>(index).map_err(raised)?;
        into_text("customFunc", value)
    }
}

impl std::fmt::Debug for LuaHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaHook")
            .field("chunk_name", &self.chunk_name)
            .field("names", &self.names)
            .finish()
    }
}

fn load_error(err: mlua::Error) -> HookError {
    HookError::Load(err.to_string())
}

fn raised(err: mlua::Error) -> HookError {
    HookError::Raised(err.to_string())
}

/// Lua strings are byte strings; each byte becomes its Latin-1 char so the
/// codec turns it back into the same byte.
fn into_text(entry: &str, value: Value) -> HookResult {
    match value {
        Value::Nil | Value::Boolean(false) => Ok(None),
        Value::String(s) => Ok(Some(s.as_bytes().iter().map(|&b| char::from(b)).collect())),
        Value::Integer(n) => Ok(Some(n.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(HookError::Raised(format!(
            "{} returned a {}",
            entry,
            other.type_name()
        ))),
    }
}

fn read_names(lua: &Lua) -> (Vec<String>, Option<String>) {
    let mut names = crate::hook::default_function_names();
    let table = match lua.globals().get::<Option<Table>>("funcName") {
        Ok(Some(table)) => table,
        _ => return (names, Some(NAME_PROBLEM.to_string())),
    };

    let mut complete = true;
    for (slot, index) in names.iter_mut().zip(1..=CUSTOM_FUNC_COUNT) {
        match table.get::<Option<String>>(index) {
            Ok(Some(name)) => *slot = name,
            _ => complete = false,
        }
    }
    let problem = (!complete).then(|| NAME_PROBLEM.to_string());
    (names, problem)
}

fn install_log_table(lua: &Lua) -> mlua::Result<()> {
    let log = lua.create_table()?;
    log.set(
        "debug",
        lua.create_function(|_, msg: String| {
            tracing::debug!(target: "avemu::script", "{}", msg);
            Ok(())
        })?,
    )?;
    log.set(
        "info",
        lua.create_function(|_, msg: String| {
            tracing::info!(target: "avemu::script", "{}", msg);
            Ok(())
        })?,
    )?;
    log.set(
        "warn",
        lua.create_function(|_, msg: String| {
            tracing::warn!(target: "avemu::script", "{}", msg);
            Ok(())
        })?,
    )?;
    log.set(
        "error",
        lua.create_function(|_, msg: String| {
            tracing::error!(target: "avemu::script", "{}", msg);
            Ok(())
        })?,
    )?;
    lua.globals().set("log", log)
}
