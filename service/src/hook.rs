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

//! Extension hook contract
//!
//! A hook is consulted when inbound data has no entry in the command table,
//! and can be triggered by the operator through one of five numbered custom
//! functions. Hooks answer in escape notation. Output that starts with
//! [`FEEDBACK_PREFIX`] is delivered to observers as a feedback push instead of
//! being written to the peer.

use crate::error::HookError;
use crate::types::SessionInfo;
use avemu_escapecodec::decode;
use bytes::Bytes;
use std::sync::Arc;

/// Marks hook output as a feedback push
pub const FEEDBACK_PREFIX: &str = "$$$";

/// Number of operator triggered custom functions
pub const CUSTOM_FUNC_COUNT: usize = 5;

/// Result of a hook invocation: escape notation text, or nothing
pub type HookResult = Result<Option<String>, HookError>;

/// Operator supplied extension consulted on a command table miss
pub trait ExtensionHook: Send + Sync + 'static {
    /// Display names for the custom functions, always [`CUSTOM_FUNC_COUNT`] long
    fn function_names(&self) -> Vec<String> {
        default_function_names()
    }

    /// Handle bytes that matched no command
    fn handle(&self, session: &SessionInfo, received: &[u8]) -> HookResult;

    /// Run custom function `index` (1 based)
    fn custom_func(&self, index: usize) -> HookResult {
        check_index(index)?;
        Ok(None)
    }
}

/// Names used when a hook does not provide its own
pub fn default_function_names() -> Vec<String> {
    (1..=CUSTOM_FUNC_COUNT).map(|n| format!("Func {}", n)).collect()
}

/// Fails with [`HookError::InvalidIndex`] unless `index` is in `1..=5`
pub fn check_index(index: usize) -> Result<(), HookError> {
    if (1..=CUSTOM_FUNC_COUNT).contains(&index) {
        Ok(())
    } else {
        Err(HookError::InvalidIndex(index))
    }
}

/// Run one hook call on the blocking pool
///
/// Script calls may run for as long as the script likes, so the calling task
/// only awaits the result. A panicking hook is reported as [`HookError::Raised`].
pub(crate) async fn call_blocking<F>(hook: Arc<dyn ExtensionHook>, call: F) -> HookResult
where
    F: FnOnce(&dyn ExtensionHook) -> HookResult + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(hook.as_ref()))
        .await
        .unwrap_or_else(|e| Err(HookError::Raised(format!("hook call failed: {}", e))))
}

/// Decoded hook output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    /// Write these bytes to the peer
    Reply(Bytes),
    /// Deliver these bytes to observers only
    Feedback(Bytes),
}

impl HookOutput {
    /// Split off the feedback prefix and decode the rest
    ///
    /// ```
    /// use avemu_service::HookOutput;
    /// use bytes::Bytes;
    ///
    /// let out = HookOutput::parse(r"$$$TEMP=21\x0d").unwrap();
    /// assert_eq!(out, HookOutput::Feedback(Bytes::from_static(b"TEMP=21\r")));
    /// ```
    pub fn parse(text: &str) -> Result<Self, HookError> {
        match text.strip_prefix(FEEDBACK_PREFIX) {
            Some(rest) => Ok(Self::Feedback(decode(rest)?)),
            None => Ok(Self::Reply(decode(text)?)),
        }
    }
}

type HandleFn = dyn Fn(&SessionInfo, &[u8]) -> HookResult + Send + Sync + 'static;
type CustomFn = dyn Fn(usize) -> HookResult + Send + Sync + 'static;

/// Closure backed hook
///
/// # Example
///
/// ```
/// use avemu_service::FnHook;
///
/// let hook = FnHook::new(|_session, data| {
///     Ok((data == b"TEMP?").then(|| r"TEMP=21\x0d".to_string()))
/// })
/// .with_custom(|index| Ok(Some(format!("$$$button {}", index))));
/// ```
pub struct FnHook {
    names: Vec<String>,
    handler: Box<HandleFn>,
    custom: Option<Box<CustomFn>>,
}

impl FnHook {
    /// Create a hook from a miss handler
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SessionInfo, &[u8]) -> HookResult + Send + Sync + 'static,
    {
        Self {
            names: default_function_names(),
            handler: Box::new(handler),
            custom: None,
        }
    }

    /// Set the custom function handler
    pub fn with_custom<F>(mut self, custom: F) -> Self
    where
        F: Fn(usize) -> HookResult + Send + Sync + 'static,
    {
        self.custom = Some(Box::new(custom));
        self
    }

    /// Set display names; missing entries keep their defaults
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (slot, name) in self.names.iter_mut().zip(names) {
            *slot = name.into();
        }
        self
    }
}

impl ExtensionHook for FnHook {
    fn function_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn handle(&self, session: &SessionInfo, received: &[u8]) -> HookResult {
        (self.handler)(session, received)
    }

    fn custom_func(&self, index: usize) -> HookResult {
        check_index(index)?;
        match &self.custom {
            Some(custom) => custom(index),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for FnHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHook")
            .field("names", &self.names)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}
