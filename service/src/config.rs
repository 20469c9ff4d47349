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

//! Engine configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Ports below this need elevated privileges and are never opened
pub const MIN_UNPRIVILEGED_PORT: u16 = 1024;

/// Engine configuration
///
/// Settings that belong to the emulator process rather than to a device
/// file. Use the builder methods to customize.
///
/// # Example
///
/// ```
/// use avemu_service::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_bind_ip("127.0.0.1".parse().unwrap())
///     .with_shutdown_timeout(Duration::from_secs(2))
///     .with_hook_suppressed_logging(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address the listener binds to
    pub bind_ip: IpAddr,

    /// Lowest port a listener may open, never below [`MIN_UNPRIVILEGED_PORT`]
    pub min_port: u16,

    /// How long closing waits for sessions before aborting them
    pub shutdown_timeout: Duration,

    /// Per session control channel capacity
    pub control_buffer_size: usize,

    /// Answer unmatched input silently instead of with a diagnostic
    pub hook_suppressed_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            min_port: MIN_UNPRIVILEGED_PORT,
            shutdown_timeout: Duration::from_secs(5),
            control_buffer_size: 32,
            hook_suppressed_logging: false,
        }
    }
}

impl EngineConfig {
    /// Set the bind address
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Raise the lowest acceptable port
    ///
    /// Values below [`MIN_UNPRIVILEGED_PORT`] fail [`validate`](Self::validate)
    /// and are ignored when opening a port.
    pub fn with_min_port(mut self, port: u16) -> Self {
        self.min_port = port;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the control channel capacity
    pub fn with_control_buffer_size(mut self, size: usize) -> Self {
        self.control_buffer_size = size;
        self
    }

    /// Enable or disable silent handling of unmatched input
    pub fn with_hook_suppressed_logging(mut self, suppressed: bool) -> Self {
        self.hook_suppressed_logging = suppressed;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_port < MIN_UNPRIVILEGED_PORT {
            return Err(format!(
                "min_port must be at least {}",
                MIN_UNPRIVILEGED_PORT
            ));
        }

        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be greater than 0".to_string());
        }

        if self.control_buffer_size == 0 {
            return Err("control_buffer_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.min_port, 1024);
        assert_eq!(config.bind_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(!config.hook_suppressed_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::default()
            .with_min_port(2000)
            .with_control_buffer_size(4)
            .with_hook_suppressed_logging(true);

        assert_eq!(config.min_port, 2000);
        assert_eq!(config.control_buffer_size, 4);
        assert!(config.hook_suppressed_logging);
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        config.shutdown_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config.shutdown_timeout = Duration::from_secs(1);
        config.control_buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_port_below_privileged_range_rejected() {
        let config = EngineConfig::default().with_min_port(80);
        assert!(config.validate().unwrap_err().contains("1024"));
        assert!(EngineConfig::default().with_min_port(1024).validate().is_ok());
    }
}
