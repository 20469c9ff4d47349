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

//! Device configuration

use crate::file::{
    Category, CommandEntry, Delay, DelayValue, DeviceFile, Manufacturer, Model, Port, Script,
    Version,
};
use crate::{CommandField, CommandRecord, CommandTable, ConfigError, ConfigResult, ON_CONNECT};
use avemu_escapecodec::{decode, encode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Extension of the script accompanying a device file
pub const HOOK_EXTENSION: &str = "lua";

/// A fully loaded device description.
///
/// The whole value is replaced on a full load; a command reload swaps
/// only `commands` through [`DeviceConfig::with_commands`].
///
/// # Example
///
/// ```
/// use avemu_device::DeviceConfig;
///
/// let config = DeviceConfig::template("Acme", "PJ-100", "Projector", 5000);
/// assert_eq!(config.port, 5000);
/// assert!(config.commands.on_connect().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Manufacturer name
    pub manufacturer: String,
    /// Model name
    pub model: String,
    /// Device category (projector, switcher, ...)
    pub category: String,
    /// Free form version label
    pub version: String,
    /// TCP port the device listens on
    pub port: u16,
    /// Seconds to wait before answering a matched query
    pub response_delay_seconds: f64,
    /// Whether an extension script accompanies the file
    pub hook_enabled: bool,
    /// Query/response pairs
    pub commands: CommandTable,
}

impl DeviceConfig {
    /// Defaults for a freshly created device file
    pub fn template(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        category: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            category: category.into(),
            version: "1_0_0_0".to_string(),
            port,
            response_delay_seconds: 0.1,
            hook_enabled: false,
            commands: CommandTable::new(vec![CommandRecord::new(
                ON_CONNECT,
                ON_CONNECT,
                "Device is connected",
            )]),
        }
    }

    /// Load and decode a device file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&read(path)?)?;
        info!(
            path = %path.display(),
            device = %config.label(),
            commands = config.commands.len(),
            "Loaded device file"
        );
        Ok(config)
    }

    /// Load only the command list of a device file
    pub fn load_commands(path: impl AsRef<Path>) -> ConfigResult<CommandTable> {
        Ok(Self::load(path)?.commands)
    }

    /// Parse a device description from JSON text
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let DeviceFile(
            Manufacturer { manufacturer },
            Model { model },
            Category { category },
            Version { version },
            Port { port },
            Delay { delay },
            Script { script },
            entries,
        ) = serde_json::from_str(text)?;

        let port = u16::try_from(port).map_err(|_| ConfigError::InvalidPort(port))?;
        let response_delay_seconds = parse_delay(delay)?;
        let commands = decode_commands(entries)?;

        Ok(Self {
            manufacturer,
            model,
            category,
            version,
            port,
            response_delay_seconds,
            hook_enabled: script,
            commands,
        })
    }

    /// Render the device description as pretty printed JSON
    pub fn to_json_string(&self) -> ConfigResult<String> {
        let entries = self
            .commands
            .iter()
            .map(|record| CommandEntry {
                description: record.description().to_string(),
                query: encode(record.query()),
                response: encode(record.response()),
            })
            .collect();

        let file = DeviceFile(
            Manufacturer {
                manufacturer: self.manufacturer.clone(),
            },
            Model {
                model: self.model.clone(),
            },
            Category {
                category: self.category.clone(),
            },
            Version {
                version: self.version.clone(),
            },
            Port {
                port: u64::from(self.port),
            },
            Delay {
                delay: DelayValue::Seconds(self.response_delay_seconds),
            },
            Script {
                script: self.hook_enabled,
            },
            entries,
        );

        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write the device description to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Saved device file");
        Ok(())
    }

    /// Replace the command table, keeping every other setting
    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    /// Delay applied before each matched response
    pub fn response_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.response_delay_seconds).unwrap_or(Duration::ZERO)
    }

    /// `Manufacturer - Model` label used in log lines
    pub fn label(&self) -> String {
        format!("{} - {}", self.manufacturer, self.model)
    }

    /// Path of the extension script for the device file at `path`
    ///
    /// ```
    /// use avemu_device::DeviceConfig;
    /// use std::path::Path;
    ///
    /// let hook = DeviceConfig::hook_path(Path::new("/sims/acme_pj100_1_0_0_0.json"));
    /// assert_eq!(hook, Path::new("/sims/acme_pj100_1_0_0_0.lua"));
    /// ```
    pub fn hook_path(path: &Path) -> PathBuf {
        path.with_extension(HOOK_EXTENSION)
    }
}

fn read(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_delay(delay: DelayValue) -> ConfigResult<f64> {
    let seconds = match delay {
        DelayValue::Seconds(seconds) => seconds,
        DelayValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidDelay(text.clone()))?,
    };
    // Must also fit a Duration, or the wait could not be scheduled
    if seconds >= 0.0 && Duration::try_from_secs_f64(seconds).is_ok() {
        Ok(seconds)
    } else {
        Err(ConfigError::InvalidDelay(seconds.to_string()))
    }
}

fn decode_commands(entries: Vec<CommandEntry>) -> ConfigResult<CommandTable> {
    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let query = decode(&entry.query).map_err(|source| ConfigError::Codec {
            index,
            field: CommandField::Query,
            source,
        })?;
        let response = decode(&entry.response).map_err(|source| ConfigError::Codec {
            index,
            field: CommandField::Response,
            source,
        })?;
        records.push(CommandRecord::new(entry.description, query, response));
    }
    Ok(CommandTable::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"Manufacturer": "Acme"},
        {"Model": "PJ-100"},
        {"Category": "Projector"},
        {"Version": "1_0_0_0"},
        {"Port": 5000},
        {"Delay": 0.25},
        {"Script": true},
        [
            {"Description": "ON_CONNECT", "Query": "ON_CONNECT", "Response": "Device is connected"},
            {"Description": "Power on", "Query": "PWR ON\\x0d", "Response": "PWR=ON\\x0d"},
            {"Description": "Status", "Query": "\\x02STA\\x03", "Response": "OK\\r\\n"}
        ]
    ]"#;

    #[test]
    fn test_parse_sample() {
        let config = DeviceConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.manufacturer, "Acme");
        assert_eq!(config.model, "PJ-100");
        assert_eq!(config.category, "Projector");
        assert_eq!(config.version, "1_0_0_0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.response_delay(), Duration::from_millis(250));
        assert!(config.hook_enabled);
        assert_eq!(config.commands.len(), 3);

        let power = config.commands.lookup(b"PWR ON\r").unwrap();
        assert_eq!(&power.response()[..], b"PWR=ON\r");
        let status = config.commands.lookup(b"\x02STA\x03").unwrap();
        assert_eq!(&status.response()[..], b"OK\r\n");
    }

    #[test]
    fn test_delay_as_string() {
        let text = SAMPLE.replace(r#"{"Delay": 0.25}"#, r#"{"Delay": "0.5"}"#);
        let config = DeviceConfig::from_json_str(&text).unwrap();
        assert_eq!(config.response_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let text = SAMPLE.replace(r#"{"Delay": 0.25}"#, r#"{"Delay": -1}"#);
        assert!(matches!(
            DeviceConfig::from_json_str(&text),
            Err(ConfigError::InvalidDelay(_))
        ));
    }

    #[test]
    fn test_delay_too_large_rejected() {
        let text = SAMPLE.replace(r#"{"Delay": 0.25}"#, r#"{"Delay": 1e300}"#);
        assert!(matches!(
            DeviceConfig::from_json_str(&text),
            Err(ConfigError::InvalidDelay(_))
        ));

        let text = SAMPLE.replace(r#"{"Delay": 0.25}"#, r#"{"Delay": "1e300"}"#);
        assert!(matches!(
            DeviceConfig::from_json_str(&text),
            Err(ConfigError::InvalidDelay(_))
        ));
    }

    #[test]
    fn test_port_overflow_rejected() {
        let text = SAMPLE.replace(r#"{"Port": 5000}"#, r#"{"Port": 70000}"#);
        assert!(matches!(
            DeviceConfig::from_json_str(&text),
            Err(ConfigError::InvalidPort(70000))
        ));
    }

    #[test]
    fn test_bad_escape_fails_whole_load() {
        let text = SAMPLE.replace(r#""OK\\r\\n""#, r#""OK\\xZ""#);
        match DeviceConfig::from_json_str(&text) {
            Err(ConfigError::Codec { index, field, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(field, CommandField::Response);
            }
            other => panic!("expected codec error, got {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_file_rejected() {
        let text = r#"[{"Manufacturer": "Acme"}, {"Model": "PJ-100"}]"#;
        assert!(matches!(
            DeviceConfig::from_json_str(text),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_misplaced_field_rejected() {
        let text = SAMPLE.replace(r#"{"Port": 5000}"#, r#"{"Portnumber": 5000}"#);
        assert!(DeviceConfig::from_json_str(&text).is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_bytes() {
        let config = DeviceConfig::from_json_str(SAMPLE).unwrap();
        let text = config.to_json_string().unwrap();
        assert!(text.contains(r#""PWR ON\\x0d""#));
        let reloaded = DeviceConfig::from_json_str(&text).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_with_commands_keeps_metadata() {
        let config = DeviceConfig::from_json_str(SAMPLE).unwrap();
        let replaced = config
            .clone()
            .with_commands(CommandTable::new(vec![CommandRecord::new("Ping", "PING", "PONG")]));
        assert_eq!(replaced.port, config.port);
        assert_eq!(replaced.response_delay_seconds, config.response_delay_seconds);
        assert_eq!(replaced.commands.len(), 1);
    }
}
