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

//! # Avemu Device Definitions
//!
//! A device is described by a small JSON file: identification metadata, the
//! TCP port it listens on, a response delay, whether an extension script
//! accompanies it, and an ordered list of query/response pairs written in
//! escape notation (see `avemu-escapecodec`).
//!
//! ```json
//! [
//!     {"Manufacturer": "Acme"},
//!     {"Model": "PJ-100"},
//!     {"Category": "Projector"},
//!     {"Version": "1_0_0_0"},
//!     {"Port": 5000},
//!     {"Delay": 0.1},
//!     {"Script": false},
//!     [
//!         {"Description": "ON_CONNECT", "Query": "ON_CONNECT", "Response": "Device is connected"},
//!         {"Description": "Power on", "Query": "PWR ON\\x0d", "Response": "PWR=ON\\x0d"}
//!     ]
//! ]
//! ```
//!
//! Loading decodes every query and response into raw bytes and builds a
//! [`CommandTable`] answering exact-match lookups.

mod config;
mod file;
mod record;
mod result;
mod table;

pub use config::DeviceConfig;
pub use record::{CommandRecord, ON_CONNECT};
pub use result::{CommandField, ConfigError, ConfigResult};
pub use table::CommandTable;
