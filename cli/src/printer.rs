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

//! Prints engine events in the terminal log format

use async_trait::async_trait;
use avemu_service::{EngineEvent, EngineObserver, EventKind};

/// Observer that writes `DIR | HH:MM:SS.mmm | payload` lines
#[derive(Debug, Clone, Copy)]
pub struct EventPrinter {
    byte_count: bool,
}

impl EventPrinter {
    pub fn new(byte_count: bool) -> Self {
        Self { byte_count }
    }
}

#[async_trait]
impl EngineObserver for EventPrinter {
    async fn on_event(&self, event: &EngineEvent) {
        let line = event.display_line(self.byte_count);
        match event.kind {
            EventKind::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}
