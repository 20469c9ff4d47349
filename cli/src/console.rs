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

//! Operator console commands

use std::fmt;

/// One line typed at the operator console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Send escape notation text to the active session
    Send(String),
    /// Run a custom script function
    Func(usize),
    /// Reload the command table from the device file
    Reload,
    /// Reload the script
    ReloadScript,
    /// Close the active session
    Disconnect,
    /// Open the listener, optionally on another port
    Open(Option<u16>),
    /// Close the listener
    Close,
    /// Print engine status
    Status,
    /// Answer unmatched input silently or not
    Quiet(bool),
    /// Print the command list
    Help,
    /// Close the port and exit
    Quit,
}

/// Why a console line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
send <text>      send escape notation text (e.g. PWR\\x0d) to the active client
func <1-5>       run a script custom function
reload           reload the command list from the device file
reload-script    reload the device script
disconnect       close the active client connection
open [port]      open the listening port
close            close the listening port
status           show the emulator state
quiet on|off     answer unmatched queries silently
help             show this list
quit             close the port and exit";

impl OperatorCommand {
    /// Parse a console line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim_start();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest),
            None => (line.trim_end(), ""),
        };

        let command = match word {
            "" => return Ok(None),
            // Everything after the first space is payload, spaces included
            "send" => Self::Send(rest.trim_end_matches(['\r', '\n']).to_string()),
            "func" => Self::Func(
                rest.trim()
                    .parse()
                    .map_err(|_| ParseError(format!("not a function number: {:?}", rest.trim())))?,
            ),
            "reload" => Self::Reload,
            "reload-script" => Self::ReloadScript,
            "disconnect" => Self::Disconnect,
            "open" => match rest.trim() {
                "" => Self::Open(None),
                port => Self::Open(Some(
                    port.parse()
                        .map_err(|_| ParseError(format!("not a port: {:?}", port)))?,
                )),
            },
            "close" => Self::Close,
            "status" => Self::Status,
            "quiet" => match rest.trim() {
                "on" => Self::Quiet(true),
                "off" => Self::Quiet(false),
                other => return Err(ParseError(format!("expected on or off, got {:?}", other))),
            },
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError(format!("unknown command {:?}, try help", other))),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line() {
        assert_eq!(OperatorCommand::parse("").unwrap(), None);
        assert_eq!(OperatorCommand::parse("   \n").unwrap(), None);
    }

    #[test]
    fn test_send_keeps_spaces() {
        assert_eq!(
            OperatorCommand::parse("send PWR ON\\x0d\n").unwrap(),
            Some(OperatorCommand::Send("PWR ON\\x0d".to_string()))
        );
        assert_eq!(
            OperatorCommand::parse("send").unwrap(),
            Some(OperatorCommand::Send(String::new()))
        );
    }

    #[test]
    fn test_func() {
        assert_eq!(
            OperatorCommand::parse("func 3").unwrap(),
            Some(OperatorCommand::Func(3))
        );
        assert!(OperatorCommand::parse("func x").is_err());
    }

    #[test]
    fn test_open() {
        assert_eq!(
            OperatorCommand::parse("open").unwrap(),
            Some(OperatorCommand::Open(None))
        );
        assert_eq!(
            OperatorCommand::parse("open 5001").unwrap(),
            Some(OperatorCommand::Open(Some(5001)))
        );
        assert!(OperatorCommand::parse("open 70000").is_err());
    }

    #[test]
    fn test_quiet() {
        assert_eq!(
            OperatorCommand::parse("quiet on").unwrap(),
            Some(OperatorCommand::Quiet(true))
        );
        assert_eq!(
            OperatorCommand::parse("quiet off").unwrap(),
            Some(OperatorCommand::Quiet(false))
        );
        assert!(OperatorCommand::parse("quiet maybe").is_err());
    }

    #[test]
    fn test_simple_words() {
        assert_eq!(
            OperatorCommand::parse("reload-script").unwrap(),
            Some(OperatorCommand::ReloadScript)
        );
        assert_eq!(
            OperatorCommand::parse("exit").unwrap(),
            Some(OperatorCommand::Quit)
        );
        assert!(OperatorCommand::parse("launch").is_err());
    }
}
