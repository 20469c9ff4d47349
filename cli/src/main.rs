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

//! `avemu` - TCP device emulator
//!
//! ```bash
//! avemu new projector.json --manufacturer Acme --model P100 --category Projector --port 5000
//! avemu run projector.json -v
//! ```

mod console;
mod printer;

use avemu_device::DeviceConfig;
use avemu_service::{Emulator, EngineConfig, EngineError};
use clap::{ArgAction, Parser, Subcommand};
use console::{HELP, OperatorCommand};
use printer::EventPrinter;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "avemu", about = "Emulate a TCP controlled device", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a device file and answer clients
    Run {
        /// Device file
        device: PathBuf,
        /// Listen on this port instead of the file's
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        /// Answer unmatched queries silently
        #[arg(long)]
        quiet_misses: bool,
        /// Append byte counts to logged payloads
        #[arg(long)]
        byte_count: bool,
    },
    /// Write a new device file with default settings
    New {
        /// Where to write the file
        path: PathBuf,
        #[arg(long)]
        manufacturer: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value_t = 5000)]
        port: u16,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            device,
            port,
            bind,
            quiet_misses,
            byte_count,
        } => {
            let config = EngineConfig::default()
                .with_bind_ip(bind)
                .with_hook_suppressed_logging(quiet_misses);
            config.validate()?;
            run(config, device, port, byte_count).await
        }
        Command::New {
            path,
            manufacturer,
            model,
            category,
            port,
            force,
        } => {
            if path.exists() && !force {
                return Err(format!("{} exists, use --force to overwrite", path.display()).into());
            }
            DeviceConfig::template(manufacturer, model, category, port).save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(
    config: EngineConfig,
    device: PathBuf,
    port: Option<u16>,
    byte_count: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let emulator = Emulator::new(config);
    emulator.subscribe(Arc::new(EventPrinter::new(byte_count)));

    emulator.load_config(&device).await?;
    match port {
        Some(port) => emulator.open_port(port).await?,
        None => emulator.open().await?,
    };
    println!("{}", emulator.snapshot());
    print_functions(&emulator);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        // End of input
        let Some(line) = line else { break };

        match OperatorCommand::parse(&line) {
            Ok(None) => {}
            Ok(Some(OperatorCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = execute(&emulator, command).await {
                    report(&e);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    emulator.close_port().await?;
    Ok(())
}

async fn execute(emulator: &Emulator, command: OperatorCommand) -> Result<(), EngineError> {
    match command {
        OperatorCommand::Send(text) => emulator.send_escaped(&text).await,
        OperatorCommand::Func(index) => emulator.trigger_hook_func(index).await,
        OperatorCommand::Reload => emulator.reload_commands().await,
        OperatorCommand::ReloadScript => {
            emulator.reload_hook().await?;
            print_functions(emulator);
            Ok(())
        }
        OperatorCommand::Disconnect => emulator.disconnect().await,
        OperatorCommand::Open(port) => {
            match port {
                Some(port) => emulator.open_port(port).await?,
                None => emulator.open().await?,
            };
            Ok(())
        }
        OperatorCommand::Close => emulator.close_port().await,
        OperatorCommand::Status => {
            println!("{}", emulator.snapshot());
            for session in emulator.sessions().all_session_infos() {
                println!(
                    "  {} {} {} sent={} received={}",
                    session.id,
                    session.peer_addr,
                    session.state,
                    session.bytes_sent,
                    session.bytes_received
                );
            }
            Ok(())
        }
        OperatorCommand::Quiet(quiet) => {
            emulator.set_hook_suppressed_logging(quiet);
            Ok(())
        }
        OperatorCommand::Help => {
            println!("{}", HELP);
            Ok(())
        }
        // Handled by the read loop
        OperatorCommand::Quit => Ok(()),
    }
}

fn print_functions(emulator: &Emulator) {
    if emulator.snapshot().hook_loaded {
        for (index, name) in emulator.function_names().iter().enumerate() {
            println!("  func {}: {}", index + 1, name);
        }
    }
}

/// Errors the engine already reported as events only need a log line
fn report(error: &EngineError) {
    match error {
        EngineError::NoConnection | EngineError::Hook(_) => {
            warn!(error = %error, "Command failed")
        }
        _ => eprintln!("{}", error),
    }
}
