// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use sensor_link_common::relay::{MqttRelay, MqttSettings, Role};
use sensor_link_common::{shutdown, Console, ConsoleConfig, LogSink};

/// Monitors a room climate sensor through the relay.
#[derive(Parser, Debug)]
#[command(name = "sensor-link-console", version, about)]
struct Opts {
    /// Identity of the monitored device on the relay
    #[arg(long, env = "DEVICE_ID")]
    device_id: String,

    /// MQTT broker host
    #[arg(long, env = "MQTT_HOST", default_value = "127.0.0.1")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    broker_port: u16,

    /// Milliseconds between two alert evaluations
    #[arg(long, default_value_t = 1000)]
    refresh_interval_ms: u64,

    /// Keep at most this many readings in memory
    #[arg(long)]
    buffer_capacity: Option<usize>,
}

/// A line typed by the operator.
#[derive(Debug, PartialEq)]
enum OperatorCommand<'a> {
    /// `get_history [n]`, the count is validated by the console.
    GetHistory(&'a str),
    Exit,
    Unknown(&'a str),
}

impl<'a> OperatorCommand<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Some(match word.to_lowercase().as_str() {
            "get_history" => Self::GetHistory(rest.trim()),
            "exit" | "quit" => Self::Exit,
            _ => Self::Unknown(line),
        })
    }
}

/// Our App struct that holds the console.
///
/// The console ingests telemetry and refreshes alerts in the background, while the App reads
/// operator commands from stdin.
struct App {
    console: Arc<Console<MqttRelay>>,
}

impl App {
    fn new(opts: Opts) -> Self {
        let relay = Arc::new(MqttRelay::new(MqttSettings::new(
            opts.broker_host,
            opts.broker_port,
            opts.device_id,
            Role::Console,
        )));

        let config = ConsoleConfig {
            refresh_interval: Duration::from_millis(opts.refresh_interval_ms),
            buffer_capacity: opts.buffer_capacity,
            ..Default::default()
        };

        Self {
            console: Arc::new(Console::new(relay, Arc::new(LogSink), config)),
        }
    }

    /// Run the console until `exit`, Ctrl+C, SIGTERM or a lost relay.
    async fn run(&self) -> anyhow::Result<()> {
        self.console
            .start_listening()
            .await
            .context("cannot connect to the relay")?;

        println!("Command interface ready. Type 'get_history <n>' or 'exit'.");

        let token = self.console.shutdown_token();
        shutdown::cancel_on_signal(token.clone());

        let console = self.console.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match OperatorCommand::parse(&line) {
                    Some(OperatorCommand::GetHistory(count)) => {
                        if let Err(e) = console.request_history_str(count).await {
                            warn!("History request not sent: {}", e);
                        }
                    }
                    Some(OperatorCommand::Exit) => {
                        console.shutdown_token().cancel();
                        break;
                    }
                    Some(OperatorCommand::Unknown(line)) => {
                        println!("Unknown command `{line}`. Try: get_history <n> or exit");
                    }
                    None => {}
                }
            }
        });

        token.cancelled().await;
        info!("Console stopping...");

        self.console.shutdown().await.context("relay lost")
    }
}

/// A minimal main function that initializes the App and runs it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = App::new(Opts::parse());

    app.run().await
}

#[test]
fn test_operator_commands() {
    assert_eq!(
        OperatorCommand::parse("get_history 12"),
        Some(OperatorCommand::GetHistory("12"))
    );
    assert_eq!(
        OperatorCommand::parse("  GET_HISTORY  "),
        Some(OperatorCommand::GetHistory(""))
    );
    assert_eq!(OperatorCommand::parse("quit"), Some(OperatorCommand::Exit));
    assert_eq!(OperatorCommand::parse("reboot now"), Some(OperatorCommand::Unknown("reboot now")));
    assert_eq!(OperatorCommand::parse("   "), None);
}
