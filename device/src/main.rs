// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;

use sensor_link_common::provider::{
    DummySource, MeasurementSourcePointer, ReadingProvider, ThingSpeakSource,
};
use sensor_link_common::relay::{MqttRelay, MqttSettings, Role};
use sensor_link_common::{shutdown, AgentConfig, TelemetryAgent};

/// Publishes room climate readings through the relay and answers history requests.
#[derive(Parser, Debug)]
#[command(name = "sensor-link-device", version, about)]
struct Opts {
    /// Device identity on the relay
    #[arg(long, env = "DEVICE_ID")]
    device_id: String,

    /// MQTT broker host
    #[arg(long, env = "MQTT_HOST", default_value = "127.0.0.1")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    broker_port: u16,

    /// ThingSpeak channel to read measurements from
    #[arg(long, env = "THINGSPEAK_CHANNEL", default_value_t = 2938875)]
    channel_id: u64,

    /// ThingSpeak read API key, for private channels
    #[arg(long, env = "THINGSPEAK_READ_KEY")]
    read_api_key: Option<String>,

    /// Seconds between two live readings
    #[arg(long, default_value_t = 5)]
    publish_interval_secs: u64,

    /// Replay the bundled dummy feed instead of querying ThingSpeak
    #[arg(long)]
    dummy: bool,
}

/// Our App struct that holds the telemetry agent.
struct App {
    agent: TelemetryAgent<MqttRelay, MeasurementSourcePointer>,
}

impl App {
    /// Create a new App struct, wiring the measurement source and the relay into the agent.
    fn new(opts: Opts) -> anyhow::Result<Self> {
        // Use the dummy feed if asked to, otherwise the ThingSpeak channel.
        let source: MeasurementSourcePointer = if opts.dummy {
            Box::new(DummySource::new()?)
        } else {
            Box::new(ThingSpeakSource::new(opts.channel_id, opts.read_api_key))
        };

        let relay = Arc::new(MqttRelay::new(MqttSettings::new(
            opts.broker_host,
            opts.broker_port,
            opts.device_id,
            Role::Device,
        )));

        let config = AgentConfig {
            publish_interval: Duration::from_secs(opts.publish_interval_secs),
            ..Default::default()
        };

        Ok(Self {
            agent: TelemetryAgent::new(relay, ReadingProvider::new(source), config),
        })
    }

    /// Run the agent until Ctrl+C, SIGTERM or a relay failure it cannot recover from.
    async fn run(&self) -> anyhow::Result<()> {
        shutdown::cancel_on_signal(self.agent.shutdown_token());
        info!("Device running, stop with Ctrl+C or SIGTERM");

        self.agent.run().await.context("telemetry agent failed")
    }
}

/// A minimal main function that initializes the App and runs it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = App::new(Opts::parse())?;

    app.run().await
}
