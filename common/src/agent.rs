// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! The device telemetry agent.
//!
//! Two duties share one relay connection: the publish duty sends a fresh reading every interval,
//! the command duty answers `get_history` commands with a batch of past readings. Both stop on
//! the shared shutdown token, after which the connection is closed exactly once.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use sensor_link_model::{Command, Error, Reading, Result};
use tokio_util::sync::CancellationToken;

use crate::provider::{MeasurementSource, ReadingProvider};
use crate::relay::{Delivery, Link, Relay};
use crate::retry::RetryPolicy;

#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    /// Pause between two live readings.
    pub publish_interval: Duration,
    /// Reconnect policy for mid-stream relay failures.
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct TelemetryAgent<R: ?Sized, S> {
    link: Link<R>,
    provider: Arc<ReadingProvider<S>>,
    config: AgentConfig,
}

impl<R: ?Sized, S> Clone for TelemetryAgent<R, S> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
            provider: self.provider.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, S> TelemetryAgent<R, S>
where
    R: Relay + ?Sized + 'static,
    S: MeasurementSource + 'static,
{
    pub fn new(relay: Arc<R>, provider: ReadingProvider<S>, config: AgentConfig) -> Self {
        let link = Link::new(relay, config.retry.clone(), CancellationToken::new());

        Self {
            link,
            provider: Arc::new(provider),
            config,
        }
    }

    /// Token that stops the agent when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.link.token().clone()
    }

    /// Asks both duties to stop. [`TelemetryAgent::run`] returns once they did.
    pub fn shutdown(&self) {
        self.link.token().cancel();
    }

    /// Connects to the relay and runs both duties until shutdown.
    ///
    /// A failing initial connect is returned right away. A duty that runs out of reconnect
    /// attempts stops the other one and its error is returned after the connection is closed.
    pub async fn run(&self) -> Result<()> {
        self.link.connect().await?;
        info!("Telemetry agent connected, starting duties");

        let publisher = self.clone();
        let listener = self.clone();
        let publish = tokio::spawn(async move { publisher.publish_duty().await });
        let command = tokio::spawn(async move { listener.command_duty().await });

        let (published, commanded) = tokio::join!(publish, command);
        let published = self.settle("publish", published);
        let commanded = self.settle("command", commanded);

        if let Err(e) = self.link.close().await {
            warn!("Closing the relay failed: {}", e);
        }
        info!("Telemetry agent stopped");

        published.and(commanded)
    }

    /// Flattens a duty's outcome, stopping the other duty on failure.
    fn settle(
        &self,
        duty: &str,
        outcome: std::result::Result<Result<()>, tokio::task::JoinError>,
    ) -> Result<()> {
        let result = outcome
            .map_err(|e| Error::transport(format!("{duty} duty aborted: {e}")))
            .and_then(|result| result);

        if let Err(e) = &result {
            error!("The {} duty failed: {}", duty, e);
            self.shutdown();
        }

        result
    }

    async fn publish_duty(&self) -> Result<()> {
        let token = self.link.token().clone();
        info!("Publishing a reading every {:?}", self.config.publish_interval);

        let result: Result<()> = async {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    published = self.publish_once() => published?,
                }

                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.config.publish_interval) => {}
                }
            }
        }
        .await;

        if result.is_err() {
            self.shutdown();
        }
        result
    }

    async fn publish_once(&self) -> Result<()> {
        let reading = match self.provider.fetch(1).await {
            Ok(readings) => readings.into_iter().next(),
            Err(e) => {
                warn!("Skipping this reading: {}", e);
                None
            }
        };

        let Some(reading) = reading else {
            return Ok(());
        };

        if self.deliver(&reading).await? == Delivery::Sent {
            info!(
                "Sent reading {:.2}°C {:.2}% at {}",
                reading.temperature, reading.humidity, reading.timestamp
            );
        }
        Ok(())
    }

    async fn command_duty(&self) -> Result<()> {
        let token = self.link.token().clone();
        info!("Listening for commands...");

        let result: Result<()> = async {
            while let Some(payload) = self.link.receive().await? {
                tokio::select! {
                    _ = token.cancelled() => break,
                    handled = self.handle_command(&payload) => handled?,
                }
            }
            Ok(())
        }
        .await;

        if result.is_err() {
            self.shutdown();
        }
        result
    }

    /// Answers one inbound command. Bad commands are logged and ignored.
    async fn handle_command(&self, payload: &[u8]) -> Result<()> {
        debug!("Received command: {}", String::from_utf8_lossy(payload));

        let count = match Command::parse(payload) {
            Ok(Command::GetHistory { count }) => count,
            Err(e) => {
                warn!("Ignoring command: {}", e);
                return Ok(());
            }
        };

        let readings = match self.provider.fetch(count as usize).await {
            Ok(readings) => readings,
            Err(e) => {
                warn!("Cannot answer history request for {} readings: {}", count, e);
                return Ok(());
            }
        };

        let mut sent = 0;
        for reading in &readings {
            match self.deliver(reading).await? {
                Delivery::Sent => sent += 1,
                Delivery::Dropped => {}
                Delivery::Cancelled => break,
            }
        }

        info!("Sent {} of {} historical readings", sent, readings.len());
        Ok(())
    }

    async fn deliver(&self, reading: &Reading) -> Result<Delivery> {
        self.link.send(reading.to_payload()?).await
    }
}
