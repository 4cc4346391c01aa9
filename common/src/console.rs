// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! The monitoring console: ingests the device's telemetry, re-evaluates alerts on every refresh
//! tick and hands immutable snapshots to a presentation layer.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use sensor_link_model::{Error, Reading, Result, Thresholds};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::{AlertEvaluator, AlertReport};
use crate::buffer::TelemetryBuffer;
use crate::relay::{Link, Relay};
use crate::requestor::HistoryRequestor;
use crate::retry::RetryPolicy;
use crate::ValueStore;

#[derive(Clone, Debug, PartialEq)]
pub struct ConsoleConfig {
    pub refresh_interval: Duration,
    /// Upper bound on buffered readings, unbounded when `None`.
    pub buffer_capacity: Option<usize>,
    pub temperature: Thresholds,
    pub humidity: Thresholds,
    pub dew_point: Thresholds,
    pub retry: RetryPolicy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(1000),
            buffer_capacity: None,
            temperature: Thresholds::TEMPERATURE,
            humidity: Thresholds::HUMIDITY,
            dew_point: Thresholds::DEW_POINT,
            retry: RetryPolicy::default(),
        }
    }
}

/// What the presentation layer gets to see after a refresh.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ConsoleSnapshot {
    /// Buffered readings, oldest first.
    pub readings: Vec<Reading>,
    pub latest: Option<Reading>,
    pub alerts: AlertReport,
}

/// Receives a snapshot after every refresh tick.
pub trait PresentationSink: Send + Sync {
    fn present(&self, snapshot: &ConsoleSnapshot);
}

/// Presentation sink that writes the current values and alert colours to the log.
pub struct LogSink;

impl PresentationSink for LogSink {
    fn present(&self, snapshot: &ConsoleSnapshot) {
        let Some(latest) = &snapshot.latest else {
            debug!("Waiting for data...");
            return;
        };

        let alerts = &snapshot.alerts;
        info!(
            "{} | {:.2}°C [{}] | {:.2}% [{}] | dew point {:.2}°C [{}] | {} readings",
            latest.timestamp.format("%Y-%m-%d %H:%M:%S"),
            latest.temperature,
            alerts.temperature.level.color(),
            latest.humidity,
            alerts.humidity.level.color(),
            alerts.dew_point,
            alerts.dew_point_state.level.color(),
            snapshot.readings.len()
        );

        for event in &alerts.events {
            warn!(
                "{:?} {} alert triggered: {:.2}",
                event.level, event.metric, event.value
            );
        }
    }
}

/// State shared between the console and its background tasks.
struct Core {
    buffer: TelemetryBuffer,
    evaluator: Mutex<AlertEvaluator>,
    sink: Arc<dyn PresentationSink>,
    snapshots: ValueStore<ConsoleSnapshot>,
}

impl Core {
    fn refresh(&self) -> ConsoleSnapshot {
        let readings = self.buffer.snapshot();
        let latest = readings.last().copied();

        let alerts = self
            .evaluator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evaluate(latest.as_ref());

        let snapshot = ConsoleSnapshot {
            readings,
            latest,
            alerts,
        };

        self.sink.present(&snapshot);
        self.snapshots.set(snapshot.clone());
        snapshot
    }

    fn ingest(&self, payload: &[u8]) {
        match Reading::from_payload(payload) {
            Ok(reading) => {
                if self.buffer.merge(reading) {
                    debug!(
                        "[Telemetry] {} {:.2}°C {:.2}%",
                        reading.timestamp, reading.temperature, reading.humidity
                    );
                }
            }
            Err(e) => warn!("Dropping telemetry: {}", e),
        }
    }
}

pub struct Console<R: ?Sized> {
    link: Link<R>,
    core: Arc<Core>,
    requestor: HistoryRequestor<R>,
    refresh_interval: Duration,
    tasks: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl<R: Relay + ?Sized + 'static> Console<R> {
    pub fn new(relay: Arc<R>, sink: Arc<dyn PresentationSink>, config: ConsoleConfig) -> Self {
        let buffer = match config.buffer_capacity {
            Some(capacity) => TelemetryBuffer::with_capacity_limit(capacity),
            None => TelemetryBuffer::new(),
        };

        let core = Core {
            buffer,
            evaluator: Mutex::new(AlertEvaluator::new(
                config.temperature,
                config.humidity,
                config.dew_point,
            )),
            sink,
            snapshots: ValueStore::default(),
        };

        let link = Link::new(relay, config.retry, CancellationToken::new());

        Self {
            requestor: HistoryRequestor::new(link.clone()),
            link,
            core: Arc::new(core),
            refresh_interval: config.refresh_interval,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn buffer(&self) -> &TelemetryBuffer {
        &self.core.buffer
    }

    /// Latest snapshot for presentation layers that poll instead of using a sink.
    pub fn snapshots(&self) -> ValueStore<ConsoleSnapshot> {
        self.core.snapshots.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.link.token().clone()
    }

    /// Connects to the relay and starts ingesting telemetry and refreshing alerts.
    pub async fn start_listening(&self) -> Result<()> {
        self.link.ensure_running()?;
        self.link.connect().await?;
        info!("Listening for telemetry...");

        let ingest = {
            let link = self.link.clone();
            let core = self.core.clone();
            tokio::spawn(async move {
                let result = Self::ingest_loop(&link, &core).await;
                if let Err(e) = &result {
                    error!("Telemetry ingestion stopped: {}", e);
                    link.token().cancel();
                }
                result
            })
        };

        let refresh = {
            let token = self.link.token().clone();
            let core = self.core.clone();
            let period = self.refresh_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = ticker.tick() => {}
                    }
                    core.refresh();
                }
            })
        };

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([ingest, refresh]);

        Ok(())
    }

    async fn ingest_loop(link: &Link<R>, core: &Core) -> Result<()> {
        while let Some(payload) = link.receive().await? {
            core.ingest(&payload);
        }
        Ok(())
    }

    /// Runs one evaluation pass right away, outside the refresh schedule.
    pub fn refresh(&self) -> ConsoleSnapshot {
        self.core.refresh()
    }

    /// Asks the device for its `count` most recent readings.
    pub async fn request_history(&self, count: i64) -> Result<()> {
        self.link.ensure_running()?;
        self.requestor.request_history(count).await
    }

    /// Like [`Console::request_history`] for raw operator input.
    pub async fn request_history_str(&self, input: &str) -> Result<()> {
        self.link.ensure_running()?;
        self.requestor.request_history_str(input).await
    }

    /// Stops the background tasks and closes the relay.
    ///
    /// Returns the ingestion error if ingestion ended on its own because the relay was lost.
    pub async fn shutdown(&self) -> Result<()> {
        self.link.token().cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        let mut outcome = Ok(());
        for task in tasks {
            let result = task
                .await
                .map_err(|e| Error::transport(format!("console task aborted: {e}")))
                .and_then(|result| result);
            if outcome.is_ok() {
                outcome = result;
            }
        }

        if let Err(e) = self.link.close().await {
            warn!("Closing the relay failed: {}", e);
        }
        info!("Console stopped");

        outcome
    }
}
