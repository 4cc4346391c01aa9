// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Data model shared between the sensor device and the monitoring console.

mod alert;
mod command;
mod error;
mod wire;

pub use alert::{AlertLevel, Metric, Thresholds};
pub use command::{Command, CommandMessage, DEFAULT_HISTORY_COUNT, MAX_HISTORY_COUNT};
pub use error::{Error, Result};
pub use wire::TelemetryMessage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped temperature/humidity sample.
///
/// Timestamps are not guaranteed to be monotonic at the source: history replies carry
/// timestamps in the past, so arrival order says nothing about time order.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,

    /// Temperature in °C.
    pub temperature: f64,

    /// Relative humidity in %.
    pub humidity: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
        }
    }

    /// Encodes the reading as a relay telemetry payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&TelemetryMessage::from(self))?)
    }

    /// Decodes a relay telemetry payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let message: TelemetryMessage =
            serde_json::from_slice(payload).map_err(|e| Error::MalformedTelemetry {
                reason: e.to_string(),
            })?;

        Self::try_from(message)
    }
}
