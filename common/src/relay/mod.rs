// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! The cloud message relay between device and console, seen as an opaque duplex channel.
//!
//! Each side holds one endpoint: the device sends telemetry and receives commands, the console
//! sends commands and receives telemetry.

mod link;
mod loopback;

pub use link::{Delivery, Link};
pub use loopback::LoopbackRelay;

#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttRelay, MqttSettings, Role};

use async_trait::async_trait;
use log::{error, warn};
use sensor_link_model::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicy;

/// One endpoint of the relay.
///
/// `send` and `receive` may be called concurrently from different tasks.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Establishes (or re-establishes) the connection.
    async fn connect(&self) -> Result<()>;

    /// Sends one message to the other side.
    async fn send(&self, payload: Vec<u8>) -> Result<()>;

    /// Waits for the next message from the other side. There is no timeout; cancel the future to
    /// stop waiting.
    async fn receive(&self) -> Result<Vec<u8>>;

    /// Closes the connection. Calling it more than once has no further effect.
    async fn close(&self) -> Result<()>;
}

/// Reconnects `relay` following `policy`, waiting between attempts.
///
/// Returns `Ok(false)` when `token` got cancelled while waiting, and the last transport error once
/// the attempts are exhausted.
pub async fn reconnect<R: Relay + ?Sized>(
    relay: &R,
    policy: &RetryPolicy,
    token: &CancellationToken,
) -> Result<bool> {
    let mut last_error = Error::transport("reconnecting is disabled");

    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_for_attempt(attempt);
        warn!(
            "Reconnecting to relay in {:?} (attempt {}/{})",
            delay, attempt, policy.max_attempts
        );

        tokio::select! {
            _ = token.cancelled() => return Ok(false),
            _ = tokio::time::sleep(delay) => {}
        }

        match relay.connect().await {
            Ok(()) => return Ok(true),
            Err(e) => {
                warn!("Reconnect attempt {} failed: {}", attempt, e);
                last_error = e;
            }
        }
    }

    error!("Giving up on the relay: {}", last_error);
    Err(last_error)
}
