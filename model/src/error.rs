// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Result type alias used across the sensor link crates.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The upstream measurement source failed or returned too few samples.
    #[error("reading provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },

    /// The relay failed to connect, send or receive.
    #[error("relay transport error: {reason}")]
    Transport { reason: String },

    /// An inbound command could not be parsed or is not recognised.
    #[error("malformed command: {reason}")]
    MalformedCommand { reason: String },

    /// A caller supplied a history count that is not a positive integer.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// An inbound telemetry payload could not be decoded.
    #[error("malformed telemetry: {reason}")]
    MalformedTelemetry { reason: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Whether the relay connection is the cause, i.e. a reconnect may help.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
