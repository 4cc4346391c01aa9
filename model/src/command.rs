// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// History size the device replies with when a command carries no count.
pub const DEFAULT_HISTORY_COUNT: u32 = 5;

/// Largest history window a device answers, the most results ThingSpeak returns per request.
pub const MAX_HISTORY_COUNT: u32 = 8000;

/// A validated command for the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Resend the `count` most recent readings.
    GetHistory { count: u32 },
}

/// Command payload as it travels over the relay: `{"command": "get_history", "count": 3}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandMessage {
    GetHistory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<i64>,
    },
}

impl Command {
    /// Builds a history request from a caller supplied count.
    ///
    /// Fails with [`Error::InvalidInput`] unless `count` lies in `1..=MAX_HISTORY_COUNT`.
    pub fn get_history(count: i64) -> Result<Self> {
        history_count(count)
            .map(|count| Self::GetHistory { count })
            .ok_or_else(|| Error::InvalidInput {
                reason: format!(
                    "history count must be between 1 and {MAX_HISTORY_COUNT}, got {count}"
                ),
            })
    }

    /// Parses and validates an inbound command payload.
    ///
    /// A missing count falls back to [`DEFAULT_HISTORY_COUNT`]. A count of zero or less, or above
    /// [`MAX_HISTORY_COUNT`], is rejected like any other malformed command.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let message: CommandMessage =
            serde_json::from_slice(payload).map_err(|e| Error::MalformedCommand {
                reason: e.to_string(),
            })?;

        match message {
            CommandMessage::GetHistory { count: None } => Ok(Self::GetHistory {
                count: DEFAULT_HISTORY_COUNT,
            }),
            CommandMessage::GetHistory { count: Some(count) } => history_count(count)
                .map(|count| Self::GetHistory { count })
                .ok_or_else(|| Error::MalformedCommand {
                    reason: format!("history count out of range 1..={MAX_HISTORY_COUNT}: {count}"),
                }),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&CommandMessage::from(*self))?)
    }
}

impl From<Command> for CommandMessage {
    fn from(command: Command) -> Self {
        match command {
            Command::GetHistory { count } => Self::GetHistory {
                count: Some(count.into()),
            },
        }
    }
}

fn history_count(count: i64) -> Option<u32> {
    u32::try_from(count)
        .ok()
        .filter(|count| (1..=MAX_HISTORY_COUNT).contains(count))
}
