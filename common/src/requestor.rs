// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Console-side history requests.

use log::info;
use sensor_link_model::{Command, Error, Result, DEFAULT_HISTORY_COUNT};

use crate::relay::{Delivery, Link, Relay};

/// Asks the device to resend a window of its most recent readings.
///
/// Fire and forget: replies come back through the normal telemetry path and are only told apart
/// from live readings by their timestamps lying in the past. Sends go through the console's
/// [`Link`], so a failing relay is reconnected before the request is given up.
pub struct HistoryRequestor<R: ?Sized> {
    link: Link<R>,
}

impl<R: Relay + ?Sized> HistoryRequestor<R> {
    pub fn new(link: Link<R>) -> Self {
        Self { link }
    }

    /// Sends a `get_history` command for `count` readings.
    ///
    /// A count out of range fails with [`Error::InvalidInput`] before anything is sent. A request
    /// the relay could not deliver even after reconnecting is [`Error::Transport`].
    pub async fn request_history(&self, count: i64) -> Result<()> {
        let command = Command::get_history(count)?;

        match self.link.send(command.to_payload()?).await? {
            Delivery::Sent => {
                info!("Requested {} history readings", count);
                Ok(())
            }
            Delivery::Dropped => Err(Error::transport("history request dropped by the relay")),
            Delivery::Cancelled => Err(Error::transport("history request cancelled by shutdown")),
        }
    }

    /// Like [`HistoryRequestor::request_history`] for operator input. An empty input asks for
    /// the default window, anything that is not an integer is [`Error::InvalidInput`].
    pub async fn request_history_str(&self, input: &str) -> Result<()> {
        self.request_history(parse_count(input)?).await
    }
}

fn parse_count(input: &str) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(DEFAULT_HISTORY_COUNT.into());
    }

    input.parse::<i64>().map_err(|_| Error::InvalidInput {
        reason: format!("`{input}` is not a whole number"),
    })
}
