// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::warn;
use sensor_link_model::{Error, Result};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{reconnect, Relay};
use crate::retry::RetryPolicy;

/// Outcome of [`Link::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The relay failed, got reconnected, and failed again. The message is lost.
    Dropped,
    /// Shutdown was requested while reconnecting.
    Cancelled,
}

/// A relay endpoint shared by several tasks of one process.
///
/// Transport failures trigger a reconnect with backoff. Tasks that fail on the same connection
/// reconnect it only once, and the connection is closed at most once.
pub struct Link<R: ?Sized> {
    relay: Arc<R>,
    retry: RetryPolicy,
    token: CancellationToken,
    generation: Arc<AtomicU64>,
    reconnecting: Arc<Mutex<()>>,
    closed: Arc<AtomicBool>,
}

impl<R: ?Sized> Clone for Link<R> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            retry: self.retry.clone(),
            token: self.token.clone(),
            generation: self.generation.clone(),
            reconnecting: self.reconnecting.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<R: Relay + ?Sized> Link<R> {
    pub fn new(relay: Arc<R>, retry: RetryPolicy, token: CancellationToken) -> Self {
        Self {
            relay,
            retry,
            token,
            generation: Arc::new(AtomicU64::new(0)),
            reconnecting: Arc::new(Mutex::new(())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub async fn connect(&self) -> Result<()> {
        self.relay.connect().await
    }

    /// Sends `payload`, reconnecting and resending once if the relay fails.
    ///
    /// Only an exhausted reconnect budget is an error.
    pub async fn send(&self, payload: Vec<u8>) -> Result<Delivery> {
        let seen = self.generation.load(Ordering::SeqCst);

        match self.relay.send(payload.clone()).await {
            Ok(()) => return Ok(Delivery::Sent),
            Err(e) if e.is_transport() => warn!("Relay send failed: {}", e),
            Err(e) => return Err(e),
        }

        if !self.recover(seen).await? {
            return Ok(Delivery::Cancelled);
        }

        match self.relay.send(payload).await {
            Ok(()) => Ok(Delivery::Sent),
            Err(e) if e.is_transport() => {
                warn!("Relay send failed after reconnect, dropping message: {}", e);
                Ok(Delivery::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for the next inbound message. `Ok(None)` means shutdown was requested.
    ///
    /// Gives up once receiving failed more often in a row than the retry policy allows.
    pub async fn receive(&self) -> Result<Option<Vec<u8>>> {
        let mut failures = 0;

        loop {
            let seen = self.generation.load(Ordering::SeqCst);

            let received = tokio::select! {
                _ = self.token.cancelled() => return Ok(None),
                received = self.relay.receive() => received,
            };

            let error = match received {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) if e.is_transport() => e,
                Err(e) => return Err(e),
            };

            failures += 1;
            if failures > self.retry.max_attempts {
                return Err(error);
            }

            warn!("Relay receive failed: {}", error);
            if !self.recover(seen).await? {
                return Ok(None);
            }
        }
    }

    /// Closes the relay unless it was closed already.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.relay.close().await
    }

    /// Reconnects unless another task already did since `seen`.
    async fn recover(&self, seen: u64) -> Result<bool> {
        let _guard = self.reconnecting.lock().await;

        if self.generation.load(Ordering::SeqCst) != seen {
            return Ok(true);
        }

        let reconnected = reconnect(self.relay.as_ref(), &self.retry, &self.token).await?;
        if reconnected {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        Ok(reconnected)
    }
}

impl<R: ?Sized> Link<R> {
    /// Fails with a transport error once `token` is cancelled, for callers that must not proceed
    /// after shutdown.
    pub fn ensure_running(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::transport("link is shut down"))
        } else {
            Ok(())
        }
    }
}
