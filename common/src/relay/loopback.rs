// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sensor_link_model::{Error, Result};
use tokio::sync::{mpsc, Mutex};

use super::Relay;

/// In-process relay: two endpoints wired back to back with channels.
///
/// Used in tests and demos in place of the cloud relay. Failures can be injected to exercise
/// reconnect handling.
pub struct LoopbackRelay {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    failing_sends: AtomicUsize,
    failing_connects: AtomicUsize,
    sent: std::sync::Mutex<Vec<Vec<u8>>>,
}

impl LoopbackRelay {
    /// Creates two connected endpoints, e.g. `(device, console)`.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();

        (Arc::new(Self::new(a_tx, a_rx)), Arc::new(Self::new(b_tx, b_rx)))
    }

    fn new(tx: mpsc::UnboundedSender<Vec<u8>>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx: Mutex::new(rx),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            failing_sends: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(0),
            sent: Default::default(),
        }
    }

    /// Makes the next `count` sends fail with a transport error and drop the connection.
    pub fn fail_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` connects fail.
    pub fn fail_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// How many times `connect` succeeded.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// How many times the connection was actually closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Payloads successfully sent from this endpoint so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Relay for LoopbackRelay {
    async fn connect(&self) -> Result<()> {
        if Self::take_failure(&self.failing_connects) {
            return Err(Error::transport("loopback connect refused"));
        }

        self.connected.store(true, Ordering::SeqCst);
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::transport("loopback not connected"));
        }

        if Self::take_failure(&self.failing_sends) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::transport("loopback send failed"));
        }

        self.tx
            .send(payload.clone())
            .map_err(|_| Error::transport("loopback peer is gone"))?;

        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(payload);
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<u8>> {
        let mut rx = self.rx.lock().await;

        rx.recv()
            .await
            .ok_or_else(|| Error::transport("loopback peer is gone"))
    }

    async fn close(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::reconnect;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_pair_is_duplex() {
        let (device, console) = LoopbackRelay::pair();
        device.connect().await.unwrap();
        console.connect().await.unwrap();

        device.send(b"reading".to_vec()).await.unwrap();
        console.send(b"command".to_vec()).await.unwrap();

        assert_eq!(console.receive().await.unwrap(), b"reading");
        assert_eq!(device.receive().await.unwrap(), b"command");
    }

    #[tokio::test]
    async fn test_close_counts_once() {
        let (device, _console) = LoopbackRelay::pair();
        device.connect().await.unwrap();

        device.close().await.unwrap();
        device.close().await.unwrap();

        assert_eq!(device.close_count(), 1);
        assert!(device.send(Vec::new()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_survives_refusals() {
        let (device, _console) = LoopbackRelay::pair();
        device.fail_connects(2);

        let policy = RetryPolicy::default()
            .with_delay(Duration::from_millis(10))
            .with_jitter(false);
        let token = CancellationToken::new();

        assert!(reconnect(device.as_ref(), &policy, &token).await.unwrap());
        assert_eq!(device.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_gives_up() {
        let (device, _console) = LoopbackRelay::pair();
        device.fail_connects(10);

        let policy = RetryPolicy::default().with_attempts(3).with_jitter(false);
        let token = CancellationToken::new();

        let result = reconnect(device.as_ref(), &policy, &token).await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }
}
