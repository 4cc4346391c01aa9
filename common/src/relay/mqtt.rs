// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use sensor_link_model::{Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Relay;

/// Which end of the link this endpoint is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Device,
    Console,
}

#[derive(Clone, Debug)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub device_id: String,
    pub role: Role,
    pub keep_alive: Duration,
}

impl MqttSettings {
    pub fn new(host: impl Into<String>, port: u16, device_id: impl Into<String>, role: Role) -> Self {
        Self {
            host: host.into(),
            port,
            device_id: device_id.into(),
            role,
            keep_alive: Duration::from_secs(30),
        }
    }

    fn telemetry_topic(&self) -> String {
        format!("devices/{}/messages/events", self.device_id)
    }

    fn command_topic(&self) -> String {
        format!("devices/{}/messages/commands", self.device_id)
    }

    fn outbound_topic(&self) -> String {
        match self.role {
            Role::Device => self.telemetry_topic(),
            Role::Console => self.command_topic(),
        }
    }

    fn inbound_topic(&self) -> String {
        match self.role {
            Role::Device => self.command_topic(),
            Role::Console => self.telemetry_topic(),
        }
    }

    fn client_id(&self) -> String {
        match self.role {
            Role::Device => format!("{}-device", self.device_id),
            Role::Console => format!("{}-console", self.device_id),
        }
    }
}

type Inbound = std::result::Result<Vec<u8>, String>;

/// Relay endpoint over an MQTT broker.
///
/// A background task drives the `rumqttc` event loop and forwards publishes on the inbound topic.
/// When the event loop fails the task reports the error through `receive` and stops; the next
/// `connect` starts over with a fresh client.
pub struct MqttRelay {
    settings: MqttSettings,
    client: Mutex<Option<AsyncClient>>,
    poller: Mutex<Option<CancellationToken>>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    closed: AtomicBool,
}

impl MqttRelay {
    pub fn new(settings: MqttSettings) -> Self {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();

        Self {
            settings,
            client: Mutex::new(None),
            poller: Mutex::new(None),
            inbox_tx,
            inbox: tokio::sync::Mutex::new(inbox),
            closed: AtomicBool::new(false),
        }
    }

    fn current_client(&self) -> Option<AsyncClient> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stop_poller(&self) {
        if let Some(token) = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(Error::transport(e.to_string())),
            }
        }
    }

    async fn poll(
        mut eventloop: EventLoop,
        topic: String,
        inbox: mpsc::UnboundedSender<Inbound>,
        token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic => {
                    debug!("Received {} bytes on {}", publish.payload.len(), topic);
                    if inbox.send(Ok(publish.payload.to_vec())).is_err() {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    let _ = inbox.send(Err("broker closed the connection".into()));
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT event loop failed: {}", e);
                    let _ = inbox.send(Err(e.to_string()));
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Relay for MqttRelay {
    async fn connect(&self) -> Result<()> {
        self.stop_poller();

        let mut options = MqttOptions::new(
            self.settings.client_id(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(self.settings.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(options, 20);
        Self::wait_for_connack(&mut eventloop).await?;

        let inbound = self.settings.inbound_topic();
        client
            .subscribe(inbound.clone(), QoS::AtLeastOnce)
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        info!(
            "Connected to MQTT broker {}:{}, listening on {}",
            self.settings.host, self.settings.port, inbound
        );

        let token = CancellationToken::new();
        tokio::spawn(Self::poll(
            eventloop,
            inbound,
            self.inbox_tx.clone(),
            token.clone(),
        ));

        *self.poller.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        *self.client.lock().unwrap_or_else(PoisonError::into_inner) = Some(client);
        self.closed.store(false, Ordering::SeqCst);

        Ok(())
    }

    async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let client = self
            .current_client()
            .ok_or_else(|| Error::transport("not connected to the MQTT broker"))?;

        client
            .publish(self.settings.outbound_topic(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| Error::transport(e.to_string()))
    }

    async fn receive(&self) -> Result<Vec<u8>> {
        let mut inbox = self.inbox.lock().await;

        match inbox.recv().await {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(reason)) => Err(Error::Transport { reason }),
            None => Err(Error::transport("MQTT inbox closed")),
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let result = match client {
            Some(client) => client
                .disconnect()
                .await
                .map_err(|e| Error::transport(e.to_string())),
            None => Ok(()),
        };

        self.stop_poller();
        info!("Disconnected from MQTT broker");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_mirror_each_other() {
        let device = MqttSettings::new("localhost", 1883, "sensor-1", Role::Device);
        let console = MqttSettings::new("localhost", 1883, "sensor-1", Role::Console);

        assert_eq!(device.outbound_topic(), console.inbound_topic());
        assert_eq!(console.outbound_topic(), device.inbound_topic());
        assert_eq!(device.outbound_topic(), "devices/sensor-1/messages/events");
        assert_ne!(device.client_id(), console.client_id());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let relay = MqttRelay::new(MqttSettings::new("localhost", 1883, "sensor-1", Role::Console));

        assert!(matches!(relay.send(b"{}".to_vec()).await, Err(Error::Transport { .. })));
        assert!(relay.close().await.is_ok());
    }
}
