// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use log::debug;
use sensor_link_model::{Error, Result};

use super::{Feed, Measurement, MeasurementSource};

/// Reads the latest samples of a ThingSpeak channel over HTTP.
pub struct ThingSpeakSource {
    client: reqwest::Client,
    base_url: String,
    channel_id: u64,
    read_api_key: Option<String>,
}

impl ThingSpeakSource {
    pub const BASE_URL: &'static str = "https://api.thingspeak.com";

    pub fn new(channel_id: u64, read_api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: Self::BASE_URL.into(),
            channel_id,
            read_api_key,
        }
    }

    /// Points the source at another server, e.g. a self-hosted ThingSpeak.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn feed_url(&self) -> String {
        format!(
            "{}/channels/{}/feeds.json",
            self.base_url.trim_end_matches('/'),
            self.channel_id
        )
    }

    async fn fetch_feed(&self, count: usize) -> reqwest::Result<Feed> {
        let mut query = vec![("results", count.to_string())];
        if let Some(key) = &self.read_api_key {
            query.push(("api_key", key.clone()));
        }

        self.client
            .get(self.feed_url())
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<Feed>()
            .await
    }
}

#[async_trait]
impl MeasurementSource for ThingSpeakSource {
    async fn latest(&self, count: usize) -> Result<Vec<Measurement>> {
        let feed = self
            .fetch_feed(count)
            .await
            .map_err(|e| Error::provider(format!("ThingSpeak channel {}: {}", self.channel_id, e)))?;

        debug!(
            "ThingSpeak channel {} returned {} entries",
            self.channel_id,
            feed.feeds.len()
        );

        feed.latest(count)
    }
}

#[test]
fn test_feed_url() {
    let source = ThingSpeakSource::new(2938875, None).with_base_url("http://localhost:3000/");
    assert_eq!(source.feed_url(), "http://localhost:3000/channels/2938875/feeds.json");
}
