// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sensor_link_model::{Error, Result, MAX_HISTORY_COUNT};

use super::{Feed, Measurement, MeasurementSource};

/// Replays a bundled ThingSpeak feed so the device runs without network access.
///
/// Every fetch starts one entry further into the feed and wraps around, so consecutive live
/// readings change like a real sensor would. A fetch never yields more than
/// [`MAX_HISTORY_COUNT`] samples.
pub struct DummySource {
    samples: Vec<Measurement>,
    cursor: AtomicUsize,
}

impl DummySource {
    pub fn new() -> Result<Self> {
        let json_data = std::include_str!("./dummyfeed.json");

        let feed = serde_json::from_str::<Feed>(json_data)?;
        let samples = feed.latest(feed.feeds.len())?;

        if samples.is_empty() {
            return Err(Error::provider("dummy feed is empty"));
        }

        Ok(Self {
            samples,
            cursor: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MeasurementSource for DummySource {
    async fn latest(&self, count: usize) -> Result<Vec<Measurement>> {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .samples
            .iter()
            .cycle()
            .skip(start % self.samples.len())
            .take(count.min(MAX_HISTORY_COUNT as usize))
            .copied()
            .collect())
    }
}

#[tokio::test]
async fn test_dummy_source() {
    let source = DummySource::new().unwrap();

    let first = source.latest(3).await.unwrap();
    let second = source.latest(3).await.unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first[0], Measurement::new(24.6, 58.2));
    assert_eq!(second[0], first[1]);
    assert_eq!(source.latest(100).await.unwrap().len(), 100);
}

#[tokio::test]
async fn test_dummy_source_is_bounded() {
    let source = DummySource::new().unwrap();

    let samples = source.latest(usize::MAX).await.unwrap();
    assert_eq!(samples.len(), MAX_HISTORY_COUNT as usize);
}
