// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::Rng;
use sensor_link_model::{Error, Reading, Result};

use super::MeasurementSource;

/// Turns raw upstream samples into timestamped [`Reading`]s.
///
/// The i-th sample (most recent first) is stamped `now - 6 s * i`, so a batch always carries
/// evenly spaced, strictly decreasing timestamps whatever the upstream clock did. Each value gets
/// a small random perturbation so repeated samples of a stale upstream never look bit-identical.
pub struct ReadingProvider<S> {
    source: S,
    spacing: Duration,
    jitter: f64,
}

impl<S: MeasurementSource> ReadingProvider<S> {
    pub const SPACING_SECS: i64 = 6;
    pub const JITTER: f64 = 0.01;

    pub fn new(source: S) -> Self {
        Self {
            source,
            spacing: Duration::seconds(Self::SPACING_SECS),
            jitter: Self::JITTER,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches the `count` most recent readings, most recent first.
    pub async fn fetch(&self, count: usize) -> Result<Vec<Reading>> {
        self.fetch_at(Utc::now(), count).await
    }

    /// Like [`ReadingProvider::fetch`] with an explicit "now".
    pub async fn fetch_at(&self, now: DateTime<Utc>, count: usize) -> Result<Vec<Reading>> {
        let samples = self.source.latest(count).await?;

        if samples.len() < count {
            return Err(Error::provider(format!(
                "asked for {} samples, upstream returned {}",
                count,
                samples.len()
            )));
        }

        let mut rng = rand::thread_rng();
        let readings = samples
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(i, sample)| {
                Reading::new(
                    now - self.spacing * i as i32,
                    sample.temperature + rng.gen_range(-self.jitter..=self.jitter),
                    sample.humidity + rng.gen_range(-self.jitter..=self.jitter),
                )
            })
            .collect::<Vec<_>>();

        debug!("Fetched {} readings", readings.len());
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Measurement, StaticSource};

    fn provider() -> ReadingProvider<StaticSource> {
        ReadingProvider::new(StaticSource::new(vec![
            Measurement::new(21.0, 40.0),
            Measurement::new(22.0, 41.0),
            Measurement::new(23.0, 42.0),
        ]))
    }

    #[tokio::test]
    async fn test_timestamps_step_back_six_seconds() {
        let now = Utc::now();
        let readings = provider().fetch_at(now, 3).await.unwrap();

        assert_eq!(readings.len(), 3);
        for (i, reading) in readings.iter().enumerate() {
            assert_eq!(reading.timestamp, now - Duration::seconds(6 * i as i64));
        }
    }

    #[tokio::test]
    async fn test_jitter_is_bounded() {
        let readings = provider().fetch(3).await.unwrap();

        for (reading, expected) in readings.iter().zip([21.0, 22.0, 23.0]) {
            assert!((reading.temperature - expected).abs() <= 0.01 + f64::EPSILON);
            assert!((reading.humidity - (expected + 19.0)).abs() <= 0.01 + f64::EPSILON);
        }
    }

    #[tokio::test]
    async fn test_short_upstream_is_unavailable() {
        let result = provider().fetch(4).await;
        assert!(matches!(result, Err(Error::ProviderUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let provider = provider();
        provider.source().fail_next(1);

        assert!(matches!(provider.fetch(1).await, Err(Error::ProviderUnavailable { .. })));
        assert!(provider.fetch(1).await.is_ok());
    }
}
