// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sensor_link_model::{Error, Result};

use super::{Measurement, MeasurementSource};

/// Serves a fixed list of samples, most recent first. Failures can be scripted.
#[derive(Default)]
pub struct StaticSource {
    samples: Vec<Measurement>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new(samples: Vec<Measurement>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    /// Makes the next `count` fetches fail as if the upstream were unreachable.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of fetches so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeasurementSource for StaticSource {
    async fn latest(&self, count: usize) -> Result<Vec<Measurement>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::provider("upstream unreachable"));
        }

        Ok(self.samples.iter().take(count).copied().collect())
    }
}
