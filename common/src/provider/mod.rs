// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Where the device gets its readings from.

mod dummysource;
mod feed;
mod readingprovider;
mod staticsource;

pub use dummysource::DummySource;
pub use feed::{Feed, FeedEntry};
pub use readingprovider::ReadingProvider;
pub use staticsource::StaticSource;

#[cfg(feature = "thingspeak")]
mod thingspeaksource;

#[cfg(feature = "thingspeak")]
pub use thingspeaksource::ThingSpeakSource;

use async_trait::async_trait;
use sensor_link_model::Result;

/// A raw sample from the upstream source, before the device stamps it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
}

impl Measurement {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

/// The upstream measurement source trait.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Fetches up to `count` of the most recent samples, most recent first.
    async fn latest(&self, count: usize) -> Result<Vec<Measurement>>;
}

/// Boxed source, for picking the upstream at runtime.
pub type MeasurementSourcePointer = Box<dyn MeasurementSource>;

#[async_trait]
impl<T: MeasurementSource + ?Sized> MeasurementSource for Box<T> {
    async fn latest(&self, count: usize) -> Result<Vec<Measurement>> {
        (**self).latest(count).await
    }
}
