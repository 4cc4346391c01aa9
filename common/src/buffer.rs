// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Console-side store of received readings, kept sorted by timestamp.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::debug;
use sensor_link_model::Reading;

/// Time-ordered, duplicate-free readings.
///
/// Only readings that extend the known time range at either end are merged. Readings falling
/// inside `[first, last]` are dropped, even when they would fill a real gap: retried sends and
/// overlapping history replies cannot flood the buffer, at the price of losing in-range backfill.
///
/// Merging and re-sorting happen under one write lock, so readers never see an unsorted buffer.
#[derive(Debug, Default)]
pub struct TelemetryBuffer {
    readings: RwLock<Vec<Reading>>,
    capacity: Option<usize>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that evicts its oldest readings once it holds more than `capacity`.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            readings: RwLock::new(Vec::with_capacity(capacity.min(1024))),
            capacity: Some(capacity.max(2)),
        }
    }

    /// Merges one inbound reading. Returns whether it was kept.
    pub fn merge(&self, reading: Reading) -> bool {
        let mut readings = self.readings.write().unwrap_or_else(PoisonError::into_inner);

        let accept = match (readings.first(), readings.last()) {
            (Some(first), Some(last)) if readings.len() >= 2 => {
                reading.timestamp < first.timestamp || reading.timestamp > last.timestamp
            }
            _ => readings.iter().all(|r| r.timestamp != reading.timestamp),
        };

        if !accept {
            debug!("Dropped reading at {} inside the known range", reading.timestamp);
            return false;
        }

        readings.push(reading);
        readings.sort_by_key(|r| r.timestamp);

        if let Some(capacity) = self.capacity {
            if readings.len() > capacity {
                let excess = readings.len() - capacity;
                readings.drain(..excess);
            }
        }

        true
    }

    /// A copy of all readings, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The reading with the latest timestamp.
    pub fn latest(&self) -> Option<Reading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    /// Earliest and latest timestamp held.
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        Some((readings.first()?.timestamp, readings.last()?.timestamp))
    }

    pub fn len(&self) -> usize {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(seconds: i64) -> Reading {
        let t0 = Utc.with_ymd_and_hms(2025, 4, 12, 9, 0, 0).unwrap();
        Reading::new(t0 + Duration::seconds(seconds), 20.0 + seconds as f64 / 10.0, 50.0)
    }

    fn timestamps(buffer: &TelemetryBuffer) -> Vec<DateTime<Utc>> {
        buffer.snapshot().iter().map(|r| r.timestamp).collect()
    }

    fn is_sorted(buffer: &TelemetryBuffer) -> bool {
        timestamps(buffer).windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn test_first_two_readings_are_taken_in_any_order() {
        let buffer = TelemetryBuffer::new();
        assert!(buffer.merge(at(5)));
        assert!(buffer.merge(at(0)));

        assert_eq!(timestamps(&buffer), vec![at(0).timestamp, at(5).timestamp]);
    }

    #[test]
    fn test_in_range_reading_is_dropped() {
        let buffer = TelemetryBuffer::new();
        buffer.merge(at(0));
        buffer.merge(at(5));

        assert!(!buffer.merge(at(2)));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_boundary_reading_merges_once() {
        let once = TelemetryBuffer::new();
        let twice = TelemetryBuffer::new();
        for buffer in [&once, &twice] {
            buffer.merge(at(0));
            buffer.merge(at(5));
        }

        once.merge(at(10));
        twice.merge(at(10));
        twice.merge(at(10));
        assert_eq!(once.snapshot(), twice.snapshot());

        twice.merge(at(-3));
        twice.merge(at(-3));
        assert_eq!(twice.len(), 4);
    }

    #[test]
    fn test_duplicate_while_nearly_empty() {
        let buffer = TelemetryBuffer::new();
        buffer.merge(at(0));

        assert!(!buffer.merge(at(0)));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_stays_sorted() {
        let buffer = TelemetryBuffer::new();
        for seconds in [30, 12, 42, 6, 18, 48, 0, 24, 54, -6, 36] {
            buffer.merge(at(seconds));
            assert!(is_sorted(&buffer));
        }

        assert_eq!(buffer.latest(), Some(at(54)));
        assert_eq!(buffer.range(), Some((at(-6).timestamp, at(54).timestamp)));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let buffer = TelemetryBuffer::with_capacity_limit(3);
        for seconds in 0..5 {
            buffer.merge(at(seconds * 5));
        }

        assert_eq!(
            timestamps(&buffer),
            vec![at(10).timestamp, at(15).timestamp, at(20).timestamp]
        );
    }

    #[test]
    fn test_concurrent_merges() {
        let buffer = Arc::new(TelemetryBuffer::new());

        let writers = (0..4)
            .map(|thread| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let seconds = if thread % 2 == 0 { i * 4 + thread } else { -(i * 4 + thread) };
                        buffer.merge(at(seconds));
                    }
                })
            })
            .collect::<Vec<_>>();

        let reader = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let snapshot = buffer.snapshot();
                    assert!(snapshot.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert!(is_sorted(&buffer));
    }
}
