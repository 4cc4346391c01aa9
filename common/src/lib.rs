// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Shared logic of the sensor link: the device telemetry agent on one side of the relay and the
//! console's ingestion buffer, alerting and history requests on the other.

pub mod agent;
pub mod alert;
pub mod buffer;
pub mod console;
pub mod provider;
pub mod relay;
pub mod requestor;
pub mod retry;
pub mod shutdown;

pub use agent::{AgentConfig, TelemetryAgent};
pub use alert::{dew_point, AlertEvaluator, AlertEvent, AlertReport, AlertState};
pub use buffer::TelemetryBuffer;
pub use console::{Console, ConsoleConfig, ConsoleSnapshot, LogSink, PresentationSink};
pub use requestor::HistoryRequestor;
pub use retry::RetryPolicy;

pub use sensor_link_model as model;

use std::sync::{Arc, Mutex, PoisonError};

/// Convenience helper for passing the last of a value between threads. For example from the
/// console's refresh task to a presentation layer polling for the newest snapshot.
#[derive(Clone)]
pub struct ValueStore<T>(Arc<Mutex<Option<T>>>);

impl<T> Default for ValueStore<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl<T: Clone> ValueStore<T> {
    /// Sets `value` as the last value.
    pub fn set(&self, value: T) {
        let mut data = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = data.insert(value);
    }

    /// Takes the stored value, leaving the store empty until the next [`ValueStore::set`].
    pub fn get(&self) -> Option<T> {
        let mut data = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        data.take()
    }

    /// Returns a copy of the stored value without taking it.
    pub fn peek(&self) -> Option<T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[test]
fn test_value_store_hands_over_latest() {
    let store = ValueStore::default();
    assert_eq!(store.get(), None::<u32>);

    store.set(1);
    store.set(2);
    assert_eq!(store.peek(), Some(2));
    assert_eq!(store.get(), Some(2));
    assert_eq!(store.get(), None);
}
