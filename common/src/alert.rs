// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Dew point and threshold alerts with hysteresis.

use log::{info, warn};
use sensor_link_model::{AlertLevel, Metric, Reading, Thresholds};
use serde::{Deserialize, Serialize};

/// Dew point in °C from temperature `t` in °C and relative humidity `h` in % (Magnus formula).
///
/// Returns `None` when the humidity is not positive, as the formula is undefined there.
pub fn dew_point(t: f64, h: f64) -> Option<f64> {
    if !(h > 0.0) {
        return None;
    }

    let alpha = (17.27 * t) / (237.7 + t) + (h / 100.0).ln();
    Some((237.7 * alpha) / (17.27 - alpha))
}

/// Alert state of one metric.
///
/// `armed` is the hysteresis latch: an event fires only when an excursion out of the normal band
/// starts, and the latch re-arms once the value is back below the minor band.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertState {
    pub level: AlertLevel,
    pub armed: bool,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            level: AlertLevel::Normal,
            armed: true,
        }
    }
}

/// An alert raised for a metric.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct AlertEvent {
    pub metric: Metric,
    pub level: AlertLevel,
    pub value: f64,
}

impl AlertState {
    /// Moves the state for a new `value`, returning the level to alert on, if any.
    pub fn update(&mut self, thresholds: &Thresholds, value: f64) -> Option<AlertLevel> {
        self.level = thresholds.level(value);

        match self.level {
            AlertLevel::Normal => {
                self.armed = true;
                None
            }
            level if self.armed => {
                self.armed = false;
                Some(level)
            }
            _ => None,
        }
    }
}

/// Result of one evaluation pass.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct AlertReport {
    /// 0 until a reading with a usable humidity arrived.
    pub dew_point: f64,
    pub temperature: AlertState,
    pub humidity: AlertState,
    pub dew_point_state: AlertState,
    /// Events raised by this pass.
    pub events: Vec<AlertEvent>,
}

/// Evaluates the three metric alerts against the latest reading.
#[derive(Clone, Debug)]
pub struct AlertEvaluator {
    temperature_thresholds: Thresholds,
    humidity_thresholds: Thresholds,
    dew_point_thresholds: Thresholds,
    temperature: AlertState,
    humidity: AlertState,
    dew_point: AlertState,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(Thresholds::TEMPERATURE, Thresholds::HUMIDITY, Thresholds::DEW_POINT)
    }
}

impl AlertEvaluator {
    pub fn new(temperature: Thresholds, humidity: Thresholds, dew_point: Thresholds) -> Self {
        Self {
            temperature_thresholds: temperature,
            humidity_thresholds: humidity,
            dew_point_thresholds: dew_point,
            temperature: AlertState::default(),
            humidity: AlertState::default(),
            dew_point: AlertState::default(),
        }
    }

    /// Runs one evaluation pass. With no reading yet the states stay untouched.
    pub fn evaluate(&mut self, latest: Option<&Reading>) -> AlertReport {
        let mut events = Vec::new();
        let mut current_dew_point = 0.0;

        if let Some(reading) = latest {
            Self::check(
                Metric::Temperature,
                &mut self.temperature,
                &self.temperature_thresholds,
                reading.temperature,
                &mut events,
            );
            Self::check(
                Metric::Humidity,
                &mut self.humidity,
                &self.humidity_thresholds,
                reading.humidity,
                &mut events,
            );

            match dew_point(reading.temperature, reading.humidity) {
                Some(value) => {
                    current_dew_point = value;
                    Self::check(
                        Metric::DewPoint,
                        &mut self.dew_point,
                        &self.dew_point_thresholds,
                        value,
                        &mut events,
                    );
                }
                None => warn!("No dew point for humidity {}%", reading.humidity),
            }
        }

        AlertReport {
            dew_point: current_dew_point,
            temperature: self.temperature,
            humidity: self.humidity,
            dew_point_state: self.dew_point,
            events,
        }
    }

    fn check(
        metric: Metric,
        state: &mut AlertState,
        thresholds: &Thresholds,
        value: f64,
        events: &mut Vec<AlertEvent>,
    ) {
        if let Some(level) = state.update(thresholds, value) {
            info!("{:?} {} alert triggered at {:.2}", level, metric, value);
            events.push(AlertEvent { metric, level, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_dew_point() {
        let value = dew_point(25.0, 60.0).unwrap();
        assert!((value - 16.7).abs() < 0.1, "dew point was {value}");

        assert!(dew_point(25.0, 0.0).is_none());
        assert!((dew_point(10.0, 100.0).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_one_event_per_excursion() {
        let mut state = AlertState::default();
        let events = [20.0, 26.0, 26.0, 20.0, 26.0]
            .into_iter()
            .map(|value| state.update(&Thresholds::TEMPERATURE, value))
            .collect::<Vec<_>>();

        assert_eq!(
            events,
            vec![None, Some(AlertLevel::Minor), None, None, Some(AlertLevel::Minor)]
        );
    }

    #[test]
    fn test_escalation_stays_quiet() {
        let mut state = AlertState::default();

        assert_eq!(state.update(&Thresholds::HUMIDITY, 65.0), Some(AlertLevel::Minor));
        assert_eq!(state.update(&Thresholds::HUMIDITY, 75.0), None);
        assert_eq!(state.level, AlertLevel::Major);
        assert!(!state.armed);

        assert_eq!(state.update(&Thresholds::HUMIDITY, 50.0), None);
        assert!(state.armed);
        assert_eq!(state.update(&Thresholds::HUMIDITY, 75.0), Some(AlertLevel::Major));
    }

    #[test]
    fn test_evaluator_without_data() {
        let mut evaluator = AlertEvaluator::default();
        let report = evaluator.evaluate(None);

        assert_eq!(report.dew_point, 0.0);
        assert!(report.events.is_empty());
        assert_eq!(report.temperature, AlertState::default());
    }

    #[test]
    fn test_evaluator_raises_all_three() {
        let mut evaluator = AlertEvaluator::default();
        let hot_and_humid = Reading::new(Utc::now(), 28.0, 75.0);

        let report = evaluator.evaluate(Some(&hot_and_humid));
        let metrics = report.events.iter().map(|e| e.metric).collect::<Vec<_>>();
        assert_eq!(metrics, vec![Metric::Temperature, Metric::Humidity, Metric::DewPoint]);
        assert!(report.events.iter().all(|e| e.level == AlertLevel::Major));
        assert_eq!(report.dew_point_state.level, AlertLevel::Major);

        let again = evaluator.evaluate(Some(&hot_and_humid));
        assert!(again.events.is_empty());
    }
}
