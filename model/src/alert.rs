// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Alert level of a monitored metric.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertLevel {
    #[default]
    Normal,
    Minor,
    Major,
}

impl AlertLevel {
    /// Colour a presentation layer paints the metric in.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Normal => "green",
            Self::Minor => "yellow",
            Self::Major => "red",
        }
    }
}

/// The metrics the console raises alerts for.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Humidity,
    DewPoint,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Humidity => write!(f, "humidity"),
            Self::DewPoint => write!(f, "dew point"),
        }
    }
}

/// Alert bands of a metric: `[minor, major]` is the minor band, anything above `major` is major.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub minor: f64,
    pub major: f64,
}

impl Thresholds {
    /// °C
    pub const TEMPERATURE: Self = Self::new(25.0, 27.0);
    /// %
    pub const HUMIDITY: Self = Self::new(60.0, 70.0);
    /// °C
    pub const DEW_POINT: Self = Self::new(15.0, 18.0);

    pub const fn new(minor: f64, major: f64) -> Self {
        Self { minor, major }
    }

    pub fn level(&self, value: f64) -> AlertLevel {
        if value > self.major {
            AlertLevel::Major
        } else if value >= self.minor {
            AlertLevel::Minor
        } else {
            AlertLevel::Normal
        }
    }
}

#[test]
fn test_band_edges() {
    let thresholds = Thresholds::TEMPERATURE;

    assert_eq!(thresholds.level(24.99), AlertLevel::Normal);
    assert_eq!(thresholds.level(25.0), AlertLevel::Minor);
    assert_eq!(thresholds.level(27.0), AlertLevel::Minor);
    assert_eq!(thresholds.level(27.01), AlertLevel::Major);
    assert_eq!(AlertLevel::Major.color(), "red");
}
