// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Reading};

/// Telemetry payload as it travels over the relay.
///
/// Values are numbers in memory but strings on the wire, e.g.
/// `{"time": "2025-03-01T10:00:00.000000Z", "temperature": "21.5", "humidity": "40.1"}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TelemetryMessage {
    pub time: String,
    pub temperature: String,
    pub humidity: String,
}

impl From<&Reading> for TelemetryMessage {
    fn from(reading: &Reading) -> Self {
        Self {
            time: reading
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            temperature: reading.temperature.to_string(),
            humidity: reading.humidity.to_string(),
        }
    }
}

impl TryFrom<TelemetryMessage> for Reading {
    type Error = Error;

    fn try_from(message: TelemetryMessage) -> Result<Self, Self::Error> {
        let timestamp = parse_time(&message.time).ok_or_else(|| Error::MalformedTelemetry {
            reason: format!("unrecognised time `{}`", message.time),
        })?;

        Ok(Reading {
            timestamp,
            temperature: parse_value("temperature", &message.temperature)?,
            humidity: parse_value("humidity", &message.humidity)?,
        })
    }
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form older devices send.
/// Naive times are taken as UTC.
fn parse_time(time: &str) -> Option<DateTime<Utc>> {
    let time = time.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(time) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_value(field: &str, value: &str) -> Result<f64, Error> {
    match value.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(Error::MalformedTelemetry {
            reason: format!("{field} `{value}` is not a number"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_values_travel_as_strings() {
        let reading = Reading::new(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(), 21.5, 40.25);
        let payload = reading.to_payload().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(json["temperature"], "21.5");
        assert_eq!(json["humidity"], "40.25");
        assert_eq!(json["time"], "2025-03-01T10:00:00.000000Z");
        assert_eq!(Reading::from_payload(&payload).unwrap(), reading);
    }

    #[test]
    fn test_accepts_naive_device_time() {
        let payload =
            br#"{"time": "2025-03-01 10:00:05.250000", "temperature": "19.0", "humidity": "55"}"#;
        let reading = Reading::from_payload(payload).unwrap();

        assert_eq!(
            reading.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 5).unwrap() + chrono::Duration::milliseconds(250)
        );
        assert_eq!(reading.humidity, 55.0);
    }

    #[test]
    fn test_rejects_garbage() {
        let bad_number = br#"{"time": "2025-03-01T10:00:00Z", "temperature": "warm", "humidity": "55"}"#;
        assert!(matches!(
            Reading::from_payload(bad_number),
            Err(Error::MalformedTelemetry { .. })
        ));

        let bad_time = br#"{"time": "yesterday", "temperature": "1", "humidity": "55"}"#;
        assert!(matches!(
            Reading::from_payload(bad_time),
            Err(Error::MalformedTelemetry { .. })
        ));

        assert!(matches!(
            Reading::from_payload(b"{\"history\": [1, 2, 3]}"),
            Err(Error::MalformedTelemetry { .. })
        ));
    }
}
