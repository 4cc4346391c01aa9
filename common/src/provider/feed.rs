// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use sensor_link_model::{Error, Result};

use super::Measurement;

/// A ThingSpeak channel feed, as returned by `channels/<id>/feeds.json`.
///
/// Entries are ordered oldest first; `field1` holds the temperature and `field2` the humidity,
/// both as strings.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Feed {
    #[serde(default)]
    pub feeds: Vec<FeedEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FeedEntry {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub entry_id: Option<u64>,
    #[serde(default)]
    pub field1: Option<String>,
    #[serde(default)]
    pub field2: Option<String>,
}

impl FeedEntry {
    pub fn measurement(&self) -> Result<Measurement> {
        Ok(Measurement::new(
            parse_field("field1", self.field1.as_deref())?,
            parse_field("field2", self.field2.as_deref())?,
        ))
    }
}

impl Feed {
    /// The newest `count` entries as measurements, most recent first.
    pub fn latest(&self, count: usize) -> Result<Vec<Measurement>> {
        self.feeds
            .iter()
            .rev()
            .take(count)
            .map(FeedEntry::measurement)
            .collect()
    }
}

fn parse_field(name: &str, value: Option<&str>) -> Result<f64> {
    let value = value.ok_or_else(|| Error::provider(format!("feed entry without {name}")))?;

    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| Error::provider(format!("{name} `{value}` is not a number")))
}

#[test]
fn test_feed_is_reversed() {
    let feed: Feed = serde_json::from_str(
        r#"{
            "channel": {"id": 2938875, "field1": "Temperature", "field2": "Humidity"},
            "feeds": [
                {"created_at": "2025-03-01T10:00:00Z", "entry_id": 1, "field1": "20.5", "field2": "40"},
                {"created_at": "2025-03-01T10:00:20Z", "entry_id": 2, "field1": "20.7", "field2": "41"}
            ]
        }"#,
    )
    .unwrap();

    let latest = feed.latest(5).unwrap();
    assert_eq!(latest, vec![Measurement::new(20.7, 41.0), Measurement::new(20.5, 40.0)]);

    let broken = Feed {
        feeds: vec![FeedEntry::default()],
    };
    assert!(broken.latest(1).is_err());
}
