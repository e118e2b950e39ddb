//! Telemetry record model for the baby monitor.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---

/// Awake/asleep state reported by the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepStatus {
    Sleeping,
    Awake,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Body position detected by the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepPosition {
    Supine,
    Prone,
    Side,
    Back,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single telemetry sample as written by the sensing device.
///
/// Numeric fields are optional: a missing or `null` value means the sensor did
/// not report it. A reported `0.0` is a real reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    // ---
    pub timestamp: String,
    #[serde(default)]
    pub status: SleepStatus,
    #[serde(default)]
    pub is_crying: bool,
    #[serde(default)]
    pub baby_temperature: Option<f64>,
    #[serde(default)]
    pub environment_temperature: Option<f64>,
    #[serde(default)]
    pub environment_humidity: Option<f64>,
    #[serde(default)]
    pub sleep_position: SleepPosition,
}

impl SensorRecord {
    // ---
    /// Parse the ISO-8601 timestamp. Offsetless timestamps are read as UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        // ---
        let raw = self.timestamp.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Decode a realtime-database snapshot into records in insertion order.
///
/// The database hands back `null` for an empty path, an object keyed by push
/// id for pushed children, or an array when the keys are sequential integers.
/// Items that fail to decode are skipped.
pub fn records_from_snapshot(snapshot: Value) -> Vec<SensorRecord> {
    // ---
    let items: Vec<(String, Value)> = match snapshot {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item))
            .collect(),
        Value::Object(map) => map.into_iter().collect::<BTreeMap<_, _>>().into_iter().collect(),
        other => {
            tracing::debug!("Snapshot is neither object nor array: {}", other);
            Vec::new()
        }
    };

    items
        .into_iter()
        .filter(|(_, item)| !item.is_null())
        .filter_map(|(key, item)| match serde_json::from_value::<SensorRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Failed to parse record {}: {}", key, e);
                None
            }
        })
        .collect()
}
