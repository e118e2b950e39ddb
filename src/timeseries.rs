//! Chart series preparation over a lookback window.

use std::{fmt, str::FromStr};

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

use crate::models::SensorRecord;

// ---

/// Hour counts a dashboard user can pick from.
pub const WINDOW_HOURS: [u32; 6] = [1, 6, 12, 24, 48, 168];

/// User-selected lookback used to filter chart data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Hours(u32),
    All,
}

impl TimeWindow {
    /// Long windows carry the date in their labels.
    fn shows_date(&self) -> bool {
        match self {
            TimeWindow::All => true,
            TimeWindow::Hours(h) => *h >= 24,
        }
    }
}

impl FromStr for TimeWindow {
    type Err = anyhow::Error;

    /// Accepts `all`, a bare hour count, `<n>h`, or `<n>d`, restricted to
    /// [`WINDOW_HOURS`].
    fn from_str(s: &str) -> Result<Self> {
        // ---
        let s = s.trim().to_ascii_lowercase();
        if s == "all" {
            return Ok(TimeWindow::All);
        }

        let hours = if let Some(days) = s.strip_suffix('d') {
            days.parse::<u32>().ok().and_then(|d| d.checked_mul(24))
        } else {
            s.strip_suffix('h').unwrap_or(&s).parse::<u32>().ok()
        };

        match hours {
            Some(h) if WINDOW_HOURS.contains(&h) => Ok(TimeWindow::Hours(h)),
            _ => Err(anyhow::anyhow!(
                "unknown time window: {s:?} (expected one of {}, or all)",
                WINDOW_HOURS.map(|h| format!("{h}h")).join(", ")
            )),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Hours(h) => write!(f, "{h}h"),
            TimeWindow::All => f.write_str("all"),
        }
    }
}

impl Serialize for TimeWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Positionally aligned chart data; index `i` of every vector describes the
/// same record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesData {
    pub labels: Vec<String>,
    pub baby_temperatures: Vec<Option<f64>>,
    pub environment_temperatures: Vec<Option<f64>>,
    pub environment_humidities: Vec<Option<f64>>,
}

/// Outcome of preparing a window; empty windows are an explicit variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChartSeries {
    Data(SeriesData),
    NoData,
}

/// Sort, filter to `window`, and shape `records` for charting.
///
/// Records with an unparseable timestamp are left out. Labels are rendered at
/// `display_offset` from UTC.
pub fn prepare_series(
    records: &[SensorRecord],
    window: TimeWindow,
    now: DateTime<Utc>,
    display_offset: FixedOffset,
) -> ChartSeries {
    // ---
    let mut timed: Vec<(DateTime<Utc>, &SensorRecord)> = records
        .iter()
        .filter_map(|r| match r.parsed_timestamp() {
            Some(ts) => Some((ts, r)),
            None => {
                tracing::debug!("Skipping record with bad timestamp: {:?}", r.timestamp);
                None
            }
        })
        .collect();

    // Vec::sort_by_key is stable, equal timestamps keep their input order
    timed.sort_by_key(|(ts, _)| *ts);

    if let TimeWindow::Hours(h) = window {
        let cutoff = now - Duration::hours(i64::from(h));
        timed.retain(|(ts, _)| *ts >= cutoff);
    }

    if timed.is_empty() {
        return ChartSeries::NoData;
    }

    let label_format = if window.shows_date() {
        "%d/%m %H:%M"
    } else {
        "%H:%M:%S"
    };

    let mut data = SeriesData {
        labels: Vec::with_capacity(timed.len()),
        baby_temperatures: Vec::with_capacity(timed.len()),
        environment_temperatures: Vec::with_capacity(timed.len()),
        environment_humidities: Vec::with_capacity(timed.len()),
    };
    for (ts, record) in timed {
        data.labels
            .push(ts.with_timezone(&display_offset).format(label_format).to_string());
        data.baby_temperatures.push(record.baby_temperature);
        data.environment_temperatures
            .push(record.environment_temperature);
        data.environment_humidities.push(record.environment_humidity);
    }

    ChartSeries::Data(data)
}
