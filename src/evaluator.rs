//! Telemetry evaluation: per-metric badges and the prioritized alert banner.
//!
//! Every rule here is a pure function over one [`SensorRecord`]. The HTTP
//! layer and the live-update task only ever call [`evaluate`] and
//! [`select_active_alerts`]; nothing in this module touches shared state.

use serde::Serialize;

use crate::models::{SensorRecord, SleepPosition, SleepStatus};

// ---

/// Message shown while the crying detector is active.
pub const CRYING_MESSAGE: &str = "Baby is crying!";

/// Joins messages that share the winning priority.
pub const ALERT_SEPARATOR: &str = " | ";

/// Display placeholder for a metric the sensor did not report.
pub const ABSENT_TEXT: &str = "--";

/// Display tier for a badge or alert banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Danger,
    Warning,
    Success,
    Neutral,
}

/// Alarm levels used by the evaluator.
///
/// Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
    // ---
    pub baby_temp_danger: f64,
    pub baby_temp_warning: f64,
    pub room_temp_min: f64,
    pub room_temp_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
}

impl ThresholdConfig {
    pub const DEFAULT: ThresholdConfig = ThresholdConfig {
        baby_temp_danger: 37.5,
        baby_temp_warning: 37.0,
        room_temp_min: 19.0,
        room_temp_max: 24.0,
        humidity_min: 40.0,
        humidity_max: 60.0,
    };
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One true alarm condition found while evaluating a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCandidate {
    pub message: String,
    pub severity: Severity,
    /// Lower is more urgent.
    pub priority: u8,
}

/// The banner to surface for a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlert {
    pub severity: Severity,
    pub message: String,
}

/// Display classification of a single metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Badge {
    pub label: String,
    pub severity: Severity,
}

impl Badge {
    fn new(label: impl Into<String>, severity: Severity) -> Self {
        Self {
            label: label.into(),
            severity,
        }
    }
}

/// Badges for every metric of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Badges {
    pub status: Badge,
    pub crying: Badge,
    pub baby_temperature: Badge,
    pub environment_temperature: Badge,
    pub environment_humidity: Badge,
    pub sleep_position: Badge,
}

impl Badges {
    /// Badges shown before any record has arrived.
    pub fn unknown() -> Self {
        // ---
        let neutral = || Badge::new(ABSENT_TEXT, Severity::Neutral);
        Self {
            status: neutral(),
            crying: neutral(),
            baby_temperature: neutral(),
            environment_temperature: neutral(),
            environment_humidity: neutral(),
            sleep_position: neutral(),
        }
    }
}

/// Result of evaluating one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub badges: Badges,
    /// In evaluation order: crying, baby temperature, room temperature, humidity.
    pub candidates: Vec<AlertCandidate>,
}

impl Evaluation {
    pub fn active_alert(&self) -> Option<ActiveAlert> {
        select_active_alerts(&self.candidates)
    }
}

// ---

/// Evaluate every metric of `record` against `thresholds`.
pub fn evaluate(record: &SensorRecord, thresholds: &ThresholdConfig) -> Evaluation {
    // ---
    let mut candidates = Vec::new();

    let (crying, alert) = classify_crying(record.is_crying);
    candidates.extend(alert);

    let (baby_temperature, alert) = classify_baby_temperature(record.baby_temperature, thresholds);
    candidates.extend(alert);

    let (environment_temperature, alert) =
        classify_room_temperature(record.environment_temperature, thresholds);
    candidates.extend(alert);

    let (environment_humidity, alert) =
        classify_humidity(record.environment_humidity, thresholds);
    candidates.extend(alert);

    Evaluation {
        badges: Badges {
            status: classify_status(record.status),
            crying,
            baby_temperature,
            environment_temperature,
            environment_humidity,
            sleep_position: classify_sleep_position(record.sleep_position),
        },
        candidates,
    }
}

/// Reduce the candidates to the banner for the most urgent priority tier.
///
/// Candidates sharing the lowest priority are joined with
/// [`ALERT_SEPARATOR`] in input order; every less urgent candidate is
/// suppressed. Returns `None` when nothing is alarming.
pub fn select_active_alerts(candidates: &[AlertCandidate]) -> Option<ActiveAlert> {
    // ---
    let mut sorted: Vec<&AlertCandidate> = candidates.iter().collect();
    sorted.sort_by_key(|c| c.priority);

    let top = sorted.first()?;
    let selected: Vec<&str> = sorted
        .iter()
        .take_while(|c| c.priority == top.priority)
        .map(|c| c.message.as_str())
        .collect();

    Some(ActiveAlert {
        severity: top.severity,
        message: selected.join(ALERT_SEPARATOR),
    })
}

/// Format a reading for display; `0.0` is a reading, not an absence.
pub fn display_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => ABSENT_TEXT.to_string(),
    }
}

// ---

fn classify_status(status: SleepStatus) -> Badge {
    let label = match status {
        SleepStatus::Sleeping => "Sleeping",
        SleepStatus::Awake => "Awake",
        SleepStatus::Unknown => "Unknown",
    };
    Badge::new(label, Severity::Neutral)
}

fn classify_crying(is_crying: bool) -> (Badge, Option<AlertCandidate>) {
    // ---
    if is_crying {
        let alert = AlertCandidate {
            message: CRYING_MESSAGE.to_string(),
            severity: Severity::Danger,
            priority: 1,
        };
        (Badge::new("Crying", Severity::Danger), Some(alert))
    } else {
        (Badge::new("Calm", Severity::Success), None)
    }
}

fn classify_baby_temperature(
    value: Option<f64>,
    thresholds: &ThresholdConfig,
) -> (Badge, Option<AlertCandidate>) {
    // ---
    let Some(t) = value else {
        return (Badge::new(ABSENT_TEXT, Severity::Neutral), None);
    };
    let label = display_value(Some(t), "°C");

    if t > thresholds.baby_temp_danger {
        let alert = AlertCandidate {
            message: format!("Baby temperature is high: {t:.1} °C"),
            severity: Severity::Danger,
            priority: 2,
        };
        (Badge::new(label, Severity::Danger), Some(alert))
    } else if t > thresholds.baby_temp_warning {
        let alert = AlertCandidate {
            message: format!("Baby temperature is elevated: {t:.1} °C"),
            severity: Severity::Warning,
            priority: 3,
        };
        (Badge::new(label, Severity::Warning), Some(alert))
    } else {
        (Badge::new(label, Severity::Success), None)
    }
}

fn classify_room_temperature(
    value: Option<f64>,
    thresholds: &ThresholdConfig,
) -> (Badge, Option<AlertCandidate>) {
    // ---
    let Some(t) = value else {
        return (Badge::new(ABSENT_TEXT, Severity::Neutral), None);
    };
    let label = display_value(Some(t), "°C");

    let message = if t < thresholds.room_temp_min {
        format!("Room is too cold: {t:.1} °C")
    } else if t > thresholds.room_temp_max {
        format!("Room is too warm: {t:.1} °C")
    } else {
        return (Badge::new(label, Severity::Success), None);
    };

    let alert = AlertCandidate {
        message,
        severity: Severity::Warning,
        priority: 4,
    };
    (Badge::new(label, Severity::Warning), Some(alert))
}

fn classify_humidity(
    value: Option<f64>,
    thresholds: &ThresholdConfig,
) -> (Badge, Option<AlertCandidate>) {
    // ---
    let Some(h) = value else {
        return (Badge::new(ABSENT_TEXT, Severity::Neutral), None);
    };
    let label = display_value(Some(h), "%");

    let message = if h < thresholds.humidity_min {
        format!("Room air is too dry: {h:.1} %")
    } else if h > thresholds.humidity_max {
        format!("Room air is too humid: {h:.1} %")
    } else {
        return (Badge::new(label, Severity::Success), None);
    };

    let alert = AlertCandidate {
        message,
        severity: Severity::Warning,
        priority: 5,
    };
    (Badge::new(label, Severity::Warning), Some(alert))
}

/// Position badge only; a prone baby is flagged but raises no banner.
fn classify_sleep_position(position: SleepPosition) -> Badge {
    match position {
        SleepPosition::Supine => Badge::new("Face up", Severity::Success),
        SleepPosition::Back => Badge::new("On back", Severity::Success),
        SleepPosition::Side => Badge::new("On side", Severity::Warning),
        SleepPosition::Prone => Badge::new("Face down", Severity::Danger),
        SleepPosition::Unknown => Badge::new("Unknown", Severity::Neutral),
    }
}
