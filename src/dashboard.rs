//! Presentation controller for the dashboard.
//!
//! Owns everything the browser view used to keep in globals: the latest
//! telemetry collection, the selected chart window, and the chart handles for
//! each render target. All mutation happens through the three event entry
//! points ([`DashboardController::apply_snapshot`],
//! [`DashboardController::select_window`], [`DashboardController::clear`]).

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::json;

use crate::chart::{ChartConfig, ChartError, ChartHandle, ChartKind, ChartRegistry, Dataset};
use crate::evaluator::{evaluate, ActiveAlert, Badges, Evaluation, ThresholdConfig};
use crate::models::SensorRecord;
use crate::timeseries::{prepare_series, ChartSeries, SeriesData, TimeWindow};

// ---

pub const TEMPERATURE_CHART: &str = "temperature";
pub const HUMIDITY_CHART: &str = "humidity";

/// Placeholder text for a chart target whose window holds no records.
pub const NO_DATA_MESSAGE: &str = "No data for the selected period.";

/// Snapshot of the status panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStatus {
    pub latest: Option<SensorRecord>,
    pub badges: Badges,
    pub alert: Option<ActiveAlert>,
    /// Passive warning after a failed telemetry read.
    pub warning: Option<String>,
    pub record_count: usize,
    pub window: TimeWindow,
}

/// What a chart target currently shows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChartView {
    Chart { chart: ChartConfig },
    Placeholder { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartsView {
    pub window: TimeWindow,
    pub targets: BTreeMap<String, ChartView>,
}

#[derive(Debug)]
pub struct DashboardController {
    thresholds: ThresholdConfig,
    display_offset: FixedOffset,
    window: TimeWindow,
    records: Vec<SensorRecord>,
    evaluation: Option<Evaluation>,
    alert: Option<ActiveAlert>,
    warning: Option<String>,
    renderer: ChartRegistry,
    handles: BTreeMap<&'static str, ChartHandle>,
}

impl DashboardController {
    pub fn new(thresholds: ThresholdConfig, window: TimeWindow, display_offset: FixedOffset) -> Self {
        Self {
            thresholds,
            display_offset,
            window,
            records: Vec::new(),
            evaluation: None,
            alert: None,
            warning: None,
            renderer: ChartRegistry::new(),
            handles: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn records(&self) -> &[SensorRecord] {
        &self.records
    }

    pub fn display_offset(&self) -> FixedOffset {
        self.display_offset
    }

    /// New telemetry arrived: evaluate the latest record and redraw charts.
    pub fn apply_snapshot(
        &mut self,
        records: Vec<SensorRecord>,
        now: DateTime<Utc>,
    ) -> Result<(), ChartError> {
        // ---
        self.records = records;
        self.warning = None;
        self.evaluation = self
            .records
            .last()
            .map(|latest| evaluate(latest, &self.thresholds));

        let alert = self.evaluation.as_ref().and_then(Evaluation::active_alert);
        self.set_alert(alert);
        self.render_charts(now)
    }

    /// The user picked a different chart window.
    pub fn select_window(&mut self, window: TimeWindow, now: DateTime<Utc>) -> Result<(), ChartError> {
        if window != self.window {
            tracing::info!(from = %self.window, to = %window, "Chart window changed");
        }
        self.window = window;
        self.render_charts(now)
    }

    /// Keep the last good data on screen and show a passive warning.
    pub fn record_fetch_failure(&mut self, message: String) {
        tracing::warn!(error = %message, "Telemetry unavailable, showing last known data");
        self.warning = Some(message);
    }

    /// Signed out: drop the data and release every chart.
    pub fn clear(&mut self) -> Result<(), ChartError> {
        // ---
        self.records.clear();
        self.evaluation = None;
        self.warning = None;
        self.set_alert(None);
        self.destroy_charts()
    }

    pub fn status(&self) -> DashboardStatus {
        DashboardStatus {
            latest: self.records.last().cloned(),
            badges: self
                .evaluation
                .as_ref()
                .map(|e| e.badges.clone())
                .unwrap_or_else(Badges::unknown),
            alert: self.alert.clone(),
            warning: self.warning.clone(),
            record_count: self.records.len(),
            window: self.window,
        }
    }

    pub fn charts(&self) -> ChartsView {
        // ---
        let targets = [TEMPERATURE_CHART, HUMIDITY_CHART]
            .into_iter()
            .map(|target| {
                let view = match self.renderer.get(target) {
                    Some(chart) => ChartView::Chart {
                        chart: chart.clone(),
                    },
                    None => ChartView::Placeholder {
                        message: NO_DATA_MESSAGE.to_string(),
                    },
                };
                (target.to_string(), view)
            })
            .collect();

        ChartsView {
            window: self.window,
            targets,
        }
    }

    // ---

    fn set_alert(&mut self, alert: Option<ActiveAlert>) {
        // ---
        if alert == self.alert {
            return;
        }
        match &alert {
            Some(a) => tracing::warn!(severity = ?a.severity, message = %a.message, "Alert raised"),
            None => tracing::info!("Alert cleared"),
        }
        self.alert = alert;
    }

    /// A handle is forgotten only once its chart is gone. If the registry
    /// disagrees with a handle, every target is released so the next render
    /// starts clean.
    fn destroy_charts(&mut self) -> Result<(), ChartError> {
        // ---
        while let Some((&target, handle)) = self.handles.first_key_value() {
            if let Err(e) = self.renderer.destroy(handle) {
                tracing::error!(target_id = target, chart_id = %handle.id(), error = %e,
                    "Chart registry out of sync, releasing all targets");
                self.handles.clear();
                self.renderer.clear();
                return Err(e);
            }
            self.handles.remove(target);
        }
        Ok(())
    }

    /// Old charts are always destroyed before their targets are reused.
    fn render_charts(&mut self, now: DateTime<Utc>) -> Result<(), ChartError> {
        // ---
        self.destroy_charts()?;

        let data = match prepare_series(&self.records, self.window, now, self.display_offset) {
            ChartSeries::Data(data) => data,
            ChartSeries::NoData => {
                tracing::debug!(window = %self.window, "No data for chart window");
                return Ok(());
            }
        };

        let SeriesData {
            labels,
            baby_temperatures,
            environment_temperatures,
            environment_humidities,
        } = data;

        let temperature = self.renderer.construct(
            TEMPERATURE_CHART,
            ChartKind::Line,
            labels.clone(),
            vec![
                dataset("Baby temperature (°C)", baby_temperatures, "#e74c3c"),
                dataset("Room temperature (°C)", environment_temperatures, "#3498db"),
            ],
            chart_options("°C"),
        )?;
        self.handles.insert(TEMPERATURE_CHART, temperature);

        let humidity = self.renderer.construct(
            HUMIDITY_CHART,
            ChartKind::Line,
            labels,
            vec![dataset("Room humidity (%)", environment_humidities, "#2ecc71")],
            chart_options("%"),
        )?;
        self.handles.insert(HUMIDITY_CHART, humidity);

        tracing::debug!(window = %self.window, charts = self.renderer.len(), "Charts rendered");
        Ok(())
    }
}

fn dataset(label: &str, data: Vec<Option<f64>>, color: &str) -> Dataset {
    Dataset {
        label: label.to_string(),
        data,
        border_color: color.to_string(),
    }
}

fn chart_options(unit: &str) -> serde_json::Value {
    json!({
        "responsive": true,
        "spanGaps": true,
        "animation": false,
        "scales": { "y": { "title": { "display": true, "text": unit } } }
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::evaluator::{Severity, CRYING_MESSAGE};
    use crate::models::{SleepPosition, SleepStatus};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 26, 18, 0, 0).unwrap()
    }

    fn controller(window: TimeWindow) -> DashboardController {
        DashboardController::new(
            ThresholdConfig::DEFAULT,
            window,
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn record(hours_ago: i64, crying: bool) -> SensorRecord {
        SensorRecord {
            timestamp: (now() - Duration::hours(hours_ago)).to_rfc3339(),
            status: SleepStatus::Awake,
            is_crying: crying,
            baby_temperature: Some(36.8),
            environment_temperature: Some(21.0),
            environment_humidity: Some(50.0),
            sleep_position: SleepPosition::Side,
        }
    }

    fn chart_id(ctl: &DashboardController, target: &str) -> Option<uuid::Uuid> {
        match ctl.charts().targets.get(target)? {
            ChartView::Chart { chart } => Some(chart.id),
            ChartView::Placeholder { .. } => None,
        }
    }

    #[test]
    fn test_empty_controller_shows_unknowns() {
        let ctl = controller(TimeWindow::Hours(24));
        let status = ctl.status();

        assert!(status.latest.is_none());
        assert!(status.alert.is_none());
        assert_eq!(status.badges.baby_temperature.severity, Severity::Neutral);
        assert!(matches!(
            ctl.charts().targets[TEMPERATURE_CHART],
            ChartView::Placeholder { .. }
        ));
    }

    #[test]
    fn test_snapshot_evaluates_latest_record() {
        let mut ctl = controller(TimeWindow::Hours(24));
        ctl.apply_snapshot(vec![record(3, false), record(1, true)], now())
            .unwrap();

        let status = ctl.status();
        assert_eq!(status.record_count, 2);
        assert_eq!(status.alert.unwrap().message, CRYING_MESSAGE);
        assert_eq!(status.badges.sleep_position.severity, Severity::Warning);

        ctl.apply_snapshot(vec![record(3, false), record(1, true), record(0, false)], now())
            .unwrap();
        assert!(ctl.status().alert.is_none());
    }

    #[test]
    fn test_rerender_replaces_chart_handles() {
        let mut ctl = controller(TimeWindow::Hours(24));
        ctl.apply_snapshot(vec![record(2, false)], now()).unwrap();
        let first = chart_id(&ctl, TEMPERATURE_CHART).unwrap();

        ctl.apply_snapshot(vec![record(2, false), record(1, false)], now())
            .unwrap();
        let second = chart_id(&ctl, TEMPERATURE_CHART).unwrap();

        assert_ne!(first, second);
        assert_eq!(ctl.renderer.len(), 2);
        assert_eq!(ctl.handles.len(), 2);
    }

    #[test]
    fn test_out_of_sync_handle_does_not_lock_target() {
        let mut ctl = controller(TimeWindow::Hours(24));
        ctl.apply_snapshot(vec![record(2, false)], now()).unwrap();

        // Replace the temperature chart behind the controller's back
        let handle = ctl.handles.remove(TEMPERATURE_CHART).unwrap();
        ctl.renderer.destroy(&handle).unwrap();
        let foreign = ctl
            .renderer
            .construct(TEMPERATURE_CHART, ChartKind::Line, Vec::new(), Vec::new(), json!({}))
            .unwrap();
        ctl.handles.insert(TEMPERATURE_CHART, handle);

        let err = ctl.apply_snapshot(vec![record(1, false)], now()).unwrap_err();
        assert!(matches!(err, ChartError::UnknownHandle(_)));
        assert!(ctl.renderer.is_empty());
        assert!(ctl.handles.is_empty());
        drop(foreign);

        ctl.apply_snapshot(vec![record(1, false)], now()).unwrap();
        assert!(chart_id(&ctl, TEMPERATURE_CHART).is_some());
        assert!(chart_id(&ctl, HUMIDITY_CHART).is_some());
    }

    #[test]
    fn test_narrow_window_shows_placeholder() {
        let mut ctl = controller(TimeWindow::Hours(24));
        ctl.apply_snapshot(vec![record(10, false)], now()).unwrap();
        assert!(chart_id(&ctl, HUMIDITY_CHART).is_some());

        ctl.select_window(TimeWindow::Hours(6), now()).unwrap();
        assert_eq!(ctl.window(), TimeWindow::Hours(6));
        assert!(ctl.renderer.is_empty());
        match &ctl.charts().targets[HUMIDITY_CHART] {
            ChartView::Placeholder { message } => assert_eq!(message, NO_DATA_MESSAGE),
            other => panic!("expected placeholder, got {other:?}"),
        }

        ctl.select_window(TimeWindow::All, now()).unwrap();
        assert!(chart_id(&ctl, HUMIDITY_CHART).is_some());
    }

    #[test]
    fn test_fetch_failure_keeps_data_until_next_snapshot() {
        let mut ctl = controller(TimeWindow::Hours(24));
        ctl.apply_snapshot(vec![record(1, true)], now()).unwrap();
        ctl.record_fetch_failure("timeout".to_string());

        let status = ctl.status();
        assert_eq!(status.warning.as_deref(), Some("timeout"));
        assert!(status.alert.is_some());

        ctl.apply_snapshot(vec![record(1, true)], now()).unwrap();
        assert!(ctl.status().warning.is_none());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut ctl = controller(TimeWindow::Hours(24));
        ctl.apply_snapshot(vec![record(1, true)], now()).unwrap();
        ctl.clear().unwrap();

        let status = ctl.status();
        assert!(status.latest.is_none());
        assert!(status.alert.is_none());
        assert!(ctl.renderer.is_empty());
        assert!(ctl.handles.is_empty());
        assert!(ctl.records().is_empty());
    }
}
