//! In-memory chart renderer.
//!
//! Holds one chart configuration per render target, in the shape a browser
//! charting library consumes. A target must be released with
//! [`ChartRegistry::destroy`] before a new chart is constructed on it.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

// ---

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("chart target {0:?} already holds a chart")]
    TargetInUse(String),

    #[error("chart handle {0} is not active")]
    UnknownHandle(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
    pub border_color: String,
}

/// A constructed chart as served to the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub options: Value,
}

/// Ownership token for a constructed chart. Not `Clone`: only the holder of
/// the handle can destroy its chart.
#[derive(Debug, PartialEq, Eq)]
pub struct ChartHandle {
    id: Uuid,
    target: String,
}

impl ChartHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct ChartRegistry {
    charts: HashMap<String, ChartConfig>,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a chart on `target`.
    ///
    /// Fails if the target still holds a chart that was never destroyed.
    pub fn construct(
        &mut self,
        target: &str,
        kind: ChartKind,
        labels: Vec<String>,
        datasets: Vec<Dataset>,
        options: Value,
    ) -> Result<ChartHandle, ChartError> {
        // ---
        if self.charts.contains_key(target) {
            return Err(ChartError::TargetInUse(target.to_string()));
        }

        let id = Uuid::new_v4();
        self.charts.insert(
            target.to_string(),
            ChartConfig {
                id,
                kind,
                labels,
                datasets,
                options,
            },
        );
        tracing::debug!(target_id = %target, chart_id = %id, "Chart constructed");

        Ok(ChartHandle {
            id,
            target: target.to_string(),
        })
    }

    /// Release the chart behind `handle`, freeing its target.
    pub fn destroy(&mut self, handle: &ChartHandle) -> Result<(), ChartError> {
        // ---
        match self.charts.get(&handle.target) {
            Some(chart) if chart.id == handle.id => {
                self.charts.remove(&handle.target);
                tracing::debug!(target_id = %handle.target, chart_id = %handle.id, "Chart destroyed");
                Ok(())
            }
            _ => Err(ChartError::UnknownHandle(handle.id)),
        }
    }

    pub fn get(&self, target: &str) -> Option<&ChartConfig> {
        self.charts.get(target)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Drop every chart, whether or not its handle is still held.
    pub fn clear(&mut self) {
        self.charts.clear();
    }
}
