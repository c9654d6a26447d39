#![forbid(unsafe_code)]

use serde::Serialize;
use trendline_kernel_contracts::measurement::NodeIdentity;
use trendline_kernel_contracts::run::{RunInfo, RunKey};

use crate::history::{HistoryPoint, MeasurementHistory};

/// One x-axis position of a measurement chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub run: RunKey,
    pub label: String,
    pub tooltip: String,
    /// `None` when the raw value is not a finite number; the position stays
    /// on the axis without a plotted value.
    pub value: Option<f64>,
}

impl SeriesPoint {
    pub fn from_history_point(point: &HistoryPoint) -> Self {
        Self {
            run: point.run.key.clone(),
            label: run_label(&point.run),
            tooltip: format!("{} : {}", point.run.display_name, point.measurement.value),
            value: point.measurement.numeric_value(),
        }
    }
}

/// Chart-ready series for one `(node, measurement)` pair, oldest run first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSeries {
    pub title: String,
    pub node: NodeIdentity,
    pub points: Vec<SeriesPoint>,
}

impl MeasurementSeries {
    pub fn from_history(history: &MeasurementHistory) -> Self {
        Self {
            title: history.name.clone(),
            node: history.node.clone(),
            points: history
                .points
                .iter()
                .map(SeriesPoint::from_history_point)
                .collect(),
        }
    }

    pub fn chart_points(&self) -> Vec<(&str, Option<f64>)> {
        self.points
            .iter()
            .map(|p| (p.label.as_str(), p.value))
            .collect()
    }

    pub fn plotted_len(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }
}

/// Run display name, followed by the execution node when the host reports one.
pub fn run_label(run: &RunInfo) -> String {
    match run.built_on.as_deref() {
        Some(node) => format!("{} {}", run.display_name, node),
        None => run.display_name.clone(),
    }
}
