//! Materialization: turning a window of the dataset into render rows.

use super::{ChunkWindow, ChunkWindowManager};
use crate::annotation::Annotator;
use crate::dataset::Dataset;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Error-bar style offset pair `[below, above]` relative to the close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band(pub f64, pub f64);

impl Band {
    pub fn below(distance: f64) -> Self {
        Band(distance, 0.0)
    }

    pub fn above(distance: f64) -> Self {
        Band(0.0, distance)
    }
}

/// Dot drawn on the price line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Marker {
    Pivot,
    Buy { selected: bool },
    Sell { selected: bool },
    Holding,
}

/// One date of the main price chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub price: f64,
    pub green_body: Option<Band>,
    pub red_body: Option<Band>,
    pub wick: Band,
    pub stoploss: Option<Band>,
    pub target: Option<Band>,
    pub realized: Option<Band>,
    pub overlays: BTreeMap<String, f64>,
    pub marker: Option<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub date: NaiveDate,
    pub volume: Option<f64>,
}

/// One date of a panel indicator, by sub-series name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

/// Rendering-ready rows for one chunk window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedChunk {
    pub window: ChunkWindow,
    pub rows: Vec<PriceRow>,
    pub volume: Vec<VolumeRow>,
    pub panels: BTreeMap<String, Vec<PanelRow>>,
    pub overlay_names: Vec<String>,
}

impl MaterializedChunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn row(&self, date: NaiveDate) -> Option<&PriceRow> {
        self.rows.iter().find(|r| r.date == date)
    }
}

impl ChunkWindowManager {
    /// Build the rows for `window`. Annotations go through `annotator`, which
    /// memoizes them across chunk shifts.
    pub fn materialize(
        &self,
        dataset: &Dataset,
        window: ChunkWindow,
        annotator: &mut Annotator<'_>,
    ) -> MaterializedChunk {
        let points = dataset.slice(window);
        debug!(
            symbol = dataset.symbol(),
            start = window.start,
            len = dataset.len(),
            rows = points.len(),
            "materializing chunk"
        );

        let panel_names = dataset.panel_indicator_names();
        let mut panels: BTreeMap<String, Vec<PanelRow>> = panel_names
            .iter()
            .map(|name| (name.clone(), Vec::with_capacity(points.len())))
            .collect();
        let mut rows = Vec::with_capacity(points.len());
        let mut volume = Vec::with_capacity(points.len());

        for point in points {
            let date = point.date;
            let close = point.close;
            let record = annotator.annotate(point, dataset.atr(date));

            rows.push(PriceRow {
                date,
                price: close,
                green_body: point.is_up().then(|| Band(close - point.open, 0.0)),
                red_body: (!point.is_up()).then(|| Band(0.0, point.open - close)),
                wick: Band(close - point.low, point.high - close),
                stoploss: record.stoploss_band(close),
                target: record.target_band(close),
                realized: record.realized_band(close),
                overlays: dataset.overlay_values(date),
                marker: annotator.marker(date, dataset.is_pivot(date)),
            });

            volume.push(VolumeRow {
                date,
                volume: dataset.volume(date),
            });

            for name in &panel_names {
                let values = dataset
                    .indicator(name)
                    .map(|series| series.values_at(date))
                    .unwrap_or_default();
                if let Some(list) = panels.get_mut(name) {
                    list.push(PanelRow { date, values });
                }
            }
        }

        MaterializedChunk {
            window,
            rows,
            volume,
            panels,
            overlay_names: dataset.overlay_series_names(),
        }
    }
}
