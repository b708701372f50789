//! Dataset cache: the full fetched series for one instrument plus its lookups.
//!
//! A [`Dataset`] is built once per instrument/indicator selection from a
//! [`PriceGraphPayload`] and never mutated afterwards; the controller replaces
//! it wholesale on the next load.

pub mod classify;
pub mod payload;

pub use classify::{IndicatorKind, OVERLAY_INDICATORS};
pub use payload::{DateSeries, PivotEntry, PriceBar, PriceGraphPayload};

use crate::domain::{parse_date, Pivot, PivotKind, SeriesPoint};
use crate::window::ChunkWindow;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("no price data for {symbol}")]
    Empty { symbol: String },

    #[error("unparseable date '{raw}' in {context}")]
    BadDate { raw: String, context: String },

    #[error("dates out of order at index {index}: {current} does not follow {previous}")]
    Unordered {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },
}

/// All sub-series of one indicator, keyed by sub-series name then date.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub name: String,
    pub kind: IndicatorKind,
    pub graphs: BTreeMap<String, HashMap<NaiveDate, f64>>,
}

impl IndicatorSeries {
    /// Values on one date, by sub-series name. Dates with no value are omitted.
    pub fn values_at(&self, date: NaiveDate) -> BTreeMap<String, f64> {
        self.graphs
            .iter()
            .filter_map(|(graph, values)| values.get(&date).map(|v| (graph.clone(), *v)))
            .collect()
    }
}

/// Full price series for one instrument.
#[derive(Debug, Clone)]
pub struct Dataset {
    symbol: String,
    points: Vec<SeriesPoint>,
    index: HashMap<NaiveDate, usize>,
    volumes: HashMap<NaiveDate, f64>,
    atr: HashMap<NaiveDate, f64>,
    indicators: BTreeMap<String, IndicatorSeries>,
    pivots: BTreeMap<NaiveDate, Pivot>,
}

impl Dataset {
    /// Validate a payload and build the date lookups.
    ///
    /// Side-table entries whose dates do not parse are dropped with a warning;
    /// only the price axis itself is strict.
    pub fn from_payload(symbol: &str, payload: PriceGraphPayload) -> Result<Self, DatasetError> {
        if payload.price.is_empty() {
            return Err(DatasetError::Empty {
                symbol: symbol.to_string(),
            });
        }

        let mut points = Vec::with_capacity(payload.price.len());
        let mut index = HashMap::with_capacity(payload.price.len());
        for (i, bar) in payload.price.iter().enumerate() {
            let date = parse_date(&bar.date).ok_or_else(|| DatasetError::BadDate {
                raw: bar.date.clone(),
                context: format!("price[{i}]"),
            })?;
            if let Some(prev) = points.last().map(|p: &SeriesPoint| p.date) {
                if date <= prev {
                    return Err(DatasetError::Unordered {
                        index: i,
                        previous: prev,
                        current: date,
                    });
                }
            }
            index.insert(date, i);
            points.push(SeriesPoint {
                date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
            });
        }

        let volumes = date_table(&payload.volumes, "volumes");
        let atr = payload
            .atr_series()
            .map(|series| date_table(series, "atr"))
            .unwrap_or_default();

        let mut indicators = BTreeMap::new();
        for (name, graphs) in &payload.indicators {
            let graphs = graphs
                .iter()
                .map(|(graph, values)| {
                    let values = values
                        .iter()
                        .filter_map(|(raw, v)| {
                            let v = (*v)?;
                            parse_side_date(raw, name).map(|d| (d, v))
                        })
                        .collect();
                    (graph.clone(), values)
                })
                .collect();
            indicators.insert(
                name.clone(),
                IndicatorSeries {
                    name: name.clone(),
                    kind: IndicatorKind::classify(name),
                    graphs,
                },
            );
        }

        let mut pivots = BTreeMap::new();
        for (raw, entry) in &payload.pivots {
            let Some(date) = parse_side_date(raw, "pivots") else {
                continue;
            };
            let kind = match entry.kind.to_ascii_lowercase().as_str() {
                "high" => PivotKind::High,
                "low" => PivotKind::Low,
                other => {
                    warn!(symbol, date = %date, kind = other, "skipping pivot of unknown kind");
                    continue;
                }
            };
            pivots.insert(
                date,
                Pivot {
                    kind,
                    price: entry.price,
                    realized: entry.realized.as_deref().and_then(parse_date),
                },
            );
        }

        Ok(Self {
            symbol: symbol.to_string(),
            points,
            index,
            volumes,
            atr,
            indicators,
            pivots,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn point(&self, i: usize) -> Option<&SeriesPoint> {
        self.points.get(i)
    }

    pub fn date_at(&self, i: usize) -> Option<NaiveDate> {
        self.points.get(i).map(|p| p.date)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.index.get(&date).copied()
    }

    /// Points covered by `window`, truncated at the end of the series.
    pub fn slice(&self, window: ChunkWindow) -> &[SeriesPoint] {
        let start = window.start.min(self.len());
        &self.points[start..window.end(self.len())]
    }

    pub fn volume(&self, date: NaiveDate) -> Option<f64> {
        self.volumes.get(&date).copied()
    }

    pub fn atr(&self, date: NaiveDate) -> Option<f64> {
        self.atr.get(&date).copied()
    }

    pub fn indicator(&self, name: &str) -> Option<&IndicatorSeries> {
        self.indicators.get(name)
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.keys().map(String::as_str)
    }

    /// Indicator name → sub-series values for one date.
    pub fn indicator_values(&self, date: NaiveDate) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.indicators
            .iter()
            .map(|(name, series)| (name.clone(), series.values_at(date)))
            .filter(|(_, values)| !values.is_empty())
            .collect()
    }

    /// Overlay values for one date, flattened to sub-series name → value.
    pub fn overlay_values(&self, date: NaiveDate) -> BTreeMap<String, f64> {
        self.indicators
            .values()
            .filter(|s| s.kind.is_overlay())
            .flat_map(|s| s.values_at(date))
            .collect()
    }

    /// Sub-series names of every overlay indicator, in indicator order.
    pub fn overlay_series_names(&self) -> Vec<String> {
        self.indicators
            .values()
            .filter(|s| s.kind.is_overlay())
            .flat_map(|s| s.graphs.keys().cloned())
            .collect()
    }

    pub fn panel_indicator_names(&self) -> Vec<String> {
        self.indicators
            .values()
            .filter(|s| !s.kind.is_overlay())
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn pivot(&self, date: NaiveDate) -> Option<&Pivot> {
        self.pivots.get(&date)
    }

    pub fn is_pivot(&self, date: NaiveDate) -> bool {
        self.pivots.contains_key(&date)
    }
}

fn parse_side_date(raw: &str, table: &str) -> Option<NaiveDate> {
    let parsed = parse_date(raw);
    if parsed.is_none() {
        warn!(table, raw, "dropping entry with unparseable date");
    }
    parsed
}

fn date_table(series: &DateSeries, table: &str) -> HashMap<NaiveDate, f64> {
    series
        .iter()
        .filter_map(|(raw, v)| parse_side_date(raw, table).map(|d| (d, *v)))
        .collect()
}
