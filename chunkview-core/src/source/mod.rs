//! Series sources and the background fetch worker.
//!
//! The [`SeriesSource`] trait abstracts over where price graphs come from
//! (JSON or CSV files, synthetic data, in-memory fixtures) so the controller
//! can be driven and tested without a network.

pub mod csv;
pub mod json;
pub mod memory;
pub mod synthetic;
pub mod worker;

pub use self::csv::CsvDirSource;
pub use json::JsonDirSource;
pub use memory::MemorySource;
pub use synthetic::SyntheticSource;
pub use worker::{spawn_fetch_worker, FetchCommand, FetchResponse};

use crate::config::{IndicatorParams, Timeframe};
use crate::dataset::{Dataset, DatasetError, PriceGraphPayload};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Fetch failures. Cloneable so the worker can hand them across threads and
/// the controller can keep the last one for display.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("no series for symbol '{symbol}'")]
    NotFound { symbol: String },

    #[error("read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("malformed series data: {0}")]
    Malformed(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("fetch worker is no longer running")]
    WorkerGone,
}

/// One fetch: a symbol, the active indicators with their parameters, and the
/// generation the controller assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchRequest {
    pub generation: u64,
    pub symbol: String,
    pub indicators: BTreeMap<String, IndicatorParams>,
    pub timeframe: Timeframe,
}

impl FetchRequest {
    pub fn indicator_names(&self) -> Vec<&str> {
        self.indicators.keys().map(String::as_str).collect()
    }
}

/// Where price graphs come from.
pub trait SeriesSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch the price graph for `request`. Only the requested indicators
    /// should appear in the payload.
    fn fetch(&self, request: &FetchRequest) -> Result<PriceGraphPayload, FetchError>;
}

/// Fetch and validate in one step.
pub fn load_dataset(source: &dyn SeriesSource, request: &FetchRequest) -> Result<Dataset, FetchError> {
    let payload = source.fetch(request)?;
    Ok(Dataset::from_payload(&request.symbol, payload)?)
}
