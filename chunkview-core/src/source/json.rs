//! Price graphs stored as `<dir>/<SYMBOL>.json` in the wire format.
//!
//! Hourly data lives next to daily data as `<SYMBOL>.1Hour.json`.

use super::{FetchError, FetchRequest, SeriesSource};
use crate::config::Timeframe;
use crate::dataset::PriceGraphPayload;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        match timeframe {
            Timeframe::OneDay => self.dir.join(format!("{symbol}.json")),
            Timeframe::OneHour => self.dir.join(format!("{symbol}.{timeframe}.json")),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SeriesSource for JsonDirSource {
    fn name(&self) -> &str {
        "json"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<PriceGraphPayload, FetchError> {
        let path = self.path_for(&request.symbol, request.timeframe);
        if !path.exists() {
            return Err(FetchError::NotFound {
                symbol: request.symbol.clone(),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|e| FetchError::Io {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let mut payload: PriceGraphPayload = serde_json::from_str(&content)
            .map_err(|e| FetchError::Malformed(format!("{}: {e}", path.display())))?;
        payload.retain_indicators(&request.indicator_names());
        debug!(path = %path.display(), bars = payload.price.len(), "read json series");
        Ok(payload)
    }
}
