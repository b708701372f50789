//! Bars stored as `<dir>/<SYMBOL>.csv`.
//!
//! Columns: `date,open,high,low,close,volume` with an optional trailing `atr`.
//! CSV files carry no indicators or pivots.

use super::{FetchError, FetchRequest, SeriesSource};
use crate::dataset::{PriceBar, PriceGraphPayload};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    atr: Option<f64>,
}

pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a payload's bars, volumes and ATR back out in this source's format.
    pub fn write(&self, symbol: &str, payload: &PriceGraphPayload) -> Result<PathBuf, FetchError> {
        let path = self.path_for(symbol);
        let io_err = |e: &dyn std::fmt::Display| FetchError::Io {
            path: path.clone(),
            message: e.to_string(),
        };
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| io_err(&e))?;
        wtr.write_record(["date", "open", "high", "low", "close", "volume", "atr"])
            .map_err(|e| io_err(&e))?;
        let atr = payload.atr_series();
        for bar in &payload.price {
            let volume = payload
                .volumes
                .get(&bar.date)
                .map(|v| v.to_string())
                .unwrap_or_default();
            let atr = atr
                .and_then(|a| a.get(&bar.date))
                .map(|v| v.to_string())
                .unwrap_or_default();
            wtr.write_record([
                bar.date.clone(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                volume,
                atr,
            ])
            .map_err(|e| io_err(&e))?;
        }
        wtr.flush().map_err(|e| io_err(&e))?;
        Ok(path)
    }
}

impl SeriesSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<PriceGraphPayload, FetchError> {
        let path = self.path_for(&request.symbol);
        if !path.exists() {
            return Err(FetchError::NotFound {
                symbol: request.symbol.clone(),
            });
        }
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| FetchError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut payload = PriceGraphPayload::default();
        for (line, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| {
                FetchError::Malformed(format!("{} row {}: {e}", path.display(), line + 1))
            })?;
            if let Some(volume) = row.volume {
                payload.insert_volume(&row.date, volume);
            }
            if let Some(atr) = row.atr {
                payload.insert_atr(&row.date, atr);
            }
            payload.price.push(PriceBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            });
        }
        debug!(path = %path.display(), bars = payload.price.len(), "read csv series");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeframe;
    use std::collections::BTreeMap;

    fn request(symbol: &str) -> FetchRequest {
        FetchRequest {
            generation: 1,
            symbol: symbol.into(),
            indicators: BTreeMap::new(),
            timeframe: Timeframe::OneDay,
        }
    }

    #[test]
    fn reads_bars_with_optional_columns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("XYZ.csv"),
            "date,open,high,low,close,volume,atr\n\
             2024-01-02,10,11,9,10.5,1000,0.4\n\
             2024-01-03,10.5,12,10,11.5,,\n",
        )
        .unwrap();
        let payload = CsvDirSource::new(dir.path()).fetch(&request("XYZ")).unwrap();
        assert_eq!(payload.price.len(), 2);
        assert_eq!(payload.volumes.len(), 1);
        assert_eq!(payload.atr_series().unwrap()["2024-01-02"], 0.4);
    }

    #[test]
    fn bad_number_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("BAD.csv"),
            "date,open,high,low,close,volume\n2024-01-02,x,11,9,10.5,1000\n",
        )
        .unwrap();
        assert!(matches!(
            CsvDirSource::new(dir.path()).fetch(&request("BAD")),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn write_then_fetch_keeps_bars() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvDirSource::new(dir.path());
        let mut payload = PriceGraphPayload::from_bars(vec![PriceBar {
            date: "2024-01-02".into(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
        }]);
        payload.insert_volume("2024-01-02", 300.0);
        source.write("RT", &payload).unwrap();
        let back = source.fetch(&request("RT")).unwrap();
        assert_eq!(back.price, payload.price);
        assert_eq!(back.volumes, payload.volumes);
        assert!(back.atr_series().is_none());
    }
}
