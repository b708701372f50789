//! Wire format of a price-graph fetch.
//!
//! Every table is keyed by the raw date string as the upstream service emits
//! it; parsing and validation happen in [`Dataset::from_payload`](super::Dataset::from_payload).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date-keyed numeric series.
pub type DateSeries = BTreeMap<String, f64>;

/// One OHLC row of the `price` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One entry of the `pivots` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub date: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub realized: Option<String>,
}

/// Everything one fetch returns for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceGraphPayload {
    #[serde(default)]
    pub price: Vec<PriceBar>,
    /// `{"ATR": {date: value}}`.
    #[serde(default)]
    pub atr: BTreeMap<String, DateSeries>,
    #[serde(default)]
    pub volumes: DateSeries,
    /// `{indicator: {sub_series: {date: value}}}`. Warm-up dates carry `null`.
    #[serde(default)]
    pub indicators: BTreeMap<String, BTreeMap<String, BTreeMap<String, Option<f64>>>>,
    #[serde(default)]
    pub pivots: BTreeMap<String, PivotEntry>,
}

impl PriceGraphPayload {
    pub fn from_bars(bars: Vec<PriceBar>) -> Self {
        Self {
            price: bars,
            ..Self::default()
        }
    }

    pub fn insert_volume(&mut self, date: &str, volume: f64) {
        self.volumes.insert(date.to_string(), volume);
    }

    pub fn insert_atr(&mut self, date: &str, atr: f64) {
        self.atr
            .entry("ATR".to_string())
            .or_default()
            .insert(date.to_string(), atr);
    }

    pub fn insert_indicator(&mut self, name: &str, sub_series: &str, date: &str, value: Option<f64>) {
        self.indicators
            .entry(name.to_string())
            .or_default()
            .entry(sub_series.to_string())
            .or_default()
            .insert(date.to_string(), value);
    }

    /// The ATR table, falling back to whichever key the source used.
    pub fn atr_series(&self) -> Option<&DateSeries> {
        self.atr.get("ATR").or_else(|| self.atr.values().next())
    }

    /// Keep only the named indicators.
    pub fn retain_indicators(&mut self, names: &[&str]) {
        self.indicators.retain(|name, _| names.contains(&name.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_shape() {
        let json = r#"{
            "price": [{"date": "2024-01-02", "open": 1, "high": 2, "low": 0.5, "close": 1.5}],
            "atr": {"ATR": {"2024-01-02": 0.4}},
            "volumes": {"2024-01-02": 1000},
            "indicators": {"RSI": {"rsi": {"2024-01-02": null}}},
            "pivots": {"2024-01-02": {"type": "high", "date": "2024-01-02", "price": 2.0, "realized": "2024-01-05"}}
        }"#;
        let payload: PriceGraphPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.price.len(), 1);
        assert_eq!(payload.atr_series().unwrap()["2024-01-02"], 0.4);
        assert_eq!(payload.indicators["RSI"]["rsi"]["2024-01-02"], None);
        assert_eq!(payload.pivots["2024-01-02"].kind, "high");
    }

    #[test]
    fn missing_tables_default_to_empty() {
        let payload: PriceGraphPayload = serde_json::from_str(r#"{"price": []}"#).unwrap();
        assert!(payload.volumes.is_empty());
        assert!(payload.atr_series().is_none());
    }

    #[test]
    fn atr_falls_back_to_first_key() {
        let mut payload = PriceGraphPayload::default();
        payload
            .atr
            .insert("atr14".into(), BTreeMap::from([("2024-01-02".to_string(), 1.0)]));
        assert_eq!(payload.atr_series().unwrap()["2024-01-02"], 1.0);
    }

    #[test]
    fn retain_drops_inactive_indicators() {
        let mut payload = PriceGraphPayload::default();
        payload.insert_indicator("RSI", "rsi", "2024-01-02", Some(50.0));
        payload.insert_indicator("SMA", "sma", "2024-01-02", Some(10.0));
        payload.retain_indicators(&["SMA"]);
        assert_eq!(payload.indicators.keys().collect::<Vec<_>>(), vec!["SMA"]);
    }
}
