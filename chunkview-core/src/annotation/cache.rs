//! Versioned per-date memo of resolved annotations.
//!
//! The cache key is (trade-set version, date). Entries are only ever valid for
//! one version, so a version change drops everything at once.

use super::AnnotationRecord;
use crate::config::StrategyOptions;
use crate::domain::{ClosedOrder, TradeSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// BLAKE3 content hash of every input the resolver reads besides the series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeSetVersion(String);

impl TradeSetVersion {
    pub fn compute(
        trades: &TradeSet,
        closed_orders: Option<&[ClosedOrder]>,
        strategy: &StrategyOptions,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();

        hasher.update(b"events");
        hasher.update(&(trades.events.len() as u64).to_le_bytes());
        for event in &trades.events {
            hash_date(&mut hasher, Some(event.buy_date));
            hash_date(&mut hasher, Some(event.sell_date));
            hash_f64(&mut hasher, event.risk);
            hash_f64(&mut hasher, event.profit);
            hash_f64(&mut hasher, Some(event.percent_profit));
        }

        hasher.update(b"holdings");
        hasher.update(&(trades.holdings.len() as u64).to_le_bytes());
        for holding in &trades.holdings {
            hash_date(&mut hasher, Some(holding.buy_date));
            match &holding.stoploss_target {
                Some(st) => {
                    hasher.update(&[1]);
                    hash_f64(&mut hasher, st.init_stoploss);
                    hash_f64(&mut hasher, st.stoploss);
                    hash_f64(&mut hasher, st.target);
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }

        hasher.update(b"closed");
        match closed_orders {
            Some(orders) => {
                hasher.update(&(orders.len() as u64).to_le_bytes());
                for order in orders {
                    hash_date(&mut hasher, order.buy_date);
                    hash_date(&mut hasher, order.sell_date);
                    hash_f64(&mut hasher, order.buy_price);
                    hash_f64(&mut hasher, order.sell_price);
                }
            }
            None => {
                hasher.update(b"none");
            }
        }

        hasher.update(b"strategy");
        hash_f64(&mut hasher, strategy.risk_reward_ratio);
        hash_f64(&mut hasher, strategy.stop_loss_atr);

        TradeSetVersion(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeSetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell versions apart in logs.
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

fn hash_date(hasher: &mut blake3::Hasher, date: Option<NaiveDate>) {
    match date {
        Some(d) => {
            hasher.update(&[1]);
            hasher.update(d.format("%Y-%m-%d").to_string().as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn hash_f64(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_bits().to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Date → resolved annotation, valid for a single [`TradeSetVersion`].
#[derive(Debug, Clone, Default)]
pub struct AnnotationCache {
    version: Option<TradeSetVersion>,
    entries: HashMap<NaiveDate, AnnotationRecord>,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record for `date`, or the result of `resolve` (which is stored).
    /// A different `version` than the one the cache was filled against empties it first.
    pub fn get_or_resolve<F>(&mut self, version: &TradeSetVersion, date: NaiveDate, resolve: F) -> AnnotationRecord
    where
        F: FnOnce() -> AnnotationRecord,
    {
        if self.version.as_ref() != Some(version) {
            self.entries.clear();
            self.version = Some(version.clone());
        }
        *self.entries.entry(date).or_insert_with(resolve)
    }

    /// Cached record for `date` under `version`, without resolving.
    pub fn get(&self, version: &TradeSetVersion, date: NaiveDate) -> Option<AnnotationRecord> {
        if self.version.as_ref() != Some(version) {
            return None;
        }
        self.entries.get(&date).copied()
    }

    pub fn invalidate(&mut self) {
        self.version = None;
        self.entries.clear();
    }

    pub fn version(&self) -> Option<&TradeSetVersion> {
        self.version.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
