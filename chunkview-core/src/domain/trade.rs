//! Trade records supplied by the backtest and brokerage collaborators.
//!
//! Field names follow the upstream JSON (camelCase); dates accept either
//! `YYYY-MM-DD` or RFC 3339 timestamps.

use super::series::flex_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A completed buy/sell pair from a backtest result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(with = "flex_date")]
    pub buy_date: NaiveDate,
    #[serde(with = "flex_date")]
    pub sell_date: NaiveDate,
    /// Percent of the buy close risked on the trade (e.g. 5.0 = 5%).
    #[serde(default)]
    pub risk: Option<f64>,
    #[serde(default)]
    pub profit: Option<f64>,
    /// Fractional profit (0.05 = 5%).
    #[serde(default)]
    pub percent_profit: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub span: Option<u32>,
}

impl Event {
    pub fn new(buy_date: NaiveDate, sell_date: NaiveDate) -> Self {
        Self {
            buy_date,
            sell_date,
            risk: None,
            profit: None,
            percent_profit: 0.0,
            reason: None,
            span: None,
        }
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn with_profit(mut self, profit: f64, percent_profit: f64) -> Self {
        self.profit = Some(profit);
        self.percent_profit = percent_profit;
        self
    }
}

/// Stop/target bookkeeping recorded when a position was opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoplossTarget {
    #[serde(default)]
    pub init_stoploss: Option<f64>,
    #[serde(default)]
    pub stoploss: Option<f64>,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub risk: Option<f64>,
}

/// An open position, keyed by its buy date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    #[serde(with = "flex_date")]
    pub buy_date: NaiveDate,
    #[serde(default)]
    pub stoploss_target: Option<StoplossTarget>,
}

impl Holding {
    pub fn new(buy_date: NaiveDate, init_stoploss: Option<f64>) -> Self {
        Self {
            buy_date,
            stoploss_target: Some(StoplossTarget {
                init_stoploss,
                ..StoplossTarget::default()
            }),
        }
    }

    /// The stoploss recorded when the position was opened, if any.
    pub fn init_stoploss(&self) -> Option<f64> {
        self.stoploss_target.as_ref().and_then(|st| st.init_stoploss)
    }
}

/// A round trip actually executed at the broker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedOrder {
    #[serde(default, with = "flex_date::option")]
    pub buy_date: Option<NaiveDate>,
    #[serde(default, with = "flex_date::option")]
    pub sell_date: Option<NaiveDate>,
    #[serde(default)]
    pub buy_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
}

/// Events and holdings for one instrument, as delivered by the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSet {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}
