//! Annotation resolver: stoploss, target and realized-price bands per date.
//!
//! Resolution is a pure function of the trade book, the strategy options and
//! one series point. [`Annotator`] wraps it with the versioned
//! [`AnnotationCache`] and the marker lookup used during materialization.

pub mod cache;

pub use cache::{AnnotationCache, TradeSetVersion};

use crate::config::StrategyOptions;
use crate::domain::{ClosedOrder, Event, Holding, SeriesPoint, TradeSet};
use crate::window::{Band, Marker};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which side of an event a date belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSide {
    Buy,
    Sell,
}

/// Indexed view over one instrument's events, holdings and closed orders.
#[derive(Debug, Clone)]
pub struct TradeBook {
    events: Vec<Event>,
    /// Date → (side, event index). When two events share a date the later one wins.
    by_date: HashMap<NaiveDate, (EventSide, usize)>,
    buy_dates: HashSet<NaiveDate>,
    sell_dates: HashSet<NaiveDate>,
    holdings: HashMap<NaiveDate, Holding>,
    closed_orders: Option<Vec<ClosedOrder>>,
    version: TradeSetVersion,
}

impl TradeBook {
    pub fn new(trades: TradeSet, closed_orders: Option<Vec<ClosedOrder>>, strategy: &StrategyOptions) -> Self {
        let version = TradeSetVersion::compute(&trades, closed_orders.as_deref(), strategy);

        let mut by_date = HashMap::new();
        let mut buy_dates = HashSet::new();
        let mut sell_dates = HashSet::new();
        for (i, event) in trades.events.iter().enumerate() {
            buy_dates.insert(event.buy_date);
            sell_dates.insert(event.sell_date);
            by_date.insert(event.buy_date, (EventSide::Buy, i));
            by_date.insert(event.sell_date, (EventSide::Sell, i));
        }
        let holdings = trades
            .holdings
            .into_iter()
            .map(|h| (h.buy_date, h))
            .collect();

        Self {
            events: trades.events,
            by_date,
            buy_dates,
            sell_dates,
            holdings,
            closed_orders,
            version,
        }
    }

    pub fn empty() -> Self {
        Self::new(TradeSet::default(), None, &StrategyOptions::default())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// The event owning `date`, with the side it appears on.
    pub fn event_at(&self, date: NaiveDate) -> Option<(EventSide, &Event)> {
        let (side, i) = self.by_date.get(&date)?;
        self.events.get(*i).map(|e| (*side, e))
    }

    pub fn holding(&self, date: NaiveDate) -> Option<&Holding> {
        self.holdings.get(&date)
    }

    pub fn is_buy_date(&self, date: NaiveDate) -> bool {
        self.buy_dates.contains(&date)
    }

    pub fn is_sell_date(&self, date: NaiveDate) -> bool {
        self.sell_dates.contains(&date)
    }

    pub fn is_holding(&self, date: NaiveDate) -> bool {
        self.holdings.contains_key(&date)
    }

    pub fn closed_orders(&self) -> Option<&[ClosedOrder]> {
        self.closed_orders.as_deref()
    }

    pub fn version(&self) -> &TradeSetVersion {
        &self.version
    }
}

/// A resolved price with its distance from the close in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub percent: f64,
}

/// Everything the resolver derives for one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub stoploss: Option<PriceLevel>,
    pub target: Option<PriceLevel>,
    pub realized: Option<f64>,
}

impl AnnotationRecord {
    pub fn stoploss_band(&self, close: f64) -> Option<Band> {
        self.stoploss.map(|s| Band::below(close - s.price))
    }

    pub fn target_band(&self, close: f64) -> Option<Band> {
        self.target.map(|t| Band::above(t.price - close))
    }

    pub fn realized_band(&self, close: f64) -> Option<Band> {
        self.realized.map(|price| {
            if price > close {
                Band::above(price - close)
            } else {
                Band::below(close - price)
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.stoploss.is_none() && self.target.is_none() && self.realized.is_none()
    }
}

/// Stop implied by a buy event's risk percentage, if positive.
fn event_stop(book: &TradeBook, date: NaiveDate, close: f64) -> Option<f64> {
    match book.event_at(date) {
        Some((EventSide::Buy, event)) => event
            .risk
            .filter(|r| *r > 0.0)
            .map(|risk| close * (100.0 - risk) / 100.0),
        _ => None,
    }
}

/// Apply the event-then-holding override chain to `base`.
///
/// A holding always wins over an event on the same date, and a holding with
/// no recorded stoploss yields nothing.
fn override_stop(book: &TradeBook, date: NaiveDate, close: f64, base: Option<f64>) -> Option<f64> {
    let mut stop = event_stop(book, date, close).or(base);
    if let Some(holding) = book.holding(date) {
        stop = holding.init_stoploss();
    }
    stop.filter(|s| *s != 0.0 && s.is_finite())
}

pub fn resolve_stoploss(book: &TradeBook, point: &SeriesPoint) -> Option<PriceLevel> {
    let close = point.close;
    let stop = override_stop(book, point.date, close, None)?;
    Some(PriceLevel {
        price: stop,
        percent: (close - stop) / close * 100.0,
    })
}

pub fn resolve_target(
    book: &TradeBook,
    strategy: &StrategyOptions,
    point: &SeriesPoint,
    atr: Option<f64>,
) -> Option<PriceLevel> {
    let date = point.date;
    if !book.is_buy_date(date) && !book.is_holding(date) {
        return None;
    }
    let ratio = strategy.risk_reward_ratio.filter(|r| *r != 0.0)?;
    let close = point.close;
    let implied = match (strategy.stop_loss_atr, atr) {
        (Some(mult), Some(atr)) => Some(point.low - mult * atr),
        _ => None,
    };
    let stop = override_stop(book, date, close, implied)?;
    let target = close + ratio * (close - stop);
    if target == 0.0 || !target.is_finite() {
        return None;
    }
    Some(PriceLevel {
        price: target,
        percent: (target - close) / close * 100.0,
    })
}

/// Execution price of the closed order matching `date`, if any.
///
/// Buy dates and holdings match on the order's buy side, sell dates on its sell
/// side. The nearest order within one calendar day wins; ties keep the first.
pub fn resolve_realized(book: &TradeBook, date: NaiveDate) -> Option<f64> {
    let is_buy = book.is_buy_date(date) || book.is_holding(date);
    if !is_buy && !book.is_sell_date(date) {
        return None;
    }
    let orders = book.closed_orders()?;

    let mut best: Option<(i64, &ClosedOrder)> = None;
    for order in orders {
        let reference = if is_buy { order.buy_date } else { order.sell_date };
        let Some(reference) = reference else { continue };
        let distance = (reference - date).num_days().abs();
        if distance > 1 {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, order));
        }
    }

    let (_, order) = best?;
    if is_buy {
        order.buy_price
    } else {
        order.sell_price
    }
}

pub fn resolve(
    book: &TradeBook,
    strategy: &StrategyOptions,
    point: &SeriesPoint,
    atr: Option<f64>,
) -> AnnotationRecord {
    AnnotationRecord {
        stoploss: resolve_stoploss(book, point),
        target: resolve_target(book, strategy, point, atr),
        realized: resolve_realized(book, point.date),
    }
}

/// Resolver bound to one trade book, strategy and cache, plus the selected event
/// for marker highlighting.
pub struct Annotator<'a> {
    book: &'a TradeBook,
    strategy: &'a StrategyOptions,
    cache: &'a mut AnnotationCache,
    selected: Option<&'a Event>,
}

impl<'a> Annotator<'a> {
    pub fn new(book: &'a TradeBook, strategy: &'a StrategyOptions, cache: &'a mut AnnotationCache) -> Self {
        Self {
            book,
            strategy,
            cache,
            selected: None,
        }
    }

    pub fn with_selected(mut self, event: Option<&'a Event>) -> Self {
        self.selected = event;
        self
    }

    pub fn annotate(&mut self, point: &SeriesPoint, atr: Option<f64>) -> AnnotationRecord {
        let book = self.book;
        let strategy = self.strategy;
        self.cache
            .get_or_resolve(book.version(), point.date, || resolve(book, strategy, point, atr))
    }

    /// Pivot beats buy beats sell beats holding.
    pub fn marker(&self, date: NaiveDate, is_pivot: bool) -> Option<Marker> {
        if is_pivot {
            return Some(Marker::Pivot);
        }
        if self.book.is_buy_date(date) {
            let selected = self.selected.map_or(false, |e| e.buy_date == date);
            return Some(Marker::Buy { selected });
        }
        if self.book.is_sell_date(date) {
            let selected = self.selected.map_or(false, |e| e.sell_date == date);
            return Some(Marker::Sell { selected });
        }
        if self.book.is_holding(date) {
            return Some(Marker::Holding);
        }
        None
    }
}
