//! Chart controller: typed triggers in, effects out.
//!
//! The controller owns the dataset, the trade book, the annotation cache and
//! the current window/brush for one instrument selection. It performs no I/O;
//! fetches leave as [`Effect::Fetch`] and come back as
//! [`Trigger::SeriesLoaded`], tagged with the generation they were issued
//! under so that late answers to superseded requests can be dropped.

use crate::annotation::{self, AnnotationCache, Annotator, EventSide, PriceLevel, TradeBook};
use crate::config::{ChunkviewConfig, ConfigError};
use crate::dataset::Dataset;
use crate::domain::{ClosedOrder, TradeSet};
use crate::navigator::{EventNavigator, NavigationError, View};
use crate::source::{FetchError, FetchRequest};
use crate::window::{ChunkWindow, ChunkWindowManager, MaterializedChunk, Viewport};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything that can happen to the chart.
#[derive(Debug)]
pub enum Trigger {
    /// A new instrument was picked, with its backtest trades and (optionally)
    /// the broker's closed orders.
    InstrumentChanged {
        symbol: String,
        trades: TradeSet,
        closed_orders: Option<Vec<ClosedOrder>>,
    },
    IndicatorsChanged {
        active: Vec<String>,
    },
    EventSelected {
        index: Option<usize>,
    },
    ViewportDragged {
        viewport: Viewport,
    },
    /// A fetch finished on the worker.
    SeriesLoaded {
        generation: u64,
        result: Result<Dataset, FetchError>,
    },
}

/// What the caller must do after a trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Fetch(FetchRequest),
    Render(RenderFrame),
    /// Brush moved without a window shift.
    Viewport(Viewport),
    Unavailable {
        symbol: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading { generation: u64, symbol: String },
    Ready,
    Unavailable { message: String },
}

/// A freshly materialized chunk plus the brush to show over it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub symbol: String,
    pub window: ChunkWindow,
    pub viewport: Viewport,
    pub chunk: Arc<MaterializedChunk>,
}

/// Tooltip facts for one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DateSummary {
    pub date: NaiveDate,
    pub close: f64,
    pub stoploss: Option<PriceLevel>,
    pub target: Option<PriceLevel>,
    /// Only on sell dates.
    pub profit: Option<f64>,
    /// Percent (already multiplied by 100), only on sell dates.
    pub percent_profit: Option<f64>,
}

pub struct ChartController {
    config: ChunkviewConfig,
    windows: ChunkWindowManager,
    navigator: EventNavigator,
    symbol: Option<String>,
    book: TradeBook,
    cache: AnnotationCache,
    active_indicators: Vec<String>,
    selected_event: Option<usize>,
    dataset: Option<Arc<Dataset>>,
    window: ChunkWindow,
    viewport: Viewport,
    chunk: Option<Arc<MaterializedChunk>>,
    state: LoadState,
    generation: u64,
}

impl ChartController {
    /// Fails when `config` does not pass [`ChunkviewConfig::validate`].
    pub fn new(config: ChunkviewConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let windows = ChunkWindowManager::new(&config.chart);
        let navigator = EventNavigator::new(&config.chart);
        let chunk_size = config.chart.chunk_size;
        Ok(Self {
            config,
            windows,
            navigator,
            symbol: None,
            book: TradeBook::empty(),
            cache: AnnotationCache::new(),
            active_indicators: Vec::new(),
            selected_event: None,
            dataset: None,
            window: ChunkWindow::new(0, chunk_size),
            viewport: Viewport::new(0, 0),
            chunk: None,
            state: LoadState::Idle,
            generation: 0,
        })
    }

    pub fn handle(&mut self, trigger: Trigger) -> Vec<Effect> {
        match trigger {
            Trigger::InstrumentChanged {
                symbol,
                trades,
                closed_orders,
            } => self.on_instrument(symbol, trades, closed_orders),
            Trigger::IndicatorsChanged { active } => self.on_indicators(active),
            Trigger::EventSelected { index } => self.on_event(index),
            Trigger::ViewportDragged { viewport } => self.on_drag(viewport),
            Trigger::SeriesLoaded { generation, result } => self.on_loaded(generation, result),
        }
    }

    // ── Selection API ──

    pub fn set_instrument(
        &mut self,
        symbol: &str,
        trades: TradeSet,
        closed_orders: Option<Vec<ClosedOrder>>,
    ) -> Vec<Effect> {
        self.handle(Trigger::InstrumentChanged {
            symbol: symbol.to_string(),
            trades,
            closed_orders,
        })
    }

    pub fn set_active_indicators(&mut self, active: Vec<String>) -> Vec<Effect> {
        self.handle(Trigger::IndicatorsChanged { active })
    }

    pub fn select_event(&mut self, index: Option<usize>) -> Vec<Effect> {
        self.handle(Trigger::EventSelected { index })
    }

    pub fn on_viewport_dragged(&mut self, viewport: Viewport) -> Vec<Effect> {
        self.handle(Trigger::ViewportDragged { viewport })
    }

    /// Takes effect on the next event selection or load.
    pub fn set_test_mode(&mut self, enabled: bool) {
        self.config.settings.test_mode = enabled;
    }

    // ── Accessors ──

    pub fn config(&self) -> &ChunkviewConfig {
        &self.config
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading { .. })
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn window(&self) -> ChunkWindow {
        self.window
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn view(&self) -> View {
        View {
            window: self.window,
            viewport: self.viewport,
        }
    }

    pub fn chunk(&self) -> Option<&Arc<MaterializedChunk>> {
        self.chunk.as_ref()
    }

    pub fn selected_event(&self) -> Option<usize> {
        self.selected_event
    }

    pub fn active_indicators(&self) -> &[String] {
        &self.active_indicators
    }

    pub fn book(&self) -> &TradeBook {
        &self.book
    }

    pub fn annotation_cache(&self) -> &AnnotationCache {
        &self.cache
    }

    /// Tooltip facts for `date`, or `None` when it is not in the loaded series.
    pub fn describe(&self, date: NaiveDate) -> Option<DateSummary> {
        let dataset = self.dataset.as_ref()?;
        let point = dataset.point(dataset.index_of(date)?)?;
        let record = self
            .cache
            .get(self.book.version(), date)
            .unwrap_or_else(|| annotation::resolve(&self.book, &self.config.strategy, point, dataset.atr(date)));
        let sold = match self.book.event_at(date) {
            Some((EventSide::Sell, event)) => Some(event),
            _ => None,
        };
        Some(DateSummary {
            date,
            close: point.close,
            stoploss: record.stoploss,
            target: record.target,
            profit: sold.and_then(|e| e.profit),
            percent_profit: sold.map(|e| e.percent_profit * 100.0),
        })
    }

    // ── Trigger handlers ──

    fn on_instrument(
        &mut self,
        symbol: String,
        trades: TradeSet,
        closed_orders: Option<Vec<ClosedOrder>>,
    ) -> Vec<Effect> {
        info!(
            symbol = %symbol,
            events = trades.events.len(),
            holdings = trades.holdings.len(),
            closed_orders = closed_orders.as_ref().map_or(0, Vec::len),
            "instrument selected"
        );
        self.book = TradeBook::new(trades, closed_orders, &self.config.strategy);
        self.cache.invalidate();
        self.symbol = Some(symbol);
        vec![self.begin_fetch()]
    }

    fn on_indicators(&mut self, active: Vec<String>) -> Vec<Effect> {
        self.active_indicators = active;
        if self.symbol.is_none() {
            return Vec::new();
        }
        vec![self.begin_fetch()]
    }

    fn on_event(&mut self, index: Option<usize>) -> Vec<Effect> {
        self.selected_event = index;
        if self.state != LoadState::Ready {
            debug!(?index, "event selection recorded until the series loads");
            return Vec::new();
        }
        if index.is_some() {
            let view = self.initial_view();
            self.window = view.window;
            self.viewport = view.viewport;
        }
        self.render().map(Effect::Render).into_iter().collect()
    }

    fn on_drag(&mut self, viewport: Viewport) -> Vec<Effect> {
        if self.state != LoadState::Ready {
            return Vec::new();
        }
        let Some(len) = self.dataset.as_ref().map(|d| d.len()) else {
            return Vec::new();
        };
        let outcome = self.windows.on_viewport_change(self.window, viewport, len);
        self.viewport = outcome.viewport;
        match outcome.window {
            Some(window) => {
                self.window = window;
                self.render().map(Effect::Render).into_iter().collect()
            }
            None => vec![Effect::Viewport(outcome.viewport)],
        }
    }

    fn on_loaded(&mut self, generation: u64, result: Result<Dataset, FetchError>) -> Vec<Effect> {
        let pending = match &self.state {
            LoadState::Loading { generation: g, .. } => *g == generation,
            _ => false,
        };
        if !pending {
            warn!(
                generation,
                latest = self.generation,
                "dropping stale series response"
            );
            return Vec::new();
        }
        let symbol = self.symbol.clone().unwrap_or_default();

        match result {
            Ok(dataset) => {
                info!(
                    symbol = %symbol,
                    points = dataset.len(),
                    overlays = dataset.overlay_series_names().len(),
                    panels = dataset.panel_indicator_names().len(),
                    "series loaded"
                );
                // Records were resolved against the previous series' closes and ATR.
                self.cache.invalidate();
                self.dataset = Some(Arc::new(dataset));
                self.state = LoadState::Ready;
                let view = self.initial_view();
                self.window = view.window;
                self.viewport = view.viewport;
                self.render().map(Effect::Render).into_iter().collect()
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "series unavailable");
                let message = e.to_string();
                self.state = LoadState::Unavailable {
                    message: message.clone(),
                };
                vec![Effect::Unavailable { symbol, message }]
            }
        }
    }

    // ── Internals ──

    fn begin_fetch(&mut self) -> Effect {
        self.generation += 1;
        let symbol = self.symbol.clone().unwrap_or_default();
        self.dataset = None;
        self.chunk = None;
        self.state = LoadState::Loading {
            generation: self.generation,
            symbol: symbol.clone(),
        };
        Effect::Fetch(FetchRequest {
            generation: self.generation,
            symbol,
            indicators: self.config.indicator_options(&self.active_indicators),
            timeframe: self.config.strategy.timeframe,
        })
    }

    /// Event view when an event is selected and resolvable, otherwise the
    /// default view.
    fn initial_view(&self) -> View {
        let Some(dataset) = self.dataset.as_ref() else {
            return self.navigator.default_view(0);
        };
        let Some(index) = self.selected_event else {
            return self.navigator.default_view(dataset.len());
        };
        let centered = self
            .book
            .event(index)
            .ok_or(NavigationError::NoSuchEvent(index))
            .and_then(|event| {
                self.navigator
                    .center_on_event(dataset, event, self.config.settings.test_mode)
            });
        match centered {
            Ok(view) => view,
            Err(e) => {
                warn!(index, error = %e, "cannot center on event, showing latest data");
                self.navigator.default_view(dataset.len())
            }
        }
    }

    fn render(&mut self) -> Option<RenderFrame> {
        let dataset = self.dataset.as_ref()?;
        let selected = self.selected_event.and_then(|i| self.book.event(i));
        let mut annotator =
            Annotator::new(&self.book, &self.config.strategy, &mut self.cache).with_selected(selected);
        let chunk = Arc::new(self.windows.materialize(dataset, self.window, &mut annotator));
        self.chunk = Some(Arc::clone(&chunk));
        Some(RenderFrame {
            symbol: dataset.symbol().to_string(),
            window: self.window,
            viewport: self.viewport,
            chunk,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{PriceBar, PriceGraphPayload};
    use crate::domain::{Event, Holding};

    fn payload(n: usize) -> PriceGraphPayload {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        PriceGraphPayload::from_bars(
            (0..n)
                .map(|i| {
                    let close = 50.0 + (i % 7) as f64;
                    PriceBar {
                        date: (start + chrono::Duration::days(i as i64))
                            .format("%Y-%m-%d")
                            .to_string(),
                        open: close - 0.5,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                    }
                })
                .collect(),
        )
    }

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    fn loaded(n: usize, trades: TradeSet) -> ChartController {
        let mut c = ChartController::new(ChunkviewConfig::default()).unwrap();
        let effects = c.set_instrument("TST", trades, None);
        let Some(Effect::Fetch(req)) = effects.into_iter().next() else {
            panic!("expected a fetch");
        };
        let ds = Dataset::from_payload("TST", payload(n)).unwrap();
        c.handle(Trigger::SeriesLoaded {
            generation: req.generation,
            result: Ok(ds),
        });
        c
    }

    #[test]
    fn instrument_change_requests_fetch() {
        let mut c = ChartController::new(ChunkviewConfig::default()).unwrap();
        let effects = c.set_instrument("AAPL", TradeSet::default(), None);
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], Effect::Fetch(r) if r.symbol == "AAPL" && r.generation == 1));
        assert!(c.is_loading());
    }

    #[test]
    fn load_renders_default_view() {
        let c = loaded(1200, TradeSet::default());
        assert_eq!(c.state(), &LoadState::Ready);
        assert_eq!(c.window().start, 700);
        assert_eq!(c.viewport(), Viewport::new(375, 499));
        assert_eq!(c.chunk().unwrap().len(), 500);
    }

    #[test]
    fn event_selected_before_load_is_applied_on_load() {
        let trades = TradeSet {
            events: vec![Event::new(day(700), day(705))],
            holdings: vec![],
        };
        let mut c = ChartController::new(ChunkviewConfig::default()).unwrap();
        let req = match c.set_instrument("TST", trades, None).pop() {
            Some(Effect::Fetch(r)) => r,
            other => panic!("unexpected {other:?}"),
        };
        assert!(c.select_event(Some(0)).is_empty());
        let effects = c.handle(Trigger::SeriesLoaded {
            generation: req.generation,
            result: Ok(Dataset::from_payload("TST", payload(1000)).unwrap()),
        });
        let Some(Effect::Render(frame)) = effects.first() else {
            panic!("expected a render");
        };
        assert_eq!(frame.window.start, 453);
        assert_eq!(frame.viewport, Viewport::new(197, 302));
    }

    #[test]
    fn unresolvable_event_falls_back_to_default() {
        let trades = TradeSet {
            events: vec![Event::new(day(5000), day(5001))],
            holdings: vec![],
        };
        let mut c = loaded(1000, trades);
        let effects = c.select_event(Some(0));
        assert_eq!(effects.len(), 1);
        assert_eq!(c.window().start, 500);
    }

    #[test]
    fn deselecting_rerenders_in_place() {
        let trades = TradeSet {
            events: vec![Event::new(day(700), day(705))],
            holdings: vec![],
        };
        let mut c = loaded(1000, trades);
        c.select_event(Some(0));
        let view = c.view();
        let effects = c.select_event(None);
        assert!(matches!(effects.as_slice(), [Effect::Render(_)]));
        assert_eq!(c.view(), view);
    }

    #[test]
    fn drag_inside_thresholds_only_moves_brush() {
        let mut c = loaded(2000, TradeSet::default());
        let effects = c.on_viewport_dragged(Viewport::new(100, 200));
        assert_eq!(effects, vec![Effect::Viewport(Viewport::new(100, 200))]);
        assert_eq!(c.window().start, 1500);
    }

    #[test]
    fn drag_into_left_zone_shifts_and_renders() {
        let mut c = loaded(2000, TradeSet::default());
        let effects = c.on_viewport_dragged(Viewport::new(3, 80));
        let [Effect::Render(frame)] = effects.as_slice() else {
            panic!("expected a single render, got {effects:?}");
        };
        assert_eq!(frame.window.start, 1375);
        assert_eq!(frame.viewport, Viewport::new(128, 205));
    }

    #[test]
    fn drags_are_ignored_while_loading() {
        let mut c = ChartController::new(ChunkviewConfig::default()).unwrap();
        c.set_instrument("X", TradeSet::default(), None);
        assert!(c.on_viewport_dragged(Viewport::new(0, 10)).is_empty());
    }

    #[test]
    fn stale_generation_is_dropped() {
        let mut c = ChartController::new(ChunkviewConfig::default()).unwrap();
        c.set_instrument("OLD", TradeSet::default(), None);
        c.set_instrument("NEW", TradeSet::default(), None);
        let effects = c.handle(Trigger::SeriesLoaded {
            generation: 1,
            result: Ok(Dataset::from_payload("OLD", payload(10)).unwrap()),
        });
        assert!(effects.is_empty());
        assert!(c.is_loading());
        assert!(c.dataset().is_none());
    }

    #[test]
    fn failure_marks_unavailable() {
        let mut c = ChartController::new(ChunkviewConfig::default()).unwrap();
        c.set_instrument("GONE", TradeSet::default(), None);
        let effects = c.handle(Trigger::SeriesLoaded {
            generation: 1,
            result: Err(FetchError::NotFound {
                symbol: "GONE".into(),
            }),
        });
        assert!(matches!(&effects[0], Effect::Unavailable { symbol, .. } if symbol == "GONE"));
        assert!(matches!(c.state(), LoadState::Unavailable { .. }));
    }

    #[test]
    fn indicator_change_refetches_active_only() {
        let mut config = ChunkviewConfig::default();
        config
            .indicators
            .insert("RSI".into(), [("period".to_string(), 14.0)].into_iter().collect());
        config
            .indicators
            .insert("MACD".into(), [("fast".to_string(), 12.0)].into_iter().collect());
        let mut c = ChartController::new(config).unwrap();
        c.set_instrument("A", TradeSet::default(), None);
        let effects = c.set_active_indicators(vec!["RSI".into()]);
        let [Effect::Fetch(req)] = effects.as_slice() else {
            panic!("expected a fetch");
        };
        assert_eq!(req.generation, 2);
        assert_eq!(req.indicator_names(), vec!["RSI"]);
    }

    #[test]
    fn describe_reports_levels_and_profit() {
        let trades = TradeSet {
            events: vec![Event::new(day(3), day(9)).with_risk(10.0).with_profit(42.0, 0.05)],
            holdings: vec![Holding::new(day(20), Some(45.0))],
        };
        let c = loaded(30, trades);
        let buy = c.describe(day(3)).unwrap();
        assert!(buy.stoploss.is_some());
        assert_eq!(buy.profit, None);
        let sell = c.describe(day(9)).unwrap();
        assert_eq!(sell.profit, Some(42.0));
        assert!((sell.percent_profit.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(c.describe(day(20)).unwrap().stoploss.unwrap().price, 45.0);
        assert!(c.describe(day(400)).is_none());
    }

    #[test]
    fn refetched_series_re_resolves_annotations() {
        let trades = TradeSet {
            events: vec![Event::new(day(3), day(9)).with_risk(10.0)],
            holdings: vec![],
        };
        let mut c = loaded(30, trades);
        let first = c.chunk().unwrap().rows[3].stoploss.unwrap();
        assert!((first.0 - 5.3).abs() < 1e-9);

        // Same trades, new series: every price doubles.
        let Some(Effect::Fetch(req)) = c.set_active_indicators(vec!["SMA".into()]).pop() else {
            panic!("expected a fetch");
        };
        let mut doubled = payload(30);
        for bar in &mut doubled.price {
            bar.open *= 2.0;
            bar.high *= 2.0;
            bar.low *= 2.0;
            bar.close *= 2.0;
        }
        c.handle(Trigger::SeriesLoaded {
            generation: req.generation,
            result: Ok(Dataset::from_payload("TST", doubled).unwrap()),
        });

        let band = c.chunk().unwrap().rows[3].stoploss.unwrap();
        assert!((band.0 - 10.6).abs() < 1e-9, "band {band:?} still uses the old close");
        let stop = c.annotation_cache().get(c.book().version(), day(3)).unwrap().stoploss.unwrap();
        assert!((stop.price - 95.4).abs() < 1e-9);
        assert!((stop.percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_chart_config_is_rejected() {
        let mut config = ChunkviewConfig::default();
        config.chart.chunk_size = 0;
        assert!(matches!(ChartController::new(config), Err(ConfigError::Invalid(_))));
    }
}
