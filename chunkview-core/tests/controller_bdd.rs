//! BDD tests for the chart session.
//!
//! These tests drive a real fetch worker over an in-memory source:
//! - Loading an instrument renders the latest data
//! - Selecting an event re-centers the chunk
//! - Scrolling into a dead zone shifts the chunk
//! - Stale and failed fetches
//! - Indicator selection

use chrono::NaiveDate;
use chunkview_core::controller::{Effect, LoadState, Trigger};
use chunkview_core::dataset::{PriceBar, PriceGraphPayload};
use chunkview_core::domain::{Event, TradeSet};
use chunkview_core::source::{MemorySource, SeriesSource};
use chunkview_core::window::{Marker, Viewport};
use chunkview_core::{ChartSession, ChunkviewConfig};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap() + chrono::Duration::days(i as i64)
}

fn make_payload(n: usize) -> PriceGraphPayload {
    let mut payload = PriceGraphPayload::from_bars(
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.05).sin() * 5.0;
                PriceBar {
                    date: day(i).format("%Y-%m-%d").to_string(),
                    open: close - 0.2,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                }
            })
            .collect(),
    );
    for i in 0..n {
        let date = day(i).format("%Y-%m-%d").to_string();
        payload.insert_indicator("SMA", "sma10", &date, Some(100.0));
        payload.insert_indicator("RSI", "rsi", &date, Some(50.0));
        payload.insert_volume(&date, 1_000.0 + i as f64);
    }
    payload
}

fn session_with(source: Arc<MemorySource>) -> ChartSession {
    ChartSession::spawn(ChunkviewConfig::default(), source).unwrap()
}

fn last_render(effects: &[Effect]) -> Option<&chunkview_core::RenderFrame> {
    effects.iter().rev().find_map(|e| match e {
        Effect::Render(frame) => Some(frame),
        _ => None,
    })
}

#[test]
fn bdd_scenario_loading_an_instrument_renders_latest_data() {
    // GIVEN a source with 1000 daily bars for SPY
    let source = Arc::new(MemorySource::new());
    source.insert("SPY", make_payload(1000));
    let mut session = session_with(source);

    // WHEN SPY is selected and the fetch completes
    let effects = session.dispatch(Trigger::InstrumentChanged {
        symbol: "SPY".into(),
        trades: TradeSet::default(),
        closed_orders: None,
    });
    assert!(matches!(effects.as_slice(), [Effect::Fetch(_)]));
    let effects = session.wait_for_frame(WAIT);

    // THEN the last chunk is rendered with the brush over its final quarter
    let frame = last_render(&effects).expect("render after load");
    assert_eq!(frame.symbol, "SPY");
    assert_eq!(frame.window.start, 500);
    assert_eq!(frame.viewport, Viewport::new(375, 499));
    assert_eq!(frame.chunk.len(), 500);
    assert_eq!(session.controller().state(), &LoadState::Ready);
}

#[test]
fn bdd_scenario_selecting_an_event_recenters_the_chunk() {
    // GIVEN a loaded instrument with one short event
    let source = Arc::new(MemorySource::new());
    source.insert("SPY", make_payload(1000));
    let mut session = session_with(source);
    let trades = TradeSet {
        events: vec![Event::new(day(700), day(705)).with_risk(3.0)],
        holdings: vec![],
    };
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "SPY".into(),
        trades,
        closed_orders: None,
    });
    session.wait_for_frame(WAIT);

    // WHEN the event is selected
    let effects = session.dispatch(Trigger::EventSelected { index: Some(0) });

    // THEN the window centers on it and the buy/sell markers are highlighted
    let frame = last_render(&effects).expect("render after selection");
    assert_eq!(frame.window.start, 453);
    assert_eq!(frame.viewport, Viewport::new(197, 302));
    let buy_row = frame.chunk.row(day(700)).unwrap();
    assert_eq!(buy_row.marker, Some(Marker::Buy { selected: true }));
    assert!(buy_row.stoploss.is_some());
    let sell_row = frame.chunk.row(day(705)).unwrap();
    assert_eq!(sell_row.marker, Some(Marker::Sell { selected: true }));
}

#[test]
fn bdd_scenario_scrolling_into_the_dead_zone_shifts_the_chunk() {
    // GIVEN the latest chunk of a 2000-bar series is loaded
    let source = Arc::new(MemorySource::new());
    source.insert("QQQ", make_payload(2000));
    let mut session = session_with(source);
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "QQQ".into(),
        trades: TradeSet::default(),
        closed_orders: None,
    });
    session.wait_for_frame(WAIT);

    // WHEN the brush is dragged into the left dead zone
    let effects = session.dispatch(Trigger::ViewportDragged {
        viewport: Viewport::new(5, 100),
    });

    // THEN the chunk moves back a quarter and the same dates stay under the brush
    let frame = last_render(&effects).expect("render after shift");
    assert_eq!(frame.window.start, 1375);
    assert_eq!(frame.viewport, Viewport::new(130, 225));
    assert_eq!(frame.chunk.first_date(), Some(day(1375)));

    // AND a drag inside the thresholds only moves the brush
    let effects = session.dispatch(Trigger::ViewportDragged {
        viewport: Viewport::new(200, 300),
    });
    assert_eq!(effects, vec![Effect::Viewport(Viewport::new(200, 300))]);
    assert_eq!(session.controller().window().start, 1375);
}

#[test]
fn bdd_scenario_only_the_latest_instrument_is_installed() {
    // GIVEN two instruments
    let source = Arc::new(MemorySource::new());
    source.insert("OLD", make_payload(300));
    source.insert("NEW", make_payload(600));
    let mut session = session_with(source);

    // WHEN both are selected back to back
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "OLD".into(),
        trades: TradeSet::default(),
        closed_orders: None,
    });
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "NEW".into(),
        trades: TradeSet::default(),
        closed_orders: None,
    });
    let effects = session.wait_for_frame(WAIT);

    // THEN only NEW is rendered
    let renders: Vec<_> = effects
        .iter()
        .filter_map(|e| match e {
            Effect::Render(f) => Some(f.symbol.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(renders, vec!["NEW"]);
    assert_eq!(session.controller().dataset().unwrap().len(), 600);
}

#[test]
fn bdd_scenario_failed_fetch_marks_chart_unavailable() {
    // GIVEN a source that fails for FAIL
    let source = Arc::new(MemorySource::new());
    source.fail("FAIL");
    let mut session = session_with(source);

    // WHEN FAIL is selected
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "FAIL".into(),
        trades: TradeSet::default(),
        closed_orders: None,
    });
    let effects = session.wait_for_frame(WAIT);

    // THEN the chart reports the failure and nothing is rendered
    assert!(matches!(
        effects.as_slice(),
        [Effect::Unavailable { symbol, .. }] if symbol == "FAIL"
    ));
    assert!(matches!(
        session.controller().state(),
        LoadState::Unavailable { .. }
    ));
    assert!(session.controller().chunk().is_none());
}

#[test]
fn bdd_scenario_indicator_change_refetches_only_active_indicators() {
    // GIVEN a loaded instrument whose source offers SMA and RSI
    let source = Arc::new(MemorySource::new());
    source.insert("SPY", make_payload(400));
    let mut session = session_with(Arc::clone(&source));
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "SPY".into(),
        trades: TradeSet::default(),
        closed_orders: None,
    });
    session.wait_for_frame(WAIT);

    // WHEN only SMA is activated
    session.dispatch(Trigger::IndicatorsChanged {
        active: vec!["SMA".into()],
    });
    let effects = session.wait_for_frame(WAIT);

    // THEN the fetch asked for SMA alone and the overlay is materialized
    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].indicators.is_empty());
    assert_eq!(requests[1].indicator_names(), vec!["SMA"]);
    let frame = last_render(&effects).expect("render after indicator change");
    assert_eq!(frame.chunk.overlay_names, vec!["sma10"]);
    assert!(frame.chunk.panels.is_empty());
    assert_eq!(frame.chunk.rows[0].overlays.get("sma10"), Some(&100.0));
}

#[test]
fn bdd_scenario_describe_a_sell_date() {
    // GIVEN a loaded instrument with a profitable event
    let source = Arc::new(MemorySource::new());
    source.insert("SPY", make_payload(100));
    let mut session = session_with(source);
    let trades = TradeSet {
        events: vec![Event::new(day(10), day(20)).with_profit(250.0, 0.042)],
        holdings: vec![],
    };
    session.dispatch(Trigger::InstrumentChanged {
        symbol: "SPY".into(),
        trades,
        closed_orders: None,
    });
    session.wait_for_frame(WAIT);

    // WHEN the sell date is described
    let summary = session.controller().describe(day(20)).unwrap();

    // THEN the profit is reported in dollars and percent
    assert_eq!(summary.profit, Some(250.0));
    assert!((summary.percent_profit.unwrap() - 4.2).abs() < 1e-9);
    assert!(summary.stoploss.is_none());
}

#[test]
fn memory_source_is_a_series_source() {
    let source: Arc<dyn SeriesSource> = Arc::new(MemorySource::new());
    assert_eq!(source.name(), "memory");
}
