//! Chunkview Core: chunked-viewport controller for long price series.
//!
//! This crate owns everything between a fetched series and the rendering layer:
//! - Domain types (series points, events, holdings, closed orders)
//! - Dataset cache with date lookup and overlay/panel classification
//! - Chunk window manager (infinite-scroll chunk shifting, materialization)
//! - Event navigator (default view, centering on a buy/sell pair)
//! - Annotation resolver with a versioned per-date cache
//! - Controller driven by typed triggers, plus a background fetch worker

pub mod annotation;
pub mod config;
pub mod controller;
pub mod dataset;
pub mod domain;
pub mod navigator;
pub mod session;
pub mod source;
pub mod window;

pub use annotation::{AnnotationCache, AnnotationRecord, Annotator, PriceLevel, TradeBook, TradeSetVersion};
pub use config::{ChartConfig, ChartSettings, ChunkviewConfig, ConfigError, StrategyOptions, Timeframe};
pub use controller::{ChartController, DateSummary, Effect, LoadState, RenderFrame, Trigger};
pub use dataset::{Dataset, DatasetError, IndicatorKind, PriceGraphPayload};
pub use domain::{ClosedOrder, Event, Holding, Pivot, PivotKind, SeriesPoint, StoplossTarget, TradeSet};
pub use navigator::{EventNavigator, NavigationError, View};
pub use session::{ChartSession, SessionError};
pub use source::{FetchError, FetchRequest, SeriesSource};
pub use window::{Band, ChunkWindow, ChunkWindowManager, MaterializedChunk, ScrollOutcome, Viewport};
