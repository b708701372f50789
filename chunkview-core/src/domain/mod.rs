//! Domain types for chunkview

pub mod series;
pub mod trade;

pub use series::{parse_date, Pivot, PivotKind, SeriesPoint};
pub use trade::{ClosedOrder, Event, Holding, StoplossTarget, TradeSet};

/// Symbol type alias
pub type Symbol = String;
