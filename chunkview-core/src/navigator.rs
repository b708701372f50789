//! Event navigator: initial window/brush placement.
//!
//! Two entry points: the default view shows the most recent quarter chunk, and
//! event centering places a buy/sell pair in the middle of the window with a
//! brush padded by `event_margin` on both sides.

use crate::config::ChartConfig;
use crate::dataset::Dataset;
use crate::domain::Event;
use crate::window::{ChunkWindow, Viewport};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    #[error("{which} date {date} is not in the loaded series")]
    DateNotLoaded { which: &'static str, date: NaiveDate },

    #[error("event sells on {sell} before it buys on {buy}")]
    Inverted { buy: NaiveDate, sell: NaiveDate },

    #[error("no event at index {0}")]
    NoSuchEvent(usize),

    #[error("cannot navigate an empty series")]
    EmptyDataset,
}

/// A window plus the brush inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub window: ChunkWindow,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventNavigator {
    chunk_size: usize,
    min_threshold: usize,
    max_threshold: usize,
    event_margin: f64,
}

impl EventNavigator {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            min_threshold: config.min_threshold(),
            max_threshold: config.max_threshold(),
            event_margin: config.event_margin,
        }
    }

    /// Most recent data: the last chunk with the brush over its final quarter,
    /// or the whole series with the brush over its second half.
    pub fn default_view(&self, len: usize) -> View {
        let chunk = self.chunk_size;
        if len > chunk {
            View {
                window: ChunkWindow::new(len - chunk, chunk),
                viewport: Viewport::new(chunk - chunk / 4, chunk - 1),
            }
        } else {
            View {
                window: ChunkWindow::new(0, chunk),
                viewport: Viewport::new(len / 2, len.saturating_sub(1)),
            }
        }
    }

    /// Center the window on `event`, resolving its dates against `dataset`.
    pub fn center_on_event(&self, dataset: &Dataset, event: &Event, test_mode: bool) -> Result<View, NavigationError> {
        if dataset.is_empty() {
            return Err(NavigationError::EmptyDataset);
        }
        let buy = dataset
            .index_of(event.buy_date)
            .ok_or(NavigationError::DateNotLoaded {
                which: "buy",
                date: event.buy_date,
            })?;
        let sell = dataset
            .index_of(event.sell_date)
            .ok_or(NavigationError::DateNotLoaded {
                which: "sell",
                date: event.sell_date,
            })?;
        if sell < buy {
            return Err(NavigationError::Inverted {
                buy: event.buy_date,
                sell: event.sell_date,
            });
        }
        Ok(self.center_on_indices(dataset.len(), buy, sell, test_mode))
    }

    /// Index form of [`center_on_event`](Self::center_on_event). Requires
    /// `buy <= sell < len`.
    ///
    /// The window starts `floor((chunk - span) / 2)` before the buy, which may
    /// leave a short trailing window near the end of the series; the brush end
    /// is then held two dates inside it.
    pub fn center_on_indices(&self, len: usize, buy: usize, sell: usize, test_mode: bool) -> View {
        let chunk = self.chunk_size as i64;
        let len_i = len as i64;
        let (buy_i, sell_i) = (buy as i64, sell as i64);

        let (start, lo, hi, brush_margin) = if len > self.chunk_size {
            let chunk_margin = (chunk - (sell_i - buy_i)).div_euclid(2);
            let start = (buy_i - chunk_margin).max(0);
            let brush_margin = (self.chunk_size as f64 * self.event_margin).floor() as i64;
            (start, self.min_threshold as i64, self.max_threshold as i64, brush_margin)
        } else {
            let brush_margin = (len as f64 * self.event_margin).floor() as i64;
            (0, 0, len_i - 1, brush_margin)
        };

        let mut vs = (buy_i - start - brush_margin).max(lo);
        let mut ve = if test_mode {
            (buy_i - start).min(hi)
        } else {
            (sell_i - start + brush_margin).min(hi)
        };
        vs = vs.min(hi);
        ve = ve.max(lo);
        if len_i - start < chunk {
            ve = ve.min(len_i - start - 2);
        }

        // Collapsed brush (buy at the very start in test mode, tiny series):
        // widen to the narrowest valid range.
        let upper = hi.min(len_i - start - 1);
        if ve <= vs {
            ve = (vs + 1).min(upper);
            vs = vs.min(ve - 1).max(0);
        }

        View {
            window: ChunkWindow::new(start as usize, self.chunk_size),
            viewport: Viewport::new(vs.max(0) as usize, ve.max(0) as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> EventNavigator {
        EventNavigator::new(&ChartConfig::default())
    }

    #[test]
    fn default_view_long_series() {
        let view = nav().default_view(1000);
        assert_eq!(view.window.start, 500);
        assert_eq!(view.viewport, Viewport::new(375, 499));
    }

    #[test]
    fn default_view_short_series() {
        let view = nav().default_view(300);
        assert_eq!(view.window.start, 0);
        assert_eq!(view.window.len_within(300), 300);
        assert_eq!(view.viewport, Viewport::new(150, 299));
    }

    #[test]
    fn default_view_single_point() {
        let view = nav().default_view(1);
        assert_eq!(view.viewport, Viewport::new(0, 0));
    }

    #[test]
    fn centers_short_event() {
        let view = nav().center_on_indices(1000, 700, 705, false);
        assert_eq!(view.window.start, 453);
        assert_eq!(view.viewport, Viewport::new(197, 302));
    }

    #[test]
    fn test_mode_ends_on_buy() {
        let view = nav().center_on_indices(1000, 700, 705, true);
        assert_eq!(view.window.start, 453);
        assert_eq!(view.viewport, Viewport::new(197, 247));
    }

    #[test]
    fn short_series_uses_whole_range() {
        let view = nav().center_on_indices(300, 100, 120, false);
        assert_eq!(view.window.start, 0);
        // margin = floor(300 * 0.1) = 30
        assert_eq!(view.viewport, Viewport::new(70, 150));
    }

    #[test]
    fn short_series_event_at_end_stays_inside() {
        let view = nav().center_on_indices(300, 280, 299, false);
        assert!(view.viewport.end <= 298);
        assert!(view.viewport.start < view.viewport.end);
    }

    #[test]
    fn event_near_series_start_clamps_to_dead_zone() {
        let view = nav().center_on_indices(1000, 3, 10, false);
        assert_eq!(view.window.start, 0);
        assert_eq!(view.viewport.start, 12);
        assert_eq!(view.viewport.end, 60);
    }

    #[test]
    fn test_mode_at_series_start_is_repaired() {
        let view = nav().center_on_indices(1000, 2, 10, true);
        assert_eq!(view.window.start, 0);
        assert!(view.viewport.start < view.viewport.end);
        assert_eq!(view.viewport, Viewport::new(12, 13));
    }

    #[test]
    fn event_near_series_end_leaves_short_window() {
        let view = nav().center_on_indices(1000, 990, 995, false);
        assert_eq!(view.window.start, 743);
        // 1000 - 743 - 2
        assert!(view.viewport.end <= 255);
        assert!(view.viewport.start < view.viewport.end);
    }
}
