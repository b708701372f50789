//! Chunk window manager.
//!
//! Only a fixed-size slice of the dataset (the chunk window) is materialized
//! for rendering at any time. The visible brush range (the [`Viewport`]) lives
//! inside that window; dragging it into the outer `scroll_threshold` band on
//! either side shifts the window by `shift_fraction` of a chunk.

pub mod chunk;

pub use chunk::{Band, Marker, MaterializedChunk, PanelRow, PriceRow, VolumeRow};

use crate::config::ChartConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `[start, start + chunk_size)` on the dataset's date axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub start: usize,
    pub chunk_size: usize,
}

impl ChunkWindow {
    pub fn new(start: usize, chunk_size: usize) -> Self {
        Self { start, chunk_size }
    }

    /// Exclusive end, truncated at the dataset length.
    pub fn end(&self, len: usize) -> usize {
        (self.start + self.chunk_size).min(len)
    }

    /// Number of dataset points that actually fall inside the window.
    pub fn len_within(&self, len: usize) -> usize {
        self.end(len).saturating_sub(self.start)
    }

    /// Largest start a scrolled window may take.
    pub fn max_start(len: usize, chunk_size: usize) -> usize {
        len.saturating_sub(chunk_size)
    }
}

/// Visible brush range `[start, end]`, relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub start: usize,
    pub end: usize,
}

impl Viewport {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Clamp both ends into `[lo, hi]`, then widen to at least one step if
    /// clamping collapsed the range.
    pub fn clamp(self, lo: usize, hi: usize) -> Self {
        let start = self.start.clamp(lo, hi.max(lo));
        let end = self.end.clamp(lo, hi.max(lo));
        Self { start, end }.repaired(hi)
    }

    /// Guarantee `start < end` whenever `hi > 0`.
    pub(crate) fn repaired(self, hi: usize) -> Self {
        if self.end > self.start {
            return self;
        }
        let end = (self.start + 1).min(hi);
        let start = self.start.min(end.saturating_sub(1));
        Self { start, end }
    }
}

/// Result of feeding a brush change to the window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// The new window, when the change triggered a shift.
    pub window: Option<ChunkWindow>,
    pub viewport: Viewport,
}

impl ScrollOutcome {
    pub fn shifted(&self) -> bool {
        self.window.is_some()
    }
}

/// Owns the windowing constants and performs scroll-triggered shifts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkWindowManager {
    chunk_size: usize,
    min_threshold: usize,
    max_threshold: usize,
    shift_step: usize,
}

impl ChunkWindowManager {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            min_threshold: config.min_threshold(),
            max_threshold: config.max_threshold(),
            shift_step: config.shift_step().max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn min_threshold(&self) -> usize {
        self.min_threshold
    }

    pub fn max_threshold(&self) -> usize {
        self.max_threshold
    }

    pub fn shift_step(&self) -> usize {
        self.shift_step
    }

    /// React to the user dragging the brush to `viewport` while `window` is loaded.
    ///
    /// Shifts left when the brush enters the leading dead zone and the window
    /// is not at the series start, shifts right symmetrically, and otherwise
    /// leaves the window alone. After a shift the brush is translated by the
    /// distance actually moved so the same dates stay visible, then clamped
    /// into the thresholds.
    pub fn on_viewport_change(&self, window: ChunkWindow, viewport: Viewport, len: usize) -> ScrollOutcome {
        let max_start = ChunkWindow::max_start(len, self.chunk_size);
        let (lo, hi) = (self.min_threshold, self.max_threshold);

        if viewport.start < lo && window.start > 0 {
            let new_start = window.start.saturating_sub(self.shift_step).min(max_start);
            let shift = window.start - new_start;
            let moved = Viewport::new(viewport.start + shift, viewport.end + shift).clamp(lo, hi);
            debug!(from = window.start, to = new_start, shift, "chunk shifted left");
            return ScrollOutcome {
                window: Some(ChunkWindow::new(new_start, self.chunk_size)),
                viewport: moved,
            };
        }

        if viewport.end > hi && window.start < max_start {
            let new_start = (window.start + self.shift_step).min(max_start);
            let shift = new_start - window.start;
            let moved = Viewport::new(
                viewport.start.saturating_sub(shift),
                viewport.end.saturating_sub(shift),
            )
            .clamp(lo, hi);
            debug!(from = window.start, to = new_start, shift, "chunk shifted right");
            return ScrollOutcome {
                window: Some(ChunkWindow::new(new_start, self.chunk_size)),
                viewport: moved,
            };
        }

        let last = window.len_within(len).saturating_sub(1);
        ScrollOutcome {
            window: None,
            viewport: viewport.clamp(0, last),
        }
    }
}
