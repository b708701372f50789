//! Overlay vs. panel classification of indicator names.

use serde::{Deserialize, Serialize};

/// Indicators drawn on the price axis. Anything else gets its own panel.
pub const OVERLAY_INDICATORS: &[&str] = &[
    "SMA",
    "GC",
    "EMA",
    "Structure",
    "Pullback",
    "Breakout",
    "ATR",
    "Swing",
    "Divergence",
    "Trend",
    "Candle",
    "High",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Overlay,
    Panel,
}

impl IndicatorKind {
    pub fn classify(name: &str) -> Self {
        if OVERLAY_INDICATORS.contains(&name) {
            IndicatorKind::Overlay
        } else {
            IndicatorKind::Panel
        }
    }

    pub fn is_overlay(self) -> bool {
        self == IndicatorKind::Overlay
    }
}
