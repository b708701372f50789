//! SeriesPoint: one daily bar of the fetched price series.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLC bar for a single calendar date.
///
/// Points are immutable once fetched. Volume, ATR and indicator values live in
/// the dataset's side tables, keyed by the same date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl SeriesPoint {
    /// True when the bar closed at or above its open (green candle).
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// Which side of the swing a pivot marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

/// A swing pivot supplied alongside the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub kind: PivotKind,
    pub price: f64,
    /// Date on which the pivot became known, if reported.
    pub realized: Option<NaiveDate>,
}

/// Parse a series date.
///
/// Accepts plain `YYYY-MM-DD` as well as RFC 3339 timestamps (the upstream
/// service emits `2021-03-04T00:00:00.000Z`); timestamps map to their UTC date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// Serde adapter for dates that may arrive in either accepted format.
pub mod flex_date {
    use super::parse_date;
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw).ok_or_else(|| de::Error::custom(format!("unrecognised date '{raw}'")))
    }

    /// Same as the parent module, for `Option<NaiveDate>` fields.
    pub mod option {
        use super::parse_date;
        use chrono::NaiveDate;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<NaiveDate>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.trim().is_empty() => parse_date(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("unrecognised date '{raw}'"))),
                _ => Ok(None),
            }
        }
    }
}
