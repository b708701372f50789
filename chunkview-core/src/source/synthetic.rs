//! Deterministic synthetic price graphs for demos and tests.
//!
//! The walk is seeded from a BLAKE3 hash of the symbol, so the same symbol
//! always yields the same series. Requested indicators get a simple moving
//! average of the close, one value per period parameter.

use super::{FetchError, FetchRequest, SeriesSource};
use crate::dataset::{PriceBar, PriceGraphPayload};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SyntheticSource {
    start: NaiveDate,
    days: usize,
}

impl SyntheticSource {
    /// `days` trading days starting at `start` (weekends skipped).
    pub fn new(start: NaiveDate, days: usize) -> Self {
        Self { start, days }
    }

    pub fn generate(&self, symbol: &str) -> PriceGraphPayload {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let mut payload = PriceGraphPayload::default();
        let mut price = 100.0_f64;
        let mut current = self.start;

        while payload.price.len() < self.days {
            let weekday = current.weekday();
            if weekday == Weekday::Sat || weekday == Weekday::Sun {
                current += chrono::Duration::days(1);
                continue;
            }

            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64) as f64;
            let date = current.format("%Y-%m-%d").to_string();

            payload.insert_volume(&date, volume);
            payload.insert_atr(&date, high - low);
            payload.price.push(PriceBar {
                date,
                open,
                high,
                low,
                close,
            });

            price = close;
            current += chrono::Duration::days(1);
        }
        payload
    }
}

fn moving_average(closes: &[f64], period: usize, i: usize) -> Option<f64> {
    if period == 0 || i + 1 < period {
        return None;
    }
    let window = &closes[i + 1 - period..=i];
    Some(window.iter().sum::<f64>() / period as f64)
}

impl SeriesSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<PriceGraphPayload, FetchError> {
        let mut payload = self.generate(&request.symbol);
        let closes: Vec<f64> = payload.price.iter().map(|b| b.close).collect();
        let dates: Vec<String> = payload.price.iter().map(|b| b.date.clone()).collect();

        for (name, params) in &request.indicators {
            let period = params.get("period").copied().unwrap_or(14.0).max(1.0) as usize;
            let graph = format!("{}{period}", name.to_lowercase());
            for (i, date) in dates.iter().enumerate() {
                payload.insert_indicator(name, &graph, date, moving_average(&closes, period, i));
            }
        }
        Ok(payload)
    }
}
