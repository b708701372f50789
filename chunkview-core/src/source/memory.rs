//! In-memory source for tests and embedding.

use super::{FetchError, FetchRequest, SeriesSource};
use crate::dataset::PriceGraphPayload;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Serves canned payloads and records every request it sees.
#[derive(Default)]
pub struct MemorySource {
    payloads: Mutex<HashMap<String, PriceGraphPayload>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, symbol: &str, payload: PriceGraphPayload) {
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.insert(symbol.to_string(), payload);
        }
    }

    /// Make every fetch of `symbol` fail with an I/O error.
    pub fn fail(&self, symbol: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(symbol.to_string());
        }
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SeriesSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<PriceGraphPayload, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&request.symbol))
            .unwrap_or(false);
        if failing {
            return Err(FetchError::Io {
                path: format!("memory://{}", request.symbol).into(),
                message: "simulated failure".into(),
            });
        }
        let payloads = self
            .payloads
            .lock()
            .map_err(|_| FetchError::Malformed("memory source poisoned".into()))?;
        let mut payload = payloads
            .get(&request.symbol)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                symbol: request.symbol.clone(),
            })?;
        payload.retain_indicators(&request.indicator_names());
        Ok(payload)
    }
}
