//! Background fetch thread.
//!
//! Communication with the controller thread is via `mpsc` channels. The worker
//! serves requests in order and tags every response with the generation of
//! the request that produced it; deciding whether a response is stale is the
//! controller's job.

use super::{load_dataset, FetchError, FetchRequest, SeriesSource};
use crate::dataset::Dataset;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Commands sent from the controller side to the worker.
#[derive(Debug)]
pub enum FetchCommand {
    Fetch(FetchRequest),
    Shutdown,
}

/// Responses sent from the worker back to the controller side.
#[derive(Debug)]
pub struct FetchResponse {
    pub generation: u64,
    pub symbol: String,
    pub result: Result<Dataset, FetchError>,
}

/// Spawn the fetch worker thread.
pub fn spawn_fetch_worker(
    source: Arc<dyn SeriesSource>,
    rx: Receiver<FetchCommand>,
    tx: Sender<FetchResponse>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chunkview-fetch".into())
        .spawn(move || worker_loop(source, rx, tx))
}

fn worker_loop(source: Arc<dyn SeriesSource>, rx: Receiver<FetchCommand>, tx: Sender<FetchResponse>) {
    loop {
        match rx.recv() {
            Ok(FetchCommand::Shutdown) | Err(_) => break,
            Ok(FetchCommand::Fetch(request)) => {
                debug!(
                    source = source.name(),
                    symbol = %request.symbol,
                    generation = request.generation,
                    "fetching series"
                );
                let result = load_dataset(source.as_ref(), &request);
                if let Err(e) = &result {
                    warn!(symbol = %request.symbol, error = %e, "fetch failed");
                }
                let response = FetchResponse {
                    generation: request.generation,
                    symbol: request.symbol,
                    result,
                };
                if tx.send(response).is_err() {
                    // Receiver dropped: nobody is listening any more.
                    break;
                }
            }
        }
    }
}
