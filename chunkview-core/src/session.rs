//! Chart session: a controller wired to a background fetch worker.
//!
//! `dispatch` runs a trigger through the controller and forwards any fetch it
//! asks for to the worker; `poll` and `wait_for_frame` feed worker responses
//! back in as [`Trigger::SeriesLoaded`].

use crate::config::{ChunkviewConfig, ConfigError};
use crate::controller::{ChartController, Effect, Trigger};
use crate::source::{spawn_fetch_worker, FetchCommand, FetchError, FetchResponse, SeriesSource};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("spawn fetch worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub struct ChartSession {
    controller: ChartController,
    cmd_tx: Sender<FetchCommand>,
    resp_rx: Receiver<FetchResponse>,
    worker: Option<JoinHandle<()>>,
}

impl ChartSession {
    /// Validates `config` before the worker thread is started.
    pub fn spawn(config: ChunkviewConfig, source: Arc<dyn SeriesSource>) -> Result<Self, SessionError> {
        let controller = ChartController::new(config)?;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        debug!(source = source.name(), "starting chart session");
        let worker = spawn_fetch_worker(source, cmd_rx, resp_tx)?;
        Ok(Self {
            controller,
            cmd_tx,
            resp_rx,
            worker: Some(worker),
        })
    }

    pub fn controller(&self) -> &ChartController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ChartController {
        &mut self.controller
    }

    /// Handle `trigger`, sending any requested fetch to the worker.
    ///
    /// The returned effects include the `Fetch` itself so callers can log it.
    pub fn dispatch(&mut self, trigger: Trigger) -> Vec<Effect> {
        let effects = self.controller.handle(trigger);
        let mut out = Vec::with_capacity(effects.len());
        for effect in effects {
            if let Effect::Fetch(request) = &effect {
                let generation = request.generation;
                if self.cmd_tx.send(FetchCommand::Fetch(request.clone())).is_err() {
                    warn!(generation, "fetch worker gone");
                    out.push(effect);
                    out.extend(self.controller.handle(Trigger::SeriesLoaded {
                        generation,
                        result: Err(FetchError::WorkerGone),
                    }));
                    continue;
                }
            }
            out.push(effect);
        }
        out
    }

    /// Feed every response that has already arrived.
    pub fn poll(&mut self) -> Vec<Effect> {
        let mut out = Vec::new();
        loop {
            match self.resp_rx.try_recv() {
                Ok(response) => out.extend(self.deliver(response)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    out.extend(self.worker_gone());
                    break;
                }
            }
        }
        out
    }

    /// Block until the pending load renders or fails, or `timeout` passes.
    /// Stale responses that arrive meanwhile are consumed and dropped.
    pub fn wait_for_frame(&mut self, timeout: Duration) -> Vec<Effect> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::new();
        while self.controller.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(?timeout, "timed out waiting for series");
                break;
            }
            match self.resp_rx.recv_timeout(remaining) {
                Ok(response) => out.extend(self.deliver(response)),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(?timeout, "timed out waiting for series");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    out.extend(self.worker_gone());
                    break;
                }
            }
        }
        out
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(FetchCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("fetch worker panicked");
            }
        }
    }

    fn deliver(&mut self, response: FetchResponse) -> Vec<Effect> {
        debug!(
            symbol = %response.symbol,
            generation = response.generation,
            ok = response.result.is_ok(),
            "series response"
        );
        self.controller.handle(Trigger::SeriesLoaded {
            generation: response.generation,
            result: response.result,
        })
    }

    fn worker_gone(&mut self) -> Vec<Effect> {
        if !self.controller.is_loading() {
            return Vec::new();
        }
        let generation = self.controller.generation();
        self.controller.handle(Trigger::SeriesLoaded {
            generation,
            result: Err(FetchError::WorkerGone),
        })
    }
}

impl Drop for ChartSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
