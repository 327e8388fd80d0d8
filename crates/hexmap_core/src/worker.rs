//! Single background worker that fills the hexagon cache off the UI thread.
//!
//! Jobs carry a sequence number. The worker only ever runs the newest job
//! waiting in its queue; older queued jobs are dropped unrun. Completed jobs
//! are reported back with their sequence number so the coordinator can
//! ignore results it no longer wants.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use h3o::Resolution;
use tracing::{debug, error};

use crate::cache::HexagonCache;
use crate::error::TilingError;
use crate::tiler::HexagonSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileJob {
    pub seq: u64,
    pub resolution: Resolution,
}

#[derive(Debug)]
pub struct TileOutcome {
    pub seq: u64,
    pub resolution: Resolution,
    pub result: Result<HexagonSet, TilingError>,
}

pub struct TilingWorker {
    jobs: Sender<TileJob>,
    results: Receiver<TileOutcome>,
}

impl TilingWorker {
    /// Start the worker thread. It exits once this handle is dropped.
    pub fn spawn(cache: Arc<HexagonCache>) -> Self {
        let (jobs, job_rx) = std::sync::mpsc::channel();
        let (result_tx, results) = std::sync::mpsc::channel();
        std::thread::spawn(move || run(cache, job_rx, result_tx));
        Self { jobs, results }
    }

    pub fn submit(&self, job: TileJob) -> Result<(), TilingError> {
        debug!(seq = job.seq, resolution = %job.resolution, "queueing tiling job");
        self.jobs
            .send(job)
            .map_err(|_| TilingError::WorkerDisconnected)
    }

    /// `Ok(None)` while nothing has finished; an error once the worker is gone.
    pub fn try_recv(&self) -> Result<Option<TileOutcome>, TilingError> {
        match self.results.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TilingError::WorkerDisconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<TileOutcome, RecvTimeoutError> {
        self.results.recv_timeout(timeout)
    }
}

fn run(cache: Arc<HexagonCache>, jobs: Receiver<TileJob>, results: Sender<TileOutcome>) {
    while let Ok(mut job) = jobs.recv() {
        while let Ok(newer) = jobs.try_recv() {
            debug!(superseded = job.seq, by = newer.seq, "coalescing tiling jobs");
            job = newer;
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| cache.get_or_compute(job.resolution)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(seq = job.seq, resolution = %job.resolution, %message, "tiler panicked");
                Err(TilingError::Panicked(message))
            });
        let outcome = TileOutcome {
            seq: job.seq,
            resolution: job.resolution,
            result,
        };
        if results.send(outcome).is_err() {
            break;
        }
    }
    debug!("tiling worker stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
