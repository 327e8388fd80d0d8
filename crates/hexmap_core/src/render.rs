//! Render coordination: decides when to re-tile, filters to the viewport and
//! replaces the drawn overlay.
//!
//! The map widget and the drawing surface are abstracted behind
//! [`MapViewport`] and [`OverlaySink`]. The host forwards its "zoom ended" and
//! "move ended" events to [`RenderCoordinator::on_zoom_end`] and
//! [`RenderCoordinator::on_move_end`], and calls
//! [`RenderCoordinator::drain_results`] once per UI tick to pick up tiling
//! work finished in the background.
//!
//! Every render request gets a sequence number. Only the result for the
//! latest request is ever drawn, so a slow re-tile that has been superseded
//! by a newer zoom or pan cannot overwrite the newer overlay.

use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use h3o::Resolution;
use tracing::{debug, error, info, warn};

use crate::cache::HexagonCache;
use crate::config::OverlayConfig;
use crate::error::{ReprojectionError, TilingError};
use crate::feature::{DisplayPoint, FeatureCollection, LngLat};
use crate::reproject::Reprojector;
use crate::resolution::resolution_for_zoom;
use crate::source::{load_features, FeatureSource};
use crate::tiler::{H3Tiler, HexagonSet, HexagonTiler};
use crate::viewport::{filter_visible, GeoBounds};
use crate::worker::{TileJob, TileOutcome, TilingWorker};

/// Handle for a shape drawn on the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(pub u64);

/// Read side of the map widget.
pub trait MapViewport {
    fn zoom(&self) -> f64;
    fn bounds(&self) -> GeoBounds;
}

/// Drawing surface for hexagon shapes.
pub trait OverlaySink {
    fn add_shape(&mut self, ring: &[DisplayPoint], color: &str, fill_opacity: f64) -> ShapeId;
    fn remove_shape(&mut self, id: ShapeId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Loading,
    Tiling,
    Filtering,
    Drawing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub redraws: u64,
    pub jobs_submitted: u64,
    pub stale_discarded: u64,
    pub failures: u64,
}

pub struct RenderCoordinator<V, S> {
    viewport: V,
    sink: S,
    config: OverlayConfig,
    resolution: Resolution,
    cache: Option<Arc<HexagonCache>>,
    worker: Option<TilingWorker>,
    drawn: Vec<ShapeId>,
    latest_seq: u64,
    pending: Option<u64>,
    loading: bool,
    phase: RenderPhase,
    stats: RenderStats,
}

impl<V: MapViewport, S: OverlaySink> RenderCoordinator<V, S> {
    pub fn new(viewport: V, sink: S, config: OverlayConfig) -> Self {
        let resolution = resolution_for_zoom(viewport.zoom());
        Self {
            viewport,
            sink,
            config,
            resolution,
            cache: None,
            worker: None,
            drawn: Vec::new(),
            latest_seq: 0,
            pending: None,
            loading: false,
            phase: RenderPhase::Idle,
            stats: RenderStats::default(),
        }
    }

    /// Fetch, reproject and start rendering the session's dataset.
    ///
    /// A failed fetch renders an empty overlay; a failed reprojection leaves
    /// the coordinator without data and returns the error.
    pub fn load(
        &mut self,
        source: &dyn FeatureSource,
        reprojector: &Reprojector,
    ) -> Result<(), ReprojectionError> {
        self.loading = true;
        self.phase = RenderPhase::Loading;
        match load_features(source, reprojector) {
            Ok(features) => {
                self.set_features(Arc::new(features));
                Ok(())
            }
            Err(err) => {
                error!(%err, "error loading data");
                self.loading = false;
                self.phase = RenderPhase::Idle;
                Err(err)
            }
        }
    }

    /// Use an already reprojected collection as the session's dataset.
    pub fn set_features(&mut self, features: Arc<FeatureCollection<LngLat>>) {
        let tiler = H3Tiler::new(features, self.config.containment_mode());
        self.set_tiler(Arc::new(tiler));
    }

    /// Install the tiler for the session and schedule the first render.
    pub fn set_tiler(&mut self, tiler: Arc<dyn HexagonTiler>) {
        let cache = Arc::new(HexagonCache::new(tiler));
        self.worker = Some(TilingWorker::spawn(cache.clone()));
        self.cache = Some(cache);
        self.pending = None;
        self.update_hexagons();
    }

    /// The map finished zooming.
    pub fn on_zoom_end(&mut self) {
        let target = resolution_for_zoom(self.viewport.zoom());
        if target != self.resolution {
            info!(from = %self.resolution, to = %target, "hexagon resolution changed");
            self.resolution = target;
        }
        self.update_hexagons();
    }

    /// The map finished panning. Re-filters at the current resolution.
    pub fn on_move_end(&mut self) {
        self.update_hexagons();
    }

    /// Redraw now if the active set is cached, otherwise hand the tiling to
    /// the worker.
    fn update_hexagons(&mut self) {
        let Some(cache) = self.cache.clone() else {
            debug!("no dataset loaded yet, skipping render");
            return;
        };
        self.latest_seq += 1;

        if let Some(set) = cache.peek(self.resolution) {
            if self.pending.take().is_some() {
                debug!(seq = self.latest_seq, "superseding in-flight tiling job");
            }
            self.draw(&set);
            self.finish();
            return;
        }

        let job = TileJob {
            seq: self.latest_seq,
            resolution: self.resolution,
        };
        self.loading = true;
        self.phase = RenderPhase::Tiling;
        let submitted = match self.submit(job) {
            Err(TilingError::WorkerDisconnected) => {
                warn!("tiling worker is gone, restarting it");
                self.respawn_worker();
                self.submit(job)
            }
            other => other,
        };
        match submitted {
            Ok(()) => {
                self.pending = Some(job.seq);
                self.stats.jobs_submitted += 1;
            }
            Err(err) => {
                error!(%err, "error updating hexagons");
                self.stats.failures += 1;
                self.pending = None;
                self.finish();
            }
        }
    }

    fn submit(&self, job: TileJob) -> Result<(), TilingError> {
        match &self.worker {
            Some(worker) => worker.submit(job),
            None => Err(TilingError::WorkerDisconnected),
        }
    }

    fn respawn_worker(&mut self) {
        self.worker = self.cache.clone().map(TilingWorker::spawn);
    }

    /// The worker died with a job in flight: fail that job and start a new worker.
    fn worker_lost(&mut self) {
        let err = TilingError::WorkerDisconnected;
        error!(%err, pending = ?self.pending, "error updating hexagons");
        if self.pending.take().is_some() {
            self.stats.failures += 1;
        }
        self.finish();
        self.respawn_worker();
    }

    /// Apply every finished tiling job. Returns how many results were drawn.
    pub fn drain_results(&mut self) -> usize {
        let mut drawn = 0;
        loop {
            let received = match &self.worker {
                Some(worker) => worker.try_recv(),
                None => Ok(None),
            };
            match received {
                Ok(Some(outcome)) => {
                    if self.apply(outcome) {
                        drawn += 1;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    self.worker_lost();
                    break;
                }
            }
        }
        drawn
    }

    /// Block until the latest request has been applied or `timeout` passes.
    /// Returns `true` when nothing is left pending.
    pub fn wait_for_pending(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(worker) = self.worker.as_ref() else {
                return false;
            };
            match worker.recv_timeout(remaining) {
                Ok(outcome) => {
                    self.apply(outcome);
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => self.worker_lost(),
            }
        }
        true
    }

    fn apply(&mut self, outcome: TileOutcome) -> bool {
        if self.pending != Some(outcome.seq) || outcome.resolution != self.resolution {
            warn!(
                seq = outcome.seq,
                latest = self.latest_seq,
                resolution = %outcome.resolution,
                "discarding stale tiling result"
            );
            self.stats.stale_discarded += 1;
            return false;
        }
        self.pending = None;
        let drawn = match outcome.result {
            Ok(set) => {
                self.draw(&set);
                true
            }
            Err(err) => {
                error!(%err, resolution = %outcome.resolution, "error updating hexagons");
                self.stats.failures += 1;
                false
            }
        };
        self.finish();
        drawn
    }

    /// Replace the overlay with the visible part of `set`.
    fn draw(&mut self, set: &HexagonSet) {
        self.phase = RenderPhase::Filtering;
        let bounds = self.viewport.bounds();
        let visible = filter_visible(set, &bounds);

        self.phase = RenderPhase::Drawing;
        for id in self.drawn.drain(..) {
            self.sink.remove_shape(id);
        }
        for hex in &visible {
            let id = self
                .sink
                .add_shape(&hex.boundary, &hex.color, self.config.fill_opacity);
            self.drawn.push(id);
        }
        self.stats.redraws += 1;
        info!(
            resolution = %self.resolution,
            visible = visible.len(),
            total = set.len(),
            "redrew hexagon overlay"
        );
    }

    fn finish(&mut self) {
        self.loading = false;
        self.phase = RenderPhase::Idle;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn drawn_shapes(&self) -> usize {
        self.drawn.len()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn cache(&self) -> Option<&Arc<HexagonCache>> {
        self.cache.as_ref()
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// For hosts that move the map through the coordinator's own viewport.
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
