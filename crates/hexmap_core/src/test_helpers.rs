//! Test helpers for building fixtures and observing the pipeline.
//!
//! This module provides fixture features, a tiler wrapper that counts
//! invocations, and in-memory stand-ins for the map viewport and the overlay
//! sink.

use std::sync::{Arc, Condvar, Mutex};

use h3o::{LatLng, Resolution};

use crate::error::TilingError;
use crate::feature::{DisplayPoint, Feature, FeatureProperties, LngLat};
use crate::render::{MapViewport, OverlaySink, ShapeId};
use crate::tiler::{HexagonCell, HexagonTiler};
use crate::viewport::GeoBounds;

/// Near the center of icosahedron face 4, far from face edges and pentagons.
pub const TEST_ORIGIN_LAT: f64 = 28.17;
pub const TEST_ORIGIN_LNG: f64 = 23.03;

/// Center of the cell containing the test origin at `resolution`.
///
/// # Panics
///
/// Panics if the test origin constants are not a valid coordinate (should never happen).
pub fn test_cell_center(resolution: Resolution) -> LatLng {
    let origin = LatLng::new(TEST_ORIGIN_LAT, TEST_ORIGIN_LNG).expect("valid test origin");
    LatLng::from(origin.to_cell(resolution))
}

/// Axis-aligned square of half-width `half_deg` centered on `(lng, lat)`.
pub fn square_feature(lng: f64, lat: f64, half_deg: f64, color_hex: &str) -> Feature<LngLat> {
    let ring = vec![
        LngLat::new(lng - half_deg, lat - half_deg),
        LngLat::new(lng + half_deg, lat - half_deg),
        LngLat::new(lng + half_deg, lat + half_deg),
        LngLat::new(lng - half_deg, lat + half_deg),
        LngLat::new(lng - half_deg, lat - half_deg),
    ];
    Feature {
        geometry: vec![vec![ring]],
        properties: FeatureProperties::with_color(color_hex),
    }
}

/// Wraps a tiler and counts calls per resolution.
pub struct CountingTiler<T> {
    inner: T,
    calls: Mutex<Vec<Resolution>>,
}

impl<T: HexagonTiler> CountingTiler<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn invocations(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn invocations_for(&self, resolution: Resolution) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|r| **r == resolution).count())
            .unwrap_or(0)
    }
}

impl<T: HexagonTiler> HexagonTiler for CountingTiler<T> {
    fn tile(&self, resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(resolution);
        }
        self.inner.tile(resolution)
    }
}

/// Blocks every tiling call until [`GatedTiler::open`] is called.
pub struct GatedTiler<T> {
    inner: T,
    open: Mutex<bool>,
    opened: Condvar,
}

impl<T: HexagonTiler> GatedTiler<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            open: Mutex::new(false),
            opened: Condvar::new(),
        }
    }

    pub fn open(&self) {
        if let Ok(mut open) = self.open.lock() {
            *open = true;
            self.opened.notify_all();
        }
    }
}

impl<T: HexagonTiler> HexagonTiler for GatedTiler<T> {
    fn tile(&self, resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError> {
        let guard = self
            .open
            .lock()
            .map_err(|_| TilingError::Other("gate poisoned".to_string()))?;
        let released = self
            .opened
            .wait_while(guard, |open| !*open)
            .map_err(|_| TilingError::Other("gate poisoned".to_string()))?;
        drop(released);
        self.inner.tile(resolution)
    }
}

/// Fails for the listed resolutions and returns an empty set otherwise.
pub struct FailingTiler {
    pub failing: Vec<Resolution>,
}

impl HexagonTiler for FailingTiler {
    fn tile(&self, resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError> {
        if self.failing.contains(&resolution) {
            Err(TilingError::Other(format!("refusing to tile {resolution}")))
        } else {
            Ok(Vec::new())
        }
    }
}

/// Delegates to the inner tiler except at one resolution.
///
/// # Panics
///
/// `tile` panics when asked for the configured resolution.
pub struct PanickingTiler<T> {
    inner: T,
    panics_at: Resolution,
}

impl<T: HexagonTiler> PanickingTiler<T> {
    pub fn new(inner: T, panics_at: Resolution) -> Self {
        Self { inner, panics_at }
    }
}

impl<T: HexagonTiler> HexagonTiler for PanickingTiler<T> {
    fn tile(&self, resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError> {
        if resolution == self.panics_at {
            panic!("tiler exploded at resolution {resolution}");
        }
        self.inner.tile(resolution)
    }
}

/// Map viewport whose zoom and bounds the test moves by hand.
#[derive(Clone)]
pub struct TestViewport {
    state: Arc<Mutex<(f64, GeoBounds)>>,
}

impl TestViewport {
    pub fn new(zoom: f64, bounds: GeoBounds) -> Self {
        Self {
            state: Arc::new(Mutex::new((zoom, bounds))),
        }
    }

    pub fn set_zoom(&self, zoom: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.0 = zoom;
        }
    }

    pub fn set_bounds(&self, bounds: GeoBounds) {
        if let Ok(mut state) = self.state.lock() {
            state.1 = bounds;
        }
    }
}

impl MapViewport for TestViewport {
    fn zoom(&self) -> f64 {
        self.state.lock().map(|state| state.0).unwrap_or(0.0)
    }

    fn bounds(&self) -> GeoBounds {
        self.state
            .lock()
            .map(|state| state.1)
            .unwrap_or_else(|_| GeoBounds::world())
    }
}

/// A shape as recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedShape {
    pub ring: Vec<DisplayPoint>,
    pub color: String,
    pub fill_opacity: f64,
}

/// Overlay sink that keeps drawn shapes in memory.
#[derive(Default)]
pub struct RecordingSink {
    next_id: u64,
    pub shapes: Vec<(ShapeId, RecordedShape)>,
    pub added: usize,
    pub removed: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_shapes(&self) -> usize {
        self.shapes.len()
    }
}

impl OverlaySink for RecordingSink {
    fn add_shape(&mut self, ring: &[DisplayPoint], color: &str, fill_opacity: f64) -> ShapeId {
        self.next_id += 1;
        let id = ShapeId(self.next_id);
        self.added += 1;
        self.shapes.push((
            id,
            RecordedShape {
                ring: ring.to_vec(),
                color: color.to_string(),
                fill_opacity,
            },
        ));
        id
    }

    fn remove_shape(&mut self, id: ShapeId) {
        self.removed += 1;
        self.shapes.retain(|(shape_id, _)| *shape_id != id);
    }
}
