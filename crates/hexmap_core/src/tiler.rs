//! Polygon → hexagon decomposition.
//!
//! Each feature is polyfilled with H3 cells at the requested resolution and
//! every cell is expanded into a display-ordered boundary ring carrying the
//! feature's color.

use std::sync::Arc;
use std::time::Instant;

use geo::{Coord, LineString};
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, Resolution};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::TilingError;
use crate::feature::{DisplayPoint, Feature, FeatureCollection, LngLat, Polygon};

/// One drawable hexagon.
#[derive(Debug, Clone, PartialEq)]
pub struct HexagonCell {
    pub cell: CellIndex,
    /// Boundary vertices, latitude first. Not closed: the first vertex is not repeated.
    pub boundary: Vec<DisplayPoint>,
    /// `#`-prefixed color inherited from the owning feature.
    pub color: String,
}

impl HexagonCell {
    pub fn from_cell(cell: CellIndex, color: &str) -> Self {
        let boundary = cell
            .boundary()
            .iter()
            .map(|vertex| DisplayPoint::new(vertex.lat(), vertex.lng()))
            .collect();
        Self {
            cell,
            boundary,
            color: color.to_string(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.cell.resolution()
    }
}

/// Every hexagon for one resolution, shared between the cache and the renderer.
pub type HexagonSet = Arc<[HexagonCell]>;

/// Produces the full hexagon set for a resolution.
///
/// Implementations must be deterministic: the cache relies on two runs for
/// the same resolution producing the same set.
pub trait HexagonTiler: Send + Sync {
    fn tile(&self, resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError>;
}

/// Tiles a fixed, already reprojected feature collection with H3.
#[derive(Debug, Clone)]
pub struct H3Tiler {
    features: Arc<FeatureCollection<LngLat>>,
    containment: ContainmentMode,
}

impl H3Tiler {
    pub fn new(features: Arc<FeatureCollection<LngLat>>, containment: ContainmentMode) -> Self {
        Self {
            features,
            containment,
        }
    }

    pub fn features(&self) -> &FeatureCollection<LngLat> {
        &self.features
    }
}

impl HexagonTiler for H3Tiler {
    fn tile(&self, resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError> {
        let started = Instant::now();
        let hexagons = convert_polygons_to_hexagons(&self.features, resolution, self.containment)?;
        info!(
            %resolution,
            features = self.features.len(),
            hexagons = hexagons.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tiled feature collection"
        );
        Ok(hexagons)
    }
}

/// Decompose every feature into hexagons at `resolution`.
///
/// Features are tiled in parallel but concatenated in input order, and each
/// feature's cells are sorted, so the output is deterministic.
pub fn convert_polygons_to_hexagons(
    features: &FeatureCollection<LngLat>,
    resolution: Resolution,
    containment: ContainmentMode,
) -> Result<Vec<HexagonCell>, TilingError> {
    let per_feature = features
        .features
        .par_iter()
        .enumerate()
        .map(|(index, feature)| {
            let color = feature.properties.display_color();
            let cells = feature_cells(index, feature, resolution, containment)?;
            Ok(cells
                .into_iter()
                .map(|cell| HexagonCell::from_cell(cell, &color))
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>, TilingError>>()?;

    Ok(per_feature.into_iter().flatten().collect())
}

/// Sorted, deduplicated cells covering one feature.
///
/// Polygons `h3o` rejects (e.g. a ring with fewer than four positions) are
/// logged and skipped. A non-finite vertex fails the feature.
pub fn feature_cells(
    index: usize,
    feature: &Feature<LngLat>,
    resolution: Resolution,
    containment: ContainmentMode,
) -> Result<Vec<CellIndex>, TilingError> {
    let mut tiler = TilerBuilder::new(resolution)
        .containment_mode(containment)
        .build();
    for (polygon_index, polygon) in feature.geometry.iter().enumerate() {
        if polygon
            .iter()
            .flatten()
            .any(|point| !point.lng.is_finite() || !point.lat.is_finite())
        {
            return Err(TilingError::NonFiniteVertex { feature: index });
        }
        let Some(polygon) = to_geo_polygon(polygon) else {
            continue;
        };
        if let Err(source) = tiler.add(polygon) {
            let err = TilingError::InvalidGeometry {
                feature: index,
                source,
            };
            warn!(%err, polygon = polygon_index, "skipping polygon");
        }
    }
    let mut cells = tiler.into_coverage().collect::<Vec<_>>();
    cells.sort_unstable();
    cells.dedup();
    debug!(feature = index, %resolution, cells = cells.len(), "polyfilled feature");
    Ok(cells)
}

fn to_line_string(ring: &[LngLat]) -> LineString<f64> {
    ring.iter()
        .map(|point| Coord {
            x: point.lng,
            y: point.lat,
        })
        .collect::<Vec<_>>()
        .into()
}

/// `None` for polygons without an exterior ring.
fn to_geo_polygon(polygon: &Polygon<LngLat>) -> Option<geo::Polygon<f64>> {
    let (exterior, holes) = polygon.split_first()?;
    if exterior.is_empty() {
        return None;
    }
    Some(geo::Polygon::new(
        to_line_string(exterior),
        holes.iter().map(|hole| to_line_string(hole)).collect(),
    ))
}
