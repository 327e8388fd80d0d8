//! Web Mercator ⇄ geographic conversion of whole feature collections.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{ReprojectionError, VertexPosition};
use crate::feature::{FeatureCollection, LngLat, MercatorPoint};

/// Spherical Web Mercator (EPSG:3857).
pub const WEB_MERCATOR_PROJ4: &str =
    "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs";

/// Geographic degrees on the same sphere. EPSG:3857 treats its longitude and
/// latitude as WGS84 values directly, so no datum shift is applied.
pub const GEOGRAPHIC_PROJ4: &str = "+proj=longlat +a=6378137 +b=6378137 +no_defs";

/// Failure of a single point transform, before it is placed in a collection.
#[derive(Debug, Error)]
pub enum PointFailure {
    #[error("non-finite coordinate ({0}, {1})")]
    NonFinite(f64, f64),
    #[error("{0}")]
    Transform(String),
}

impl PointFailure {
    fn at(self, position: VertexPosition) -> ReprojectionError {
        match self {
            PointFailure::NonFinite(x, y) => ReprojectionError::NonFinite { position, x, y },
            PointFailure::Transform(reason) => ReprojectionError::Transform { position, reason },
        }
    }
}

/// Converts between a projected reference system and geographic degrees.
pub struct Reprojector {
    projected: Proj,
    geographic: Proj,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector").finish_non_exhaustive()
    }
}

fn build_proj(definition: &str) -> Result<Proj, ReprojectionError> {
    Proj::from_proj_string(definition).map_err(|err| ReprojectionError::Projection {
        definition: definition.to_string(),
        reason: err.to_string(),
    })
}

impl Reprojector {
    /// EPSG:3857 → EPSG:4326, the dataset's native projection.
    pub fn web_mercator() -> Result<Self, ReprojectionError> {
        Self::from_definitions(WEB_MERCATOR_PROJ4, GEOGRAPHIC_PROJ4)
    }

    /// Build from PROJ.4 strings. `geographic` must be a `longlat` definition.
    pub fn from_definitions(projected: &str, geographic: &str) -> Result<Self, ReprojectionError> {
        Ok(Self {
            projected: build_proj(projected)?,
            geographic: build_proj(geographic)?,
        })
    }

    pub fn to_geographic(&self, point: MercatorPoint) -> Result<LngLat, PointFailure> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(PointFailure::NonFinite(point.x, point.y));
        }
        let mut xyz = (point.x, point.y, 0.0);
        transform(&self.projected, &self.geographic, &mut xyz)
            .map_err(|err| PointFailure::Transform(err.to_string()))?;
        // longlat output is in radians.
        let (lng, lat) = (xyz.0.to_degrees(), xyz.1.to_degrees());
        if !lng.is_finite() || !lat.is_finite() {
            return Err(PointFailure::NonFinite(lng, lat));
        }
        Ok(LngLat::new(lng, lat))
    }

    pub fn to_projected(&self, point: LngLat) -> Result<MercatorPoint, PointFailure> {
        if !point.lng.is_finite() || !point.lat.is_finite() {
            return Err(PointFailure::NonFinite(point.lng, point.lat));
        }
        let mut xyz = (point.lng.to_radians(), point.lat.to_radians(), 0.0);
        transform(&self.geographic, &self.projected, &mut xyz)
            .map_err(|err| PointFailure::Transform(err.to_string()))?;
        if !xyz.0.is_finite() || !xyz.1.is_finite() {
            return Err(PointFailure::NonFinite(xyz.0, xyz.1));
        }
        Ok(MercatorPoint::new(xyz.0, xyz.1))
    }

    /// Reprojects every vertex. The first failing vertex fails the whole collection.
    pub fn reproject(
        &self,
        collection: &FeatureCollection<MercatorPoint>,
    ) -> Result<FeatureCollection<LngLat>, ReprojectionError> {
        debug!(
            features = collection.len(),
            vertices = collection.vertex_count(),
            "reprojecting feature collection"
        );
        let converted = collection.try_map_points(|position, point| {
            self.to_geographic(point).map_err(|failure| failure.at(position))
        })?;
        info!(features = converted.len(), "reprojected feature collection");
        Ok(converted)
    }

    /// Inverse of [`Reprojector::reproject`].
    pub fn unproject(
        &self,
        collection: &FeatureCollection<LngLat>,
    ) -> Result<FeatureCollection<MercatorPoint>, ReprojectionError> {
        collection.try_map_points(|position, point| {
            self.to_projected(point).map_err(|failure| failure.at(position))
        })
    }
}
