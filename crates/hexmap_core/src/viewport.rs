//! Visible-region selection.

use std::str::FromStr;

use crate::feature::DisplayPoint;
use crate::tiler::HexagonCell;

/// Rectangular geographic bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn world() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }

    /// Bounds spanning `lat_span` × `lng_span` degrees around a center.
    pub fn around(lat: f64, lng: f64, lat_span: f64, lng_span: f64) -> Self {
        Self::new(
            lat - lat_span / 2.0,
            lng - lng_span / 2.0,
            lat + lat_span / 2.0,
            lng + lng_span / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lng_span(&self) -> f64 {
        self.east - self.west
    }

    /// Zero-area, inverted or non-finite bounds contain nothing.
    pub fn is_degenerate(&self) -> bool {
        !(self.lat_span() > 0.0 && self.lng_span() > 0.0)
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: DisplayPoint) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }

    /// Shift by a fraction of the current span, as a pan gesture would.
    pub fn panned(&self, lat_fraction: f64, lng_fraction: f64) -> Self {
        let dlat = self.lat_span() * lat_fraction;
        let dlng = self.lng_span() * lng_fraction;
        Self::new(
            self.south + dlat,
            self.west + dlng,
            self.north + dlat,
            self.east + dlng,
        )
    }
}

impl FromStr for GeoBounds {
    type Err = String;

    /// Parses `south,west,north,east`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("invalid bounds `{s}`: {err}"))?;
        match parts.as_slice() {
            [south, west, north, east] => Ok(Self::new(*south, *west, *north, *east)),
            _ => Err(format!(
                "invalid bounds `{s}`: expected south,west,north,east"
            )),
        }
    }
}

/// Hexagons whose every boundary vertex lies inside `bounds`.
///
/// Hexagons straddling an edge are dropped, not clipped.
pub fn filter_visible(hexagons: &[HexagonCell], bounds: &GeoBounds) -> Vec<HexagonCell> {
    if bounds.is_degenerate() {
        return Vec::new();
    }
    hexagons
        .iter()
        .filter(|hex| hex.boundary.iter().all(|vertex| bounds.contains(*vertex)))
        .cloned()
        .collect()
}
