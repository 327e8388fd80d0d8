//! Typed feature model: regions, their geometry and the coordinate systems
//! the geometry is expressed in.
//!
//! The point type carries the reference system. Raw datasets arrive as
//! [`MercatorPoint`] (EPSG:3857 metres), tiling consumes [`LngLat`]
//! (EPSG:4326 degrees, GeoJSON order) and the overlay is drawn with
//! [`DisplayPoint`] (latitude first, as the map widget expects).

use std::io::Read;

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};

use crate::error::VertexPosition;

/// Leaflet's default path color, used when a feature carries no color.
pub const DEFAULT_COLOR: &str = "#3388ff";

/// Projected Web Mercator coordinate in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MercatorPoint {
    pub x: f64,
    pub y: f64,
}

impl MercatorPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geographic coordinate in degrees, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Swap into the display convention.
    pub fn to_display(self) -> DisplayPoint {
        DisplayPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Geographic coordinate in degrees, latitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub lat: f64,
    pub lng: f64,
}

impl DisplayPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// GeoJSON positions are arrays; extra ordinates (elevation, measure) are dropped.
fn position<'de, D: Deserializer<'de>>(de: D) -> Result<(f64, f64), D::Error> {
    let raw = Vec::<f64>::deserialize(de)?;
    match raw.as_slice() {
        [a, b, ..] => Ok((*a, *b)),
        _ => Err(D::Error::custom(format!(
            "position needs at least two ordinates, got {}",
            raw.len()
        ))),
    }
}

impl<'de> Deserialize<'de> for MercatorPoint {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let (x, y) = position(de)?;
        Ok(Self { x, y })
    }
}

impl<'de> Deserialize<'de> for LngLat {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let (lng, lat) = position(de)?;
        Ok(Self { lng, lat })
    }
}

pub type Ring<P> = Vec<P>;
/// Exterior ring first, holes after.
pub type Polygon<P> = Vec<Ring<P>>;
pub type MultiPolygon<P> = Vec<Polygon<P>>;

/// Properties of a region. Anything besides the color is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    #[serde(rename = "COLOR_HEX", default, skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FeatureProperties {
    pub fn with_color(color_hex: &str) -> Self {
        Self {
            color_hex: Some(color_hex.to_string()),
            extra: serde_json::Map::new(),
        }
    }

    /// Color as drawn on the overlay, always `#`-prefixed.
    pub fn display_color(&self) -> String {
        match self.color_hex.as_deref().map(str::trim) {
            Some(hex) if !hex.is_empty() => {
                if hex.starts_with('#') {
                    hex.to_string()
                } else {
                    format!("#{hex}")
                }
            }
            _ => DEFAULT_COLOR.to_string(),
        }
    }

    /// Looks up a string or numeric identifier property such as a region code.
    pub fn identifier(&self, key: &str) -> Option<String> {
        match self.extra.get(key)? {
            serde_json::Value::String(value) => Some(value.clone()),
            serde_json::Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature<P> {
    pub geometry: MultiPolygon<P>,
    pub properties: FeatureProperties,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry<P> {
    Polygon { coordinates: Polygon<P> },
    MultiPolygon { coordinates: MultiPolygon<P> },
}

#[derive(Deserialize)]
struct RawFeature<P> {
    geometry: RawGeometry<P>,
    #[serde(default, deserialize_with = "nullable_properties")]
    properties: FeatureProperties,
}

/// GeoJSON allows `"properties": null`.
fn nullable_properties<'de, D: Deserializer<'de>>(de: D) -> Result<FeatureProperties, D::Error> {
    Ok(Option::<FeatureProperties>::deserialize(de)?.unwrap_or_default())
}

impl<'de, P: Deserialize<'de>> Deserialize<'de> for Feature<P> {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = RawFeature::<P>::deserialize(de)?;
        let geometry = match raw.geometry {
            RawGeometry::Polygon { coordinates } => vec![coordinates],
            RawGeometry::MultiPolygon { coordinates } => coordinates,
        };
        Ok(Self {
            geometry,
            properties: raw.properties,
        })
    }
}

/// An ordered, immutable list of regions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(bound(deserialize = "P: Deserialize<'de>"))]
pub struct FeatureCollection<P> {
    pub features: Vec<Feature<P>>,
}

impl<P> Default for FeatureCollection<P> {
    fn default() -> Self {
        Self {
            features: Vec::new(),
        }
    }
}

impl<P> FeatureCollection<P> {
    pub fn new(features: Vec<Feature<P>>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature<P>> {
        self.features.iter()
    }

    pub fn vertex_count(&self) -> usize {
        self.features
            .iter()
            .flat_map(|feature| feature.geometry.iter())
            .flat_map(|polygon| polygon.iter())
            .map(|ring| ring.len())
            .sum()
    }

    /// Rebuilds the collection with every vertex mapped through `f`, keeping
    /// nesting and properties. Stops at the first error.
    pub fn try_map_points<Q, E, F>(&self, mut f: F) -> Result<FeatureCollection<Q>, E>
    where
        P: Copy,
        F: FnMut(VertexPosition, P) -> Result<Q, E>,
    {
        let mut features = Vec::with_capacity(self.features.len());
        for (feature_idx, feature) in self.features.iter().enumerate() {
            let mut geometry = Vec::with_capacity(feature.geometry.len());
            for (polygon_idx, polygon) in feature.geometry.iter().enumerate() {
                let mut rings = Vec::with_capacity(polygon.len());
                for (ring_idx, ring) in polygon.iter().enumerate() {
                    let mut points = Vec::with_capacity(ring.len());
                    for (vertex_idx, point) in ring.iter().enumerate() {
                        let position = VertexPosition {
                            feature: feature_idx,
                            polygon: polygon_idx,
                            ring: ring_idx,
                            vertex: vertex_idx,
                        };
                        points.push(f(position, *point)?);
                    }
                    rings.push(points);
                }
                geometry.push(rings);
            }
            features.push(Feature {
                geometry,
                properties: feature.properties.clone(),
            });
        }
        Ok(FeatureCollection { features })
    }
}

impl FeatureCollection<MercatorPoint> {
    /// Parses a GeoJSON `FeatureCollection` whose positions are Web Mercator metres.
    pub fn from_geojson_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn from_geojson_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }
}
