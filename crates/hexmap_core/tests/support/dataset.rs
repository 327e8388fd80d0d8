#![allow(dead_code)]

use h3o::Resolution;
use hexmap_core::feature::{FeatureCollection, LngLat, MercatorPoint};
use hexmap_core::reproject::Reprojector;
use hexmap_core::test_helpers::test_cell_center;
use serde_json::{json, Value};

/// Axis-aligned square in Web Mercator metres, given its geographic center.
pub fn mercator_square(lng: f64, lat: f64, half_deg: f64) -> Vec<[f64; 2]> {
    let reprojector = Reprojector::web_mercator().expect("projection");
    [
        (lng - half_deg, lat - half_deg),
        (lng + half_deg, lat - half_deg),
        (lng + half_deg, lat + half_deg),
        (lng - half_deg, lat + half_deg),
        (lng - half_deg, lat - half_deg),
    ]
    .into_iter()
    .map(|(lng, lat)| {
        let point = reprojector
            .to_projected(LngLat::new(lng, lat))
            .expect("projectable corner");
        [point.x, point.y]
    })
    .collect()
}

/// One MultiPolygon feature as GeoJSON.
pub fn square_feature_json(lng: f64, lat: f64, half_deg: f64, color_hex: &str) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "MultiPolygon",
            "coordinates": [[mercator_square(lng, lat, half_deg)]],
        },
        "properties": { "COLOR_HEX": color_hex },
    })
}

pub fn collection_json(features: Vec<Value>) -> String {
    json!({ "type": "FeatureCollection", "features": features }).to_string()
}

/// A single red square centered on the test cell at resolution 3.
pub fn red_square_geojson(half_deg: f64) -> String {
    let center = test_cell_center(Resolution::Three);
    collection_json(vec![square_feature_json(
        center.lng(),
        center.lat(),
        half_deg,
        "FF0000",
    )])
}

pub fn red_square_collection(half_deg: f64) -> FeatureCollection<MercatorPoint> {
    FeatureCollection::from_geojson_str(&red_square_geojson(half_deg)).expect("valid geojson")
}
