mod support;

use std::sync::Arc;

use h3o::geom::ContainmentMode;
use h3o::Resolution;
use hexmap_core::config::OverlayConfig;
use hexmap_core::feature::{FeatureCollection, LngLat, MercatorPoint};
use hexmap_core::render::RenderCoordinator;
use hexmap_core::reproject::Reprojector;
use hexmap_core::source::StaticSource;
use hexmap_core::test_helpers::{test_cell_center, RecordingSink};
use hexmap_core::tiler::{convert_polygons_to_hexagons, H3Tiler, HexagonTiler};
use hexmap_core::viewport::{filter_visible, GeoBounds};
use support::dataset::{collection_json, red_square_collection, square_feature_json};
use support::session::{test_viewport, WAIT};

fn reprojected(collection: &FeatureCollection<MercatorPoint>) -> FeatureCollection<LngLat> {
    Reprojector::web_mercator()
        .expect("projection")
        .reproject(collection)
        .expect("reprojection")
}

#[test]
fn small_red_square_renders_one_hexagon_then_many_when_zoomed_in() {
    let viewport = test_viewport(6.0);
    let mut coordinator = RenderCoordinator::new(
        viewport.clone(),
        RecordingSink::new(),
        OverlayConfig::default(),
    );
    let reprojector = Reprojector::web_mercator().expect("projection");
    coordinator
        .load(&StaticSource::new(red_square_collection(0.2)), &reprojector)
        .expect("load");
    assert!(coordinator.wait_for_pending(WAIT));

    assert_eq!(coordinator.resolution(), Resolution::Three);
    let shapes = &coordinator.sink().shapes;
    assert_eq!(shapes.len(), 1);
    let (_, hexagon) = &shapes[0];
    assert_eq!(hexagon.ring.len(), 6);
    assert_eq!(hexagon.color, "#FF0000");
    assert_eq!(hexagon.fill_opacity, 0.5);

    viewport.set_zoom(10.0);
    coordinator.on_zoom_end();
    assert!(coordinator.wait_for_pending(WAIT));

    assert_eq!(coordinator.resolution(), Resolution::Five);
    let shapes = &coordinator.sink().shapes;
    assert!(shapes.len() > 1, "got {} hexagons", shapes.len());
    assert!(shapes.iter().all(|(_, shape)| shape.color == "#FF0000"));
    assert!(!coordinator.is_loading());
}

#[test]
fn tiling_is_deterministic() {
    let center = test_cell_center(Resolution::Three);
    let collection = reprojected(
        &FeatureCollection::from_geojson_str(&collection_json(vec![
            square_feature_json(center.lng(), center.lat(), 1.0, "AA0000"),
            square_feature_json(center.lng() + 3.0, center.lat() + 1.0, 0.5, "00AA00"),
        ]))
        .expect("valid geojson"),
    );

    let first = H3Tiler::new(Arc::new(collection.clone()), ContainmentMode::ContainsCentroid)
        .tile(Resolution::Four)
        .expect("tiling");
    let second = H3Tiler::new(Arc::new(collection), ContainmentMode::ContainsCentroid)
        .tile(Resolution::Four)
        .expect("tiling");
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn every_reprojected_vertex_is_geographic() {
    let collection = reprojected(&red_square_collection(0.2));
    let center = test_cell_center(Resolution::Three);
    for point in collection.features[0].geometry[0][0].iter() {
        assert!((point.lng - center.lng()).abs() <= 0.2 + 1e-6);
        assert!((point.lat - center.lat()).abs() <= 0.2 + 1e-6);
    }
}

#[test]
fn visible_subset_comes_from_the_full_set() {
    let collection = reprojected(&red_square_collection(1.0));
    let full = convert_polygons_to_hexagons(
        &collection,
        Resolution::Four,
        ContainmentMode::ContainsCentroid,
    )
    .expect("tiling");
    let center = test_cell_center(Resolution::Three);
    let bounds = GeoBounds::new(
        center.lat(),
        center.lng(),
        center.lat() + 2.0,
        center.lng() + 2.0,
    );
    let visible = filter_visible(&full, &bounds);
    assert!(!visible.is_empty());
    assert!(visible.len() < full.len());
    for hexagon in &visible {
        assert!(full.contains(hexagon));
        assert!(hexagon.boundary.iter().all(|vertex| bounds.contains(*vertex)));
    }
}

#[test]
fn conversion_alone_yields_one_hexagon_at_resolution_three() {
    let collection = reprojected(&red_square_collection(0.2));
    let coarse = convert_polygons_to_hexagons(
        &collection,
        Resolution::Three,
        ContainmentMode::ContainsCentroid,
    )
    .expect("tiling");
    assert_eq!(coarse.len(), 1);
    assert_eq!(coarse[0].boundary.len(), 6);
    assert_eq!(coarse[0].color, "#FF0000");
    assert_eq!(
        coarse[0].cell,
        test_cell_center(Resolution::Three).to_cell(Resolution::Three)
    );

    let fine = convert_polygons_to_hexagons(
        &collection,
        Resolution::Five,
        ContainmentMode::ContainsCentroid,
    )
    .expect("tiling");
    assert!(fine.len() > 1);
    assert!(fine.iter().all(|hexagon| hexagon.color == "#FF0000"));
}
