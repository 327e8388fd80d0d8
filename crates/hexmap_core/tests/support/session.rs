#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use h3o::Resolution;
use hexmap_core::config::OverlayConfig;
use hexmap_core::render::RenderCoordinator;
use hexmap_core::test_helpers::{test_cell_center, RecordingSink, TestViewport};
use hexmap_core::tiler::HexagonTiler;
use hexmap_core::viewport::GeoBounds;

pub const WAIT: Duration = Duration::from_secs(10);

pub type TestCoordinator = RenderCoordinator<TestViewport, RecordingSink>;

/// Viewport centered on the test cell, twelve degrees on a side.
pub fn test_viewport(zoom: f64) -> TestViewport {
    let center = test_cell_center(Resolution::Three);
    TestViewport::new(zoom, GeoBounds::around(center.lat(), center.lng(), 12.0, 12.0))
}

/// Coordinator over `tiler`, with its first render already applied.
pub fn rendered_session(
    viewport: &TestViewport,
    tiler: Arc<dyn HexagonTiler>,
) -> TestCoordinator {
    let mut coordinator = RenderCoordinator::new(
        viewport.clone(),
        RecordingSink::new(),
        OverlayConfig::default(),
    );
    coordinator.set_tiler(tiler);
    assert!(coordinator.wait_for_pending(WAIT), "first render timed out");
    coordinator
}
