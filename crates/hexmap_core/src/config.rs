//! Overlay settings, loadable from a JSON file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use h3o::geom::ContainmentMode;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_FILL_OPACITY: f64 = 0.5;
pub const DEFAULT_INITIAL_ZOOM: f64 = 6.0;

/// Which cells count as part of a polygon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Containment {
    /// Cells whose center lies inside the polygon.
    #[default]
    Centroid,
    /// Cells entirely inside the polygon.
    Contains,
    /// Cells touching the polygon at all.
    Intersects,
    /// Like `Intersects`, and a polygon smaller than a cell still gets that cell.
    Covers,
}

impl From<Containment> for ContainmentMode {
    fn from(value: Containment) -> Self {
        match value {
            Containment::Centroid => ContainmentMode::ContainsCentroid,
            Containment::Contains => ContainmentMode::ContainsBoundary,
            Containment::Intersects => ContainmentMode::IntersectsBoundary,
            Containment::Covers => ContainmentMode::Covers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub fill_opacity: f64,
    pub containment: Containment,
    pub initial_zoom: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            fill_opacity: DEFAULT_FILL_OPACITY,
            containment: Containment::default(),
            initial_zoom: DEFAULT_INITIAL_ZOOM,
        }
    }
}

impl OverlayConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ConfigError::Io(err)),
        };
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config.normalized())
    }

    /// Clamp out-of-range values instead of rejecting the file.
    pub fn normalized(mut self) -> Self {
        self.fill_opacity = if self.fill_opacity.is_finite() {
            self.fill_opacity.clamp(0.0, 1.0)
        } else {
            DEFAULT_FILL_OPACITY
        };
        if !self.initial_zoom.is_finite() {
            self.initial_zoom = DEFAULT_INITIAL_ZOOM;
        }
        self
    }

    pub fn containment_mode(&self) -> ContainmentMode {
        self.containment.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = OverlayConfig::load(&dir.path().join("absent.json")).expect("defaults");
        assert_eq!(config, OverlayConfig::default());
        assert_eq!(config.fill_opacity, 0.5);
        assert_eq!(config.containment, Containment::Centroid);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("overlay.json");
        fs::write(&path, r#"{ "containment": "covers" }"#).expect("write fixture");
        let config = OverlayConfig::load(&path).expect("valid config");
        assert_eq!(config.containment, Containment::Covers);
        assert_eq!(config.fill_opacity, DEFAULT_FILL_OPACITY);
        assert!(matches!(config.containment_mode(), ContainmentMode::Covers));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("overlay.json");
        fs::write(&path, "{ not json").expect("write fixture");
        assert!(matches!(
            OverlayConfig::load(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn opacity_is_clamped() {
        let config = OverlayConfig {
            fill_opacity: 3.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.fill_opacity, 1.0);
    }
}
