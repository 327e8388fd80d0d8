//! Error taxonomy for the tiling pipeline.
//!
//! None of these are fatal to the host: fetch errors degrade to an empty
//! collection, tiling errors leave the previous overlay in place. Only
//! [`ReprojectionError`] fails a load outright.

use thiserror::Error;

/// The feature source failed or produced nothing usable.
#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "http")]
    #[error("dataset request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dataset request returned status {0}")]
    Status(u16),
    #[error("dataset is not a valid feature collection: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("dataset contained no features")]
    Empty,
}

/// Where in a feature collection a vertex lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexPosition {
    pub feature: usize,
    pub polygon: usize,
    pub ring: usize,
    pub vertex: usize,
}

impl std::fmt::Display for VertexPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "feature {} polygon {} ring {} vertex {}",
            self.feature, self.polygon, self.ring, self.vertex
        )
    }
}

/// A vertex could not be moved between reference systems.
#[derive(Debug, Error)]
pub enum ReprojectionError {
    #[error("failed to build projection `{definition}`: {reason}")]
    Projection { definition: String, reason: String },
    #[error("transform failed at {position}: {reason}")]
    Transform {
        position: VertexPosition,
        reason: String,
    },
    #[error("non-finite coordinate ({x}, {y}) at {position}")]
    NonFinite {
        position: VertexPosition,
        x: f64,
        y: f64,
    },
}

/// A feature could not be decomposed into cells, or the worker went away.
#[derive(Debug, Error)]
pub enum TilingError {
    #[error("feature {feature} has invalid geometry: {source}")]
    InvalidGeometry {
        feature: usize,
        #[source]
        source: h3o::error::InvalidGeometry,
    },
    #[error("feature {feature} has a non-finite vertex")]
    NonFiniteVertex { feature: usize },
    #[error("tiling worker is no longer running")]
    WorkerDisconnected,
    #[error("tiler panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Other(String),
}

/// Overlay configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config format: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}
