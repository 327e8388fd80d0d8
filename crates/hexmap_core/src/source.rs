//! Where the raw dataset comes from, and turning it into tiling input.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{DataFetchError, ReprojectionError};
use crate::feature::{FeatureCollection, LngLat, MercatorPoint};
use crate::reproject::Reprojector;

/// Yields the raw (Web Mercator) feature collection for a session.
pub trait FeatureSource {
    fn fetch(&self) -> Result<FeatureCollection<MercatorPoint>, DataFetchError>;
}

fn non_empty(
    collection: FeatureCollection<MercatorPoint>,
) -> Result<FeatureCollection<MercatorPoint>, DataFetchError> {
    if collection.is_empty() {
        Err(DataFetchError::Empty)
    } else {
        Ok(collection)
    }
}

/// A collection already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    collection: FeatureCollection<MercatorPoint>,
}

impl StaticSource {
    pub fn new(collection: FeatureCollection<MercatorPoint>) -> Self {
        Self { collection }
    }
}

impl FeatureSource for StaticSource {
    fn fetch(&self) -> Result<FeatureCollection<MercatorPoint>, DataFetchError> {
        non_empty(self.collection.clone())
    }
}

/// A GeoJSON file on disk.
#[derive(Debug, Clone)]
pub struct GeoJsonFileSource {
    path: PathBuf,
}

impl GeoJsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl FeatureSource for GeoJsonFileSource {
    fn fetch(&self) -> Result<FeatureCollection<MercatorPoint>, DataFetchError> {
        let file = File::open(&self.path)?;
        let collection = FeatureCollection::from_geojson_reader(BufReader::new(file))?;
        non_empty(collection)
    }
}

#[cfg(feature = "http")]
pub use http::HttpFeatureSource;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;

    use super::{non_empty, FeatureSource};
    use crate::error::DataFetchError;
    use crate::feature::{FeatureCollection, MercatorPoint};

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Blocking HTTP fetch of a GeoJSON dataset.
    #[derive(Debug, Clone)]
    pub struct HttpFeatureSource {
        client: Client,
        url: String,
    }

    impl HttpFeatureSource {
        pub fn new(url: &str) -> Result<Self, DataFetchError> {
            let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            Ok(Self {
                client,
                url: url.to_string(),
            })
        }
    }

    impl FeatureSource for HttpFeatureSource {
        fn fetch(&self) -> Result<FeatureCollection<MercatorPoint>, DataFetchError> {
            let response = self.client.get(&self.url).send()?;
            if !response.status().is_success() {
                return Err(DataFetchError::Status(response.status().as_u16()));
            }
            let bytes = response.bytes()?;
            let collection = serde_json::from_slice(&bytes)?;
            non_empty(collection)
        }
    }
}

/// Fetch and reproject the session's features.
///
/// A failed fetch is logged and treated as an empty dataset. A failed
/// reprojection fails the load.
pub fn load_features(
    source: &dyn FeatureSource,
    reprojector: &Reprojector,
) -> Result<FeatureCollection<LngLat>, ReprojectionError> {
    let raw = match source.fetch() {
        Ok(raw) => raw,
        Err(err) => {
            warn!(%err, "error loading data, continuing with an empty dataset");
            return Ok(FeatureCollection::default());
        }
    };
    info!(features = raw.len(), "loaded dataset");
    reprojector.reproject(&raw)
}
