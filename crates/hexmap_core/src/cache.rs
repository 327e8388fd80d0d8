//! Per-resolution memo of full hexagon sets.
//!
//! The feature collection is fixed for the session, so a set computed for a
//! resolution stays valid forever and entries are never evicted. Each
//! resolution has its own bucket lock: concurrent requests for the same
//! uncached resolution wait for a single computation, while different
//! resolutions proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use h3o::Resolution;
use tracing::debug;

use crate::error::TilingError;
use crate::tiler::{HexagonSet, HexagonTiler};

type Bucket = Arc<Mutex<Option<HexagonSet>>>;

pub struct HexagonCache {
    tiler: Arc<dyn HexagonTiler>,
    buckets: Mutex<HashMap<Resolution, Bucket>>,
}

impl HexagonCache {
    pub fn new(tiler: Arc<dyn HexagonTiler>) -> Self {
        Self {
            tiler,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn bucket(&self, resolution: Resolution) -> Option<Bucket> {
        let mut buckets = self.buckets.lock().ok()?;
        Some(buckets.entry(resolution).or_default().clone())
    }

    /// Return the full set for `resolution`, tiling it on first use.
    ///
    /// Failures are not stored; the next call tries again.
    pub fn get_or_compute(&self, resolution: Resolution) -> Result<HexagonSet, TilingError> {
        let Some(bucket) = self.bucket(resolution) else {
            // Poisoned map: tile uncached
            return self.tiler.tile(resolution).map(HexagonSet::from);
        };
        let mut slot = match bucket.lock() {
            Ok(guard) => guard,
            Err(_) => return self.tiler.tile(resolution).map(HexagonSet::from),
        };
        if let Some(set) = slot.as_ref() {
            debug!(%resolution, hexagons = set.len(), "hexagon cache hit");
            return Ok(set.clone());
        }
        debug!(%resolution, "hexagon cache miss");
        let set = HexagonSet::from(self.tiler.tile(resolution)?);
        *slot = Some(set.clone());
        Ok(set)
    }

    /// The cached set, if present and not currently being computed.
    pub fn peek(&self, resolution: Resolution) -> Option<HexagonSet> {
        let bucket = self.buckets.lock().ok()?.get(&resolution)?.clone();
        let slot = bucket.try_lock().ok()?;
        slot.clone()
    }

    /// Resolutions with a stored set, ascending.
    pub fn computed_resolutions(&self) -> Vec<Resolution> {
        let Ok(buckets) = self.buckets.lock() else {
            return Vec::new();
        };
        let mut resolutions = buckets
            .iter()
            .filter(|(_, bucket)| {
                bucket
                    .try_lock()
                    .map(|slot| slot.is_some())
                    .unwrap_or(false)
            })
            .map(|(resolution, _)| *resolution)
            .collect::<Vec<_>>();
        resolutions.sort();
        resolutions
    }
}

impl std::fmt::Debug for HexagonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HexagonCache")
            .field("computed", &self.computed_resolutions())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use h3o::geom::ContainmentMode;

    use super::*;
    use crate::feature::FeatureCollection;
    use crate::test_helpers::{square_feature, test_cell_center, CountingTiler, GatedTiler};
    use crate::tiler::{H3Tiler, HexagonCell};

    fn h3_tiler() -> H3Tiler {
        let center = test_cell_center(Resolution::Three);
        let features = FeatureCollection::new(vec![square_feature(
            center.lng(),
            center.lat(),
            0.2,
            "FF0000",
        )]);
        H3Tiler::new(Arc::new(features), ContainmentMode::ContainsCentroid)
    }

    #[test]
    fn computes_once_per_resolution() {
        let counting = Arc::new(CountingTiler::new(h3_tiler()));
        let cache = HexagonCache::new(counting.clone());

        let first = cache.get_or_compute(Resolution::Five).expect("tiling");
        let second = cache.get_or_compute(Resolution::Five).expect("tiling");
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counting.invocations(), 1);

        cache.get_or_compute(Resolution::Three).expect("tiling");
        cache.get_or_compute(Resolution::Three).expect("tiling");
        assert_eq!(counting.invocations(), 2);
        assert_eq!(counting.invocations_for(Resolution::Three), 1);
        assert_eq!(
            cache.computed_resolutions(),
            vec![Resolution::Three, Resolution::Five]
        );
    }

    #[test]
    fn peek_never_computes() {
        let counting = Arc::new(CountingTiler::new(h3_tiler()));
        let cache = HexagonCache::new(counting.clone());
        assert!(cache.peek(Resolution::Four).is_none());
        assert_eq!(counting.invocations(), 0);

        let set = cache.get_or_compute(Resolution::Four).expect("tiling");
        let peeked = cache.peek(Resolution::Four).expect("cached");
        assert!(Arc::ptr_eq(&set, &peeked));
        assert_eq!(counting.invocations(), 1);
    }

    #[test]
    fn concurrent_requests_share_one_computation() {
        let counting = Arc::new(CountingTiler::new(GatedTiler::new(h3_tiler())));
        let cache = Arc::new(HexagonCache::new(counting.clone()));

        let handles = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.get_or_compute(Resolution::Four))
            })
            .collect::<Vec<_>>();
        // Give every thread a chance to reach the bucket before releasing the tiler.
        thread::sleep(std::time::Duration::from_millis(50));
        counting.inner().open();

        let sets = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread").expect("tiling"))
            .collect::<Vec<_>>();
        assert!(sets.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(counting.invocations(), 1);
    }

    struct FlakyTiler {
        calls: AtomicUsize,
    }

    impl HexagonTiler for FlakyTiler {
        fn tile(&self, _resolution: Resolution) -> Result<Vec<HexagonCell>, TilingError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TilingError::Other("first call fails".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn failures_are_not_cached() {
        let flaky = Arc::new(FlakyTiler {
            calls: AtomicUsize::new(0),
        });
        let cache = HexagonCache::new(flaky.clone());
        assert!(cache.get_or_compute(Resolution::Two).is_err());
        assert!(cache.peek(Resolution::Two).is_none());
        assert!(cache.get_or_compute(Resolution::Two).is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }
}
