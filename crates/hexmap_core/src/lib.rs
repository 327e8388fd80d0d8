pub mod cache;
pub mod config;
pub mod error;
pub mod feature;
pub mod render;
pub mod reproject;
pub mod resolution;
pub mod source;
pub mod tiler;
pub mod viewport;
pub mod worker;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
