/// dirmap core: scanning, aggregation, caching and data model.
///
/// This crate contains all scan-side logic with zero rendering dependencies.
/// Layout and shading of the scanned tree live in `dirmap-treemap`.
///
/// # Modules
///
/// - [`model`]: Arena-allocated directory tree with lazily aggregated summaries.
/// - [`scanner`]: Cooperative job queue and the local/remote directory read jobs.
/// - [`cache`]: Compressed line-oriented cache files (write, validate, replay).
/// - [`exclude`]: Pattern rules that stop the scanner from descending.
/// - [`events`]: Notifications delivered to tree observers.
/// - [`analysis`]: Small post-scan helpers (file categories, largest files).
pub mod analysis;
pub mod cache;
pub mod error;
pub mod events;
pub mod exclude;
pub mod model;
pub mod scanner;

pub use error::{CoreError, Result};
