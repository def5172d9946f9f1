//! Per-entity cache persistence.
//!
//! One JSON record per entity id, holding the fingerprint of every cached
//! path at the time of the last successful build.

mod record;
mod store;

/// Default cache directory name (inside project root)
pub(crate) const CACHE_DIR: &str = ".docweave/cache";

pub use record::{CACHE_VERSION, CacheRecord};
pub use store::CacheStore;
