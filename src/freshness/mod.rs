//! Freshness detection: blake3 content fingerprints for cached paths.

mod hash;

pub use hash::{ContentHash, compute_file_hash};
