//! Path utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `resolve_path`)
//! - [`route`]: Slash-separated keys (`to_slash`, `relative_slash`, `id_to_safe_filename`)

pub mod fs;
pub mod route;

pub use fs::{normalize_path, resolve_path};
pub use route::{id_to_safe_filename, relative_slash, to_slash};
