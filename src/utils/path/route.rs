//! Slash-separated key utilities.
//!
//! Entity ids and output paths are always stored with forward slashes so
//! they compare equal across platforms.

use std::path::{Component, Path};

/// Render a path with forward slashes.
///
/// Absolute paths keep their leading slash.
#[inline]
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => out.push('/'),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

/// Path of `path` relative to `root`, slash separated.
///
/// Falls back to the full path when `path` is outside `root`.
#[inline]
pub fn relative_slash(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    to_slash(relative).trim_start_matches('/').to_string()
}

/// Convert an entity id to a safe filename for caching.
///
/// Replaces `/` with `_` and any other character outside `[A-Za-z0-9._-]`
/// with `-`, then appends a short blake3 digest of the id. The readable
/// part alone is lossy (`a/b` and `a_b` flatten alike); the digest keeps
/// distinct ids on distinct files.
///
/// # Examples
/// ```ignore
/// assert!(id_to_safe_filename("guide/intro").starts_with("guide_intro-"));
/// assert_ne!(id_to_safe_filename("a/b"), id_to_safe_filename("a_b"));
/// ```
#[inline]
pub fn id_to_safe_filename(id: &str) -> String {
    let readable: String = id
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '-',
        })
        .collect();
    let digest = blake3::hash(id.as_bytes()).to_hex();
    format!("{readable}-{}", &digest[..DIGEST_LEN])
}

/// Hex digits of the id digest kept in file names.
const DIGEST_LEN: usize = 12;
