//! Glob patterns over slash-separated paths.
//!
//! Supported syntax: `**` (any number of segments), `*` (within a segment),
//! `?` (one character) and `{a,b}` alternation.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::utils::path::to_slash;

#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
    base: PathBuf,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&translate(pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            base: literal_base(pattern),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.regex.is_match(&to_slash(path))
    }

    /// Directory prefix of the pattern without any wildcard.
    pub fn base(&self) -> &Path {
        &self.base
    }
}

fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    out.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut in_group = false;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

fn literal_base(pattern: &str) -> PathBuf {
    let mut base = Vec::new();
    for segment in pattern.split('/') {
        if segment.contains(['*', '?', '{']) {
            break;
        }
        base.push(segment);
    }
    // The last literal segment is the file name when nothing was wild.
    if base.len() == pattern.split('/').count() {
        base.pop();
    }
    PathBuf::from(base.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_star_matches_any_depth() {
        let glob = GlobPattern::new("/site/docs/**/page.toml").unwrap();
        assert!(glob.matches(Path::new("/site/docs/page.toml")));
        assert!(glob.matches(Path::new("/site/docs/a/b/page.toml")));
        assert!(!glob.matches(Path::new("/site/docs/a/page.deps.toml")));
        assert!(!glob.matches(Path::new("/site/other/page.toml")));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let glob = GlobPattern::new("/docs/*.md").unwrap();
        assert!(glob.matches(Path::new("/docs/a.md")));
        assert!(!glob.matches(Path::new("/docs/a/b.md")));
    }

    #[test]
    fn test_alternation_and_escape() {
        let glob = GlobPattern::new("/docs/**/*.{md,toml}").unwrap();
        assert!(glob.matches(Path::new("/docs/x/y.md")));
        assert!(glob.matches(Path::new("/docs/y.toml")));
        assert!(!glob.matches(Path::new("/docs/ymd")));
    }

    #[test]
    fn test_base() {
        let glob = GlobPattern::new("/site/docs/**/page.toml").unwrap();
        assert_eq!(glob.base(), Path::new("/site/docs"));
    }
}
