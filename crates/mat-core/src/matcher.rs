//! Ignore matching for watched and mounted paths.

use regex::Regex;

use mat_fs::NormalizedPath;

use crate::Result;

/// Decides whether a path is invisible to the engine.
pub trait IgnoreMatcher: Send + Sync {
    fn is_ignored(&self, path: &NormalizedPath) -> bool;
}

/// Ignores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl IgnoreMatcher for NoIgnore {
    fn is_ignored(&self, _path: &NormalizedPath) -> bool {
        false
    }
}

/// Package patterns visible beneath `node_modules` unless configured otherwise.
pub const DEFAULT_ALLOWED_PACKAGES: &[&str] = &["snippet*"];

/// Standard ignore rules.
///
/// Anything inside `.git` (or a configured extra directory name) is ignored.
/// Paths below a `node_modules` directory are ignored unless they belong to
/// an allowed package sitting directly beneath it; a `node_modules` nested
/// inside an allowed package is ignored again. A top-level `node_modules`
/// directory itself stays visible so the watcher can descend to allowed
/// packages.
#[derive(Debug, Clone)]
pub struct DefaultIgnore {
    /// Each allowed package as per-segment patterns (`@scope/name` has two).
    allowed: Vec<Vec<Regex>>,
    extra: Vec<String>,
}

impl DefaultIgnore {
    /// Build a matcher from package patterns (`*` matches within a segment)
    /// and extra directory names to ignore everywhere.
    pub fn new<P, E>(allowed: P, extra: E) -> Result<Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let allowed = allowed
            .into_iter()
            .filter(|package| !package.as_ref().trim().is_empty())
            .map(|package| {
                NormalizedPath::new(package.as_ref())
                    .segments()
                    .map(segment_regex)
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| crate::Error::Config {
                message: format!("invalid package pattern: {e}"),
            })?;

        Ok(Self {
            allowed,
            extra: extra.into_iter().map(Into::into).collect(),
        })
    }

    /// Number of leading segments of `rest` taken by an allowed package, or
    /// `Some(0)` if `rest` is a strict prefix of one (a scope directory).
    fn allowed_package_len(&self, rest: &[&str]) -> Option<usize> {
        self.allowed.iter().find_map(|patterns| {
            let matched = patterns
                .iter()
                .zip(rest)
                .take_while(|(pattern, segment)| pattern.is_match(segment))
                .count();
            if matched == patterns.len() {
                Some(matched)
            } else if matched == rest.len() {
                Some(0)
            } else {
                None
            }
        })
    }
}

impl Default for DefaultIgnore {
    fn default() -> Self {
        Self {
            allowed: DEFAULT_ALLOWED_PACKAGES
                .iter()
                .filter_map(|package| segment_regex(package).ok().map(|re| vec![re]))
                .collect(),
            extra: Vec::new(),
        }
    }
}

impl IgnoreMatcher for DefaultIgnore {
    fn is_ignored(&self, path: &NormalizedPath) -> bool {
        let segments: Vec<&str> = path.segments().collect();
        let mut idx = 0;
        let mut inside_package = false;

        while idx < segments.len() {
            let segment = segments[idx];
            if segment == ".git" || self.extra.iter().any(|extra| extra == segment) {
                return true;
            }
            if segment == "node_modules" {
                if inside_package {
                    return true;
                }
                let rest = &segments[idx + 1..];
                if rest.is_empty() {
                    return false;
                }
                match self.allowed_package_len(rest) {
                    Some(0) => return false,
                    Some(len) => {
                        inside_package = true;
                        idx += 1 + len;
                        continue;
                    }
                    None => return true,
                }
            }
            idx += 1;
        }

        false
    }
}

fn segment_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^/]*");
    Regex::new(&format!("^{body}$"))
}
