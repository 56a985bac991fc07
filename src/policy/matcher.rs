//! Route matching.
//!
//! The same logical route can be observed under different paths depending on
//! how routers are nested: the full request path, the path relative to a mount
//! point, and the mount prefix joined with that relative path. [`RequestPaths`]
//! collects these candidates and a route matches when its pattern matches any
//! of them.

use regex::Regex;

use crate::error::Result;

/// A compiled route pattern such as `/api/posts/:postId/comment`.
///
/// Every `:name` segment matches one non-empty run of non-`/` characters;
/// everything else matches literally. Matching is anchored at both ends.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    regex: Regex,
}

impl RoutePattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        let body = pattern
            .split('/')
            .map(|segment| {
                if segment.starts_with(':') && segment.len() > 1 {
                    "[^/]+".to_string()
                } else {
                    regex::escape(segment)
                }
            })
            .collect::<Vec<_>>()
            .join("/");
        let regex = Regex::new(&format!("^{}$", body))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Candidate path representations of one inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestPaths {
    candidates: Vec<String>,
}

impl RequestPaths {
    /// Build the candidates from the full request target (query allowed), the
    /// path relative to the current mount point, and that mount point's prefix.
    pub fn new(original: &str, relative: &str, mount: Option<&str>) -> Self {
        let mut paths = Self::default();
        paths.push(strip_query(original).to_string());
        paths.push(strip_query(relative).to_string());
        if let Some(mount) = mount {
            let mount = mount.trim_end_matches('/');
            paths.push(format!("{}{}", mount, strip_query(relative)));
        }
        paths
    }

    /// A request observed under a single path.
    pub fn single(path: &str) -> Self {
        Self::new(path, path, None)
    }

    fn push(&mut self, path: String) {
        if !path.is_empty() && !self.candidates.contains(&path) {
            self.candidates.push(path);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(String::as_str)
    }

    /// The most complete representation, used in log lines.
    pub fn display(&self) -> &str {
        self.candidates.first().map(String::as_str).unwrap_or("/")
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    method: String,
    pattern: RoutePattern,
}

/// An ordered table of `(method, pattern)` entries.
///
/// Lookups return entry indices in declaration order so callers can map them
/// back to whatever records the table was built from.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn compile<'a, I>(routes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let routes = routes
            .into_iter()
            .map(|(method, path)| {
                Ok(CompiledRoute {
                    method: method.trim().to_uppercase(),
                    pattern: RoutePattern::compile(path)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routes })
    }

    /// Indices of every entry matching `method` and any candidate path.
    pub fn matches(&self, method: &str, paths: &RequestPaths) -> Vec<usize> {
        let method = method.to_uppercase();
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.method == method)
            .filter(|(_, route)| paths.iter().any(|p| route.pattern.is_match(p)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_match(&self, method: &str, paths: &RequestPaths) -> bool {
        !self.matches(method, paths).is_empty()
    }

}
