//! # Ingest Router
//!
//! Path pattern matching for the ingest event router:
//! - Literal segments (`/about`)
//! - Named variables (`/blog/:name/articles`)
//! - Single-segment wildcards (`/blog/*/comments`), bound positionally
//! - Rest wildcards (`/blog/**`), legal only as the final segment
//!
//! Patterns are compiled once at registration time and matched segment by
//! segment. Matching is case-sensitive and never does prefix matching beyond
//! what a trailing `**` allows.
//!
//! ## Path Normalization
//!
//! Request paths are normalized before matching:
//! - Trailing slashes: `/path/` → `/path`
//! - Double slashes: `/path//to` → `/path/to`
//! - Backslashes: `\path\to` → `/path/to`
//!
//! ## Example
//!
//! ```
//! use ingest_router::PathPattern;
//!
//! let pattern = PathPattern::compile("/blog/:name/articles").unwrap();
//! let params = pattern.matches("/blog/john/articles").unwrap();
//! assert_eq!(params.get("name"), Some("john"));
//!
//! assert!(pattern.matches("/blog/john/jane/articles").is_none());
//! ```

use std::fmt;

mod error;
mod method;
pub mod path;
pub mod route;

pub use error::PatternError;
pub use method::{Method, UnknownMethod};
pub use path::{is_valid_path, normalize_path, split_url};
pub use route::{classify_segment, ParamKey, Params, Segment};

// ============================================================================
// Core Types
// ============================================================================

/// A compiled path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    /// Pattern text as registered, e.g. "/blog/:name"
    source: String,
    /// Ordered segment specifiers
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles a pattern string
    ///
    /// Empty segments are ignored, so `/blog/` and `/blog` compile to the same
    /// pattern.
    ///
    /// # Errors
    ///
    /// - the pattern does not start with `/`
    /// - a `:` variable has no name, or a name is bound twice
    /// - `**` appears more than once, or anywhere but the last segment
    ///
    /// # Examples
    ///
    /// ```
    /// use ingest_router::{PathPattern, PatternError};
    ///
    /// assert!(PathPattern::compile("/blog/**").is_ok());
    /// assert_eq!(
    ///     PathPattern::compile("/blog/**/comments"),
    ///     Err(PatternError::RestNotLast("/blog/**/comments".to_string()))
    /// );
    /// ```
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        if !source.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(source.to_string()));
        }

        let segments: Vec<Segment> = path::segments(source).map(classify_segment).collect();

        let rest_count = segments.iter().filter(|s| **s == Segment::Rest).count();
        if rest_count > 1 {
            return Err(PatternError::MultipleRest(source.to_string()));
        }
        if rest_count == 1 && segments.last() != Some(&Segment::Rest) {
            return Err(PatternError::RestNotLast(source.to_string()));
        }

        let mut names: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Named(name) = segment {
                if name.is_empty() {
                    return Err(PatternError::EmptyVariable(source.to_string()));
                }
                if names.contains(&name.as_str()) {
                    return Err(PatternError::DuplicateVariable {
                        name: name.clone(),
                        pattern: source.to_string(),
                    });
                }
                names.push(name);
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Pattern text as registered
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiled segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the pattern contains no variable or wildcard
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Names of the `:name` variables, in order
    pub fn variable_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Named(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Matches this pattern against a concrete path
    ///
    /// The path is normalized first; a query string must already be removed.
    /// Returns the extracted parameters, or `None` when the path does not fit.
    ///
    /// # Implementation Note
    ///
    /// Uses a tail-recursive helper that walks pattern and path segments
    /// simultaneously, carrying the parameter accumulator and the next
    /// positional index.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let normalized = normalize_path(path);
        let path_segments: Vec<&str> = path::segments(&normalized).collect();

        fn match_segments(
            pattern_segments: &[Segment],
            path_segments: &[&str],
            mut params: Params,
            next_index: usize,
        ) -> Option<Params> {
            // Base case: consumed all pattern segments
            let Some((pattern_seg, pattern_rest)) = pattern_segments.split_first() else {
                return if path_segments.is_empty() {
                    Some(params)
                } else {
                    None
                };
            };

            match pattern_seg {
                // Rest wildcard: always last, needs at least one segment
                Segment::Rest => {
                    if path_segments.is_empty() {
                        return None;
                    }
                    params.push(next_index, path_segments.join("/"));
                    Some(params)
                }
                Segment::Wildcard => {
                    let (value, path_rest) = path_segments.split_first()?;
                    params.push(next_index, *value);
                    match_segments(pattern_rest, path_rest, params, next_index + 1)
                }
                Segment::Named(name) => {
                    let (value, path_rest) = path_segments.split_first()?;
                    params.push(name.as_str(), *value);
                    match_segments(pattern_rest, path_rest, params, next_index)
                }
                Segment::Literal(text) => {
                    let (value, path_rest) = path_segments.split_first()?;
                    if text != value {
                        return None;
                    }
                    match_segments(pattern_rest, path_rest, params, next_index)
                }
            }
        }

        match_segments(&self.segments, &path_segments, Params::new(), 0)
    }

    /// Builds a concrete path by substituting parameters into the pattern
    ///
    /// Returns `None` if a variable or wildcard has no value.
    ///
    /// ```
    /// use ingest_router::{PathPattern, Params};
    ///
    /// let pattern = PathPattern::compile("/blog/:name/*").unwrap();
    /// let mut params = Params::new();
    /// params.push("name", "john");
    /// params.push(0usize, "comments");
    /// assert_eq!(pattern.generate(&params), Some("/blog/john/comments".to_string()));
    /// ```
    pub fn generate(&self, params: &Params) -> Option<String> {
        let mut next_index = 0;
        let parts = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Some(text.clone()),
                Segment::Named(name) => params.get(name).map(str::to_string),
                Segment::Wildcard | Segment::Rest => {
                    let value = params.index(next_index).map(str::to_string);
                    next_index += 1;
                    value
                }
            })
            .collect::<Option<Vec<String>>>()?;

        Some(format!("/{}", parts.join("/")))
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::compile(s)
    }
}
