// File: src/error.rs
// Purpose: Error taxonomy for registration, views, data coercion and config

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the ingest core
///
/// Failures inside actions are `anyhow::Error` and become data on the
/// response; this enum covers everything around them.
#[derive(Debug, Error)]
pub enum Error {
    /// A route path could not be compiled
    #[error(transparent)]
    Pattern(#[from] ingest_router::PatternError),

    /// A regex event pattern could not be compiled
    #[error("invalid event pattern '{pattern}': {source}")]
    InvalidEvent {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Unknown HTTP method in an event name or request
    #[error(transparent)]
    InvalidMethod(#[from] ingest_router::UnknownMethod),

    /// A view entry did not resolve to a file
    #[error("view not found: {entry} (looked in {path:?})")]
    ViewNotFound { entry: String, path: PathBuf },

    /// A view action ran but no view engine is configured
    #[error("no view engine configured to render '{0}'")]
    NoViewEngine(String),

    /// A stored value could not be converted to the requested type
    #[error("cannot read '{key}' as {expected}: {source}")]
    Data {
        key: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_view_not_found() {
        let err = Error::ViewNotFound {
            entry: "@/home".into(),
            path: PathBuf::from("views/home.html"),
        };
        assert_eq!(
            err.to_string(),
            "view not found: @/home (looked in \"views/home.html\")"
        );
    }

    #[test]
    fn display_pattern_error_is_transparent() {
        let err: Error = ingest_router::PatternError::RestNotLast("/**/x".into()).into();
        assert_eq!(err.to_string(), "rest wildcard '**' must be the last segment: /**/x");
    }
}
