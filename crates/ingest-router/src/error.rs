/// Errors raised while compiling a path pattern
use thiserror::Error;

/// Reasons a path pattern can be rejected at registration time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Patterns must be absolute
    #[error("pattern must start with '/': {0}")]
    MissingLeadingSlash(String),

    /// `:` with nothing after it
    #[error("empty variable name in pattern: {0}")]
    EmptyVariable(String),

    /// The same variable bound twice
    #[error("duplicate variable '{name}' in pattern: {pattern}")]
    DuplicateVariable { name: String, pattern: String },

    /// `**` anywhere but the final segment
    #[error("rest wildcard '**' must be the last segment: {0}")]
    RestNotLast(String),

    /// More than one `**`
    #[error("pattern may contain at most one rest wildcard '**': {0}")]
    MultipleRest(String),
}
