/// Segment classification for route patterns
///
/// Pure parsing of a single pattern segment into a typed value.

/// One specifier of a compiled path pattern
///
/// # Examples
///
/// ```
/// use ingest_router::route::pattern::{classify_segment, Segment};
///
/// assert_eq!(classify_segment("blog"), Segment::Literal("blog".to_string()));
/// assert_eq!(classify_segment(":name"), Segment::Named("name".to_string()));
/// assert_eq!(classify_segment("*"), Segment::Wildcard);
/// assert_eq!(classify_segment("**"), Segment::Rest);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exact text, compared case-sensitively
    Literal(String),
    /// `:name`, binds one segment under `name`
    Named(String),
    /// `*`, binds one segment under the next positional index
    Wildcard,
    /// `**`, binds one or more trailing segments joined by `/`
    Rest,
}

impl Segment {
    /// Whether this segment binds a positional parameter
    pub fn is_positional(&self) -> bool {
        matches!(self, Segment::Wildcard | Segment::Rest)
    }
}

/// Classifies a segment into a pattern type (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Rest**: `**`
/// 2. **Wildcard**: `*`
/// 3. **Named**: `:name`
/// 4. **Literal**: Any other text
pub fn classify_segment(segment: &str) -> Segment {
    match segment {
        "**" => Segment::Rest,
        "*" => Segment::Wildcard,
        _ => match segment.strip_prefix(':') {
            Some(name) => Segment::Named(name.to_string()),
            None => Segment::Literal(segment.to_string()),
        },
    }
}
