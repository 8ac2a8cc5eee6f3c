/// Route pattern module
///
/// Pure components for classifying pattern segments and carrying the
/// parameters a match extracts.

pub mod params;
pub mod pattern;

pub use params::{ParamKey, Params};
pub use pattern::{classify_segment, Segment};
