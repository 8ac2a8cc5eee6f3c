// File: src/status.rs
// Purpose: Status codes and reason phrases used by responses and emit results

use http::StatusCode;

/// Code reported when a chain was stopped before it finished
pub const ABORTED: u16 = 309;

/// Reason phrase for a status code, or `"Unknown"` for unregistered codes
///
/// Uses the IANA phrases, plus `309 Aborted` for stopped chains.
///
/// ```
/// use ingest::status::reason;
///
/// assert_eq!(reason(200), "OK");
/// assert_eq!(reason(404), "Not Found");
/// assert_eq!(reason(309), "Aborted");
/// assert_eq!(reason(799), "Unknown");
/// ```
pub fn reason(code: u16) -> &'static str {
    if code == ABORTED {
        return "Aborted";
    }
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown")
}

/// Whether the code is a 4xx or 5xx
pub fn is_error(code: u16) -> bool {
    (400..600).contains(&code)
}

/// Whether the code is a 3xx redirect
pub fn is_redirect(code: u16) -> bool {
    matches!(code, 301 | 302 | 303 | 307 | 308)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(is_error(404));
        assert!(is_error(503));
        assert!(!is_error(200));
        assert!(is_redirect(302));
        assert!(!is_redirect(309));
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason(422), "Unprocessable Entity");
        assert_eq!(reason(500), "Internal Server Error");
        assert_eq!(reason(ABORTED), "Aborted");
        assert_eq!(reason(42), "Unknown");
    }
}
