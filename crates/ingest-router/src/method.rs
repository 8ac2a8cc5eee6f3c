/// HTTP methods understood by the router
///
/// `All` is the synthetic method used by `all(path, ...)` registrations; it
/// matches every concrete method but is never produced by parsing a request.
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
    All,
}

impl Method {
    /// Every concrete method, in the order they are usually documented
    pub const CONCRETE: [Method; 9] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Connect,
        Method::Trace,
    ];

    /// Upper-case wire name (`GET`, `POST`, ..., `ALL`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
            Method::All => "ALL",
        }
    }

    /// Whether a route registered with `self` accepts a request made with `other`
    ///
    /// ```
    /// use ingest_router::Method;
    ///
    /// assert!(Method::All.accepts(Method::Delete));
    /// assert!(Method::Get.accepts(Method::Get));
    /// assert!(!Method::Get.accepts(Method::Post));
    /// ```
    pub fn accepts(&self, other: Method) -> bool {
        *self == Method::All || *self == other
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Get
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown HTTP method: {}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "CONNECT" => Ok(Method::Connect),
            "TRACE" => Ok(Method::Trace),
            "ALL" => Ok(Method::All),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("Patch".parse::<Method>(), Ok(Method::Patch));
        assert_eq!("ALL".parse::<Method>(), Ok(Method::All));
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for method in Method::CONCRETE {
            assert_eq!(method.to_string().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn test_all_accepts_everything() {
        for method in Method::CONCRETE {
            assert!(Method::All.accepts(method));
        }
        assert!(!Method::Post.accepts(Method::Get));
    }
}
