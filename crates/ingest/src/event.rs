// File: src/event.rs
// Purpose: Event keys and the priority-ordered action registry

use crate::action::Action;
use crate::error::{Error, Result};
use crate::status;
use ingest_router::{split_url, Method, Params, PathPattern};
use regex::Regex;
use std::fmt;

/// What an action is registered under
#[derive(Clone)]
pub enum EventKey {
    /// Exact event name, e.g. `"request"` or `"user-created"`
    Literal(String),
    /// Regular expression tested against emitted names
    Pattern(Regex),
    /// Method plus path pattern, tested against `"METHOD /path"` names
    Route { method: Method, pattern: PathPattern },
}

impl EventKey {
    pub fn literal(name: impl Into<String>) -> Self {
        EventKey::Literal(name.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(EventKey::Pattern)
            .map_err(|source| Error::InvalidEvent {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn route(method: Method, path: &str) -> Result<Self> {
        Ok(EventKey::Route {
            method,
            pattern: PathPattern::compile(path)?,
        })
    }

    /// Text the key was built from; route keys render as `"METHOD /path"`
    pub fn source(&self) -> String {
        match self {
            EventKey::Literal(name) => name.clone(),
            EventKey::Pattern(regex) => regex.as_str().to_string(),
            EventKey::Route { method, pattern } => format!("{} {}", method, pattern.source()),
        }
    }

    /// Tests an emitted name against this key
    ///
    /// Regex capture groups become params: named groups by name, the rest by
    /// position. Route keys bind the path pattern's variables.
    pub fn matches(&self, name: &str) -> Option<Params> {
        match self {
            EventKey::Literal(literal) => (literal == name).then(Params::new),
            EventKey::Pattern(regex) => {
                let captures = regex.captures(name)?;
                let mut params = Params::new();
                let mut position: usize = 0;
                for (group, group_name) in regex.capture_names().enumerate().skip(1) {
                    let Some(value) = captures.get(group) else {
                        continue;
                    };
                    match group_name {
                        Some(group_name) => params.push(group_name, value.as_str()),
                        None => {
                            params.push(position, value.as_str());
                            position += 1;
                        }
                    }
                }
                Some(params)
            }
            EventKey::Route { method, pattern } => {
                let (requested, path) = parse_route_event(name)?;
                if !method.accepts(requested) {
                    return None;
                }
                pattern.matches(split_url(path).0)
            }
        }
    }

    /// Two keys address the same listener list
    fn same_key(&self, other: &EventKey) -> bool {
        match (self, other) {
            (EventKey::Literal(a), EventKey::Literal(b)) => a == b,
            (EventKey::Pattern(a), EventKey::Pattern(b)) => a.as_str() == b.as_str(),
            (
                EventKey::Route { method: ma, pattern: pa },
                EventKey::Route { method: mb, pattern: pb },
            ) => ma == mb && pa.source() == pb.source(),
            _ => false,
        }
    }
}

impl fmt::Debug for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            EventKey::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            EventKey::Route { .. } => f.debug_tuple("Route").field(&self.source()).finish(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source())
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        EventKey::Literal(name.to_string())
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        EventKey::Literal(name)
    }
}

impl From<Regex> for EventKey {
    fn from(regex: Regex) -> Self {
        EventKey::Pattern(regex)
    }
}

/// Splits a `"METHOD /path"` event name
///
/// ```
/// use ingest::event::parse_route_event;
/// use ingest::Method;
///
/// assert_eq!(parse_route_event("POST /users"), Some((Method::Post, "/users")));
/// assert_eq!(parse_route_event("request"), None);
/// ```
pub fn parse_route_event(name: &str) -> Option<(Method, &str)> {
    let (method, path) = name.split_once(' ')?;
    let method = method.parse::<Method>().ok()?;
    path.starts_with('/').then_some((method, path))
}

/// One registered action
#[derive(Debug, Clone)]
pub struct Listener {
    pub action: Action,
    pub priority: i32,
    /// Registry-wide registration order, the tie-break between equal priorities
    pub sequence: u64,
}

/// A listener selected for an emitted name, with what its key captured
#[derive(Debug, Clone)]
pub struct Matched {
    pub listener: Listener,
    pub key: String,
    pub params: Params,
}

#[derive(Debug, Clone)]
struct Entry {
    key: EventKey,
    listeners: Vec<Listener>,
}

/// Event and route tables
///
/// Registration only appends; ordering by priority happens when a key is
/// resolved, so listeners added between dispatches are always honored.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    entries: Vec<Entry>,
    sequence: u64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action under a key
    ///
    /// Returns `false` when the same action is already registered there.
    pub fn register(&mut self, key: EventKey, action: Action, priority: i32) -> bool {
        let sequence = self.sequence;
        let index = match self.entries.iter().position(|entry| entry.key.same_key(&key)) {
            Some(index) => index,
            None => {
                self.entries.push(Entry {
                    key,
                    listeners: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let listeners = &mut self.entries[index].listeners;
        if listeners.iter().any(|listener| listener.action.same_as(&action)) {
            return false;
        }
        listeners.push(Listener {
            action,
            priority,
            sequence,
        });
        self.sequence += 1;
        true
    }

    /// Actions of exactly one key, highest priority first
    pub fn resolve(&self, key: &EventKey) -> Vec<Listener> {
        let mut listeners: Vec<Listener> = self
            .entries
            .iter()
            .filter(|entry| entry.key.same_key(key))
            .flat_map(|entry| entry.listeners.iter().cloned())
            .collect();
        sort_listeners(&mut listeners, |listener| listener);
        listeners
    }

    /// Every listener of every key matching `name`, merged into one chain
    pub fn matching(&self, name: &str) -> Vec<Matched> {
        let mut matched: Vec<Matched> = self
            .entries
            .iter()
            .filter_map(|entry| entry.key.matches(name).map(|params| (entry, params)))
            .flat_map(|(entry, params)| {
                let key = entry.key.source();
                entry.listeners.iter().map(move |listener| Matched {
                    listener: listener.clone(),
                    key: key.clone(),
                    params: params.clone(),
                })
            })
            .collect();
        sort_listeners(&mut matched, |matched| &matched.listener);
        matched
    }

    /// Registered keys in registration order
    pub fn keys(&self) -> Vec<&EventKey> {
        self.entries.iter().map(|entry| &entry.key).collect()
    }

    /// Number of registered listeners across all keys
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.listeners.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sequence = 0;
    }
}

fn sort_listeners<T>(items: &mut [T], listener: impl Fn(&T) -> &Listener) {
    items.sort_by(|a, b| {
        let (a, b) = (listener(a), listener(b));
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
}

/// Aggregate outcome of an emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStatus {
    /// Every matching action ran
    Ok,
    /// An action stopped the chain or failed
    Aborted,
    /// Nothing was registered for the name
    NotFound,
}

impl EmitStatus {
    pub fn code(&self) -> u16 {
        match self {
            EmitStatus::Ok => 200,
            EmitStatus::Aborted => status::ABORTED,
            EmitStatus::NotFound => 404,
        }
    }

    pub fn status(&self) -> &'static str {
        status::reason(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn views(listeners: &[Listener]) -> Vec<String> {
        listeners
            .iter()
            .map(|listener| match &listener.action {
                Action::View(entry) => entry.clone(),
                other => other.kind().to_string(),
            })
            .collect()
    }

    #[test]
    fn test_resolve_orders_by_priority_then_registration() {
        let mut registry = EventRegistry::new();
        let key = EventKey::literal("build");
        registry.register(key.clone(), Action::view("low"), -100);
        registry.register(key.clone(), Action::view("first-default"), 0);
        registry.register(key.clone(), Action::view("high"), 100);
        registry.register(key.clone(), Action::view("second-default"), 0);

        assert_eq!(
            views(&registry.resolve(&key)),
            vec!["high", "first-default", "second-default", "low"]
        );
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut registry = EventRegistry::new();
        assert!(registry.register("a".into(), Action::view("x"), 1));
        assert!(!registry.register("a".into(), Action::view("x"), 5));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(&"a".into())[0].priority, 1);
    }

    #[test]
    fn test_matching_merges_keys_by_priority() {
        let mut registry = EventRegistry::new();
        registry.register(EventKey::regex("^user-(.+)$").unwrap(), Action::view("pattern"), 0);
        registry.register("user-created".into(), Action::view("literal"), 0);
        registry.register("user-created".into(), Action::view("urgent"), 10);

        let matched = registry.matching("user-created");
        let order: Vec<String> = matched
            .iter()
            .map(|m| match &m.listener.action {
                Action::View(entry) => entry.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, vec!["urgent", "pattern", "literal"]);
        assert_eq!(matched[1].params.index(0), Some("created"));
    }

    #[test]
    fn test_named_regex_captures() {
        let key = EventKey::regex(r"^(?P<model>\w+)-(\w+)$").unwrap();
        let params = key.matches("post-search").unwrap();
        assert_eq!(params.get("model"), Some("post"));
        assert_eq!(params.index(0), Some("search"));
        assert!(key.matches("nope").is_none());
    }

    #[test]
    fn test_route_key_matching() {
        let key = EventKey::route(Method::Get, "/blog/:name").unwrap();
        assert_eq!(key.source(), "GET /blog/:name");
        assert_eq!(key.matches("GET /blog/john").unwrap().get("name"), Some("john"));
        assert!(key.matches("POST /blog/john").is_none());
        assert_eq!(key.matches("GET /blog/john?page=2").unwrap().get("name"), Some("john"));

        let any = EventKey::route(Method::All, "/").unwrap();
        for method in Method::CONCRETE {
            assert!(any.matches(&format!("{} /", method)).is_some());
        }
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            EventKey::regex("("),
            Err(Error::InvalidEvent { .. })
        ));
    }

    #[test]
    fn test_emit_status_codes() {
        assert_eq!(EmitStatus::Aborted.code(), 309);
        assert_eq!(EmitStatus::Aborted.status(), "Aborted");
        assert_eq!(EmitStatus::NotFound.status(), "Not Found");
    }
}
