/// Parameters extracted from a matched path
use std::fmt;

/// Key of an extracted parameter: a `:name` variable or a wildcard position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKey {
    Name(String),
    Index(usize),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Name(name) => f.write_str(name),
            ParamKey::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Name(name)
    }
}

impl From<usize> for ParamKey {
    fn from(index: usize) -> Self {
        ParamKey::Index(index)
    }
}

/// Ordered parameter map, in the order segments appear in the pattern
///
/// ```
/// use ingest_router::{Params, ParamKey};
///
/// let mut params = Params::new();
/// params.push("name", "john");
/// params.push(0usize, "2024");
///
/// assert_eq!(params.get("name"), Some("john"));
/// assert_eq!(params.index(0), Some("2024"));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(ParamKey, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter, replacing an earlier value bound to the same key
    pub fn push(&mut self, key: impl Into<ParamKey>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Value bound to a named variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(k, v)| match k {
            ParamKey::Name(n) if n == name => Some(v.as_str()),
            _ => None,
        })
    }

    /// Value bound to a positional wildcard
    pub fn index(&self, index: usize) -> Option<&str> {
        self.entries.iter().find_map(|(k, v)| match k {
            ParamKey::Index(i) if *i == index => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positional values only, in index order
    pub fn positional(&self) -> Vec<&str> {
        let mut indexed: Vec<(usize, &str)> = self
            .entries
            .iter()
            .filter_map(|(k, v)| match k {
                ParamKey::Index(i) => Some((*i, v.as_str())),
                ParamKey::Name(_) => None,
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }
}

impl IntoIterator for Params {
    type Item = (ParamKey, String);
    type IntoIter = std::vec::IntoIter<(ParamKey, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(ParamKey, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (ParamKey, String)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}
