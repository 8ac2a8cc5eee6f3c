// File: src/data.rs
// Purpose: Ordered key-value store shared by requests, responses and the config store

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Ordered key-value store with dotted-path access
///
/// Keys keep insertion order. Dotted paths (`user.name`, `items.0`) walk
/// into nested objects and arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Data {
    entries: IndexMap<String, JsonValue>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level value for `key`
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    /// Top-level string value for `key`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(JsonValue::as_str)
    }

    /// Sets a top-level value, keeping the original position when replacing
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Removes a top-level value, preserving the order of the rest
    pub fn delete(&mut self, key: &str) -> Option<JsonValue> {
        self.entries.shift_remove(key)
    }

    /// Whether `key` (or a dotted path) resolves to a value
    pub fn has(&self, key: &str) -> bool {
        self.get_path(key).is_some()
    }

    /// Walks a dotted path into nested objects and arrays
    ///
    /// ```
    /// use ingest::Data;
    /// use serde_json::json;
    ///
    /// let mut data = Data::new();
    /// data.set("user", json!({ "name": "john", "tags": ["a", "b"] }));
    /// assert_eq!(data.get_path("user.name"), Some(&json!("john")));
    /// assert_eq!(data.get_path("user.tags.1"), Some(&json!("b")));
    /// assert_eq!(data.get_path("user.age"), None);
    /// ```
    pub fn get_path(&self, path: &str) -> Option<&JsonValue> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.entries.get(first)?;
        for part in parts {
            current = match current {
                JsonValue::Object(map) => map.get(part)?,
                JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Sets a value at a dotted path, creating intermediate objects
    ///
    /// Non-object values along the way are replaced by objects.
    pub fn set_path(&mut self, path: &str, value: impl Into<JsonValue>) -> &mut Self {
        let value = value.into();
        let Some((first, rest)) = path.split_once('.') else {
            self.entries.insert(path.to_string(), value);
            return self;
        };

        let slot = self
            .entries
            .entry(first.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        set_nested(slot, rest, value);
        self
    }

    /// Reads a value (or dotted path) as a concrete type
    ///
    /// A missing key deserializes from `null`, so `Option<T>` reads never
    /// fail on absence.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get_path(path).cloned().unwrap_or(JsonValue::Null);
        serde_json::from_value(value).map_err(|source| Error::Data {
            key: path.to_string(),
            expected: std::any::type_name::<T>(),
            source,
        })
    }

    /// Merges an object into this store; later values win
    ///
    /// Non-object values are ignored.
    pub fn merge(&mut self, value: JsonValue) -> &mut Self {
        if let JsonValue::Object(map) = value {
            self.entries.extend(map);
        }
        self
    }

    /// Merges another store into this one; later values win
    pub fn extend(&mut self, other: Data) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The whole store as a JSON object
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

fn set_nested(slot: &mut JsonValue, path: &str, value: JsonValue) {
    if !slot.is_object() {
        *slot = JsonValue::Object(Map::new());
    }
    let JsonValue::Object(map) = slot else {
        return;
    };

    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let next = map
                .entry(head.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            set_nested(next, rest, value);
        }
    }
}

impl From<JsonValue> for Data {
    fn from(value: JsonValue) -> Self {
        let mut data = Data::new();
        data.merge(value);
        data
    }
}

impl FromIterator<(String, JsonValue)> for Data {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Data {
    type Item = (String, JsonValue);
    type IntoIter = indexmap::map::IntoIter<String, JsonValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
