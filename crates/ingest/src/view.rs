// File: src/view.rs
// Purpose: View engine collaborator and the filesystem template engine

use crate::config::ViewConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renders view entries named by `Action::View`
#[async_trait]
pub trait ViewEngine: Send + Sync {
    /// Renders `entry` with `data` as template input
    async fn render(&self, entry: &str, data: &JsonValue) -> Result<String>;

    /// Absolute path of the file an entry names
    async fn resolve(&self, entry: &str) -> Result<PathBuf>;
}

/// Template engine reading `{placeholder}` templates from disk
///
/// - `{name}` / `{user.name}` are HTML-escaped, `{{{name}}}` is inserted raw
/// - unknown placeholders are left untouched
/// - entries starting with an alias (`@/` by default) resolve against it,
///   other relative entries against the root
pub struct TemplateEngine {
    root: PathBuf,
    extension: String,
    aliases: Vec<(String, PathBuf)>,
    layout: Option<String>,
    cache: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl TemplateEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&ViewConfig {
            root: root.into().to_string_lossy().into_owned(),
            ..ViewConfig::default()
        })
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        let root = PathBuf::from(&config.root);
        let mut aliases: Vec<(String, PathBuf)> = config
            .aliases
            .iter()
            .map(|(prefix, dir)| (prefix.clone(), PathBuf::from(dir)))
            .collect();
        if !aliases.iter().any(|(prefix, _)| prefix == "@/") {
            aliases.push(("@/".to_string(), root.clone()));
        }
        // Longest prefix wins
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            root,
            extension: config.extension.clone(),
            aliases,
            layout: config.layout.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an entry maps to, without touching the filesystem
    pub fn path_for(&self, entry: &str) -> PathBuf {
        let mut path = self
            .aliases
            .iter()
            .find_map(|(prefix, dir)| entry.strip_prefix(prefix.as_str()).map(|rest| dir.join(rest)))
            .unwrap_or_else(|| {
                let entry = Path::new(entry);
                if entry.is_absolute() {
                    entry.to_path_buf()
                } else {
                    self.root.join(entry)
                }
            });

        if path.extension().is_none() && !self.extension.is_empty() {
            path.set_extension(&self.extension);
        }
        path
    }

    /// Drops every cached template
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    async fn load(&self, entry: &str) -> Result<Arc<str>> {
        let path = self.resolve(entry).await?;
        if let Some(template) = self.cache.read().get(&path) {
            return Ok(template.clone());
        }

        let source: Arc<str> = tokio::fs::read_to_string(&path).await?.into();
        self.cache.write().insert(path, source.clone());
        Ok(source)
    }
}

#[async_trait]
impl ViewEngine for TemplateEngine {
    async fn render(&self, entry: &str, data: &JsonValue) -> Result<String> {
        let page = interpolate(&self.load(entry).await?, data);

        let Some(layout) = &self.layout else {
            return Ok(page);
        };
        let layout = interpolate(&self.load(layout).await?, data);
        Ok(layout.replace("{slots.content}", &page))
    }

    async fn resolve(&self, entry: &str) -> Result<PathBuf> {
        let path = self.path_for(entry);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(Error::ViewNotFound {
                entry: entry.to_string(),
                path,
            }),
        }
    }
}

/// Replaces placeholders in a template with values from `data`
pub fn interpolate(template: &str, data: &JsonValue) -> String {
    static VAR_REGEX: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\{\{\{\s*([a-zA-Z_][a-zA-Z0-9_\.]*)\s*\}\}\}|\{([a-zA-Z_][a-zA-Z0-9_\.]*)\}")
            .expect("placeholder regex is valid")
    });

    VAR_REGEX
        .replace_all(template, |caps: &Captures| {
            let (name, raw) = match (caps.get(1), caps.get(2)) {
                (Some(name), _) => (name.as_str(), true),
                (None, Some(name)) => (name.as_str(), false),
                _ => return caps[0].to_string(),
            };
            // Layout slot is filled after interpolation
            if name == "slots.content" {
                return caps[0].to_string();
            }
            match lookup(data, name) {
                Some(value) if raw => display(value),
                Some(value) => escape_html(&display(value)),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn lookup<'a>(data: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(data, |current, part| match current {
        JsonValue::Object(map) => map.get(part),
        JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?),
        _ => None,
    })
}

fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Escapes the five HTML-significant characters
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
