// File: src/context.rs
// Purpose: Per-invocation context handed to every action

use crate::config::ConfigStore;
use crate::server::Server;
use ingest_router::Params;

/// What an action knows about the dispatch it is part of
#[derive(Debug, Clone)]
pub struct Context {
    server: Server,
    event: String,
    key: String,
    params: Params,
}

impl Context {
    pub(crate) fn new(server: Server, event: &str, key: String, params: Params) -> Self {
        Self {
            server,
            event: event.to_string(),
            key,
            params,
        }
    }

    /// Server that dispatched this action, for nested emits
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Name that was emitted, e.g. `GET /blog/john`
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Source of the key that matched, e.g. `GET /blog/:name`
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn config(&self) -> ConfigStore {
        self.server.config()
    }
}
