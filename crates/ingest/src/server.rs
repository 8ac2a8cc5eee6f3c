// File: src/server.rs
// Purpose: Event dispatcher: registration, emit/resolve and the request lifecycle

use crate::action::Action;
use crate::config::{Config, ConfigStore};
use crate::context::Context;
use crate::error::Result as IngestResult;
use crate::event::{parse_route_event, EmitStatus, EventKey, EventRegistry, Matched};
use crate::request::Request;
use crate::response::{Response, StatusResponse};
use crate::view::{TemplateEngine, ViewEngine};
use anyhow::{anyhow, Context as _};
use futures::FutureExt;
use ingest_router::Method;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Name of the event emitted when an action fails
pub const ERROR_EVENT: &str = "error";
/// Emitted by `handle` before routing
pub const REQUEST_EVENT: &str = "request";
/// Emitted by `handle` after routing
pub const RESPONSE_EVENT: &str = "response";
/// Emitted by transports once they are accepting connections
pub const LISTEN_EVENT: &str = "listen";

struct ServerInner {
    registry: RwLock<EventRegistry>,
    config: ConfigStore,
    views: RwLock<Option<Arc<dyn ViewEngine>>>,
}

/// Event-driven router
///
/// Owns the event and route tables, the config store and an optional view
/// engine. Cloning yields another handle to the same server, which is how
/// actions reach it through [`Context::server`].
///
/// ```no_run
/// use ingest::{Action, Server};
///
/// # async fn run() -> anyhow::Result<()> {
/// let server = Server::new();
/// server.get("/hello/:name", Action::callback(|req, res, _ctx| async move {
///     let name = req.get("name").unwrap_or_default();
///     res.set_text(format!("Hello {}", name.as_str().unwrap_or("stranger")));
///     Ok(())
/// }), 0)?;
///
/// let response = server.resolve("GET /hello/john", serde_json::json!({})).await?;
/// assert_eq!(response.results, Some(serde_json::json!("Hello john")));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("listeners", &self.inner.registry.read().len())
            .field("has_views", &self.inner.views.read().is_some())
            .finish()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self::with_store(ConfigStore::new())
    }

    pub fn with_store(config: ConfigStore) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                registry: RwLock::new(EventRegistry::new()),
                config,
                views: RwLock::new(None),
            }),
        }
    }

    /// Server with the `[settings]` store and a template engine for `[view]`
    pub fn from_config(config: &Config) -> IngestResult<Self> {
        let server = Self::with_store(config.store()?);
        server.set_view_engine(TemplateEngine::from_config(&config.view));
        Ok(server)
    }

    pub fn config(&self) -> ConfigStore {
        self.inner.config.clone()
    }

    pub fn set_view_engine(&self, engine: impl ViewEngine + 'static) -> &Self {
        *self.inner.views.write() = Some(Arc::new(engine));
        self
    }

    pub fn view_engine(&self) -> Option<Arc<dyn ViewEngine>> {
        self.inner.views.read().clone()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers an action under an event name or pattern
    pub fn on(&self, event: impl Into<EventKey>, action: impl Into<Action>, priority: i32) -> &Self {
        let key = event.into();
        let action = action.into();
        debug!(event = %key, kind = action.kind(), priority, "registering listener");
        if !self.inner.registry.write().register(key, action, priority) {
            debug!("listener already registered, ignoring");
        }
        self
    }

    /// Registers an action for a method and path pattern
    pub fn route(
        &self,
        method: Method,
        path: &str,
        action: impl Into<Action>,
        priority: i32,
    ) -> IngestResult<&Self> {
        Ok(self.on(EventKey::route(method, path)?, action, priority))
    }

    pub fn get(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Get, path, action, priority)
    }

    pub fn post(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Post, path, action, priority)
    }

    pub fn put(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Put, path, action, priority)
    }

    pub fn patch(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Patch, path, action, priority)
    }

    pub fn delete(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Delete, path, action, priority)
    }

    pub fn head(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Head, path, action, priority)
    }

    pub fn options(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Options, path, action, priority)
    }

    pub fn connect(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Connect, path, action, priority)
    }

    pub fn trace(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::Trace, path, action, priority)
    }

    /// Registers an action for every method
    pub fn all(&self, path: &str, action: impl Into<Action>, priority: i32) -> IngestResult<&Self> {
        self.route(Method::All, path, action, priority)
    }

    /// Runs a plugin's bootstrap registration
    pub fn use_plugin(&self, plugin: impl Plugin) -> anyhow::Result<&Self> {
        plugin.register(self)?;
        Ok(self)
    }

    /// Removes every listener and route
    pub fn clear(&self) {
        self.inner.registry.write().clear();
    }

    /// Registered keys, e.g. `request`, `GET /blog/:name`
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .keys()
            .into_iter()
            .map(EventKey::source)
            .collect()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.read().is_empty()
    }

    /// Priority-ordered actions registered under exactly `key`
    pub fn listeners(&self, key: &EventKey) -> Vec<Action> {
        self.inner
            .registry
            .read()
            .resolve(key)
            .into_iter()
            .map(|listener| listener.action)
            .collect()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Runs every action matching `event` in priority order
    ///
    /// Never fails: action errors become error data on `res` and are handed
    /// to `error` listeners. Use [`Server::try_emit`] to learn whether the
    /// error listeners themselves failed.
    pub async fn emit(&self, event: &str, req: &Request, res: &Response) -> EmitStatus {
        match self.try_emit(event, req, res).await {
            Ok(status) => status,
            Err(error) => {
                warn!(event, error = %format!("{:#}", error), "error listener failed");
                EmitStatus::Aborted
            }
        }
    }

    /// Like [`Server::emit`], but returns `Err` when the `error` chain fails
    pub async fn try_emit(
        &self,
        event: &str,
        req: &Request,
        res: &Response,
    ) -> anyhow::Result<EmitStatus> {
        let error = match self.run_chain(event, req, res).await {
            Ok(status) => return Ok(status),
            Err(error) => error,
        };

        warn!(event, error = %format!("{:#}", error), "action failed");
        res.set_error_from(&error);

        if event == ERROR_EVENT {
            return Err(error);
        }
        self.run_chain(ERROR_EVENT, req, res)
            .await
            .with_context(|| format!("error listener failed while handling '{}'", event))?;
        Ok(EmitStatus::Aborted)
    }

    /// Emits `event` with a synthetic request built from `data`
    ///
    /// Route-shaped names (`"GET /users/1?page=2"`) also set the request's
    /// method and url, and are emitted under the path without the query.
    pub async fn resolve(&self, event: &str, data: JsonValue) -> anyhow::Result<StatusResponse> {
        match parse_route_event(event) {
            Some((method, url)) => {
                let req = Request::builder().method(method).url(url).data(data).build();
                let event = req.route_event();
                self.resolve_with(&event, req, Response::new()).await
            }
            None => self.resolve_with(event, Request::from(data), Response::new()).await,
        }
    }

    /// Emits `event` with the given pair and serializes the response
    pub async fn resolve_with(
        &self,
        event: &str,
        req: Request,
        res: Response,
    ) -> anyhow::Result<StatusResponse> {
        let status = self.try_emit(event, &req, &res).await?;
        if status == EmitStatus::NotFound {
            not_found(&res);
        }
        Ok(res.to_status_response())
    }

    /// Full request lifecycle used by transports
    ///
    /// `request` listeners run first, then the route, then `response`
    /// listeners. Unless an action stopped it, the response is dispatched
    /// at the end. Returns the status of the route emit.
    ///
    /// A failing `request` listener skips the route; `response` listeners
    /// and dispatch still run so the error reaches the client.
    pub async fn handle(&self, req: &Request, res: &Response) -> anyhow::Result<EmitStatus> {
        let before = self.try_emit(REQUEST_EVENT, req, res).await?;
        if res.is_stopped() {
            debug!(path = %req.path(), "request stopped before routing");
            return Ok(EmitStatus::Aborted);
        }

        let status = if before == EmitStatus::Aborted || res.has_error() {
            debug!(path = %req.path(), "request listener failed, skipping route");
            EmitStatus::Aborted
        } else {
            let event = req.route_event();
            let status = self.try_emit(&event, req, res).await?;
            if status == EmitStatus::NotFound {
                not_found(res);
            }
            status
        };

        self.try_emit(RESPONSE_EVENT, req, res).await?;
        res.dispatch()?;
        Ok(status)
    }

    async fn run_chain(
        &self,
        event: &str,
        req: &Request,
        res: &Response,
    ) -> anyhow::Result<EmitStatus> {
        // Snapshot so no lock is held while actions await
        let chain = self.inner.registry.read().matching(event);
        if chain.is_empty() {
            debug!(event, "no listeners");
            return Ok(EmitStatus::NotFound);
        }
        debug!(event, listeners = chain.len(), "emitting");

        for Matched {
            listener,
            key,
            params,
        } in chain
        {
            if res.is_terminal() {
                debug!(event, "chain stopped");
                return Ok(EmitStatus::Aborted);
            }

            trace!(
                event,
                key = %key,
                kind = listener.action.kind(),
                priority = listener.priority,
                "running action"
            );
            // Params are scoped to the action of the key that bound them
            let bound = req.bind_params(&params);
            let ctx = Context::new(self.clone(), event, key, params);

            let outcome =
                AssertUnwindSafe(self.run_action(listener.action, req.clone(), res.clone(), ctx))
                    .catch_unwind()
                    .await
                    .map_err(panic_error);
            req.unbind_params(bound);
            outcome??;
        }

        Ok(if res.is_stopped() {
            EmitStatus::Aborted
        } else {
            EmitStatus::Ok
        })
    }

    async fn run_action(
        &self,
        action: Action,
        req: Request,
        res: Response,
        ctx: Context,
    ) -> anyhow::Result<()> {
        match action {
            Action::Callback(handler) => handler.handle(req, res, ctx).await,
            Action::LazyImport(loader) => {
                let handler = loader().await.context("failed to load lazy action")?;
                handler.handle(req, res, ctx).await
            }
            Action::View(entry) => self.render_view(&entry, &req, &res).await,
        }
    }

    /// Renders a view into the response unless a text body is already set
    async fn render_view(&self, entry: &str, req: &Request, res: &Response) -> anyhow::Result<()> {
        if res.has_body() && res.results().is_none() {
            trace!(entry, "body already set, skipping view");
            return Ok(());
        }

        let engine = self
            .view_engine()
            .ok_or_else(|| crate::Error::NoViewEngine(entry.to_string()))?;

        let html = engine.render(entry, &view_data(req, res)).await?;
        res.set_html(html);
        Ok(())
    }
}

/// Template input: request data, then response data, then JSON results
fn view_data(req: &Request, res: &Response) -> JsonValue {
    let mut data = req.data().clone();
    data.extend(res.data().clone());
    if let Some(results) = res.results() {
        data.merge(results.clone());
        data.set("results", results);
    }
    if let Some(error) = res.error() {
        data.set("error", error);
    }
    data.to_value()
}

fn not_found(res: &Response) {
    if res.is_untouched() {
        res.set_status(404).set_error("Not Found");
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow!("action panicked: {}", message)
}

/// Bootstrap-time extension that registers listeners and routes
pub trait Plugin {
    fn register(&self, server: &Server) -> anyhow::Result<()>;
}

impl<F> Plugin for F
where
    F: Fn(&Server) -> anyhow::Result<()>,
{
    fn register(&self, server: &Server) -> anyhow::Result<()> {
        (self)(server)
    }
}
