// File: src/action.rs
// Purpose: The three kinds of work an event or route can run

use crate::context::Context;
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Something that handles a request/response pair
///
/// Implemented for every `Fn(Request, Response, Context) -> Future` closure,
/// so most callers never implement it by hand.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: Request, res: Response, ctx: Context) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request, Response, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, req: Request, res: Response, ctx: Context) -> anyhow::Result<()> {
        (self)(req, res, ctx).await
    }
}

/// Deferred handler factory, awaited each time its action is selected
pub type Loader =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Arc<dyn Handler>>> + Send + Sync>;

/// Unit of work bound to an event or route
#[derive(Clone)]
pub enum Action {
    /// Invoked directly
    Callback(Arc<dyn Handler>),
    /// Loaded when first selected for a dispatch, then invoked
    LazyImport(Loader),
    /// Template entry rendered by the server's view engine
    View(String),
}

impl Action {
    /// Wraps an async closure
    pub fn callback<F, Fut>(callback: F) -> Self
    where
        F: Fn(Request, Response, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Action::Callback(Arc::new(callback))
    }

    /// Wraps a hand-written [`Handler`]
    pub fn handler<H: Handler>(handler: H) -> Self {
        Action::Callback(Arc::new(handler))
    }

    /// Wraps a loader; nothing runs until the action is dispatched
    ///
    /// ```
    /// use ingest::{Action, Context, Request, Response};
    ///
    /// let action = Action::lazy(|| async {
    ///     Ok(|_req: Request, res: Response, _ctx: Context| async move {
    ///         res.set_text("loaded");
    ///         anyhow::Ok(())
    ///     })
    /// });
    /// assert_eq!(action.kind(), "lazy");
    /// ```
    pub fn lazy<F, Fut, H>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<H>> + Send + 'static,
        H: Handler,
    {
        Action::LazyImport(Arc::new(move || {
            loader()
                .map(|loaded| loaded.map(|handler| Arc::new(handler) as Arc<dyn Handler>))
                .boxed()
        }))
    }

    pub fn view(entry: impl Into<String>) -> Self {
        Action::View(entry.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Callback(_) => "callback",
            Action::LazyImport(_) => "lazy",
            Action::View(_) => "view",
        }
    }

    /// Identity used to ignore duplicate registrations
    ///
    /// Callbacks and loaders compare by pointer, views by entry.
    pub fn same_as(&self, other: &Action) -> bool {
        match (self, other) {
            (Action::Callback(a), Action::Callback(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Action::LazyImport(a), Action::LazyImport(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Action::View(a), Action::View(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Callback(_) => f.write_str("Callback"),
            Action::LazyImport(_) => f.write_str("LazyImport"),
            Action::View(entry) => f.debug_tuple("View").field(entry).finish(),
        }
    }
}

impl From<&str> for Action {
    fn from(entry: &str) -> Self {
        Action::View(entry.to_string())
    }
}

impl From<String> for Action {
    fn from(entry: String) -> Self {
        Action::View(entry)
    }
}

impl From<Arc<dyn Handler>> for Action {
    fn from(handler: Arc<dyn Handler>) -> Self {
        Action::Callback(handler)
    }
}
