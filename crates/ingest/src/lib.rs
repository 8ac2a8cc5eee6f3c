//! # Ingest
//!
//! Event-driven, transport-agnostic router.
//!
//! Actions (callbacks, lazily loaded handlers or view references) are
//! registered under event names, regex patterns or `METHOD /path` routes
//! with a priority. Emitting a name runs every matching action in
//! descending priority, registration order breaking ties, against a shared
//! [`Request`]/[`Response`] pair.
//!
//! ```
//! use ingest::{Action, Server};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let server = Server::new();
//! server
//!     .get("/", Action::callback(|_req, res, _ctx| async move {
//!         res.set_results(json!({ "hello": "world" }));
//!         Ok(())
//!     }), 0)
//!     .unwrap();
//!
//! let response = server.resolve("GET /", json!({})).await.unwrap();
//! assert_eq!(response.code, 200);
//! assert_eq!(response.results, Some(json!({ "hello": "world" })));
//! # }
//! ```

pub mod action;
pub mod body;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod event;
pub mod query;
pub mod request;
pub mod response;
pub mod server;
pub mod status;
pub mod view;

pub use action::{Action, Handler, Loader};
pub use body::{Body, Headers};
pub use config::{Config, ConfigStore, LoggingConfig, ServerConfig, ViewConfig};
pub use context::Context;
pub use data::Data;
pub use error::{Error, Result};
pub use event::{EmitStatus, EventKey, EventRegistry, Listener};
pub use request::{Request, RequestBuilder};
pub use response::{ErrorMap, ErrorValue, Response, StatusResponse, Trace};
pub use server::{Plugin, Server, ERROR_EVENT, LISTEN_EVENT, REQUEST_EVENT, RESPONSE_EVENT};
pub use view::{TemplateEngine, ViewEngine};

pub use ingest_router::{Method, ParamKey, Params, PathPattern};
