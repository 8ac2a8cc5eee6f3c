// File: src/request.rs
// Purpose: Transport-agnostic request handle with merged params, query and post data

use crate::body::{Body, Headers};
use crate::data::Data;
use crate::query::parse_query;
use ingest_router::{split_url, Method, ParamKey, Params};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct RequestState {
    method: Method,
    url: String,
    path: String,
    headers: Headers,
    body: Body,
    mimetype: Option<String>,
    query: Data,
    post: Data,
    data: Data,
}

/// Request passed to every action of a dispatch chain
///
/// Cloning is cheap and yields a handle to the same request, so a callback
/// can move it into an `async` block while earlier and later actions still
/// observe its mutations.
///
/// Guards returned by `data()`/`data_mut()` must not be held across `.await`.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RwLock<RequestState>>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Request")
            .field("method", &state.method)
            .field("url", &state.url)
            .field("data", &state.data)
            .finish()
    }
}

impl Request {
    /// Create a request with no headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self::builder().method(method).url(url).build()
    }

    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    pub fn method(&self) -> Method {
        self.inner.read().method
    }

    /// Full request target including the query string
    pub fn url(&self) -> String {
        self.inner.read().url.clone()
    }

    /// Path portion of the url, without query string
    pub fn path(&self) -> String {
        self.inner.read().path.clone()
    }

    /// Event name a router dispatches this request under, e.g. `GET /blog/john`
    pub fn route_event(&self) -> String {
        let state = self.inner.read();
        format!("{} {}", state.method, state.path)
    }

    pub fn headers(&self) -> MappedRwLockReadGuard<'_, Headers> {
        RwLockReadGuard::map(self.inner.read(), |state| &state.headers)
    }

    pub fn headers_mut(&self) -> MappedRwLockWriteGuard<'_, Headers> {
        RwLockWriteGuard::map(self.inner.write(), |state| &mut state.headers)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.read().headers.get(name).map(str::to_string)
    }

    pub fn body(&self) -> Body {
        self.inner.read().body.clone()
    }

    pub fn mimetype(&self) -> Option<String> {
        self.inner.read().mimetype.clone()
    }

    /// Parsed query string
    pub fn query(&self) -> MappedRwLockReadGuard<'_, Data> {
        RwLockReadGuard::map(self.inner.read(), |state| &state.query)
    }

    /// Parsed form or JSON body
    pub fn post(&self) -> MappedRwLockReadGuard<'_, Data> {
        RwLockReadGuard::map(self.inner.read(), |state| &state.post)
    }

    /// Merged data: route params, query, post and anything actions stored
    pub fn data(&self) -> MappedRwLockReadGuard<'_, Data> {
        RwLockReadGuard::map(self.inner.read(), |state| &state.data)
    }

    pub fn data_mut(&self) -> MappedRwLockWriteGuard<'_, Data> {
        RwLockWriteGuard::map(self.inner.write(), |state| &mut state.data)
    }

    /// Shorthand for `data().get(key).cloned()`; accepts dotted paths
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.inner.read().data.get_path(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.inner.write().data.set(key, value);
    }

    pub fn delete(&self, key: &str) -> Option<JsonValue> {
        self.inner.write().data.delete(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.read().data.has(key)
    }

    /// Merges matched route parameters into the data
    ///
    /// Named variables keep their name; wildcards are stored under their
    /// position (`"0"`, `"1"`, ...).
    pub fn set_params(&self, params: &Params) {
        let mut state = self.inner.write();
        for (key, value) in params.iter() {
            let key = match key {
                ParamKey::Name(name) => name.clone(),
                ParamKey::Index(index) => index.to_string(),
            };
            state.data.set(key, value);
        }
    }

    /// Binds route parameters for the duration of one action
    ///
    /// Returns what the parameters displaced so [`Request::unbind_params`]
    /// can put it back once the action finishes.
    pub(crate) fn bind_params(&self, params: &Params) -> Vec<BoundParam> {
        let mut state = self.inner.write();
        params
            .iter()
            .map(|(key, value)| {
                let key = match key {
                    ParamKey::Name(name) => name.clone(),
                    ParamKey::Index(index) => index.to_string(),
                };
                let previous = state.data.get(&key).cloned();
                state.data.set(key.clone(), value);
                BoundParam {
                    key,
                    value: JsonValue::from(value),
                    previous,
                }
            })
            .collect()
    }

    /// Restores data displaced by [`Request::bind_params`]
    ///
    /// Keys an action overwrote keep the action's value.
    pub(crate) fn unbind_params(&self, bound: Vec<BoundParam>) {
        let mut state = self.inner.write();
        for param in bound.into_iter().rev() {
            if state.data.get(&param.key) != Some(&param.value) {
                continue;
            }
            match param.previous {
                Some(previous) => {
                    state.data.set(param.key, previous);
                }
                None => {
                    state.data.delete(&param.key);
                }
            }
        }
    }

    /// Whether the client accepts HTML (browser navigation)
    pub fn accepts_html(&self) -> bool {
        self.header("accept")
            .map(|accept| accept.contains("text/html"))
            .unwrap_or(false)
    }

    /// Whether two handles point to the same request
    pub fn ptr_eq(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A route parameter bound into request data, with the value it displaced
#[derive(Debug)]
pub(crate) struct BoundParam {
    key: String,
    value: JsonValue,
    previous: Option<JsonValue>,
}

impl Default for Request {
    fn default() -> Self {
        Request::builder().build()
    }
}

/// A plain object standing in for a request: its fields become the data
impl From<JsonValue> for Request {
    fn from(value: JsonValue) -> Self {
        Request::builder().data(value).build()
    }
}

impl From<Data> for Request {
    fn from(data: Data) -> Self {
        Request::builder().data(data.to_value()).build()
    }
}

/// Builder used by transport adapters and tests
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Method,
    url: Option<String>,
    headers: Headers,
    body: Body,
    mimetype: Option<String>,
    data: Option<JsonValue>,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Body plus its mimetype (`application/json`, form-urlencoded, ...)
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    /// Extra data merged last, after query and post
    pub fn data(mut self, data: JsonValue) -> Self {
        self.data = Some(data);
        self
    }

    pub fn build(self) -> Request {
        let url = self.url.unwrap_or_else(|| "/".to_string());
        let (path, query_string) = split_url(&url);
        let path = ingest_router::normalize_path(path).into_owned();

        let mimetype = self
            .mimetype
            .or_else(|| self.headers.get("content-type").map(str::to_string));

        let query = query_string.map(parse_query).map(Data::from).unwrap_or_default();
        let post = parse_post(&self.body, mimetype.as_deref());

        let mut data = query.clone();
        data.extend(post.clone());
        if let Some(extra) = self.data {
            data.merge(extra);
        }

        Request {
            inner: Arc::new(RwLock::new(RequestState {
                method: self.method,
                url,
                path,
                headers: self.headers,
                body: self.body,
                mimetype,
                query,
                post,
                data,
            })),
        }
    }
}

/// Reads a body into post data according to its mimetype
fn parse_post(body: &Body, mimetype: Option<&str>) -> Data {
    let essence = mimetype
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
        .unwrap_or_default();

    match body {
        Body::Empty => Data::new(),
        Body::Json(value) => Data::from(value.clone()),
        Body::Text(_) | Body::Bytes(_) => match essence.as_str() {
            "application/x-www-form-urlencoded" => Data::from(parse_query(&body.to_text())),
            "application/json" => match serde_json::from_str::<JsonValue>(&body.to_text()) {
                Ok(value) => Data::from(value),
                Err(error) => {
                    tracing::debug!(%error, "request body is not valid JSON, ignoring as post data");
                    Data::new()
                }
            },
            _ => Data::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_query_parsed_into_data() {
        let req = Request::new(Method::Get, "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.get("q"), Some(json!("rust")));
        assert_eq!(req.query().get("page"), Some(&json!(2)));
        assert_eq!(req.route_event(), "GET /search");
    }

    #[test]
    fn test_form_body_parsed_into_post() {
        let req = Request::builder()
            .method(Method::Post)
            .url("/users?source=form")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .body("name=john&roles[]=admin")
            .build();
        assert_eq!(req.post().get("name"), Some(&json!("john")));
        assert_eq!(
            req.data().to_value(),
            json!({ "source": "form", "name": "john", "roles": ["admin"] })
        );
    }

    #[test]
    fn test_json_body_parsed_into_post() {
        let req = Request::builder()
            .method(Method::Post)
            .mimetype("application/json")
            .body(b"{\"title\":\"Hello\"}".to_vec())
            .build();
        assert_eq!(req.get("title"), Some(json!("Hello")));
    }

    #[test]
    fn test_post_overrides_query() {
        let req = Request::builder()
            .url("/?name=query")
            .body(json!({ "name": "post" }))
            .build();
        assert_eq!(req.get("name"), Some(json!("post")));
    }

    #[test]
    fn test_plain_object_request() {
        let req = Request::from(json!({ "id": 7 }));
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.get("id"), Some(json!(7)));
    }

    #[test]
    fn test_clones_share_state() {
        let req = Request::default();
        let other = req.clone();
        other.set("seen", true);
        assert!(req.has("seen"));
        assert!(req.ptr_eq(&other));
    }

    #[test]
    fn test_params_stored_by_name_and_position() {
        let req = Request::default();
        let mut params = Params::new();
        params.push("name", "john");
        params.push(0usize, "comments");
        req.set_params(&params);
        assert_eq!(req.get("name"), Some(json!("john")));
        assert_eq!(req.get("0"), Some(json!("comments")));
    }

    #[test]
    fn test_unbind_restores_displaced_data() {
        let req = Request::from(json!({ "name": "from-query" }));
        let mut params = Params::new();
        params.push("name", "john");
        params.push(0usize, "comments");

        let bound = req.bind_params(&params);
        assert_eq!(req.get("name"), Some(json!("john")));
        req.unbind_params(bound);
        assert_eq!(req.get("name"), Some(json!("from-query")));
        assert!(!req.has("0"));
    }

    #[test]
    fn test_unbind_keeps_values_written_by_actions() {
        let req = Request::default();
        let mut params = Params::new();
        params.push("id", "7");

        let bound = req.bind_params(&params);
        req.set("id", 8);
        req.unbind_params(bound);
        assert_eq!(req.get("id"), Some(json!(8)));
    }
}
