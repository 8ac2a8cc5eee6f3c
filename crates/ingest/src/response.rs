// File: src/response.rs
// Purpose: Transport-agnostic response handle and the StatusResponse envelope

use crate::body::{Body, Headers};
use crate::data::Data;
use crate::status;
use indexmap::IndexMap;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// StatusResponse
// ============================================================================

/// Field-level error detail: a message, a list of messages, or a nested map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorValue {
    Message(String),
    List(Vec<String>),
    Nested(IndexMap<String, ErrorValue>),
}

impl From<&str> for ErrorValue {
    fn from(message: &str) -> Self {
        ErrorValue::Message(message.to_string())
    }
}

impl From<String> for ErrorValue {
    fn from(message: String) -> Self {
        ErrorValue::Message(message)
    }
}

impl From<Vec<String>> for ErrorValue {
    fn from(messages: Vec<String>) -> Self {
        ErrorValue::List(messages)
    }
}

impl From<IndexMap<String, ErrorValue>> for ErrorValue {
    fn from(nested: IndexMap<String, ErrorValue>) -> Self {
        ErrorValue::Nested(nested)
    }
}

/// Field errors keyed by field name
pub type ErrorMap = IndexMap<String, ErrorValue>;

/// One frame of an error trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub method: String,
    pub file: String,
    pub line: u32,
    #[serde(rename = "char")]
    pub column: u32,
}

/// Serialized success/error envelope returned by `resolve()`
///
/// `results` (success) and `error`/`errors` (failure) may both be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub code: u16,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<Trace>>,
}

impl StatusResponse {
    /// Envelope with only a code and its reason phrase
    pub fn new(code: u16) -> Self {
        Self {
            code,
            status: status::reason(code).to_string(),
            results: None,
            total: None,
            error: None,
            errors: None,
            stack: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some() || status::is_error(self.code)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Response
// ============================================================================

/// Callback run once by `Response::dispatch`, typically writing to a transport
pub type Dispatcher = Arc<dyn Fn(&Response) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct ResponseState {
    code: Option<u16>,
    status: Option<String>,
    mimetype: Option<String>,
    headers: Headers,
    body: Body,
    data: Data,
    total: Option<u64>,
    error: Option<String>,
    errors: ErrorMap,
    stack: Vec<Trace>,
    stopped: bool,
    sent: bool,
    dispatcher: Option<Dispatcher>,
}

/// Response shared by every action of a dispatch chain
///
/// Like [`Request`](crate::Request), clones are handles to the same state.
#[derive(Clone, Default)]
pub struct Response {
    inner: Arc<RwLock<ResponseState>>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("Response")
            .field("code", &state.code)
            .field("mimetype", &state.mimetype)
            .field("body", &state.body)
            .field("error", &state.error)
            .field("stopped", &state.stopped)
            .finish()
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status code; 200 until something sets it
    pub fn code(&self) -> u16 {
        self.inner.read().code.unwrap_or(200)
    }

    /// Whether an action (or adapter) has set a code explicitly
    pub fn has_code(&self) -> bool {
        self.inner.read().code.is_some()
    }

    /// Status text; the reason phrase of the code unless overridden
    pub fn status(&self) -> String {
        let state = self.inner.read();
        state
            .status
            .clone()
            .unwrap_or_else(|| status::reason(state.code.unwrap_or(200)).to_string())
    }

    /// Sets the code, resetting the status text to its reason phrase
    pub fn set_status(&self, code: u16) -> &Self {
        let mut state = self.inner.write();
        state.code = Some(code);
        state.status = None;
        self
    }

    /// Sets the code with custom status text
    pub fn set_status_text(&self, code: u16, text: impl Into<String>) -> &Self {
        let mut state = self.inner.write();
        state.code = Some(code);
        state.status = Some(text.into());
        self
    }

    pub fn mimetype(&self) -> Option<String> {
        self.inner.read().mimetype.clone()
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

    pub fn set_header(&self, name: &str, value: impl Into<String>) -> &Self {
        self.inner.write().headers.set(name, value);
        self
    }

    pub fn body(&self) -> Body {
        self.inner.read().body.clone()
    }

    /// Whether a body has been written
    pub fn has_body(&self) -> bool {
        !self.inner.read().body.is_empty()
    }

    /// Data handed to views alongside the results
    pub fn data(&self) -> MappedRwLockReadGuard<'_, Data> {
        RwLockReadGuard::map(self.inner.read(), |state| &state.data)
    }

    pub fn data_mut(&self) -> MappedRwLockWriteGuard<'_, Data> {
        RwLockWriteGuard::map(self.inner.write(), |state| &mut state.data)
    }

    // ------------------------------------------------------------------------
    // Body setters
    // ------------------------------------------------------------------------

    /// Writes a body with its mimetype; later writes replace earlier ones
    pub fn set_body(&self, mimetype: impl Into<String>, body: impl Into<Body>) -> &Self {
        let mut state = self.inner.write();
        state.mimetype = Some(mimetype.into());
        state.body = body.into();
        self
    }

    pub fn set_json(&self, value: impl Into<JsonValue>) -> &Self {
        self.set_body("application/json", Body::Json(value.into()))
    }

    pub fn set_html(&self, html: impl Into<String>) -> &Self {
        self.set_body("text/html", Body::Text(html.into()))
    }

    pub fn set_xml(&self, xml: impl Into<String>) -> &Self {
        self.set_body("text/xml", Body::Text(xml.into()))
    }

    pub fn set_text(&self, text: impl Into<String>) -> &Self {
        self.set_body("text/plain", Body::Text(text.into()))
    }

    /// Success results; sets 200 unless a code was already chosen
    pub fn set_results(&self, results: impl Into<JsonValue>) -> &Self {
        self.set_json(results);
        let mut state = self.inner.write();
        state.code.get_or_insert(200);
        self
    }

    /// A page of rows plus the total row count
    pub fn set_rows(&self, rows: Vec<JsonValue>, total: u64) -> &Self {
        self.set_results(JsonValue::Array(rows));
        self.inner.write().total = Some(total);
        self
    }

    /// Results, if the body holds JSON
    pub fn results(&self) -> Option<JsonValue> {
        self.inner.read().body.as_json().cloned()
    }

    pub fn total(&self) -> Option<u64> {
        self.inner.read().total
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    /// Records an error message; the code becomes 400 unless already an error
    pub fn set_error(&self, message: impl Into<String>) -> &Self {
        let mut state = self.inner.write();
        state.error = Some(message.into());
        if !state.code.map(status::is_error).unwrap_or(false) {
            state.code = Some(400);
            state.status = None;
        }
        self
    }

    /// Records field-level errors
    pub fn set_errors(&self, errors: ErrorMap) -> &Self {
        self.inner.write().errors = errors;
        self
    }

    /// Adds one field-level error
    pub fn add_error(&self, field: impl Into<String>, error: impl Into<ErrorValue>) -> &Self {
        self.inner.write().errors.insert(field.into(), error.into());
        self
    }

    pub fn set_stack(&self, stack: Vec<Trace>) -> &Self {
        self.inner.write().stack = stack;
        self
    }

    /// Converts a failed action into error data
    ///
    /// The message is the outermost error; the stack holds one frame per
    /// cause. The code becomes 500 unless an error code was already set.
    pub fn set_error_from(&self, error: &anyhow::Error) -> &Self {
        let stack = error
            .chain()
            .map(|cause| Trace {
                method: cause.to_string(),
                file: String::new(),
                line: 0,
                column: 0,
            })
            .collect();

        let mut state = self.inner.write();
        state.error = Some(error.to_string());
        state.stack = stack;
        if !state.code.map(status::is_error).unwrap_or(false) {
            state.code = Some(500);
            state.status = None;
        }
        self
    }

    pub fn error(&self) -> Option<String> {
        self.inner.read().error.clone()
    }

    pub fn errors(&self) -> ErrorMap {
        self.inner.read().errors.clone()
    }

    pub fn stack(&self) -> Vec<Trace> {
        self.inner.read().stack.clone()
    }

    pub fn has_error(&self) -> bool {
        let state = self.inner.read();
        state.error.is_some() || !state.errors.is_empty()
    }

    // ------------------------------------------------------------------------
    // Flow control
    // ------------------------------------------------------------------------

    /// Redirects with 302 Found
    pub fn redirect(&self, url: impl Into<String>) -> &Self {
        self.redirect_with(url, 302)
    }

    pub fn redirect_with(&self, url: impl Into<String>, code: u16) -> &Self {
        let mut state = self.inner.write();
        state.headers.set("location", url);
        state.code = Some(code);
        state.status = None;
        self
    }

    pub fn redirect_location(&self) -> Option<String> {
        self.header("location")
    }

    /// Halts the dispatch chain after the current action and suppresses the
    /// dispatcher; already running actions are not aborted
    pub fn stop(&self) -> &Self {
        self.inner.write().stopped = true;
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.read().stopped
    }

    /// Whether the response has been handed to its dispatcher
    pub fn is_sent(&self) -> bool {
        self.inner.read().sent
    }

    /// Stopped or sent: no further action should run
    pub fn is_terminal(&self) -> bool {
        let state = self.inner.read();
        state.stopped || state.sent
    }

    pub fn set_dispatcher<F>(&self, dispatcher: F) -> &Self
    where
        F: Fn(&Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.write().dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Hands the response to its dispatcher, at most once
    ///
    /// Returns `Ok(false)` when stopped or already sent. Without a dispatcher
    /// the response is only marked as sent.
    pub fn dispatch(&self) -> anyhow::Result<bool> {
        let dispatcher = {
            let mut state = self.inner.write();
            if state.stopped || state.sent {
                return Ok(false);
            }
            state.sent = true;
            state.dispatcher.clone()
        };

        if let Some(dispatcher) = dispatcher {
            dispatcher(self)?;
        }
        Ok(true)
    }

    /// Whether no action wrote anything
    pub fn is_untouched(&self) -> bool {
        let state = self.inner.read();
        state.code.is_none()
            && state.body.is_empty()
            && state.error.is_none()
            && state.errors.is_empty()
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    pub fn to_status_response(&self) -> StatusResponse {
        let state = self.inner.read();
        let code = state.code.unwrap_or(200);
        let results = match &state.body {
            Body::Empty => None,
            Body::Json(value) => Some(value.clone()),
            body if body.is_empty() => None,
            body => Some(JsonValue::String(body.to_text())),
        };

        StatusResponse {
            code,
            status: state
                .status
                .clone()
                .unwrap_or_else(|| status::reason(code).to_string()),
            results,
            total: state.total,
            error: state.error.clone(),
            errors: (!state.errors.is_empty()).then(|| state.errors.clone()),
            stack: (!state.stack.is_empty()).then(|| state.stack.clone()),
        }
    }

    /// Loads an envelope into this response, replacing code, body and errors
    pub fn from_status_response(&self, response: &StatusResponse) -> &Self {
        let mut state = self.inner.write();
        state.code = Some(response.code);
        state.status = (response.status != status::reason(response.code))
            .then(|| response.status.clone());
        match &response.results {
            Some(results) => {
                state.mimetype = Some("application/json".to_string());
                state.body = Body::Json(results.clone());
            }
            None => {
                state.mimetype = None;
                state.body = Body::Empty;
            }
        }
        state.total = response.total;
        state.error = response.error.clone();
        state.errors = response.errors.clone().unwrap_or_default();
        state.stack = response.stack.clone().unwrap_or_default();
        self
    }

    /// Whether two handles point to the same response
    pub fn ptr_eq(&self, other: &Response) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<StatusResponse> for Response {
    fn from(envelope: StatusResponse) -> Self {
        let response = Response::new();
        response.from_status_response(&envelope);
        response
    }
}
