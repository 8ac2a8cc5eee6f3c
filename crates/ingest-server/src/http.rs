// File: src/http.rs
// Purpose: axum boundary layer translating HTTP to ingest requests and back

use crate::pages;
use anyhow::Context as _;
use axum::{
    body::{to_bytes, Body as AxumBody, Bytes},
    extract::{Request as HttpRequest, State},
    http::{header, request::Parts, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response as HttpResponse},
    Json, Router,
};
use ingest::{Body, Method, Request, Response, Server, ServerConfig, LISTEN_EVENT};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Largest request body read into memory
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Router sending every request through `Server::handle`
pub fn router(server: Server) -> Router {
    Router::new()
        .fallback(handle_request)
        .with_state(server)
        .layer(TraceLayer::new_for_http())
}

/// Binds, announces `listen`, and serves until Ctrl-C
pub async fn serve(server: Server, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local = listener.local_addr()?;

    let announce = Request::from(json!({
        "host": local.ip().to_string(),
        "port": local.port(),
    }));
    server.emit(LISTEN_EVENT, &announce, &Response::new()).await;
    info!("Server running at http://{}", local);

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}

async fn handle_request(State(server): State<Server>, request: HttpRequest) -> HttpResponse {
    let (parts, body) = request.into_parts();

    let Ok(method) = parts.method.as_str().parse::<Method>() else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let req = to_request(method, &parts, bytes);
    let res = Response::new();
    if let Err(e) = server.handle(&req, &res).await {
        error!("Request failed: {:#}", e);
        res.set_error_from(&e);
    }
    to_response(&req, &res)
}

/// Converts HTTP parts into an ingest request
pub fn to_request(method: Method, parts: &Parts, body: Bytes) -> Request {
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut builder = Request::builder().method(method).url(url);
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    if !body.is_empty() {
        builder = builder.body(body);
    }
    builder.build()
}

/// Converts a finished ingest response into HTTP
///
/// An empty body with error data becomes a StatusResponse (JSON) or an
/// error page when the client asked for HTML.
pub fn to_response(req: &Request, res: &Response) -> HttpResponse {
    let status = StatusCode::from_u16(res.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = if !res.has_body() && res.has_error() {
        if req.accepts_html() {
            let envelope = res.to_status_response();
            (status, Html(pages::error_page(&envelope).into_string())).into_response()
        } else {
            (status, Json(res.to_status_response())).into_response()
        }
    } else {
        let body = res.body();
        let mut response = (status, AxumBody::from(body.to_bytes())).into_response();
        if let Some(content_type) = content_type(res.mimetype(), &body) {
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        response
    };

    for (name, value) in res.headers().iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => debug!("Skipping invalid response header: {}", name),
        }
    }
    response
}

fn content_type(mimetype: Option<String>, body: &Body) -> Option<String> {
    let mimetype = mimetype.or_else(|| match body {
        Body::Empty => None,
        Body::Json(_) => Some("application/json".to_string()),
        Body::Text(_) => Some("text/plain".to_string()),
        Body::Bytes(_) => Some("application/octet-stream".to_string()),
    })?;

    if mimetype.starts_with("text/") && !mimetype.contains("charset") {
        Some(format!("{}; charset=utf-8", mimetype))
    } else {
        Some(mimetype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as Http;

    #[test]
    fn test_to_request_copies_method_url_headers_and_body() {
        let (parts, _) = Http::builder()
            .method("POST")
            .uri("/users?ref=home")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();

        let req = to_request(Method::Post, &parts, Bytes::from_static(b"name=john"));
        assert_eq!(req.route_event(), "POST /users");
        assert_eq!(req.get("ref"), Some(json!("home")));
        assert_eq!(req.get("name"), Some(json!("john")));
    }

    #[test]
    fn test_text_content_type_gets_charset() {
        assert_eq!(
            content_type(Some("text/html".into()), &Body::Empty).as_deref(),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(
            content_type(None, &Body::Json(json!({}))).as_deref(),
            Some("application/json")
        );
    }
}
