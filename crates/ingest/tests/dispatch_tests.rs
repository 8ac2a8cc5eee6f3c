//! Integration tests for the ingest dispatcher
//!
//! Covers:
//! - Priority ordering and registration-order tie-breaks
//! - Route matching (named, wildcard, rest, method wildcard)
//! - Error containment and `error` listeners
//! - Lazy actions and view actions
//! - The `handle` lifecycle and `stop()`

use ingest::{
    Action, Context, EmitStatus, EventKey, Method, Request, Response, Server, StatusResponse,
    TemplateEngine, ERROR_EVENT, REQUEST_EVENT, RESPONSE_EVENT,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared trace of which actions ran
#[derive(Clone, Default)]
struct Trail(Arc<Mutex<Vec<String>>>);

impl Trail {
    fn record(&self, step: impl Into<String>) -> Action {
        let trail = self.clone();
        let step = step.into();
        Action::callback(move |_req, _res, _ctx| {
            trail.0.lock().push(step.clone());
            async { Ok(()) }
        })
    }

    fn steps(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

fn set_body(text: &'static str) -> Action {
    Action::callback(move |_req, res, _ctx| async move {
        res.set_text(format!("Hello {}", text));
        Ok(())
    })
}

// ============================================================================
// Priority ordering
// ============================================================================

#[tokio::test]
async fn test_priority_chain_runs_high_to_low() {
    let server = Server::new();
    let trail = Trail::default();

    server.get("/", trail.record("World"), 0).unwrap();
    server.get("/", trail.record("After"), -100).unwrap();
    server.get("/", trail.record("Before"), 100).unwrap();

    let response = server.resolve("GET /", json!({})).await.unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(trail.steps(), vec!["Before", "World", "After"]);
}

#[tokio::test]
async fn test_last_body_write_wins() {
    let server = Server::new();
    server.get("/", set_body("World"), 0).unwrap();
    server.get("/", set_body("Before"), 100).unwrap();
    server.get("/", set_body("After"), -100).unwrap();

    let response = server.resolve("GET /", json!({})).await.unwrap();
    assert_eq!(response.results, Some(json!("Hello After")));
}

#[tokio::test]
async fn test_equal_priorities_follow_registration_order() {
    let server = Server::new();
    let trail = Trail::default();
    for step in ["one", "two", "three"] {
        server.on("tick", trail.record(step), 5);
    }

    let status = server
        .emit("tick", &Request::default(), &Response::new())
        .await;
    assert_eq!(status, EmitStatus::Ok);
    assert_eq!(trail.steps(), vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_routes_across_patterns_merge_by_priority() {
    let server = Server::new();
    let trail = Trail::default();
    server.get("/blog/**", trail.record("rest"), 0).unwrap();
    server.get("/blog/:name", trail.record("named"), 0).unwrap();
    server.all("/blog/*", trail.record("any-method"), 10).unwrap();

    server.resolve("GET /blog/john", json!({})).await.unwrap();
    assert_eq!(trail.steps(), vec!["any-method", "rest", "named"]);
}

#[tokio::test]
async fn test_listeners_added_between_dispatches_are_honored() {
    let server = Server::new();
    let trail = Trail::default();
    server.on("ping", trail.record("first"), 0);
    server.resolve("ping", json!({})).await.unwrap();

    server.on("ping", trail.record("urgent"), 1);
    server.resolve("ping", json!({})).await.unwrap();
    assert_eq!(trail.steps(), vec!["first", "urgent", "first"]);
}

// ============================================================================
// Route matching
// ============================================================================

fn echo_data() -> Action {
    Action::callback(|req, res, _ctx| async move {
        res.set_results(req.data().to_value());
        Ok(())
    })
}

#[rstest]
#[case("/blog/:name/articles", "GET /blog/john/articles", json!({ "name": "john" }))]
#[case("/blog/*/comments", "GET /blog/john/comments", json!({ "0": "john" }))]
#[case("/blog/**", "GET /blog/any/thing/you/want", json!({ "0": "any/thing/you/want" }))]
#[case("/:a/*/:b/*", "GET /w/x/y/z", json!({ "a": "w", "0": "x", "b": "y", "1": "z" }))]
#[tokio::test]
async fn test_route_params_reach_request_data(
    #[case] pattern: &str,
    #[case] event: &str,
    #[case] expected: serde_json::Value,
) {
    let server = Server::new();
    server.get(pattern, echo_data(), 0).unwrap();

    let response = server.resolve(event, json!({})).await.unwrap();
    assert_eq!(response.results, Some(expected));
}

#[tokio::test]
async fn test_resolve_strips_query_from_route_events() {
    let server = Server::new();
    server.get("/blog", echo_data(), 0).unwrap();

    let response = server
        .resolve("GET /blog?page=2&tag=rust", json!({}))
        .await
        .unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.results, Some(json!({ "page": 2, "tag": "rust" })));
}

#[tokio::test]
async fn test_params_do_not_leak_between_route_keys() {
    let server = Server::new();
    server
        .get(
            "/blog/:name",
            Action::callback(|req, _res, _ctx| async move {
                req.set("first", req.get("name").unwrap_or_default());
                Ok(())
            }),
            10,
        )
        .unwrap();
    server.get("/blog/john", echo_data(), 0).unwrap();

    let response = server.resolve("GET /blog/john", json!({})).await.unwrap();
    assert_eq!(response.results, Some(json!({ "first": "john" })));
}

#[tokio::test]
async fn test_segment_counts_must_line_up() {
    let server = Server::new();
    server.get("/blog/:name/articles", echo_data(), 0).unwrap();
    server.get("/blog/*/comments", echo_data(), 0).unwrap();

    for event in ["GET /blog/john/jane/articles", "GET /blog/john/extra/comments"] {
        let response = server.resolve(event, json!({})).await.unwrap();
        assert_eq!(response.code, 404, "{}", event);
    }
}

#[rstest]
#[tokio::test]
async fn test_all_matches_every_method(
    #[values(
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Connect,
        Method::Trace
    )]
    method: Method,
) {
    let server = Server::new();
    server.all("/", set_body("any"), 0).unwrap();

    let response = server
        .resolve(&format!("{} /", method), json!({}))
        .await
        .unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.results, Some(json!("Hello any")));
}

#[tokio::test]
async fn test_method_specific_route_ignores_other_methods() {
    let server = Server::new();
    server.post("/users", set_body("created"), 0).unwrap();
    let response = server.resolve("GET /users", json!({})).await.unwrap();
    assert_eq!(response.code, 404);
}

#[tokio::test]
async fn test_invalid_route_pattern_is_rejected() {
    let server = Server::new();
    assert!(server.get("/files/**/raw", set_body("x"), 0).is_err());
    assert!(server.is_empty());
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_regex_events_capture_params() {
    let server = Server::new();
    let key = EventKey::regex(r"^(?P<model>\w+)-(created|updated)$").unwrap();
    server.on(
        key,
        Action::callback(|_req, res, ctx: Context| async move {
            res.set_results(json!({
                "model": ctx.param("model"),
                "change": ctx.params().index(0),
                "key": ctx.key(),
            }));
            Ok(())
        }),
        0,
    );

    let response = server.resolve("post-created", json!({})).await.unwrap();
    assert_eq!(
        response.results,
        Some(json!({
            "model": "post",
            "change": "created",
            "key": r"^(?P<model>\w+)-(created|updated)$"
        }))
    );
    assert_eq!(server.resolve("post-deleted", json!({})).await.unwrap().code, 404);
}

#[tokio::test]
async fn test_resolve_uses_plain_object_as_request_data() {
    let server = Server::new();
    server.on("user-search", echo_data(), 0);
    let response = server
        .resolve("user-search", json!({ "q": "john", "page": 2 }))
        .await
        .unwrap();
    assert_eq!(response.results, Some(json!({ "q": "john", "page": 2 })));
}

#[tokio::test]
async fn test_nested_emit_through_context() {
    let server = Server::new();
    server.on(
        "audit",
        Action::callback(|req, _res, _ctx| async move {
            req.set("audited", true);
            Ok(())
        }),
        0,
    );
    server
        .post(
            "/posts",
            Action::callback(|req, res, ctx| async move {
                ctx.server().emit("audit", &req, &res).await;
                res.set_results(json!({ "audited": req.get("audited") }));
                Ok(())
            }),
            0,
        )
        .unwrap();

    let response = server.resolve("POST /posts", json!({})).await.unwrap();
    assert_eq!(response.results, Some(json!({ "audited": true })));
}

#[tokio::test]
async fn test_context_exposes_config_store() {
    let server = Server::new();
    server.config().set("site.name", "Ingest");
    server.on(
        "title",
        Action::callback(|_req, res, ctx| async move {
            res.set_results(ctx.config().path("site.name", "untitled"));
            Ok(())
        }),
        0,
    );
    let response = server.resolve("title", json!({})).await.unwrap();
    assert_eq!(response.results, Some(json!("Ingest")));
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_failed_action_becomes_error_response() {
    let server = Server::new();
    let trail = Trail::default();
    server
        .get(
            "/fail",
            Action::callback(|_req, _res, _ctx| async { anyhow::bail!("database unavailable") }),
            10,
        )
        .unwrap();
    server.get("/fail", trail.record("after"), 0).unwrap();

    let response = server.resolve("GET /fail", json!({})).await.unwrap();
    assert_eq!(response.code, 500);
    assert_eq!(response.error.as_deref(), Some("database unavailable"));
    assert_eq!(response.stack.unwrap()[0].method, "database unavailable");
    assert!(trail.steps().is_empty());
}

#[tokio::test]
async fn test_panicking_action_is_contained() {
    let server = Server::new();
    server.on(
        "explode",
        Action::callback(|_req, _res, _ctx| async { panic!("kaboom") }),
        0,
    );

    let response = server.resolve("explode", json!({})).await.unwrap();
    assert_eq!(response.code, 500);
    assert_eq!(response.error.as_deref(), Some("action panicked: kaboom"));
}

#[tokio::test]
async fn test_error_listeners_see_the_failed_response() {
    let server = Server::new();
    server.on(
        "save",
        Action::callback(|_req, res, _ctx| async move {
            res.set_status(422);
            anyhow::bail!("invalid post")
        }),
        0,
    );
    server.on(
        ERROR_EVENT,
        Action::callback(|_req, res, _ctx| async move {
            let message = res.error().unwrap_or_default();
            res.add_error("title", format!("rejected: {}", message));
            Ok(())
        }),
        0,
    );

    let response = server.resolve("save", json!({})).await.unwrap();
    assert_eq!(response.code, 422);
    assert_eq!(
        serde_json::to_value(response.errors.unwrap()).unwrap(),
        json!({ "title": "rejected: invalid post" })
    );
}

// ============================================================================
// Lazy and view actions
// ============================================================================

#[tokio::test]
async fn test_lazy_action_loads_only_when_dispatched() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();

    let server = Server::new();
    server
        .get(
            "/lazy",
            Action::lazy(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Ok(|_req: Request, res: Response, _ctx: Context| async move {
                        res.set_text("loaded");
                        anyhow::Ok(())
                    })
                }
            }),
            0,
        )
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 0);

    server.resolve("GET /other", json!({})).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 0);

    let response = server.resolve("GET /lazy", json!({})).await.unwrap();
    assert_eq!(response.results, Some(json!("loaded")));
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lazy_load_failure_is_an_action_error() {
    let server = Server::new();
    server.on(
        "lazy",
        Action::lazy(|| async {
            Err::<fn(Request, Response, Context) -> futures::future::Ready<anyhow::Result<()>>, _>(
                anyhow::anyhow!("module not found"),
            )
        }),
        0,
    );

    let response = server.resolve("lazy", json!({})).await.unwrap();
    assert_eq!(response.code, 500);
    assert_eq!(response.error.as_deref(), Some("failed to load lazy action"));
    let causes: Vec<String> = response.stack.unwrap().into_iter().map(|t| t.method).collect();
    assert_eq!(causes, vec!["failed to load lazy action", "module not found"]);
}

#[tokio::test]
async fn test_server_action_then_view_action() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("article.html"),
        "<h1>{title}</h1><p>by {author}</p>",
    )
    .unwrap();

    let server = Server::new();
    server.set_view_engine(TemplateEngine::new(dir.path()));
    server
        .get(
            "/article/:author",
            Action::callback(|_req, res, _ctx| async move {
                res.set_results(json!({ "title": "Fish & Chips" }));
                Ok(())
            }),
            10,
        )
        .unwrap();
    server.get("/article/:author", "@/article", 0).unwrap();

    let response = server.resolve("GET /article/ann", json!({})).await.unwrap();
    assert_eq!(
        response.results,
        Some(json!("<h1>Fish &amp; Chips</h1><p>by ann</p>"))
    );
}

#[tokio::test]
async fn test_view_skipped_when_text_body_exists() {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::new();
    server.set_view_engine(TemplateEngine::new(dir.path()));
    server.get("/", set_body("cached"), 10).unwrap();
    server.get("/", "@/does-not-exist", 0).unwrap();

    let response = server.resolve("GET /", json!({})).await.unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.results, Some(json!("Hello cached")));
}

#[tokio::test]
async fn test_missing_view_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let server = Server::new();
    server.set_view_engine(TemplateEngine::new(dir.path()));
    server.get("/", "@/nope", 0).unwrap();

    let response = server.resolve("GET /", json!({})).await.unwrap();
    assert_eq!(response.code, 500);
    assert!(response.error.unwrap().starts_with("view not found: @/nope"));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_handle_lifecycle_order_and_dispatch() {
    let server = Server::new();
    let trail = Trail::default();
    server.on(RESPONSE_EVENT, trail.record("response"), 0);
    server.on(REQUEST_EVENT, trail.record("request"), 0);
    server.get("/", trail.record("route"), 0).unwrap();

    let sent = Arc::new(AtomicUsize::new(0));
    let counter = sent.clone();
    let res = Response::new();
    res.set_dispatcher(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let status = server
        .handle(&Request::new(Method::Get, "/"), &res)
        .await
        .unwrap();
    assert_eq!(status, EmitStatus::Ok);
    assert_eq!(trail.steps(), vec!["request", "route", "response"]);
    assert_eq!(sent.load(Ordering::SeqCst), 1);
    assert!(res.is_sent());
}

#[tokio::test]
async fn test_stop_in_request_skips_route_and_dispatch() {
    let server = Server::new();
    let trail = Trail::default();
    server.on(
        REQUEST_EVENT,
        Action::callback(|_req, res, _ctx| async move {
            res.set_status(401).set_error("Unauthorized");
            res.stop();
            Ok(())
        }),
        0,
    );
    server.get("/", trail.record("route"), 0).unwrap();

    let res = Response::new();
    let status = server
        .handle(&Request::new(Method::Get, "/"), &res)
        .await
        .unwrap();
    assert_eq!(status, EmitStatus::Aborted);
    assert!(trail.steps().is_empty());
    assert!(!res.dispatch().unwrap());
    assert_eq!(res.code(), 401);
}

#[tokio::test]
async fn test_failed_request_listener_skips_route() {
    let server = Server::new();
    let trail = Trail::default();
    server.on(
        REQUEST_EVENT,
        Action::callback(|_req, _res, _ctx| async { anyhow::bail!("auth failed") }),
        0,
    );
    server
        .get(
            "/",
            Action::callback(|_req, res, _ctx| async move {
                res.set_results(json!({ "secret": true }));
                Ok(())
            }),
            0,
        )
        .unwrap();
    server.on(RESPONSE_EVENT, trail.record("response"), 0);

    let res = Response::new();
    let status = server
        .handle(&Request::new(Method::Get, "/"), &res)
        .await
        .unwrap();
    assert_eq!(status, EmitStatus::Aborted);
    assert_eq!(res.code(), 500);
    assert_eq!(res.error().as_deref(), Some("auth failed"));
    assert_eq!(res.results(), None);
    assert_eq!(trail.steps(), vec!["response"]);
    assert!(res.is_sent());
}

#[tokio::test]
async fn test_failed_response_listener_keeps_route_result() {
    let server = Server::new();
    server
        .get(
            "/",
            Action::callback(|_req, res, _ctx| async move {
                res.set_text("page");
                Ok(())
            }),
            0,
        )
        .unwrap();
    server.on(
        RESPONSE_EVENT,
        Action::callback(|_req, _res, _ctx| async { anyhow::bail!("audit log offline") }),
        0,
    );

    let res = Response::new();
    let status = server
        .handle(&Request::new(Method::Get, "/"), &res)
        .await
        .unwrap();
    assert_eq!(status, EmitStatus::Ok);
    assert_eq!(res.code(), 500);
    assert_eq!(res.error().as_deref(), Some("audit log offline"));
    assert!(res.is_sent());
}

#[tokio::test]
async fn test_stop_halts_remaining_actions() {
    let server = Server::new();
    let trail = Trail::default();
    server
        .get(
            "/",
            Action::callback(|_req, res, _ctx| async move {
                res.set_text("done");
                res.stop();
                Ok(())
            }),
            1,
        )
        .unwrap();
    server.get("/", trail.record("never"), 0).unwrap();

    let status = server
        .emit("GET /", &Request::default(), &Response::new())
        .await;
    assert_eq!(status, EmitStatus::Aborted);
    assert!(trail.steps().is_empty());
}

#[tokio::test]
async fn test_unmatched_route_in_handle_is_404() {
    let server = Server::new();
    let res = Response::new();
    let status = server
        .handle(&Request::new(Method::Get, "/nowhere"), &res)
        .await
        .unwrap();
    assert_eq!(status, EmitStatus::NotFound);
    assert_eq!(res.code(), 404);
    assert_eq!(res.error().as_deref(), Some("Not Found"));
}

#[tokio::test]
async fn test_resolved_envelope_round_trips() {
    let server = Server::new();
    server.on(
        "rows",
        Action::callback(|_req, res, _ctx| async move {
            res.set_rows(vec![json!({ "id": 1 })], 42);
            Ok(())
        }),
        0,
    );
    let envelope = server.resolve("rows", json!({})).await.unwrap();
    let copy = Response::from(envelope.clone());
    assert_eq!(copy.to_status_response(), envelope);

    let parsed: StatusResponse = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
    assert_eq!(parsed.total, Some(42));
}
