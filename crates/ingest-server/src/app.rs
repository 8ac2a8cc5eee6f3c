// File: src/app.rs
// Purpose: Demo application registered as a plugin

use ingest::{Action, Context, Request, Response, Server, ERROR_EVENT, REQUEST_EVENT};
use serde_json::json;
use tracing::{info, warn};

/// Registers the demo routes and listeners
///
/// - `GET /` runs three actions at priorities 100, 0 and -100
/// - `/blog/:name/articles`, `/blog/*/comments` and `/blog/**` show params
/// - `GET /users/:id` pairs a server action with the `@/user` view
/// - `GET /report` is loaded lazily on first match
/// - `GET /boom` fails so the `error` listener runs
pub fn app(server: &Server) -> anyhow::Result<()> {
    server.on(
        REQUEST_EVENT,
        Action::callback(|_req, res, _ctx| async move {
            res.set_header("x-powered-by", "ingest");
            Ok(())
        }),
        0,
    );

    server.get("/", Action::callback(|_req, res, _ctx| async move {
        res.set_html("Hello Before");
        Ok(())
    }), 100)?;
    server.get("/", Action::callback(|_req, res, _ctx| async move {
        append(&res, ", World");
        Ok(())
    }), 0)?;
    server.get("/", Action::callback(|_req, res, _ctx| async move {
        append(&res, ", After");
        Ok(())
    }), -100)?;

    server.get("/blog/:name/articles", Action::callback(|req, res, _ctx| async move {
        res.set_results(json!({ "author": req.get("name"), "articles": [] }));
        Ok(())
    }), 0)?;
    server.get("/blog/*/comments", Action::callback(|req, res, _ctx| async move {
        res.set_results(json!({ "post": req.get("0"), "comments": [] }));
        Ok(())
    }), 0)?;
    // Lower priority so the more specific blog routes answer first
    server.get("/blog/**", Action::callback(|req, res, _ctx| async move {
        if !res.has_body() {
            res.set_results(json!({ "path": req.get("0") }));
        }
        Ok(())
    }), -10)?;

    server.get("/users/:id", Action::callback(|req, res, _ctx| async move {
        let id = req.get("id").unwrap_or_default();
        let name = format!("User {}", display(&id));
        res.set_results(json!({ "id": id, "name": name }));
        Ok(())
    }), 10)?;
    server.get("/users/:id", Action::view("@/user"), 0)?;

    server.get("/report", Action::lazy(|| async {
        info!("Loading report action");
        anyhow::Ok(report)
    }), 0)?;

    server.get("/boom", Action::callback(|_req, _res, _ctx| async move {
        anyhow::bail!("the demo route failed on purpose")
    }), 0)?;

    server.on(ERROR_EVENT, Action::callback(|req, res, ctx| async move {
        warn!(
            path = %req.path(),
            key = ctx.key(),
            error = %res.error().unwrap_or_default(),
            "request failed"
        );
        Ok(())
    }), 0);

    Ok(())
}

async fn report(_req: Request, res: Response, ctx: Context) -> anyhow::Result<()> {
    let title = ctx.config().path("report.title", "Monthly report");
    res.set_rows(
        vec![
            json!({ "month": "January", "visits": 120 }),
            json!({ "month": "February", "visits": 98 }),
        ],
        2,
    );
    res.data_mut().set("title", title);
    Ok(())
}

fn append(res: &Response, text: &str) {
    let current = res.body().to_text();
    res.set_html(format!("{}{}", current, text));
}

fn display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
