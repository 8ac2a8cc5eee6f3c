// File: src/pages.rs
// Purpose: Default HTML error page for browser clients

use ingest::{ErrorValue, StatusResponse};
use maud::{html, Markup, DOCTYPE};

/// Error page listing the message and any field errors
pub fn error_page(envelope: &StatusResponse) -> Markup {
    let message = envelope.error.as_deref().unwrap_or(&envelope.status);

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (envelope.code) " " (envelope.status) }
            }
            body {
                h1 { (envelope.code) " " (envelope.status) }
                p { (message) }
                @if let Some(errors) = &envelope.errors {
                    ul {
                        @for (field, error) in errors {
                            li { strong { (field) } ": " (describe(error)) }
                        }
                    }
                }
                a href="/" { "Go Home" }
            }
        }
    }
}

fn describe(error: &ErrorValue) -> String {
    match error {
        ErrorValue::Message(message) => message.clone(),
        ErrorValue::List(messages) => messages.join(", "),
        ErrorValue::Nested(nested) => nested
            .iter()
            .map(|(field, error)| format!("{} {}", field, describe(error)))
            .collect::<Vec<_>>()
            .join("; "),
    }
}
