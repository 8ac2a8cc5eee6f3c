//! # Ingest Server
//!
//! Transport boundary layers for the ingest router:
//! - [`http`]: axum adapter (`router`, `serve`)
//! - [`pages`]: default HTML error page
//! - [`app`]: demo application plugin used by the binary

pub mod app;
pub mod http;
pub mod pages;

pub use http::{router, serve};
