//! HTTP API layer for sinmungo.
//!
//! This crate provides the JSON API consumed by the web client:
//!
//! - **Endpoints**: citizen, moderation and auth routes under `/api`
//! - **Extractors**: bearer-token authentication
//! - **Middleware**: token resolution into request extensions
//! - **Files**: signed-URL access to locally stored attachments
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod files;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use files::{FileState, serve_file};
