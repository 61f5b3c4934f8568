//! Clipview Web - Preview pages and JSON API

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Server-rendered video preview pages with HTMX partial updates, plus JSON
//! endpoints for clients that render their own player.

pub mod components;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;

// Re-export main types
pub use error::WebError;
pub use server::{AppState, build_router, run_server};
