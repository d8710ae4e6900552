//! API Module
//!
//! HTTP handlers and routing for the mailbox REST API.
//!
//! # Endpoints
//! - `GET /emails` - List a folder page
//! - `GET /emails/:uid` - Fetch one message
//! - `POST /search` - Search a folder
//! - `GET /folders` - List folders with counts
//! - `POST /operations` - Apply a flag, move, copy, delete or label change
//! - `POST /prefetch` - Warm the cache with likely next messages
//! - `DELETE /cache/accounts/:account_id` - Drop an account's cache entries
//! - `GET /stats` - Cache and pool statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
