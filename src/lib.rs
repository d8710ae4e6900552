//! Mailbox Cache - REST facade over mailboxes with a caching layer
//!
//! Wraps a slow, single-session mailbox collaborator with a TTL cache
//! (in-process or Redis), mutation-driven invalidation and a set of
//! performance utilities.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod models;
pub mod perf;
pub mod service;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use service::MailService;
pub use tasks::spawn_cleanup_task;
