//! Request DTOs for the mailbox API
//!
//! Query strings and bodies accepted by the HTTP handlers.

use serde::Deserialize;

use crate::mailbox::{EmailSummary, SearchFilter, SortOrder};

/// Largest page a client may request
pub const MAX_PAGE_SIZE: usize = 100;

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn validate_page(folder: &str, limit: usize) -> Option<String> {
    if folder.trim().is_empty() {
        return Some("Folder cannot be empty".to_string());
    }
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Some(format!("Limit must be between 1 and {}", MAX_PAGE_SIZE));
    }
    None
}

/// Query for GET /emails
#[derive(Debug, Clone, Deserialize)]
pub struct ListEmailsQuery {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

impl ListEmailsQuery {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_page(&self.folder, self.limit)
    }
}

/// Query for GET /emails/:uid
#[derive(Debug, Clone, Deserialize)]
pub struct GetEmailQuery {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub include_summary: bool,
}

/// Query for GET /folders
#[derive(Debug, Clone, Deserialize)]
pub struct CacheQuery {
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

/// Body for POST /search
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub filter: SearchFilter,
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

impl SearchRequest {
    pub fn validate(&self) -> Option<String> {
        if let Some(error) = validate_page(&self.folder, self.limit) {
            return Some(error);
        }
        if let (Some(since), Some(before)) = (self.filter.since, self.filter.before) {
            if since >= before {
                return Some("'since' must be earlier than 'before'".to_string());
            }
        }
        None
    }
}

/// Body for POST /prefetch
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchRequest {
    #[serde(default = "default_folder")]
    pub folder: String,
    /// The message being read, never prefetched itself
    pub current_uid: String,
    pub candidates: Vec<EmailSummary>,
}
