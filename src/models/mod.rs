//! Request and Response models for the mailbox API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    CacheQuery, GetEmailQuery, ListEmailsQuery, PrefetchRequest, SearchRequest, MAX_PAGE_SIZE,
};
pub use responses::{ClearCacheResponse, HealthResponse, PrefetchResponse, StatsResponse};
