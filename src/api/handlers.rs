//! API Handlers
//!
//! HTTP request handlers for each mailbox endpoint. Handlers only validate
//! input and delegate to [`MailService`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::{ApiError, Result};
use crate::mailbox::{EmailPage, FolderInfo, MailOperation, OperationResult};
use crate::models::{
    CacheQuery, ClearCacheResponse, GetEmailQuery, HealthResponse, ListEmailsQuery,
    PrefetchRequest, PrefetchResponse, SearchRequest, StatsResponse,
};
use crate::service::{Cached, EmailView, MailService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MailService>,
}

impl AppState {
    pub fn new(service: MailService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Handler for GET /emails
pub async fn list_emails_handler(
    State(state): State<AppState>,
    Query(query): Query<ListEmailsQuery>,
) -> Result<Json<Cached<EmailPage>>> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let page = state
        .service
        .list_emails(
            &query.folder,
            query.limit,
            query.offset,
            query.sort,
            query.use_cache,
        )
        .await?;

    Ok(Json(page))
}

/// Handler for GET /emails/:uid
pub async fn get_email_handler(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<GetEmailQuery>,
) -> Result<Json<EmailView>> {
    let view = state
        .service
        .get_email(&uid, &query.folder, query.use_cache, query.include_summary)
        .await?;

    Ok(Json(view))
}

/// Handler for POST /search
pub async fn search_handler(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Cached<EmailPage>>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let page = state
        .service
        .search_emails(&req.filter, &req.folder, req.limit, req.offset, req.use_cache)
        .await?;

    Ok(Json(page))
}

/// Handler for GET /folders
pub async fn folders_handler(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<Cached<Vec<FolderInfo>>>> {
    Ok(Json(state.service.list_folders(query.use_cache).await?))
}

/// Handler for POST /operations
///
/// The mailbox mutation completes before any cache entry is invalidated.
pub async fn operation_handler(
    State(state): State<AppState>,
    Json(operation): Json<MailOperation>,
) -> Result<Json<OperationResult>> {
    Ok(Json(state.service.perform_operation(&operation).await?))
}

/// Handler for POST /prefetch
pub async fn prefetch_handler(
    State(state): State<AppState>,
    Json(req): Json<PrefetchRequest>,
) -> Json<PrefetchResponse> {
    let prefetched = state
        .service
        .prefetch(&req.folder, &req.current_uid, &req.candidates)
        .await;

    Json(PrefetchResponse { prefetched })
}

/// Handler for DELETE /cache/accounts/:account_id
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Json<ClearCacheResponse> {
    let removed = state.service.clear_account_cache(&account_id).await;
    Json(ClearCacheResponse::new(account_id, removed))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.service.stats().await;
    Json(StatsResponse::new(stats, state.service.pool_status()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::config::Config;
    use crate::mailbox::{InMemoryMailbox, OperationKind, SharedMailbox, SortOrder};

    fn test_state() -> AppState {
        let config = Config::default();
        let connector = Arc::new(SharedMailbox::new(Arc::new(InMemoryMailbox::sample())));
        AppState::new(MailService::new(&config, connector, CacheStore::memory(100, 10)))
    }

    fn list_query(limit: usize) -> ListEmailsQuery {
        ListEmailsQuery {
            folder: "INBOX".to_string(),
            limit,
            offset: 0,
            sort: SortOrder::Desc,
            use_cache: true,
        }
    }

    #[tokio::test]
    async fn test_list_then_cached() {
        let state = test_state();

        let first = list_emails_handler(State(state.clone()), Query(list_query(10)))
            .await
            .unwrap();
        let second = list_emails_handler(State(state), Query(list_query(10)))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.data.items.len(), 4);
    }

    #[tokio::test]
    async fn test_list_invalid_limit() {
        let result = list_emails_handler(State(test_state()), Query(list_query(0))).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_get_missing_email() {
        let query = GetEmailQuery {
            folder: "INBOX".to_string(),
            use_cache: true,
            include_summary: false,
        };
        let result = get_email_handler(State(test_state()), Path("42".to_string()), Query(query)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_operation_handler() {
        let state = test_state();
        let op = MailOperation::new(OperationKind::MarkRead, "INBOX", &["3", "4"]);

        let result = operation_handler(State(state), Json(op)).await.unwrap();

        assert!(result.success);
        assert_eq!(result.processed, 2);
    }

    #[tokio::test]
    async fn test_clear_cache_handler() {
        let state = test_state();
        let folders = folders_handler(State(state.clone()), Query(CacheQuery { use_cache: true }))
            .await
            .unwrap();
        assert!(!folders.cached);

        let response = clear_cache_handler(State(state), Path("default".to_string())).await;

        assert_eq!(response.removed, 1);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(test_state())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        assert_eq!(response.backend, "memory");
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
