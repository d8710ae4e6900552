//! Mail Service Module
//!
//! Cache-aside reads and invalidate-after-write mutations over pooled
//! mailbox sessions. This is the only component that talks to both the
//! cache and the mailbox.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CacheStore, MailCache};
use crate::config::Config;
use crate::error::{MailboxError, PoolError};
use crate::mailbox::{
    Email, EmailPage, EmailSummary, FolderInfo, MailOperation, MailboxConnector, MailboxSession,
    OperationResult, SearchFilter, SortOrder, Summarizer,
};
use crate::perf::{
    process_in_batches, AccessTracker, ConnectionManager, ConnectionPool, PoolStatus,
    PrefetchScorer, RequestDeduplicator, RetryPolicy,
};

// == Response Wrappers ==
/// A result plus whether it was served from cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cached<T> {
    pub data: T,
    pub cached: bool,
}

/// A single message as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailView {
    pub email: Email,
    /// Present only when requested and the summarizer succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub cached: bool,
}

// == Session Manager ==
/// Feeds mailbox sessions into the connection pool.
pub struct SessionManager {
    connector: Arc<dyn MailboxConnector>,
}

#[async_trait]
impl ConnectionManager for SessionManager {
    type Connection = MailboxSession;

    async fn connect(&self) -> Result<MailboxSession, PoolError> {
        self.connector
            .open_session()
            .await
            .map_err(|e| PoolError::Connect(e.to_string()))
    }

    async fn close(&self, session: MailboxSession) {
        self.connector.close_session(session).await;
    }
}

type SessionPool = ConnectionPool<SessionManager>;

/// Runs `op` on a pooled session, retrying transient failures (including an
/// exhausted pool).
async fn with_session<T, F, Fut>(
    pool: &SessionPool,
    retry: RetryPolicy,
    op: F,
) -> Result<T, MailboxError>
where
    F: Fn(MailboxSession) -> Fut,
    Fut: Future<Output = Result<T, MailboxError>>,
{
    let op = &op;
    retry
        .run_if(
            move || async move {
                let handle = pool.acquire().await?;
                let result = op(Arc::clone(&handle)).await;
                pool.release(handle).await;
                result
            },
            MailboxError::is_transient,
        )
        .await
}

// == Mail Service ==
/// Everything a request handler needs for one account.
pub struct MailService {
    account: String,
    pool: Arc<SessionPool>,
    summarizer: Option<Arc<dyn Summarizer>>,
    cache: MailCache,
    emails: RequestDeduplicator<Email, MailboxError>,
    pages: RequestDeduplicator<EmailPage, MailboxError>,
    access: AccessTracker,
    scorer: PrefetchScorer,
    retry: RetryPolicy,
    batch_size: usize,
    prefetch_top_k: usize,
}

impl MailService {
    /// Builds the service from configuration, sharing `store` as its cache.
    pub fn new(config: &Config, connector: Arc<dyn MailboxConnector>, store: CacheStore) -> Self {
        Self {
            account: config.account.clone(),
            pool: Arc::new(ConnectionPool::new(
                SessionManager { connector },
                config.pool_max_size,
            )),
            summarizer: None,
            cache: MailCache::new(store, config.ttl.clone(), config.search_policy.clone()),
            emails: RequestDeduplicator::new(),
            pages: RequestDeduplicator::new(),
            access: AccessTracker::default(),
            scorer: PrefetchScorer::default(),
            retry: config.retry_policy(),
            batch_size: config.batch_size,
            prefetch_top_k: config.prefetch_top_k,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn cache(&self) -> &MailCache {
        &self.cache
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    // == List Emails ==
    pub async fn list_emails(
        &self,
        folder: &str,
        limit: usize,
        offset: usize,
        sort: SortOrder,
        use_cache: bool,
    ) -> Result<Cached<EmailPage>, MailboxError> {
        if limit == 0 {
            return Err(MailboxError::InvalidRequest(
                "limit must be greater than zero".to_string(),
            ));
        }

        if use_cache {
            if let Some(page) = self
                .cache
                .get_email_list(&self.account, folder, limit, offset, sort)
                .await
            {
                return Ok(Cached {
                    data: page,
                    cached: true,
                });
            }
        }

        // A fetch started before an invalidation must not be joined after it
        let generation = self.cache.generation(&self.account, folder);
        let key = format!(
            "{}@{}",
            MailCache::list_key(&self.account, folder, limit, offset, sort),
            generation
        );
        let pool = Arc::clone(&self.pool);
        let retry = self.retry;
        let folder_owned = folder.to_string();
        let page = self
            .pages
            .dedupe(&key, move || async move {
                with_session(&pool, retry, |session| {
                    let folder = folder_owned.clone();
                    async move { session.list_emails(&folder, limit, offset, sort).await }
                })
                .await
            })
            .await?;

        self.cache
            .set_email_list(&self.account, folder, limit, offset, sort, &page, generation)
            .await;

        Ok(Cached {
            data: page,
            cached: false,
        })
    }

    // == Get Email ==
    pub async fn get_email(
        &self,
        uid: &str,
        folder: &str,
        use_cache: bool,
        include_summary: bool,
    ) -> Result<EmailView, MailboxError> {
        self.access.record(folder, uid);

        let cached_email = if use_cache {
            self.cache.get_email(&self.account, folder, uid).await
        } else {
            None
        };

        let (email, cached) = match cached_email {
            Some(email) => (email, true),
            None => (self.fetch_email(uid, folder).await?, false),
        };

        let summary = if include_summary {
            self.summarize(&email).await
        } else {
            None
        };

        Ok(EmailView {
            email,
            summary,
            cached,
        })
    }

    /// Fetches one message from the mailbox, coalescing concurrent requests
    /// for it, and caches the result.
    async fn fetch_email(&self, uid: &str, folder: &str) -> Result<Email, MailboxError> {
        let generation = self.cache.generation(&self.account, folder);
        let key = format!("{}@{}", MailCache::email_key(&self.account, folder, uid), generation);
        let pool = Arc::clone(&self.pool);
        let retry = self.retry;
        let (uid_owned, folder_owned) = (uid.to_string(), folder.to_string());

        let email = self
            .emails
            .dedupe(&key, move || async move {
                with_session(&pool, retry, |session| {
                    let (uid, folder) = (uid_owned.clone(), folder_owned.clone());
                    async move { session.get_email(&uid, &folder).await }
                })
                .await
            })
            .await?;

        self.cache
            .set_email(&self.account, folder, uid, &email, generation)
            .await;
        Ok(email)
    }

    async fn summarize(&self, email: &Email) -> Option<String> {
        let summarizer = self.summarizer.as_ref()?;
        match summarizer.summarize(email).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Summary for {} unavailable: {}", email.summary.uid, e);
                None
            }
        }
    }

    // == Search Emails ==
    pub async fn search_emails(
        &self,
        filter: &SearchFilter,
        folder: &str,
        limit: usize,
        offset: usize,
        use_cache: bool,
    ) -> Result<Cached<EmailPage>, MailboxError> {
        if limit == 0 {
            return Err(MailboxError::InvalidRequest(
                "limit must be greater than zero".to_string(),
            ));
        }

        if use_cache {
            if let Some(page) = self
                .cache
                .get_search_results(&self.account, folder, filter, limit, offset)
                .await
            {
                return Ok(Cached {
                    data: page,
                    cached: true,
                });
            }
        }

        let generation = self.cache.generation(&self.account, folder);
        let page = with_session(&self.pool, self.retry, |session| {
            let filter = filter.clone();
            let folder = folder.to_string();
            async move { session.search_emails(&filter, &folder, limit, offset).await }
        })
        .await?;

        if !self
            .cache
            .set_search_results(&self.account, folder, filter, limit, offset, &page, generation)
            .await
            && !self.cache.is_cacheable_search(filter)
        {
            debug!("Search in {} not cached: filter is time or state sensitive", folder);
        }

        Ok(Cached {
            data: page,
            cached: false,
        })
    }

    // == List Folders ==
    pub async fn list_folders(
        &self,
        use_cache: bool,
    ) -> Result<Cached<Vec<FolderInfo>>, MailboxError> {
        if use_cache {
            if let Some(folders) = self.cache.get_folders(&self.account).await {
                return Ok(Cached {
                    data: folders,
                    cached: true,
                });
            }
        }

        let generation = self.cache.folders_generation(&self.account);
        let folders = with_session(&self.pool, self.retry, |session| async move {
            session.list_folders().await
        })
        .await?;

        self.cache
            .set_folders(&self.account, &folders, generation)
            .await;

        Ok(Cached {
            data: folders,
            cached: false,
        })
    }

    // == Perform Operation ==
    /// Applies a mutation, then invalidates every cache entry it may have
    /// made stale.
    ///
    /// Invalidation also runs when the mailbox reports a failure, since a
    /// failed multi-message command may still have applied in part.
    /// Mutations are not retried.
    pub async fn perform_operation(
        &self,
        operation: &MailOperation,
    ) -> Result<OperationResult, MailboxError> {
        operation.validate()?;

        let single_attempt = RetryPolicy::new(1, self.retry.base_delay);
        let outcome = with_session(&self.pool, single_attempt, |session| {
            let operation = operation.clone();
            async move { session.perform_operation(&operation).await }
        })
        .await;

        self.cache.invalidate(&self.account, operation).await;
        outcome
    }

    // == Prefetch ==
    /// Warms the cache with the messages around `current_uid` most likely to
    /// be opened next. Returns how many were fetched.
    pub async fn prefetch(
        &self,
        folder: &str,
        current_uid: &str,
        candidates: &[EmailSummary],
    ) -> usize {
        let picks: Vec<&EmailSummary> = self.scorer.top_candidates(
            current_uid,
            candidates,
            &self.access,
            Utc::now(),
            self.prefetch_top_k,
        );

        let mut cold = Vec::with_capacity(picks.len());
        for pick in picks {
            if self.cache.get_email(&self.account, folder, &pick.uid).await.is_none() {
                cold.push(pick.uid.clone());
            }
        }

        let results = process_in_batches(cold, self.batch_size, move |uid| async move {
            self.fetch_email(&uid, folder).await
        })
        .await;

        let fetched = results.iter().filter(|r| r.is_ok()).count();
        if fetched > 0 {
            debug!("Prefetched {} messages in {}", fetched, folder);
        }
        fetched
    }

    // == Administration ==
    /// Drops every cache entry of `account_id`.
    pub async fn clear_account_cache(&self, account_id: &str) -> usize {
        let removed = self.cache.clear_account(account_id).await;
        info!("Cleared {} cache entries for account {}", removed, account_id);
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Closes idle sessions and refuses new ones.
    pub async fn shutdown(&self) {
        self.pool.destroy().await;
    }
}
