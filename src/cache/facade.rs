//! Domain cache facade.
//!
//! Typed get/set pairs for the four cached resource classes, each keyed by
//! everything that identifies the query and stored with its own TTL.
//!
//! Every write carries the [`Generation`] observed before the upstream fetch
//! began. Invalidation bumps the generation of the folders it touches, so a
//! fetch that raced a mutation cannot put pre-mutation data back.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::cache::keys::{derive_key, ResourceClass, ACCOUNT_PARAM, FOLDER_PARAM};
use crate::cache::policy::{SearchCachePolicy, TtlPolicy};
use crate::cache::stats::CacheStats;
use crate::cache::store::CacheStore;
use crate::mailbox::{Email, EmailPage, FolderInfo, SearchFilter, SortOrder};

// == Generations ==
/// Invalidation counter for one folder (or the folder list) of an account,
/// captured before a fetch and checked before its result is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation {
    account: u64,
    scope: u64,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.account, self.scope)
    }
}

/// `None` as the folder stands for the account's folder list.
type Scope = (String, Option<String>);

#[derive(Debug, Default)]
struct Generations {
    accounts: HashMap<String, u64>,
    scopes: HashMap<Scope, u64>,
}

#[derive(Clone)]
pub struct MailCache {
    store: CacheStore,
    ttl: TtlPolicy,
    search_policy: SearchCachePolicy,
    generations: Arc<Mutex<Generations>>,
}

impl MailCache {
    pub fn new(store: CacheStore, ttl: TtlPolicy, search_policy: SearchCachePolicy) -> Self {
        Self {
            store,
            ttl,
            search_policy,
            generations: Arc::new(Mutex::new(Generations::default())),
        }
    }

    fn generations(&self) -> MutexGuard<'_, Generations> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn generation_of(&self, account: &str, folder: Option<&str>) -> Generation {
        let generations = self.generations();
        let scope = (account.to_string(), folder.map(str::to_string));
        Generation {
            account: generations.accounts.get(account).copied().unwrap_or(0),
            scope: generations.scopes.get(&scope).copied().unwrap_or(0),
        }
    }

    /// Current generation of `folder`, covering its lists, searches and
    /// single emails.
    pub fn generation(&self, account: &str, folder: &str) -> Generation {
        self.generation_of(account, Some(folder))
    }

    /// Current generation of the account's folder list.
    pub fn folders_generation(&self, account: &str) -> Generation {
        self.generation_of(account, None)
    }

    pub(crate) fn bump_folder(&self, account: &str, folder: &str) {
        let scope = (account.to_string(), Some(folder.to_string()));
        *self.generations().scopes.entry(scope).or_insert(0) += 1;
    }

    pub(crate) fn bump_folder_list(&self, account: &str) {
        let scope = (account.to_string(), None);
        *self.generations().scopes.entry(scope).or_insert(0) += 1;
    }

    fn bump_account(&self, account: &str) {
        *self
            .generations()
            .accounts
            .entry(account.to_string())
            .or_insert(0) += 1;
    }

    /// Writes `value` unless `folder` was invalidated since `seen`.
    ///
    /// The generation is checked again after the write, so an invalidation
    /// that ran while the write was in progress still wins.
    async fn store_if_current<T: Serialize + ?Sized>(
        &self,
        account: &str,
        folder: Option<&str>,
        seen: Generation,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> bool {
        if self.generation_of(account, folder) != seen {
            debug!("Skipping stale cache write for {}", key);
            return false;
        }
        self.store.set(key, value, ttl_seconds).await;
        if self.generation_of(account, folder) != seen {
            debug!("Dropping cache write for {} invalidated mid-write", key);
            self.store.delete(key).await;
            return false;
        }
        true
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    // == Keys ==
    pub fn list_key(
        account: &str,
        folder: &str,
        limit: usize,
        offset: usize,
        sort: SortOrder,
    ) -> String {
        derive_key(
            ResourceClass::EmailList,
            [
                (ACCOUNT_PARAM, account.to_string()),
                (FOLDER_PARAM, folder.to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("sort", sort.to_string()),
            ],
        )
    }

    pub fn search_key(
        account: &str,
        folder: &str,
        filter: &SearchFilter,
        limit: usize,
        offset: usize,
    ) -> String {
        let mut params = vec![
            (ACCOUNT_PARAM, account.to_string()),
            (FOLDER_PARAM, folder.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ];
        params.extend(filter.key_params());
        derive_key(ResourceClass::SearchResults, params)
    }

    pub fn email_key(account: &str, folder: &str, uid: &str) -> String {
        derive_key(
            ResourceClass::Email,
            [(ACCOUNT_PARAM, account), (FOLDER_PARAM, folder), ("uid", uid)],
        )
    }

    pub fn folders_key(account: &str) -> String {
        derive_key(ResourceClass::FolderList, [(ACCOUNT_PARAM, account)])
    }

    // == Email Lists ==
    pub async fn get_email_list(
        &self,
        account: &str,
        folder: &str,
        limit: usize,
        offset: usize,
        sort: SortOrder,
    ) -> Option<EmailPage> {
        self.store
            .get(&Self::list_key(account, folder, limit, offset, sort))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set_email_list(
        &self,
        account: &str,
        folder: &str,
        limit: usize,
        offset: usize,
        sort: SortOrder,
        page: &EmailPage,
        seen: Generation,
    ) -> bool {
        let key = Self::list_key(account, folder, limit, offset, sort);
        self.store_if_current(account, Some(folder), seen, &key, page, self.ttl.email_list)
            .await
    }

    // == Search Results ==
    /// Whether results for `filter` may be cached at all.
    pub fn is_cacheable_search(&self, filter: &SearchFilter) -> bool {
        self.search_policy.allows(filter)
    }

    /// Uncacheable searches are always a miss.
    pub async fn get_search_results(
        &self,
        account: &str,
        folder: &str,
        filter: &SearchFilter,
        limit: usize,
        offset: usize,
    ) -> Option<EmailPage> {
        if !self.is_cacheable_search(filter) {
            return None;
        }
        self.store
            .get(&Self::search_key(account, folder, filter, limit, offset))
            .await
    }

    /// Returns whether the page was stored.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_search_results(
        &self,
        account: &str,
        folder: &str,
        filter: &SearchFilter,
        limit: usize,
        offset: usize,
        page: &EmailPage,
        seen: Generation,
    ) -> bool {
        if !self.is_cacheable_search(filter) {
            return false;
        }
        let key = Self::search_key(account, folder, filter, limit, offset);
        self.store_if_current(account, Some(folder), seen, &key, page, self.ttl.search)
            .await
    }

    // == Single Emails ==
    pub async fn get_email(&self, account: &str, folder: &str, uid: &str) -> Option<Email> {
        self.store.get(&Self::email_key(account, folder, uid)).await
    }

    /// Stores a message under the folder and uid it was requested by, with
    /// a TTL derived from its age and read state.
    pub async fn set_email(
        &self,
        account: &str,
        folder: &str,
        uid: &str,
        email: &Email,
        seen: Generation,
    ) -> bool {
        let summary = &email.summary;
        let ttl = self.ttl.email.ttl_for(summary.date, summary.seen, Utc::now());
        let key = Self::email_key(account, folder, uid);
        self.store_if_current(account, Some(folder), seen, &key, email, ttl)
            .await
    }

    // == Folder Lists ==
    pub async fn get_folders(&self, account: &str) -> Option<Vec<FolderInfo>> {
        self.store.get(&Self::folders_key(account)).await
    }

    pub async fn set_folders(
        &self,
        account: &str,
        folders: &[FolderInfo],
        seen: Generation,
    ) -> bool {
        let key = Self::folders_key(account);
        self.store_if_current(account, None, seen, &key, folders, self.ttl.folder_list)
            .await
    }

    // == Administration ==
    /// Drops every cached entry belonging to `account`.
    pub async fn clear_account(&self, account: &str) -> usize {
        self.bump_account(account);
        let mut removed = 0;
        for class in ResourceClass::ALL {
            removed += self
                .store
                .clear_by_pattern(&crate::cache::keys::account_pattern(class, account))
                .await;
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mailbox::EmailSummary;
    use chrono::{DateTime, Duration};

    pub(crate) fn email(uid: &str, folder: &str, date: DateTime<Utc>, seen: bool) -> Email {
        Email {
            summary: EmailSummary {
                uid: uid.to_string(),
                folder: folder.to_string(),
                subject: format!("Message {uid}"),
                from: "someone@example.com".to_string(),
                to: vec![],
                date,
                seen,
                flagged: false,
                has_attachments: false,
                size: 100,
                labels: vec![],
            },
            text_body: Some("body".to_string()),
            html_body: None,
            attachments: vec![],
        }
    }

    pub(crate) fn page(uids: &[&str], folder: &str) -> EmailPage {
        EmailPage {
            items: uids
                .iter()
                .map(|uid| email(uid, folder, Utc::now(), true).summary)
                .collect(),
            total: uids.len() as u64,
            has_more: false,
        }
    }

    pub(crate) fn mail_cache() -> MailCache {
        MailCache::new(
            CacheStore::memory(100, 10),
            TtlPolicy::default(),
            SearchCachePolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_list_round_trip_and_distinct_queries() {
        let cache = mail_cache();
        let inbox = page(&["1", "2"], "INBOX");

        cache
            .set_email_list("a", "INBOX", 10, 0, SortOrder::Desc, &inbox, cache.generation("a", "INBOX"))
            .await;

        assert_eq!(
            cache.get_email_list("a", "INBOX", 10, 0, SortOrder::Desc).await,
            Some(inbox)
        );
        assert!(cache.get_email_list("a", "INBOX", 10, 10, SortOrder::Desc).await.is_none());
        assert!(cache.get_email_list("a", "INBOX", 10, 0, SortOrder::Asc).await.is_none());
        assert!(cache.get_email_list("b", "INBOX", 10, 0, SortOrder::Desc).await.is_none());
    }

    #[tokio::test]
    async fn test_email_round_trip() {
        let cache = mail_cache();
        let message = email("5", "INBOX", Utc::now() - Duration::days(3), true);

        cache
            .set_email("a", "INBOX", "5", &message, cache.generation("a", "INBOX"))
            .await;

        assert_eq!(cache.get_email("a", "INBOX", "5").await, Some(message));
        assert!(cache.get_email("a", "Sent", "5").await.is_none());
    }

    #[tokio::test]
    async fn test_email_keyed_by_requested_folder() {
        let cache = mail_cache();
        // The mailbox reports the folder in its own spelling
        let message = email("5", "Inbox", Utc::now(), true);

        cache
            .set_email("a", "INBOX", "5", &message, cache.generation("a", "INBOX"))
            .await;

        assert_eq!(cache.get_email("a", "INBOX", "5").await, Some(message));
        assert!(cache.get_email("a", "Inbox", "5").await.is_none());
    }

    #[tokio::test]
    async fn test_write_after_invalidation_is_skipped() {
        let cache = mail_cache();
        let before = cache.generation("a", "INBOX");
        let other = cache.generation("a", "Archive");

        cache.bump_folder("a", "INBOX");

        assert!(
            !cache
                .set_email_list("a", "INBOX", 10, 0, SortOrder::Desc, &page(&["1"], "INBOX"), before)
                .await
        );
        assert!(cache.get_email_list("a", "INBOX", 10, 0, SortOrder::Desc).await.is_none());
        assert!(
            cache
                .set_email_list("a", "Archive", 10, 0, SortOrder::Desc, &page(&["1"], "Archive"), other)
                .await
        );
        assert!(
            cache
                .set_email_list(
                    "a",
                    "INBOX",
                    10,
                    0,
                    SortOrder::Desc,
                    &page(&["1"], "INBOX"),
                    cache.generation("a", "INBOX"),
                )
                .await
        );
    }

    #[tokio::test]
    async fn test_clear_account_outdates_every_generation() {
        let cache = mail_cache();
        let folder = cache.generation("a", "INBOX");
        let folders = cache.folders_generation("a");
        let neighbour = cache.generation("b", "INBOX");

        cache.clear_account("a").await;

        assert_ne!(cache.generation("a", "INBOX"), folder);
        assert_ne!(cache.folders_generation("a"), folders);
        assert_eq!(cache.generation("b", "INBOX"), neighbour);
        assert!(!cache.set_folders("a", &[], folders).await);
    }

    #[tokio::test]
    async fn test_uncacheable_search_is_never_stored() {
        let cache = mail_cache();
        let filter = SearchFilter {
            seen: Some(false),
            ..SearchFilter::default()
        };
        let results = page(&["1"], "INBOX");

        let seen = cache.generation("a", "INBOX");
        assert!(!cache.set_search_results("a", "INBOX", &filter, 10, 0, &results, seen).await);
        assert!(cache.get_search_results("a", "INBOX", &filter, 10, 0).await.is_none());
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_search_keys_include_filter() {
        let cache = mail_cache();
        let invoices = SearchFilter {
            text: Some("invoice".into()),
            ..SearchFilter::default()
        };
        let receipts = SearchFilter {
            text: Some("receipt".into()),
            ..SearchFilter::default()
        };

        assert!(
            cache
                .set_search_results(
                    "a",
                    "INBOX",
                    &invoices,
                    10,
                    0,
                    &page(&["1"], "INBOX"),
                    cache.generation("a", "INBOX"),
                )
                .await
        );

        assert!(cache.get_search_results("a", "INBOX", &invoices, 10, 0).await.is_some());
        assert!(cache.get_search_results("a", "INBOX", &receipts, 10, 0).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_account_only_touches_that_account() {
        let cache = mail_cache();
        cache.set_folders("a", &[], cache.folders_generation("a")).await;
        cache.set_folders("ab", &[], cache.folders_generation("ab")).await;
        let inbox = cache.generation("a", "INBOX");
        cache
            .set_email_list("a", "INBOX", 10, 0, SortOrder::Desc, &page(&["1"], "INBOX"), inbox)
            .await;
        cache
            .set_email("a", "INBOX", "1", &email("1", "INBOX", Utc::now(), true), inbox)
            .await;

        assert_eq!(cache.clear_account("a").await, 3);
        assert!(cache.get_folders("a").await.is_none());
        assert!(cache.get_folders("ab").await.is_some());
    }
}
