//! In-process mailbox.
//!
//! A [`MailboxService`] backed by plain collections. It counts calls per
//! operation and can simulate latency and transient connection failures,
//! which makes it the collaborator used by tests and by the development
//! server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::error::MailboxError;
use crate::mailbox::models::{
    Email, EmailPage, EmailSummary, FolderInfo, MailOperation, OperationKind, OperationResult,
    SearchFilter, SortOrder,
};
use crate::mailbox::service::MailboxService;

#[derive(Debug, Default)]
struct Folder {
    special_use: Option<String>,
    emails: Vec<Email>,
}

#[derive(Debug, Default)]
struct State {
    folders: BTreeMap<String, Folder>,
    next_uid: u64,
}

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_emails: usize,
    pub get_email: usize,
    pub search_emails: usize,
    pub list_folders: usize,
    pub perform_operation: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryMailbox {
    state: Mutex<State>,
    latency: Option<Duration>,
    failures_left: AtomicUsize,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    search_calls: AtomicUsize,
    folder_calls: AtomicUsize,
    operation_calls: AtomicUsize,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox with a handful of standard folders and messages.
    pub fn sample() -> Self {
        let mailbox = Self::new()
            .with_folder("INBOX", None)
            .with_folder("Sent", Some("\\Sent"))
            .with_folder("Archive", Some("\\Archive"))
            .with_folder("Trash", Some("\\Trash"));

        let now = Utc::now();
        let seeds = [
            ("Welcome aboard", "team@example.com", 30 * 24, true, false, false),
            ("Quarterly invoice", "billing@example.com", 3 * 24, true, true, true),
            ("Lunch tomorrow?", "sam@example.com", 5, false, false, false),
            ("Build failed on main", "ci@example.com", 1, false, true, false),
        ];
        for (subject, from, hours_ago, seen, flagged, has_attachments) in seeds {
            mailbox.add_email(
                "INBOX",
                subject,
                from,
                now - ChronoDuration::hours(hours_ago),
                seen,
                flagged,
                has_attachments,
            );
        }

        mailbox
    }

    /// Adds an empty folder.
    pub fn with_folder(self, name: &str, special_use: Option<&str>) -> Self {
        self.lock().folders.insert(
            name.to_string(),
            Folder {
                special_use: special_use.map(str::to_string),
                emails: Vec::new(),
            },
        );
        self
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next `count` calls fail with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Appends a message to `folder` (created if missing). Returns its uid.
    #[allow(clippy::too_many_arguments)]
    pub fn add_email(
        &self,
        folder: &str,
        subject: &str,
        from: &str,
        date: chrono::DateTime<Utc>,
        seen: bool,
        flagged: bool,
        has_attachments: bool,
    ) -> String {
        let mut state = self.lock();
        state.next_uid += 1;
        let uid = state.next_uid.to_string();

        let email = Email {
            summary: EmailSummary {
                uid: uid.clone(),
                folder: folder.to_string(),
                subject: subject.to_string(),
                from: from.to_string(),
                to: vec!["me@example.com".to_string()],
                date,
                seen,
                flagged,
                has_attachments,
                size: 1024 + subject.len() as u64 * 16,
                labels: Vec::new(),
            },
            text_body: Some(format!("{subject}\n\n-- \n{from}")),
            html_body: None,
            attachments: Vec::new(),
        };

        state
            .folders
            .entry(folder.to_string())
            .or_default()
            .emails
            .push(email);
        uid
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_emails: self.list_calls.load(Ordering::SeqCst),
            get_email: self.get_calls.load(Ordering::SeqCst),
            search_emails: self.search_calls.load(Ordering::SeqCst),
            list_folders: self.folder_calls.load(Ordering::SeqCst),
            perform_operation: self.operation_calls.load(Ordering::SeqCst),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call, applies latency and injected failures.
    async fn enter(&self, counter: &AtomicUsize) -> Result<(), MailboxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(MailboxError::Connection("simulated connection reset".into()));
        }
        Ok(())
    }

    fn page(mut items: Vec<EmailSummary>, limit: usize, offset: usize, sort: SortOrder) -> EmailPage {
        items.sort_by(|a, b| match sort {
            SortOrder::Asc => a.date.cmp(&b.date),
            SortOrder::Desc => b.date.cmp(&a.date),
        });
        let total = items.len();
        let items: Vec<EmailSummary> = items.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + items.len() < total;

        EmailPage {
            items,
            total: total as u64,
            has_more,
        }
    }

    fn apply(state: &mut State, operation: &MailOperation) -> Result<usize, MailboxError> {
        if operation.kind.needs_destination() {
            let destination = operation.destination.as_deref().unwrap_or_default();
            if !state.folders.contains_key(destination) {
                return Err(MailboxError::NotFound(format!("folder {destination}")));
            }
        }

        let source = state
            .folders
            .get_mut(&operation.folder)
            .ok_or_else(|| MailboxError::NotFound(format!("folder {}", operation.folder)))?;

        let mut processed = 0;
        let mut moved = Vec::new();

        for uid in &operation.uids {
            let Some(index) = source.emails.iter().position(|e| &e.summary.uid == uid) else {
                continue;
            };
            processed += 1;

            let summary = &mut source.emails[index].summary;
            match operation.kind {
                OperationKind::MarkRead => summary.seen = true,
                OperationKind::MarkUnread => summary.seen = false,
                OperationKind::Star => summary.flagged = true,
                OperationKind::Unstar => summary.flagged = false,
                OperationKind::AddLabel => {
                    let label = operation.label.clone().unwrap_or_default();
                    if !summary.labels.contains(&label) {
                        summary.labels.push(label);
                    }
                }
                OperationKind::RemoveLabel => {
                    let label = operation.label.as_deref().unwrap_or_default();
                    summary.labels.retain(|l| l != label);
                }
                OperationKind::Delete => {
                    source.emails.remove(index);
                }
                OperationKind::Move => moved.push(source.emails.remove(index)),
                OperationKind::Copy => moved.push(source.emails[index].clone()),
            }
        }

        if let Some(destination) = operation.destination.as_deref() {
            for mut email in moved {
                state.next_uid += 1;
                email.summary.uid = state.next_uid.to_string();
                email.summary.folder = destination.to_string();
                if let Some(target) = state.folders.get_mut(destination) {
                    target.emails.push(email);
                }
            }
        }

        Ok(processed)
    }
}

#[async_trait]
impl MailboxService for InMemoryMailbox {
    async fn list_emails(
        &self,
        folder: &str,
        limit: usize,
        offset: usize,
        sort: SortOrder,
    ) -> Result<EmailPage, MailboxError> {
        self.enter(&self.list_calls).await?;
        let state = self.lock();
        let folder = state
            .folders
            .get(folder)
            .ok_or_else(|| MailboxError::NotFound(format!("folder {folder}")))?;
        let items = folder.emails.iter().map(|e| e.summary.clone()).collect();
        Ok(Self::page(items, limit, offset, sort))
    }

    async fn get_email(&self, uid: &str, folder: &str) -> Result<Email, MailboxError> {
        self.enter(&self.get_calls).await?;
        let state = self.lock();
        state
            .folders
            .get(folder)
            .and_then(|f| f.emails.iter().find(|e| e.summary.uid == uid))
            .cloned()
            .ok_or_else(|| MailboxError::NotFound(format!("email {uid} in {folder}")))
    }

    async fn search_emails(
        &self,
        filter: &SearchFilter,
        folder: &str,
        limit: usize,
        offset: usize,
    ) -> Result<EmailPage, MailboxError> {
        self.enter(&self.search_calls).await?;
        let state = self.lock();
        let folder = state
            .folders
            .get(folder)
            .ok_or_else(|| MailboxError::NotFound(format!("folder {folder}")))?;
        let items = folder
            .emails
            .iter()
            .filter(|e| filter.matches(&e.summary))
            .map(|e| e.summary.clone())
            .collect();
        Ok(Self::page(items, limit, offset, SortOrder::Desc))
    }

    async fn list_folders(&self) -> Result<Vec<FolderInfo>, MailboxError> {
        self.enter(&self.folder_calls).await?;
        let state = self.lock();
        Ok(state
            .folders
            .iter()
            .map(|(name, folder)| FolderInfo {
                name: name.clone(),
                delimiter: Some("/".to_string()),
                total: folder.emails.len() as u32,
                unread: folder.emails.iter().filter(|e| !e.summary.seen).count() as u32,
                special_use: folder.special_use.clone(),
            })
            .collect())
    }

    async fn perform_operation(
        &self,
        operation: &MailOperation,
    ) -> Result<OperationResult, MailboxError> {
        self.enter(&self.operation_calls).await?;
        let processed = Self::apply(&mut self.lock(), operation)?;
        Ok(OperationResult {
            success: processed == operation.uids.len(),
            processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let mailbox = InMemoryMailbox::sample();

        let page = mailbox.list_emails("INBOX", 2, 0, SortOrder::Desc).await.unwrap();

        assert_eq!(page.total, 4);
        assert!(page.has_more);
        assert_eq!(page.items[0].subject, "Build failed on main");

        let last = mailbox.list_emails("INBOX", 2, 2, SortOrder::Desc).await.unwrap();
        assert!(!last.has_more);
        assert_eq!(last.items[1].subject, "Welcome aboard");
    }

    #[tokio::test]
    async fn test_missing_folder_is_not_found() {
        let mailbox = InMemoryMailbox::sample();
        let err = mailbox
            .list_emails("Nope", 10, 0, SortOrder::Desc)
            .await
            .unwrap_err();
        assert!(matches!(err, MailboxError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_read_and_counts() {
        let mailbox = InMemoryMailbox::sample();
        let before = mailbox.list_folders().await.unwrap();
        let inbox = before.iter().find(|f| f.name == "INBOX").unwrap();
        assert_eq!(inbox.unread, 2);

        let result = mailbox
            .perform_operation(&MailOperation::new(OperationKind::MarkRead, "INBOX", &["3", "4"]))
            .await
            .unwrap();
        assert_eq!(result.processed, 2);
        assert!(result.success);

        let after = mailbox.list_folders().await.unwrap();
        assert_eq!(after.iter().find(|f| f.name == "INBOX").unwrap().unread, 0);
        assert_eq!(mailbox.calls().list_folders, 2);
    }

    #[tokio::test]
    async fn test_move_assigns_new_uid() {
        let mailbox = InMemoryMailbox::sample();
        let op = MailOperation::new(OperationKind::Move, "INBOX", &["1"]).with_destination("Archive");

        mailbox.perform_operation(&op).await.unwrap();

        let archive = mailbox.list_emails("Archive", 10, 0, SortOrder::Desc).await.unwrap();
        assert_eq!(archive.total, 1);
        assert_eq!(archive.items[0].folder, "Archive");
        assert_ne!(archive.items[0].uid, "1");
        assert!(mailbox.get_email("1", "INBOX").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_uid_is_partial_success() {
        let mailbox = InMemoryMailbox::sample();
        let result = mailbox
            .perform_operation(&MailOperation::new(OperationKind::Star, "INBOX", &["1", "99"]))
            .await
            .unwrap();
        assert_eq!(result.processed, 1);
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mailbox = InMemoryMailbox::sample();
        mailbox.fail_next(1);

        assert!(matches!(
            mailbox.list_folders().await,
            Err(MailboxError::Connection(_))
        ));
        assert!(mailbox.list_folders().await.is_ok());
    }
}
