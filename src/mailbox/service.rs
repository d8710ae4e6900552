//! Collaborator boundaries: the protocol session and the summary generator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MailboxError;
use crate::mailbox::models::{
    Email, EmailPage, FolderInfo, MailOperation, OperationResult, SearchFilter, SortOrder,
};

/// The component owning the live mailbox session.
///
/// Implementations talk to IMAP (or anything else); this crate only ever
/// calls through this trait.
#[async_trait]
pub trait MailboxService: Send + Sync {
    async fn list_emails(
        &self,
        folder: &str,
        limit: usize,
        offset: usize,
        sort: SortOrder,
    ) -> Result<EmailPage, MailboxError>;

    async fn get_email(&self, uid: &str, folder: &str) -> Result<Email, MailboxError>;

    async fn search_emails(
        &self,
        filter: &SearchFilter,
        folder: &str,
        limit: usize,
        offset: usize,
    ) -> Result<EmailPage, MailboxError>;

    async fn list_folders(&self) -> Result<Vec<FolderInfo>, MailboxError>;

    async fn perform_operation(
        &self,
        operation: &MailOperation,
    ) -> Result<OperationResult, MailboxError>;
}

/// Produces a short summary of a message.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, email: &Email) -> Result<String, MailboxError>;
}

/// A checked-out protocol session.
pub type MailboxSession = Arc<dyn MailboxService>;

/// Opens and closes protocol sessions on behalf of the connection pool.
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn open_session(&self) -> Result<MailboxSession, MailboxError>;

    async fn close_session(&self, _session: MailboxSession) {}
}

// == Shared Mailbox ==
/// Connector for clients that can serve any number of sessions from one
/// instance, such as [`crate::mailbox::InMemoryMailbox`].
pub struct SharedMailbox {
    mailbox: MailboxSession,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl SharedMailbox {
    pub fn new(mailbox: MailboxSession) -> Self {
        Self {
            mailbox,
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Sessions opened and closed so far.
    pub fn session_counts(&self) -> (usize, usize) {
        (
            self.opened.load(Ordering::SeqCst),
            self.closed.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl MailboxConnector for SharedMailbox {
    async fn open_session(&self) -> Result<MailboxSession, MailboxError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.mailbox))
    }

    async fn close_session(&self, _session: MailboxSession) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
