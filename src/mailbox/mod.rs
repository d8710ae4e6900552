//! Mailbox Module
//!
//! Data types and traits for the protocol collaborator, plus an in-process
//! implementation.

mod memory;
mod models;
mod service;

pub use memory::{CallCounts, InMemoryMailbox};
pub use models::{
    Attachment, Email, EmailPage, EmailSummary, FolderInfo, MailOperation, OperationKind,
    OperationResult, SearchFilter, SortOrder,
};
pub use service::{MailboxConnector, MailboxService, MailboxSession, SharedMailbox, Summarizer};
