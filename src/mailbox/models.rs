//! Mailbox data types exchanged with the protocol collaborator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;

// == Sort Order ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    /// Newest first
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Email Summary ==
/// Envelope and flag data shown in folder listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSummary {
    pub uid: String,
    pub folder: String,
    pub subject: String,
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    pub date: DateTime<Utc>,
    /// `\Seen` flag
    pub seen: bool,
    /// `\Flagged` flag
    pub flagged: bool,
    pub has_attachments: bool,
    /// RFC822 size in bytes
    pub size: u64,
    #[serde(default)]
    pub labels: Vec<String>,
}

// == Attachment ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

// == Email ==
/// A fully fetched message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    #[serde(flatten)]
    pub summary: EmailSummary,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

// == Email Page ==
/// One page of a listing or search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPage {
    pub items: Vec<EmailSummary>,
    pub total: u64,
    pub has_more: bool,
}

// == Folder Info ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub name: String,
    pub delimiter: Option<String>,
    pub total: u32,
    pub unread: u32,
    /// RFC 6154 attribute such as `\Sent` or `\Trash`
    pub special_use: Option<String>,
}

// == Search Filter ==
/// Recognized search criteria.
///
/// Every field is optional; set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Free text matched against subject and body
    pub text: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    /// Inclusive lower date bound
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper date bound
    pub before: Option<DateTime<Utc>>,
    pub seen: Option<bool>,
    pub flagged: Option<bool>,
    pub has_attachments: Option<bool>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
}

impl SearchFilter {
    pub fn has_date_range(&self) -> bool {
        self.since.is_some() || self.before.is_some()
    }

    pub fn has_read_status(&self) -> bool {
        self.seen.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.key_params().is_empty()
    }

    /// The set fields as `(name, value)` pairs for key derivation.
    pub fn key_params(&self) -> Vec<(&'static str, String)> {
        // Destructured so a new field cannot be silently left out of keys
        let SearchFilter {
            text,
            from,
            to,
            subject,
            since,
            before,
            seen,
            flagged,
            has_attachments,
            min_size,
            max_size,
        } = self;

        let mut params = Vec::new();
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                params.push((name, value));
            }
        };

        push("q", text.clone());
        push("from", from.clone());
        push("to", to.clone());
        push("subject", subject.clone());
        push("since", since.map(|d| d.to_rfc3339()));
        push("before", before.map(|d| d.to_rfc3339()));
        push("seen", seen.map(|b| b.to_string()));
        push("flagged", flagged.map(|b| b.to_string()));
        push("attachments", has_attachments.map(|b| b.to_string()));
        push("min_size", min_size.map(|n| n.to_string()));
        push("max_size", max_size.map(|n| n.to_string()));

        params
    }

    /// Evaluates the filter against a listing entry. Free text is matched
    /// against the subject only, since summaries carry no body.
    pub fn matches(&self, email: &EmailSummary) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }

        contains(&email.subject, &self.text)
            && contains(&email.from, &self.from)
            && contains(&email.to.join(", "), &self.to)
            && contains(&email.subject, &self.subject)
            && self.since.map_or(true, |d| email.date >= d)
            && self.before.map_or(true, |d| email.date < d)
            && self.seen.map_or(true, |s| email.seen == s)
            && self.flagged.map_or(true, |f| email.flagged == f)
            && self.has_attachments.map_or(true, |a| email.has_attachments == a)
            && self.min_size.map_or(true, |n| email.size >= n)
            && self.max_size.map_or(true, |n| email.size <= n)
    }
}

// == Mail Operation ==
/// Mutating operations the collaborator supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    MarkRead,
    MarkUnread,
    Star,
    Unstar,
    Delete,
    Move,
    Copy,
    AddLabel,
    RemoveLabel,
}

impl OperationKind {
    /// Operations that change folder membership counts.
    pub fn changes_folder_counts(&self) -> bool {
        matches!(self, OperationKind::Move | OperationKind::Delete)
    }

    pub fn needs_destination(&self) -> bool {
        matches!(self, OperationKind::Move | OperationKind::Copy)
    }

    pub fn needs_label(&self) -> bool {
        matches!(self, OperationKind::AddLabel | OperationKind::RemoveLabel)
    }
}

/// A mutation on a set of messages in one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub folder: String,
    pub uids: Vec<String>,
    /// Target folder for `move` and `copy`
    #[serde(default)]
    pub destination: Option<String>,
    /// Label for `add_label` and `remove_label`
    #[serde(default)]
    pub label: Option<String>,
}

impl MailOperation {
    pub fn new(kind: OperationKind, folder: impl Into<String>, uids: &[&str]) -> Self {
        Self {
            kind,
            folder: folder.into(),
            uids: uids.iter().map(|uid| uid.to_string()).collect(),
            destination: None,
            label: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Checks required arguments before anything is sent upstream.
    pub fn validate(&self) -> Result<(), MailboxError> {
        if self.folder.trim().is_empty() {
            return Err(MailboxError::InvalidRequest("folder is required".into()));
        }
        if self.uids.is_empty() {
            return Err(MailboxError::InvalidRequest("at least one uid is required".into()));
        }
        if self.kind.needs_destination()
            && self.destination.as_deref().map_or(true, |d| d.trim().is_empty())
        {
            return Err(MailboxError::InvalidRequest(
                "destination folder is required".into(),
            ));
        }
        if self.kind.needs_label() && self.label.as_deref().map_or(true, |l| l.trim().is_empty()) {
            return Err(MailboxError::InvalidRequest("label is required".into()));
        }
        Ok(())
    }
}

/// Outcome reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub processed: usize,
}
