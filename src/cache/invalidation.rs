//! Invalidation after mutating mailbox operations.
//!
//! Invalidation is conservative: anything the operation may have changed is
//! dropped, even if it turns out to be untouched. Must run after the
//! mutation has completed upstream, never before.

use tracing::debug;

use crate::cache::facade::MailCache;
use crate::cache::keys::{account_pattern, folder_pattern, ResourceClass};
use crate::mailbox::MailOperation;

/// Entries removed by one invalidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub emails: usize,
    pub lists: usize,
    pub folders: usize,
}

impl InvalidationReport {
    pub fn total(&self) -> usize {
        self.emails + self.lists + self.folders
    }
}

impl MailCache {
    /// Scrubs the entries `operation` may have made stale.
    ///
    /// - the single-email entry of every affected uid
    /// - every list and search page of the source folder
    /// - the same for the destination folder of a move or copy
    /// - the folder list, for moves and deletes
    ///
    /// Generations are bumped before anything is removed, so fetches that
    /// started earlier can no longer write their results back.
    pub async fn invalidate(&self, account: &str, operation: &MailOperation) -> InvalidationReport {
        let destination = operation
            .destination
            .as_deref()
            .filter(|_| operation.kind.needs_destination());

        self.bump_folder(account, &operation.folder);
        if let Some(destination) = destination {
            self.bump_folder(account, destination);
        }
        if operation.kind.changes_folder_counts() {
            self.bump_folder_list(account);
        }

        let store = self.store();
        let mut report = InvalidationReport::default();

        for uid in &operation.uids {
            if store
                .delete(&Self::email_key(account, &operation.folder, uid))
                .await
            {
                report.emails += 1;
            }
        }

        report.lists += self.clear_folder_lists(account, &operation.folder).await;

        if let Some(destination) = destination {
            report.lists += self.clear_folder_lists(account, destination).await;
        }

        if operation.kind.changes_folder_counts() {
            report.folders += store
                .clear_by_pattern(&account_pattern(ResourceClass::FolderList, account))
                .await;
        }

        debug!(
            "Invalidated {} entries after {:?} on {}",
            report.total(),
            operation.kind,
            operation.folder
        );
        report
    }

    async fn clear_folder_lists(&self, account: &str, folder: &str) -> usize {
        let store = self.store();
        store
            .clear_by_pattern(&folder_pattern(ResourceClass::EmailList, account, folder))
            .await
            + store
                .clear_by_pattern(&folder_pattern(ResourceClass::SearchResults, account, folder))
                .await
    }
}
