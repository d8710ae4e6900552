//! TTL and cacheability policies for each resource class.

use chrono::{DateTime, Utc};

use crate::mailbox::SearchFilter;

const ONE_DAY_SECS: i64 = 24 * 60 * 60;
const ONE_WEEK_SECS: i64 = 7 * ONE_DAY_SECS;

// == TTL Policy ==
/// Lifetimes, in seconds, per resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    /// Folder listings churn with new mail and flag changes
    pub email_list: u64,
    /// Search result pages
    pub search: u64,
    /// Folder trees rarely change
    pub folder_list: u64,
    /// Single messages, computed per entry
    pub email: EmailTtlPolicy,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            email_list: 300,
            search: 180,
            folder_list: 3600,
            email: EmailTtlPolicy::default(),
        }
    }
}

// == Email TTL Policy ==
/// Age and read-state buckets for single message lifetimes.
///
/// Recent and unread mail is the most likely to be mutated, by this user or
/// by another client on the same mailbox, so it is kept for less time. Old
/// read mail is effectively immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTtlPolicy {
    /// Starting lifetime
    pub base: u64,
    /// Age under which a message counts as recent
    pub recent_age_secs: i64,
    /// Divisor applied to recent messages
    pub recent_divisor: u64,
    /// Divisor applied to unread messages
    pub unread_divisor: u64,
    /// Floor applied after the unread reduction
    pub min_ttl: u64,
    /// Age over which a message counts as old
    pub old_age_secs: i64,
    /// Multiplier applied to old messages
    pub old_multiplier: u64,
}

impl Default for EmailTtlPolicy {
    fn default() -> Self {
        Self {
            base: 1800,
            recent_age_secs: ONE_DAY_SECS,
            recent_divisor: 2,
            unread_divisor: 3,
            min_ttl: 120,
            old_age_secs: ONE_WEEK_SECS,
            old_multiplier: 4,
        }
    }
}

impl EmailTtlPolicy {
    /// Lifetime for a message dated `date` with read state `seen`.
    pub fn ttl_for(&self, date: DateTime<Utc>, seen: bool, now: DateTime<Utc>) -> u64 {
        let age = (now - date).num_seconds();
        let mut ttl = self.base;

        if age < self.recent_age_secs {
            ttl /= self.recent_divisor.max(1);
        }
        if !seen {
            ttl = (ttl / self.unread_divisor.max(1)).max(self.min_ttl);
        }
        if age > self.old_age_secs {
            ttl = ttl.saturating_mul(self.old_multiplier.max(1));
        }

        ttl.max(1)
    }
}

// == Search Cache Policy ==
/// Decides which searches are safe to cache.
///
/// Date-range searches are relative to a moving "now" and read-status
/// searches change membership on every read, so both are excluded unless
/// explicitly enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCachePolicy {
    pub cache_date_ranges: bool,
    pub cache_read_status: bool,
}

impl SearchCachePolicy {
    pub fn allows(&self, filter: &SearchFilter) -> bool {
        (self.cache_date_ranges || !filter.has_date_range())
            && (self.cache_read_status || !filter.has_read_status())
    }
}
