//! Prefetch candidate scoring.
//!
//! Picks the messages a reader is most likely to open next from the ones
//! around the current message, so their bodies can be warmed ahead of time.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::mailbox::EmailSummary;

/// Access counts above this add nothing more to the score.
const MAX_COUNTED_ACCESSES: u32 = 5;

// == Weights ==
/// Contribution of each signal to a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefetchWeights {
    /// Per recorded access, up to five
    pub frequency: f64,
    pub unread: f64,
    pub starred: f64,
    pub attachments: f64,
    pub within_hour: f64,
    pub within_day: f64,
    pub within_week: f64,
}

impl Default for PrefetchWeights {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            unread: 3.0,
            starred: 2.0,
            attachments: 1.0,
            within_hour: 3.0,
            within_day: 2.0,
            within_week: 1.0,
        }
    }
}

// == Access Tracker ==
/// Counts how often each message has been opened.
///
/// When the table reaches `capacity`, every count is halved and zeroes are
/// dropped, so old interest fades instead of growing without bound.
#[derive(Debug)]
pub struct AccessTracker {
    counts: Mutex<HashMap<(String, String), u32>>,
    capacity: usize,
}

impl Default for AccessTracker {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AccessTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn counts(&self) -> MutexGuard<'_, HashMap<(String, String), u32>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, folder: &str, uid: &str) {
        let mut counts = self.counts();
        let key = (folder.to_string(), uid.to_string());
        if !counts.contains_key(&key) && counts.len() >= self.capacity {
            counts.retain(|_, count| {
                *count /= 2;
                *count > 0
            });
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    pub fn count(&self, folder: &str, uid: &str) -> u32 {
        self.counts()
            .get(&(folder.to_string(), uid.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts().is_empty()
    }
}

// == Scorer ==
#[derive(Debug, Clone, Default)]
pub struct PrefetchScorer {
    weights: PrefetchWeights,
}

impl PrefetchScorer {
    pub fn new(weights: PrefetchWeights) -> Self {
        Self { weights }
    }

    /// Weighted sum of the candidate's signals.
    pub fn score(&self, candidate: &EmailSummary, access_count: u32, now: DateTime<Utc>) -> f64 {
        let w = &self.weights;
        let mut score = f64::from(access_count.min(MAX_COUNTED_ACCESSES)) * w.frequency;

        if !candidate.seen {
            score += w.unread;
        }
        if candidate.flagged {
            score += w.starred;
        }
        if candidate.has_attachments {
            score += w.attachments;
        }

        let age = now.signed_duration_since(candidate.date);
        if age < Duration::hours(1) {
            score += w.within_hour;
        } else if age < Duration::days(1) {
            score += w.within_day;
        } else if age < Duration::weeks(1) {
            score += w.within_week;
        }

        score
    }

    /// Returns up to `top_k` candidates, best first, excluding
    /// `current_uid`.
    ///
    /// Equal scores keep their input order, so the result is deterministic.
    pub fn top_candidates<'a>(
        &self,
        current_uid: &str,
        candidates: &'a [EmailSummary],
        tracker: &AccessTracker,
        now: DateTime<Utc>,
        top_k: usize,
    ) -> Vec<&'a EmailSummary> {
        let mut scored: Vec<(f64, &EmailSummary)> = candidates
            .iter()
            .filter(|c| c.uid != current_uid)
            .map(|c| (self.score(c, tracker.count(&c.folder, &c.uid), now), c))
            .collect();

        // Stable sort
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(top_k).map(|(_, c)| c).collect()
    }
}
