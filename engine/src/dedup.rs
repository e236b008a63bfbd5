//! At-most-once artifact creation per logical tool invocation.
//!
//! Backed by a monotonic set of [`DedupKey`]s scoped to one chat session.
//! Keys are never removed individually; the whole set is cleared on session
//! end, thread switch, or explicit teardown. Removing an artifact does NOT
//! remove its key: the same completion re-observed later (duplicate stream
//! delivery, history replay, a second observer) must stay suppressed.

use std::collections::HashSet;

use easel_types::DedupKey;

#[derive(Debug, Default)]
pub struct InvocationDeduplicator {
    seen: HashSet<DedupKey>,
}

impl InvocationDeduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Has this (message, artifact) completion not been processed yet?
    #[must_use]
    pub fn should_process(&self, message_id: &str, artifact_id: &str) -> bool {
        !self.seen.contains(&DedupKey::new(message_id, artifact_id))
    }

    /// Record a completion as processed. Permanent for the session.
    pub fn mark_processed(&mut self, message_id: &str, artifact_id: &str) {
        self.seen.insert(DedupKey::new(message_id, artifact_id));
    }

    /// Clear the full set (session end / thread switch / teardown).
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
