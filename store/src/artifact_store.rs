//! Insertion-ordered, id-keyed artifact collection.
//!
//! The store itself is deliberately dumb: it enforces id uniqueness and
//! insertion order, nothing else. Admission is decided *before* insertion by
//! the controller (via [`crate::Workspace`]), never corrected after.

use std::time::SystemTime;

use thiserror::Error;

use easel_types::{Artifact, ArtifactPatch};

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("artifact id {0} already exists in the workspace")]
    DuplicateId(String),
}

/// Ordered, keyed collection of artifacts.
///
/// Backed by a `Vec`; the capacity ceiling is tens of entries, so linear id
/// lookup is simpler and faster than an index map.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: Vec<Artifact>,
}

impl ArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new artifact at the tail.
    ///
    /// Fails if the id is already present; ids are unique for the store's
    /// entire lifetime.
    pub fn insert(&mut self, artifact: Artifact) -> Result<(), InsertError> {
        if self.get(&artifact.id).is_some() {
            return Err(InsertError::DuplicateId(artifact.id));
        }
        self.artifacts.push(artifact);
        Ok(())
    }

    /// Apply a partial update in place.
    ///
    /// Returns `false` (a no-op, never an auto-create) when the id does not
    /// exist.
    pub fn update(&mut self, id: &str, patch: ArtifactPatch, timestamp: SystemTime) -> bool {
        match self.artifacts.iter_mut().find(|a| a.id == id) {
            Some(artifact) => {
                artifact.apply(patch, timestamp);
                true
            }
            None => false,
        }
    }

    /// Remove an artifact by id. Returns `false` when absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.artifacts.len();
        self.artifacts.retain(|a| a.id != id);
        self.artifacts.len() != before
    }

    /// Remove the `n` oldest artifacts by `created_at`, returning them so the
    /// caller can notify the user what was evicted.
    pub fn remove_oldest(&mut self, n: usize) -> Vec<Artifact> {
        if n == 0 || self.artifacts.is_empty() {
            return Vec::new();
        }
        let mut ids: Vec<(SystemTime, String)> = self
            .artifacts
            .iter()
            .map(|a| (a.created_at, a.id.clone()))
            .collect();
        ids.sort_by_key(|(created_at, _)| *created_at);
        ids.truncate(n);

        let mut removed = Vec::with_capacity(ids.len());
        for (_, id) in ids {
            if let Some(pos) = self.artifacts.iter().position(|a| a.id == id) {
                removed.push(self.artifacts.remove(pos));
            }
        }
        removed
    }

    /// Empty the store.
    ///
    /// Callers pair this with a dedup-set reset; keys orphaned by a clear are
    /// harmless once the store is empty, but the pairing keeps session
    /// teardown coherent.
    pub fn clear(&mut self) {
        self.artifacts.clear();
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    /// Artifacts in insertion order.
    #[must_use]
    pub fn list(&self) -> &[Artifact] {
        &self.artifacts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Sum of per-artifact payload estimates, for footprint projection.
    #[must_use]
    pub fn estimated_bytes(&self) -> u64 {
        self.artifacts
            .iter()
            .map(|a| a.metadata.memory_estimate_bytes)
            .sum()
    }
}
