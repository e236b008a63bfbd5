//! The composed artifact workspace: store + monitor + admission.
//!
//! This is the façade session code talks to. It enforces the one ordering
//! rule the pieces cannot enforce alone: admission is checked *before* every
//! insertion, and the memory sample and dynamic ceiling are refreshed after
//! every mutation.

use std::time::SystemTime;

use thiserror::Error;

use easel_types::{
    AdmissionDecision, Artifact, ArtifactClass, ArtifactPatch, MemorySample, PressureLevel,
    WorkspaceLimits,
};

use crate::admission::AdmissionController;
use crate::artifact_store::{ArtifactStore, InsertError};
use crate::memory::MemoryPressureMonitor;

#[derive(Debug, Error)]
pub enum CreateError {
    /// Admission disallowed the creation. Not a fault; the decision carries a
    /// human-readable reason for the user.
    #[error("artifact creation rejected: {}", .0.reason.as_deref().unwrap_or("admission denied"))]
    Rejected(AdmissionDecision),
    #[error(transparent)]
    Duplicate(#[from] InsertError),
}

/// Bounded, admission-gated artifact workspace for one chat session.
#[derive(Debug)]
pub struct Workspace {
    store: ArtifactStore,
    monitor: MemoryPressureMonitor,
    controller: AdmissionController,
}

impl Workspace {
    #[must_use]
    pub fn new(limits: WorkspaceLimits) -> Self {
        Self::with_monitor(MemoryPressureMonitor::new(&limits), limits)
    }

    /// Workspace with an injected monitor (tests supply fake probes).
    #[must_use]
    pub fn with_monitor(monitor: MemoryPressureMonitor, limits: WorkspaceLimits) -> Self {
        Self {
            store: ArtifactStore::new(),
            monitor,
            controller: AdmissionController::new(limits),
        }
    }

    /// Would a new artifact of this shape be admitted right now?
    ///
    /// Reads the cached memory sample only; never blocks on measurement.
    #[must_use]
    pub fn can_admit(&self, class: ArtifactClass, data_points: usize) -> AdmissionDecision {
        self.controller.can_admit(
            self.store.len(),
            self.monitor.cached_pressure(),
            self.monitor.cached(),
            class,
            data_points,
        )
    }

    /// Create an artifact, checking admission before insertion.
    ///
    /// Returns the (possibly warning-bearing) decision on success so callers
    /// can surface warnings to the user.
    pub fn create(&mut self, artifact: Artifact) -> Result<AdmissionDecision, CreateError> {
        let decision = self.can_admit(
            artifact.class,
            artifact.metadata.data_points.unwrap_or_default(),
        );
        if !decision.allowed {
            return Err(CreateError::Rejected(decision));
        }
        self.store.insert(artifact)?;
        self.refresh_memory();
        Ok(decision)
    }

    /// Apply a partial update. No-op returning `false` when the id is absent.
    pub fn update(&mut self, id: &str, patch: ArtifactPatch, timestamp: SystemTime) -> bool {
        self.store.update(id, patch, timestamp)
    }

    /// Remove one artifact by id.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.store.remove(id);
        if removed {
            self.refresh_memory();
        }
        removed
    }

    /// Manual eviction entry point: remove the `n` oldest artifacts.
    ///
    /// The system never evicts on its own; callers invoke this from an
    /// explicit "free up space" action when admission reports rejection.
    pub fn free_oldest(&mut self, n: usize) -> Vec<Artifact> {
        let removed = self.store.remove_oldest(n);
        if !removed.is_empty() {
            self.refresh_memory();
        }
        removed
    }

    /// Empty the workspace and drop the cached sample (session reset).
    pub fn clear(&mut self) {
        self.store.clear();
        self.monitor.clear_cache();
        self.controller.recompute_ceiling(0, None);
    }

    /// Re-run the measurement tier chain and recompute the dynamic ceiling.
    ///
    /// Runs automatically after mutations; hosts may also call it on a timer
    /// so pressure-level changes shrink or grow the ceiling between events.
    pub fn refresh_memory(&mut self) -> MemorySample {
        let sample = self.monitor.refresh(self.store.len());
        self.controller.recompute_ceiling(self.store.len(), Some(&sample));
        sample
    }

    #[must_use]
    pub fn pressure(&self) -> PressureLevel {
        self.monitor.cached_pressure()
    }

    #[must_use]
    pub fn cached_sample(&self) -> Option<&MemorySample> {
        self.monitor.cached()
    }

    #[must_use]
    pub fn effective_max(&self) -> usize {
        self.controller.effective_max()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.store.get(id)
    }

    /// Artifacts in insertion order.
    #[must_use]
    pub fn list(&self) -> &[Artifact] {
        self.store.list()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProbe;
    use easel_types::MemorySource;
    use serde_json::json;
    use std::time::Duration;

    /// Probe reporting a fixed low usage so admission is driven by occupancy.
    struct QuietProbe;

    impl MemoryProbe for QuietProbe {
        fn read(&self) -> Option<MemorySample> {
            Some(MemorySample {
                used_bytes: 64 * 1024 * 1024,
                total_bytes: 64 * 1024 * 1024,
                limit_bytes: 2048 * 1024 * 1024,
                timestamp: SystemTime::UNIX_EPOCH,
                source: MemorySource::Precise,
            })
        }

        fn name(&self) -> &'static str {
            "quiet"
        }
    }

    fn quiet_workspace() -> Workspace {
        let limits = WorkspaceLimits::default();
        let monitor = MemoryPressureMonitor::with_probes(vec![Box::new(QuietProbe)], &limits);
        Workspace::with_monitor(monitor, limits)
    }

    fn artifact(id: &str, seq: u64) -> Artifact {
        Artifact::completed(
            id,
            ArtifactClass::Chart,
            format!("chart {id}"),
            json!([1, 2, 3]),
            SystemTime::UNIX_EPOCH + Duration::from_secs(seq),
        )
    }

    #[test]
    fn fills_to_ceiling_then_rejects_with_limit_reason() {
        let mut ws = quiet_workspace();
        assert_eq!(ws.effective_max(), 25);

        for i in 0..24 {
            let decision = ws.create(artifact(&format!("a{i}"), i)).unwrap();
            assert!(decision.allowed);
            if i >= 20 {
                // Occupancy was >= 20 at admission time for creations 21+.
                assert!(decision.warning.is_some(), "creation {i} should warn");
            }
        }
        assert_eq!(ws.len(), 24);

        // 25th creation still succeeds.
        ws.create(artifact("a24", 24)).unwrap();
        assert_eq!(ws.len(), 25);

        // 26th is rejected with a reason naming the limit.
        let err = ws.create(artifact("a25", 25)).unwrap_err();
        match err {
            CreateError::Rejected(decision) => {
                assert!(decision.reason.unwrap().contains("limit"));
            }
            CreateError::Duplicate(_) => panic!("expected admission rejection"),
        }
        assert_eq!(ws.len(), 25);
    }

    #[test]
    fn occupancy_never_exceeds_effective_max() {
        let mut ws = quiet_workspace();
        for i in 0..40 {
            let _ = ws.create(artifact(&format!("a{i}"), i));
            assert!(ws.len() <= ws.effective_max());
        }
    }

    #[test]
    fn freeing_oldest_reopens_admission() {
        let mut ws = quiet_workspace();
        for i in 0..25 {
            ws.create(artifact(&format!("a{i}"), i)).unwrap();
        }
        assert!(!ws.can_admit(ArtifactClass::Chart, 1).allowed);

        let removed = ws.free_oldest(3);
        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0].id, "a0");
        assert!(ws.can_admit(ArtifactClass::Chart, 1).allowed);
    }

    #[test]
    fn duplicate_id_is_a_distinct_error() {
        let mut ws = quiet_workspace();
        ws.create(artifact("same", 0)).unwrap();
        let err = ws.create(artifact("same", 1)).unwrap_err();
        assert!(matches!(err, CreateError::Duplicate(_)));
        assert_eq!(ws.len(), 1);
    }

    #[test]
    fn clear_resets_store_cache_and_ceiling() {
        let mut ws = quiet_workspace();
        for i in 0..5 {
            ws.create(artifact(&format!("a{i}"), i)).unwrap();
        }
        assert!(ws.cached_sample().is_some());

        ws.clear();
        assert!(ws.is_empty());
        assert!(ws.cached_sample().is_none());
        assert_eq!(ws.effective_max(), 25);
        assert_eq!(ws.pressure(), PressureLevel::Normal);
    }

    #[test]
    fn update_is_noop_for_unknown_id() {
        let mut ws = quiet_workspace();
        assert!(!ws.update("ghost", ArtifactPatch::default(), SystemTime::UNIX_EPOCH));
    }
}
