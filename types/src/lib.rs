//! Core domain types for Easel.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod artifact;
mod memory;
mod part;

pub use artifact::{Artifact, ArtifactClass, ArtifactMetadata, ArtifactPatch, ArtifactStatus};
pub use memory::{MemorySample, MemorySource, PressureLevel};
pub use part::{InvocationState, MessagePart, StreamOutcome, StreamStep, ToolCall, ToolInvocation, ToolResult};

use serde::{Deserialize, Serialize};

// ============================================================================
// Deduplication Key
// ============================================================================

/// Composite identifier preventing duplicate artifact creation for one
/// logical tool completion.
///
/// Once recorded for a session, a key is permanent: the same tool call must
/// never spawn two artifacts even if re-observed minutes later (e.g. on
/// history replay after a reconnect). There is no TTL and no per-key removal;
/// the whole set is cleared only on session reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupKey(String);

impl DedupKey {
    #[must_use]
    pub fn new(message_id: &str, artifact_id: &str) -> Self {
        Self(format!("{message_id}:{artifact_id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Admission Decision
// ============================================================================

/// Outcome of an admission check for a prospective artifact.
///
/// Rejection is a normal decision outcome, not an error: `allowed = false`
/// carries a human-readable `reason`. An allowed decision may still carry a
/// `warning` (memory pressure elevated, workspace nearly full) and a
/// `recommendation` for freeing space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recommendation: Option<String>,
}

impl AdmissionDecision {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            warning: None,
            recommendation: None,
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            warning: None,
            recommendation: None,
        }
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    #[must_use]
    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

// ============================================================================
// Configuration Surface
// ============================================================================

/// Host-overridable limits for the artifact workspace.
///
/// All fields have documented defaults; host applications override them once
/// at initialization and the values stay fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceLimits {
    /// Hard maximum number of artifacts (static ceiling for the dynamic one).
    pub max_artifacts: usize,
    /// Occupancy at which admission decisions start carrying a warning.
    pub artifact_warning_count: usize,
    /// Memory usage percentage classified as `Warning`.
    pub memory_warning_percent: f64,
    /// Memory usage percentage classified as `Critical`.
    pub memory_critical_percent: f64,
    /// Estimated per-artifact memory footprint in megabytes.
    pub per_artifact_estimate_mb: f64,
}

impl Default for WorkspaceLimits {
    fn default() -> Self {
        Self {
            max_artifacts: 25,
            artifact_warning_count: 20,
            memory_warning_percent: 75.0,
            memory_critical_percent: 90.0,
            per_artifact_estimate_mb: 5.0,
        }
    }
}
