//! Artifact storage and resource admission for Easel.
//!
//! Three collaborating pieces, composed by [`Workspace`]:
//!
//! - [`ArtifactStore`] — an insertion-ordered, id-keyed collection of
//!   chart/table artifacts with a hard capacity ceiling.
//! - [`MemoryPressureMonitor`] — best-effort memory sampling through a tiered
//!   probe chain (precise cgroup measurement, legacy process counter,
//!   artifact-count heuristic) and pressure classification.
//! - [`AdmissionController`] — decides whether a new artifact may be created
//!   given current occupancy and the most recently cached memory sample, and
//!   recomputes a dynamically shrinking/growing capacity ceiling.
//!
//! Nothing here is fatal to the host: measurement failures degrade to lower
//! fidelity tiers, admission rejections are decisions rather than errors, and
//! eviction only ever happens on explicit caller request.

mod admission;
mod artifact_store;
mod memory;
mod workspace;

pub use admission::AdmissionController;
pub use artifact_store::{ArtifactStore, InsertError};
pub use memory::{EstimateParams, MemoryPressureMonitor, MemoryProbe};
#[cfg(unix)]
pub use memory::{CgroupV2Probe, ProcStatmProbe};
pub use workspace::{CreateError, Workspace};
