//! Stream reconciliation and session orchestration for Easel.
//!
//! The pipeline, in data-flow order:
//!
//! 1. [`reconcile`] turns a provider's step-wise output into an ordered
//!    sequence of message parts, tolerating malformed and orphaned events.
//! 2. [`envelope`] interprets tool-result envelopes: one unified completion
//!    predicate over the three historical result shapes, artifact identity
//!    resolution, and fail-soft payload extraction.
//! 3. [`InvocationDeduplicator`] guarantees at-most-once artifact creation
//!    per logical tool invocation across repeated stream observations.
//! 4. [`Session`] wires the above to the admission-gated
//!    [`easel_store::Workspace`], debounces rapid partial-stream updates, and
//!    resets everything atomically on thread switch.

pub mod envelope;

mod debounce;
mod dedup;
mod reconcile;
mod session;

pub use debounce::Debouncer;
pub use dedup::InvocationDeduplicator;
pub use reconcile::{ReconciledMessage, reconcile};
pub use session::{IngestReport, Session, WorkspaceSignal};
