//! Session orchestration: completed tool results in, admitted artifacts out.
//!
//! A [`Session`] owns every piece of per-session mutable state — the
//! admission-gated workspace, the dedup key set, the debounce timer, and the
//! pending-ingest queue — so that a thread switch can reset all of them in
//! one synchronous block with no intervening yield.
//!
//! Everything runs on the caller's single execution thread. The only spawned
//! work is the debounce timer, which delivers back through a channel and is
//! epoch-guarded: a timer that outlives its session delivers a stale epoch
//! and is dropped at poll time instead of mutating torn-down state.

use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio::sync::mpsc;

use easel_store::{CreateError, Workspace};
use easel_types::{
    AdmissionDecision, Artifact, ArtifactPatch, ArtifactStatus, MessagePart, WorkspaceLimits,
};

use crate::debounce::Debouncer;
use crate::dedup::InvocationDeduplicator;
use crate::envelope;

/// Fire-and-forget notification to the rendering host.
///
/// At-least-once semantics: the sender never blocks and never fails the
/// ingest pass; a dropped receiver is silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceSignal {
    /// Request the side workspace become visible; artifacts exist.
    Show,
}

/// Outcome of one ingest pass over a message's parts.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestReport {
    /// Artifacts newly created this pass.
    pub created: usize,
    /// Existing artifacts updated in place (e.g. loading → completed).
    pub updated: usize,
    /// Completions suppressed by the deduplicator.
    pub duplicates: usize,
    /// Artifacts skipped because their payload would not parse.
    pub parse_failures: usize,
    /// Admission rejections, surfaced for the caller to present.
    pub rejected: Vec<AdmissionDecision>,
    /// Warnings attached to allowed decisions.
    pub warnings: Vec<String>,
}

/// A debounced ingest waiting to be applied.
#[derive(Debug)]
struct PendingIngest {
    /// Session epoch at scheduling time; stale epochs are dropped unapplied.
    epoch: u64,
    message_id: String,
    parts: Vec<MessagePart>,
}

/// Per-session reconciliation and artifact-admission state.
pub struct Session {
    workspace: Workspace,
    dedup: InvocationDeduplicator,
    debouncer: Debouncer,
    debounce_delay: Duration,
    /// Bumped on every reset; guards debounced work scheduled before a
    /// thread switch from mutating the new session's state.
    epoch: u64,
    pending_tx: mpsc::UnboundedSender<PendingIngest>,
    pending_rx: mpsc::UnboundedReceiver<PendingIngest>,
    signal_tx: Option<mpsc::UnboundedSender<WorkspaceSignal>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("artifacts", &self.workspace.len())
            .field("dedup_keys", &self.dedup.len())
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(limits: WorkspaceLimits) -> Self {
        Self::with_workspace(Workspace::new(limits))
    }

    /// Session over an injected workspace (tests supply fake memory probes).
    #[must_use]
    pub fn with_workspace(workspace: Workspace) -> Self {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        Self {
            workspace,
            dedup: InvocationDeduplicator::new(),
            debouncer: Debouncer::new(),
            debounce_delay: Debouncer::DEFAULT_DELAY,
            epoch: 0,
            pending_tx,
            pending_rx,
            signal_tx: None,
        }
    }

    /// Create the workspace-visibility channel, returning the receiver for
    /// the rendering host.
    pub fn connect_signal(&mut self) -> mpsc::UnboundedReceiver<WorkspaceSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.signal_tx = Some(tx);
        rx
    }

    /// Process completed tool invocations in `parts` immediately.
    ///
    /// Uses the wall clock for artifact timestamps; see [`Self::ingest_at`]
    /// when the caller owns the clock.
    pub fn ingest(&mut self, message_id: &str, parts: &[MessagePart]) -> IngestReport {
        self.ingest_at(message_id, parts, SystemTime::now())
    }

    /// Process completed tool invocations with an explicit timestamp.
    ///
    /// For each tool-invocation part whose output signals artifact-worthy
    /// completion: resolve its artifact identity, consult the deduplicator,
    /// extract the payload (fail-soft per artifact), then create or update
    /// through the admission gate. Nothing in this pass can fail the batch.
    pub fn ingest_at(
        &mut self,
        message_id: &str,
        parts: &[MessagePart],
        timestamp: SystemTime,
    ) -> IngestReport {
        let mut report = IngestReport::default();

        for part in parts {
            let MessagePart::ToolInvocation(invocation) = part else {
                continue;
            };
            if !invocation.is_resolved() {
                continue;
            }
            let Some(output) = &invocation.output else {
                continue;
            };
            if !envelope::signals_completion(output) {
                continue;
            }

            // Results with no stable identity get a fresh random id. Such
            // results can never be deduplicated across replays; they lack
            // the identity that would make replay detection possible.
            let artifact_id = envelope::resolve_artifact_id(output)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            if !self.dedup.should_process(message_id, &artifact_id) {
                tracing::debug!(
                    artifact_id = %artifact_id,
                    message_id = %message_id,
                    "duplicate completion suppressed"
                );
                report.duplicates += 1;
                continue;
            }

            let payload = match envelope::extract_payload(output) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(
                        artifact_id = %artifact_id,
                        tool_name = %invocation.tool_name,
                        error = %e,
                        "skipping artifact with unparsable payload"
                    );
                    report.parse_failures += 1;
                    continue;
                }
            };

            if self.workspace.get(&artifact_id).is_some() {
                let data_points = envelope::extract_data_points(output, payload.as_ref());
                let patch = ArtifactPatch {
                    data: payload,
                    status: Some(ArtifactStatus::Completed),
                    chart_kind: envelope::extract_chart_kind(output),
                    data_points: (data_points > 0).then_some(data_points),
                    title: None,
                };
                self.workspace.update(&artifact_id, patch, timestamp);
                self.dedup.mark_processed(message_id, &artifact_id);
                report.updated += 1;
                continue;
            }

            let artifact = build_artifact(&artifact_id, &invocation.tool_name, output, payload, timestamp);
            match self.workspace.create(artifact) {
                Ok(decision) => {
                    self.dedup.mark_processed(message_id, &artifact_id);
                    report.created += 1;
                    if let Some(warning) = decision.warning {
                        report.warnings.push(warning);
                    }
                }
                Err(CreateError::Rejected(decision)) => {
                    // Not marked processed: if the user frees space, a
                    // replay of this completion may still create the artifact.
                    tracing::debug!(
                        artifact_id = %artifact_id,
                        reason = decision.reason.as_deref().unwrap_or(""),
                        "artifact creation rejected by admission"
                    );
                    report.rejected.push(decision);
                }
                Err(CreateError::Duplicate(e)) => {
                    // Only reachable if the store gained this id between the
                    // existence check above and here; log and move on.
                    tracing::warn!(artifact_id = %artifact_id, error = %e, "duplicate artifact id on create");
                }
            }
        }

        if report.created > 0 {
            self.emit(WorkspaceSignal::Show);
        }

        report
    }

    /// Schedule an ingest after the debounce delay, superseding any pending
    /// one.
    ///
    /// Rapid successive partial-stream updates coalesce into one pass; only
    /// the last scheduled snapshot of `parts` is applied. The result arrives
    /// via [`Self::poll_pending`].
    pub fn debounced_ingest(&mut self, message_id: impl Into<String>, parts: Vec<MessagePart>) {
        let pending = PendingIngest {
            epoch: self.epoch,
            message_id: message_id.into(),
            parts,
        };
        let tx = self.pending_tx.clone();
        self.debouncer.schedule(self.debounce_delay, async move {
            let _ = tx.send(pending);
        });
    }

    /// Apply any debounced ingests that have come due.
    ///
    /// Pending work scheduled before the last reset carries a stale epoch
    /// and is dropped here without touching session state.
    pub fn poll_pending(&mut self) -> Vec<IngestReport> {
        let mut reports = Vec::new();
        loop {
            match self.pending_rx.try_recv() {
                Ok(pending) if pending.epoch == self.epoch => {
                    reports.push(self.ingest(&pending.message_id, &pending.parts));
                }
                Ok(_) => {
                    tracing::debug!("dropping debounced ingest from a previous session");
                }
                Err(_) => break,
            }
        }
        reports
    }

    /// Tear down session-scoped state for a session end or thread switch.
    ///
    /// One synchronous block: bump the epoch (invalidating in-flight
    /// debounced work), cancel the timer, drain the pending queue, and clear
    /// the workspace, dedup set, and cached memory sample together.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.debouncer.cancel();
        while self.pending_rx.try_recv().is_ok() {}
        self.workspace.clear();
        self.dedup.reset();
    }

    /// Override the debounce delay (the default is
    /// [`Debouncer::DEFAULT_DELAY`]).
    pub fn set_debounce_delay(&mut self, delay: Duration) {
        self.debounce_delay = delay;
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    fn emit(&self, signal: WorkspaceSignal) {
        if let Some(tx) = &self.signal_tx {
            // Fire-and-forget: a torn-down receiver is not our problem.
            let _ = tx.send(signal);
        }
    }
}

/// Assemble an artifact from a completed tool-result envelope.
fn build_artifact(
    artifact_id: &str,
    tool_name: &str,
    output: &Value,
    payload: Option<Value>,
    timestamp: SystemTime,
) -> Artifact {
    let class = envelope::extract_class(output);
    let title = envelope::extract_title(output, tool_name);
    let data_points = envelope::extract_data_points(output, payload.as_ref());

    let mut artifact = Artifact::completed(
        artifact_id,
        class,
        title,
        payload.unwrap_or(Value::Null),
        timestamp,
    )
    .with_tool_name(tool_name);

    if let Some(kind) = envelope::extract_chart_kind(output) {
        artifact = artifact.with_chart_kind(kind);
    }
    if data_points > 0 {
        artifact = artifact.with_data_points(data_points);
    }
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_store::{MemoryPressureMonitor, MemoryProbe};
    use easel_types::{MemorySample, MemorySource, ToolInvocation};
    use serde_json::json;

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

    fn session() -> Session {
        let limits = WorkspaceLimits::default();
        let monitor = MemoryPressureMonitor::with_probes(vec![Box::new(QuietProbe)], &limits);
        Session::with_workspace(Workspace::with_monitor(monitor, limits))
    }

    fn completion(tool: &str, call_id: &str, output: Value) -> MessagePart {
        MessagePart::ToolInvocation(ToolInvocation::resolved(tool, call_id, Value::Null, output))
    }

    fn chart_completion(artifact_id: &str) -> MessagePart {
        completion(
            "create_chart",
            "call-1",
            json!({
                "success": true,
                "chartId": artifact_id,
                "title": "Revenue",
                "chartType": "bar",
                "chartData": [1, 2, 3],
            }),
        )
    }

    #[test]
    fn completion_creates_artifact_and_signals_workspace() {
        let mut session = session();
        let mut signals = session.connect_signal();

        let report = session.ingest("m1", &[chart_completion("chart-1")]);
        assert_eq!(report.created, 1);
        assert_eq!(session.workspace().len(), 1);

        let artifact = session.workspace().get("chart-1").unwrap();
        assert_eq!(artifact.title, "Revenue");
        assert_eq!(artifact.status, ArtifactStatus::Completed);
        assert_eq!(artifact.metadata.tool_name.as_deref(), Some("create_chart"));
        assert_eq!(artifact.metadata.data_points, Some(3));

        assert_eq!(signals.try_recv(), Ok(WorkspaceSignal::Show));
    }

    #[test]
    fn replayed_completion_is_suppressed() {
        let mut session = session();
        let parts = [chart_completion("chart-1")];

        let first = session.ingest("m1", &parts);
        let second = session.ingest("m1", &parts);

        assert_eq!(first.created, 1);
        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(session.workspace().len(), 1);
    }

    #[test]
    fn same_artifact_from_other_message_updates_in_place() {
        let mut session = session();
        session.ingest("m1", &[chart_completion("chart-1")]);

        let report = session.ingest("m2", &[chart_completion("chart-1")]);
        assert_eq!(report.updated, 1);
        assert_eq!(session.workspace().len(), 1);
    }

    #[test]
    fn all_three_envelope_shapes_are_recognized() {
        let mut session = session();

        let flat_status = completion(
            "t",
            "c1",
            json!({"shouldCreateArtifact": true, "status": "success", "chartId": "a1"}),
        );
        let flat_success = completion("t", "c2", json!({"success": true, "chartId": "a2"}));
        let nested = completion(
            "t",
            "c3",
            json!({
                "isError": false,
                "structuredContent": {"result": [{"success": true, "artifactId": "a3"}]}
            }),
        );

        let report = session.ingest("m1", &[flat_status, flat_success, nested]);
        assert_eq!(report.created, 3);
        assert_eq!(session.workspace().len(), 3);
    }

    #[test]
    fn unresolved_and_failed_invocations_are_ignored() {
        let mut session = session();
        let pending = MessagePart::ToolInvocation(ToolInvocation::call("t", "c1", json!({})));
        let failed = completion("t", "c2", json!({"success": false}));
        let text = MessagePart::text("hi");

        let report = session.ingest("m1", &[pending, failed, text]);
        assert_eq!(report, IngestReport::default());
        assert!(session.workspace().is_empty());
    }

    #[test]
    fn results_without_stable_identity_are_never_deduplicated() {
        let mut session = session();
        let parts = [completion("t", "c1", json!({"success": true, "chartData": [1]}))];

        session.ingest("m1", &parts);
        session.ingest("m1", &parts);
        // No chartId/artifactId: each observation creates a fresh artifact.
        assert_eq!(session.workspace().len(), 2);
    }

    #[test]
    fn parse_failure_skips_one_artifact_not_the_batch() {
        let mut session = session();
        let bad = completion(
            "t",
            "c1",
            json!({"success": true, "chartId": "bad", "chartData": "{not json"}),
        );
        let good = chart_completion("good");

        let report = session.ingest("m1", &[bad, good]);
        assert_eq!(report.parse_failures, 1);
        assert_eq!(report.created, 1);
        assert!(session.workspace().get("bad").is_none());
        assert!(session.workspace().get("good").is_some());
    }

    #[test]
    fn rejected_completion_can_retry_after_freeing_space() {
        let mut session = session();
        for i in 0..25 {
            session.ingest("fill", &[chart_completion(&format!("c{i}"))]);
        }
        assert_eq!(session.workspace().len(), 25);

        let report = session.ingest("m1", &[chart_completion("blocked")]);
        assert_eq!(report.rejected.len(), 1);
        assert!(report.rejected[0].reason.as_ref().unwrap().contains("limit"));

        session.workspace_mut().free_oldest(3);
        let report = session.ingest("m1", &[chart_completion("blocked")]);
        assert_eq!(report.created, 1);
    }

    #[test]
    fn reset_clears_dedup_store_and_cache_together() {
        let mut session = session();
        session.ingest("m1", &[chart_completion("chart-1")]);
        assert!(!session.workspace().is_empty());

        session.reset();
        assert!(session.workspace().is_empty());
        assert!(session.workspace().cached_sample().is_none());

        // The same completion is processable again in the new session.
        let report = session.ingest("m1", &[chart_completion("chart-1")]);
        assert_eq!(report.created, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_coalesces_rapid_updates_into_one_pass() {
        let mut session = session();

        session.debounced_ingest("m1", vec![chart_completion("chart-1")]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.debounced_ingest("m1", vec![chart_completion("chart-1")]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let reports = session.poll_pending();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].created, 1);
        assert_eq!(session.workspace().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_due_before_the_delay_elapses() {
        let mut session = session();
        session.debounced_ingest("m1", vec![chart_completion("chart-1")]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.poll_pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_invalidates_inflight_debounced_work() {
        let mut session = session();
        session.debounced_ingest("m1", vec![chart_completion("chart-1")]);
        session.reset();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(session.poll_pending().is_empty());
        assert!(session.workspace().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_epoch_is_dropped_even_if_timer_fired() {
        let mut session = session();
        session.debounced_ingest("m1", vec![chart_completion("chart-1")]);
        // Let the timer fire and deliver before resetting.
        tokio::time::sleep(Duration::from_millis(200)).await;
        session.reset();

        assert!(session.poll_pending().is_empty());
        assert!(session.workspace().is_empty());
    }
}
