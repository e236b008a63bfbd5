//! Deterministic reassembly of step-wise model output into message parts.
//!
//! Within one step the order is fixed: all tool calls, then tool-result
//! mutations applied to matching calls (or orphan parts appended), then the
//! step's text. Across steps, step order is input order. The function
//! performs no IO and cannot fail; malformed input degrades to fewer parts.

use easel_types::{MessagePart, StreamOutcome, ToolInvocation};
use serde_json::Value;

/// A reconciled message: its identifier plus ordered parts.
///
/// Handed off verbatim to the persistence collaborator; this subsystem does
/// not store anything itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledMessage {
    pub id: String,
    pub parts: Vec<MessagePart>,
}

/// Reconcile a provider outcome into ordered message parts.
///
/// `fallback_id` names the message when the outcome itself carries no id.
/// When no step produced text but the outcome carries cumulative top-level
/// text (providers that only report per-turn text), one final `Text` part is
/// appended from it.
#[must_use]
pub fn reconcile(outcome: &StreamOutcome, fallback_id: &str) -> ReconciledMessage {
    let mut parts: Vec<MessagePart> = Vec::new();

    for step in &outcome.steps {
        for call in &step.tool_calls {
            parts.push(MessagePart::ToolInvocation(ToolInvocation::call(
                &call.tool_name,
                &call.tool_call_id,
                call.input.clone(),
            )));
        }

        for result in &step.tool_results {
            match most_recent_unresolved(&mut parts, &result.tool_call_id) {
                Some(invocation) => {
                    invocation.resolve(result.output.clone(), result.input.clone());
                }
                None => {
                    // Orphan result: no matching call was streamed (e.g. a
                    // provider-executed tool). Render it as a standalone
                    // completed invocation.
                    parts.push(MessagePart::ToolInvocation(ToolInvocation::resolved(
                        &result.tool_name,
                        &result.tool_call_id,
                        result.input.clone().unwrap_or(Value::Null),
                        result.output.clone(),
                    )));
                }
            }
        }

        if let Some(text) = &step.text
            && !text.trim().is_empty()
        {
            parts.push(MessagePart::text(text.clone()));
        }
    }

    if !parts.iter().any(MessagePart::is_text)
        && let Some(text) = &outcome.text
        && !text.trim().is_empty()
    {
        parts.push(MessagePart::text(text.clone()));
    }

    ReconciledMessage {
        id: outcome
            .id
            .clone()
            .unwrap_or_else(|| fallback_id.to_string()),
        parts,
    }
}

/// Most recent unresolved invocation with a matching call id.
///
/// Results match by `tool_call_id` only, never by name. If multiple calls
/// share an id (should not happen), the first unresolved match from the tail
/// wins.
fn most_recent_unresolved<'a>(
    parts: &'a mut [MessagePart],
    tool_call_id: &str,
) -> Option<&'a mut ToolInvocation> {
    parts.iter_mut().rev().find_map(|part| match part {
        MessagePart::ToolInvocation(inv)
            if inv.tool_call_id == tool_call_id && !inv.is_resolved() =>
        {
            Some(inv)
        }
        _ => None,
    })
}
