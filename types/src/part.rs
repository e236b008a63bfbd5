//! Message parts and the raw stream shapes they are reconciled from.
//!
//! `StreamOutcome` mirrors what the model-provider integration hands over at
//! the end of a turn. Every field is optional on the wire; absent or `null`
//! fields deserialize to empty so the reconciler never has to defend against
//! missing data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call streamed by the model within one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_name: String,
    pub tool_call_id: String,
    /// Arguments as parsed JSON. Defaults to `null` when the provider omits them.
    #[serde(default)]
    pub input: Value,
}

/// A tool result streamed by the model, matched to its call by `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_name: String,
    pub tool_call_id: String,
    /// Some providers echo the call input alongside the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Value,
}

/// One unit of model output: zero or more tool calls, zero or more tool
/// results, and optional text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tool_results: Vec<ToolResult>,
}

/// The provider integration's end-of-turn result.
///
/// `text` is the cumulative turn text some providers report instead of
/// per-step text; the reconciler uses it as a fallback only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub steps: Vec<StreamStep>,
}

/// Deserialize `null` (or an absent field, via `#[serde(default)]`) as an
/// empty vec instead of erroring. Malformed input degrades, never throws.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Whether a tool invocation is still awaiting its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationState {
    Call,
    OutputAvailable,
}

/// A tool invocation as it appears in the reconciled message record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: String,
    pub tool_call_id: String,
    #[serde(default)]
    pub input: Value,
    pub state: InvocationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ToolInvocation {
    /// A streamed call awaiting its result.
    #[must_use]
    pub fn call(tool_name: impl Into<String>, tool_call_id: impl Into<String>, input: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            input,
            state: InvocationState::Call,
            output: None,
        }
    }

    /// A resolved invocation, used for orphan results that never streamed a call.
    #[must_use]
    pub fn resolved(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        input: Value,
        output: Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            input,
            state: InvocationState::OutputAvailable,
            output: Some(output),
        }
    }

    /// Attach the result, backfilling `input` only when the streamed call's
    /// input was empty.
    pub fn resolve(&mut self, output: Value, result_input: Option<Value>) {
        if self.input_is_empty()
            && let Some(input) = result_input
        {
            self.input = input;
        }
        self.state = InvocationState::OutputAvailable;
        self.output = Some(output);
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state == InvocationState::OutputAvailable
    }

    fn input_is_empty(&self) -> bool {
        match &self.input {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// One element of a reconciled message.
///
/// This is a real sum type: text, a tool invocation, or an inert step marker
/// preserved for future display grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text { text: String },
    ToolInvocation(ToolInvocation),
    StepBoundary,
}

impl MessagePart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    #[must_use]
    pub fn as_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Self::ToolInvocation(inv) => Some(inv),
            _ => None,
        }
    }
}
