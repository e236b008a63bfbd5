//! Tool-result envelope interpretation.
//!
//! Upstream tool implementations emit result envelopes in three historically
//! different shapes: flat `{shouldCreateArtifact, status}`, flat `{success}`,
//! and nested `{structuredContent: {result: [{success}]}, isError}`. All
//! three must be recognized identically, so the checks that used to be
//! copy-pasted across call sites live here as one exported predicate.

use easel_types::ArtifactClass;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("artifact payload is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Does this tool output signal an artifact-worthy completion?
///
/// True when *any* of the three envelope shapes reports success. Absent or
/// differently-typed fields never error; they simply fail the check.
#[must_use]
pub fn signals_completion(output: &Value) -> bool {
    if output.get("shouldCreateArtifact").and_then(Value::as_bool) == Some(true)
        && output.get("status").and_then(Value::as_str) == Some("success")
    {
        return true;
    }

    if output.get("success").and_then(Value::as_bool) == Some(true) {
        return true;
    }

    output
        .pointer("/structuredContent/result/0/success")
        .and_then(Value::as_bool)
        == Some(true)
        && output.get("isError").and_then(Value::as_bool) == Some(false)
}

/// The candidate artifact id: the first defined among `chartId`,
/// `artifactId`, and the nested structured-content id.
///
/// `None` means the result carries no stable identity; the caller falls back
/// to a fresh random id, which makes such results impossible to deduplicate
/// across replays.
#[must_use]
pub fn resolve_artifact_id(output: &Value) -> Option<String> {
    output
        .get("chartId")
        .or_else(|| output.get("artifactId"))
        .or_else(|| output.pointer("/structuredContent/result/0/artifactId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract the visual payload from `chartData` or `artifact.content`.
///
/// The payload may arrive JSON-encoded as a string; the parse failing is a
/// per-artifact error the caller logs and skips, never a batch failure.
pub fn extract_payload(output: &Value) -> Result<Option<Value>, PayloadError> {
    let candidate = output
        .get("chartData")
        .or_else(|| output.pointer("/artifact/content"));

    match candidate {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(encoded)) => Ok(Some(serde_json::from_str(encoded)?)),
        Some(value) => Ok(Some(value.clone())),
    }
}

/// Artifact title, defaulting to "<tool> result" when the envelope has none.
#[must_use]
pub fn extract_title(output: &Value, tool_name: &str) -> String {
    output
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map_or_else(|| format!("{tool_name} result"), str::to_string)
}

/// Visual class hint from `artifactType` / `chartType` / `type`.
#[must_use]
pub fn extract_class(output: &Value) -> ArtifactClass {
    ["artifactType", "chartType", "type"]
        .iter()
        .find_map(|key| output.get(*key).and_then(Value::as_str))
        .map_or_else(ArtifactClass::default, ArtifactClass::parse)
}

/// The raw chart-kind string, kept verbatim in artifact metadata.
#[must_use]
pub fn extract_chart_kind(output: &Value) -> Option<String> {
    output
        .get("chartType")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Data-point count: the envelope's own `dataPoints` when present, otherwise
/// the payload's top-level or `data` array length.
#[must_use]
pub fn extract_data_points(output: &Value, payload: Option<&Value>) -> usize {
    if let Some(n) = output.get("dataPoints").and_then(Value::as_u64) {
        return n as usize;
    }
    payload
        .and_then(|p| p.as_array().or_else(|| p.get("data").and_then(Value::as_array)))
        .map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_should_create_artifact_shape() {
        assert!(signals_completion(&json!({
            "shouldCreateArtifact": true,
            "status": "success"
        })));
        assert!(!signals_completion(&json!({
            "shouldCreateArtifact": true,
            "status": "error"
        })));
        assert!(!signals_completion(&json!({
            "shouldCreateArtifact": false,
            "status": "success"
        })));
    }

    #[test]
    fn flat_success_shape() {
        assert!(signals_completion(&json!({"success": true})));
        assert!(!signals_completion(&json!({"success": false})));
        assert!(!signals_completion(&json!({"success": "true"})));
    }

    #[test]
    fn nested_structured_content_shape() {
        assert!(signals_completion(&json!({
            "isError": false,
            "structuredContent": {"result": [{"success": true}]}
        })));
        // isError must be literally false, not merely absent.
        assert!(!signals_completion(&json!({
            "structuredContent": {"result": [{"success": true}]}
        })));
        assert!(!signals_completion(&json!({
            "isError": true,
            "structuredContent": {"result": [{"success": true}]}
        })));
    }

    #[test]
    fn non_object_output_is_not_completion() {
        assert!(!signals_completion(&json!("ok")));
        assert!(!signals_completion(&json!(null)));
        assert!(!signals_completion(&json!({})));
    }

    #[test]
    fn artifact_id_resolution_order() {
        let output = json!({
            "chartId": "c-1",
            "artifactId": "a-1",
            "structuredContent": {"result": [{"artifactId": "s-1"}]}
        });
        assert_eq!(resolve_artifact_id(&output).as_deref(), Some("c-1"));

        let output = json!({
            "artifactId": "a-1",
            "structuredContent": {"result": [{"artifactId": "s-1"}]}
        });
        assert_eq!(resolve_artifact_id(&output).as_deref(), Some("a-1"));

        let output = json!({
            "structuredContent": {"result": [{"artifactId": "s-1"}]}
        });
        assert_eq!(resolve_artifact_id(&output).as_deref(), Some("s-1"));

        assert_eq!(resolve_artifact_id(&json!({"success": true})), None);
    }

    #[test]
    fn payload_from_chart_data_value() {
        let output = json!({"chartData": {"points": [1, 2]}});
        assert_eq!(
            extract_payload(&output).unwrap(),
            Some(json!({"points": [1, 2]}))
        );
    }

    #[test]
    fn payload_from_nested_artifact_content() {
        let output = json!({"artifact": {"content": [1, 2, 3]}});
        assert_eq!(extract_payload(&output).unwrap(), Some(json!([1, 2, 3])));
    }

    #[test]
    fn json_encoded_string_payload_is_parsed() {
        let output = json!({"chartData": "{\"points\": [1]}"});
        assert_eq!(
            extract_payload(&output).unwrap(),
            Some(json!({"points": [1]}))
        );
    }

    #[test]
    fn malformed_string_payload_errors_softly() {
        let output = json!({"chartData": "not json {"});
        assert!(extract_payload(&output).is_err());
    }

    #[test]
    fn absent_payload_is_none() {
        assert_eq!(extract_payload(&json!({"success": true})).unwrap(), None);
    }

    #[test]
    fn title_falls_back_to_tool_name() {
        assert_eq!(
            extract_title(&json!({"title": "Revenue Q3"}), "create_chart"),
            "Revenue Q3"
        );
        assert_eq!(
            extract_title(&json!({"title": "  "}), "create_chart"),
            "create_chart result"
        );
        assert_eq!(extract_title(&json!({}), "create_chart"), "create_chart result");
    }

    #[test]
    fn class_and_kind_extraction() {
        let output = json!({"chartType": "scatter"});
        assert_eq!(extract_class(&output), ArtifactClass::Scatter);
        assert_eq!(extract_chart_kind(&output).as_deref(), Some("scatter"));

        assert_eq!(extract_class(&json!({})), ArtifactClass::Chart);
        assert_eq!(extract_class(&json!({"artifactType": "table"})), ArtifactClass::Table);
    }

    #[test]
    fn data_points_prefer_envelope_count() {
        let payload = json!([1, 2, 3]);
        assert_eq!(
            extract_data_points(&json!({"dataPoints": 500}), Some(&payload)),
            500
        );
        assert_eq!(extract_data_points(&json!({}), Some(&payload)), 3);
        assert_eq!(
            extract_data_points(&json!({}), Some(&json!({"data": [1, 2]}))),
            2
        );
        assert_eq!(extract_data_points(&json!({}), None), 0);
    }
}
