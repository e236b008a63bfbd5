//! Artifact domain model.
//!
//! An artifact is one chart or table record shown in the side workspace.
//! Identity (`id`) is unique within the store for the lifetime of a session.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Loading,
    Completed,
    Error,
}

/// Visual class of an artifact, used to weight its admission footprint.
///
/// Heavier visualizations (dense scatter plots, geographic maps, multi-panel
/// dashboards) cost more memory per data point than a plain chart or table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactClass {
    Table,
    Scatter,
    Geo,
    Sankey,
    Dashboard,
    #[default]
    Chart,
}

impl ArtifactClass {
    /// Parse a tool-provided type hint. Unknown hints fall back to `Chart`.
    #[must_use]
    pub fn parse(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "table" => Self::Table,
            "scatter" => Self::Scatter,
            "geo" | "map" => Self::Geo,
            "sankey" => Self::Sankey,
            "dashboard" => Self::Dashboard,
            _ => Self::Chart,
        }
    }

    /// Relative memory footprint multiplier for this class.
    #[must_use]
    pub fn footprint_multiplier(self) -> f64 {
        match self {
            Self::Table => 1.5,
            Self::Scatter => 2.0,
            Self::Geo | Self::Sankey => 2.5,
            Self::Dashboard => 3.0,
            Self::Chart => 1.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Scatter => "scatter",
            Self::Geo => "geo",
            Self::Sankey => "sankey",
            Self::Dashboard => "dashboard",
            Self::Chart => "chart",
        }
    }
}

/// Descriptive metadata carried alongside the artifact payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub last_updated: SystemTime,
    pub memory_estimate_bytes: u64,
}

/// A chart or table record shown in the side workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub class: ArtifactClass,
    pub title: String,
    pub data: Value,
    pub status: ArtifactStatus,
    pub metadata: ArtifactMetadata,
    pub created_at: SystemTime,
}

impl Artifact {
    /// Create an artifact directly in `Completed` state.
    #[must_use]
    pub fn completed(
        id: impl Into<String>,
        class: ArtifactClass,
        title: impl Into<String>,
        data: Value,
        timestamp: SystemTime,
    ) -> Self {
        Self::with_status(id, class, title, data, ArtifactStatus::Completed, timestamp)
    }

    /// Create an artifact in `Loading` state, to be completed via `update`.
    #[must_use]
    pub fn loading(
        id: impl Into<String>,
        class: ArtifactClass,
        title: impl Into<String>,
        timestamp: SystemTime,
    ) -> Self {
        Self::with_status(id, class, title, Value::Null, ArtifactStatus::Loading, timestamp)
    }

    fn with_status(
        id: impl Into<String>,
        class: ArtifactClass,
        title: impl Into<String>,
        data: Value,
        status: ArtifactStatus,
        timestamp: SystemTime,
    ) -> Self {
        let memory_estimate_bytes = estimate_payload_bytes(&data);
        Self {
            id: id.into(),
            class,
            title: title.into(),
            data,
            status,
            metadata: ArtifactMetadata {
                chart_kind: None,
                data_points: None,
                tool_name: None,
                last_updated: timestamp,
                memory_estimate_bytes,
            },
            created_at: timestamp,
        }
    }

    #[must_use]
    pub fn with_chart_kind(mut self, chart_kind: impl Into<String>) -> Self {
        self.metadata.chart_kind = Some(chart_kind.into());
        self
    }

    #[must_use]
    pub fn with_data_points(mut self, data_points: usize) -> Self {
        self.metadata.data_points = Some(data_points);
        self
    }

    #[must_use]
    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.metadata.tool_name = Some(tool_name.into());
        self
    }

    /// Apply a partial update in place, bumping `last_updated`.
    pub fn apply(&mut self, patch: ArtifactPatch, timestamp: SystemTime) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(data) = patch.data {
            self.metadata.memory_estimate_bytes = estimate_payload_bytes(&data);
            self.data = data;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(chart_kind) = patch.chart_kind {
            self.metadata.chart_kind = Some(chart_kind);
        }
        if let Some(data_points) = patch.data_points {
            self.metadata.data_points = Some(data_points);
        }
        self.metadata.last_updated = timestamp;
    }
}

/// Partial update for an existing artifact. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArtifactStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<usize>,
}

/// Rough payload footprint: the serialized JSON length.
///
/// This is deliberately cheap; the admission controller's own estimates use
/// class multipliers and data-point counts, not this number.
fn estimate_payload_bytes(data: &Value) -> u64 {
    if data.is_null() {
        return 0;
    }
    serde_json::to_string(data).map(|s| s.len() as u64).unwrap_or(0)
}
