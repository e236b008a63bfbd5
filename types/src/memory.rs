//! Memory measurement and pressure classification types.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Which measurement tier produced a sample.
///
/// Downstream consumers use this to reason about confidence: `Estimated`
/// samples are derived from artifact count alone and are explicitly the
/// lowest-fidelity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    Precise,
    Legacy,
    Estimated,
}

/// A best-effort memory measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
    /// Zero means the limit could not be measured; classification fails open.
    pub limit_bytes: u64,
    pub timestamp: SystemTime,
    pub source: MemorySource,
}

impl MemorySample {
    /// Usage as a percentage of the limit. Zero when the limit is unknown.
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64 * 100.0
    }
}

/// Coarse classification of memory headroom.
///
/// A pure function of the latest sample; no hysteresis, no smoothing, no
/// dependence on prior levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    Normal,
    Warning,
    Critical,
}

impl PressureLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}
