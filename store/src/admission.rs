//! Admission control: may a new artifact be created right now?
//!
//! Only two conditions reject outright: the hard capacity ceiling and
//! critical memory pressure. Everything else degrades to warnings attached to
//! an allowed decision, because a blocked creation with a clear message is a
//! better failure mode than silently dropped work.

use easel_types::{AdmissionDecision, ArtifactClass, MemorySample, PressureLevel, WorkspaceLimits};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// The dynamic ceiling never drops below this, so sustained pressure can slow
/// the user down but never lock them out entirely.
const CEILING_FLOOR: usize = 10;

/// Memory usage percentage above which available headroom is treated
/// conservatively when recomputing the ceiling.
const HEADROOM_CONSERVATIVE_PERCENT: f64 = 50.0;

/// Projected post-creation usage above which the decision carries the
/// stronger footprint warning.
const PROJECTED_USAGE_WARN_PERCENT: f64 = 85.0;

/// Gatekeeper for artifact creation.
///
/// Stateless apart from the dynamically recomputed effective ceiling; all
/// inputs (occupancy, pressure, cached sample) are passed in per call so the
/// controller never blocks on measurement.
#[derive(Debug)]
pub struct AdmissionController {
    limits: WorkspaceLimits,
    effective_max: usize,
}

impl AdmissionController {
    #[must_use]
    pub fn new(limits: WorkspaceLimits) -> Self {
        Self {
            effective_max: limits.max_artifacts,
            limits,
        }
    }

    /// The current dynamic capacity ceiling.
    #[must_use]
    pub fn effective_max(&self) -> usize {
        self.effective_max
    }

    /// Decide whether a new artifact of the given class may be created.
    ///
    /// Operates on the most recently cached sample, never a fresh one.
    #[must_use]
    pub fn can_admit(
        &self,
        occupancy: usize,
        pressure: PressureLevel,
        sample: Option<&MemorySample>,
        class: ArtifactClass,
        data_points: usize,
    ) -> AdmissionDecision {
        if occupancy >= self.effective_max {
            return AdmissionDecision::reject(format!(
                "artifact limit reached ({occupancy}/{max}); remove artifacts before creating more",
                max = self.effective_max,
            ));
        }

        if pressure == PressureLevel::Critical {
            let usage = sample.map_or(0.0, MemorySample::usage_percent);
            return AdmissionDecision::reject(format!(
                "memory pressure critical ({usage:.0}% of limit); free up space before creating artifacts"
            ));
        }

        // Warnings in increasing strength; later ones override earlier ones.
        let mut warning: Option<String> = None;

        if occupancy >= self.limits.artifact_warning_count {
            warning = Some(format!(
                "workspace nearly full ({occupancy}/{max} artifacts)",
                max = self.effective_max,
            ));
        }

        if pressure == PressureLevel::Warning {
            let usage = sample.map_or(0.0, MemorySample::usage_percent);
            warning = Some(format!("memory pressure elevated ({usage:.0}% of limit)"));
        }

        if let Some(sample) = sample
            && sample.limit_bytes > 0
        {
            let footprint = self.projected_footprint_bytes(class, data_points);
            let projected = (sample.used_bytes as f64 + footprint) / sample.limit_bytes as f64 * 100.0;
            if projected > PROJECTED_USAGE_WARN_PERCENT {
                warning = Some(format!(
                    "creating this {class} artifact is projected to push memory usage to {projected:.0}%",
                    class = class.as_str(),
                ));
            }
        }

        match warning {
            Some(warning) => AdmissionDecision::allow()
                .with_warning(warning)
                .with_recommendation("remove older artifacts to free up space"),
            None => AdmissionDecision::allow(),
        }
    }

    /// Estimated memory cost of a prospective artifact, weighted by class and
    /// data volume.
    #[must_use]
    pub fn projected_footprint_bytes(&self, class: ArtifactClass, data_points: usize) -> f64 {
        let scale = (data_points as f64 / 100.0).sqrt();
        self.limits.per_artifact_estimate_mb * BYTES_PER_MB * class.footprint_multiplier() * scale
    }

    /// Recompute the dynamic ceiling from current occupancy and the latest
    /// sample.
    ///
    /// Runs after every creation, every removal, and on every pressure-level
    /// change. With plentiful headroom the ceiling grows toward the static
    /// maximum; under pressure it shrinks, but never below [`CEILING_FLOOR`].
    pub fn recompute_ceiling(
        &mut self,
        occupancy: usize,
        sample: Option<&MemorySample>,
    ) -> usize {
        let computed = match sample {
            Some(sample) if sample.limit_bytes > 0 => {
                let usage = sample.usage_percent();
                let limit = sample.limit_bytes as f64;
                let headroom = if usage < HEADROOM_CONSERVATIVE_PERCENT {
                    (100.0 - usage) / 100.0 * limit
                } else {
                    0.20 * limit
                };
                let per_artifact = self.limits.per_artifact_estimate_mb * BYTES_PER_MB;
                let safe_additional = (headroom / per_artifact) as usize;
                occupancy.saturating_add(safe_additional)
            }
            _ => self.limits.max_artifacts,
        };

        self.effective_max = computed.clamp(CEILING_FLOOR, self.limits.max_artifacts);
        self.effective_max
    }
}
