//! Best-effort memory sampling and pressure classification.
//!
//! Measurement is tiered: a precise cross-context source first, then a legacy
//! per-process counter, then a heuristic estimate derived from artifact count
//! alone. Each tier fails soft into the next; measurement failures are logged
//! and never propagated. Sampling must never block admission decisions, so
//! the monitor caches its latest sample and consumers read the cache.

#[cfg(unix)]
use std::path::PathBuf;
use std::time::SystemTime;

use easel_types::{MemorySample, MemorySource, PressureLevel, WorkspaceLimits};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One measurement tier. Returning `None` means "unavailable here, try the
/// next tier" — probes never error.
pub trait MemoryProbe: Send {
    fn read(&self) -> Option<MemorySample>;

    /// Name used in fallback logging.
    fn name(&self) -> &'static str;
}

/// Precise tier: cgroup v2 `memory.current` against `memory.max`.
///
/// Inside a container this is the authoritative cross-context measurement.
/// An unlimited cgroup (`memory.max` = "max") yields no usable limit, so the
/// probe declines and the chain falls through.
#[cfg(unix)]
pub struct CgroupV2Probe {
    root: PathBuf,
}

#[cfg(unix)]
impl CgroupV2Probe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/sys/fs/cgroup"),
        }
    }

    #[cfg(test)]
    fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn read_u64(&self, file: &str) -> Option<u64> {
        let raw = std::fs::read_to_string(self.root.join(file)).ok()?;
        raw.trim().parse().ok()
    }
}

#[cfg(unix)]
impl Default for CgroupV2Probe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl MemoryProbe for CgroupV2Probe {
    fn read(&self) -> Option<MemorySample> {
        let used = self.read_u64("memory.current")?;
        // "max" (unlimited) fails the parse and declines the tier.
        let limit = self.read_u64("memory.max")?;
        Some(MemorySample {
            used_bytes: used,
            total_bytes: used,
            limit_bytes: limit,
            timestamp: SystemTime::now(),
            source: MemorySource::Precise,
        })
    }

    fn name(&self) -> &'static str {
        "cgroup-v2"
    }
}

/// Legacy tier: resident set size from `/proc/self/statm` against total
/// system memory.
///
/// Coarser than the cgroup view (it ignores shared pages and container
/// limits) but available on any Linux process.
#[cfg(unix)]
pub struct ProcStatmProbe {
    limit_bytes: u64,
    statm: PathBuf,
}

#[cfg(unix)]
impl ProcStatmProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            limit_bytes: read_mem_total().unwrap_or(0),
            statm: PathBuf::from("/proc/self/statm"),
        }
    }

    #[cfg(test)]
    fn with_paths(statm: PathBuf, limit_bytes: u64) -> Self {
        Self { limit_bytes, statm }
    }
}

#[cfg(unix)]
impl Default for ProcStatmProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl MemoryProbe for ProcStatmProbe {
    fn read(&self) -> Option<MemorySample> {
        let raw = std::fs::read_to_string(&self.statm).ok()?;
        let resident_pages: u64 = raw.split_whitespace().nth(1)?.parse().ok()?;
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page_size <= 0 {
            return None;
        }
        let used = resident_pages * page_size as u64;
        Some(MemorySample {
            used_bytes: used,
            total_bytes: used,
            limit_bytes: self.limit_bytes,
            timestamp: SystemTime::now(),
            source: MemorySource::Legacy,
        })
    }

    fn name(&self) -> &'static str {
        "proc-statm"
    }
}

/// Total system memory from `/proc/meminfo`, in bytes.
#[cfg(unix)]
fn read_mem_total() -> Option<u64> {
    let raw = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = raw.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Parameters for the lowest-fidelity tier: estimating usage from artifact
/// count when no real measurement is available.
#[derive(Debug, Clone, Copy)]
pub struct EstimateParams {
    /// Baseline footprint of the application itself.
    pub base_mb: f64,
    /// Per-artifact footprint, normally taken from `WorkspaceLimits`.
    pub per_artifact_mb: f64,
    /// Artifact count past which the complexity multiplier kicks in.
    pub complexity_threshold: usize,
    /// Multiplier applied once past the threshold; dense workspaces cost
    /// more per artifact than sparse ones.
    pub complexity_factor: f64,
    /// Assumed memory limit when nothing real can be measured.
    pub assumed_limit_mb: f64,
}

impl Default for EstimateParams {
    fn default() -> Self {
        Self {
            base_mb: 80.0,
            per_artifact_mb: 5.0,
            complexity_threshold: 10,
            complexity_factor: 1.2,
            assumed_limit_mb: 2048.0,
        }
    }
}

impl EstimateParams {
    #[must_use]
    pub fn from_limits(limits: &WorkspaceLimits) -> Self {
        Self {
            per_artifact_mb: limits.per_artifact_estimate_mb,
            ..Self::default()
        }
    }

    fn sample(&self, artifact_count: usize) -> MemorySample {
        let mut used_mb = self.base_mb + artifact_count as f64 * self.per_artifact_mb;
        if artifact_count > self.complexity_threshold {
            used_mb *= self.complexity_factor;
        }
        let used = (used_mb * BYTES_PER_MB) as u64;
        MemorySample {
            used_bytes: used,
            total_bytes: used,
            limit_bytes: (self.assumed_limit_mb * BYTES_PER_MB) as u64,
            timestamp: SystemTime::now(),
            source: MemorySource::Estimated,
        }
    }
}

/// Obtains memory samples through the tier chain and classifies them.
///
/// `refresh` runs the chain and caches the result; `cached` returns the last
/// sample without any IO, which is what admission reads. Freshness is traded
/// for responsiveness on purpose.
pub struct MemoryPressureMonitor {
    probes: Vec<Box<dyn MemoryProbe>>,
    estimate: EstimateParams,
    warning_percent: f64,
    critical_percent: f64,
    cached: Option<MemorySample>,
}

impl std::fmt::Debug for MemoryPressureMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPressureMonitor")
            .field("probes", &self.probes.len())
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}

impl MemoryPressureMonitor {
    /// Monitor with the platform's default probe chain.
    #[must_use]
    pub fn new(limits: &WorkspaceLimits) -> Self {
        #[cfg(unix)]
        let probes: Vec<Box<dyn MemoryProbe>> = vec![
            Box::new(CgroupV2Probe::new()),
            Box::new(ProcStatmProbe::new()),
        ];
        #[cfg(not(unix))]
        let probes: Vec<Box<dyn MemoryProbe>> = Vec::new();

        Self::with_probes(probes, limits)
    }

    /// Monitor with an explicit probe chain (tests inject fakes here).
    #[must_use]
    pub fn with_probes(probes: Vec<Box<dyn MemoryProbe>>, limits: &WorkspaceLimits) -> Self {
        Self {
            probes,
            estimate: EstimateParams::from_limits(limits),
            warning_percent: limits.memory_warning_percent,
            critical_percent: limits.memory_critical_percent,
            cached: None,
        }
    }

    /// Run the tier chain and cache the freshest sample it yields.
    ///
    /// `artifact_count` feeds the final heuristic tier; the real probes
    /// ignore it.
    pub fn refresh(&mut self, artifact_count: usize) -> MemorySample {
        for probe in &self.probes {
            if let Some(sample) = probe.read() {
                self.cached = Some(sample);
                return sample;
            }
            tracing::debug!(probe = probe.name(), "memory probe unavailable, trying next tier");
        }
        let sample = self.estimate.sample(artifact_count);
        self.cached = Some(sample);
        sample
    }

    /// Latest cached sample, if any refresh has run this session.
    #[must_use]
    pub fn cached(&self) -> Option<&MemorySample> {
        self.cached.as_ref()
    }

    /// Drop the cached sample (session reset).
    pub fn clear_cache(&mut self) {
        self.cached = None;
    }

    /// Classify a sample against the configured thresholds.
    ///
    /// An unmeasurable limit classifies as `Normal`: fail open, never block
    /// artifact creation on a system we cannot measure.
    #[must_use]
    pub fn classify(&self, sample: &MemorySample) -> PressureLevel {
        if sample.limit_bytes == 0 {
            return PressureLevel::Normal;
        }
        let usage = sample.usage_percent();
        if usage >= self.critical_percent {
            PressureLevel::Critical
        } else if usage >= self.warning_percent {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }

    /// Pressure for the cached sample; `Normal` before the first refresh.
    #[must_use]
    pub fn cached_pressure(&self) -> PressureLevel {
        self.cached
            .as_ref()
            .map_or(PressureLevel::Normal, |s| self.classify(s))
    }
}
