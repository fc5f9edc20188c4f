//! Opt-in stage timing for the detection pipeline and CLI commands.
//!
//! Instrumented stages (`detect.embed`, `detect.candidates`, `cmd.submit`,
//! ...) record their wall-clock micros into a thread-local buffer. The CLI
//! drains the buffer once per invocation and prints p50/p95/p99 per stage
//! when `--timing` or `GRV_TIMING` asks for it. Disabled timing costs one
//! atomic load per stage.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

thread_local! {
    // Stage name -> raw samples in micros. Stage names are compile-time
    // literals at every call site, so no per-sample allocation happens.
    static STAGES: RefCell<BTreeMap<&'static str, Vec<u64>>> =
        const { RefCell::new(BTreeMap::new()) };
}

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether `GRV_TIMING` asks for timing (`1`, `true`, `yes`, `on`,
/// case-insensitive).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("GRV_TIMING")
        .ok()
        .is_some_and(|value| truthy(&value))
}

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Turn timing collection on or off. Turning it off drops any samples
/// already buffered.
pub fn set_timing_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

/// Drop the current thread's buffered samples.
pub fn clear_timings() {
    STAGES.with(|stages| stages.borrow_mut().clear());
}

/// Run `f`, recording its duration under `stage` when timing is enabled.
pub fn timed<R>(stage: &'static str, f: impl FnOnce() -> R) -> R {
    if !ENABLED.load(Ordering::Relaxed) {
        return f();
    }

    let started = Instant::now();
    let result = f();
    let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    record(stage, micros);
    result
}

fn record(stage: &'static str, micros: u64) {
    STAGES.with(|stages| stages.borrow_mut().entry(stage).or_default().push(micros));
}

/// Latency summary for one instrumented stage. All values in micros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub count: usize,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

/// Everything recorded since the last drain, one entry per stage, ordered
/// by stage name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub stages: Vec<StageTiming>,
}

/// Drain the current thread's buffer into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let drained = STAGES.with(|stages| std::mem::take(&mut *stages.borrow_mut()));

    let stages = drained
        .into_iter()
        .map(|(stage, mut samples)| {
            samples.sort_unstable();
            StageTiming {
                stage,
                count: samples.len(),
                p50_us: nearest_rank(&samples, 50),
                p95_us: nearest_rank(&samples, 95),
                p99_us: nearest_rank(&samples, 99),
            }
        })
        .collect();

    TimingReport { stages }
}

/// Nearest-rank percentile over an already sorted sample set.
fn nearest_rank(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = sorted.len().saturating_mul(pct).div_ceil(100).max(1);
    sorted[rank - 1]
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// JSON rendering for `--json` runs, printed to stderr.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Aligned table for terminal runs.
    #[must_use]
    pub fn display_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>10} {:>10} {:>10}",
            "stage", "count", "p50", "p95", "p99"
        );
        for timing in &self.stages {
            let _ = writeln!(
                out,
                "{:<24} {:>6} {:>10} {:>10} {:>10}",
                timing.stage,
                timing.count,
                format_micros(timing.p50_us),
                format_micros(timing.p95_us),
                format_micros(timing.p99_us),
            );
        }
        out
    }
}

fn format_micros(micros: u64) -> String {
    if micros >= 1_000_000 {
        format!("{}.{:03}s", micros / 1_000_000, (micros % 1_000_000) / 1_000)
    } else if micros >= 1_000 {
        format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
    } else {
        format!("{micros}us")
    }
}
