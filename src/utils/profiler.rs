//! Timing instrumentation for the conversation pipeline.
//!
//! A [`Profiler`] is a shared handle: an on/off switch plus the collected
//! [`PerformanceStats`]. Nothing is measured while it is disabled.

use crate::utils::logger::PERF_TARGET;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct StatSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

/// Durations in seconds, grouped by operation name.
#[derive(Debug, Default, Clone)]
pub struct PerformanceStats {
    timings: BTreeMap<String, Vec<f64>>,
}

impl PerformanceStats {
    pub fn record(&mut self, name: &str, duration: Duration) {
        self.timings
            .entry(name.to_string())
            .or_default()
            .push(duration.as_secs_f64());
    }

    pub fn get_stats(&self, name: &str) -> Option<StatSummary> {
        let values = self.timings.get(name)?;
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();

        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let percentile = |p: f64| {
            if n > 1 {
                sorted[((n as f64 * p) as usize).min(n - 1)]
            } else {
                sorted[0]
            }
        };

        Some(StatSummary {
            count: n,
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
            p95: percentile(0.95),
            p99: percentile(0.99),
            min: sorted[0],
            max: sorted[n - 1],
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.timings.keys().map(String::as_str)
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let rule = "=".repeat(60);
        let mut lines = vec![rule.clone(), "PERFORMANCE SUMMARY".to_string(), rule.clone()];
        for name in self.names() {
            if let Some(stats) = self.get_stats(name) {
                lines.push(format!("{}:", name));
                lines.push(format!("  Count:   {}", stats.count));
                lines.push(format!("  Mean:    {:.2}s", stats.mean));
                lines.push(format!("  Median:  {:.2}s", stats.median));
                lines.push(format!("  P95:     {:.2}s", stats.p95));
                lines.push(format!("  P99:     {:.2}s", stats.p99));
                lines.push(format!("  Min:     {:.2}s", stats.min));
                lines.push(format!("  Max:     {:.2}s", stats.max));
            }
        }
        lines.push(rule);
        lines
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }
}

#[derive(Debug, Default)]
struct ProfilerInner {
    enabled: AtomicBool,
    stats: Mutex<PerformanceStats>,
}

#[derive(Debug, Clone, Default)]
pub struct Profiler {
    inner: Arc<ProfilerInner>,
}

impl Profiler {
    pub fn new(enabled: bool) -> Self {
        let profiler = Self::default();
        profiler.set_enabled(enabled);
        profiler
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Adds a sample; dropped while the profiler is disabled.
    pub fn record(&self, name: &str, duration: Duration) {
        if !self.is_enabled() {
            return;
        }
        self.with_stats(|stats| stats.record(name, duration));
    }

    pub fn get_stats(&self, name: &str) -> Option<StatSummary> {
        self.with_stats(|stats| stats.get_stats(name))
    }

    pub fn snapshot(&self) -> PerformanceStats {
        self.with_stats(|stats| stats.clone())
    }

    pub fn reset(&self) {
        self.with_stats(PerformanceStats::reset);
    }

    /// Logs `message` on the perf target when timing is on, otherwise at debug.
    pub fn note(&self, message: &str) {
        if self.is_enabled() {
            tracing::info!(target: PERF_TARGET, "⏱️  {}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }

    /// Starts a scoped measurement; the elapsed time is logged and recorded
    /// when the guard drops.
    pub fn timer(&self, name: impl Into<String>) -> Timer {
        Timer {
            profiler: self.is_enabled().then(|| self.clone()),
            name: name.into(),
            start: Instant::now(),
            log: true,
        }
    }

    pub async fn time_async<F, T>(&self, name: &str, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let _timer = self.timer(name);
        future.await
    }

    pub fn log_summary(&self) {
        for line in self.snapshot().summary_lines() {
            tracing::info!(target: PERF_TARGET, "{}", line);
        }
    }

    fn with_stats<R>(&self, f: impl FnOnce(&mut PerformanceStats) -> R) -> R {
        let mut stats = self
            .inner
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut stats)
    }
}

pub struct Timer {
    profiler: Option<Profiler>,
    name: String,
    start: Instant,
    log: bool,
}

impl Timer {
    pub fn quiet(mut self) -> Self {
        self.log = false;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(profiler) = &self.profiler {
            let elapsed = self.start.elapsed();
            if self.log {
                tracing::info!(target: PERF_TARGET, "⏱️  {}: {:.2}s", self.name, elapsed.as_secs_f64());
            }
            profiler.record(&self.name, elapsed);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub label: &'static str,
    /// Seconds since the user stopped speaking.
    pub elapsed: f64,
    /// Seconds since the previous milestone.
    pub delta: f64,
}

/// Milestones of one conversation turn.
#[derive(Debug, Default, Clone)]
pub struct ConversationTimer {
    pub user_start: Option<Instant>,
    pub user_end: Option<Instant>,
    pub stt_start: Option<Instant>,
    pub stt_end: Option<Instant>,
    pub ai_start: Option<Instant>,
    pub llm_start: Option<Instant>,
    pub llm_end: Option<Instant>,
    pub tts_start: Option<Instant>,
    pub tts_end: Option<Instant>,
    pub playback_start: Option<Instant>,
    pub ai_end: Option<Instant>,
}

fn span(start: Option<Instant>, end: Option<Instant>) -> Option<Duration> {
    Some(end?.saturating_duration_since(start?))
}

fn secs_between(later: Instant, earlier: Instant) -> f64 {
    later.saturating_duration_since(earlier).as_secs_f64()
}

impl ConversationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_user_start(&mut self) {
        self.user_start = Some(Instant::now());
    }

    pub fn mark_user_end(&mut self) {
        self.user_end = Some(Instant::now());
    }

    pub fn mark_stt_start(&mut self) {
        self.stt_start = Some(Instant::now());
    }

    pub fn mark_stt_end(&mut self) {
        self.stt_end = Some(Instant::now());
    }

    pub fn mark_ai_start(&mut self) {
        self.ai_start = Some(Instant::now());
    }

    pub fn mark_llm_start(&mut self) {
        self.llm_start = Some(Instant::now());
    }

    pub fn mark_llm_end(&mut self) {
        self.llm_end = Some(Instant::now());
    }

    pub fn mark_tts_start(&mut self) {
        self.tts_start = Some(Instant::now());
    }

    pub fn mark_tts_end(&mut self) {
        self.tts_end = Some(Instant::now());
    }

    pub fn mark_playback_start(&mut self) {
        self.playback_start = Some(Instant::now());
    }

    pub fn mark_ai_end(&mut self) {
        self.ai_end = Some(Instant::now());
    }

    pub fn user_duration(&self) -> Option<Duration> {
        span(self.user_start, self.user_end)
    }

    pub fn stt_duration(&self) -> Option<Duration> {
        span(self.stt_start, self.stt_end)
    }

    pub fn llm_duration(&self) -> Option<Duration> {
        span(self.llm_start, self.llm_end)
    }

    pub fn tts_duration(&self) -> Option<Duration> {
        span(self.tts_start, self.tts_end)
    }

    pub fn ai_duration(&self) -> Option<Duration> {
        span(self.ai_start, self.ai_end)
    }

    /// From the moment the user stops speaking to the first audio out.
    pub fn roundtrip_duration(&self) -> Option<Duration> {
        span(self.user_end, self.playback_start)
    }

    /// Milestones relative to `user_end`. Empty when `user_end` is unset.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        let Some(t0) = self.user_end else {
            return Vec::new();
        };
        let mut entries = Vec::new();

        if let Some(stt_end) = self.stt_end {
            let elapsed = secs_between(stt_end, t0);
            entries.push(TimelineEntry {
                label: "STT Finalized",
                elapsed,
                delta: elapsed,
            });
        }
        if let Some(llm_start) = self.llm_start {
            let prev = self.stt_end.unwrap_or(t0);
            entries.push(TimelineEntry {
                label: "LLM Query Started",
                elapsed: secs_between(llm_start, t0),
                delta: secs_between(llm_start, prev),
            });
        }
        if let Some(llm_end) = self.llm_end {
            let prev = self.llm_start.unwrap_or(t0);
            entries.push(TimelineEntry {
                label: "LLM First Sentence Ready",
                elapsed: secs_between(llm_end, t0),
                delta: secs_between(llm_end, prev),
            });
        }
        if let (Some(_), Some(tts_end)) = (self.tts_start, self.tts_end) {
            let prev = self.llm_end.unwrap_or(t0);
            entries.push(TimelineEntry {
                label: "First TTS Generated",
                elapsed: secs_between(tts_end, t0),
                delta: secs_between(tts_end, prev),
            });
        }
        if let Some(playback) = self.playback_start {
            let prev = self.tts_end.unwrap_or(t0);
            entries.push(TimelineEntry {
                label: "AUDIO PLAYBACK START",
                elapsed: secs_between(playback, t0),
                delta: secs_between(playback, prev),
            });
        }
        entries
    }

    /// Logs the latency timeline and feeds the stage durations into the
    /// profiler's stats. Does nothing while the profiler is off.
    pub fn report(&self, profiler: &Profiler) {
        if !profiler.is_enabled() {
            return;
        }
        if self.user_end.is_none() {
            tracing::info!(target: PERF_TARGET, "⚠️  No timing data available (user_end not set)");
            return;
        }

        let rule = "=".repeat(80);
        tracing::info!(target: PERF_TARGET, "{}", rule);
        tracing::info!(target: PERF_TARGET, "RESPONSE LATENCY TIMELINE (T=0 = User Stopped Speaking)");
        tracing::info!(target: PERF_TARGET, "{}", rule);
        for entry in self.timeline() {
            tracing::info!(
                target: PERF_TARGET,
                "  {:<30} T+{:>5.2}s  (Δ {:>5.2}s)",
                entry.label,
                entry.elapsed,
                entry.delta
            );
        }

        let roundtrip = self.roundtrip_duration();
        if let Some(total) = roundtrip {
            tracing::info!(
                target: PERF_TARGET,
                "⏱️  TOTAL LATENCY: {:.2}s (user stops speaking → AI audio starts)",
                total.as_secs_f64()
            );
        }
        tracing::info!(target: PERF_TARGET, "{}", rule);

        for (name, duration) in [
            ("STT", self.stt_duration()),
            ("LLM", self.llm_duration()),
            ("TTS", self.tts_duration()),
            ("Roundtrip", roundtrip),
        ] {
            if let Some(duration) = duration {
                profiler.record(name, duration);
            }
        }
    }
}
