use std::time::Duration;
use tracing::info;

/// Running min/max/mean of one per-snapshot timing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingCounter {
    frames: u32,
    min_ms: f64,
    max_ms: f64,
    total_ms: f64,
}

impl TimingCounter {
    pub fn update(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        if self.frames == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.total_ms += ms;
        self.frames += 1;
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn summary(&self) -> TimingSummary {
        TimingSummary {
            frames: self.frames,
            avg_ms: if self.frames == 0 {
                0.0
            } else {
                self.total_ms / self.frames as f64
            },
            min_ms: self.min_ms,
            max_ms: self.max_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingSummary {
    pub frames: u32,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Per-snapshot timings of the three microset stages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceCounters {
    /// Bridge scan.
    pub microsets: TimingCounter,
    /// Decomposition into pairs and triplets plus the global merge.
    pub tuples: TimingCounter,
    pub total: TimingCounter,
}

impl PerformanceCounters {
    pub fn update(&mut self, microsets: Duration, tuples: Duration, total: Duration) {
        self.microsets.update(microsets);
        self.tuples.update(tuples);
        self.total.update(total);
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport {
            microsets: self.microsets.summary(),
            tuples: self.tuples.summary(),
            total: self.total.summary(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceReport {
    pub microsets: TimingSummary,
    pub tuples: TimingSummary,
    pub total: TimingSummary,
}

impl PerformanceReport {
    pub fn rows(&self) -> [(&'static str, &TimingSummary); 3] {
        [
            ("Building microsets", &self.microsets),
            ("Find pairs/triplets", &self.tuples),
            ("Total microset proc", &self.total),
        ]
    }

    /// Logs the timing table at INFO level.
    pub fn log(&self) {
        info!("Performance timing (ms): {:>20}  {:>8} {:>8} {:>8}", "", "avg", "min", "max");
        for (stage, t) in self.rows() {
            info!(
                frames = t.frames,
                "{:>20}: {:>8.1} {:>8.1} {:>8.1}",
                stage,
                t.avg_ms,
                t.min_ms,
                t.max_ms
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn counter_tracks_min_max_and_mean() {
        let mut counter = TimingCounter::default();
        for ms in [4, 2, 9] {
            counter.update(Duration::from_millis(ms));
        }
        let summary = counter.summary();
        assert_eq!(summary.frames, 3);
        assert!((summary.min_ms - 2.0).abs() < TOLERANCE);
        assert!((summary.max_ms - 9.0).abs() < TOLERANCE);
        assert!((summary.avg_ms - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn empty_counter_reports_zeros() {
        let report = PerformanceCounters::default().report();
        assert_eq!(report.total, TimingSummary::default());
        assert_eq!(report.rows().len(), 3);
    }

    #[test]
    fn counters_update_every_stage() {
        let mut counters = PerformanceCounters::default();
        counters.update(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(3),
        );
        assert_eq!(counters.microsets.frames(), 1);
        assert_eq!(counters.tuples.frames(), 1);
        assert!((counters.report().total.max_ms - 3.0).abs() < TOLERANCE);
    }
}
