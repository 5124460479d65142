use std::time::{Duration, Instant};

/// Monotonic start mark for one measured interval.
///
/// Built on [`Instant`], so wall-clock adjustments never affect the result.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedTiming {
    start: Instant,
}

impl ElapsedTiming {
    /// Captures the start timestamp now.
    pub fn begin() -> Self {
        Self { start: Instant::now() }
    }

    /// Captures the end timestamp and returns `end - start`.
    pub fn finish(self) -> Duration {
        Instant::now().saturating_duration_since(self.start)
    }
}

/// Fractional seconds with three decimals, the precision every report uses.
pub fn format_secs(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}
