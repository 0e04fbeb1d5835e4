use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Default number of chunk samples kept for the moving average.
pub const DEFAULT_SPEED_WINDOW: usize = 5;

/// Default minimum spacing between chunk progress notifications.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Shortest duration a sample may carry.
const MIN_SAMPLE_DURATION: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// SpeedEstimator
// ---------------------------------------------------------------------------

/// One completed chunk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSample {
    pub bytes: u64,
    pub duration: Duration,
}

/// Moving-average throughput over the most recent chunk transfers.
///
/// Backed by a fixed-capacity FIFO: pushing past capacity evicts the
/// oldest sample.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    samples: VecDeque<SpeedSample>,
    capacity: usize,
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_WINDOW)
    }
}

impl SpeedEstimator {
    /// Creates an estimator keeping `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a transfer of `bytes` that took `duration`.
    ///
    /// Durations under 1 ms are clamped to 1 ms.
    pub fn add_sample(&mut self, bytes: u64, duration: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(SpeedSample {
            bytes,
            duration: duration.max(MIN_SAMPLE_DURATION),
        });
    }

    /// Average rate over the window: `sum(bytes) / sum(ms) * 1000`.
    ///
    /// Returns `None` with no samples.
    pub fn bytes_per_second(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let bytes: u64 = self.samples.iter().map(|s| s.bytes).sum();
        let millis: f64 = self
            .samples
            .iter()
            .map(|s| s.duration.as_micros() as f64 / 1000.0)
            .sum();
        let rate = bytes as f64 / millis * 1000.0;
        rate.is_finite().then_some(rate)
    }

    /// Estimates the time to send `remaining_bytes`.
    ///
    /// Returns `None` when the rate is unknown or zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second()?;
        if rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining_bytes as f64 / rate).ok()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clears all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

// ---------------------------------------------------------------------------
// ProgressThrottle
// ---------------------------------------------------------------------------

/// Rate limiter for progress notifications.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` if a notification may go out at `now`.
    ///
    /// `force` always passes and restarts the interval.
    pub fn should_emit(&mut self, now: Instant, force: bool) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due || force {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Formats a byte count with binary units (`"5.0 MiB"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Formats a rate, or `"--"` when unknown.
pub fn format_speed(bytes_per_second: Option<f64>) -> String {
    match bytes_per_second {
        Some(rate) if rate.is_finite() && rate >= 0.0 => {
            format!("{}/s", format_bytes(rate.round() as u64))
        }
        _ => "--".into(),
    }
}

/// Formats a remaining time as `m:ss` or `h:mm:ss`, or `"--:--"` when unknown.
pub fn format_eta(eta: Option<Duration>) -> String {
    let Some(eta) = eta else {
        return "--:--".into();
    };
    let secs = eta.as_secs_f64().ceil() as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
