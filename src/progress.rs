//! Throttled download progress reporting.

use std::fmt;
use std::time::{Duration, Instant};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Default minimum time between two progress lines.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Scale a byte count into the largest unit below 1024.
pub fn format_bytes(n: f64) -> (f64, &'static str) {
    let mut value = n;
    let mut idx = 0;
    while value >= 1024.0 && idx < UNITS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    (value, UNITS[idx])
}

/// One progress sample worth logging.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub downloaded: u64,
    pub total: Option<u64>,
    /// Bytes per second since the previous report.
    pub speed: f64,
}

impl ProgressReport {
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|t| *t > 0)
            .map(|t| self.downloaded as f64 * 100.0 / t as f64)
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (cur, cur_unit) = format_bytes(self.downloaded as f64);
        let (spd, spd_unit) = format_bytes(self.speed);
        match (self.total, self.percent()) {
            (Some(total), Some(percent)) => {
                let (tot, tot_unit) = format_bytes(total as f64);
                write!(
                    f,
                    "progress: {:.2} {}/{:.2} {} ({:.1}%) at {:.2} {}",
                    cur, cur_unit, tot, tot_unit, percent, spd, spd_unit
                )
            }
            _ => write!(
                f,
                "progress: {:.2} {} at {:.2} {}",
                cur, cur_unit, spd, spd_unit
            ),
        }
    }
}

/// Emits at most one report per interval.
///
/// The first sample only sets the baseline. Speed is measured between
/// consecutive reports.
#[derive(Debug)]
pub struct ProgressLog {
    total: Option<u64>,
    interval: Duration,
    last: Option<(Instant, u64)>,
}

impl ProgressLog {
    pub fn new(total: Option<u64>, interval: Duration) -> Self {
        Self {
            total,
            interval,
            last: None,
        }
    }

    /// Record `downloaded` bytes at `now`; returns a report when one is due.
    pub fn update(&mut self, downloaded: u64, now: Instant) -> Option<ProgressReport> {
        let Some((last_t, last_b)) = self.last else {
            self.last = Some((now, downloaded));
            return None;
        };

        let elapsed = now.saturating_duration_since(last_t);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }

        let speed = downloaded.saturating_sub(last_b) as f64 / elapsed.as_secs_f64();
        self.last = Some((now, downloaded));
        Some(ProgressReport {
            downloaded,
            total: self.total,
            speed,
        })
    }
}
