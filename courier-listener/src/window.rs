//! Query-window planning for one poll cycle.
//!
//! The window is derived from the watermark (end of the last successful
//! cycle) and the cycle's `now` snapshot:
//!
//! ```text
//! prev     = sanitize(watermark, now)
//! interval = clamp(now - prev, min_interval, max_interval)
//! after    = max(prev - interval × overlap_factor, now - max_lookback)
//! window   = [min(after, now), now)
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};

use courier_core::{ListenerSettings, TimeWindow};

/// Why the watermark was replaced before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkClamp {
    /// Non-positive or in the future; reset to `now`.
    Invalid,
    /// Older than the lookback cap; pulled forward to `now - max_lookback`.
    TooOld,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPlan {
    pub window: TimeWindow,
    pub interval: Duration,
    pub overlap: Duration,
    pub clamp: Option<WatermarkClamp>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub overlap_factor: f64,
    pub max_lookback: Duration,
}

impl From<&ListenerSettings> for WindowPolicy {
    fn from(settings: &ListenerSettings) -> Self {
        Self {
            min_interval: settings.min_interval(),
            max_interval: settings.max_interval(),
            overlap_factor: settings.overlap_factor,
            max_lookback: settings.max_lookback(),
        }
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::from(&ListenerSettings::default())
    }
}

impl WindowPolicy {
    pub fn sanitize(
        &self,
        watermark: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, Option<WatermarkClamp>) {
        if watermark.timestamp_millis() <= 0 || watermark > now {
            return (now, Some(WatermarkClamp::Invalid));
        }
        let floor = back(now, self.max_lookback);
        if watermark < floor {
            return (floor, Some(WatermarkClamp::TooOld));
        }
        (watermark, None)
    }

    pub fn interval(&self, elapsed: Duration) -> Duration {
        let max = self.max_interval.max(self.min_interval);
        elapsed.clamp(self.min_interval, max)
    }

    pub fn plan(&self, watermark: DateTime<Utc>, now: DateTime<Utc>) -> PollPlan {
        let (prev, clamp) = self.sanitize(watermark, now);
        let elapsed = (now - prev).to_std().unwrap_or(Duration::ZERO);
        let interval = self.interval(elapsed);
        let overlap = interval.mul_f64(self.overlap_factor.max(0.0));

        let floor = back(now, self.max_lookback);
        let after = back(prev, overlap).max(floor).min(now);

        PollPlan {
            window: TimeWindow::new(after, now),
            interval,
            overlap,
            clamp,
        }
    }
}

fn back(from: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| from.checked_sub_signed(by))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
