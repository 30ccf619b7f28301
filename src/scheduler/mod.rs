//! Periodic aggregation loop.

pub mod shutdown;

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::app::{GatorError, Result};
use crate::pipeline::{CycleReport, IngestionPipeline};
use shutdown::Shutdown;

/// Runs one ingestion cycle immediately, then one per interval until stopped.
///
/// Cycles never overlap. A cycle that overruns the interval delays the next
/// tick rather than triggering a burst of catch-up cycles.
pub struct Scheduler {
    pipeline: IngestionPipeline,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: IngestionPipeline, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Loop until `shutdown` fires. Returns the number of cycles started.
    pub async fn run(&self, mut shutdown: Shutdown) -> u64 {
        tracing::info!(interval = %format_interval(self.interval), "scheduler started");

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = timer.tick() => {}
            }

            let report = self.pipeline.run_one_cycle(&mut shutdown).await;
            cycles += 1;
            log_report(&report);
        }

        tracing::info!(cycles, "scheduler stopped");
        cycles
    }
}

fn log_report(report: &CycleReport) {
    match report {
        CycleReport::NoFeeds => tracing::info!("no feeds to fetch"),
        CycleReport::Completed(summary) => {
            tracing::info!(
                feed_id = summary.feed_id,
                url = %summary.feed_url,
                created = summary.created,
                duplicates = summary.duplicates,
                failures = summary.failures.len(),
                "feed updated"
            );
            for failure in &summary.failures {
                tracing::warn!(
                    index = failure.index,
                    link = %failure.link,
                    error = %failure.error,
                    "item not stored"
                );
            }
        }
        CycleReport::FeedFailed(failure) => {
            tracing::error!(
                feed_id = ?failure.feed_id,
                url = ?failure.feed_url,
                stage = ?failure.stage,
                error = %failure.error,
                "feed update failed"
            );
        }
    }
}

/// Parse a duration like `30s`, `1m`, `1h30m` or `500ms`. A bare number is
/// seconds. Zero is rejected.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let s = input.trim().to_lowercase();
    let invalid = || {
        GatorError::InvalidInterval(format!(
            "{}. Use a format like '30s', '1m', '1h30m'",
            input.trim()
        ))
    };

    if s.is_empty() {
        return Err(invalid());
    }

    let total = if let Ok(secs) = s.parse::<u64>() {
        Duration::from_secs(secs)
    } else {
        let mut total = Duration::ZERO;
        let mut rest = s.as_str();

        while !rest.is_empty() {
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            if digits == 0 {
                return Err(invalid());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
            rest = &rest[digits..];

            let unit_len = rest
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(rest.len());
            let unit = &rest[..unit_len];
            rest = &rest[unit_len..];

            let part = match unit {
                "ms" => Some(Duration::from_millis(value)),
                "s" => Some(Duration::from_secs(value)),
                "m" => value.checked_mul(60).map(Duration::from_secs),
                "h" => value.checked_mul(3600).map(Duration::from_secs),
                "d" => value.checked_mul(86400).map(Duration::from_secs),
                _ => None,
            }
            .ok_or_else(invalid)?;

            total = total.checked_add(part).ok_or_else(invalid)?;
        }

        total
    };

    if total.is_zero() {
        return Err(invalid());
    }
    Ok(total)
}

/// Format an interval for display, largest unit first.
pub fn format_interval(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs == 0 {
        return format!("{}ms", millis);
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86400), ("h", 3600), ("m", 60)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    if secs > 0 {
        out.push_str(&format!("{}s", secs));
    }
    if millis > 0 {
        out.push_str(&format!("{}ms", millis));
    }
    out
}
