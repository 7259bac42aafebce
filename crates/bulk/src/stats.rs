use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use cdr_runtime::STATS_INTERVAL;

/// Render `n` with `,` between groups of three digits.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// One progress line: total items, non-zero result counts and the rate of
/// `items - prev_items` over `elapsed`.
pub fn format_stats(
    items: usize,
    prev_items: usize,
    elapsed: Duration,
    counts: &BTreeMap<String, usize>,
) -> String {
    let breakdown = counts
        .iter()
        .filter(|(_, n)| **n != 0)
        .map(|(kind, n)| format!("{kind}: {}", group_thousands(*n)))
        .collect::<Vec<_>>()
        .join(", ");

    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        items.saturating_sub(prev_items) as f64 / secs
    } else {
        0.0
    };

    format!(
        "{} items processed ({breakdown}) at {rate:.0} items/s",
        group_thousands(items)
    )
}

/// Emits a progress line at most once per interval, plus a final summary
/// over the whole run.
#[derive(Debug)]
pub struct StatsReporter {
    interval: Duration,
    started: Instant,
    window_start: Instant,
    window_items: usize,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new(STATS_INTERVAL)
    }
}

impl StatsReporter {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
            window_start: now,
            window_items: 0,
        }
    }

    pub fn observe(&mut self, items: usize, counts: &BTreeMap<String, usize>) -> Option<String> {
        self.observe_at(Instant::now(), items, counts)
    }

    /// Returns a line once more than the interval passed since the last one.
    pub fn observe_at(
        &mut self,
        now: Instant,
        items: usize,
        counts: &BTreeMap<String, usize>,
    ) -> Option<String> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed <= self.interval {
            return None;
        }

        let line = format_stats(items, self.window_items, elapsed, counts);
        self.window_start = now;
        self.window_items = items;
        Some(line)
    }

    pub fn finish(&self, items: usize, counts: &BTreeMap<String, usize>) -> String {
        self.finish_at(Instant::now(), items, counts)
    }

    /// Summary over the whole run, regardless of intermediate lines.
    pub fn finish_at(&self, now: Instant, items: usize, counts: &BTreeMap<String, usize>) -> String {
        format_stats(items, 0, now.saturating_duration_since(self.started), counts)
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
