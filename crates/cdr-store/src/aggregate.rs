//! Windowed aggregation over failed-call entries.
//!
//! All five groupings are computed in one pass over the entries. The result
//! is a fresh [`AggregateSnapshot`]; nothing here holds state between calls.

use std::collections::HashMap;

use cdr_common::{
    AggregateSnapshot, CauseBucket, CauseCode, FailedCallEntry, HourBucket, RankEntry, TOP_N,
};
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

const SECS_PER_HOUR: i64 = 3600;

/// `now` without its sub-second part.
///
/// Originations are whole epoch seconds, so every cutoff is taken from a
/// whole-second reference time; the SQL bound and the in-memory comparison
/// then agree exactly.
pub fn whole_seconds(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0).unwrap_or(now)
}

/// Start of an analysis window ending at `now`.
pub fn window_cutoff(now: DateTime<Utc>, window_hours: u32) -> DateTime<Utc> {
    whole_seconds(now) - Duration::hours(i64::from(window_hours))
}

/// Entries originating strictly before this are past retention.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    whole_seconds(now) - Duration::days(i64::from(retention_days))
}

/// Aggregate the entries originating at or after the window cutoff.
///
/// Entries outside the window are ignored, so callers may pass a superset.
pub fn snapshot(
    entries: &[FailedCallEntry],
    window_hours: u32,
    now: DateTime<Utc>,
) -> AggregateSnapshot {
    let cutoff = window_cutoff(now, window_hours);
    let mut acc = Accumulator::default();
    for entry in entries.iter().filter(|e| e.origination >= cutoff) {
        acc.observe(entry);
    }
    acc.finish(window_hours, cutoff)
}

/// Running counts for one snapshot.
#[derive(Debug, Default)]
struct Accumulator {
    total: u64,
    /// code -> (reason of the first entry seen, count)
    causes: HashMap<u32, (String, u64)>,
    /// hour start (epoch seconds) -> count
    hours: HashMap<i64, u64>,
    callers: HashMap<String, u64>,
    destinations: HashMap<String, u64>,
    devices: HashMap<String, u64>,
}

impl Accumulator {
    fn observe(&mut self, entry: &FailedCallEntry) {
        self.total += 1;

        self.causes
            .entry(entry.primary_cause)
            .or_insert_with(|| (cause_reason(entry), 0))
            .1 += 1;

        let secs = entry.origination.timestamp();
        *self
            .hours
            .entry(secs - secs.rem_euclid(SECS_PER_HOUR))
            .or_insert(0) += 1;

        bump(&mut self.callers, &entry.calling_number);
        bump(&mut self.destinations, &entry.original_called_number);
        bump(&mut self.devices, &entry.orig_device);
    }

    fn finish(self, window_hours: u32, cutoff: DateTime<Utc>) -> AggregateSnapshot {
        if self.total == 0 {
            return AggregateSnapshot::empty(window_hours, cutoff);
        }

        let denominator = self.total.max(1) as f64;
        let mut by_cause: Vec<CauseBucket> = self
            .causes
            .into_iter()
            .map(|(code, (reason, count))| CauseBucket {
                code,
                reason,
                count,
                percentage: count as f64 / denominator * 100.0,
            })
            .collect();
        by_cause.sort_by(|a, b| b.count.cmp(&a.count).then(a.code.cmp(&b.code)));

        let mut by_hour: Vec<HourBucket> = self
            .hours
            .into_iter()
            .filter_map(|(secs, count)| {
                Utc.timestamp_opt(secs, 0)
                    .single()
                    .map(|hour| HourBucket { hour, count })
            })
            .collect();
        by_hour.sort_by_key(|b| b.hour);

        AggregateSnapshot {
            total_failed_calls: self.total,
            by_cause,
            by_hour,
            top_callers: rank(self.callers),
            top_destinations: rank(self.destinations),
            top_devices: rank(self.devices),
            analysis_period_hours: window_hours,
            cutoff_time: cutoff,
        }
    }
}

fn cause_reason(entry: &FailedCallEntry) -> String {
    if entry.failure_reason.is_empty() {
        CauseCode(entry.primary_cause).description()
    } else {
        entry.failure_reason.clone()
    }
}

/// Blank keys are not counted.
fn bump(counts: &mut HashMap<String, u64>, key: &str) {
    if key.trim().is_empty() {
        return;
    }
    *counts.entry(key.to_string()).or_insert(0) += 1;
}

fn rank(counts: HashMap<String, u64>) -> Vec<RankEntry> {
    let mut ranked: Vec<RankEntry> = counts
        .into_iter()
        .map(|(key, count)| RankEntry { key, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked.truncate(TOP_N);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(secs: i64, caller: &str, dest: &str, device: &str, cause: u32) -> FailedCallEntry {
        FailedCallEntry {
            call_id: format!("1-{secs}-{caller}"),
            origination: Utc.timestamp_opt(secs, 0).unwrap(),
            calling_number: caller.to_string(),
            original_called_number: dest.to_string(),
            final_called_number: dest.to_string(),
            orig_cause: 0,
            dest_cause: cause,
            primary_cause: cause,
            failure_reason: CauseCode(cause).description(),
            duration_secs: 0,
            orig_device: device.to_string(),
            dest_device: String::new(),
            orig_ip: String::new(),
            dest_ip: String::new(),
            file_fingerprint: "fp".to_string(),
        }
    }

    // 2026-01-15 10:00:00 UTC
    const BASE: i64 = 1_768_471_200;

    #[test]
    fn test_empty_window() {
        let now = Utc.timestamp_opt(BASE, 0).unwrap();
        let snap = snapshot(&[], 24, now);
        assert!(snap.is_empty());
        assert!(snap.by_cause.is_empty());
        assert!(snap.by_hour.is_empty());
        assert!(snap.top_callers.is_empty());
        assert_eq!(snap.analysis_period_hours, 24);
        assert_eq!(snap.cutoff_time, now - Duration::hours(24));
    }

    #[test]
    fn test_cause_histogram_and_percentages() {
        let now = Utc.timestamp_opt(BASE + 7200, 0).unwrap();
        let entries = vec![
            entry(BASE + 60, "1001", "2001", "SEP1", 17),
            entry(BASE + 120, "1002", "2002", "SEP2", 17),
            entry(BASE + 180, "1003", "2003", "SEP3", 17),
            entry(BASE + 240, "1004", "2004", "SEP4", 1),
        ];
        let snap = snapshot(&entries, 24, now);

        assert_eq!(snap.total_failed_calls, 4);
        assert_eq!(snap.by_cause.len(), 2);
        assert_eq!(snap.by_cause[0].code, 17);
        assert_eq!(snap.by_cause[0].count, 3);
        assert_eq!(snap.by_cause[0].reason, "User busy");
        assert!((snap.by_cause[0].percentage - 75.0).abs() < 1e-9);
        assert_eq!(snap.by_cause[1].code, 1);
        assert!((snap.by_cause[1].percentage - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cause_ties_break_on_code() {
        let now = Utc.timestamp_opt(BASE + 3600, 0).unwrap();
        let entries = vec![
            entry(BASE + 10, "a", "b", "d", 31),
            entry(BASE + 20, "a", "b", "d", 3),
        ];
        let snap = snapshot(&entries, 24, now);
        let codes: Vec<u32> = snap.by_cause.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![3, 31]);
    }

    #[test]
    fn test_hour_buckets_chronological() {
        let now = Utc.timestamp_opt(BASE + 4 * 3600, 0).unwrap();
        let entries = vec![
            entry(BASE + 2 * 3600 + 5, "a", "b", "d", 17),
            entry(BASE + 59, "a", "b", "d", 17),
            entry(BASE + 3599, "a", "b", "d", 17),
        ];
        let snap = snapshot(&entries, 24, now);

        let labels: Vec<String> = snap.by_hour.iter().map(|b| b.label()).collect();
        assert_eq!(labels, vec!["2026-01-15 10:00", "2026-01-15 12:00"]);
        assert_eq!(snap.by_hour[0].count, 2);
        assert_eq!(snap.by_hour[1].count, 1);
    }

    #[test]
    fn test_rankings_skip_blank_keys() {
        let now = Utc.timestamp_opt(BASE + 3600, 0).unwrap();
        let entries = vec![
            entry(BASE + 1, "", "2001", " ", 17),
            entry(BASE + 2, "1001", "", "SEP1", 17),
            entry(BASE + 3, "1001", "2001", "SEP1", 17),
        ];
        let snap = snapshot(&entries, 24, now);

        assert_eq!(snap.total_failed_calls, 3);
        assert_eq!(
            snap.top_callers,
            vec![RankEntry {
                key: "1001".to_string(),
                count: 2
            }]
        );
        assert_eq!(snap.top_destinations.len(), 1);
        assert_eq!(snap.top_destinations[0].count, 2);
        assert_eq!(snap.top_devices[0].key, "SEP1");
    }

    #[test]
    fn test_destinations_rank_dialed_number_not_routed_target() {
        let now = Utc.timestamp_opt(BASE + 3600, 0).unwrap();
        let forwarded = |secs: i64, dialed: &str, routed: &str| FailedCallEntry {
            original_called_number: dialed.to_string(),
            final_called_number: routed.to_string(),
            ..entry(secs, "1001", dialed, "SEP1", 17)
        };
        let entries = vec![
            forwarded(BASE + 1, "5550100", "7000"),
            forwarded(BASE + 2, "5550100", "7001"),
            forwarded(BASE + 3, "5550200", "7000"),
        ];
        let snap = snapshot(&entries, 24, now);

        assert_eq!(
            snap.top_destinations,
            vec![
                RankEntry {
                    key: "5550100".to_string(),
                    count: 2
                },
                RankEntry {
                    key: "5550200".to_string(),
                    count: 1
                },
            ]
        );
        assert!(snap.top_destinations.iter().all(|r| !r.key.starts_with("700")));
    }

    #[test]
    fn test_rankings_truncate_to_top_n() {
        let now = Utc.timestamp_opt(BASE + 3600, 0).unwrap();
        let mut entries = Vec::new();
        for i in 0..15 {
            for _ in 0..=i {
                entries.push(entry(BASE + 1, &format!("caller{i:02}"), "2001", "SEP1", 17));
            }
        }
        let snap = snapshot(&entries, 24, now);

        assert_eq!(snap.top_callers.len(), TOP_N);
        assert_eq!(snap.top_callers[0].key, "caller14");
        assert_eq!(snap.top_callers[0].count, 15);
        assert!(snap
            .top_callers
            .windows(2)
            .all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_window_excludes_older_entries() {
        let now = Utc.timestamp_opt(BASE + 48 * 3600, 0).unwrap();
        let entries = vec![
            entry(BASE, "old", "2001", "SEP1", 17),
            entry(BASE + 24 * 3600, "edge", "2001", "SEP1", 17),
            entry(BASE + 47 * 3600, "new", "2001", "SEP1", 17),
        ];
        let snap = snapshot(&entries, 24, now);
        assert_eq!(snap.total_failed_calls, 2);
        assert!(snap.top_callers.iter().all(|r| r.key != "old"));
    }

    #[test]
    fn test_cutoffs_drop_subsecond_part() {
        let now = Utc.timestamp_opt(BASE, 750_000_000).unwrap();
        assert_eq!(window_cutoff(now, 24).timestamp_subsec_nanos(), 0);
        assert_eq!(window_cutoff(now, 24).timestamp(), BASE - 24 * 3600);
        assert_eq!(retention_cutoff(now, 7).timestamp_subsec_nanos(), 0);
        assert_eq!(retention_cutoff(now, 7).timestamp(), BASE - 7 * 86_400);
    }

    #[test]
    fn test_window_edge_with_fractional_now() {
        // The entry sits exactly on the whole-second window start.
        let now = Utc.timestamp_opt(BASE + 24 * 3600, 400_000_000).unwrap();
        let entries = vec![
            entry(BASE - 1, "before", "2001", "SEP1", 17),
            entry(BASE, "edge", "2001", "SEP1", 17),
        ];
        let snap = snapshot(&entries, 24, now);
        assert_eq!(snap.total_failed_calls, 1);
        assert_eq!(snap.top_callers[0].key, "edge");
        assert_eq!(snap.cutoff_time.timestamp(), BASE);
    }
}
