//! Bucketing and trend computation over drink log records.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use super::range::{first_of_month, shift_month, AnalyticsRange, Granularity};
use super::{AnalyticsResult, AnalyticsTotals, AnalyticsTrends, ConsumptionBucket, TrendDirection};
use crate::types::DrinkLogRecord;

/// Ordered buckets with key lookup.
struct BucketSet {
    buckets: Vec<ConsumptionBucket>,
    index: HashMap<String, usize>,
}

impl BucketSet {
    fn with_capacity(n: usize) -> Self {
        Self {
            buckets: Vec::with_capacity(n),
            index: HashMap::with_capacity(n),
        }
    }

    fn push(&mut self, key: String, label: String) {
        self.index.insert(key.clone(), self.buckets.len());
        self.buckets.push(ConsumptionBucket {
            label,
            key,
            count: 0,
            pure_alcohol_ml: 0.0,
        });
    }

    fn add(&mut self, key: &str, pure_alcohol_ml: f64) -> bool {
        match self.index.get(key) {
            Some(&i) => {
                let bucket = &mut self.buckets[i];
                bucket.count += 1;
                bucket.pure_alcohol_ml += pure_alcohol_ml;
                true
            }
            None => false,
        }
    }
}

/// Every bucket of `range` at `now`, zero-filled, oldest first.
fn empty_buckets<Tz: TimeZone>(range: AnalyticsRange, now: &DateTime<Tz>) -> BucketSet {
    let today = now.date_naive();
    let mut set = BucketSet::with_capacity(range.bucket_count());

    match range.granularity() {
        Granularity::Hour => {
            for hour in 0..24 {
                set.push(hour.to_string(), format!("{}:00", hour));
            }
        }
        Granularity::Day => {
            for offset in (0..range.bucket_count() as i64).rev() {
                let day = today - Duration::days(offset);
                set.push(
                    day.format("%Y-%m-%d").to_string(),
                    day.format("%a").to_string(),
                );
            }
        }
        Granularity::Month => {
            for back in (0..range.bucket_count() as i32).rev() {
                let (year, month) = shift_month(today.year(), today.month(), -back);
                set.push(
                    format!("{:04}-{:02}", year, month),
                    first_of_month(year, month).format("%b %y").to_string(),
                );
            }
        }
    }

    set
}

fn bucket_key<Tz: TimeZone>(granularity: Granularity, ts: DateTime<Utc>, tz: &Tz) -> String {
    let local = ts.with_timezone(tz);
    match granularity {
        Granularity::Hour => local.hour().to_string(),
        Granularity::Day => local.date_naive().format("%Y-%m-%d").to_string(),
        Granularity::Month => format!("{:04}-{:02}", local.year(), local.month()),
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// (mean, max) hours between consecutive timestamps; zeros with fewer than two.
fn gap_stats(mut times: Vec<DateTime<Utc>>) -> (f64, f64) {
    if times.len() < 2 {
        return (0.0, 0.0);
    }
    times.sort();
    let gaps: Vec<f64> = times
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let max = gaps.iter().copied().fold(0.0, f64::max);
    (round_one_decimal(mean), round_one_decimal(max))
}

/// Compute bucketed analytics for `range` as of `now`.
///
/// Hours, days, weekday labels and months are evaluated in `now`'s
/// timezone. Records outside the range window are ignored, so bucket counts
/// always add up to `totals.total_drinks`.
pub fn compute_analytics<Tz: TimeZone>(
    range: AnalyticsRange,
    records: &[DrinkLogRecord],
    now: DateTime<Tz>,
) -> AnalyticsResult {
    let tz = now.timezone();
    let window = range.window(&now);
    let granularity = range.granularity();
    let mut buckets = empty_buckets(range, &now);

    let in_window: Vec<&DrinkLogRecord> = records
        .iter()
        .filter(|record| window.contains(record.created_at))
        .collect();

    let mut total_pure_alcohol_ml = 0.0;
    for record in &in_window {
        let ml = record.pure_alcohol_ml();
        total_pure_alcohol_ml += ml;
        let key = bucket_key(granularity, record.created_at, &tz);
        if !buckets.add(&key, ml) {
            tracing::warn!(id = %record.id, key = %key, "In-window record matched no bucket");
        }
    }

    let (prev_start, prev_end) = window.previous_period();
    let previous: Vec<&DrinkLogRecord> = records
        .iter()
        .filter(|record| record.created_at >= prev_start && record.created_at < prev_end)
        .collect();

    let total_drinks = in_window.len() as u32;
    let previous_period_drinks = previous.len() as u32;
    let (avg_hours_between_drinks, longest_gap_hours) =
        gap_stats(in_window.iter().map(|record| record.created_at).collect());

    tracing::debug!(
        range = %range,
        records = records.len(),
        in_window = total_drinks,
        previous = previous_period_drinks,
        "Computed analytics"
    );

    AnalyticsResult {
        buckets: buckets.buckets,
        totals: AnalyticsTotals {
            total_drinks,
            total_pure_alcohol_ml,
        },
        trends: AnalyticsTrends {
            direction: TrendDirection::compare(total_drinks, previous_period_drinks),
            current_period_drinks: total_drinks,
            previous_period_drinks,
            previous_period_pure_alcohol_ml: previous
                .iter()
                .map(|record| record.pure_alcohol_ml())
                .sum(),
            avg_hours_between_drinks,
            longest_gap_hours,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn record(at: DateTime<Utc>, ml: f64) -> DrinkLogRecord {
        DrinkLogRecord {
            id: uuid::Uuid::new_v4().to_string(),
            label: "Beer".to_string(),
            created_at: at,
            volume_ml: None,
            abv_percent: None,
            pure_alcohol_ml: Some(ml),
            estimated_bac_contribution: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 22, 0, 0).unwrap()
    }

    fn bucket_sum(result: &AnalyticsResult) -> u32 {
        result.buckets.iter().map(|b| b.count).sum()
    }

    #[test]
    fn test_empty_records_zero_filled() {
        let expected = [
            (AnalyticsRange::OneDay, 24),
            (AnalyticsRange::OneWeek, 7),
            (AnalyticsRange::OneMonth, 30),
            (AnalyticsRange::OneYear, 12),
            (AnalyticsRange::All, 12),
        ];
        for (range, count) in expected {
            let result = compute_analytics(range, &[], now());
            assert_eq!(result.buckets.len(), count, "{}", range);
            assert!(result.buckets.iter().all(|b| b.count == 0));
            assert_eq!(result.totals.total_drinks, 0);
            assert_eq!(result.trends.direction, TrendDirection::Same);
            assert_eq!(result.trends.avg_hours_between_drinks, 0.0);
            assert_eq!(result.trends.longest_gap_hours, 0.0);
        }
    }

    #[test]
    fn test_week_buckets_and_trend() {
        let records = vec![
            record(now() - Duration::hours(1), 17.75),
            record(now() - Duration::hours(3), 17.75),
            record(now() - Duration::days(8), 17.75),
        ];
        let result = compute_analytics(AnalyticsRange::OneWeek, &records, now());

        assert_eq!(result.buckets.len(), 7);
        assert_eq!(result.buckets[6].key, "2026-10-17");
        assert_eq!(result.buckets[6].label, "Sat");
        assert_eq!(result.buckets[6].count, 2);
        assert_eq!(result.buckets[0].key, "2026-10-11");
        assert_eq!(result.totals.total_drinks, 2);
        assert!((result.totals.total_pure_alcohol_ml - 35.5).abs() < 1e-9);
        assert_eq!(bucket_sum(&result), 2);

        assert_eq!(result.trends.previous_period_drinks, 1);
        assert_eq!(result.trends.direction, TrendDirection::Up);
        assert_eq!(result.trends.avg_hours_between_drinks, 2.0);
        assert_eq!(result.trends.longest_gap_hours, 2.0);
    }

    #[test]
    fn test_hour_buckets_in_numeric_order() {
        let records = vec![
            record(now() - Duration::minutes(30), 10.0),
            record(now() - Duration::hours(12), 10.0),
            record(now() - Duration::hours(30), 10.0),
        ];
        let result = compute_analytics(AnalyticsRange::OneDay, &records, now());
        let keys: Vec<&str> = result.buckets.iter().map(|b| b.key.as_str()).collect();
        let expected: Vec<String> = (0..24).map(|h| h.to_string()).collect();
        assert_eq!(keys, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(result.buckets[21].count, 1);
        assert_eq!(result.buckets[21].label, "21:00");
        assert_eq!(result.buckets[10].count, 1);
        assert_eq!(result.totals.total_drinks, 2);
        assert_eq!(result.trends.previous_period_drinks, 1);
        assert_eq!(result.trends.direction, TrendDirection::Up);
    }

    #[test]
    fn test_month_buckets() {
        let records = vec![
            record(Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(), 14.0),
            record(Utc.with_ymd_and_hms(2026, 3, 15, 20, 0, 0).unwrap(), 14.0),
            record(Utc.with_ymd_and_hms(2025, 10, 31, 23, 59, 0).unwrap(), 14.0),
        ];
        let result = compute_analytics(AnalyticsRange::OneYear, &records, now());
        assert_eq!(result.buckets.len(), 12);
        assert_eq!(result.buckets[0].key, "2025-11");
        assert_eq!(result.buckets[0].label, "Nov 25");
        assert_eq!(result.buckets[0].count, 1);
        assert_eq!(result.buckets[11].key, "2026-10");
        assert_eq!(result.buckets[4].key, "2026-03");
        assert_eq!(result.buckets[4].count, 1);
        assert_eq!(result.totals.total_drinks, 2);
        assert_eq!(bucket_sum(&result), 2);

        let all = compute_analytics(AnalyticsRange::All, &records, now());
        assert_eq!(all, result);
    }

    #[test]
    fn test_bucket_sum_matches_total_for_every_range() {
        let records: Vec<DrinkLogRecord> = (0..400)
            .map(|i| record(now() - Duration::hours(i * 23 + 1), 14.0))
            .collect();
        for range in AnalyticsRange::ALL {
            let result = compute_analytics(range, &records, now());
            assert_eq!(bucket_sum(&result), result.totals.total_drinks, "{}", range);
            assert_eq!(result.buckets.len(), range.bucket_count());
            assert!(result.buckets.windows(2).all(|w| w[0].key != w[1].key));
        }
    }

    #[test]
    fn test_local_timezone_shifts_day_bucket() {
        // 02:00 UTC on the 17th is still the 16th five hours west
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let local_now = now().with_timezone(&tz);
        let records = vec![record(Utc.with_ymd_and_hms(2026, 10, 17, 2, 0, 0).unwrap(), 14.0)];

        let utc = compute_analytics(AnalyticsRange::OneWeek, &records, now());
        assert_eq!(utc.buckets[6].count, 1);

        let local = compute_analytics(AnalyticsRange::OneWeek, &records, local_now);
        assert_eq!(local.buckets[5].key, "2026-10-16");
        assert_eq!(local.buckets[5].count, 1);
    }

    #[test]
    fn test_gap_stats_rounding() {
        let base = now() - Duration::hours(10);
        let times = vec![
            base,
            base + Duration::minutes(20),
            base + Duration::minutes(20) + Duration::minutes(100),
        ];
        // gaps 0.333h and 1.667h
        assert_eq!(gap_stats(times), (1.0, 1.7));
        assert_eq!(gap_stats(vec![base]), (0.0, 0.0));
    }
}
