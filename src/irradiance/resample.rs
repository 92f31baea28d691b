use chrono::{DateTime, Duration, DurationRound, TimeDelta, Utc};

/// Minutes covered by each source sample past its own timestamp.
const SAMPLE_TAIL_MINUTES: i64 = 59;

/// One-minute UTC grid from `first` to `last` plus the last sample's hour.
pub fn minute_grid(first: DateTime<Utc>, last: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let end = last + Duration::minutes(SAMPLE_TAIL_MINUTES);
    let minutes = (end - first).num_minutes().max(0);
    (0..=minutes).map(|m| first + Duration::minutes(m)).collect()
}

/// Holds the latest known value over the grid.
///
/// `samples` must be sorted by time. A sample without a value keeps the previous
/// one alive; grid points before the first known value come out as `NaN`.
pub fn forward_fill(samples: &[(DateTime<Utc>, Option<f64>)], grid: &[DateTime<Utc>]) -> Vec<f64> {
    let mut filled = Vec::with_capacity(grid.len());
    let mut next = 0;
    let mut current = f64::NAN;
    for time in grid {
        while next < samples.len() && samples[next].0 <= *time {
            if let Some(value) = samples[next].1 {
                current = value;
            }
            next += 1;
        }
        filled.push(current);
    }
    filled
}

/// Means per UTC hour, labeled with the start of the hour.
///
/// Non finite values count as zero.
pub fn hourly_mean(grid: &[DateTime<Utc>], values: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
    let mut hours: Vec<(DateTime<Utc>, f64, usize)> = Vec::new();
    for (time, value) in grid.iter().zip(values) {
        let hour = time.duration_trunc(TimeDelta::hours(1)).unwrap_or(*time);
        let value = if value.is_finite() { *value } else { 0.0 };
        match hours.last_mut() {
            Some((start, sum, count)) if *start == hour => {
                *sum += value;
                *count += 1;
            }
            _ => hours.push((hour, value, 1)),
        }
    }
    hours
        .into_iter()
        .map(|(hour, sum, count)| (hour, sum / count as f64))
        .collect()
}
