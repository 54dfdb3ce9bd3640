use crate::date_util::round2;
use crate::metrics::types::TimeStats;

/// Average, median and nearest-rank 95th percentile of `samples`.
///
/// Only the average is rounded. Empty input yields zeros.
pub fn time_stats(samples: &[f64]) -> TimeStats {
    if samples.is_empty() {
        return TimeStats::default();
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    let average = round2(sorted.iter().sum::<f64>() / n as f64);

    #[allow(clippy::manual_is_multiple_of)]
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    TimeStats {
        average,
        median,
        p95: nearest_rank(&sorted, 0.95),
    }
}

/// Element at `round(q * (n - 1))` of an ascending, non-empty slice.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let idx = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
