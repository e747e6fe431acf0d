//! Interval fuzz.
//!
//! Review intervals of 2.5 days or more are spread over a small window so
//! words added together do not keep coming due on the same day.

use rand::Rng;

/// (start, end, factor): each band widens the window by `factor` per day of
/// interval that falls inside it.
const FUZZ_RANGES: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.1),
    (20.0, f64::INFINITY, 0.05),
];

const MIN_FUZZ_INTERVAL: f64 = 2.5;

/// Inclusive window of whole days a fuzzed interval may land in.
pub fn fuzz_range(interval: f64, elapsed_days: f64, maximum_interval: u32) -> (u32, u32) {
    let delta = FUZZ_RANGES
        .iter()
        .fold(1.0, |acc, &(start, end, factor)| {
            acc + factor * (interval.min(end) - start).max(0.0)
        });

    let maximum = f64::from(maximum_interval);
    let interval = interval.min(maximum);
    let mut min_ivl = (interval - delta).round().max(2.0);
    let max_ivl = (interval + delta).round().min(maximum);
    if interval > elapsed_days {
        min_ivl = min_ivl.max(elapsed_days.floor() + 1.0);
    }
    let min_ivl = min_ivl.min(max_ivl);

    (min_ivl as u32, max_ivl as u32)
}

/// Pick an interval inside the fuzz window. Short intervals pass through.
pub fn fuzz_interval<R: Rng + ?Sized>(
    interval: f64,
    elapsed_days: f64,
    maximum_interval: u32,
    rng: &mut R,
) -> f64 {
    if interval < MIN_FUZZ_INTERVAL {
        return interval;
    }
    let (lo, hi) = fuzz_range(interval, elapsed_days, maximum_interval);
    f64::from(rng.gen_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn short_intervals_are_untouched() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(fuzz_interval(1.0, 0.0, 36500, &mut rng), 1.0);
        assert_eq!(fuzz_interval(2.0, 0.0, 36500, &mut rng), 2.0);
    }

    #[test]
    fn window_grows_with_interval() {
        let (lo, hi) = fuzz_range(10.0, 0.0, 36500);
        assert!(lo < 10 && hi > 10);
        let (lo_big, hi_big) = fuzz_range(100.0, 0.0, 36500);
        assert!(hi_big - lo_big > hi - lo);
    }

    #[test]
    fn window_respects_maximum() {
        let (lo, hi) = fuzz_range(400.0, 0.0, 365);
        assert!(hi <= 365);
        assert!(lo <= hi);
    }

    #[test]
    fn fuzzed_interval_stays_in_window() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let ivl = fuzz_interval(30.0, 0.0, 36500, &mut rng);
            let (lo, hi) = fuzz_range(30.0, 0.0, 36500);
            assert!(ivl >= f64::from(lo) && ivl <= f64::from(hi));
        }
    }
}
