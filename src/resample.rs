use std::time::{Duration, Instant};

/// A reading plotted on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub at: Instant,
    pub value: f64,
}

/// Bin irregularly spaced points into `num_bins` equal slices of
/// `(start, end]`, keeping the largest value in each slice. Empty slices are
/// `None` so the sparkline can draw them as gaps.
pub fn resample(points: &[Point], start: Instant, end: Instant, num_bins: usize) -> Vec<Option<f64>> {
    let mut bins = vec![None; num_bins];
    let span = end.saturating_duration_since(start);
    if num_bins == 0 || span.is_zero() {
        return bins;
    }
    let bin_nanos = (span.as_nanos() / num_bins as u128).max(1);

    for point in points {
        if point.at <= start || point.at > end {
            continue;
        }
        let offset = point.at.duration_since(start).as_nanos();
        let index = (((offset - 1) / bin_nanos) as usize).min(num_bins - 1);
        let slot: &mut Option<f64> = &mut bins[index];
        *slot = Some(slot.map_or(point.value, |v| v.max(point.value)));
    }
    bins
}

/// The window a dashboard panel shows, ending now.
pub fn window(now: Instant, width: Duration) -> (Instant, Instant) {
    (now.checked_sub(width).unwrap_or(now), now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(now: Instant, samples: &[(u64, f64)]) -> Vec<Point> {
        samples
            .iter()
            .map(|&(ms, value)| Point {
                at: now + Duration::from_millis(ms),
                value,
            })
            .collect()
    }

    macro_rules! resample_tests {
        ($($name:ident: ($samples:expr, $start:expr, $end:expr, $bins:expr) => $expected:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let now = Instant::now();
                    let result = resample(
                        &points(now, &$samples),
                        now + Duration::from_millis($start),
                        now + Duration::from_millis($end),
                        $bins,
                    );
                    let expected: Vec<Option<f64>> = $expected;
                    assert_eq!(result, expected, stringify!($name));
                }
            )*
        }
    }

    resample_tests! {
        one_point_per_bin: ([(50, 40.0), (150, 41.0), (250, 43.5), (350, 42.0)], 0, 400, 4)
            => vec![Some(40.0), Some(41.0), Some(43.5), Some(42.0)],
        point_on_window_start_is_excluded: ([(0, 10.0)], 0, 100, 4)
            => vec![None; 4],
        point_on_window_end_is_included: ([(100, 88.75)], 0, 100, 4)
            => vec![None, None, None, Some(88.75)],
        points_outside_the_window: ([(50, 1.0), (250, 2.0)], 100, 200, 3)
            => vec![None; 3],
        busiest_reading_wins_a_bin: ([(10, 81.25), (20, 88.75), (22, 60.0)], 0, 100, 4)
            => vec![Some(88.75), None, None, None],
        gaps_stay_empty: ([(10, 5.0), (50, 15.0), (90, 25.0), (160, 35.0), (170, 45.0)], 0, 200, 4)
            => vec![Some(15.0), Some(25.0), None, Some(45.0)],
        no_bins: ([(10, 5.0)], 0, 100, 0)
            => vec![],
        empty_window: ([(10, 5.0)], 100, 100, 2)
            => vec![None; 2],
    }

    #[test]
    fn window_ends_now() {
        let now = Instant::now();
        let (start, end) = window(now, Duration::from_secs(120));
        assert_eq!(end, now);
        assert!(end.duration_since(start) <= Duration::from_secs(120));
    }
}
