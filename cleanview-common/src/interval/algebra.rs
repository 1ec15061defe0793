//! Interval algebra: overlap, merge, subtract, buffer and keep-segment inversion
//!
//! All functions are pure. Inputs are never mutated and results are sorted by
//! start time.

use super::{metadata_order, Action, TimeInterval};
use std::cmp::Ordering;

/// Gap-tolerant overlap test.
///
/// True iff `a.start <= b.end + gap` and `b.start <= a.end + gap`, so touching
/// endpoints overlap even with a zero gap.
pub fn overlaps(a: &TimeInterval, b: &TimeInterval, gap: f64) -> bool {
    let gap = gap.max(0.0);
    a.start <= b.end + gap && b.start <= a.end + gap
}

/// Total order used before every sweep so results do not depend on input order
fn sweep_order(a: &TimeInterval, b: &TimeInterval) -> Ordering {
    a.start
        .total_cmp(&b.start)
        .then_with(|| a.end.total_cmp(&b.end))
        .then_with(|| a.reason.cmp(&b.reason))
        .then_with(|| a.action.precedence().cmp(&b.action.precedence()))
        .then_with(|| a.source.as_str().cmp(b.source.as_str()))
        .then_with(|| metadata_order(&a.metadata, &b.metadata))
}

/// Sort and sweep-merge intervals whose gap is at most `gap`.
///
/// Every gap-tolerant overlapping run collapses to exactly one covering
/// interval; disjoint inputs pass through sorted.
pub fn merge_intervals(intervals: &[TimeInterval], gap: f64) -> Vec<TimeInterval> {
    if intervals.is_empty() {
        return Vec::new();
    }

    let mut sorted = intervals.to_vec();
    sorted.sort_by(sweep_order);

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());
    let mut iter = sorted.into_iter();
    let Some(mut current) = iter.next() else {
        return merged;
    };

    for next in iter {
        if overlaps(&current, &next, gap) {
            current = current.merge(&next);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);

    merged
}

/// Remove every cut span from every base interval.
///
/// Each base interval is split around each overlapping cut in turn; pieces
/// keep the base interval's classification. Cuts that merely touch a base
/// interval remove nothing.
pub fn subtract_intervals(base: &[TimeInterval], cuts: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut result = Vec::new();

    for interval in base {
        let mut pieces = vec![interval.clone()];

        for cut in cuts {
            let mut next_pieces = Vec::with_capacity(pieces.len() + 1);
            for piece in pieces {
                if cut.start >= piece.end || cut.end <= piece.start {
                    next_pieces.push(piece);
                    continue;
                }
                if cut.start > piece.start {
                    next_pieces.push(piece.with_bounds(piece.start, cut.start));
                }
                if cut.end < piece.end {
                    next_pieces.push(piece.with_bounds(cut.end, piece.end));
                }
            }
            pieces = next_pieces;
        }

        result.extend(pieces);
    }

    result.sort_by(sweep_order);
    result
}

/// Invert cut intervals against `[0, duration]`.
///
/// Cuts are merged first (zero gap) and clamped to the range. Keep segments
/// shorter than `min_duration` are dropped. With no cuts the whole range is
/// returned as a single keep segment.
pub fn compute_keep_segments(
    duration: f64,
    cuts: &[TimeInterval],
    min_duration: f64,
) -> Vec<TimeInterval> {
    let duration = duration.max(0.0);
    let keep = |start: f64, end: f64| TimeInterval {
        start,
        end,
        reason: "keep".to_string(),
        action: Action::None,
        source: super::MatchSource::Unknown,
        metadata: Default::default(),
    };

    if cuts.is_empty() {
        return vec![keep(0.0, duration)];
    }

    let mut segments = Vec::new();
    let mut cursor = 0.0_f64;

    for cut in merge_intervals(cuts, 0.0) {
        let cut_start = cut.start.clamp(0.0, duration);
        let cut_end = cut.end.clamp(0.0, duration);
        if cut_start > cursor {
            segments.push(keep(cursor, cut_start));
        }
        cursor = cursor.max(cut_end);
    }

    if cursor < duration {
        segments.push(keep(cursor, duration));
    }

    segments
        .into_iter()
        .filter(|segment| segment.duration() >= min_duration)
        .collect()
}

/// Expand every interval by `before`/`after` seconds, clamped to
/// `[0, max_duration]` (upper bound only when given).
pub fn add_buffer_to_intervals(
    intervals: &[TimeInterval],
    before: f64,
    after: f64,
    max_duration: Option<f64>,
) -> Vec<TimeInterval> {
    intervals
        .iter()
        .map(|interval| {
            let start = (interval.start - before.max(0.0)).max(0.0);
            let mut end = interval.end + after.max(0.0);
            if let Some(max) = max_duration {
                end = end.min(max);
            }
            interval.with_bounds(start.min(end), end)
        })
        .collect()
}

/// Sum of the durations after merging, so overlaps count once
pub fn total_duration(intervals: &[TimeInterval]) -> f64 {
    merge_intervals(intervals, 0.0)
        .iter()
        .map(TimeInterval::duration)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: f64, end: f64) -> TimeInterval {
        TimeInterval::new(start, end, "test").unwrap()
    }

    fn bounds(intervals: &[TimeInterval]) -> Vec<(f64, f64)> {
        intervals.iter().map(|i| (i.start, i.end)).collect()
    }

    #[test]
    fn test_overlaps_touching_endpoints() {
        assert!(overlaps(&iv(0.0, 5.0), &iv(5.0, 6.0), 0.0));
        assert!(!overlaps(&iv(0.0, 5.0), &iv(5.5, 6.0), 0.0));
        assert!(overlaps(&iv(0.0, 5.0), &iv(5.5, 6.0), 0.5));
        assert!(overlaps(&iv(5.5, 6.0), &iv(0.0, 5.0), 0.5));
    }

    #[test]
    fn test_merge_intervals_collapses_runs() {
        let input = vec![iv(0.0, 1.0), iv(1.2, 2.0), iv(10.0, 11.0), iv(1.9, 3.0)];
        let merged = merge_intervals(&input, 0.5);
        assert_eq!(bounds(&merged), vec![(0.0, 3.0), (10.0, 11.0)]);
    }

    #[test]
    fn test_merge_intervals_permutation_invariant() {
        let a = vec![iv(4.0, 6.0), iv(0.0, 1.0), iv(5.0, 9.0), iv(20.0, 21.0), iv(1.5, 2.0)];
        let mut b = a.clone();
        b.reverse();
        let mut c = a.clone();
        c.rotate_left(2);

        let ma = merge_intervals(&a, 0.5);
        assert_eq!(ma, merge_intervals(&b, 0.5));
        assert_eq!(ma, merge_intervals(&c, 0.5));

        // Ties on everything except metadata
        let low = iv(30.0, 31.0).with_metadata("score", serde_json::json!(1.0));
        let high = iv(30.0, 31.0).with_metadata("score", serde_json::json!(2.0));
        let forward = merge_intervals(&[low.clone(), high.clone()], 0.0);
        let backward = merge_intervals(&[high, low], 0.0);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].metadata["score"], serde_json::json!(2.0));
    }

    #[test]
    fn test_merge_intervals_disjoint_pass_through_sorted() {
        let merged = merge_intervals(&[iv(8.0, 9.0), iv(0.0, 1.0), iv(4.0, 5.0)], 0.0);
        assert_eq!(bounds(&merged), vec![(0.0, 1.0), (4.0, 5.0), (8.0, 9.0)]);
    }

    #[test]
    fn test_merge_intervals_empty() {
        assert!(merge_intervals(&[], 1.0).is_empty());
    }

    #[test]
    fn test_subtract_intervals_splits_around_cut() {
        let result = subtract_intervals(&[iv(1.0, 10.0)], &[iv(4.0, 6.0)]);
        assert_eq!(bounds(&result), vec![(1.0, 4.0), (6.0, 10.0)]);
    }

    #[test]
    fn test_subtract_intervals_multiple_cuts() {
        let result = subtract_intervals(&[iv(0.0, 10.0)], &[iv(2.0, 3.0), iv(5.0, 12.0)]);
        assert_eq!(bounds(&result), vec![(0.0, 2.0), (3.0, 5.0)]);
    }

    #[test]
    fn test_subtract_intervals_full_cover_removes() {
        assert!(subtract_intervals(&[iv(2.0, 3.0)], &[iv(0.0, 10.0)]).is_empty());
    }

    #[test]
    fn test_keep_segments_basic() {
        let keep = compute_keep_segments(60.0, &[iv(10.0, 20.0)], 0.0);
        assert_eq!(bounds(&keep), vec![(0.0, 10.0), (20.0, 60.0)]);
        assert!(keep.iter().all(|k| k.action == Action::None));
    }

    #[test]
    fn test_keep_segments_cut_at_edges() {
        let keep = compute_keep_segments(60.0, &[iv(0.0, 10.0)], 0.0);
        assert_eq!(bounds(&keep), vec![(10.0, 60.0)]);

        let keep = compute_keep_segments(60.0, &[iv(50.0, 60.0)], 0.0);
        assert_eq!(bounds(&keep), vec![(0.0, 50.0)]);
    }

    #[test]
    fn test_keep_segments_drops_short() {
        let keep = compute_keep_segments(60.0, &[iv(10.0, 20.0), iv(20.05, 30.0)], 0.1);
        assert_eq!(bounds(&keep), vec![(0.0, 10.0), (30.0, 60.0)]);
    }

    #[test]
    fn test_keep_segments_no_cuts() {
        let keep = compute_keep_segments(42.0, &[], 0.5);
        assert_eq!(bounds(&keep), vec![(0.0, 42.0)]);
    }

    #[test]
    fn test_add_buffer() {
        let buffered = add_buffer_to_intervals(&[iv(5.0, 10.0)], 1.0, 2.0, None);
        assert_eq!(bounds(&buffered), vec![(4.0, 12.0)]);
    }

    #[test]
    fn test_add_buffer_clamps_to_range() {
        let buffered = add_buffer_to_intervals(&[iv(0.5, 59.5)], 1.0, 2.0, Some(60.0));
        assert_eq!(bounds(&buffered), vec![(0.0, 60.0)]);
    }

    #[test]
    fn test_total_duration_counts_overlap_once() {
        assert_eq!(total_duration(&[iv(0.0, 4.0), iv(2.0, 6.0), iv(10.0, 11.0)]), 7.0);
    }
}
