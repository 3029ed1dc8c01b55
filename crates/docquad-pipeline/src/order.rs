//! Canonical corner ordering.
//!
//! Four unordered points become `[TL, TR, BR, BL]` by the extremes of
//! two keys: `x + y` picks top-left (min) and bottom-right (max), and
//! `y - x` picks top-right (min) and bottom-left (max).
//!
//! When several points share an extreme key value, the one that comes
//! first in the input wins. The result is therefore deterministic for a
//! fixed input order but may change if the input is permuted.

use crate::types::{Point, Quadrilateral};

/// Order four points as `[TL, TR, BR, BL]`.
#[must_use]
pub fn canonicalize(points: [Point; 4]) -> Quadrilateral {
    let tl = first_extreme(&points, Point::sum, |candidate, best| candidate < best);
    let br = first_extreme(&points, Point::sum, |candidate, best| candidate > best);
    let tr = first_extreme(&points, Point::difference, |candidate, best| candidate < best);
    let bl = first_extreme(&points, Point::difference, |candidate, best| candidate > best);
    Quadrilateral::from_ordered([tl, tr, br, bl])
}

/// Scan in input order; a later point replaces the current best only
/// when strictly better.
fn first_extreme(
    points: &[Point; 4],
    key: impl Fn(Point) -> f64,
    better: impl Fn(f64, f64) -> bool,
) -> Point {
    let mut best = points[0];
    let mut best_key = key(best);
    for &p in &points[1..] {
        let k = key(p);
        if better(k, best_key) {
            best = p;
            best_key = k;
        }
    }
    best
}
