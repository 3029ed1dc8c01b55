//! Polygon approximation of closed contours using the
//! Ramer-Douglas-Peucker algorithm.
//!
//! A closed curve has no natural endpoints, so the curve is first split
//! at two far-apart anchor points and each half is simplified as an
//! open polyline. The candidate selector calls this with a tolerance of
//! a fixed fraction of the contour perimeter.

use crate::types::{Contour, Point};

/// Approximate a closed contour by a polygon whose edges stay within
/// `tolerance` pixels of the original curve.
///
/// Contours with fewer than 3 points are returned unchanged. A contour
/// whose points all coincide collapses to a single point.
#[must_use = "returns the approximated polygon"]
pub fn approximate_polygon(contour: &Contour, tolerance: f64) -> Contour {
    let points = contour.points();
    let n = points.len();
    if n < 3 {
        return contour.clone();
    }

    let (a, b) = far_apart_anchors(points);
    if points[a] == points[b] {
        return Contour::new(vec![points[a]]);
    }

    // Rotate so `a` is first, then repeat it at the end to close the curve.
    let closed: Vec<Point> = points[a..]
        .iter()
        .chain(&points[..a])
        .copied()
        .chain(std::iter::once(points[a]))
        .collect();
    let split = (b + n - a) % n;

    let mut kept = vec![false; closed.len()];
    kept[0] = true;
    kept[split] = true;
    kept[n] = true;

    rdp_recurse(&closed, 0, split, tolerance, &mut kept);
    rdp_recurse(&closed, split, n, tolerance, &mut kept);

    let simplified = closed[..n]
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();
    Contour::new(simplified)
}

/// Approximation with tolerance `epsilon_ratio` x perimeter.
#[must_use = "returns the approximated polygon"]
pub fn approximate_by_perimeter(contour: &Contour, epsilon_ratio: f64) -> Contour {
    approximate_polygon(contour, epsilon_ratio * contour.perimeter())
}

/// Pick two anchor indices roughly a diameter apart: start at index 0,
/// then alternate "farthest point from the current anchor" a few times.
fn far_apart_anchors(points: &[Point]) -> (usize, usize) {
    let farthest = |from: usize| {
        let origin = points[from];
        let mut best = from;
        let mut best_dist = 0.0;
        for (i, p) in points.iter().enumerate() {
            let d = p.distance_squared(origin);
            if d > best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    };

    let b = farthest(0);
    let a = farthest(b);
    let b = farthest(a);
    (a, b)
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
