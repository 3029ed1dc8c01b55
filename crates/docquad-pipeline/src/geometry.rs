//! Planar geometry helpers shared by the contour and selection stages.

use crate::types::{Point, Quadrilateral};

/// Absolute enclosed area of a closed polygon (shoelace formula).
///
/// Orientation does not matter. Fewer than three points enclose nothing.
#[must_use]
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_signed: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
        .sum();
    twice_signed.abs() / 2.0
}

/// Length of a polyline, optionally including the closing segment.
#[must_use]
pub fn arc_length(points: &[Point], closed: bool) -> f64 {
    let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    match (closed, points.first(), points.last()) {
        (true, Some(&first), Some(&last)) if points.len() > 1 => open + last.distance(first),
        _ => open,
    }
}

/// Cosine of the angle at `vertex` between the rays towards `a` and `b`.
///
/// `cos θ = (v1·v2) / (|v1||v2| + ε)`; the epsilon keeps a zero-length
/// ray from dividing by zero.
#[must_use]
pub fn corner_cosine(a: Point, b: Point, vertex: Point) -> f64 {
    const EPSILON: f64 = 1e-10;
    let (dx1, dy1) = (a.x - vertex.x, a.y - vertex.y);
    let (dx2, dy2) = (b.x - vertex.x, b.y - vertex.y);
    let dot = dx1.mul_add(dx2, dy1 * dy2);
    let norms = dx1.hypot(dy1) * dx2.hypot(dy2);
    dot / (norms + EPSILON)
}

/// Largest `|cos|` over the corners at TR, BR and BL.
///
/// Three consecutive vertex triples are measured; for a planar
/// quadrilateral the fourth angle is determined by the other three.
#[must_use]
pub fn max_corner_cosine(quad: &Quadrilateral) -> f64 {
    let pts = quad.corners();
    (2..5)
        .map(|j| corner_cosine(pts[j % 4], pts[j - 2], pts[j - 1]).abs())
        .fold(0.0, f64::max)
}

/// Returns `true` if the closed polygon turns consistently in one
/// direction (collinear vertices are tolerated).
#[must_use]
pub fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0_f64;
    for i in 0..n {
        let (a, b, c) = (points[i], points[(i + 1) % n], points[(i + 2) % n]);
        let cross = (b.x - a.x).mul_add(c.y - b.y, -((b.y - a.y) * (c.x - b.x)));
        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

/// Axis-aligned bounding box as `(width, height)`.
#[must_use]
pub fn bounding_size(points: &[Point]) -> (f64, f64) {
    let Some(&first) = points.first() else {
        return (0.0, 0.0);
    };
    let (min, max) = points.iter().fold((first, first), |(lo, hi), p| {
        (
            Point::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    });
    (max.x - min.x, max.y - min.y)
}
