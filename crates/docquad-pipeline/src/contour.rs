//! Contour extraction: closed boundary curves from a binary edge map.
//!
//! Borders are traced with Suzuki-Abe border following
//! (`imageproc::contours::find_contours`). Both outer borders and hole
//! borders are returned as one flat list; ranking by area makes the
//! containment hierarchy irrelevant.

use image::GrayImage;

use crate::types::{Contour, Point};

/// Trace every closed border in `edges` (white = edge, black = background).
///
/// Converts `imageproc`'s integer grid points into floating-point
/// [`Point`]s, in traversal order.
#[must_use]
pub fn trace_contours(edges: &GrayImage) -> Vec<Contour> {
    let contours: Vec<imageproc::contours::Contour<i32>> =
        imageproc::contours::find_contours(edges);

    contours
        .into_iter()
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Contour::new(points)
        })
        .collect()
}

/// Convex hull of a contour (Andrew's monotone chain).
///
/// The hull is returned counter-clockwise in image coordinates, without
/// collinear vertices. Contours with fewer than three distinct points
/// are returned as their distinct points.
#[must_use]
pub fn convex_hull(contour: &Contour) -> Contour {
    let mut pts = contour.points().to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return Contour::new(pts);
    }

    let cross = |o: Point, a: Point, b: Point| (a.x - o.x).mul_add(b.y - o.y, -((a.y - o.y) * (b.x - o.x)));

    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
    for &p in &pts {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    // The last point repeats the first.
    hull.pop();
    Contour::new(hull)
}

/// Sort contours by enclosed area, largest first, and keep at most `cap`.
///
/// The sort is stable: contours of equal area keep their tracing order.
#[must_use]
pub fn rank_by_area(contours: Vec<Contour>, cap: usize) -> Vec<Contour> {
    let mut scored: Vec<(f64, Contour)> = contours.into_iter().map(|c| (c.area(), c)).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(cap);
    scored.into_iter().map(|(_, c)| c).collect()
}

/// Trace contours, replace each by its convex hull, and rank the hulls
/// by area (largest first), keeping at most `cap`.
///
/// An edge map without any white pixel yields an empty list.
#[must_use]
pub fn extract_ranked_hulls(edges: &GrayImage, cap: usize) -> Vec<Contour> {
    let hulls = trace_contours(edges).iter().map(convex_hull).collect();
    rank_by_area(hulls, cap)
}
