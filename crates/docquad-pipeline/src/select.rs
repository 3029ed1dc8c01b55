//! Candidate selection: turn ranked contours into one quadrilateral.
//!
//! [`select_first_passing`] walks contours in rank order and returns the
//! first that approximates to a near-rectangular four-gon.
//! [`select_largest_box`] instead scans every contour and keeps the
//! passing four-gon with the largest bounding box.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry;
use crate::order::canonicalize;
use crate::simplify::approximate_by_perimeter;
use crate::types::{Contour, Point, Quadrilateral};

/// Thresholds a candidate must meet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    /// Approximation tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Largest accepted `|cos|` of a measured corner. `None` skips the
    /// angle test.
    pub max_corner_cosine: Option<f64>,
    /// Smallest accepted enclosed area of the approximated polygon.
    pub min_area: f64,
    /// Require the approximated polygon to be convex.
    pub require_convex: bool,
}

/// Why a contour was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// The approximation did not have exactly four vertices.
    VertexCount(usize),
    /// The approximated polygon is not convex.
    NotConvex,
    /// The approximated polygon is too small.
    TooSmall(f64),
    /// A corner is too far from a right angle.
    CornerAngle(f64),
    /// Two corners coincide.
    DuplicateCorners,
}

/// A contour that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Canonically ordered corners.
    pub quad: Quadrilateral,
    /// Position of the source contour in the input list.
    pub rank: usize,
    /// Enclosed area of the quadrilateral.
    pub area: f64,
    /// Largest `|cos|` over the measured corners.
    pub max_cosine: f64,
}

/// Result of a selection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// The chosen candidate, if any contour passed.
    pub candidate: Option<Candidate>,
    /// Contours examined.
    pub evaluated: usize,
    /// Rejected contours with their rank and reason.
    pub rejections: Vec<(usize, Rejection)>,
}

/// Check a single contour against `criteria`.
///
/// # Errors
///
/// Returns the first [`Rejection`] the contour hits. The checks run in
/// this order: vertex count, convexity, area, corner angles, duplicate
/// corners.
pub fn evaluate(
    contour: &Contour,
    rank: usize,
    criteria: &SelectionCriteria,
) -> Result<Candidate, Rejection> {
    let approx = approximate_by_perimeter(contour, criteria.approx_epsilon_ratio);
    let corners: [Point; 4] = approx
        .points()
        .try_into()
        .map_err(|_| Rejection::VertexCount(approx.len()))?;

    if criteria.require_convex && !geometry::is_convex(&corners) {
        return Err(Rejection::NotConvex);
    }

    let area = geometry::polygon_area(&corners);
    if area < criteria.min_area {
        return Err(Rejection::TooSmall(area));
    }

    let quad = canonicalize(corners);
    let max_cosine = geometry::max_corner_cosine(&quad);
    if let Some(limit) = criteria.max_corner_cosine
        && max_cosine > limit
    {
        return Err(Rejection::CornerAngle(max_cosine));
    }

    if quad.has_duplicate_corners() {
        return Err(Rejection::DuplicateCorners);
    }

    Ok(Candidate {
        quad,
        rank,
        area,
        max_cosine,
    })
}

/// Return the first contour, in the given order, that passes `criteria`.
///
/// Contours should be ranked largest first; later contours are not
/// examined once one passes.
#[must_use]
pub fn select_first_passing(contours: &[Contour], criteria: &SelectionCriteria) -> SelectionOutcome {
    let mut outcome = SelectionOutcome::default();
    for (rank, contour) in contours.iter().enumerate() {
        outcome.evaluated += 1;
        match evaluate(contour, rank, criteria) {
            Ok(candidate) => {
                outcome.candidate = Some(candidate);
                break;
            }
            Err(reason) => {
                trace!(rank, ?reason, "candidate rejected");
                outcome.rejections.push((rank, reason));
            }
        }
    }
    outcome
}

/// Examine every contour and keep the passing candidate with the largest
/// axis-aligned bounding box.
///
/// A later candidate replaces the current best only when its box is at
/// least as wide and at least as tall.
#[must_use]
pub fn select_largest_box(contours: &[Contour], criteria: &SelectionCriteria) -> SelectionOutcome {
    let mut outcome = SelectionOutcome::default();
    let mut best_box = (0.0, 0.0);
    for (rank, contour) in contours.iter().enumerate() {
        outcome.evaluated += 1;
        match evaluate(contour, rank, criteria) {
            Ok(candidate) => {
                let (w, h) = geometry::bounding_size(candidate.quad.corners());
                if w >= best_box.0 && h >= best_box.1 {
                    best_box = (w, h);
                    outcome.candidate = Some(candidate);
                }
            }
            Err(reason) => outcome.rejections.push((rank, reason)),
        }
    }
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Contour {
        Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    fn strict() -> SelectionCriteria {
        SelectionCriteria {
            approx_epsilon_ratio: 0.02,
            max_corner_cosine: Some(85.0_f64.to_radians().cos()),
            min_area: 0.0,
            require_convex: false,
        }
    }

    /// Quadrilateral with a 70 degree corner at the origin.
    fn skewed() -> Contour {
        let a = 70.0_f64.to_radians();
        let (dx, dy) = (100.0 * a.cos(), 100.0 * a.sin());
        Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0 + dx, dy),
            Point::new(dx, dy),
        ])
    }

    #[test]
    fn square_is_accepted() {
        let c = evaluate(&rect(0.0, 0.0, 100.0, 100.0), 0, &strict()).unwrap();
        assert!(c.max_cosine < 1e-9);
        assert_eq!(c.quad.top_left(), Point::new(0.0, 0.0));
        assert_eq!(c.quad.bottom_right(), Point::new(100.0, 100.0));
    }

    #[test]
    fn seventy_degree_corner_is_rejected() {
        let result = evaluate(&skewed(), 0, &strict());
        assert!(
            matches!(result, Err(Rejection::CornerAngle(cos)) if (cos - 0.342).abs() < 1e-3),
            "expected angle rejection, got {result:?}",
        );
    }

    #[test]
    fn angle_test_can_be_disabled() {
        let loose = SelectionCriteria {
            max_corner_cosine: None,
            ..strict()
        };
        assert!(evaluate(&skewed(), 0, &loose).is_ok());
    }

    #[test]
    fn triangle_is_rejected_for_vertex_count() {
        let tri = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(50.0, 80.0),
        ]);
        assert_eq!(evaluate(&tri, 0, &strict()), Err(Rejection::VertexCount(3)));
    }

    #[test]
    fn small_candidate_is_rejected() {
        let criteria = SelectionCriteria {
            min_area: 1000.0,
            ..strict()
        };
        assert!(matches!(
            evaluate(&rect(0.0, 0.0, 10.0, 10.0), 0, &criteria),
            Err(Rejection::TooSmall(_))
        ));
    }

    #[test]
    fn concave_candidate_is_rejected_when_convexity_required() {
        let dart = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 40.0),
            Point::new(100.0, 0.0),
            Point::new(50.0, 100.0),
        ]);
        let criteria = SelectionCriteria {
            max_corner_cosine: None,
            require_convex: true,
            ..strict()
        };
        assert_eq!(evaluate(&dart, 0, &criteria), Err(Rejection::NotConvex));
    }

    #[test]
    fn first_passing_contour_wins() {
        let contours = vec![
            skewed(),
            rect(0.0, 0.0, 50.0, 40.0),
            rect(0.0, 0.0, 500.0, 400.0),
        ];
        let outcome = select_first_passing(&contours, &strict());
        let chosen = outcome.candidate.unwrap();
        assert_eq!(chosen.rank, 1);
        assert_eq!(outcome.evaluated, 2);
        assert_eq!(outcome.rejections.len(), 1);
    }

    #[test]
    fn no_passing_contour_yields_none() {
        let outcome = select_first_passing(&[skewed()], &strict());
        assert!(outcome.candidate.is_none());
        assert_eq!(outcome.evaluated, 1);
        assert!(select_first_passing(&[], &strict()).candidate.is_none());
    }

    #[test]
    fn largest_box_prefers_enclosing_rectangle() {
        let contours = vec![
            rect(10.0, 10.0, 60.0, 60.0),
            rect(0.0, 0.0, 200.0, 150.0),
            rect(5.0, 5.0, 100.0, 100.0),
        ];
        let outcome = select_largest_box(&contours, &strict());
        assert_eq!(outcome.candidate.map(|c| c.rank), Some(1));
        assert_eq!(outcome.evaluated, 3);
    }

    #[test]
    fn largest_box_needs_both_dimensions() {
        // The second box is wider but shorter, so the first is kept.
        let contours = vec![rect(0.0, 0.0, 100.0, 100.0), rect(0.0, 0.0, 300.0, 50.0)];
        let outcome = select_largest_box(&contours, &strict());
        assert_eq!(outcome.candidate.map(|c| c.rank), Some(0));
    }
}
