//! Default quadrilateral used when no candidate passes selection.

use serde::{Deserialize, Serialize};

use crate::frame::FrameGeometry;
use crate::types::{Point, Quadrilateral};

/// Shape of the fallback quadrilateral, in display space.
///
/// The two shapes coincide on square frames. On portrait or landscape
/// frames only [`CenteredHalf`](Self::CenteredHalf) keeps its corners on
/// the quarter and three-quarter lines of both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackShape {
    /// Corners at a quarter and three quarters of the display width and
    /// height: a rectangle with the frame's aspect ratio and half its size.
    #[default]
    CenteredHalf,
    /// A square with side `display_width / 2`, centered in the frame.
    ///
    /// This is the placeholder the mobile capture overlay shows. Pick it to
    /// match that front end; its top and bottom edges sit off the quarter
    /// lines whenever the frame is not square.
    CenteredSquare,
}

/// Build the fallback quadrilateral for `frame`, ordered `[TL, TR, BR, BL]`.
#[must_use]
pub fn fallback_quadrilateral(frame: &FrameGeometry, shape: FallbackShape) -> Quadrilateral {
    let w = f64::from(frame.display_width());
    let h = f64::from(frame.display_height());

    let (left, top, right, bottom) = match shape {
        FallbackShape::CenteredHalf => (w * 0.25, h * 0.25, w * 0.75, h * 0.75),
        FallbackShape::CenteredSquare => {
            let half_side = w * 0.25;
            let (cx, cy) = (w * 0.5, h * 0.5);
            (cx - half_side, cy - half_side, cx + half_side, cy + half_side)
        }
    };

    Quadrilateral::from_ordered([
        Point::new(left, top),
        Point::new(right, top),
        Point::new(right, bottom),
        Point::new(left, bottom),
    ])
}
