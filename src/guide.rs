use crate::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// A printed line of the guide overlay, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideLine {
    pub from: Point,
    pub to: Point,
}

impl GuideLine {
    pub fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn distance_to(&self, p: &Point) -> f64 {
        let dx = self.to.x - self.from.x;
        let dy = self.to.y - self.from.y;
        let len2 = dx * dx + dy * dy;
        if len2 <= f64::EPSILON {
            return p.dist(&self.from);
        }
        let t = (((p.x - self.from.x) * dx + (p.y - self.from.y) * dy) / len2).clamp(0.0, 1.0);
        p.dist(&self.from.lerp(&self.to, t))
    }
}

/// Overlay shown to the user while capturing, expressed in the captured
/// image's pixel coordinates.
///
/// `frame` is the character cell the user is asked to write into. Its four
/// borders plus `lines` are what the camera sees printed; they are removed
/// from the ink mask when `line_width` is positive. `tolerance` is the band
/// (in pixels) outside the frame that still counts as adhering to the guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideGeometry {
    pub frame: BoundingBox,
    #[serde(default)]
    pub lines: Vec<GuideLine>,
    #[serde(default)]
    pub line_width: f64,
    #[serde(default)]
    pub tolerance: f64,
}

impl GuideGeometry {
    /// Plain square frame with no inner lines.
    pub fn frame_only(frame: BoundingBox, line_width: f64, tolerance: f64) -> Self {
        Self {
            frame,
            lines: Vec::new(),
            line_width,
            tolerance,
        }
    }

    /// 田字格: frame plus the horizontal and vertical centre lines.
    pub fn cross_grid(frame: BoundingBox, line_width: f64, tolerance: f64) -> Self {
        let c = frame.center();
        Self {
            frame,
            lines: vec![
                GuideLine::new(Point::new(frame.min_x, c.y), Point::new(frame.max_x, c.y)),
                GuideLine::new(Point::new(c.x, frame.min_y), Point::new(c.x, frame.max_y)),
            ],
            line_width,
            tolerance,
        }
    }

    /// 米字格: cross grid plus both diagonals.
    pub fn star_grid(frame: BoundingBox, line_width: f64, tolerance: f64) -> Self {
        let mut g = Self::cross_grid(frame, line_width, tolerance);
        g.lines.push(GuideLine::new(
            Point::new(frame.min_x, frame.min_y),
            Point::new(frame.max_x, frame.max_y),
        ));
        g.lines.push(GuideLine::new(
            Point::new(frame.max_x, frame.min_y),
            Point::new(frame.min_x, frame.max_y),
        ));
        g
    }

    fn border_lines(&self) -> [GuideLine; 4] {
        let f = &self.frame;
        let tl = Point::new(f.min_x, f.min_y);
        let tr = Point::new(f.max_x, f.min_y);
        let br = Point::new(f.max_x, f.max_y);
        let bl = Point::new(f.min_x, f.max_y);
        [
            GuideLine::new(tl, tr),
            GuideLine::new(tr, br),
            GuideLine::new(br, bl),
            GuideLine::new(bl, tl),
        ]
    }

    /// Whether a pixel centre lies on a printed guide line, widened by
    /// `slack` pixels on each side.
    pub fn is_printed(&self, p: &Point, slack: f64) -> bool {
        if self.line_width <= 0.0 {
            return false;
        }
        let half = self.line_width * 0.5 + slack.max(0.0);
        self.border_lines()
            .iter()
            .chain(self.lines.iter())
            .any(|l| l.distance_to(p) <= half)
    }

    /// Whether an ink point adheres to the guide (inside the frame widened
    /// by the tolerance band).
    pub fn within_band(&self, p: &Point) -> bool {
        self.frame.inflate(self.tolerance.max(0.0)).contains(p)
    }
}

/// Maps image pixels onto the unit character cell `[0,1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellFrame {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl CellFrame {
    pub fn from_box(b: &BoundingBox) -> Self {
        Self {
            origin: Point::new(b.min_x, b.min_y),
            width: b.width(),
            height: b.height(),
        }
    }

    /// The whole image is the cell.
    pub fn from_image(width: usize, height: usize) -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            width: width as f64,
            height: height as f64,
        }
    }

    /// The guide frame if one was used, otherwise the full image.
    pub fn for_capture(width: usize, height: usize, guide: Option<&GuideGeometry>) -> Self {
        match guide {
            Some(g) if g.frame.width() > 0.0 && g.frame.height() > 0.0 => Self::from_box(&g.frame),
            _ => Self::from_image(width, height),
        }
    }

    pub fn to_cell(&self, p: &Point) -> Point {
        let w = if self.width > 0.0 { self.width } else { 1.0 };
        let h = if self.height > 0.0 { self.height } else { 1.0 };
        Point::new((p.x - self.origin.x) / w, (p.y - self.origin.y) / h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_grid_marks_centre_line() {
        let g = GuideGeometry::cross_grid(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 2.0, 5.0);
        assert!(g.is_printed(&Point::new(50.0, 30.0), 0.0));
        assert!(g.is_printed(&Point::new(0.5, 70.0), 0.0));
        assert!(!g.is_printed(&Point::new(30.0, 30.0), 0.0));
        assert!(g.is_printed(&Point::new(52.5, 30.0), 2.0));
    }

    #[test]
    fn test_band_includes_tolerance() {
        let g = GuideGeometry::frame_only(BoundingBox::new(10.0, 10.0, 90.0, 90.0), 0.0, 4.0);
        assert!(g.within_band(&Point::new(7.0, 50.0)));
        assert!(!g.within_band(&Point::new(5.0, 50.0)));
    }

    #[test]
    fn test_cell_frame_from_guide() {
        let g = GuideGeometry::frame_only(BoundingBox::new(20.0, 40.0, 120.0, 140.0), 0.0, 0.0);
        let cell = CellFrame::for_capture(200, 200, Some(&g));
        let p = cell.to_cell(&Point::new(70.0, 90.0));
        assert!((p.x - 0.5).abs() < 1e-12 && (p.y - 0.5).abs() < 1e-12);
    }
}
