pub mod components;
pub mod graph;
pub mod skeleton;

use self::components::{label_components, Component};
use self::graph::SkeletonGraph;
use self::skeleton::thin;
use crate::cancel::CancelSignal;
use crate::config::ExtractionParams;
use crate::error::ExtractionError;
use crate::geometry::{mean, polyline_length, simplify, BoundingBox, Point};
use crate::guide::GuideGeometry;
use crate::raster::{InkImage, InkMask};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single ink stroke traced from the capture, in image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedStroke {
    pub index: usize,
    pub points: Vec<Point>,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub ink_pixels: usize,
}

impl CapturedStroke {
    /// Builds a stroke from an already ordered polyline (e.g. touch input).
    pub fn from_points(index: usize, points: Vec<Point>) -> Self {
        let bbox = BoundingBox::from_points(points.iter())
            .unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0));
        Self {
            index,
            points,
            bbox,
            ink_pixels: 0,
        }
    }
}

#[inline(always)]
fn pixel_center(x: usize, y: usize) -> Point {
    Point::new(x as f64 + 0.5, y as f64 + 0.5)
}

pub struct StrokeExtractor {
    params: ExtractionParams,
}

impl StrokeExtractor {
    pub fn new(params: ExtractionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ExtractionParams {
        &self.params
    }

    pub fn threshold_for(&self, image: &InkImage) -> u8 {
        self.params
            .ink_threshold
            .unwrap_or_else(|| image.otsu_threshold().min(self.params.max_ink_luma))
    }

    /// Image → ordered strokes. Pure function of the image, the guide and
    /// the parameters.
    pub fn extract(
        &self,
        image: &InkImage,
        guide: Option<&GuideGeometry>,
        cancel: &dyn CancelSignal,
    ) -> Result<Vec<CapturedStroke>, ExtractionError> {
        if image.width == 0 || image.height == 0 {
            return Err(ExtractionError::EmptyImage {
                width: image.width,
                height: image.height,
            });
        }

        let threshold = self.threshold_for(image);
        let mut mask = image.binarize(threshold);
        debug!(
            "Binarised at {} -> {} ink pixels",
            threshold,
            mask.ink_count()
        );

        if let Some(g) = guide {
            if g.line_width > 0.0 {
                mask = self.subtract_guide(&mask, g);
                debug!("Guide removed -> {} ink pixels", mask.ink_count());
            }
        }

        if mask.ink_count() == 0 {
            return Err(ExtractionError::NoInk);
        }

        let components: Vec<Component> = label_components(&mask, cancel)?
            .into_iter()
            .filter(|c| c.area() >= self.params.min_component_area.max(1))
            .collect();

        if components.is_empty() {
            return Err(ExtractionError::NoInk);
        }
        let plausible = |found: usize| -> Result<(), ExtractionError> {
            if found < self.params.min_strokes || found > self.params.max_strokes {
                return Err(ExtractionError::ImplausibleStrokeCount {
                    found,
                    min: self.params.min_strokes,
                    max: self.params.max_strokes,
                });
            }
            Ok(())
        };
        // Every component yields at least one stroke
        if components.len() > self.params.max_strokes {
            plausible(components.len())?;
        }

        let mut strokes = Vec::with_capacity(components.len());
        for comp in &components {
            if cancel.is_cancelled() {
                return Err(ExtractionError::Cancelled);
            }
            for (points, ink_pixels) in self.trace(comp) {
                let mut stroke = CapturedStroke::from_points(strokes.len(), points);
                stroke.ink_pixels = ink_pixels;
                strokes.push(stroke);
            }
        }
        plausible(strokes.len())?;

        debug!(
            "Extracted {} strokes from {} components",
            strokes.len(),
            components.len()
        );
        Ok(strokes)
    }

    /// Splits one connected blob into strokes: thin it, walk the skeleton
    /// straight through crossings, then cut at sharp corners.
    fn trace(&self, comp: &Component) -> Vec<(Vec<Point>, usize)> {
        let mut skel = thin(comp);
        if skel.is_empty() {
            skel = comp.pixels.clone();
        }
        // Mean pen width in pixels
        let width = (comp.area() as f64 / skel.len() as f64).max(1.0);

        let mut graph = SkeletonGraph::build(&skel);
        graph.simplify(width.ceil() as usize + 2, (2.0 * width).ceil() as usize + 2);
        let reach = ((2.0 * width).round() as usize).max(3);
        let epsilon = self.params.simplify_epsilon.max(0.35 * width);
        let max_cos = self.params.corner_angle_deg.to_radians().cos();

        let mut pieces: Vec<Vec<Point>> = Vec::new();
        for chain in graph.chains(reach) {
            let path: Vec<Point> = chain
                .pixels
                .iter()
                .map(|&(x, y)| pixel_center(x, y))
                .collect();
            let mut line = simplify(&path, epsilon);
            let closed = chain.closed && line.len() > 3;
            if closed && line[0].dist(&line[line.len() - 1]) < width {
                line.pop();
            }
            let cuts = corners(&line, closed, width, max_cos);
            pieces.extend(split_at(&line, closed, &cuts));
        }

        let longest = pieces
            .iter()
            .map(|p| polyline_length(p))
            .fold(0.0, f64::max);
        pieces.retain(|p| polyline_length(p) >= width.min(longest));

        if pieces.is_empty() {
            let dot: Vec<Point> = comp
                .pixels
                .iter()
                .map(|&(x, y)| pixel_center(x, y))
                .collect();
            let c = mean(&dot);
            return vec![(vec![c, c], comp.area())];
        }

        let total: f64 = pieces.iter().map(|p| polyline_length(p)).sum();
        let share = pieces.len() as f64;
        pieces
            .into_iter()
            .map(|mut points| {
                let ink = if total > f64::EPSILON {
                    comp.area() as f64 * polyline_length(&points) / total
                } else {
                    comp.area() as f64 / share
                };
                if points.len() == 1 {
                    points.push(points[0]);
                }
                (points, ink.round() as usize)
            })
            .collect()
    }

    /// Clears printed guide pixels, then restores those that sit between ink
    /// on both sides (a stroke crossing a printed line).
    fn subtract_guide(&self, mask: &InkMask, guide: &GuideGeometry) -> InkMask {
        let slack = self.params.guide_slack;
        let (w, h) = (mask.width, mask.height);

        let printed: Vec<bool> = (0..w * h)
            .map(|i| mask.ink[i] && guide.is_printed(&pixel_center(i % w, i / w), slack))
            .collect();

        let mut cleared = mask.clone();
        for (i, &p) in printed.iter().enumerate() {
            if p {
                cleared.ink[i] = false;
            }
        }

        let reach = (guide.line_width + 2.0 * slack.max(0.0)).ceil() as isize + 1;
        let ink_at = |x: isize, y: isize| -> bool {
            x >= 0 && y >= 0 && x < w as isize && y < h as isize && cleared.ink[y as usize * w + x as usize]
        };
        let hit = |x: isize, y: isize, dx: isize, dy: isize| -> bool {
            (1..=reach).any(|k| ink_at(x + k * dx, y + k * dy))
        };

        let mut repaired = cleared.clone();
        for (i, &p) in printed.iter().enumerate() {
            if !p {
                continue;
            }
            let x = (i % w) as isize;
            let y = (i / w) as isize;
            let bridged = [(1, 0), (0, 1), (1, 1), (1, -1)]
                .iter()
                .any(|&(dx, dy)| hit(x, y, dx, dy) && hit(x, y, -dx, -dy));
            if bridged {
                repaired.ink[i] = true;
            }
        }
        repaired
    }
}

/// Right then down, in either travel direction. The one bend written
/// without lifting the brush in the stroke shapes this engine knows.
fn is_fold(d1: (f64, f64), d2: (f64, f64)) -> bool {
    let right_down = d1.0 > d1.1.abs() && d2.1 > d2.0.abs();
    let up_left = -d1.1 > d1.0.abs() && -d2.0 > d2.1.abs();
    right_down || up_left
}

/// Vertices where the path turns sharper than `max_cos` allows. Each turn
/// is measured against the nearest vertices at least `min_seg` away, and
/// of two corners closer than that only the sharper survives.
fn corners(points: &[Point], closed: bool, min_seg: f64, max_cos: f64) -> Vec<usize> {
    let m = points.len();
    if m < 3 {
        return Vec::new();
    }
    let step = |j: usize, forward: bool| -> Option<usize> {
        match (forward, closed) {
            (true, _) if j + 1 < m => Some(j + 1),
            (true, true) => Some(0),
            (false, _) if j > 0 => Some(j - 1),
            (false, true) => Some(m - 1),
            _ => None,
        }
    };
    let reach = |i: usize, forward: bool| -> Option<usize> {
        let mut j = i;
        for _ in 1..m {
            j = step(j, forward)?;
            if points[j].dist(&points[i]) >= min_seg {
                return Some(j);
            }
        }
        None
    };

    let range = if closed { 0..m } else { 1..m - 1 };
    let mut found: Vec<(usize, f64)> = Vec::new();
    for i in range {
        let (Some(a), Some(c)) = (reach(i, false), reach(i, true)) else {
            continue;
        };
        let d1 = (points[i].x - points[a].x, points[i].y - points[a].y);
        let d2 = (points[c].x - points[i].x, points[c].y - points[i].y);
        let cos = (d1.0 * d2.0 + d1.1 * d2.1) / (d1.0.hypot(d1.1) * d2.0.hypot(d2.1));
        if cos >= max_cos || is_fold(d1, d2) {
            continue;
        }
        match found.last_mut() {
            Some(last) if points[last.0].dist(&points[i]) < min_seg => {
                if cos < last.1 {
                    *last = (i, cos);
                }
            }
            _ => found.push((i, cos)),
        }
    }
    found.into_iter().map(|(i, _)| i).collect()
}

/// Cuts a path at the given vertices; a corner vertex ends one piece and
/// starts the next.
fn split_at(points: &[Point], closed: bool, cuts: &[usize]) -> Vec<Vec<Point>> {
    if cuts.is_empty() {
        let mut whole = points.to_vec();
        if closed {
            whole.push(points[0]);
        }
        return vec![whole];
    }
    if !closed {
        let mut out = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for &c in cuts {
            out.push(points[start..=c].to_vec());
            start = c;
        }
        out.push(points[start..].to_vec());
        return out;
    }

    let m = points.len();
    let mut out = Vec::with_capacity(cuts.len());
    for (k, &c) in cuts.iter().enumerate() {
        let next = cuts[(k + 1) % cuts.len()];
        let mut piece = vec![points[c]];
        let mut i = c;
        loop {
            i = (i + 1) % m;
            piece.push(points[i]);
            if i == next {
                break;
            }
        }
        out.push(piece);
    }
    out
}
