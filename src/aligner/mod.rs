pub mod correspondence;

use self::correspondence::{assign, Match, StrokeFeatures};
use crate::cancel::CancelSignal;
use crate::config::AlignmentParams;
use crate::error::AlignmentError;
use crate::extractor::CapturedStroke;
use crate::geometry::{mean, polyline_moments, BoundingBox, Point, SimilarityTransform};
use crate::guide::{CellFrame, GuideGeometry};
use crate::reference::ReferenceCharacter;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One captured stroke after registration.
///
/// `placed` is the stroke in the unit cell as the user wrote it, `registered`
/// is the same stroke after the similarity transform. Both are already
/// oriented to run the same way as the reference stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedStroke {
    pub index: usize,
    pub placed: Vec<Point>,
    pub registered: Vec<Point>,
    pub reference_index: usize,
    pub reversed: bool,
}

/// Output of the aligner; the only input the metric calculators see besides
/// the reference itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedStrokeSet {
    pub character_id: String,
    pub transform: SimilarityTransform,
    pub strokes: Vec<AlignedStroke>,
    /// Positions in `ReferenceCharacter::strokes` nobody drew.
    pub unmatched_reference: Vec<usize>,
    /// Mean feature distance after the last iteration, in cell units.
    pub residual: f64,
    pub iterations: usize,
    pub guide: Option<GuideGeometry>,
    /// Captured strokes in image pixels, for guide adherence.
    pub ink: Vec<Vec<Point>>,
}

impl AlignedStrokeSet {
    pub fn placed_points(&self) -> impl Iterator<Item = &Point> {
        self.strokes.iter().flat_map(|s| s.placed.iter())
    }
}

pub struct ReferenceAligner {
    params: AlignmentParams,
}

impl ReferenceAligner {
    pub fn new(params: AlignmentParams) -> Self {
        Self { params }
    }

    /// Fails fast when the stroke count is off by more than the tolerance.
    pub fn check_count(
        &self,
        captured: usize,
        reference: &ReferenceCharacter,
    ) -> Result<(), AlignmentError> {
        let expected = reference.expected_strokes;
        let tolerance = self.params.stroke_count_tolerance;
        if captured == 0 || captured.abs_diff(expected) > tolerance {
            return Err(AlignmentError::StrokeCountMismatch {
                character: reference.id.clone(),
                expected,
                captured,
                tolerance,
            });
        }
        Ok(())
    }

    pub fn align(
        &self,
        captured: &[CapturedStroke],
        frame: &CellFrame,
        reference: &ReferenceCharacter,
        guide: Option<&GuideGeometry>,
        cancel: &dyn CancelSignal,
    ) -> Result<AlignedStrokeSet, AlignmentError> {
        if reference.strokes.is_empty() {
            return Err(AlignmentError::EmptyReference(reference.id.clone()));
        }
        self.check_count(captured.len(), reference)?;

        let placed: Vec<Vec<Point>> = captured
            .iter()
            .map(|s| s.points.iter().map(|p| frame.to_cell(p)).collect())
            .collect();
        // Catalog entries are stored in authored order
        let ref_feats: Vec<StrokeFeatures> = reference
            .strokes
            .iter()
            .map(|s| StrokeFeatures::of(&s.points))
            .collect();
        let cap_feats: Vec<StrokeFeatures> = placed.iter().map(|s| StrokeFeatures::of(s)).collect();

        let mut transform = self.initial_guess(&placed, reference);
        let max_rot = self.params.max_rotation_deg.abs().to_radians();
        let mut residual = f64::INFINITY;
        let mut matches: Vec<Match> = Vec::new();
        let mut unmatched: Vec<usize> = Vec::new();
        let mut iterations = 0;

        for _ in 0..self.params.max_iterations.max(1) {
            if cancel.is_cancelled() {
                return Err(AlignmentError::Cancelled);
            }
            iterations += 1;

            let moved: Vec<StrokeFeatures> = cap_feats
                .iter()
                .map(|f| StrokeFeatures {
                    start: transform.apply(&f.start),
                    end: transform.apply(&f.end),
                    centroid: transform.apply(&f.centroid),
                })
                .collect();
            let (m, u) = assign(&moved, &ref_feats, self.params.order_tie_break);
            let same_assignment = pairing(&m) == pairing(&matches);
            matches = m;
            unmatched = u;

            let (src, dst) = correspondences(&cap_feats, &ref_feats, &matches);
            if let Some(next) = SimilarityTransform::solve(&src, &dst) {
                transform = clamp_rotation(next, max_rot, &src, &dst);
            }

            let next_residual = mean_distance(&transform, &src, &dst);
            let converged = same_assignment
                && (residual - next_residual).abs() <= self.params.convergence_epsilon;
            residual = next_residual;
            if converged {
                break;
            }
        }

        debug!(
            "Aligned '{}' in {} iterations, residual {:.5}, {} unmatched",
            reference.id,
            iterations,
            residual,
            unmatched.len()
        );

        let strokes = matches
            .iter()
            .map(|m| {
                let mut pts = placed[m.captured].clone();
                if m.reversed {
                    pts.reverse();
                }
                AlignedStroke {
                    index: captured[m.captured].index,
                    registered: transform.apply_all(&pts),
                    placed: pts,
                    reference_index: m.reference,
                    reversed: m.reversed,
                }
            })
            .collect();

        Ok(AlignedStrokeSet {
            character_id: reference.id.clone(),
            transform,
            strokes,
            unmatched_reference: unmatched,
            residual,
            iterations,
            guide: guide.cloned(),
            ink: captured.iter().map(|s| s.points.clone()).collect(),
        })
    }

    /// Centroid onto centroid, no rotation, scale from the bounding-box
    /// diagonals.
    fn initial_guess(&self, placed: &[Vec<Point>], reference: &ReferenceCharacter) -> SimilarityTransform {
        let (mass, cx, cy) = placed
            .iter()
            .map(|s| polyline_moments(s))
            .fold((0.0, 0.0, 0.0), |a, m| (a.0 + m.0, a.1 + m.1, a.2 + m.2));
        let all: Vec<Point> = placed.iter().flatten().copied().collect();
        let cap_c = if mass > f64::EPSILON {
            Point::new(cx / mass, cy / mass)
        } else {
            mean(&all)
        };

        let cap_diag = BoundingBox::from_points(all.iter())
            .map(|b| b.diagonal())
            .unwrap_or(0.0);
        let ref_diag = reference.bounding_box().diagonal();
        let scale = if cap_diag > 1e-9 && ref_diag > 1e-9 {
            ref_diag / cap_diag
        } else {
            1.0
        };

        let ref_c = reference.centroid();
        SimilarityTransform {
            rotation: 0.0,
            scale,
            tx: ref_c.x - scale * cap_c.x,
            ty: ref_c.y - scale * cap_c.y,
        }
    }
}

fn pairing(matches: &[Match]) -> Vec<(usize, usize, bool)> {
    matches
        .iter()
        .map(|m| (m.captured, m.reference, m.reversed))
        .collect()
}

fn correspondences(
    cap: &[StrokeFeatures],
    reference: &[StrokeFeatures],
    matches: &[Match],
) -> (Vec<Point>, Vec<Point>) {
    let mut src = Vec::with_capacity(matches.len() * 3);
    let mut dst = Vec::with_capacity(matches.len() * 3);
    for m in matches {
        let c = if m.reversed {
            cap[m.captured].reversed()
        } else {
            cap[m.captured]
        };
        let r = &reference[m.reference];
        src.extend([c.start, c.end, c.centroid]);
        dst.extend([r.start, r.end, r.centroid]);
    }
    (src, dst)
}

/// Keeps the solved scale, limits the rotation, and re-fits the translation
/// for the limited rotation.
fn clamp_rotation(
    t: SimilarityTransform,
    max_rot: f64,
    src: &[Point],
    dst: &[Point],
) -> SimilarityTransform {
    if t.rotation.abs() <= max_rot {
        return t;
    }
    let rotation = t.rotation.clamp(-max_rot, max_rot);
    let mu_s = mean(src);
    let mu_d = mean(dst);
    let (sin, cos) = rotation.sin_cos();
    SimilarityTransform {
        rotation,
        scale: t.scale,
        tx: mu_d.x - t.scale * (cos * mu_s.x - sin * mu_s.y),
        ty: mu_d.y - t.scale * (sin * mu_s.x + cos * mu_s.y),
    }
}

fn mean_distance(t: &SimilarityTransform, src: &[Point], dst: &[Point]) -> f64 {
    if src.is_empty() {
        return 0.0;
    }
    src.iter()
        .zip(dst)
        .map(|(s, d)| t.apply(s).dist(d))
        .sum::<f64>()
        / src.len() as f64
}
