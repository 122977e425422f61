use super::{exp_score, finish, stroke_label, Candidate, MetricKind, MetricScore, TipCause};
use crate::aligner::AlignedStrokeSet;
use crate::config::MetricParams;
use crate::geometry::{frechet_distance, polyline_length, resample, Point};
use crate::reference::ReferenceCharacter;

/// Length mismatch (either way) below which the tip talks about form, not
/// length.
const LENGTH_SLACK: f64 = 0.1;

/// Fréchet distance between two strokes after resampling both to `n` points,
/// in cell units. `None` when either side is empty.
pub fn stroke_distance(captured: &[Point], reference: &[Point], n: usize) -> Option<f64> {
    if captured.is_empty() || reference.is_empty() {
        return None;
    }
    let a = resample(captured, n);
    let b = resample(reference, n);
    let d = frechet_distance(&a, &b);
    d.is_finite().then_some(d)
}

pub fn score(
    set: &AlignedStrokeSet,
    reference: &ReferenceCharacter,
    params: &MetricParams,
) -> MetricScore {
    let threshold = params.tip_threshold(MetricKind::Shape);
    let k = params.k_shape;
    let n = params.shape_samples.max(2);
    let missing_cost = params.missing_stroke_error.max(0.0);

    let per_stroke: Vec<(usize, f64)> = set
        .strokes
        .iter()
        .map(|s| {
            let err = reference
                .strokes
                .get(s.reference_index)
                .and_then(|r| stroke_distance(&s.registered, &r.points, n))
                .unwrap_or(missing_cost);
            (s.reference_index, err)
        })
        .collect();

    let missing = set.unmatched_reference.len();
    let drawn: f64 = per_stroke.iter().map(|(_, e)| e).sum();
    let denom = (per_stroke.len() + missing) as f64;
    let error = if denom > 0.0 {
        (drawn + missing as f64 * missing_cost) / denom
    } else {
        missing_cost
    };
    let value = exp_score(k, error);

    let mut candidates = Vec::new();
    let worst = per_stroke
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize, f64)>, (i, &(r, e))| match best {
            Some((_, _, b)) if b >= e => best,
            _ => Some((i, r, e)),
        });
    if let Some((worst_pos, ref_index, worst)) = worst {
        let message = match (
            set.strokes.get(worst_pos),
            reference.strokes.get(ref_index),
        ) {
            (Some(s), Some(r)) => {
                let ref_len = polyline_length(&r.points);
                let ratio = if ref_len > f64::EPSILON {
                    polyline_length(&s.registered) / ref_len
                } else {
                    1.0
                };
                if ratio < 1.0 - LENGTH_SLACK {
                    format!(
                        "{} 획 길이를 {:.0}% 늘려보세요",
                        stroke_label(ref_index),
                        (1.0 / ratio.max(0.01) - 1.0) * 100.0
                    )
                } else if ratio > 1.0 + LENGTH_SLACK {
                    format!(
                        "{} 획 길이를 {:.0}% 줄여보세요",
                        stroke_label(ref_index),
                        (1.0 - 1.0 / ratio) * 100.0
                    )
                } else {
                    format!("{} 획의 형태를 참고 글자에 맞춰 다듬어보세요", stroke_label(ref_index))
                }
            }
            _ => format!("{} 획의 형태를 참고 글자에 맞춰 다듬어보세요", stroke_label(ref_index)),
        };
        candidates.push(Candidate {
            cause: TipCause::ShapeStroke,
            message,
            residual_score: exp_score(k, error - worst / denom.max(1.0)),
        });
    }

    if missing > 0 {
        let labels: Vec<String> = set
            .unmatched_reference
            .iter()
            .map(|&i| stroke_label(i))
            .collect();
        candidates.push(Candidate {
            cause: TipCause::ShapeMissing,
            message: format!("{} 획이 빠졌습니다. 획수를 확인해보세요", labels.join("")),
            residual_score: exp_score(k, drawn / denom.max(1.0)),
        });
    }

    finish(MetricKind::Shape, value, error, threshold, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strokes_have_zero_distance() {
        let s = [Point::new(0.1, 0.1), Point::new(0.9, 0.1), Point::new(0.9, 0.9)];
        assert!(stroke_distance(&s, &s, 32).unwrap() < 1e-12);
    }

    #[test]
    fn test_direction_matters() {
        let a = [Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        let b = [Point::new(1.0, 0.0), Point::new(0.0, 0.0)];
        assert!((stroke_distance(&a, &b, 16).unwrap() - 1.0).abs() < 1e-9);
        assert!(stroke_distance(&a, &[], 16).is_none());
    }
}
