use super::{exp_score, finish, stroke_label, Candidate, MetricKind, MetricScore, TipCause};
use crate::aligner::AlignedStrokeSet;
use crate::config::MetricParams;
use crate::geometry::chord_angle;
use crate::reference::ReferenceCharacter;

/// Deviation charged for a stroke whose direction cannot be measured.
pub const UNMEASURABLE_DEG: f64 = 90.0;

/// Signed difference between two undirected directions, in `(-90, 90]`
/// degrees. Positive is clockwise on screen (y points down).
#[inline(always)]
pub fn signed_deviation_deg(captured: f64, reference: f64) -> f64 {
    let d = (captured - reference).to_degrees();
    let wrapped = (d + 90.0).rem_euclid(180.0) - 90.0;
    if wrapped <= -90.0 {
        90.0
    } else {
        wrapped
    }
}

/// Mean absolute deviation plus a share of how far the worst stroke sits
/// above that mean.
pub fn angle_error(deviations: &[f64], outlier_weight: f64) -> f64 {
    if deviations.is_empty() {
        return UNMEASURABLE_DEG;
    }
    let abs: Vec<f64> = deviations.iter().map(|d| d.abs()).collect();
    let mean = abs.iter().sum::<f64>() / abs.len() as f64;
    let max = abs.iter().copied().fold(0.0, f64::max);
    mean + outlier_weight * (max - mean)
}

pub fn score(
    set: &AlignedStrokeSet,
    reference: &ReferenceCharacter,
    params: &MetricParams,
) -> MetricScore {
    let threshold = params.tip_threshold(MetricKind::Angle);
    let k = params.k_angle;
    let w = params.angle_outlier_weight;

    // (reference index, signed deviation or None)
    let per_stroke: Vec<(usize, Option<f64>)> = set
        .strokes
        .iter()
        .map(|s| {
            let dev = reference
                .strokes
                .get(s.reference_index)
                .and_then(|r| chord_angle(&r.points))
                .zip(chord_angle(&s.placed))
                .map(|(r, c)| signed_deviation_deg(c, r));
            (s.reference_index, dev)
        })
        .collect();

    let devs: Vec<f64> = per_stroke
        .iter()
        .map(|(_, d)| d.unwrap_or(UNMEASURABLE_DEG))
        .collect();
    let error = angle_error(&devs, w);
    let value = exp_score(k, error);

    let mut candidates = Vec::new();
    if let Some((worst_pos, worst)) = devs
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, b)) if b.abs() >= d.abs() => best,
            _ => Some((i, *d)),
        })
    {
        let others: Vec<f64> = devs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != worst_pos)
            .map(|(_, d)| *d)
            .collect();
        let without = if others.is_empty() { 0.0 } else { angle_error(&others, w) };
        let ref_index = per_stroke[worst_pos].0;
        candidates.push(Candidate {
            cause: TipCause::AngleStray,
            message: format!(
                "{} 획의 기울기가 {:.0}° 어긋났습니다. 참고 획 방향에 맞춰보세요",
                stroke_label(ref_index),
                worst.abs()
            ),
            residual_score: exp_score(k, without),
        });

        let measured: Vec<f64> = per_stroke.iter().filter_map(|(_, d)| *d).collect();
        if !measured.is_empty() {
            let bias = measured.iter().sum::<f64>() / measured.len() as f64;
            let untilted: Vec<f64> = devs
                .iter()
                .zip(&per_stroke)
                .map(|(d, (_, m))| if m.is_some() { d - bias } else { *d })
                .collect();
            let dir = if bias > 0.0 { "시계" } else { "반시계" };
            candidates.push(Candidate {
                cause: TipCause::AngleTilt,
                message: format!(
                    "글자 전체가 {} 방향으로 {:.0}° 기울었습니다. 종이를 바르게 놓고 써보세요",
                    dir,
                    bias.abs()
                ),
                residual_score: exp_score(k, angle_error(&untilted, w)),
            });
        }
    }

    finish(MetricKind::Angle, value, error, threshold, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undirected_deviation() {
        let east = 0.0;
        let west = std::f64::consts::PI;
        assert!(signed_deviation_deg(west, east).abs() < 1e-9);
        assert!((signed_deviation_deg(10f64.to_radians(), east) - 10.0).abs() < 1e-9);
        assert!((signed_deviation_deg(-10f64.to_radians(), west) + 10.0).abs() < 1e-9);
        assert!((signed_deviation_deg(90f64.to_radians(), east).abs() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_outlier_raises_error() {
        let even = angle_error(&[5.0, 5.0, 5.0, 5.0], 0.5);
        let spiky = angle_error(&[0.0, 0.0, 0.0, 20.0], 0.5);
        assert!((even - 5.0).abs() < 1e-12);
        assert!(spiky > even);
    }
}
