use super::{exp_score, finish, Candidate, MetricKind, MetricScore, TipCause};
use crate::aligner::AlignedStrokeSet;
use crate::config::MetricParams;
use crate::geometry::{mean, polyline_moments, Point};
use crate::reference::ReferenceCharacter;

/// Arc-length weighted centroid of the placed strokes.
pub fn ink_centroid(set: &AlignedStrokeSet) -> Option<Point> {
    let (mass, cx, cy) = set
        .strokes
        .iter()
        .map(|s| polyline_moments(&s.placed))
        .fold((0.0, 0.0, 0.0), |a, m| (a.0 + m.0, a.1 + m.1, a.2 + m.2));
    if mass > f64::EPSILON {
        return Some(Point::new(cx / mass, cy / mass));
    }
    let all: Vec<Point> = set.placed_points().copied().collect();
    if all.is_empty() {
        None
    } else {
        Some(mean(&all))
    }
}

pub fn score(
    set: &AlignedStrokeSet,
    reference: &ReferenceCharacter,
    params: &MetricParams,
) -> MetricScore {
    let threshold = params.tip_threshold(MetricKind::Center);
    let k = params.k_center;

    let c = match ink_centroid(set).filter(|p| p.is_finite()) {
        Some(c) => c,
        None => return finish(MetricKind::Center, 0.0, 1.0, threshold, Vec::new()),
    };
    let r = reference.centroid();
    // The cell is the unit square, so this is already normalised
    let dx = c.x - r.x;
    let dy = c.y - r.y;
    let error = dx.hypot(dy);
    let value = exp_score(k, error);

    let horizontal = if dx > 0.0 {
        "글자가 오른쪽으로 치우쳤습니다. 중심을 왼쪽으로 옮겨보세요"
    } else {
        "글자가 왼쪽으로 치우쳤습니다. 중심을 오른쪽으로 옮겨보세요"
    };
    let vertical = if dy > 0.0 {
        "글자가 아래로 처졌습니다. 중심을 조금 위로 올려보세요"
    } else {
        "글자가 위로 떠 있습니다. 중심을 조금 아래로 내려보세요"
    };

    let candidates = vec![
        Candidate {
            cause: TipCause::CenterHorizontal,
            message: horizontal.to_string(),
            residual_score: exp_score(k, dy.abs()),
        },
        Candidate {
            cause: TipCause::CenterVertical,
            message: vertical.to_string(),
            residual_score: exp_score(k, dx.abs()),
        },
    ];

    finish(MetricKind::Center, value, error, threshold, candidates)
}
