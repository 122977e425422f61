use super::{clamp_score, finish, Candidate, MetricKind, MetricScore, TipCause};
use crate::aligner::AlignedStrokeSet;
use crate::config::MetricParams;
use crate::geometry::{densify, Point};
use crate::guide::GuideGeometry;
use crate::reference::ReferenceCharacter;

/// Ink samples outside the band, split by the side they escaped through.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Escapes {
    pub total: usize,
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl Escapes {
    pub fn outside(&self) -> usize {
        self.left + self.top + self.right + self.bottom
    }

    pub fn outside_fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.outside() as f64 / self.total as f64
        }
    }
}

pub fn count_escapes(guide: &GuideGeometry, ink: &[Vec<Point>], spacing: f64) -> Escapes {
    let band = guide.frame.inflate(guide.tolerance.max(0.0));
    let mut e = Escapes::default();
    for stroke in ink {
        for p in densify(stroke, spacing) {
            e.total += 1;
            if guide.within_band(&p) {
                continue;
            }
            // Attribute to the side it overshoots the most
            let over = [
                band.min_x - p.x,
                band.min_y - p.y,
                p.x - band.max_x,
                p.y - band.max_y,
            ];
            let side = over
                .iter()
                .enumerate()
                .fold(0, |best, (i, v)| if *v > over[best] { i } else { best });
            match side {
                0 => e.left += 1,
                1 => e.top += 1,
                2 => e.right += 1,
                _ => e.bottom += 1,
            }
        }
    }
    e
}

#[inline(always)]
fn linear_score(k: f64, outside_fraction: f64) -> f64 {
    clamp_score(100.0 * (1.0 - k * outside_fraction))
}

pub fn score(
    set: &AlignedStrokeSet,
    _reference: &ReferenceCharacter,
    params: &MetricParams,
) -> MetricScore {
    let threshold = params.tip_threshold(MetricKind::Guide);
    let guide = match &set.guide {
        Some(g) => g,
        None => return finish(MetricKind::Guide, 100.0, 0.0, threshold, Vec::new()),
    };
    let k = params.k_guide;

    let e = count_escapes(guide, &set.ink, params.guide_sample_spacing);
    let error = e.outside_fraction();
    let value = linear_score(k, error);

    let without = |n: usize| -> f64 {
        if e.total == 0 {
            0.0
        } else {
            linear_score(k, (e.outside() - n) as f64 / e.total as f64)
        }
    };
    let mut candidates = Vec::new();
    for (cause, count, side) in [
        (TipCause::GuideLeft, e.left, "왼쪽"),
        (TipCause::GuideTop, e.top, "위쪽"),
        (TipCause::GuideRight, e.right, "오른쪽"),
        (TipCause::GuideBottom, e.bottom, "아래쪽"),
    ] {
        if count > 0 {
            candidates.push(Candidate {
                cause,
                message: format!("획이 가이드 {} 경계를 벗어났습니다. 칸 안에 써보세요", side),
                residual_score: without(count),
            });
        }
    }

    finish(MetricKind::Guide, value, error, threshold, candidates)
}
