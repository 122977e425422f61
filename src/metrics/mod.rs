pub mod angle;
pub mod center;
pub mod guide;
pub mod margin;
pub mod shape;

use crate::aligner::AlignedStrokeSet;
use crate::config::MetricParams;
use crate::reference::ReferenceCharacter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
    EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Margin,
    Angle,
    Center,
    Shape,
    Guide,
}

impl MetricKind {
    /// Order used when two tips are equally urgent.
    pub const TIP_PRIORITY: [MetricKind; 5] = [
        MetricKind::Shape,
        MetricKind::Angle,
        MetricKind::Margin,
        MetricKind::Center,
        MetricKind::Guide,
    ];

    pub fn priority(&self) -> usize {
        Self::TIP_PRIORITY
            .iter()
            .position(|k| k == self)
            .unwrap_or(Self::TIP_PRIORITY.len())
    }

    pub fn label_ko(&self) -> &'static str {
        match self {
            MetricKind::Margin => "여백",
            MetricKind::Angle => "각도",
            MetricKind::Center => "중심",
            MetricKind::Shape => "형태",
            MetricKind::Guide => "가이드",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TipCause {
    MarginSides,
    MarginFill,
    MarginBalance,
    AngleStray,
    AngleTilt,
    CenterHorizontal,
    CenterVertical,
    ShapeStroke,
    ShapeMissing,
    GuideLeft,
    GuideTop,
    GuideRight,
    GuideBottom,
    /// Nothing measurable to blame a specific cause on.
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub kind: MetricKind,
    pub cause: TipCause,
    pub message: String,
    /// Points the metric would gain if this cause were fixed.
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub kind: MetricKind,
    pub value: f64,
    /// Underlying geometric error the value was mapped from.
    pub error: f64,
    pub threshold: f64,
    pub tip: Option<Tip>,
}

impl MetricScore {
    /// Score without a tip; used by callers that already hold the numbers.
    pub fn bare(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value: clamp_score(value),
            error: 0.0,
            threshold: 0.0,
            tip: None,
        }
    }
}

/// Clamps into `[0, 100]`; NaN counts as the worst score.
#[inline(always)]
pub fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

/// `100 * exp(-k * error)`.
#[inline(always)]
pub fn exp_score(k: f64, error: f64) -> f64 {
    clamp_score(100.0 * (-k * error.max(0.0)).exp())
}

/// A cause a calculator can blame, with the error that would remain if the
/// user corrected it.
pub(crate) struct Candidate {
    pub cause: TipCause,
    pub message: String,
    pub residual_score: f64,
}

/// Builds the score and, below the threshold, the tip with the largest
/// gain. Candidates arrive in their fixed listing order, which decides ties.
pub(crate) fn finish(
    kind: MetricKind,
    value: f64,
    error: f64,
    threshold: f64,
    candidates: Vec<Candidate>,
) -> MetricScore {
    let value = clamp_score(value);
    let tip = if value < threshold {
        let mut ranked: Vec<Tip> = candidates
            .into_iter()
            .map(|c| Tip {
                kind,
                cause: c.cause,
                message: c.message,
                gain: (clamp_score(c.residual_score) - value).max(0.0),
            })
            .collect();
        ranked.sort_by(|a, b| b.gain.total_cmp(&a.gain));
        ranked.into_iter().next().or_else(|| Some(unreadable_tip(kind, value, threshold)))
    } else {
        None
    };

    MetricScore {
        kind,
        value,
        error,
        threshold,
        tip,
    }
}

/// Fallback when a calculator had nothing to measure. The gain assumes
/// legible strokes would at least reach the threshold.
fn unreadable_tip(kind: MetricKind, value: f64, threshold: f64) -> Tip {
    Tip {
        kind,
        cause: TipCause::Unreadable,
        message: format!(
            "획을 알아보기 어려워 {}을(를) 잴 수 없습니다. 획을 다시 확인해 주세요",
            kind.label_ko()
        ),
        gain: (clamp_score(threshold) - value).max(0.0),
    }
}

/// ①..⑳ for authored stroke numbers, plain digits beyond.
pub(crate) fn stroke_label(reference_index: usize) -> String {
    const CIRCLED: [char; 20] = [
        '①', '②', '③', '④', '⑤', '⑥', '⑦', '⑧', '⑨', '⑩', '⑪', '⑫', '⑬', '⑭', '⑮', '⑯', '⑰',
        '⑱', '⑲', '⑳',
    ];
    CIRCLED
        .get(reference_index)
        .map(|c| c.to_string())
        .unwrap_or_else(|| format!("({})", reference_index + 1))
}

pub fn compute(
    kind: MetricKind,
    set: &AlignedStrokeSet,
    reference: &ReferenceCharacter,
    params: &MetricParams,
) -> MetricScore {
    match kind {
        MetricKind::Margin => margin::score(set, reference, params),
        MetricKind::Angle => angle::score(set, reference, params),
        MetricKind::Center => center::score(set, reference, params),
        MetricKind::Shape => shape::score(set, reference, params),
        MetricKind::Guide => guide::score(set, reference, params),
    }
}

/// Runs the five calculators in parallel and returns them in `MetricKind`
/// order.
pub fn compute_all(
    set: &AlignedStrokeSet,
    reference: &ReferenceCharacter,
    params: &MetricParams,
) -> Vec<MetricScore> {
    let kinds: Vec<MetricKind> = MetricKind::iter().collect();
    let mut scores: Vec<MetricScore> = kinds
        .par_iter()
        .map(|&k| compute(k, set, reference, params))
        .collect();
    scores.sort_by_key(|s| s.kind);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_score_bounds() {
        assert_eq!(exp_score(2.0, 0.0), 100.0);
        assert!(exp_score(2.0, 1.0) < 100.0);
        assert_eq!(exp_score(2.0, f64::INFINITY), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
    }

    #[test]
    fn test_tip_only_below_threshold() {
        let mk = || {
            vec![Candidate {
                cause: TipCause::CenterHorizontal,
                message: "x".to_string(),
                residual_score: 100.0,
            }]
        };
        assert!(finish(MetricKind::Center, 80.0, 0.1, 75.0, mk()).tip.is_none());
        let s = finish(MetricKind::Center, 60.0, 0.1, 75.0, mk());
        assert_eq!(s.tip.unwrap().gain, 40.0);
    }

    #[test]
    fn test_low_score_without_candidates_still_tips() {
        let s = finish(MetricKind::Margin, 0.0, 1.0, 75.0, Vec::new());
        let tip = s.tip.expect("fallback tip");
        assert_eq!(tip.cause, TipCause::Unreadable);
        assert_eq!(tip.kind, MetricKind::Margin);
        assert_eq!(tip.gain, 75.0);
        assert!(tip.message.contains("여백"));

        assert!(finish(MetricKind::Guide, 100.0, 0.0, 75.0, Vec::new()).tip.is_none());
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(MetricKind::Shape.priority(), 0);
        assert_eq!(MetricKind::Guide.priority(), 4);
        assert_eq!(MetricKind::Margin.to_string(), "margin");
    }
}
