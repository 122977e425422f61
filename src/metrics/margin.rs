use super::{exp_score, finish, Candidate, MetricKind, MetricScore, TipCause};
use crate::aligner::AlignedStrokeSet;
use crate::config::MetricParams;
use crate::geometry::{densify, BoundingBox, Point};
use crate::reference::ReferenceCharacter;

const SAMPLE_SPACING: f64 = 0.02;
/// Half-width of the ramp across each midline, in cell units.
const MIDLINE_BAND: f64 = 0.05;
const SIDE_NAMES: [&str; 4] = ["왼쪽", "위쪽", "오른쪽", "아래쪽"];

/// Whitespace picture of a character inside the unit cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// left, top, right, bottom
    pub margins: [f64; 4],
    /// Ink bounding box area over cell area.
    pub fill: f64,
    /// Share of ink in each quadrant: TL, TR, BL, BR. Ink near a midline
    /// is split between both sides.
    pub quadrants: [f64; 4],
}

impl Layout {
    pub fn of<'a, I>(strokes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [Point]>,
    {
        let mut samples: Vec<Point> = Vec::new();
        for s in strokes {
            samples.extend(densify(s, SAMPLE_SPACING));
        }
        let samples: Vec<Point> = samples
            .into_iter()
            .filter(|p| p.is_finite())
            .map(|p| Point::new(p.x.clamp(0.0, 1.0), p.y.clamp(0.0, 1.0)))
            .collect();
        let bb = BoundingBox::from_points(samples.iter())?;

        let mut quadrants = [0.0_f64; 4];
        for p in &samples {
            let r = far_share(p.x);
            let b = far_share(p.y);
            quadrants[0] += (1.0 - r) * (1.0 - b);
            quadrants[1] += r * (1.0 - b);
            quadrants[2] += (1.0 - r) * b;
            quadrants[3] += r * b;
        }
        let n = samples.len() as f64;
        for q in &mut quadrants {
            *q /= n;
        }

        Some(Self {
            margins: [bb.min_x, bb.min_y, 1.0 - bb.max_x, 1.0 - bb.max_y],
            fill: bb.area(),
            quadrants,
        })
    }
}

/// How much of a sample at `v` counts towards the right (or bottom) half.
/// Linear across the midline band so the split has no jump.
#[inline(always)]
fn far_share(v: f64) -> f64 {
    ((v - 0.5) / (2.0 * MIDLINE_BAND) + 0.5).clamp(0.0, 1.0)
}

struct Breakdown {
    sides: f64,
    fill: f64,
    balance: f64,
}

impl Breakdown {
    fn between(cap: &Layout, reference: &Layout) -> Self {
        let sides = cap
            .margins
            .iter()
            .zip(&reference.margins)
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / 4.0;
        let balance = 0.5
            * cap
                .quadrants
                .iter()
                .zip(&reference.quadrants)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>();
        Self {
            sides,
            fill: 0.5 * (cap.fill - reference.fill).abs(),
            balance: 0.5 * balance,
        }
    }

    fn total(&self) -> f64 {
        self.sides + self.fill + self.balance
    }
}

pub fn score(
    set: &AlignedStrokeSet,
    reference: &ReferenceCharacter,
    params: &MetricParams,
) -> MetricScore {
    let threshold = params.tip_threshold(MetricKind::Margin);
    let k = params.k_margin;

    let cap = Layout::of(set.strokes.iter().map(|s| s.placed.as_slice()));
    let refl = Layout::of(reference.strokes.iter().map(|s| s.points.as_slice()));
    let (cap, refl) = match (cap, refl) {
        (Some(c), Some(r)) => (c, r),
        // Nothing measurable
        _ => return finish(MetricKind::Margin, 0.0, 1.0, threshold, Vec::new()),
    };

    let b = Breakdown::between(&cap, &refl);
    let error = b.total();
    let value = exp_score(k, error);

    let (worst_side, worst_diff) = cap
        .margins
        .iter()
        .zip(&refl.margins)
        .map(|(a, r)| a - r)
        .enumerate()
        .fold((0, 0.0_f64), |best, (i, d)| if d.abs() > best.1.abs() { (i, d) } else { best });
    let side_msg = if worst_diff > 0.0 {
        format!("{} 여백이 넓습니다. 글자를 그쪽으로 조금 넓혀 써보세요", SIDE_NAMES[worst_side])
    } else {
        format!("{} 여백이 좁습니다. 획이 칸 끝에 너무 붙지 않게 써보세요", SIDE_NAMES[worst_side])
    };
    let fill_msg = if cap.fill > refl.fill {
        "글자가 칸에 비해 큽니다. 조금 작게 써서 여백을 남겨보세요".to_string()
    } else {
        "글자가 칸에 비해 작습니다. 칸을 채우도록 조금 크게 써보세요".to_string()
    };

    let candidates = vec![
        Candidate {
            cause: TipCause::MarginSides,
            message: side_msg,
            residual_score: exp_score(k, error - b.sides),
        },
        Candidate {
            cause: TipCause::MarginFill,
            message: fill_msg,
            residual_score: exp_score(k, error - b.fill),
        },
        Candidate {
            cause: TipCause::MarginBalance,
            message: "좌우·상하 균형을 조금 더 맞춰주세요".to_string(),
            residual_score: exp_score(k, error - b.balance),
        },
    ];

    finish(MetricKind::Margin, value, error, threshold, candidates)
}
