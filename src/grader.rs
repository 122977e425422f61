use crate::config::{GradingParams, ScoringWeights};
use crate::error::{GyResult, GyeolguError};
use crate::metrics::{MetricKind, MetricScore, Tip};
use crate::reference::Difficulty;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub character_id: String,
    pub final_score: f64,
    pub grade: String,
    /// One entry per metric, in `MetricKind` order.
    pub metrics: Vec<MetricScore>,
    pub tips: Vec<Tip>,
    /// Signed change against the previous result for the same character.
    pub improvement: Option<f64>,
    pub difficulty: Difficulty,
    pub stroke_count: usize,
}

impl EvaluationResult {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricScore> {
        self.metrics.iter().find(|m| m.kind == kind)
    }
}

#[inline(always)]
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Weighted sum of the five metric values, rounded to one decimal.
///
/// Requires each metric exactly once; the order they arrive in does not
/// matter.
pub fn aggregate(scores: &[MetricScore], weights: &ScoringWeights) -> GyResult<f64> {
    let mut values: [Option<f64>; 5] = [None; 5];
    for s in scores {
        let slot = &mut values[s.kind as usize];
        if slot.is_some() {
            return Err(GyeolguError::Validation(format!(
                "Metric '{}' supplied twice",
                s.kind
            )));
        }
        *slot = Some(s.value);
    }

    // Summed in a fixed order so the result is bit-identical for any input order
    let mut total = 0.0;
    for kind in MetricKind::iter() {
        let v = values[kind as usize].ok_or_else(|| {
            GyeolguError::Validation(format!("Metric '{}' is missing", kind))
        })?;
        total += weights.get(kind) * v;
    }
    Ok(round1(total))
}

/// Ordered `(minimum, letter)` bands with optional `+` on the upper half of
/// every band except the lowest.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeTable {
    bands: Vec<(f64, String)>,
    subdivide: bool,
}

impl GradeTable {
    pub const MAX_SCORE: f64 = 100.0;

    pub fn new(mut bands: Vec<(f64, String)>, subdivide: bool) -> GyResult<Self> {
        if bands.is_empty() {
            return Err(GyeolguError::Config("Grade table is empty".to_string()));
        }
        bands.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(Self { bands, subdivide })
    }

    pub fn from_params(params: &GradingParams) -> GyResult<Self> {
        Self::new(params.get_grade_bands()?, params.grade_subdivide)
    }

    pub fn bands(&self) -> &[(f64, String)] {
        &self.bands
    }

    pub fn grade(&self, score: f64) -> String {
        let last = self.bands.len() - 1;
        for (i, (min, letter)) in self.bands.iter().enumerate() {
            if score < *min && i < last {
                continue;
            }
            if !self.subdivide || i == last {
                return letter.clone();
            }
            let upper = if i == 0 {
                Self::MAX_SCORE.max(*min)
            } else {
                self.bands[i - 1].0
            };
            let half = min + (upper - min) * 0.5;
            return if score >= half && upper > *min {
                format!("{}+", letter)
            } else {
                letter.clone()
            };
        }
        // Unreachable with a non-empty table
        self.bands[last].1.clone()
    }
}

impl Default for GradeTable {
    fn default() -> Self {
        Self {
            bands: vec![
                (90.0, "A".to_string()),
                (80.0, "B".to_string()),
                (70.0, "C".to_string()),
                (60.0, "D".to_string()),
                (0.0, "F".to_string()),
            ],
            subdivide: true,
        }
    }
}

/// Tips of metrics below their threshold, largest shortfall first; equal
/// shortfalls follow `MetricKind::TIP_PRIORITY`.
pub fn rank_tips(scores: &[MetricScore], max_tips: usize) -> Vec<Tip> {
    let mut ranked: Vec<(f64, usize, &Tip)> = scores
        .iter()
        .filter_map(|s| s.tip.as_ref().map(|t| (s.threshold - s.value, s.kind.priority(), t)))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .take(max_tips)
        .map(|(_, _, t)| t.clone())
        .collect()
}

pub fn improvement_delta(final_score: f64, previous: Option<f64>) -> Option<f64> {
    previous.map(|p| round1(final_score - p))
}

/// Turns metric scores into a graded result.
#[derive(Debug, Clone)]
pub struct Grader {
    weights: ScoringWeights,
    table: GradeTable,
    max_tips: usize,
}

impl Grader {
    pub fn new(weights: ScoringWeights, grading: &GradingParams) -> GyResult<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            table: GradeTable::from_params(grading)?,
            max_tips: grading.max_tips,
        })
    }

    pub fn table(&self) -> &GradeTable {
        &self.table
    }

    pub fn grade(
        &self,
        character_id: &str,
        difficulty: Difficulty,
        stroke_count: usize,
        mut metrics: Vec<MetricScore>,
        previous: Option<f64>,
    ) -> GyResult<EvaluationResult> {
        let final_score = aggregate(&metrics, &self.weights)?;
        metrics.sort_by_key(|m| m.kind);
        Ok(EvaluationResult {
            character_id: character_id.to_string(),
            final_score,
            grade: self.table.grade(final_score),
            tips: rank_tips(&metrics, self.max_tips),
            metrics,
            improvement: improvement_delta(final_score, previous),
            difficulty,
            stroke_count,
        })
    }
}
