use crate::error::{GyResult, GyeolguError};
use crate::metrics::MetricKind;
use clap::{parser::ValueSource, ArgAction, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub extraction: ExtractionParams,
    #[command(flatten)]
    pub alignment: AlignmentParams,
    #[command(flatten)]
    pub metrics: MetricParams,
    #[command(flatten)]
    pub weights: ScoringWeights,
    #[command(flatten)]
    pub grading: GradingParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionParams {
    // Fixed binarisation threshold; Otsu when absent
    #[arg(long)]
    pub ink_threshold: Option<u8>,
    // Otsu is capped here so paper texture never becomes ink
    #[arg(long, default_value_t = 160)]
    pub max_ink_luma: u8,
    #[arg(long, default_value_t = 12)]
    pub min_component_area: usize,
    #[arg(long, default_value_t = 1)]
    pub min_strokes: usize,
    #[arg(long, default_value_t = 50)]
    pub max_strokes: usize,
    #[arg(long, default_value_t = 1.5)]
    pub simplify_epsilon: f64,
    #[arg(long, default_value_t = 1.0)]
    pub guide_slack: f64,
    // Turns sharper than this split a traced path into separate strokes
    #[arg(long, default_value_t = 50.0)]
    pub corner_angle_deg: f64,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            ink_threshold: None,
            max_ink_luma: 160,
            min_component_area: 12,
            min_strokes: 1,
            max_strokes: 50,
            simplify_epsilon: 1.5,
            guide_slack: 1.0,
            corner_angle_deg: 50.0,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    #[arg(long, default_value_t = 2)]
    pub stroke_count_tolerance: usize,
    #[arg(long, default_value_t = 25)]
    pub max_iterations: usize,
    #[arg(long, default_value_t = 1e-7)]
    pub convergence_epsilon: f64,
    #[arg(long, default_value_t = 30.0)]
    pub max_rotation_deg: f64,
    // Cost added per position of authored-order distance; tie-break only
    #[arg(long, default_value_t = 1e-4)]
    pub order_tie_break: f64,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            stroke_count_tolerance: 2,
            max_iterations: 25,
            convergence_epsilon: 1e-7,
            max_rotation_deg: 30.0,
            order_tie_break: 1e-4,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricParams {
    // === CALIBRATION (score = 100 * exp(-k * error)) ===
    #[arg(long, default_value_t = 2.0)]
    pub k_margin: f64,
    #[arg(long, default_value_t = 0.03)]
    pub k_angle: f64,
    #[arg(long, default_value_t = 5.0)]
    pub k_center: f64,
    #[arg(long, default_value_t = 8.0)]
    pub k_shape: f64,
    // Guide is a linear falloff: 100 * (1 - k * outside_fraction)
    #[arg(long, default_value_t = 1.0)]
    pub k_guide: f64,

    // === TIP THRESHOLDS ===
    #[arg(long, default_value_t = 75.0)]
    pub tip_threshold_margin: f64,
    #[arg(long, default_value_t = 75.0)]
    pub tip_threshold_angle: f64,
    #[arg(long, default_value_t = 75.0)]
    pub tip_threshold_center: f64,
    #[arg(long, default_value_t = 75.0)]
    pub tip_threshold_shape: f64,
    #[arg(long, default_value_t = 75.0)]
    pub tip_threshold_guide: f64,

    // === DETAILS ===
    #[arg(long, default_value_t = 0.5)]
    pub angle_outlier_weight: f64,
    #[arg(long, default_value_t = 32)]
    pub shape_samples: usize,
    // Fréchet-equivalent error charged per reference stroke left unmatched
    #[arg(long, default_value_t = 0.5)]
    pub missing_stroke_error: f64,
    #[arg(long, default_value_t = 2.0)]
    pub guide_sample_spacing: f64,
}

impl Default for MetricParams {
    fn default() -> Self {
        Self {
            k_margin: 2.0,
            k_angle: 0.03,
            k_center: 5.0,
            k_shape: 8.0,
            k_guide: 1.0,
            tip_threshold_margin: 75.0,
            tip_threshold_angle: 75.0,
            tip_threshold_center: 75.0,
            tip_threshold_shape: 75.0,
            tip_threshold_guide: 75.0,
            angle_outlier_weight: 0.5,
            shape_samples: 32,
            missing_stroke_error: 0.5,
            guide_sample_spacing: 2.0,
        }
    }
}

impl MetricParams {
    pub fn tip_threshold(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Margin => self.tip_threshold_margin,
            MetricKind::Angle => self.tip_threshold_angle,
            MetricKind::Center => self.tip_threshold_center,
            MetricKind::Shape => self.tip_threshold_shape,
            MetricKind::Guide => self.tip_threshold_guide,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    #[arg(long, default_value_t = 0.15)]
    pub weight_margin: f64,
    #[arg(long, default_value_t = 0.15)]
    pub weight_angle: f64,
    #[arg(long, default_value_t = 0.25)]
    pub weight_center: f64,
    #[arg(long, default_value_t = 0.31)]
    pub weight_shape: f64,
    #[arg(long, default_value_t = 0.14)]
    pub weight_guide: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            weight_margin: 0.15,
            weight_angle: 0.15,
            weight_center: 0.25,
            weight_shape: 0.31,
            weight_guide: 0.14,
        }
    }
}

impl ScoringWeights {
    pub const SUM_TOLERANCE: f64 = 1e-6;

    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Margin => self.weight_margin,
            MetricKind::Angle => self.weight_angle,
            MetricKind::Center => self.weight_center,
            MetricKind::Shape => self.weight_shape,
            MetricKind::Guide => self.weight_guide,
        }
    }

    pub fn sum(&self) -> f64 {
        self.weight_margin + self.weight_angle + self.weight_center + self.weight_shape + self.weight_guide
    }

    pub fn validate(&self) -> GyResult<()> {
        let all = [
            self.weight_margin,
            self.weight_angle,
            self.weight_center,
            self.weight_shape,
            self.weight_guide,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(GyeolguError::Config(
                "Weights must be finite and non-negative".to_string(),
            ));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(GyeolguError::Config(format!(
                "Weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingParams {
    // "min:letter" pairs, any order
    #[arg(long, default_value = "90:A,80:B,70:C,60:D,0:F")]
    pub grade_table: String,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub grade_subdivide: bool,
    #[arg(long, default_value_t = 3)]
    pub max_tips: usize,
}

impl Default for GradingParams {
    fn default() -> Self {
        Self {
            grade_table: "90:A,80:B,70:C,60:D,0:F".to_string(),
            grade_subdivide: true,
            max_tips: 3,
        }
    }
}

impl GradingParams {
    /// Parses `grade_table` into `(minimum, letter)` pairs sorted by
    /// descending minimum.
    pub fn get_grade_bands(&self) -> GyResult<Vec<(f64, String)>> {
        let mut bands = Vec::new();
        for entry in self.grade_table.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (min, letter) = entry.split_once(':').ok_or_else(|| {
                GyeolguError::Config(format!("Grade band '{}' is not 'min:letter'", entry))
            })?;
            let min: f64 = min.trim().parse().map_err(|_| {
                GyeolguError::Config(format!("Invalid number in grade band '{}'", entry))
            })?;
            let letter = letter.trim();
            if letter.is_empty() || !min.is_finite() {
                return Err(GyeolguError::Config(format!(
                    "Invalid grade band '{}'",
                    entry
                )));
            }
            bands.push((min, letter.to_string()));
        }
        if bands.is_empty() {
            return Err(GyeolguError::Config("Grade table is empty".to_string()));
        }
        bands.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(bands)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GyResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GyResult<()> {
        self.weights.validate()?;
        self.grading.get_grade_bands()?;
        if self.extraction.min_strokes > self.extraction.max_strokes {
            return Err(GyeolguError::Config(format!(
                "min_strokes ({}) exceeds max_strokes ({})",
                self.extraction.min_strokes, self.extraction.max_strokes
            )));
        }
        if !(0.0..180.0).contains(&self.extraction.corner_angle_deg) {
            return Err(GyeolguError::Config(format!(
                "corner_angle_deg must be in [0, 180), got {}",
                self.extraction.corner_angle_deg
            )));
        }
        let spacing = self.metrics.guide_sample_spacing;
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(GyeolguError::Config(format!(
                "guide_sample_spacing must be a positive number, got {}",
                spacing
            )));
        }
        if self.metrics.shape_samples < 2 {
            return Err(GyeolguError::Config(
                "shape_samples must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Copies every value the user typed on the command line over `self`
    /// (typically loaded from a file), leaving file values for the rest.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($section:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$section.$field = cli.$section.$field.clone();
                }
            };
        }

        update_if_present!(extraction.ink_threshold);
        update_if_present!(extraction.max_ink_luma);
        update_if_present!(extraction.min_component_area);
        update_if_present!(extraction.min_strokes);
        update_if_present!(extraction.max_strokes);
        update_if_present!(extraction.simplify_epsilon);
        update_if_present!(extraction.guide_slack);
        update_if_present!(extraction.corner_angle_deg);

        update_if_present!(alignment.stroke_count_tolerance);
        update_if_present!(alignment.max_iterations);
        update_if_present!(alignment.convergence_epsilon);
        update_if_present!(alignment.max_rotation_deg);
        update_if_present!(alignment.order_tie_break);

        update_if_present!(metrics.k_margin);
        update_if_present!(metrics.k_angle);
        update_if_present!(metrics.k_center);
        update_if_present!(metrics.k_shape);
        update_if_present!(metrics.k_guide);
        update_if_present!(metrics.tip_threshold_margin);
        update_if_present!(metrics.tip_threshold_angle);
        update_if_present!(metrics.tip_threshold_center);
        update_if_present!(metrics.tip_threshold_shape);
        update_if_present!(metrics.tip_threshold_guide);
        update_if_present!(metrics.angle_outlier_weight);
        update_if_present!(metrics.shape_samples);
        update_if_present!(metrics.missing_stroke_error);
        update_if_present!(metrics.guide_sample_spacing);

        update_if_present!(weights.weight_margin);
        update_if_present!(weights.weight_angle);
        update_if_present!(weights.weight_center);
        update_if_present!(weights.weight_shape);
        update_if_present!(weights.weight_guide);

        update_if_present!(grading.grade_table);
        update_if_present!(grading.grade_subdivide);
        update_if_present!(grading.max_tips);
    }
}
