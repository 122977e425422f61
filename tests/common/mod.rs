#![allow(dead_code)]

use chrono::{DateTime, Utc};
use gyeolgu::error::StorageError;
use gyeolgu::extractor::CapturedStroke;
use gyeolgu::geometry::Point;
use gyeolgu::grader::EvaluationResult;
use gyeolgu::metrics::{MetricKind, MetricScore};
use gyeolgu::raster::InkImage;
use gyeolgu::reference::ReferenceCharacter;
use gyeolgu::store::{EvaluationSession, SessionId, SessionStore};

pub const CELL: usize = 200;
pub const PEN: f64 = 3.0;

/// 中 as the built-in reference stores it.
pub const ZHONG: [&[(f64, f64)]; 4] = [
    &[(0.22, 0.30), (0.22, 0.68)],
    &[(0.22, 0.30), (0.78, 0.30), (0.78, 0.68)],
    &[(0.22, 0.68), (0.78, 0.68)],
    &[(0.50, 0.08), (0.50, 0.92)],
];

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

/// Paints a round-capped polyline (pixel coordinates) in black.
pub fn draw_polyline(img: &mut InkImage, points: &[(f64, f64)], radius: f64) {
    let segments: Vec<((f64, f64), (f64, f64))> = if points.len() == 1 {
        vec![(points[0], points[0])]
    } else {
        points.windows(2).map(|w| (w[0], w[1])).collect()
    };
    for (a, b) in segments {
        let x0 = (a.0.min(b.0) - radius - 1.0).floor().max(0.0) as usize;
        let y0 = (a.1.min(b.1) - radius - 1.0).floor().max(0.0) as usize;
        let x1 = ((a.0.max(b.0) + radius + 1.0).ceil() as usize).min(img.width - 1);
        let y1 = ((a.1.max(b.1) + radius + 1.0).ceil() as usize).min(img.height - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let c = (x as f64 + 0.5, y as f64 + 0.5);
                if segment_distance(c, a, b) <= radius {
                    img.set(x, y, 0);
                }
            }
        }
    }
}

/// Renders strokes given in unit-cell coordinates onto a `size`² page.
pub fn render_unit(size: usize, strokes: &[&[(f64, f64)]], radius: f64) -> InkImage {
    let mut img = InkImage::blank(size, size);
    let s = size as f64;
    for stroke in strokes {
        let px: Vec<(f64, f64)> = stroke.iter().map(|&(x, y)| (x * s, y * s)).collect();
        draw_polyline(&mut img, &px, radius);
    }
    img
}

pub fn zhong_image() -> InkImage {
    render_unit(CELL, &ZHONG, PEN)
}

/// The reference strokes placed on a `size`² image, as an input device
/// would deliver them.
pub fn strokes_from_reference(reference: &ReferenceCharacter, size: f64) -> Vec<CapturedStroke> {
    reference
        .strokes
        .iter()
        .enumerate()
        .map(|(i, s)| {
            CapturedStroke::from_points(
                i,
                s.points
                    .iter()
                    .map(|p| Point::new(p.x * size, p.y * size))
                    .collect(),
            )
        })
        .collect()
}

pub fn unit_strokes(strokes: &[&[(f64, f64)]], size: f64) -> Vec<CapturedStroke> {
    strokes
        .iter()
        .enumerate()
        .map(|(i, s)| {
            CapturedStroke::from_points(
                i,
                s.iter().map(|&(x, y)| Point::new(x * size, y * size)).collect(),
            )
        })
        .collect()
}

/// Margin 82, angle 74, center 95, shape 63, guide 68.
pub fn mock_scores() -> Vec<MetricScore> {
    vec![
        MetricScore::bare(MetricKind::Margin, 82.0),
        MetricScore::bare(MetricKind::Angle, 74.0),
        MetricScore::bare(MetricKind::Center, 95.0),
        MetricScore::bare(MetricKind::Shape, 63.0),
        MetricScore::bare(MetricKind::Guide, 68.0),
    ]
}

/// A store whose disk is gone.
pub struct FailingStore;

impl SessionStore for FailingStore {
    fn record_at(
        &self,
        _result: &EvaluationResult,
        _image_ref: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }

    fn snapshot(&self) -> Result<Vec<EvaluationSession>, StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }
}
