use crate::error::{GyResult, GyeolguError};
use crate::geometry::{polyline_moments, BoundingBox, Point};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::info;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
    EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Label used by the app screens (초급/중급/고급).
    pub fn label_ko(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "초급",
            Difficulty::Intermediate => "중급",
            Difficulty::Advanced => "고급",
        }
    }
}

/// One canonical stroke, in unit-cell coordinates (y down).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStroke {
    /// Authored stroke-order number; used as a tie-break only.
    pub order: u32,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCharacter {
    /// The glyph itself, e.g. "中".
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub strokes: Vec<ReferenceStroke>,
    pub expected_strokes: usize,
    pub difficulty: Difficulty,
}

impl ReferenceCharacter {
    pub fn validate(&self) -> GyResult<()> {
        let fail = |msg: String| Err(GyeolguError::Validation(format!("'{}': {}", self.id, msg)));

        if self.id.trim().is_empty() {
            return Err(GyeolguError::Validation(
                "Reference character has an empty id".to_string(),
            ));
        }
        if self.strokes.is_empty() {
            return fail("skeleton has no strokes".to_string());
        }
        if self.expected_strokes != self.strokes.len() {
            return fail(format!(
                "expected_strokes is {} but skeleton has {} strokes",
                self.expected_strokes,
                self.strokes.len()
            ));
        }
        let mut orders = HashSet::new();
        for s in &self.strokes {
            if !orders.insert(s.order) {
                return fail(format!("duplicate stroke order {}", s.order));
            }
            if s.points.len() < 2 {
                return fail(format!("stroke {} has fewer than 2 points", s.order));
            }
            let inside = s
                .points
                .iter()
                .all(|p| p.is_finite() && (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y));
            if !inside {
                return fail(format!("stroke {} leaves the unit cell", s.order));
            }
        }
        Ok(())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.strokes.iter().flat_map(|s| s.points.iter()))
            .unwrap_or(BoundingBox::new(0.0, 0.0, 1.0, 1.0))
    }

    /// Arc-length weighted centroid of the whole skeleton.
    pub fn centroid(&self) -> Point {
        let (mass, cx, cy) = self
            .strokes
            .iter()
            .map(|s| polyline_moments(&s.points))
            .fold((0.0, 0.0, 0.0), |a, m| (a.0 + m.0, a.1 + m.1, a.2 + m.2));
        if mass > f64::EPSILON {
            Point::new(cx / mass, cy / mass)
        } else {
            self.bounding_box().center()
        }
    }

    /// Strokes in authored order.
    pub fn ordered_strokes(&self) -> Vec<&ReferenceStroke> {
        let mut v: Vec<&ReferenceStroke> = self.strokes.iter().collect();
        v.sort_by_key(|s| s.order);
        v
    }
}

/// Immutable set of reference characters, keyed by glyph.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    chars: BTreeMap<String, Arc<ReferenceCharacter>>,
}

impl ReferenceCatalog {
    pub fn from_characters(list: Vec<ReferenceCharacter>) -> GyResult<Self> {
        let mut chars = BTreeMap::new();
        for mut c in list {
            c.validate()?;
            c.strokes.sort_by_key(|s| s.order);
            let id = c.id.clone();
            if chars.insert(id.clone(), Arc::new(c)).is_some() {
                return Err(GyeolguError::Validation(format!(
                    "Duplicate reference character '{}'",
                    id
                )));
            }
        }
        Ok(Self { chars })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GyResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let list: Vec<ReferenceCharacter> = serde_json::from_str(&content)?;
        let catalog = Self::from_characters(list)?;
        info!(
            "📚 Loaded {} reference characters from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ReferenceCharacter>> {
        self.chars.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ReferenceCharacter>> {
        self.chars.values()
    }

    /// The beginner set shipped with the app: 中, 十, 口, 日, 田.
    pub fn builtin() -> Self {
        let list = vec![
            character(
                "中",
                "가운데 중",
                Difficulty::Beginner,
                &[
                    &[(0.22, 0.30), (0.22, 0.68)],
                    &[(0.22, 0.30), (0.78, 0.30), (0.78, 0.68)],
                    &[(0.22, 0.68), (0.78, 0.68)],
                    &[(0.50, 0.08), (0.50, 0.92)],
                ],
            ),
            character(
                "十",
                "열 십",
                Difficulty::Beginner,
                &[&[(0.12, 0.45), (0.88, 0.45)], &[(0.50, 0.10), (0.50, 0.90)]],
            ),
            character(
                "口",
                "입 구",
                Difficulty::Beginner,
                &[
                    &[(0.25, 0.25), (0.25, 0.75)],
                    &[(0.25, 0.25), (0.75, 0.25), (0.75, 0.75)],
                    &[(0.25, 0.75), (0.75, 0.75)],
                ],
            ),
            character(
                "日",
                "날 일",
                Difficulty::Intermediate,
                &[
                    &[(0.30, 0.15), (0.30, 0.85)],
                    &[(0.30, 0.15), (0.70, 0.15), (0.70, 0.85)],
                    &[(0.30, 0.50), (0.70, 0.50)],
                    &[(0.30, 0.85), (0.70, 0.85)],
                ],
            ),
            character(
                "田",
                "밭 전",
                Difficulty::Intermediate,
                &[
                    &[(0.20, 0.20), (0.20, 0.80)],
                    &[(0.20, 0.20), (0.80, 0.20), (0.80, 0.80)],
                    &[(0.20, 0.50), (0.80, 0.50)],
                    &[(0.50, 0.20), (0.50, 0.80)],
                    &[(0.20, 0.80), (0.80, 0.80)],
                ],
            ),
        ];

        let mut chars = BTreeMap::new();
        for c in list {
            chars.insert(c.id.clone(), Arc::new(c));
        }
        Self { chars }
    }
}

fn character(
    id: &str,
    name: &str,
    difficulty: Difficulty,
    strokes: &[&[(f64, f64)]],
) -> ReferenceCharacter {
    ReferenceCharacter {
        id: id.to_string(),
        name: name.to_string(),
        expected_strokes: strokes.len(),
        difficulty,
        strokes: strokes
            .iter()
            .enumerate()
            .map(|(i, pts)| ReferenceStroke {
                order: i as u32 + 1,
                points: pts.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_characters_are_valid() {
        let catalog = ReferenceCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        for c in catalog.iter() {
            c.validate().unwrap();
        }
        assert_eq!(catalog.get("中").unwrap().expected_strokes, 4);
    }

    #[test]
    fn test_rejects_count_disagreement() {
        let mut c = (*ReferenceCatalog::builtin().get("十").unwrap()).clone();
        c.expected_strokes = 3;
        assert!(c.validate().is_err());
    }
}
