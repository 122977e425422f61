use crate::geometry::{polyline_centroid, Point};

/// Endpoints and centroid of one stroke, the features the matcher works on.
#[derive(Debug, Clone, Copy)]
pub struct StrokeFeatures {
    pub start: Point,
    pub end: Point,
    pub centroid: Point,
}

impl StrokeFeatures {
    pub fn of(points: &[Point]) -> Self {
        let start = points.first().copied().unwrap_or_default();
        let end = points.last().copied().unwrap_or(start);
        Self {
            start,
            end,
            centroid: polyline_centroid(points),
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            start: self.end,
            end: self.start,
            centroid: self.centroid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub captured: usize,
    pub reference: usize,
    pub reversed: bool,
    pub cost: f64,
}

/// Cost of pairing a captured stroke with a reference stroke, and whether the
/// captured stroke should be read backwards.
#[inline(always)]
pub fn pair_cost(cap: &StrokeFeatures, reference: &StrokeFeatures) -> (f64, bool) {
    let forward = cap.start.dist(&reference.start) + cap.end.dist(&reference.end);
    let backward = cap.start.dist(&reference.end) + cap.end.dist(&reference.start);
    let centroid = cap.centroid.dist(&reference.centroid);
    if backward < forward {
        ((backward + centroid) / 3.0, true)
    } else {
        ((forward + centroid) / 3.0, false)
    }
}

/// Greedy one-to-one matching on ascending cost, then every leftover captured
/// stroke is attached to its cheapest reference stroke. Authored order only
/// nudges equal costs apart via `order_tie_break`.
///
/// Returns the matches sorted by captured index and the reference strokes no
/// captured stroke was paired with.
pub fn assign(
    captured: &[StrokeFeatures],
    reference: &[StrokeFeatures],
    order_tie_break: f64,
) -> (Vec<Match>, Vec<usize>) {
    let mut pairs = Vec::with_capacity(captured.len() * reference.len());
    for (i, c) in captured.iter().enumerate() {
        for (j, r) in reference.iter().enumerate() {
            let (cost, reversed) = pair_cost(c, r);
            let order = (i as f64 - j as f64).abs() * order_tie_break;
            pairs.push(Match {
                captured: i,
                reference: j,
                reversed,
                cost: cost + order,
            });
        }
    }
    pairs.sort_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            .then(a.captured.cmp(&b.captured))
            .then(a.reference.cmp(&b.reference))
    });

    let mut cap_used = vec![false; captured.len()];
    let mut ref_used = vec![false; reference.len()];
    let mut matches = Vec::with_capacity(captured.len());

    for p in &pairs {
        if !cap_used[p.captured] && !ref_used[p.reference] {
            cap_used[p.captured] = true;
            ref_used[p.reference] = true;
            matches.push(*p);
        }
    }

    // Extra strokes (pieces of a broken stroke, stray marks)
    for p in &pairs {
        if !cap_used[p.captured] {
            cap_used[p.captured] = true;
            matches.push(*p);
        }
    }

    matches.sort_by_key(|m| m.captured);
    let unmatched = ref_used
        .iter()
        .enumerate()
        .filter_map(|(j, used)| if *used { None } else { Some(j) })
        .collect();
    (matches, unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feat(a: (f64, f64), b: (f64, f64)) -> StrokeFeatures {
        StrokeFeatures::of(&[Point::new(a.0, a.1), Point::new(b.0, b.1)])
    }

    #[test]
    fn test_detects_reversed_stroke() {
        let r = feat((0.0, 0.5), (1.0, 0.5));
        let c = feat((1.0, 0.5), (0.0, 0.5));
        let (cost, reversed) = pair_cost(&c, &r);
        assert!(reversed);
        assert!(cost < 1e-12);
    }

    #[test]
    fn test_drawing_order_does_not_matter() {
        let refs = vec![feat((0.0, 0.2), (1.0, 0.2)), feat((0.5, 0.0), (0.5, 1.0))];
        // Vertical drawn first
        let caps = vec![feat((0.5, 0.0), (0.5, 1.0)), feat((0.0, 0.2), (1.0, 0.2))];
        let (m, unmatched) = assign(&caps, &refs, 1e-4);
        assert!(unmatched.is_empty());
        assert_eq!(m[0].reference, 1);
        assert_eq!(m[1].reference, 0);
    }

    #[test]
    fn test_broken_stroke_maps_both_pieces() {
        let refs = vec![feat((0.0, 0.2), (1.0, 0.2)), feat((0.5, 0.0), (0.5, 1.0))];
        let caps = vec![
            feat((0.0, 0.2), (0.45, 0.2)),
            feat((0.55, 0.2), (1.0, 0.2)),
            feat((0.5, 0.0), (0.5, 1.0)),
        ];
        let (m, unmatched) = assign(&caps, &refs, 1e-4);
        assert_eq!(m.len(), 3);
        assert_eq!(m[0].reference, 0);
        assert_eq!(m[1].reference, 0);
        assert_eq!(m[2].reference, 1);
        assert!(unmatched.is_empty());
    }

    #[test]
    fn test_missing_reference_stroke_reported() {
        let refs = vec![
            feat((0.0, 0.2), (1.0, 0.2)),
            feat((0.0, 0.8), (1.0, 0.8)),
            feat((0.5, 0.0), (0.5, 1.0)),
        ];
        let caps = vec![feat((0.0, 0.2), (1.0, 0.2)), feat((0.5, 0.0), (0.5, 1.0))];
        let (m, unmatched) = assign(&caps, &refs, 1e-4);
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].reference, 0);
        assert_eq!(m[1].reference, 2);
        assert_eq!(unmatched, vec![1]);
    }
}
