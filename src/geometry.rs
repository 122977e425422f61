use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub fn dist(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    #[inline(always)]
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Returns `None` for an empty point set.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in iter {
            bb.include(p);
        }
        Some(bb)
    }

    pub fn include(&mut self, p: &Point) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn width(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max_y - self.min_y).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn inflate(&self, margin: f64) -> BoundingBox {
        BoundingBox::new(
            self.min_x - margin,
            self.min_y - margin,
            self.max_x + margin,
            self.max_y + margin,
        )
    }
}

/// `p' = s * R(θ) * p + t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    pub rotation: f64,
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl SimilarityTransform {
    pub const fn identity() -> Self {
        Self {
            rotation: 0.0,
            scale: 1.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    #[inline(always)]
    pub fn apply(&self, p: &Point) -> Point {
        let (sin, cos) = self.rotation.sin_cos();
        Point::new(
            self.scale * (cos * p.x - sin * p.y) + self.tx,
            self.scale * (sin * p.x + cos * p.y) + self.ty,
        )
    }

    pub fn apply_all(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Closed-form least-squares similarity (2D Umeyama without reflection)
    /// mapping `src[i]` onto `dst[i]`. Returns `None` when the source set
    /// has no spread.
    pub fn solve(src: &[Point], dst: &[Point]) -> Option<SimilarityTransform> {
        let n = src.len().min(dst.len());
        if n == 0 {
            return None;
        }
        let mu_s = mean(&src[..n]);
        let mu_d = mean(&dst[..n]);

        let mut a = 0.0;
        let mut b = 0.0;
        let mut var = 0.0;
        for (s, d) in src[..n].iter().zip(&dst[..n]) {
            let sx = s.x - mu_s.x;
            let sy = s.y - mu_s.y;
            let dx = d.x - mu_d.x;
            let dy = d.y - mu_d.y;
            a += sx * dx + sy * dy;
            b += sx * dy - sy * dx;
            var += sx * sx + sy * sy;
        }

        if var <= f64::EPSILON {
            return None;
        }

        let rotation = b.atan2(a);
        let scale = a.hypot(b) / var;
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }

        let (sin, cos) = rotation.sin_cos();
        let tx = mu_d.x - scale * (cos * mu_s.x - sin * mu_s.y);
        let ty = mu_d.y - scale * (sin * mu_s.x + cos * mu_s.y);

        Some(SimilarityTransform {
            rotation,
            scale,
            tx,
            ty,
        })
    }
}

pub fn mean(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    Point::new(sx / n, sy / n)
}

pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].dist(&w[1])).sum()
}

/// Arc-length weighted centroid. Falls back to the vertex mean for
/// zero-length polylines.
pub fn polyline_centroid(points: &[Point]) -> Point {
    let (mass, cx, cy) = polyline_moments(points);
    if mass > f64::EPSILON {
        Point::new(cx / mass, cy / mass)
    } else {
        mean(points)
    }
}

/// Returns `(length, Σ mid.x * len, Σ mid.y * len)` so several strokes can
/// be combined into one centroid.
pub fn polyline_moments(points: &[Point]) -> (f64, f64, f64) {
    let mut mass = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for w in points.windows(2) {
        let len = w[0].dist(&w[1]);
        let mid = w[0].lerp(&w[1], 0.5);
        mass += len;
        cx += mid.x * len;
        cy += mid.y * len;
    }
    (mass, cx, cy)
}

/// Uniformly resamples a polyline to `n` points along its arc length.
pub fn resample(points: &[Point], n: usize) -> Vec<Point> {
    if points.is_empty() || n == 0 {
        return Vec::new();
    }
    if points.len() == 1 || n == 1 {
        return vec![points[0]; n];
    }
    let total = polyline_length(points);
    if total <= f64::EPSILON {
        return vec![points[0]; n];
    }

    let step = total / (n - 1) as f64;
    let mut out = Vec::with_capacity(n);
    out.push(points[0]);

    let mut seg = 0;
    let mut seg_start = 0.0;
    let mut seg_len = points[0].dist(&points[1]);
    for i in 1..n - 1 {
        let target = step * i as f64;
        while seg_start + seg_len < target && seg + 2 < points.len() {
            seg_start += seg_len;
            seg += 1;
            seg_len = points[seg].dist(&points[seg + 1]);
        }
        let t = if seg_len > f64::EPSILON {
            ((target - seg_start) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        out.push(points[seg].lerp(&points[seg + 1], t));
    }
    out.push(points[points.len() - 1]);
    out
}

/// Upper bound on the points `densify` produces for one polyline.
pub const MAX_DENSIFY_POINTS: usize = 1 << 16;

/// Resamples at a fixed spacing, always keeping both end points. The spacing
/// widens when the polyline would need more than `MAX_DENSIFY_POINTS`.
pub fn densify(points: &[Point], spacing: f64) -> Vec<Point> {
    if points.len() < 2 || !spacing.is_finite() || spacing <= 0.0 {
        return points.to_vec();
    }
    let steps = polyline_length(points) / spacing;
    if !steps.is_finite() {
        return points.to_vec();
    }
    let n = (steps.ceil() as usize)
        .saturating_add(1)
        .clamp(2, MAX_DENSIFY_POINTS);
    resample(points, n)
}

fn perpendicular_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy);
    if len <= f64::EPSILON {
        return p.dist(a);
    }
    ((p.x - a.x) * dy - (p.y - a.y) * dx).abs() / len
}

/// Ramer–Douglas–Peucker simplification.
pub fn simplify(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut max_d = 0.0;
        let mut index = start;
        for i in start + 1..end {
            let d = perpendicular_distance(&points[i], &points[start], &points[end]);
            if d > max_d {
                max_d = d;
                index = i;
            }
        }
        if max_d > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| if k { Some(*p) } else { None })
        .collect()
}

/// Discrete Fréchet distance (Eiter & Mannila), iterative.
pub fn frechet_distance(a: &[Point], b: &[Point]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::INFINITY;
    }
    let m = b.len();
    let mut prev = vec![0.0_f64; m];
    let mut curr = vec![0.0_f64; m];

    for (i, pa) in a.iter().enumerate() {
        for (j, pb) in b.iter().enumerate() {
            let d = pa.dist(pb);
            curr[j] = match (i, j) {
                (0, 0) => d,
                (0, _) => curr[j - 1].max(d),
                (_, 0) => prev[0].max(d),
                _ => prev[j].min(prev[j - 1]).min(curr[j - 1]).max(d),
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m - 1]
}

/// Direction of the chord from first to last point, in radians. `None` for
/// zero-length chords.
pub fn chord_angle(points: &[Point]) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    let dx = last.x - first.x;
    let dy = last.y - first.y;
    if dx.hypot(dy) <= 1e-9 {
        return None;
    }
    Some(dy.atan2(dx))
}

/// Smallest absolute difference between two directions, in degrees (0..=180).
pub fn angle_diff_deg(a: f64, b: f64) -> f64 {
    let mut d = (a - b).to_degrees() % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}
