//! Closed-polygon analysis primitives.
//!
//! Everything downstream of the binary mask works on contours: tracing and
//! area filtering, polygon moments via Green's theorem, Hu-invariant shape
//! distance (the scale/rotation/translation-invariant metric used to compare
//! a candidate against the taught reference silhouette), point-in-polygon
//! hit tests, minimal enclosing circles and convexity defects.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Contours below this area (px²) are discarded as noise specks.
pub const MIN_CONTOUR_AREA: f64 = 400.0;

/// A closed contour polygon in pixel coordinates.
pub type Contour = Vec<Point<i32>>;

/// Trace external contours of a binary mask and drop sub-threshold specks.
pub fn extract_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| c.points)
        .filter(|points| contour_area(points) >= MIN_CONTOUR_AREA)
        .collect()
}

/// Unsigned polygon area (shoelace).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    let n = points.len();
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

// ── Moments ────────────────────────────────────────────────────────────────

/// Spatial, central and normalized polygon moments up to third order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub m30: f64,
    pub m21: f64,
    pub m12: f64,
    pub m03: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
    pub mu30: f64,
    pub mu21: f64,
    pub mu12: f64,
    pub mu03: f64,
    pub nu20: f64,
    pub nu11: f64,
    pub nu02: f64,
    pub nu30: f64,
    pub nu21: f64,
    pub nu12: f64,
    pub nu03: f64,
}

impl Moments {
    /// Contour centroid `(m10/m00, m01/m00)`; `(0, 0)` for a zero-area
    /// contour (a degenerate-contour guard, not a real position).
    pub fn centroid(&self) -> (f64, f64) {
        if self.m00.abs() < f64::EPSILON {
            return (0.0, 0.0);
        }
        (self.m10 / self.m00, self.m01 / self.m00)
    }
}

/// Polygon moments of a closed contour via Green's theorem, in the same
/// convention as the classic `contourMoments` line-integral accumulation.
pub fn polygon_moments(points: &[Point<i32>]) -> Moments {
    let n = points.len();
    let mut m = Moments::default();
    if n < 3 {
        return m;
    }

    let (mut a00, mut a10, mut a01) = (0.0f64, 0.0, 0.0);
    let (mut a20, mut a11, mut a02) = (0.0f64, 0.0, 0.0);
    let (mut a30, mut a21, mut a12, mut a03) = (0.0f64, 0.0, 0.0, 0.0);

    let mut xi_1 = points[n - 1].x as f64;
    let mut yi_1 = points[n - 1].y as f64;
    for p in points {
        let xi = p.x as f64;
        let yi = p.y as f64;
        let xi2 = xi * xi;
        let yi2 = yi * yi;
        let xi_12 = xi_1 * xi_1;
        let yi_12 = yi_1 * yi_1;
        let dxy = xi_1 * yi - xi * yi_1;
        let xii_1 = xi_1 + xi;
        let yii_1 = yi_1 + yi;

        a00 += dxy;
        a10 += dxy * xii_1;
        a01 += dxy * yii_1;
        a20 += dxy * (xi_1 * xii_1 + xi2);
        a11 += dxy * (xi_1 * (yii_1 + yi_1) + xi * (yii_1 + yi));
        a02 += dxy * (yi_1 * yii_1 + yi2);
        a30 += dxy * xii_1 * (xi_12 + xi2);
        a03 += dxy * yii_1 * (yi_12 + yi2);
        a21 += dxy
            * (xi_12 * (3.0 * yi_1 + yi) + 2.0 * xi * xi_1 * yii_1 + xi2 * (yi_1 + 3.0 * yi));
        a12 += dxy
            * (yi_12 * (3.0 * xi_1 + xi) + 2.0 * yi * yi_1 * xii_1 + yi2 * (xi_1 + 3.0 * xi));

        xi_1 = xi;
        yi_1 = yi;
    }

    if a00.abs() < f64::EPSILON {
        return m;
    }
    // sign of the line integral tracks winding; keep moments positive-area
    let sgn = if a00 > 0.0 { 1.0 } else { -1.0 };
    m.m00 = a00 * sgn / 2.0;
    m.m10 = a10 * sgn / 6.0;
    m.m01 = a01 * sgn / 6.0;
    m.m20 = a20 * sgn / 12.0;
    m.m11 = a11 * sgn / 24.0;
    m.m02 = a02 * sgn / 12.0;
    m.m30 = a30 * sgn / 20.0;
    m.m21 = a21 * sgn / 60.0;
    m.m12 = a12 * sgn / 60.0;
    m.m03 = a03 * sgn / 20.0;

    let cx = m.m10 / m.m00;
    let cy = m.m01 / m.m00;
    m.mu20 = m.m20 - m.m10 * cx;
    m.mu11 = m.m11 - m.m10 * cy;
    m.mu02 = m.m02 - m.m01 * cy;
    m.mu30 = m.m30 - cx * (3.0 * m.mu20 + cx * m.m10);
    m.mu21 = m.m21 - cx * (2.0 * m.mu11 + cx * m.m01) - cy * m.mu20;
    m.mu12 = m.m12 - cy * (2.0 * m.mu11 + cy * m.m10) - cx * m.mu02;
    m.mu03 = m.m03 - cy * (3.0 * m.mu02 + cy * m.m01);

    let s2 = m.m00 * m.m00;
    let s3 = s2 * m.m00.abs().sqrt();
    m.nu20 = m.mu20 / s2;
    m.nu11 = m.mu11 / s2;
    m.nu02 = m.mu02 / s2;
    m.nu30 = m.mu30 / s3;
    m.nu21 = m.mu21 / s3;
    m.nu12 = m.mu12 / s3;
    m.nu03 = m.mu03 / s3;
    m
}

/// The seven Hu moment invariants.
pub fn hu_invariants(m: &Moments) -> [f64; 7] {
    let (n20, n11, n02) = (m.nu20, m.nu11, m.nu02);
    let (n30, n21, n12, n03) = (m.nu30, m.nu21, m.nu12, m.nu03);
    let t0 = n30 + n12;
    let t1 = n21 + n03;
    let q0 = t0 * t0;
    let q1 = t1 * t1;
    let a = n30 - 3.0 * n12;
    let b = 3.0 * n21 - n03;
    [
        n20 + n02,
        (n20 - n02) * (n20 - n02) + 4.0 * n11 * n11,
        a * a + b * b,
        q0 + q1,
        a * t0 * (q0 - 3.0 * q1) + b * t1 * (3.0 * q0 - q1),
        (n20 - n02) * (q0 - q1) + 4.0 * n11 * t0 * t1,
        b * t0 * (q0 - 3.0 * q1) - a * t1 * (3.0 * q0 - q1),
    ]
}

/// Moment-invariant shape distance between two contours
/// (`matchShapes` I1 form over log-scaled Hu invariants).
///
/// Zero for identical shapes; invariant to translation, uniform scale and
/// rotation.
pub fn shape_distance(a: &[Point<i32>], b: &[Point<i32>]) -> f64 {
    const EPS: f64 = 1e-5;
    let ha = hu_invariants(&polygon_moments(a));
    let hb = hu_invariants(&polygon_moments(b));
    let mut dist = 0.0;
    for i in 0..7 {
        let (va, vb) = (ha[i], hb[i]);
        if va.abs() > EPS && vb.abs() > EPS {
            let ma = va.signum() * va.abs().log10();
            let mb = vb.signum() * vb.abs().log10();
            dist += (1.0 / ma - 1.0 / mb).abs();
        }
    }
    dist
}

// ── Hit testing ────────────────────────────────────────────────────────────

/// Even-odd ray-casting point-in-polygon test.
pub fn point_in_polygon(points: &[Point<i32>], x: i32, y: i32) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (points[i].x, points[i].y);
        let (xj, yj) = (points[j].x, points[j].y);
        if (yi > y) != (yj > y) {
            let x_cross =
                xj as f64 + (y - yj) as f64 * (xi - xj) as f64 / (yi - yj) as f64;
            if (x as f64) < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// ── Minimal enclosing circle ───────────────────────────────────────────────

const MEC_EPS: f64 = 1e-7;

#[derive(Debug, Clone, Copy)]
struct Circle {
    cx: f64,
    cy: f64,
    r: f64,
}

impl Circle {
    fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        (dx * dx + dy * dy).sqrt() <= self.r + MEC_EPS * (1.0 + self.r)
    }

    fn from_diameter(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        let cx = (ax + bx) / 2.0;
        let cy = (ay + by) / 2.0;
        let r = ((ax - bx).hypot(ay - by)) / 2.0;
        Self { cx, cy, r }
    }

    fn circumscribing(ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64) -> Option<Self> {
        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < MEC_EPS {
            return None; // collinear
        }
        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
        let r = (ax - ux).hypot(ay - uy);
        Some(Self { cx: ux, cy: uy, r })
    }
}

/// Minimal enclosing circle of a point set (Welzl's move-to-front scheme on
/// the deterministic contour order). Returns `(cx, cy, radius)`, or `None`
/// for an empty set.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Option<(f64, f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();

    let mut c = Circle { cx: pts[0].0, cy: pts[0].1, r: 0.0 };
    for i in 1..pts.len() {
        let (px, py) = pts[i];
        if !c.contains(px, py) {
            c = circle_with_one_boundary(&pts[..i], px, py);
        }
    }
    Some((c.cx, c.cy, c.r))
}

fn circle_with_one_boundary(pts: &[(f64, f64)], px: f64, py: f64) -> Circle {
    let mut c = Circle { cx: px, cy: py, r: 0.0 };
    for j in 0..pts.len() {
        let (qx, qy) = pts[j];
        if !c.contains(qx, qy) {
            c = circle_with_two_boundary(&pts[..j], px, py, qx, qy);
        }
    }
    c
}

fn circle_with_two_boundary(pts: &[(f64, f64)], px: f64, py: f64, qx: f64, qy: f64) -> Circle {
    let mut c = Circle::from_diameter(px, py, qx, qy);
    for &(rx, ry) in pts {
        if !c.contains(rx, ry) {
            c = Circle::circumscribing(px, py, qx, qy, rx, ry)
                .unwrap_or_else(|| widest_pair_circle(&[(px, py), (qx, qy), (rx, ry)]));
        }
    }
    c
}

fn widest_pair_circle(pts: &[(f64, f64)]) -> Circle {
    let mut best = Circle::from_diameter(pts[0].0, pts[0].1, pts[1].0, pts[1].1);
    for i in 0..pts.len() {
        for j in (i + 1)..pts.len() {
            let c = Circle::from_diameter(pts[i].0, pts[i].1, pts[j].0, pts[j].1);
            if c.r > best.r {
                best = c;
            }
        }
    }
    best
}

// ── Convexity defects ──────────────────────────────────────────────────────

/// A concavity between two hull vertices: the deepest contour point inside
/// the gap spanned by one hull edge.
#[derive(Debug, Clone, Copy)]
pub struct ConvexityDefect {
    /// Hull edge start, on the contour.
    pub start: Point<i32>,
    /// Hull edge end, on the contour.
    pub end: Point<i32>,
    /// Deepest contour point inside the gap.
    pub farthest: Point<i32>,
    /// Perpendicular distance from `farthest` to the hull edge (px).
    pub depth: f64,
}

impl ConvexityDefect {
    /// Midpoint of the hull-edge gap, used as the orientation landmark.
    pub fn gap_midpoint(&self) -> (f64, f64) {
        (
            (self.start.x + self.end.x) as f64 / 2.0,
            (self.start.y + self.end.y) as f64 / 2.0,
        )
    }
}

/// Convexity defects of a contour given its convex hull.
///
/// Hull vertices are located back in the contour by identity; contour points
/// strictly between two consecutive hull vertices are measured against the
/// hull edge. Already-convex contours produce no defects.
pub fn convexity_defects(contour: &[Point<i32>], hull: &[Point<i32>]) -> Vec<ConvexityDefect> {
    let n = contour.len();
    if n < 4 || hull.len() < 3 {
        return Vec::new();
    }

    // Resolve hull vertices to contour indices, in contour order.
    let mut hull_idx: Vec<usize> = hull
        .iter()
        .filter_map(|hp| contour.iter().position(|cp| cp == hp))
        .collect();
    hull_idx.sort_unstable();
    hull_idx.dedup();
    if hull_idx.len() < 3 {
        return Vec::new();
    }

    let mut defects = Vec::new();
    for (k, &i) in hull_idx.iter().enumerate() {
        let j = hull_idx[(k + 1) % hull_idx.len()];
        let start = contour[i];
        let end = contour[j];
        let ex = (end.x - start.x) as f64;
        let ey = (end.y - start.y) as f64;
        let len = ex.hypot(ey);
        if len < MEC_EPS {
            continue;
        }

        let mut depth = 0.0;
        let mut farthest = None;
        let mut idx = (i + 1) % n;
        while idx != j {
            let p = contour[idx];
            let d = ((p.x - start.x) as f64 * ey - (p.y - start.y) as f64 * ex).abs() / len;
            if d > depth {
                depth = d;
                farthest = Some(p);
            }
            idx = (idx + 1) % n;
        }
        if let Some(farthest) = farthest {
            if depth > 0.0 {
                defects.push(ConvexityDefect { start, end, farthest, depth });
            }
        }
    }
    defects
}
