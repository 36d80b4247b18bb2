// Planar computational geometry over block footprints.
//
// Every 2D shape the placement search reasons about is convex: a block's
// footprint is the hull of its flattened top face, its shadow is the hull of
// all eight rotated corners, contact envelopes are hulls of footprints, and
// occlusion regions are Minkowski sums of convex shapes. `ConvexPolygon`
// therefore stores a counter-clockwise hull and implements every predicate
// with half-plane tests and the separating axis theorem. No bounding-box
// shortcuts: arbitrary rotations produce non-rectangular footprints and the
// predicates must stay exact for them.
//
// Conventions:
// - "Touching" (sharing only boundary) is not overlap. Two blocks placed
//   flush side by side do not collide, and a block only counts as resting
//   on another when their footprints share interior area.
// - Containment is inclusive within `GEOM_EPS`, so a footprint exactly
//   filling an inset region still fits.
//
// `Bounds2` is the axis-aligned box used only to size search grids.

use crate::types::GEOM_EPS;
use glam::DVec2;

/// Axis-aligned 2D bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2 {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds2 {
    /// The box covering both `self` and `other`.
    pub fn union(self, other: Bounds2) -> Bounds2 {
        Bounds2 {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Integer lattice coordinates `(i, j)` such that `(i * step, j * step)`
    /// lies inside the box (inclusive).
    ///
    /// Aligning the grid to multiples of `step` instead of to the box corner
    /// keeps grid points from different layers identical, and makes the
    /// integer pair usable as an exact key.
    pub fn lattice(self, step: f64) -> impl Iterator<Item = (i64, i64)> {
        let lo_x = (self.min.x / step - GEOM_EPS).ceil() as i64;
        let hi_x = (self.max.x / step + GEOM_EPS).floor() as i64;
        let lo_y = (self.min.y / step - GEOM_EPS).ceil() as i64;
        let hi_y = (self.max.y / step + GEOM_EPS).floor() as i64;
        let column = move |i: i64| (lo_y..=hi_y).map(move |j| (i, j));
        (lo_x..=hi_x).flat_map(column)
    }
}

/// Convex polygon with counter-clockwise vertices.
///
/// May be degenerate (fewer than three vertices, or zero area) when built
/// from collinear input; degenerate polygons contain nothing strictly and
/// overlap nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvexPolygon {
    vertices: Vec<DVec2>,
}

impl ConvexPolygon {
    /// Convex hull of a point set (Andrew's monotone chain).
    ///
    /// Collinear boundary points are dropped, so an axis-aligned rectangle
    /// always comes back as exactly four vertices.
    pub fn hull<I: IntoIterator<Item = DVec2>>(points: I) -> Self {
        let mut pts: Vec<DVec2> = points.into_iter().collect();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        pts.dedup_by(|a, b| a.distance_squared(*b) <= GEOM_EPS * GEOM_EPS);
        if pts.len() < 3 {
            return Self { vertices: pts };
        }

        let mut lower: Vec<DVec2> = Vec::with_capacity(pts.len());
        for &p in &pts {
            push_convex(&mut lower, p);
        }
        let mut upper: Vec<DVec2> = Vec::with_capacity(pts.len());
        for &p in pts.iter().rev() {
            push_convex(&mut upper, p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { vertices: lower }
    }

    /// Axis-aligned rectangle centered at `center`.
    pub fn rectangle(center: DVec2, half_extents: DVec2) -> Self {
        Self::hull([
            center + DVec2::new(-half_extents.x, -half_extents.y),
            center + DVec2::new(half_extents.x, -half_extents.y),
            center + DVec2::new(half_extents.x, half_extents.y),
            center + DVec2::new(-half_extents.x, half_extents.y),
        ])
    }

    /// Convex envelope of several polygons.
    pub fn envelope<'a, I: IntoIterator<Item = &'a ConvexPolygon>>(polygons: I) -> Self {
        Self::hull(polygons.into_iter().flat_map(|p| p.vertices.clone()))
    }

    pub fn vertices(&self) -> &[DVec2] {
        &self.vertices
    }

    /// Shoelace area (non-negative for CCW order).
    pub fn area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        let n = self.vertices.len();
        let twice: f64 = (0..n)
            .map(|i| self.vertices[i].perp_dot(self.vertices[(i + 1) % n]))
            .sum();
        twice * 0.5
    }

    pub fn is_degenerate(&self) -> bool {
        self.area() <= GEOM_EPS
    }

    /// Area centroid; falls back to the vertex mean for degenerate shapes.
    pub fn centroid(&self) -> DVec2 {
        let area = self.area();
        if area <= GEOM_EPS {
            if self.vertices.is_empty() {
                return DVec2::ZERO;
            }
            return self.vertices.iter().copied().sum::<DVec2>() / self.vertices.len() as f64;
        }
        let n = self.vertices.len();
        let mut acc = DVec2::ZERO;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            acc += (a + b) * a.perp_dot(b);
        }
        acc / (6.0 * area)
    }

    pub fn bounds(&self) -> Bounds2 {
        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for &v in &self.vertices {
            min = min.min(v);
            max = max.max(v);
        }
        Bounds2 { min, max }
    }

    pub fn translate(&self, offset: DVec2) -> Self {
        Self {
            vertices: self.vertices.iter().map(|&v| v + offset).collect(),
        }
    }

    /// Shrink towards the centroid by `margin` (a fraction: 0.05 = 5%).
    pub fn inset(&self, margin: f64) -> Self {
        let c = self.centroid();
        let factor = 1.0 - margin;
        let vertices = self.vertices.iter().map(|&v| c + (v - c) * factor);
        Self {
            vertices: vertices.collect(),
        }
    }

    /// Minkowski sum: every `a + b` for `a` in `self`, `b` in `other`.
    ///
    /// For a footprint `F` and a centrally symmetric candidate shadow `S`
    /// centered on the origin, a candidate centered at `p` overlaps `F`
    /// exactly when `p` lies strictly inside `F ⊕ S`.
    pub fn minkowski_sum(&self, other: &ConvexPolygon) -> Self {
        Self::hull(
            self.vertices
                .iter()
                .flat_map(|&a| other.vertices.iter().map(move |&b| a + b)),
        )
    }

    /// Inclusive point test: inside or on the boundary.
    pub fn contains_point(&self, p: DVec2) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        self.edges().all(|(a, b)| cross(a, b, p) >= -GEOM_EPS)
    }

    /// Strict point test: inside and not on the boundary.
    pub fn contains_point_strict(&self, p: DVec2) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        self.edges().all(|(a, b)| cross(a, b, p) > GEOM_EPS)
    }

    /// Whether `other` lies entirely inside `self` (boundary contact allowed).
    ///
    /// Both shapes are convex, so checking `other`'s vertices is enough.
    pub fn contains_polygon(&self, other: &ConvexPolygon) -> bool {
        !other.vertices.is_empty() && other.vertices.iter().all(|&v| self.contains_point(v))
    }

    /// Whether the interiors of `self` and `other` intersect.
    ///
    /// Separating-axis test over both polygons' edge normals. Projections
    /// that merely touch count as separated.
    pub fn overlaps(&self, other: &ConvexPolygon) -> bool {
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }
        for poly in [self, other] {
            for (a, b) in poly.edges() {
                let axis = (b - a).perp();
                let (min_a, max_a) = project(&self.vertices, axis);
                let (min_b, max_b) = project(&other.vertices, axis);
                let tol = GEOM_EPS * axis.length().max(1.0);
                if max_a <= min_b + tol || max_b <= min_a + tol {
                    return false;
                }
            }
        }
        true
    }

    fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let v = &self.vertices;
        let n = v.len();
        (0..n).map(move |i| (v[i], v[(i + 1) % n]))
    }
}

/// Z component of `(b - a) x (p - a)`; positive when `p` is left of `a -> b`.
fn cross(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (b - a).perp_dot(p - a)
}

/// Monotone-chain step: drop trailing points that would make a non-left
/// turn with `p`, then append it.
fn push_convex(chain: &mut Vec<DVec2>, p: DVec2) {
    while let [.., a, b] = chain[..] {
        if cross(a, b, p) > GEOM_EPS {
            break;
        }
        chain.pop();
    }
    chain.push(p);
}

fn project(vertices: &[DVec2], axis: DVec2) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in vertices {
        let d = v.dot(axis);
        lo = lo.min(d);
        hi = hi.max(d);
    }
    (lo, hi)
}
