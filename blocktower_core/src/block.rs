// Block shapes and their placed instances.
//
// Two shapes share one geometry interface (`BlockGeometry`):
//
// - `BaseBlock`: the footprint-only platform a tower stands on. Two
//   dimensions, zero height, always axis-aligned.
// - `Cuboid`: a full 3D box with a unit-quaternion orientation.
//
// `Block` is the tagged union stored in tower nodes and dispatches to the
// matching shape. `PlacedBlock` pairs a `Block` with a world position (the
// block's center; for the base, the center of its top face).
//
// Face selection happens after rotation: all eight corners are rotated
// individually, then the four highest (or lowest) are taken as the face and
// flattened onto the extreme z. Rotating a precomputed top face instead
// would be wrong, because a corner that was "top" before rotation need not be
// top afterwards.
//
// Quaternions cross the serialization boundary as `[w, x, y, z]`.

use crate::error::BlockError;
use crate::geometry::ConvexPolygon;
use crate::types::GEOM_EPS;
use glam::{DQuat, DVec2, DVec3};
use std::f64::consts::FRAC_PI_2;

// ---------------------------------------------------------------------------
// Orientation helpers
// ---------------------------------------------------------------------------

/// Parse a `[w, x, y, z]` quaternion, normalizing it.
pub fn quat_from_wxyz(q: &[f64]) -> Result<DQuat, BlockError> {
    if q.len() != 4 {
        return Err(BlockError::OrientationLength(q.len()));
    }
    let raw = [q[0], q[1], q[2], q[3]];
    let quat = DQuat::from_xyzw(q[1], q[2], q[3], q[0]);
    let len = quat.length();
    if !len.is_finite() || len <= GEOM_EPS {
        return Err(BlockError::DegenerateOrientation(raw));
    }
    Ok(quat / len)
}

/// Inverse of `quat_from_wxyz`.
pub fn quat_to_wxyz(q: DQuat) -> [f64; 4] {
    [q.w, q.x, q.y, q.z]
}

/// Whether `q` is (numerically) the identity rotation, up to sign.
pub fn is_identity(q: DQuat) -> bool {
    (q.w.abs() - 1.0).abs() <= 1e-12
}

/// Identity plus quarter turns about each principal axis.
///
/// These keep footprints axis-aligned and cover the three distinct ways a
/// cuboid can stand.
pub fn cardinal_rotations() -> Vec<DQuat> {
    vec![
        DQuat::IDENTITY,
        DQuat::from_axis_angle(DVec3::X, FRAC_PI_2),
        DQuat::from_axis_angle(DVec3::Y, FRAC_PI_2),
        DQuat::from_axis_angle(DVec3::Z, FRAC_PI_2),
    ]
}

// ---------------------------------------------------------------------------
// Shared geometry interface
// ---------------------------------------------------------------------------

/// Geometry every block shape provides, in block-local space (centered on
/// the origin).
pub trait BlockGeometry {
    /// Corner points before rotation: 8 for a cuboid, 4 for a flat base.
    fn corners(&self) -> Vec<DVec3>;

    /// The shape's own orientation.
    fn orientation(&self) -> DQuat;

    /// Top (or bottom) face under `orientation`: the four extreme corners by
    /// rotated z, flattened onto that extreme z.
    fn surface(&self, orientation: DQuat, top: bool) -> [DVec3; 4] {
        let mut rotated: Vec<DVec3> = self
            .corners()
            .into_iter()
            .map(|c| orientation * c)
            .collect();
        rotated.sort_by(|a, b| a.z.total_cmp(&b.z));
        let picked: Vec<DVec3> = if top {
            rotated[rotated.len() - 4..].to_vec()
        } else {
            rotated[..4].to_vec()
        };
        let z = if top {
            picked.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max)
        } else {
            picked.iter().map(|p| p.z).fold(f64::INFINITY, f64::min)
        };
        [
            DVec3::new(picked[0].x, picked[0].y, z),
            DVec3::new(picked[1].x, picked[1].y, z),
            DVec3::new(picked[2].x, picked[2].y, z),
            DVec3::new(picked[3].x, picked[3].y, z),
        ]
    }

    /// Convex hull of the top face projected onto XY.
    fn footprint(&self) -> ConvexPolygon {
        ConvexPolygon::hull(
            self.surface(self.orientation(), true)
                .iter()
                .map(|p| p.truncate()),
        )
    }

    /// Convex hull of every rotated corner projected onto XY; the region the
    /// block physically occupies when seen from above.
    fn shadow(&self) -> ConvexPolygon {
        let q = self.orientation();
        ConvexPolygon::hull(self.corners().into_iter().map(|c| (q * c).truncate()))
    }

    /// Distance from the center to the top face after rotation.
    fn half_height(&self) -> f64 {
        let q = self.orientation();
        self.corners()
            .into_iter()
            .map(|c| (q * c).z)
            .fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Footprint-only platform.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseBlock {
    dims: DVec2,
}

impl BaseBlock {
    /// Accepts `[l, w]`; a third (height) entry is tolerated and ignored so
    /// documents written with 3D dims still load.
    pub fn new(dims: &[f64]) -> Result<Self, BlockError> {
        if dims.len() != 2 && dims.len() != 3 {
            return Err(BlockError::DimensionCount {
                expected: 2,
                got: dims.len(),
            });
        }
        for (index, &value) in dims[..2].iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(BlockError::NonPositiveDimension { index, value });
            }
        }
        Ok(Self {
            dims: DVec2::new(dims[0], dims[1]),
        })
    }

    pub fn dimensions(&self) -> DVec2 {
        self.dims
    }
}

impl BlockGeometry for BaseBlock {
    fn corners(&self) -> Vec<DVec3> {
        let h = self.dims * 0.5;
        vec![
            DVec3::new(-h.x, -h.y, 0.0),
            DVec3::new(h.x, -h.y, 0.0),
            DVec3::new(h.x, h.y, 0.0),
            DVec3::new(-h.x, h.y, 0.0),
        ]
    }

    fn orientation(&self) -> DQuat {
        DQuat::IDENTITY
    }

    /// The base is flat and never rotates; the requested orientation is
    /// ignored and both faces coincide.
    fn surface(&self, _orientation: DQuat, _top: bool) -> [DVec3; 4] {
        let c = self.corners();
        [c[0], c[1], c[2], c[3]]
    }

    fn half_height(&self) -> f64 {
        0.0
    }
}

/// Rectangular cuboid with an orientation.
#[derive(Clone, Debug, PartialEq)]
pub struct Cuboid {
    dims: DVec3,
    orientation: DQuat,
}

impl Cuboid {
    /// Build an axis-aligned cuboid from `[length, width, height]`.
    pub fn new(dims: &[f64]) -> Result<Self, BlockError> {
        if dims.len() != 3 {
            return Err(BlockError::DimensionCount {
                expected: 3,
                got: dims.len(),
            });
        }
        for (index, &value) in dims.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(BlockError::NonPositiveDimension { index, value });
            }
        }
        Ok(Self {
            dims: DVec3::new(dims[0], dims[1], dims[2]),
            orientation: DQuat::IDENTITY,
        })
    }

    /// Replace the orientation with a `[w, x, y, z]` quaternion.
    pub fn with_orientation(self, wxyz: &[f64]) -> Result<Self, BlockError> {
        let orientation = quat_from_wxyz(wxyz)?;
        Ok(Self {
            orientation,
            ..self
        })
    }

    /// Replace the orientation with an already-built quaternion.
    pub fn with_quat(self, orientation: DQuat) -> Self {
        Self {
            orientation: orientation.normalize(),
            ..self
        }
    }

    /// Apply `rotation` on top of the current orientation.
    pub fn rotated(&self, rotation: DQuat) -> Self {
        Self {
            dims: self.dims,
            orientation: (rotation * self.orientation).normalize(),
        }
    }

    pub fn dimensions(&self) -> DVec3 {
        self.dims
    }

    pub fn volume(&self) -> f64 {
        self.dims.x * self.dims.y * self.dims.z
    }

    /// Place the block so its footprint is centered on `point` and its
    /// bottom face rests at height `z`.
    pub fn moveto(&self, point: DVec2, z: f64) -> PlacedBlock {
        PlacedBlock {
            block: Block::Cuboid(self.clone()),
            position: DVec3::new(point.x, point.y, z + self.half_height()),
        }
    }
}

impl BlockGeometry for Cuboid {
    fn corners(&self) -> Vec<DVec3> {
        let h = self.dims * 0.5;
        let mut out = Vec::with_capacity(8);
        for &sz in &[1.0, -1.0] {
            for &sy in &[1.0, -1.0] {
                for &sx in &[1.0, -1.0] {
                    out.push(DVec3::new(sx * h.x, sy * h.y, sz * h.z));
                }
            }
        }
        out
    }

    fn orientation(&self) -> DQuat {
        self.orientation
    }
}

/// Either shape; the variant stored in tower nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Base(BaseBlock),
    Cuboid(Cuboid),
}

impl Block {
    pub fn is_base(&self) -> bool {
        matches!(self, Block::Base(_))
    }

    /// Volume; the base is flat and has none.
    pub fn volume(&self) -> f64 {
        match self {
            Block::Base(_) => 0.0,
            Block::Cuboid(c) => c.volume(),
        }
    }

    /// Dimensions as written to documents: `[l, w]` or `[l, w, h]`.
    pub fn dims_vec(&self) -> Vec<f64> {
        match self {
            Block::Base(b) => vec![b.dims.x, b.dims.y],
            Block::Cuboid(c) => vec![c.dims.x, c.dims.y, c.dims.z],
        }
    }
}

impl BlockGeometry for Block {
    fn corners(&self) -> Vec<DVec3> {
        match self {
            Block::Base(b) => b.corners(),
            Block::Cuboid(c) => c.corners(),
        }
    }

    fn orientation(&self) -> DQuat {
        match self {
            Block::Base(b) => b.orientation(),
            Block::Cuboid(c) => c.orientation(),
        }
    }

    fn surface(&self, orientation: DQuat, top: bool) -> [DVec3; 4] {
        match self {
            Block::Base(b) => b.surface(orientation, top),
            Block::Cuboid(c) => c.surface(orientation, top),
        }
    }

    fn half_height(&self) -> f64 {
        match self {
            Block::Base(b) => b.half_height(),
            Block::Cuboid(c) => c.half_height(),
        }
    }
}

// ---------------------------------------------------------------------------
// Placed blocks
// ---------------------------------------------------------------------------

/// A block at a world position.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedBlock {
    pub block: Block,
    pub position: DVec3,
}

impl PlacedBlock {
    /// The base platform with its top face at `z = 0`.
    pub fn base(base: BaseBlock) -> Self {
        Self {
            block: Block::Base(base),
            position: DVec3::ZERO,
        }
    }

    pub fn orientation(&self) -> DQuat {
        self.block.orientation()
    }

    pub fn top_z(&self) -> f64 {
        self.position.z + self.block.half_height()
    }

    pub fn bottom_z(&self) -> f64 {
        self.position.z - self.block.half_height()
    }

    /// World-space top-surface polygon.
    pub fn footprint(&self) -> ConvexPolygon {
        self.block.footprint().translate(self.position.truncate())
    }

    /// World-space shadow (all corners projected).
    pub fn shadow(&self) -> ConvexPolygon {
        self.block.shadow().translate(self.position.truncate())
    }

    /// Center of mass; uniform density puts it at the block center.
    pub fn com(&self) -> DVec3 {
        self.position
    }

    /// Whether the two blocks share volume: their shadows overlap (not just
    /// touch) and their vertical extents overlap (not just touch).
    pub fn collides(&self, other: &PlacedBlock) -> bool {
        let lo = self.bottom_z().max(other.bottom_z());
        let hi = self.top_z().min(other.top_z());
        hi - lo > GEOM_EPS && self.shadow().overlaps(&other.shadow())
    }

    /// Whether `self` sits on top of `other`: footprints share area and the
    /// bottom face is level with `other`'s top within `tolerance`.
    pub fn rests_on(&self, other: &PlacedBlock, tolerance: f64) -> bool {
        (self.bottom_z() - other.top_z()).abs() <= tolerance
            && self.shadow().overlaps(&other.footprint())
    }
}
