// Placement search: enumerate every valid spot for a block on a tower.
//
// For each allowed rotation the search walks the tower's levels from the
// tallest down. On each level it lays an integer lattice (multiples of
// `grid_step`) over the level's bounding box and keeps a lattice point `p`
// only if a block centered at `p`, resting on the level:
//
// 1. is not under a higher level. Each processed level claims the region
//    `footprint ⊕ candidate shadow` of its members; lattice points strictly
//    inside a claimed region are skipped on every lower level. Claims
//    accumulate as the walk descends.
// 2. touches at least one member footprint on this level (no levitation).
//    The touched members become the placement's parents.
// 3. lies, with its whole bottom face, inside the envelope of the touched
//    footprints shrunk by `safety_margin`.
// 4. is locally stable: its center of mass is over the single support, or
//    inside the envelope of several supports (`local_stability()`).
// 5. does not collide with any block already in the tower.
//
// The search only enumerates. Choosing among candidates is the builder's
// job (see `builder.rs`). Zero candidates is a normal result.
//
// Claimed lattice points live in an `FxHashSet<(i64, i64)>`: lattice
// coordinates are exact integers, so membership is exact and cheap. Output
// order is deterministic (rotation, then level, then lattice order).
//
// **Critical constraint: determinism.** No randomness here, and nothing
// iterates a hash set into the output.

use crate::block::{Block, BlockGeometry, Cuboid, PlacedBlock};
use crate::error::ConfigError;
use crate::geometry::{Bounds2, ConvexPolygon};
use crate::tower::{LEVEL_TOLERANCE, Parents, Tower};
use crate::types::BlockId;
use glam::{DQuat, DVec2, DVec3};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Tunables for the placement search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Lattice spacing in world units.
    pub grid_step: f64,
    /// Fractional shrink of the support envelope (0.05 = 5%).
    pub safety_margin: f64,
    /// Height difference under which two top surfaces share a level.
    pub level_tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            grid_step: 0.1,
            safety_margin: 0.05,
            level_tolerance: LEVEL_TOLERANCE,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("grid_step", self.grid_step),
            ("level_tolerance", self.level_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if !(0.0..1.0).contains(&self.safety_margin) {
            return Err(ConfigError::SafetyMargin(self.safety_margin));
        }
        Ok(())
    }
}

/// One valid way to put a block on the tower.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub parents: Parents,
    /// Block center in world space.
    pub position: DVec3,
    /// Full orientation of the placed block.
    pub orientation: DQuat,
}

/// Whether a center of mass at `com` (projected onto XY) is supported by
/// `contacts`: nothing touching is never stable; one support must be under
/// the com; several supports must enclose it with their envelope.
pub fn local_stability(com: DVec2, contacts: &[&ConvexPolygon]) -> bool {
    match contacts {
        [] => false,
        [single] => single.contains_point(com),
        many => ConvexPolygon::envelope(many.iter().copied()).contains_point(com),
    }
}

/// Every valid placement of `block` on `tower`, trying each of `rotations`
/// (applied on top of the block's own orientation). An empty rotation list
/// means the block's current orientation only.
pub fn find_placements(
    tower: &Tower,
    block: &Cuboid,
    rotations: &[DQuat],
    config: &SearchConfig,
) -> Vec<Placement> {
    let identity = [DQuat::IDENTITY];
    let rotations = if rotations.is_empty() {
        &identity[..]
    } else {
        rotations
    };
    let mut out = Vec::new();
    for &rotation in rotations {
        search_rotation(tower, &block.rotated(rotation), config, &mut out);
    }
    out
}

/// Candidate shape after rotation, in block-local XY.
struct Candidate<'a> {
    block: &'a Cuboid,
    shadow: ConvexPolygon,
    bottom: ConvexPolygon,
    half_height: f64,
}

impl<'a> Candidate<'a> {
    fn new(block: &'a Cuboid) -> Self {
        let bottom = ConvexPolygon::hull(
            block
                .surface(block.orientation(), false)
                .iter()
                .map(|p| p.truncate()),
        );
        Self {
            block,
            shadow: block.shadow(),
            bottom,
            half_height: block.half_height(),
        }
    }

    fn placed_at(&self, point: DVec2, level_z: f64) -> PlacedBlock {
        PlacedBlock {
            block: Block::Cuboid(self.block.clone()),
            position: point.extend(level_z + self.half_height),
        }
    }
}

fn search_rotation(
    tower: &Tower,
    block: &Cuboid,
    config: &SearchConfig,
    out: &mut Vec<Placement>,
) {
    let candidate = Candidate::new(block);
    let step = config.grid_step;
    let margin = config.safety_margin;
    let levels = tower
        .levels_within(None, config.level_tolerance)
        .unwrap_or_default();
    let mut claimed: FxHashSet<(i64, i64)> = FxHashSet::default();

    for level in &levels {
        let members: Vec<(BlockId, ConvexPolygon)> = level
            .members
            .iter()
            .filter_map(|&id| tower.get(id).map(|n| (id, n.placed.footprint())))
            .collect();
        let Some(bounds) = members
            .iter()
            .map(|(_, fp)| fp.bounds())
            .reduce(Bounds2::union)
        else {
            continue;
        };

        let before = out.len();
        for (i, j) in bounds.lattice(step) {
            if claimed.contains(&(i, j)) {
                continue;
            }
            let point = DVec2::new(i as f64 * step, j as f64 * step);
            let bottom = candidate.bottom.translate(point);

            let contacts: Vec<&(BlockId, ConvexPolygon)> = members
                .iter()
                .filter(|(_, fp)| fp.overlaps(&bottom))
                .collect();
            if contacts.is_empty() {
                continue;
            }
            let polys: Vec<&ConvexPolygon> = contacts.iter().map(|(_, fp)| fp).collect();
            let support = ConvexPolygon::envelope(polys.iter().copied());
            if !support.inset(margin).contains_polygon(&bottom) {
                continue;
            }
            if !local_stability(point, &polys) {
                continue;
            }
            let placed = candidate.placed_at(point, level.z);
            if tower.collides_with_any(&placed) {
                continue;
            }
            out.push(Placement {
                parents: contacts.iter().map(|(id, _)| *id).collect(),
                position: placed.position,
                orientation: block.orientation(),
            });
        }
        log::debug!(
            "level z={:.3} ({} blocks): {} candidates",
            level.z,
            members.len(),
            out.len() - before
        );

        // This level now shadows everything below it.
        for (_, fp) in &members {
            let region = fp.minkowski_sum(&candidate.shadow);
            for (i, j) in region.bounds().lattice(step) {
                let p = DVec2::new(i as f64 * step, j as f64 * step);
                if region.contains_point_strict(p) {
                    claimed.insert((i, j));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BaseBlock, cardinal_rotations};
    use crate::types::CONTACT_TOLERANCE;

    fn base_tower(l: f64, w: f64) -> Tower {
        Tower::new(BaseBlock::new(&[l, w]).unwrap())
    }

    fn cuboid(dims: [f64; 3]) -> Cuboid {
        Cuboid::new(&dims).unwrap()
    }

    fn put(tower: &Tower, dims: [f64; 3], parents: &[BlockId], x: f64, y: f64, z: f64) -> Tower {
        let c = cuboid(dims);
        let placed = c.moveto(DVec2::new(x, y), z);
        tower
            .place_block(&c, parents, placed.position, DQuat::IDENTITY)
            .unwrap()
    }

    #[test]
    fn single_block_on_base_stays_inside_margin() {
        let tower = base_tower(4.0, 4.0);
        let block = cuboid([2.0, 1.0, 1.0]);
        let found = find_placements(&tower, &block, &[], &SearchConfig::default());
        assert!(!found.is_empty());
        for p in &found {
            assert!((p.position.z - 0.5).abs() < 1e-12);
            assert_eq!(p.parents.as_slice(), &[BlockId::BASE]);
            // Footprint inside the 4x4 base shrunk by 5% (half-extent 1.9).
            assert!(p.position.x.abs() + 1.0 <= 1.9 + 1e-9);
            assert!(p.position.y.abs() + 0.5 <= 1.9 + 1e-9);
        }
        // 19 x 29 lattice points fit exactly.
        assert_eq!(found.len(), 19 * 29);
    }

    #[test]
    fn oversized_block_on_small_block_has_no_placements() {
        let tower = base_tower(2.0, 2.0);
        let tower = put(&tower, [1.0, 1.0, 1.0], &[BlockId::BASE], 0.0, 0.0, 0.0);
        let big = cuboid([3.0, 3.0, 1.0]);
        let cfg = SearchConfig::default();
        let found = find_placements(&tower, &big, &cardinal_rotations(), &cfg);
        assert!(found.is_empty());
    }

    #[test]
    fn higher_levels_claim_the_area_below() {
        let tower = base_tower(4.0, 4.0);
        let tower = put(&tower, [1.0, 1.0, 1.0], &[BlockId::BASE], 0.0, 0.0, 0.0);
        let small = cuboid([0.5, 0.5, 0.5]);
        let found = find_placements(&tower, &small, &[], &SearchConfig::default());

        let on_top: Vec<&Placement> = found.iter().filter(|p| p.position.z > 1.0).collect();
        assert_eq!(on_top.len(), 25);
        assert!(on_top.iter().all(|p| p.parents.as_slice() == [BlockId(1)]));

        for p in found.iter().filter(|p| p.position.z < 1.0) {
            // Excluded region: the 1x1 footprint grown by the 0.5x0.5 shadow.
            let inside = p.position.x.abs() < 0.75 - 1e-9 && p.position.y.abs() < 0.75 - 1e-9;
            assert!(!inside, "shadowed candidate at {:?}", p.position);
            assert_eq!(p.parents.as_slice(), &[BlockId::BASE]);
        }
    }

    #[test]
    fn bridges_need_both_supports() {
        let tower = base_tower(6.0, 2.0);
        let tower = put(&tower, [1.0, 1.0, 1.0], &[BlockId::BASE], -1.0, 0.0, 0.0);
        let tower = put(&tower, [1.0, 1.0, 1.0], &[BlockId::BASE], 1.0, 0.0, 0.0);
        let plank = cuboid([2.5, 0.5, 0.5]);
        let found = find_placements(&tower, &plank, &[], &SearchConfig::default());
        let bridged: Vec<&Placement> = found.iter().filter(|p| p.position.z > 1.0).collect();
        assert!(!bridged.is_empty());
        for p in bridged {
            assert!((p.position.z - 1.25).abs() < 1e-12);
            assert_eq!(p.parents.as_slice(), &[BlockId(1), BlockId(2)]);
        }
    }

    #[test]
    fn candidates_never_levitate_or_collide() {
        let tower = base_tower(4.0, 4.0);
        let tower = put(&tower, [2.0, 1.0, 1.0], &[BlockId::BASE], 0.5, 0.0, 0.0);
        let block = cuboid([1.0, 1.0, 0.5]);
        let cfg = SearchConfig::default();
        let found = find_placements(&tower, &block, &cardinal_rotations(), &cfg);
        assert!(!found.is_empty());
        for p in &found {
            assert!(!p.parents.is_empty());
            let rotated = block.clone().with_quat(p.orientation);
            let placed = PlacedBlock {
                block: Block::Cuboid(rotated),
                position: p.position,
            };
            assert!(!tower.collides_with_any(&placed));
            for parent in &p.parents {
                let support = &tower.get(*parent).unwrap().placed;
                assert!(placed.rests_on(support, CONTACT_TOLERANCE));
            }
        }
    }

    #[test]
    fn rotations_are_reported() {
        let tower = base_tower(4.0, 4.0);
        let block = cuboid([2.0, 1.0, 1.0]);
        let quarter = DQuat::from_axis_angle(DVec3::Z, std::f64::consts::FRAC_PI_2);
        let cfg = SearchConfig::default();
        let found = find_placements(&tower, &block, &[DQuat::IDENTITY, quarter], &cfg);
        let has = |q: DQuat| found.iter().any(|p| p.orientation.abs_diff_eq(q, 1e-12));
        assert!(has(quarter));
        assert!(has(DQuat::IDENTITY));
    }

    #[test]
    fn search_is_deterministic() {
        let tower = base_tower(4.0, 4.0);
        let tower = put(&tower, [1.0, 1.0, 1.0], &[BlockId::BASE], -1.0, 0.0, 0.0);
        let block = cuboid([1.0, 0.5, 0.5]);
        let cfg = SearchConfig::default();
        let a = find_placements(&tower, &block, &cardinal_rotations(), &cfg);
        let b = find_placements(&tower, &block, &cardinal_rotations(), &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn local_stability_cases() {
        let a = ConvexPolygon::rectangle(DVec2::new(-1.0, 0.0), DVec2::splat(0.5));
        let b = ConvexPolygon::rectangle(DVec2::new(1.0, 0.0), DVec2::splat(0.5));
        assert!(!local_stability(DVec2::ZERO, &[]));
        assert!(local_stability(DVec2::new(-1.0, 0.2), &[&a]));
        assert!(!local_stability(DVec2::ZERO, &[&a]));
        // Over the gap, but inside the envelope of both supports.
        assert!(local_stability(DVec2::ZERO, &[&a, &b]));
        assert!(!local_stability(DVec2::new(0.0, 0.8), &[&a, &b]));
    }

    #[test]
    fn config_validation() {
        assert!(SearchConfig::default().validate().is_ok());
        let bad_step = SearchConfig {
            grid_step: 0.0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            bad_step.validate(),
            Err(ConfigError::NonPositive {
                name: "grid_step",
                ..
            })
        ));
        let bad_margin = SearchConfig {
            safety_margin: 1.0,
            ..SearchConfig::default()
        };
        assert_eq!(bad_margin.validate(), Err(ConfigError::SafetyMargin(1.0)));
    }
}
