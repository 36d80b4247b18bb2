// The tower: an immutable support graph of placed blocks.
//
// Nodes live in an arena (`Vec<Arc<TowerNode>>`) indexed by `BlockId`. Node
// 0 is always the base platform; every later node records the ids of the
// blocks it rests on (`parents`). Because a new block can only name
// already-existing parents, ids strictly increase along every support edge
// and the graph is acyclic by construction. Towers loaded from documents are
// validated for the same properties in `from_nodes()`.
//
// Copy-on-write: `place_block()` and the feature setters return a new
// `Tower`. Cloning the arena only bumps reference counts, so the builder can
// keep any number of intermediate towers around (for retries, or to compare
// before/after) at little cost, and a `Tower` can be shared across rayon
// workers without locking.
//
// Queries used by the placement search:
// - `levels()`: blocks grouped by top-surface height (within a tolerance),
//   tallest first.
// - `available_surface()`: per-block world-space top footprints, tallest
//   first.
// - `get_stack()`: shortest support path from the base to a block.
//
// See also: `placement.rs` (consumer of levels/surfaces), `document.rs`
// (node-link serialization), `block.rs` (shapes and placed blocks).

use crate::block::{BaseBlock, Block, Cuboid, PlacedBlock};
use crate::error::TowerError;
use crate::geometry::ConvexPolygon;
use crate::substance::Substance;
use crate::types::BlockId;
use glam::{DQuat, DVec2, DVec3};
use smallvec::SmallVec;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Default tolerance for grouping blocks into levels by top-surface height.
pub const LEVEL_TOLERANCE: f64 = 1e-3;

/// Parent list; nearly every block rests on one or two others.
pub type Parents = SmallVec<[BlockId; 2]>;

/// One block in the tower plus its support edges and optional materials.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerNode {
    pub id: BlockId,
    pub placed: PlacedBlock,
    /// Blocks this one rests on, ascending and deduplicated.
    pub parents: Parents,
    pub substance: Option<Substance>,
    pub appearance: Option<String>,
}

/// Blocks sharing one top-surface height.
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    pub z: f64,
    pub members: Vec<BlockId>,
}

/// A block's world-space top surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub id: BlockId,
    pub z: f64,
    pub footprint: ConvexPolygon,
}

/// Immutable block tower.
#[derive(Clone, Debug, PartialEq)]
pub struct Tower {
    nodes: Vec<Arc<TowerNode>>,
}

impl Tower {
    /// A tower holding only the base platform.
    pub fn new(base: BaseBlock) -> Self {
        Self {
            nodes: vec![Arc::new(TowerNode {
                id: BlockId::BASE,
                placed: PlacedBlock::base(base),
                parents: Parents::new(),
                substance: None,
                appearance: None,
            })],
        }
    }

    /// Assemble a tower from nodes whose ids equal their positions, checking
    /// every structural invariant.
    pub fn from_nodes(nodes: Vec<TowerNode>) -> Result<Self, TowerError> {
        let Some(first) = nodes.first() else {
            return Err(TowerError::MissingBase);
        };
        if !first.id.is_base() || !first.placed.block.is_base() {
            return Err(TowerError::MissingBase);
        }
        if !first.parents.is_empty() {
            return Err(TowerError::BaseHasParents(first.parents.len()));
        }
        for (index, node) in nodes.iter().enumerate() {
            if node.id.index() != index {
                return Err(TowerError::MisplacedNode { index, id: node.id });
            }
        }
        for node in &nodes[1..] {
            if node.parents.is_empty() {
                return Err(TowerError::NoParents(node.id));
            }
            for &parent in &node.parents {
                if parent.index() >= nodes.len() {
                    return Err(TowerError::UnknownParent {
                        child: node.id,
                        parent,
                    });
                }
            }
        }
        check_acyclic(&nodes)?;
        Ok(Self {
            nodes: nodes.into_iter().map(Arc::new).collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Number of placed blocks, not counting the base.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether only the base is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base(&self) -> &PlacedBlock {
        &self.nodes[0].placed
    }

    pub fn get(&self, id: BlockId) -> Option<&TowerNode> {
        self.nodes.get(id.index()).map(|n| n.as_ref())
    }

    pub fn node(&self, id: BlockId) -> Result<&TowerNode, TowerError> {
        self.get(id).ok_or(TowerError::UnknownBlock(id))
    }

    /// Every node including the base, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &TowerNode> {
        self.nodes.iter().map(|n| n.as_ref())
    }

    /// Ids of the placed (non-base) blocks, in id order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.nodes[1..].iter().map(|n| n.id)
    }

    /// Blocks resting directly on `id`.
    pub fn children(&self, id: BlockId) -> Vec<BlockId> {
        self.nodes
            .iter()
            .filter(|n| n.parents.contains(&id))
            .map(|n| n.id)
            .collect()
    }

    /// Top of the tallest terminal block, measured from the base's top
    /// surface. Zero for an empty tower.
    pub fn height(&self) -> f64 {
        let mut has_child = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for p in &node.parents {
                has_child[p.index()] = true;
            }
        }
        let base_top = self.base().top_z();
        self.nodes[1..]
            .iter()
            .filter(|n| !has_child[n.id.index()])
            .map(|n| n.placed.top_z() - base_top)
            .fold(0.0, f64::max)
    }

    /// Whether `candidate` would share volume with any placed block.
    pub fn collides_with_any(&self, candidate: &PlacedBlock) -> bool {
        self.nodes[1..]
            .iter()
            .any(|n| candidate.collides(&n.placed))
    }

    // -----------------------------------------------------------------------
    // Surface queries
    // -----------------------------------------------------------------------

    /// Blocks grouped by top-surface height within `LEVEL_TOLERANCE`, tallest
    /// level first. `None` considers every node including the base.
    pub fn levels(&self, block_ids: Option<&[BlockId]>) -> Result<Vec<Level>, TowerError> {
        self.levels_within(block_ids, LEVEL_TOLERANCE)
    }

    /// `levels()` with an explicit grouping tolerance.
    pub fn levels_within(
        &self,
        block_ids: Option<&[BlockId]>,
        tolerance: f64,
    ) -> Result<Vec<Level>, TowerError> {
        let ids = self.resolve_ids(block_ids)?;
        let mut buckets: BTreeMap<i64, Level> = BTreeMap::new();
        for id in ids {
            let z = self.nodes[id.index()].placed.top_z();
            let key = (z / tolerance).round() as i64;
            let level = buckets.entry(key).or_insert(Level { z, members: vec![] });
            level.z = level.z.max(z);
            level.members.push(id);
        }
        let mut levels: Vec<Level> = buckets.into_values().rev().collect();
        for level in &mut levels {
            level.members.sort();
        }
        Ok(levels)
    }

    /// World-space top surfaces, tallest first (ties by id).
    pub fn available_surface(
        &self,
        block_ids: Option<&[BlockId]>,
    ) -> Result<Vec<Surface>, TowerError> {
        let ids = self.resolve_ids(block_ids)?;
        let mut surfaces: Vec<Surface> = ids
            .into_iter()
            .map(|id| {
                let placed = &self.nodes[id.index()].placed;
                Surface {
                    id,
                    z: placed.top_z(),
                    footprint: placed.footprint(),
                }
            })
            .collect();
        surfaces.sort_by(|a, b| b.z.total_cmp(&a.z).then(a.id.cmp(&b.id)));
        Ok(surfaces)
    }

    fn resolve_ids(&self, block_ids: Option<&[BlockId]>) -> Result<Vec<BlockId>, TowerError> {
        match block_ids {
            None => Ok(self.nodes.iter().map(|n| n.id).collect()),
            Some(ids) => {
                for &id in ids {
                    self.node(id)?;
                }
                Ok(ids.to_vec())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutation (copy-on-write)
    // -----------------------------------------------------------------------

    /// A new tower with `block` placed at `position` in `orientation`, resting
    /// on `parents`. The receiver is left untouched.
    pub fn place_block(
        &self,
        block: &Cuboid,
        parents: &[BlockId],
        position: DVec3,
        orientation: DQuat,
    ) -> Result<Tower, TowerError> {
        let id = BlockId(self.nodes.len() as u32);
        if parents.is_empty() {
            return Err(TowerError::NoParents(id));
        }
        let mut sorted: Parents = parents.iter().copied().collect();
        sorted.sort();
        sorted.dedup();
        for &parent in &sorted {
            if parent.index() >= self.nodes.len() {
                return Err(TowerError::UnknownParent { child: id, parent });
            }
        }
        let mut nodes = self.nodes.clone();
        nodes.push(Arc::new(TowerNode {
            id,
            placed: PlacedBlock {
                block: Block::Cuboid(block.clone().with_quat(orientation)),
                position,
            },
            parents: sorted,
            substance: None,
            appearance: None,
        }));
        Ok(Tower { nodes })
    }

    /// Shortest support path from the base to `block_id`, inclusive. Among
    /// equally short paths the one through lower ids wins.
    pub fn get_stack(&self, block_id: BlockId) -> Result<Vec<BlockId>, TowerError> {
        self.node(block_id)?;
        let mut children: Vec<Vec<BlockId>> = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for p in &node.parents {
                children[p.index()].push(node.id);
            }
        }
        let mut prev: Vec<Option<BlockId>> = vec![None; self.nodes.len()];
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([BlockId::BASE]);
        seen[0] = true;
        while let Some(current) = queue.pop_front() {
            if current == block_id {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(p) = prev[cursor.index()] {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return Ok(path);
            }
            for &child in &children[current.index()] {
                if !seen[child.index()] {
                    seen[child.index()] = true;
                    prev[child.index()] = Some(current);
                    queue.push_back(child);
                }
            }
        }
        Err(TowerError::Unreachable(block_id))
    }

    /// A new tower with every placed block shifted horizontally by the
    /// matching delta (one per non-base block, in id order).
    pub fn shifted(&self, deltas: &[DVec2]) -> Result<Tower, TowerError> {
        self.check_feature_len(deltas.len())?;
        let mut nodes = self.nodes.clone();
        for (node, delta) in nodes[1..].iter_mut().zip(deltas) {
            let n = Arc::make_mut(node);
            n.placed.position += delta.extend(0.0);
        }
        Ok(Tower { nodes })
    }

    /// A new tower with one substance per placed block.
    pub fn with_substances(&self, substances: Vec<Substance>) -> Result<Tower, TowerError> {
        self.check_feature_len(substances.len())?;
        let mut nodes = self.nodes.clone();
        for (node, substance) in nodes[1..].iter_mut().zip(substances) {
            Arc::make_mut(node).substance = Some(substance);
        }
        Ok(Tower { nodes })
    }

    /// A new tower with one appearance tag per placed block.
    pub fn with_appearances(&self, appearances: Vec<String>) -> Result<Tower, TowerError> {
        self.check_feature_len(appearances.len())?;
        let mut nodes = self.nodes.clone();
        for (node, appearance) in nodes[1..].iter_mut().zip(appearances) {
            Arc::make_mut(node).appearance = Some(appearance);
        }
        Ok(Tower { nodes })
    }

    /// A new tower with the substance of one placed block replaced.
    pub fn with_substance(&self, id: BlockId, substance: Substance) -> Result<Tower, TowerError> {
        let mut nodes = self.placed_node_slot(id)?;
        Arc::make_mut(&mut nodes[id.index()]).substance = Some(substance);
        Ok(Tower { nodes })
    }

    /// A new tower with the appearance of one placed block replaced.
    pub fn with_appearance(&self, id: BlockId, appearance: String) -> Result<Tower, TowerError> {
        let mut nodes = self.placed_node_slot(id)?;
        Arc::make_mut(&mut nodes[id.index()]).appearance = Some(appearance);
        Ok(Tower { nodes })
    }

    fn placed_node_slot(&self, id: BlockId) -> Result<Vec<Arc<TowerNode>>, TowerError> {
        if id.is_base() || id.index() >= self.nodes.len() {
            return Err(TowerError::UnknownBlock(id));
        }
        Ok(self.nodes.clone())
    }

    /// Substances of the placed blocks, in id order.
    pub fn substances(&self) -> Vec<Option<&Substance>> {
        self.nodes[1..]
            .iter()
            .map(|n| n.substance.as_ref())
            .collect()
    }

    /// Appearance tags of the placed blocks, in id order.
    pub fn appearances(&self) -> Vec<Option<&str>> {
        self.nodes[1..]
            .iter()
            .map(|n| n.appearance.as_deref())
            .collect()
    }

    fn check_feature_len(&self, got: usize) -> Result<(), TowerError> {
        if got != self.len() {
            return Err(TowerError::FeatureLength {
                expected: self.len(),
                got,
            });
        }
        Ok(())
    }
}

/// Kahn's algorithm over parent edges; reports one node on a cycle.
fn check_acyclic(nodes: &[TowerNode]) -> Result<(), TowerError> {
    let mut indegree: Vec<usize> = nodes.iter().map(|n| n.parents.len()).collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for node in nodes {
        for p in &node.parents {
            children[p.index()].push(node.id.index());
        }
    }
    let mut ready: Vec<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(i) = ready.pop() {
        visited += 1;
        for &c in &children[i] {
            indegree[c] -= 1;
            if indegree[c] == 0 {
                ready.push(c);
            }
        }
    }
    if visited == nodes.len() {
        return Ok(());
    }
    let stuck = (0..nodes.len()).find(|&i| indegree[i] > 0).unwrap_or(0);
    Err(TowerError::Cycle(BlockId(stuck as u32)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_tower(l: f64, w: f64) -> Tower {
        Tower::new(BaseBlock::new(&[l, w]).unwrap())
    }

    fn cuboid(l: f64, w: f64, h: f64) -> Cuboid {
        Cuboid::new(&[l, w, h]).unwrap()
    }

    /// Place a block on `parents` with its bottom at `z`.
    fn stack(tower: &Tower, c: &Cuboid, parents: &[BlockId], x: f64, y: f64, z: f64) -> Tower {
        let placed = c.moveto(DVec2::new(x, y), z);
        tower
            .place_block(c, parents, placed.position, DQuat::IDENTITY)
            .unwrap()
    }

    #[test]
    fn empty_tower_has_zero_height() {
        let t = base_tower(4.0, 4.0);
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert_eq!(t.height(), 0.0);
    }

    #[test]
    fn place_block_is_copy_on_write() {
        let t0 = base_tower(4.0, 4.0);
        let t1 = stack(&t0, &cuboid(2.0, 1.0, 1.0), &[BlockId::BASE], 0.0, 0.0, 0.0);
        assert_eq!(t0.len(), 0);
        assert_eq!(t1.len(), 1);
        let parents = &t1.get(BlockId(1)).unwrap().parents;
        assert_eq!(parents.as_slice(), &[BlockId::BASE]);
    }

    #[test]
    fn ids_increase_monotonically() {
        let t = base_tower(4.0, 4.0);
        let c = cuboid(1.0, 1.0, 1.0);
        let t = stack(&t, &c, &[BlockId::BASE], -1.0, 0.0, 0.0);
        let t = stack(&t, &c, &[BlockId::BASE], 1.0, 0.0, 0.0);
        let ids: Vec<BlockId> = t.block_ids().collect();
        assert_eq!(ids, vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn place_block_rejects_bad_parents() {
        let t = base_tower(4.0, 4.0);
        let c = cuboid(1.0, 1.0, 1.0);
        let at = DVec3::new(0.0, 0.0, 0.5);
        assert_eq!(
            t.place_block(&c, &[], at, DQuat::IDENTITY),
            Err(TowerError::NoParents(BlockId(1)))
        );
        assert_eq!(
            t.place_block(&c, &[BlockId(7)], at, DQuat::IDENTITY),
            Err(TowerError::UnknownParent {
                child: BlockId(1),
                parent: BlockId(7),
            })
        );
    }

    #[test]
    fn duplicate_parents_are_collapsed() {
        let t = base_tower(4.0, 4.0);
        let c = cuboid(1.0, 1.0, 1.0);
        let at = DVec3::new(0.0, 0.0, 0.5);
        let t = t
            .place_block(&c, &[BlockId::BASE, BlockId::BASE], at, DQuat::IDENTITY)
            .unwrap();
        assert_eq!(t.get(BlockId(1)).unwrap().parents.len(), 1);
    }

    #[test]
    fn height_tracks_tallest_leaf() {
        let t = base_tower(4.0, 4.0);
        let t1 = stack(&t, &cuboid(2.0, 1.0, 1.0), &[BlockId::BASE], 0.0, 0.0, 0.0);
        assert!((t1.height() - 1.0).abs() < 1e-12);
        let t2 = stack(&t1, &cuboid(1.0, 1.0, 0.5), &[BlockId(1)], 0.0, 0.0, 1.0);
        assert!((t2.height() - 1.5).abs() < 1e-12);
        assert!(t2.height() >= t1.height());
        // A short block beside the stack does not lower the height.
        let t3 = stack(&t2, &cuboid(0.5, 0.5, 0.5), &[BlockId::BASE], 1.5, 1.5, 0.0);
        assert!((t3.height() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn levels_group_by_top_height_tallest_first() {
        let t = base_tower(6.0, 6.0);
        let c = cuboid(1.0, 1.0, 1.0);
        let t = stack(&t, &c, &[BlockId::BASE], -2.0, 0.0, 0.0);
        let t = stack(&t, &c, &[BlockId::BASE], 2.0, 0.0, 0.0);
        let t = stack(&t, &c, &[BlockId(1)], -2.0, 0.0, 1.0);
        let levels = t.levels(None).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].members, vec![BlockId(3)]);
        assert_eq!(levels[1].members, vec![BlockId(1), BlockId(2)]);
        assert_eq!(levels[2].members, vec![BlockId::BASE]);
        assert!(levels[0].z > levels[1].z && levels[1].z > levels[2].z);
    }

    #[test]
    fn levels_respect_subset() {
        let t = base_tower(6.0, 6.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], 0.0, 0.0, 0.0);
        let levels = t.levels(Some(&[BlockId(1)])).unwrap();
        assert_eq!(levels.len(), 1);
        assert!(t.levels(Some(&[BlockId(9)])).is_err());
    }

    #[test]
    fn available_surface_sorted_descending() {
        let t = base_tower(6.0, 6.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 2.0), &[BlockId::BASE], -2.0, 0.0, 0.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], 2.0, 0.0, 0.0);
        let surfaces = t.available_surface(None).unwrap();
        let zs: Vec<f64> = surfaces.iter().map(|s| s.z).collect();
        assert_eq!(zs, vec![2.0, 1.0, 0.0]);
        assert_eq!(surfaces[0].id, BlockId(1));
        assert!(surfaces[0].footprint.contains_point(DVec2::new(-2.0, 0.0)));
    }

    #[test]
    fn get_stack_returns_shortest_support_path() {
        let t = base_tower(6.0, 6.0);
        let c = cuboid(1.0, 1.0, 1.0);
        let t = stack(&t, &c, &[BlockId::BASE], 0.0, 0.0, 0.0);
        let t = stack(&t, &c, &[BlockId(1)], 0.0, 0.0, 1.0);
        let t = stack(&t, &c, &[BlockId(2)], 0.0, 0.0, 2.0);
        assert_eq!(
            t.get_stack(BlockId(3)).unwrap(),
            vec![BlockId::BASE, BlockId(1), BlockId(2), BlockId(3)]
        );
        assert_eq!(t.get_stack(BlockId::BASE).unwrap(), vec![BlockId::BASE]);
        assert_eq!(
            t.get_stack(BlockId(8)),
            Err(TowerError::UnknownBlock(BlockId(8)))
        );
    }

    #[test]
    fn get_stack_through_bridge_prefers_shorter_support() {
        // #1 and #2 form a two-high column at x = 1; #3 is a single tall
        // block at x = -1. The bridge #4 rests on both column tops.
        let t = base_tower(6.0, 6.0);
        let unit = cuboid(1.0, 1.0, 1.0);
        let tall = cuboid(1.0, 1.0, 2.0);
        let bridge = cuboid(3.0, 1.0, 1.0);
        let t = stack(&t, &unit, &[BlockId::BASE], 1.0, 0.0, 0.0);
        let t = stack(&t, &unit, &[BlockId(1)], 1.0, 0.0, 1.0);
        let t = stack(&t, &tall, &[BlockId::BASE], -1.0, 0.0, 0.0);
        let t = stack(&t, &bridge, &[BlockId(2), BlockId(3)], 0.0, 0.0, 2.0);
        assert_eq!(
            t.get_stack(BlockId(4)).unwrap(),
            vec![BlockId::BASE, BlockId(3), BlockId(4)]
        );
    }

    #[test]
    fn get_stack_ties_go_to_lowest_parent() {
        let t = base_tower(6.0, 6.0);
        let unit = cuboid(1.0, 1.0, 1.0);
        let bridge = cuboid(3.0, 1.0, 1.0);
        let t = stack(&t, &unit, &[BlockId::BASE], -1.0, 0.0, 0.0);
        let t = stack(&t, &unit, &[BlockId::BASE], 1.0, 0.0, 0.0);
        let t = stack(&t, &bridge, &[BlockId(2), BlockId(1)], 0.0, 0.0, 1.0);
        let t = stack(&t, &unit, &[BlockId(3)], 0.0, 0.0, 2.0);
        let parents = &t.get(BlockId(3)).unwrap().parents;
        assert_eq!(parents.as_slice(), &[BlockId(1), BlockId(2)]);
        assert_eq!(
            t.get_stack(BlockId(4)).unwrap(),
            vec![BlockId::BASE, BlockId(1), BlockId(3), BlockId(4)]
        );
    }

    #[test]
    fn children_lists_supported_blocks() {
        let t = base_tower(6.0, 6.0);
        let c = cuboid(1.0, 1.0, 1.0);
        let t = stack(&t, &c, &[BlockId::BASE], -1.0, 0.0, 0.0);
        let t = stack(&t, &c, &[BlockId::BASE], 1.0, 0.0, 0.0);
        assert_eq!(t.children(BlockId::BASE), vec![BlockId(1), BlockId(2)]);
        assert!(t.children(BlockId(1)).is_empty());
    }

    #[test]
    fn feature_setters_check_length_and_copy() {
        let t = base_tower(4.0, 4.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], 0.0, 0.0, 0.0);
        assert_eq!(
            t.with_appearances(vec![]),
            Err(TowerError::FeatureLength {
                expected: 1,
                got: 0,
            })
        );
        let painted = t.with_appearances(vec!["Wood".into()]).unwrap();
        assert_eq!(painted.appearances(), vec![Some("Wood")]);
        assert_eq!(t.appearances(), vec![None]);
    }

    #[test]
    fn single_block_features() {
        let t = base_tower(4.0, 4.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], -1.0, 0.0, 0.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], 1.0, 0.0, 0.0);
        let metal = Substance {
            name: "Metal".into(),
            density: 7.0,
            friction: 0.2,
        };
        let t2 = t.with_substance(BlockId(2), metal.clone()).unwrap();
        assert_eq!(t2.substances(), vec![None, Some(&metal)]);
        let t3 = t2.with_appearance(BlockId(1), "H".into()).unwrap();
        assert_eq!(t3.appearances(), vec![Some("H"), None]);
        assert_eq!(
            t.with_substance(BlockId::BASE, metal),
            Err(TowerError::UnknownBlock(BlockId::BASE))
        );
        assert!(t.with_appearance(BlockId(3), "L".into()).is_err());
    }

    #[test]
    fn shifted_moves_only_placed_blocks() {
        let t = base_tower(4.0, 4.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], 0.0, 0.0, 0.0);
        let moved = t.shifted(&[DVec2::new(0.25, -0.5)]).unwrap();
        let p = moved.get(BlockId(1)).unwrap().placed.position;
        assert!((p - DVec3::new(0.25, -0.5, 0.5)).length() < 1e-12);
        assert_eq!(moved.base(), t.base());
    }

    #[test]
    fn from_nodes_rejects_structural_defects() {
        let t = base_tower(4.0, 4.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId::BASE], 0.0, 0.0, 0.0);
        let t = stack(&t, &cuboid(1.0, 1.0, 1.0), &[BlockId(1)], 0.0, 0.0, 1.0);
        let nodes: Vec<TowerNode> = t.nodes().cloned().collect();

        assert_eq!(Tower::from_nodes(nodes.clone()).unwrap(), t);
        assert_eq!(Tower::from_nodes(vec![]), Err(TowerError::MissingBase));

        let mut orphan = nodes.clone();
        orphan[2].parents.clear();
        assert_eq!(
            Tower::from_nodes(orphan),
            Err(TowerError::NoParents(BlockId(2)))
        );

        let mut cyclic = nodes.clone();
        cyclic[1].parents = Parents::from_slice(&[BlockId(2)]);
        let cycle = Tower::from_nodes(cyclic);
        assert!(matches!(cycle, Err(TowerError::Cycle(_))));

        let mut dangling = nodes;
        dangling[2].parents = Parents::from_slice(&[BlockId(5)]);
        assert!(matches!(
            Tower::from_nodes(dangling),
            Err(TowerError::UnknownParent { .. })
        ));
    }
}
