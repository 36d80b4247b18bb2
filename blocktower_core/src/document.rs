// Node-link document form of a tower.
//
// The wire shape is a JSON array of nodes, each carrying its block data and
// an adjacency list of outgoing support edges (parent -> child):
//
//   [{"id": 0, "name": 0, "data": {"dims": [4.0, 4.0], "pos": [0, 0, 0]},
//     "adjacencies": [{"nodeTo": 1, "data": {}}]},
//    {"id": 1, "name": 1, "data": {"dims": [2, 1, 1], "pos": [0, 0, 0.5],
//     "substance": {"name": "Wood", "density": 3.0, "friction": 0.5}}}]
//
// The base is id 0 (the string "base" is accepted on input). Ids must be
// exactly `0..n`; `orientation` is a `[w, x, y, z]` quaternion and is left
// out for unrotated blocks. Missing `adjacencies` means no children.
//
// Loading goes through `Tower::from_nodes()`, so a document can never produce
// a tower that violates the structural invariants.

use crate::block::{BaseBlock, Block, Cuboid, PlacedBlock, is_identity, quat_to_wxyz};
use crate::error::DocumentError;
use crate::substance::Substance;
use crate::tower::{Parents, Tower, TowerNode};
use crate::types::BlockId;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Node identifier as written in documents: an integer, or `"base"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeKey {
    Index(u32),
    Name(String),
}

impl NodeKey {
    fn resolve(&self) -> Option<BlockId> {
        match self {
            NodeKey::Index(i) => Some(BlockId(*i)),
            NodeKey::Name(name) if name == "base" => Some(BlockId::BASE),
            NodeKey::Name(name) => name.parse().ok().map(BlockId),
        }
    }
}

impl From<BlockId> for NodeKey {
    fn from(id: BlockId) -> Self {
        NodeKey::Index(id.0)
    }
}

/// Per-node block data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub dims: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substance: Option<Substance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
}

/// Edge attributes. Support edges carry none today; the object is kept so
/// documents stay in node-link shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {}

/// One outgoing support edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adjacency {
    #[serde(rename = "nodeTo")]
    pub node_to: NodeKey,
    #[serde(default)]
    pub data: EdgeData,
}

/// One node record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<NodeKey>,
    pub data: NodeData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjacencies: Vec<Adjacency>,
}

/// A whole tower as a node-link document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TowerDocument {
    pub nodes: Vec<NodeRecord>,
}

impl TowerDocument {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Record for `id`, if present.
    pub fn node(&self, id: BlockId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.id.resolve() == Some(id))
    }
}

impl Tower {
    /// Node-link document for this tower, nodes in id order.
    pub fn to_document(&self) -> TowerDocument {
        let mut adjacencies: Vec<Vec<Adjacency>> = vec![Vec::new(); self.len() + 1];
        for node in self.nodes() {
            for parent in &node.parents {
                adjacencies[parent.index()].push(Adjacency {
                    node_to: node.id.into(),
                    data: EdgeData::default(),
                });
            }
        }
        let nodes = self
            .nodes()
            .zip(adjacencies)
            .map(|(node, adjacencies)| {
                let q = node.placed.orientation();
                NodeRecord {
                    id: node.id.into(),
                    name: Some(node.id.into()),
                    data: NodeData {
                        dims: node.placed.block.dims_vec(),
                        pos: Some(node.placed.position.to_array()),
                        orientation: (!is_identity(q)).then(|| quat_to_wxyz(q)),
                        substance: node.substance.clone(),
                        appearance: node.appearance.clone(),
                    },
                    adjacencies,
                }
            })
            .collect();
        TowerDocument { nodes }
    }

    /// Rebuild a tower from a document, validating ids, shapes and structure.
    pub fn from_document(doc: &TowerDocument) -> Result<Tower, DocumentError> {
        let count = doc.nodes.len();
        let mut slots: Vec<Option<&NodeRecord>> = vec![None; count];
        for record in &doc.nodes {
            let Some(id) = record.id.resolve().filter(|id| id.index() < count) else {
                let id = record.id.resolve().map_or(u32::MAX, |id| id.0);
                return Err(DocumentError::NonContiguousIds { count, id });
            };
            if slots[id.index()].replace(record).is_some() {
                return Err(DocumentError::DuplicateNode(id));
            }
        }

        let mut parents: Vec<Parents> = vec![Parents::new(); count];
        for (index, slot) in slots.iter().enumerate() {
            // Every slot is filled: `count` distinct ids below `count`.
            let Some(record) = slot else { continue };
            for adj in &record.adjacencies {
                let child = adj
                    .node_to
                    .resolve()
                    .filter(|c| c.index() < count)
                    .ok_or(DocumentError::NonContiguousIds {
                        count,
                        id: adj.node_to.resolve().map_or(u32::MAX, |c| c.0),
                    })?;
                let parent = BlockId(index as u32);
                if !parents[child.index()].contains(&parent) {
                    parents[child.index()].push(parent);
                }
            }
        }

        let mut nodes = Vec::with_capacity(count);
        for (index, (slot, mut node_parents)) in slots.into_iter().zip(parents).enumerate() {
            let id = BlockId(index as u32);
            let Some(record) = slot else {
                return Err(DocumentError::NonContiguousIds { count, id: id.0 });
            };
            let data = &record.data;
            let block_err = |source| DocumentError::Block { id, source };
            let placed = if id.is_base() {
                PlacedBlock::base(BaseBlock::new(&data.dims).map_err(block_err)?)
            } else {
                let mut cuboid = Cuboid::new(&data.dims).map_err(block_err)?;
                if let Some(q) = &data.orientation {
                    cuboid = cuboid.with_orientation(q).map_err(block_err)?;
                }
                let pos = data.pos.ok_or(DocumentError::MissingPosition(id))?;
                PlacedBlock {
                    block: Block::Cuboid(cuboid),
                    position: DVec3::from_array(pos),
                }
            };
            node_parents.sort();
            nodes.push(TowerNode {
                id,
                placed,
                parents: node_parents,
                substance: data.substance.clone(),
                appearance: data.appearance.clone(),
            });
        }
        Ok(Tower::from_nodes(nodes)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        self.to_document().to_json()
    }

    pub fn from_json(json: &str) -> Result<Tower, DocumentError> {
        Tower::from_document(&TowerDocument::from_json(json)?)
    }
}
