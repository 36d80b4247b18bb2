// Error taxonomy for the tower library.
//
// Four families, each with its own enum so call sites can only produce the
// kinds of failure that make sense for them:
//
// - `BlockError`: construction-time validation of dimensions and
//   orientations. Raised by `block.rs` before any geometry is computed.
// - `TowerError`: structural violations at the tower mutation/loading
//   boundary (missing base, unknown parent, cycles). These signal a logic
//   defect in the caller; the builder propagates them untouched.
// - `DocumentError`: malformed node-link documents. Wraps `BlockError` and
//   `TowerError` for the validation that loading performs.
// - `PhysicsError`: failures reported by, or about, the external physics
//   collaborator, including substances missing from a serialized world.
//
// `ConfigError` covers invalid budgets and material mixes.
//
// "No placement found" is deliberately absent: search exhaustion is an
// empty candidate list, and the builder reports it as `BuildStatus::Stalled`.

use crate::types::BlockId;
use thiserror::Error;

/// Invalid input at block construction.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BlockError {
    #[error("dimensions of length {got} not accepted (expected {expected})")]
    DimensionCount { expected: usize, got: usize },
    #[error("dimension {index} must be positive and finite, got {value}")]
    NonPositiveDimension { index: usize, value: f64 },
    #[error("orientation must have 4 components [w, x, y, z], got {0}")]
    OrientationLength(usize),
    #[error("orientation {0:?} cannot be normalized")]
    DegenerateOrientation([f64; 4]),
}

/// Structural violation of the tower graph.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TowerError {
    #[error("tower does not have a base")]
    MissingBase,
    #[error("base node must have no parents, found {0}")]
    BaseHasParents(usize),
    #[error("block {0} has no supporting parent")]
    NoParents(BlockId),
    #[error("parent {parent} of block {child} does not exist")]
    UnknownParent { child: BlockId, parent: BlockId },
    #[error("block {0} does not exist")]
    UnknownBlock(BlockId),
    #[error("node at position {index} carries id {id}")]
    MisplacedNode { index: usize, id: BlockId },
    #[error("support graph contains a cycle through block {0}")]
    Cycle(BlockId),
    #[error("block {0} is not reachable from the base")]
    Unreachable(BlockId),
    #[error("expected {expected} values (one per block), got {got}")]
    FeatureLength { expected: usize, got: usize },
}

/// A node-link document that cannot be turned into a tower.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed tower JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node ids must be exactly 0..{count}, found id {id}")]
    NonContiguousIds { count: usize, id: u32 },
    #[error("node {0} appears more than once")]
    DuplicateNode(BlockId),
    #[error("node {0} is missing a position")]
    MissingPosition(BlockId),
    #[error("invalid block {id}: {source}")]
    Block {
        id: BlockId,
        #[source]
        source: BlockError,
    },
    #[error(transparent)]
    Structure(#[from] TowerError),
}

/// Failures from or about the external rigid-body simulation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PhysicsError {
    #[error("block {0} has no substance; assign materials before simulating")]
    MissingSubstance(BlockId),
    #[error("object {0} not found in the loaded world")]
    UnknownObject(BlockId),
    #[error("trace is {frames}x{objects}, expected {expected_frames}x{expected_objects}")]
    MalformedTrace {
        frames: usize,
        objects: usize,
        expected_frames: usize,
        expected_objects: usize,
    },
    #[error("physics backend failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Structure(#[from] TowerError),
}

/// Invalid tunables.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_height must be a non-negative number, got {0}")]
    MaxHeight(f64),
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("safety margin must lie in [0, 1), got {0}")]
    SafetyMargin(f64),
    #[error("material mix is empty")]
    EmptyMix,
    #[error("material {name} has invalid weight {weight}")]
    MixWeight { name: String, weight: f64 },
    #[error("material distribution sums to {0}, not one")]
    MixSum(f64),
    #[error("{name} sampling range must be finite with low < high, got [{low}, {high})")]
    SampleRange {
        name: &'static str,
        low: f64,
        high: f64,
    },
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error("malformed config JSON: {0}")]
    Json(String),
}
