// Core identifiers and numeric tolerances shared across the crate.
//
// Block ids are dense integers: the base is always `BlockId::BASE` (0) and
// every placed block gets the next integer, which doubles as its index into
// the tower's node arena (see `tower.rs`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for point/polygon predicates (containment, touching).
pub const GEOM_EPS: f64 = 1e-9;

/// Vertical gap under which a block counts as resting on another.
pub const CONTACT_TOLERANCE: f64 = 1e-6;

/// Compact identifier for a node in a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The platform every tower is built on.
    pub const BASE: BlockId = BlockId(0);

    pub fn is_base(self) -> bool {
        self == Self::BASE
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_base() {
            write!(f, "base")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}
