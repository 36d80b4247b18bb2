// Incremental tower builder.
//
// `Builder::build()` takes a starting tower and a sequence of blocks and
// places them one at a time. For each block it asks the placement search for
// every valid spot (over all allowed rotations), lets a `PlacementPolicy`
// pick one, and continues with the tower `place_block()` returns. The input
// tower is never touched.
//
// Termination, checked before each block:
// - `max_blocks` blocks placed by this build -> `Completed(BlockBudget)`
// - tower height at or above `max_height`   -> `Completed(HeightBudget)`
// - no blocks left in the sequence          -> `Completed(SequenceExhausted)`
// - the search found nothing for a block     -> `Stalled { block_index }`
//
// A stall is an ordinary outcome, not an error. The only errors `build()`
// returns are structural (`TowerError`) and mean the search produced an
// invalid placement.
//
// **Critical constraint: determinism.** The policy draws from the caller's
// `TowerRng` and nothing else; the same seed, tower, and sequence always
// produce the same result.

use crate::block::Cuboid;
use crate::error::{ConfigError, TowerError};
use crate::placement::{Placement, SearchConfig, find_placements};
use crate::tower::Tower;
use blocktower_prng::TowerRng;
use glam::DQuat;
use serde::{Deserialize, Serialize};

/// Budgets for one build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Blocks this build may add on top of the starting tower.
    pub max_blocks: usize,
    /// Stop once the tower is at least this tall.
    pub max_height: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_blocks: 10,
            max_height: 100.0,
        }
    }
}

impl BuilderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_height.is_nan() || self.max_height < 0.0 {
            return Err(ConfigError::MaxHeight(self.max_height));
        }
        Ok(())
    }
}

/// Which budget ended a successful build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    BlockBudget,
    HeightBudget,
    SequenceExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    Completed(Completion),
    /// Block `block_index` of the sequence had no valid placement.
    Stalled { block_index: usize },
}

impl BuildStatus {
    pub fn is_stalled(self) -> bool {
        matches!(self, BuildStatus::Stalled { .. })
    }
}

/// Result of a build: the final tower and why building stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildOutcome {
    pub tower: Tower,
    pub status: BuildStatus,
    /// Blocks added by this build.
    pub placed: usize,
}

/// Picks one of the (non-empty) candidate placements.
pub trait PlacementPolicy {
    /// Index into `candidates`. Indices past the end wrap around.
    fn choose(&mut self, candidates: &[Placement], rng: &mut TowerRng) -> usize;
}

/// Uniformly random choice.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformPolicy;

impl PlacementPolicy for UniformPolicy {
    fn choose(&mut self, candidates: &[Placement], rng: &mut TowerRng) -> usize {
        rng.choose_index(candidates.len()).unwrap_or(0)
    }
}

impl<F> PlacementPolicy for F
where
    F: FnMut(&[Placement], &mut TowerRng) -> usize,
{
    fn choose(&mut self, candidates: &[Placement], rng: &mut TowerRng) -> usize {
        self(candidates, rng)
    }
}

/// Search settings plus budgets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Builder {
    pub search: SearchConfig,
    pub config: BuilderConfig,
}

impl Builder {
    pub fn new(search: SearchConfig, config: BuilderConfig) -> Result<Self, ConfigError> {
        search.validate()?;
        config.validate()?;
        Ok(Self { search, config })
    }

    /// Build on `base` with uniformly random choices.
    pub fn build<I>(
        &self,
        base: &Tower,
        blocks: I,
        rotations: &[DQuat],
        rng: &mut TowerRng,
    ) -> Result<BuildOutcome, TowerError>
    where
        I: IntoIterator<Item = Cuboid>,
    {
        self.build_with(base, blocks, rotations, &mut UniformPolicy, rng)
    }

    /// Build on `base`, letting `policy` pick among candidates.
    pub fn build_with<I, P>(
        &self,
        base: &Tower,
        blocks: I,
        rotations: &[DQuat],
        policy: &mut P,
        rng: &mut TowerRng,
    ) -> Result<BuildOutcome, TowerError>
    where
        I: IntoIterator<Item = Cuboid>,
        P: PlacementPolicy + ?Sized,
    {
        let mut tower = base.clone();
        let mut placed = 0;
        let mut blocks = blocks.into_iter();

        let status = loop {
            if placed >= self.config.max_blocks {
                break BuildStatus::Completed(Completion::BlockBudget);
            }
            if tower.height() >= self.config.max_height {
                break BuildStatus::Completed(Completion::HeightBudget);
            }
            let Some(block) = blocks.next() else {
                break BuildStatus::Completed(Completion::SequenceExhausted);
            };

            let candidates = find_placements(&tower, &block, rotations, &self.search);
            if candidates.is_empty() {
                log::warn!(
                    "no valid placement for block {placed} ({:?}); stopping",
                    block.dimensions()
                );
                break BuildStatus::Stalled {
                    block_index: placed,
                };
            }
            let choice = policy.choose(&candidates, rng) % candidates.len();
            let pick = &candidates[choice];
            log::debug!(
                "block {placed}: {} candidates, chose {choice} on {:?}",
                candidates.len(),
                pick.parents
            );
            tower = tower
                .place_block(&block, &pick.parents, pick.position, pick.orientation)?;
            placed += 1;
        };

        log::info!(
            "build finished: {status:?}, {placed} placed, height {:.3}",
            tower.height()
        );
        Ok(BuildOutcome {
            tower,
            status,
            placed,
        })
    }
}
