// Procedural tower generation.
//
// A generated tower goes through three stages:
//
// 1. `sample_blocks()`: `n` cuboids whose dimensions are the configured
//    block dims in a random order per block (so a [2, 1, 1] block may come
//    out long, wide, or tall).
// 2. `sample_structure()`: the builder stacks those blocks on the base.
// 3. `sample_materials()`: each block draws a material name from the
//    `MaterialMix`; the name becomes its appearance, and the substance table
//    resolves it into a substance.
//
// `configurations()` then derives the material variants used in stability
// analysis: for every block and every "unknown" material, a congruent tower
// (the block looks like and is made of the unknown material) and an
// incongruent one (it looks like that material but is made of the next
// unknown in the list).
//
// `generate()` produces many towers at once with rayon. Tower `i` always
// draws from `rng.fork(i)`, so a batch is reproducible no matter how the
// work is scheduled.

use crate::block::{BaseBlock, Cuboid, cardinal_rotations};
use crate::builder::{BuildOutcome, Builder, BuilderConfig};
use crate::error::{ConfigError, TowerError};
use crate::substance::{MaterialMix, SubstanceTable};
use crate::tower::Tower;
use crate::types::BlockId;
use blocktower_prng::TowerRng;
use glam::DQuat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Rotations the builder may try for each sampled block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSet {
    /// Blocks keep the orientation they were sampled with.
    #[default]
    Identity,
    /// Identity plus quarter turns about x, y and z.
    Cardinal,
}

impl RotationSet {
    pub fn rotations(self) -> Vec<DQuat> {
        match self {
            RotationSet::Identity => vec![DQuat::IDENTITY],
            RotationSet::Cardinal => cardinal_rotations(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// `[l, w]` of the platform.
    pub base_dims: Vec<f64>,
    /// Dimensions every sampled block is a permutation of.
    pub block_dims: [f64; 3],
    /// Blocks per tower.
    pub n_blocks: usize,
    pub materials: MaterialMix,
    /// Materials substituted in `configurations()`.
    pub unknowns: Vec<String>,
    pub rotations: RotationSet,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_dims: vec![4.0, 4.0],
            block_dims: [2.0, 1.0, 1.0],
            n_blocks: 5,
            materials: MaterialMix::default(),
            unknowns: vec!["H".to_string(), "L".to_string()],
            rotations: RotationSet::Identity,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        BaseBlock::new(&self.base_dims)?;
        Cuboid::new(&self.block_dims)?;
        if self.n_blocks == 0 {
            return Err(ConfigError::NonPositive {
                name: "n_blocks",
                value: 0.0,
            });
        }
        self.materials.validate()
    }
}

/// One block's material swapped for an unknown one.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub block: BlockId,
    pub unknown: String,
    /// Appearance and substance both `unknown`.
    pub congruent: Tower,
    /// Appearance `unknown`, substance the next unknown in the list.
    pub incongruent: Tower,
}

impl Configuration {
    /// Both variants with report labels such as `"3_H_congruent"`.
    pub fn variants(&self) -> [(String, &Tower); 2] {
        let stem = format!("{}_{}", self.block.0, self.unknown);
        [
            (format!("{stem}_congruent"), &self.congruent),
            (format!("{stem}_incongruent"), &self.incongruent),
        ]
    }
}

/// Samples block sequences, structures and materials.
#[derive(Clone, Debug)]
pub struct Generator {
    config: GeneratorConfig,
    builder: Builder,
    substances: SubstanceTable,
    base: Tower,
}

impl Generator {
    pub fn new(
        config: GeneratorConfig,
        builder: Builder,
        substances: SubstanceTable,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        builder.search.validate()?;
        builder.config.validate()?;
        substances.validate()?;
        let base = Tower::new(BaseBlock::new(&config.base_dims)?);
        Ok(Self {
            config,
            builder,
            substances,
            base,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The empty tower built from `base_dims`.
    pub fn base(&self) -> &Tower {
        &self.base
    }

    /// `n` blocks, each a random permutation of `block_dims`.
    pub fn sample_blocks(&self, n: usize, rng: &mut TowerRng) -> Vec<Cuboid> {
        (0..n)
            .filter_map(|_| {
                let mut dims = self.config.block_dims;
                rng.shuffle(&mut dims);
                // Permutations of validated dims are valid.
                Cuboid::new(&dims).ok()
            })
            .collect()
    }

    /// Build `n` sampled blocks onto `base`.
    pub fn sample_structure(
        &self,
        base: &Tower,
        n: usize,
        rng: &mut TowerRng,
    ) -> Result<BuildOutcome, TowerError> {
        let blocks = self.sample_blocks(n, rng);
        let builder = Builder {
            search: self.builder.search.clone(),
            config: BuilderConfig {
                max_blocks: n,
                ..self.builder.config.clone()
            },
        };
        builder.build(base, blocks, &self.config.rotations.rotations(), rng)
    }

    /// Assign a material (appearance plus resolved substance) to every
    /// placed block.
    pub fn sample_materials(&self, tower: &Tower, rng: &mut TowerRng) -> Result<Tower, TowerError> {
        let names: Vec<String> = (0..tower.len())
            .map(|_| self.config.materials.sample(rng).to_string())
            .collect();
        let substances = names
            .iter()
            .map(|name| self.substances.resolve(name, rng))
            .collect();
        tower.with_substances(substances)?.with_appearances(names)
    }

    /// Structure plus materials.
    pub fn sample_tower(
        &self,
        base: &Tower,
        n: usize,
        rng: &mut TowerRng,
    ) -> Result<BuildOutcome, TowerError> {
        let outcome = self.sample_structure(base, n, rng)?;
        let tower = self.sample_materials(&outcome.tower, rng)?;
        Ok(BuildOutcome { tower, ..outcome })
    }

    /// `count` towers of `n_blocks` each, built in parallel on the
    /// configured base. Tower `i` uses `rng.fork(i)`.
    pub fn generate(&self, count: usize, rng: &TowerRng) -> Result<Vec<BuildOutcome>, TowerError> {
        self.generate_on(&self.base, count, rng)
    }

    /// `generate()` extending an existing tower instead of the bare base.
    pub fn generate_on(
        &self,
        base: &Tower,
        count: usize,
        rng: &TowerRng,
    ) -> Result<Vec<BuildOutcome>, TowerError> {
        (0..count)
            .into_par_iter()
            .map(|i| {
                let mut stream = rng.fork(i as u64);
                self.sample_tower(base, self.config.n_blocks, &mut stream)
            })
            .collect()
    }

    /// Material variants of `tower`, one per (block, unknown material), in
    /// block order.
    pub fn configurations(
        &self,
        tower: &Tower,
        rng: &mut TowerRng,
    ) -> Result<Vec<Configuration>, TowerError> {
        let unknowns = &self.config.unknowns;
        let mut out = Vec::with_capacity(tower.len() * unknowns.len());
        for block in tower.block_ids() {
            for (m, unknown) in unknowns.iter().enumerate() {
                let other = &unknowns[(m + 1) % unknowns.len()];
                let looks = tower.with_appearance(block, unknown.clone())?;
                let congruent =
                    looks.with_substance(block, self.substances.resolve(unknown, rng))?;
                let incongruent = looks.with_substance(block, self.substances.resolve(other, rng))?;
                out.push(Configuration {
                    block,
                    unknown: unknown.clone(),
                    congruent,
                    incongruent,
                });
            }
        }
        Ok(out)
    }
}
