// Perturbation-based stability ("entropy") analysis.
//
// A tower that passes the geometric checks can still be dynamically
// fragile. The analyzer estimates how much a tower moves under small
// disturbances:
//
// 1. `perturb()`: `perturbations` copies of the tower, every placed block
//    shifted in XY by independent Gaussian noise (std `noise`).
// 2. Each copy is handed to the external physics backend as a node-link
//    document; the backend returns per-frame, per-block positions.
// 3. `kinetic_energy()`: step-wise speeds (mean of the per-axis absolute
//    displacement, divided by the trace length) are squared, weighted by
//    block mass (density x volume), halved, and summed over frames and
//    blocks.
// 4. `analyze()`: mean and (population) standard deviation of the kinetic
//    energy across copies.
//
// Perturbations are drawn sequentially from the caller's `TowerRng` and then
// simulated in parallel with rayon; the reduction happens after every
// simulation returns, so results do not depend on scheduling.
//
// The physics engine itself is a collaborator behind `PhysicsBackend`. The
// analyzer validates what comes back: a trace with the wrong shape is
// `PhysicsError::MalformedTrace`.

use crate::document::TowerDocument;
use crate::error::{ConfigError, PhysicsError};
use crate::tower::Tower;
use crate::types::BlockId;
use blocktower_prng::TowerRng;
use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Simulation output, indexed `[frame][object]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub position: Vec<Vec<[f64; 3]>>,
    /// `[w, x, y, z]` quaternions.
    pub rotation: Vec<Vec<[f64; 4]>>,
}

impl Trace {
    pub fn frames(&self) -> usize {
        self.position.len()
    }

    /// Error unless every frame holds exactly `objects` entries and there
    /// are exactly `frames` frames.
    pub fn check_shape(&self, frames: usize, objects: usize) -> Result<(), PhysicsError> {
        let malformed = |got_frames: usize, got_objects: usize| PhysicsError::MalformedTrace {
            frames: got_frames,
            objects: got_objects,
            expected_frames: frames,
            expected_objects: objects,
        };
        if self.position.len() != frames {
            return Err(malformed(self.position.len(), objects));
        }
        if !self.rotation.is_empty() && self.rotation.len() != frames {
            return Err(malformed(self.rotation.len(), objects));
        }
        for row in &self.position {
            if row.len() != objects {
                return Err(malformed(frames, row.len()));
            }
        }
        for row in &self.rotation {
            if row.len() != objects {
                return Err(malformed(frames, row.len()));
            }
        }
        Ok(())
    }
}

/// External rigid-body simulation.
pub trait PhysicsBackend: Send + Sync {
    /// Load `world`, run it for `frames` frames and report the pose of each
    /// of `objects` at every frame.
    fn get_trace(
        &self,
        world: &TowerDocument,
        frames: usize,
        objects: &[BlockId],
    ) -> Result<Trace, PhysicsError>;
}

/// Step-wise speeds, `[frame - 1][object]`: the mean over axes of the
/// absolute displacement between consecutive frames, divided by the number
/// of frames.
pub fn velocity(positions: &[Vec<[f64; 3]>]) -> Vec<Vec<f64>> {
    let n = positions.len() as f64;
    positions
        .windows(2)
        .map(|w| {
            w[0].iter()
                .zip(&w[1])
                .map(|(a, b)| {
                    let d: f64 = (0..3).map(|k| (b[k] - a[k]).abs()).sum();
                    d / 3.0 / n
                })
                .collect()
        })
        .collect()
}

/// Whether a trace shows motion: the mean step-wise speed, rounded to three
/// decimals, exceeds `eps`.
pub fn moved(trace: &Trace, eps: f64) -> bool {
    let speeds: Vec<f64> = velocity(&trace.position).into_iter().flatten().collect();
    if speeds.is_empty() {
        return false;
    }
    let rounded = speeds.iter().map(|v| (v * 1000.0).round() / 1000.0);
    let mean = rounded.sum::<f64>() / speeds.len() as f64;
    mean > eps
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Standard deviation of the XY jitter.
    pub noise: f64,
    /// Frames requested from the backend per simulation.
    pub frames: usize,
    /// Perturbed copies per analysis.
    pub perturbations: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            noise: 0.5,
            frames: 30,
            perturbations: 50,
        }
    }
}

impl EntropyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(ConfigError::NonPositive {
                name: "noise",
                value: self.noise,
            });
        }
        for (name, value) in [
            ("frames", self.frames),
            ("perturbations", self.perturbations),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive { name, value: 0.0 });
            }
        }
        Ok(())
    }
}

/// Summary statistics of kinetic energy over perturbations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KineticEnergy {
    pub mean: f64,
    pub std: f64,
}

impl KineticEnergy {
    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt(),
        }
    }
}

/// One analyzed tower: `"template"` for the tower itself, or a
/// configuration label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntropyReport {
    pub id: String,
    pub ke: KineticEnergy,
}

pub struct TowerEntropy<B> {
    pub config: EntropyConfig,
    backend: B,
}

impl<B: PhysicsBackend> TowerEntropy<B> {
    pub fn new(config: EntropyConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Perturbed copies of `tower`.
    pub fn perturb(&self, tower: &Tower, rng: &mut TowerRng) -> Result<Vec<Tower>, PhysicsError> {
        (0..self.config.perturbations)
            .map(|_| {
                let deltas: Vec<DVec2> = (0..tower.len())
                    .map(|_| {
                        let x = rng.normal(0.0, self.config.noise);
                        let y = rng.normal(0.0, self.config.noise);
                        DVec2::new(x, y)
                    })
                    .collect();
                tower.shifted(&deltas).map_err(PhysicsError::from)
            })
            .collect()
    }

    /// Run `tower` through the backend and return the validated trace.
    pub fn simulate(&self, tower: &Tower) -> Result<Trace, PhysicsError> {
        let objects: Vec<BlockId> = tower.block_ids().collect();
        let trace = self
            .backend
            .get_trace(&tower.to_document(), self.config.frames, &objects)?;
        trace.check_shape(self.config.frames, objects.len())?;
        Ok(trace)
    }

    /// Mass-weighted kinetic energy of one simulation of `tower`.
    pub fn kinetic_energy(&self, tower: &Tower) -> Result<f64, PhysicsError> {
        let mut masses = Vec::with_capacity(tower.len());
        for id in tower.block_ids() {
            let node = tower.node(id)?;
            let substance = node
                .substance
                .as_ref()
                .ok_or(PhysicsError::MissingSubstance(id))?;
            masses.push(substance.density * node.placed.block.volume());
        }
        if masses.is_empty() {
            return Ok(0.0);
        }
        let trace = self.simulate(tower)?;
        let ke: f64 = velocity(&trace.position)
            .iter()
            .map(|frame| {
                frame
                    .iter()
                    .zip(&masses)
                    .map(|(v, m)| 0.5 * v * v * m)
                    .sum::<f64>()
            })
            .sum();
        Ok(ke)
    }

    /// Mean and standard deviation of kinetic energy over perturbed copies.
    pub fn analyze(
        &self,
        tower: &Tower,
        rng: &mut TowerRng,
    ) -> Result<KineticEnergy, PhysicsError> {
        let copies = self.perturb(tower, rng)?;
        let samples: Vec<f64> = copies
            .par_iter()
            .map(|copy| self.kinetic_energy(copy))
            .collect::<Result<_, _>>()?;
        let ke = KineticEnergy::from_samples(&samples);
        log::debug!(
            "analyzed {} blocks over {} perturbations: mean {:.4}, std {:.4}",
            tower.len(),
            samples.len(),
            ke.mean,
            ke.std
        );
        Ok(ke)
    }

    /// Analyze `tower` (reported as `"template"`) and each labeled
    /// configuration. Report `i` draws from `rng.fork(i)`.
    pub fn evaluate<'a, I>(
        &self,
        tower: &'a Tower,
        configurations: I,
        rng: &TowerRng,
    ) -> Result<Vec<EntropyReport>, PhysicsError>
    where
        I: IntoIterator<Item = (String, &'a Tower)>,
    {
        let template = ("template".to_string(), tower);
        let jobs = std::iter::once(template).chain(configurations);
        let mut reports = Vec::new();
        for (i, (id, t)) in jobs.enumerate() {
            let mut stream = rng.fork(i as u64);
            let ke = self.analyze(t, &mut stream)?;
            reports.push(EntropyReport { id, ke });
        }
        Ok(reports)
    }
}
