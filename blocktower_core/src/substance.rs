// Physical substances for blocks.
//
// A `Substance` is what the physics collaborator needs per block: a name, a
// density (mass = density x volume), and a friction coefficient. The
// `SubstanceTable` maps known names to fixed parameters; any other name gets
// density and friction sampled independently from the table's uniform
// ranges. The table is plain configuration, passed in by whoever builds
// towers (see `config.rs`), never a global.
//
// `MaterialMix` is a named probability distribution over substance names,
// used by the generator to decide which substance each block receives.
//
// See also: `entropy.rs`, which reads densities to weight kinetic energy,
// and `document.rs`, which serializes substances into tower documents.

use crate::error::ConfigError;
use blocktower_prng::TowerRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolved physical parameters of one block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Substance {
    pub name: String,
    pub density: f64,
    pub friction: f64,
}

/// Fixed parameters for a known substance name.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubstanceParams {
    pub density: f64,
    pub friction: f64,
}

/// Known substances plus the sampling policy for unknown ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstanceTable {
    pub known: BTreeMap<String, SubstanceParams>,
    /// `[low, high)` for densities of unknown substances.
    pub unknown_density: (f64, f64),
    /// `[low, high)` for frictions of unknown substances.
    pub unknown_friction: (f64, f64),
}

impl Default for SubstanceTable {
    fn default() -> Self {
        let mut known = BTreeMap::new();
        for (name, density, friction) in [
            ("Wood", 3.0, 0.5),
            ("Metal", 7.0, 0.2),
            ("H", 9.0, 0.5),
            ("L", 1.0, 0.5),
        ] {
            known.insert(name.to_string(), SubstanceParams { density, friction });
        }
        Self {
            known,
            unknown_density: (1.0, 10.0),
            unknown_friction: (0.1, 0.9),
        }
    }
}

impl SubstanceTable {
    /// Both sampling ranges must be finite and non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, (low, high)) in [
            ("unknown_density", self.unknown_density),
            ("unknown_friction", self.unknown_friction),
        ] {
            if !(low.is_finite() && high.is_finite() && low < high) {
                return Err(ConfigError::SampleRange { name, low, high });
            }
        }
        Ok(())
    }

    /// Parameters for a known name, without sampling.
    pub fn get(&self, name: &str) -> Option<Substance> {
        self.known.get(name).map(|p| Substance {
            name: name.to_string(),
            density: p.density,
            friction: p.friction,
        })
    }

    /// Deterministic parameters for known names; an independent uniform draw
    /// of density and friction for anything else.
    pub fn resolve(&self, name: &str, rng: &mut TowerRng) -> Substance {
        if let Some(s) = self.get(name) {
            return s;
        }
        log::debug!("substance {name:?} is unknown; sampling its parameters");
        Substance {
            name: name.to_string(),
            density: rng.range_f64(self.unknown_density.0, self.unknown_density.1),
            friction: rng.range_f64(self.unknown_friction.0, self.unknown_friction.1),
        }
    }
}

/// Probability distribution over substance names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialMix {
    weights: BTreeMap<String, f64>,
}

impl MaterialMix {
    /// Build and validate a mix. Weights must be non-negative, finite, and
    /// sum to one.
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        let mix = Self { weights };
        mix.validate()?;
        Ok(mix)
    }

    /// A mix that always yields `name`.
    pub fn single(name: &str) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(name.to_string(), 1.0);
        Self { weights }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weights.is_empty() {
            return Err(ConfigError::EmptyMix);
        }
        for (name, &weight) in &self.weights {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(ConfigError::MixWeight {
                    name: name.clone(),
                    weight,
                });
            }
        }
        let total: f64 = self.weights.values().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::MixSum(total));
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    /// Draw a name according to the weights.
    pub fn sample(&self, rng: &mut TowerRng) -> &str {
        let r = rng.next_f64();
        let mut acc = 0.0;
        let mut last = "";
        for (name, &weight) in &self.weights {
            if weight <= 0.0 {
                continue;
            }
            acc += weight;
            last = name.as_str();
            if r < acc {
                return last;
            }
        }
        // Rounding can leave `acc` a hair under one.
        last
    }
}

impl Default for MaterialMix {
    fn default() -> Self {
        Self::single("Wood")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_ranges_are_validated() {
        assert_eq!(SubstanceTable::default().validate(), Ok(()));
        let empty = SubstanceTable {
            unknown_density: (5.0, 5.0),
            ..SubstanceTable::default()
        };
        assert_eq!(
            empty.validate(),
            Err(ConfigError::SampleRange {
                name: "unknown_density",
                low: 5.0,
                high: 5.0,
            })
        );
        let reversed = SubstanceTable {
            unknown_friction: (0.9, 0.1),
            ..SubstanceTable::default()
        };
        assert!(matches!(
            reversed.validate(),
            Err(ConfigError::SampleRange {
                name: "unknown_friction",
                ..
            })
        ));
        let infinite = SubstanceTable {
            unknown_density: (1.0, f64::INFINITY),
            ..SubstanceTable::default()
        };
        assert!(infinite.validate().is_err());
    }

    #[test]
    fn known_substances_are_deterministic() {
        let table = SubstanceTable::default();
        let mut a = TowerRng::new(1);
        let mut b = TowerRng::new(2);
        assert_eq!(table.resolve("Wood", &mut a), table.resolve("Wood", &mut b));
        let metal = table.resolve("Metal", &mut a);
        assert_eq!(metal.density, 7.0);
        assert_eq!(metal.friction, 0.2);
    }

    #[test]
    fn unknown_substances_sample_within_ranges() {
        let table = SubstanceTable::default();
        let mut rng = TowerRng::new(99);
        for _ in 0..500 {
            let s = table.resolve("Mystery", &mut rng);
            assert!((1.0..10.0).contains(&s.density));
            assert!((0.1..0.9).contains(&s.friction));
            assert_eq!(s.name, "Mystery");
        }
    }

    #[test]
    fn unknown_sampling_is_reproducible() {
        let table = SubstanceTable::default();
        let a = table.resolve("X", &mut TowerRng::new(5));
        let b = table.resolve("X", &mut TowerRng::new(5));
        assert_eq!(a, b);
    }

    #[test]
    fn mix_must_sum_to_one() {
        let mut w = BTreeMap::new();
        w.insert("Wood".to_string(), 0.5);
        w.insert("Metal".to_string(), 0.4);
        assert!(matches!(MaterialMix::new(w), Err(ConfigError::MixSum(_))));
    }

    #[test]
    fn mix_rejects_negative_and_empty() {
        let empty = MaterialMix::new(BTreeMap::new());
        assert_eq!(empty, Err(ConfigError::EmptyMix));
        let mut w = BTreeMap::new();
        w.insert("Wood".to_string(), 1.5);
        w.insert("Metal".to_string(), -0.5);
        let negative = MaterialMix::new(w);
        assert!(matches!(negative, Err(ConfigError::MixWeight { .. })));
    }

    #[test]
    fn mix_sampling_follows_weights() {
        let mut w = BTreeMap::new();
        w.insert("Wood".to_string(), 0.75);
        w.insert("Metal".to_string(), 0.25);
        let mix = MaterialMix::new(w).unwrap();
        let mut rng = TowerRng::new(3);
        let n = 10_000;
        let wood = (0..n).filter(|_| mix.sample(&mut rng) == "Wood").count();
        let frac = wood as f64 / n as f64;
        assert!((0.72..0.78).contains(&frac), "wood fraction {frac}");
    }

    #[test]
    fn zero_weight_names_are_never_drawn() {
        let mut w = BTreeMap::new();
        w.insert("Metal".to_string(), 0.0);
        w.insert("Wood".to_string(), 1.0);
        let mix = MaterialMix::new(w).unwrap();
        let mut rng = TowerRng::new(8);
        assert!((0..1000).all(|_| mix.sample(&mut rng) == "Wood"));
    }
}
