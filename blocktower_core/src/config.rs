// Data-driven configuration for tower generation and analysis.
//
// Every tunable lives in `TowerConfig`, loaded from JSON (or defaulted).
// Nothing in the library reads magic numbers that a caller might want to
// change: grid spacing and margins (`SearchConfig`), budgets
// (`BuilderConfig`), perturbation settings (`EntropyConfig`), block shapes
// and material mixes (`GeneratorConfig`), and the substance table all come
// from here.
//
// Every section is `#[serde(default)]`, so a config file only has to name
// the fields it changes.
//
// See also: `placement.rs`, `builder.rs`, `entropy.rs`, `generator.rs`,
// `substance.rs` for the sections themselves.

use crate::builder::{Builder, BuilderConfig};
use crate::entropy::EntropyConfig;
use crate::error::ConfigError;
use crate::generator::{Generator, GeneratorConfig};
use crate::placement::SearchConfig;
use crate::substance::SubstanceTable;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    pub search: SearchConfig,
    pub builder: BuilderConfig,
    pub entropy: EntropyConfig,
    pub generator: GeneratorConfig,
    pub substances: SubstanceTable,
}

impl TowerConfig {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(json_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(json_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        self.builder.validate()?;
        self.entropy.validate()?;
        self.generator.validate()?;
        self.substances.validate()
    }

    pub fn builder(&self) -> Result<Builder, ConfigError> {
        Builder::new(self.search.clone(), self.builder.clone())
    }

    pub fn generator(&self) -> Result<Generator, ConfigError> {
        Generator::new(
            self.generator.clone(),
            self.builder()?,
            self.substances.clone(),
        )
    }
}

fn json_error(e: serde_json::Error) -> ConfigError {
    ConfigError::Json(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = TowerConfig::default();
        let json = config.to_json().unwrap();
        let restored = TowerConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "search": {"grid_step": 0.25},
            "builder": {"max_blocks": 3},
            "generator": {"materials": {"Wood": 0.5, "Metal": 0.5}, "rotations": "cardinal"}
        }"#;
        let config = TowerConfig::from_json(json).unwrap();
        assert_eq!(config.search.grid_step, 0.25);
        assert_eq!(config.search.safety_margin, 0.05);
        assert_eq!(config.builder.max_blocks, 3);
        assert_eq!(config.builder.max_height, 100.0);
        assert_eq!(config.entropy.perturbations, 50);
        assert_eq!(config.generator.materials.names().count(), 2);
        assert!(config.substances.get("Metal").is_some());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_mix = TowerConfig::from_json(r#"{"generator": {"materials": {"Wood": 0.7}}}"#);
        assert!(matches!(bad_mix, Err(ConfigError::MixSum(_))));
        let bad_height = TowerConfig::from_json(r#"{"builder": {"max_height": -2.0}}"#);
        assert_eq!(bad_height, Err(ConfigError::MaxHeight(-2.0)));
        let empty = TowerConfig::from_json(r#"{"substances": {"unknown_density": [5.0, 5.0]}}"#);
        assert!(matches!(
            empty,
            Err(ConfigError::SampleRange {
                name: "unknown_density",
                ..
            })
        ));
        let not_object = TowerConfig::from_json("[1, 2]");
        assert!(matches!(not_object, Err(ConfigError::Json(_))));
    }

    #[test]
    fn builds_configured_components() {
        let config = TowerConfig::default();
        let generator = config.generator().unwrap();
        assert_eq!(generator.base().len(), 0);
        assert_eq!(config.builder().unwrap().config.max_blocks, 10);
    }
}
