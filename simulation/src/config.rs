//! Simulation configuration.
//!
//! All thresholds the systems consult live here. Every section defaults, so a
//! config file only needs the values it overrides:
//!
//! ```json
//! { "seed": 7, "reproduction": { "cooldown": 4.0 } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::components::{LifeStage, NamingStyle, Spirit};
use crate::error::{Result, SimError};

/// Top-level configuration for one world instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the world's random source.
    pub seed: u64,
    pub time: TimeConfig,
    pub lifecycle: LifecycleConfig,
    pub reproduction: ReproductionConfig,
    pub compatibility: CompatibilityConfig,
    pub traits: TraitRange,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            time: TimeConfig::default(),
            lifecycle: LifecycleConfig::default(),
            reproduction: ReproductionConfig::default(),
            compatibility: CompatibilityConfig::default(),
            traits: TraitRange::default(),
        }
    }
}

impl SimulationConfig {
    /// Read and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: SimulationConfig =
            serde_json::from_str(raw).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.time;
        if !(t.tick_length.is_finite() && t.tick_length > 0.0) {
            return Err(SimError::Config("time.tick_length must be positive".into()));
        }
        if !(t.acceleration.is_finite() && t.acceleration >= 0.0) {
            return Err(SimError::Config("time.acceleration must be non-negative".into()));
        }

        let l = &self.lifecycle;
        let ordered = 0.0 <= l.juvenile_age
            && l.juvenile_age <= l.adult_age
            && l.adult_age <= l.elder_age
            && l.elder_age <= l.max_age;
        if !ordered || !l.max_age.is_finite() {
            return Err(SimError::Config(
                "lifecycle thresholds must satisfy 0 <= juvenile <= adult <= elder <= max".into(),
            ));
        }
        if !(0.0..=1.0).contains(&l.elder_hazard) {
            return Err(SimError::Config("lifecycle.elder_hazard must be in [0, 1]".into()));
        }

        let r = &self.reproduction;
        if !(r.cooldown.is_finite() && r.cooldown >= 0.0) {
            return Err(SimError::Config("reproduction.cooldown must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&r.min_compatibility) || !(0.0..=1.0).contains(&r.blend_weight) {
            return Err(SimError::Config(
                "reproduction.min_compatibility and blend_weight must be in [0, 1]".into(),
            ));
        }
        if !(r.mutation_rate.is_finite() && r.mutation_rate >= 0.0) {
            return Err(SimError::Config("reproduction.mutation_rate must be non-negative".into()));
        }

        if !(self.traits.min.is_finite() && self.traits.max.is_finite())
            || self.traits.min >= self.traits.max
        {
            return Err(SimError::Config("traits.min must be below traits.max".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Logical units the clock advances per tick before acceleration.
    pub tick_length: f64,
    pub acceleration: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            tick_length: 1.0,
            acceleration: 1.0,
        }
    }
}

/// Age thresholds in logical time units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub juvenile_age: f64,
    pub adult_age: f64,
    pub elder_age: f64,
    /// Elders reaching this age die unconditionally.
    pub max_age: f64,
    /// Probability per unit of time that an Elder dies before `max_age`.
    pub elder_hazard: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            juvenile_age: 3.0,
            adult_age: 16.0,
            elder_age: 60.0,
            max_age: 100.0,
            elder_hazard: 0.02,
        }
    }
}

impl LifecycleConfig {
    /// Stage implied by age alone, ignoring the hazard model.
    pub fn stage_for_age(&self, age: f64) -> LifeStage {
        if age >= self.max_age {
            LifeStage::Deceased
        } else if age >= self.elder_age {
            LifeStage::Elder
        } else if age >= self.adult_age {
            LifeStage::Adult
        } else if age >= self.juvenile_age {
            LifeStage::Juvenile
        } else {
            LifeStage::Infant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    pub cooldown: f64,
    pub min_compatibility: f64,
    pub max_offspring: u32,
    pub mutation_rate: f64,
    /// Weight of the first parent in the trait blend. 0.5 is the plain mean.
    pub blend_weight: f64,
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            cooldown: 2.0,
            min_compatibility: 0.6,
            max_offspring: 6,
            mutation_rate: 0.1,
            blend_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    /// Pairs closer than this kinship distance score exactly 0.
    pub min_generation_separation: u32,
    /// How many generations up the pedigree is searched for common ancestors.
    pub kinship_depth: u32,
    pub same_spirit_bonus: f64,
    pub same_style_bonus: f64,
    pub pairing_rules: Vec<PairingRule>,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            min_generation_separation: 2,
            kinship_depth: 4,
            same_spirit_bonus: 0.05,
            same_style_bonus: 0.0,
            pairing_rules: vec![
                PairingRule::Spirit {
                    a: Spirit::Dragon,
                    b: Spirit::Phoenix,
                    modifier: 0.1,
                },
                PairingRule::Spirit {
                    a: Spirit::Fox,
                    b: Spirit::Wolf,
                    modifier: 0.05,
                },
                PairingRule::Spirit {
                    a: Spirit::Lion,
                    b: Spirit::Tiger,
                    modifier: -0.05,
                },
            ],
        }
    }
}

/// Symmetric bonus or penalty applied when a pair matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PairingRule {
    Spirit { a: Spirit, b: Spirit, modifier: f64 },
    Style { a: NamingStyle, b: NamingStyle, modifier: f64 },
}

impl PairingRule {
    pub fn modifier_for(
        &self,
        spirits: (Spirit, Spirit),
        styles: (NamingStyle, NamingStyle),
    ) -> Option<f64> {
        fn matches<T: PartialEq>(a: T, b: T, pair: (T, T)) -> bool {
            (pair.0 == a && pair.1 == b) || (pair.0 == b && pair.1 == a)
        }
        match *self {
            PairingRule::Spirit { a, b, modifier } => matches(a, b, spirits).then_some(modifier),
            PairingRule::Style { a, b, modifier } => matches(a, b, styles).then_some(modifier),
        }
    }
}

/// Valid trait value range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitRange {
    pub min: f64,
    pub max: f64,
}

impl Default for TraitRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl TraitRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}
