//! ECS Components for agent entities
//!
//! Every agent carries one of each component below. Components are plain
//! data; all behavior lives in the systems.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

/// Opaque, stable entity identifier. Survives save/load unlike `hecs::Entity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Animal spirit (archetype) of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spirit {
    Fox,
    Wolf,
    Otter,
    Eagle,
    Lion,
    Tiger,
    Dragon,
    Phoenix,
    Raven,
    Bear,
}

impl Spirit {
    pub const ALL: [Spirit; 10] = [
        Spirit::Fox,
        Spirit::Wolf,
        Spirit::Otter,
        Spirit::Eagle,
        Spirit::Lion,
        Spirit::Tiger,
        Spirit::Dragon,
        Spirit::Phoenix,
        Spirit::Raven,
        Spirit::Bear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Spirit::Fox => "fox",
            Spirit::Wolf => "wolf",
            Spirit::Otter => "otter",
            Spirit::Eagle => "eagle",
            Spirit::Lion => "lion",
            Spirit::Tiger => "tiger",
            Spirit::Dragon => "dragon",
            Spirit::Phoenix => "phoenix",
            Spirit::Raven => "raven",
            Spirit::Bear => "bear",
        }
    }
}

impl fmt::Display for Spirit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Naming style tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStyle {
    Foundation,
    Exo,
    Hybrid,
    Cyberpunk,
    Mythological,
    Scientific,
}

impl NamingStyle {
    pub const ALL: [NamingStyle; 6] = [
        NamingStyle::Foundation,
        NamingStyle::Exo,
        NamingStyle::Hybrid,
        NamingStyle::Cyberpunk,
        NamingStyle::Mythological,
        NamingStyle::Scientific,
    ];
}

impl fmt::Display for NamingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NamingStyle::Foundation => "foundation",
            NamingStyle::Exo => "exo",
            NamingStyle::Hybrid => "hybrid",
            NamingStyle::Cyberpunk => "cyberpunk",
            NamingStyle::Mythological => "mythological",
            NamingStyle::Scientific => "scientific",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Agent Components
// ============================================================================

/// Identity attributes. Only `WorldSimulation::rename` changes the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentComponent {
    pub name: String,
    pub spirit: Spirit,
    pub style: NamingStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifeStage {
    Infant,
    Juvenile,
    Adult,
    Elder,
    Deceased,
}

impl LifeStage {
    pub const ALL: [LifeStage; 5] = [
        LifeStage::Infant,
        LifeStage::Juvenile,
        LifeStage::Adult,
        LifeStage::Elder,
        LifeStage::Deceased,
    ];

    /// Adult and Elder agents may reproduce.
    pub fn is_mature(self) -> bool {
        matches!(self, LifeStage::Adult | LifeStage::Elder)
    }
}

/// Age and stage. Written only by the lifecycle system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleComponent {
    pub age: f64,
    pub stage: LifeStage,
    pub mature: bool,
    /// Clock time at which the agent became Deceased.
    #[serde(default)]
    pub died_at: Option<f64>,
}

impl LifecycleComponent {
    /// Fresh newborn: Infant at age 0.
    pub fn newborn() -> Self {
        Self::with_stage(0.0, LifeStage::Infant)
    }

    pub fn with_stage(age: f64, stage: LifeStage) -> Self {
        Self {
            age,
            stage,
            mature: stage.is_mature(),
            died_at: None,
        }
    }

    pub fn is_deceased(&self) -> bool {
        self.stage == LifeStage::Deceased
    }
}

impl Default for LifecycleComponent {
    fn default() -> Self {
        Self::newborn()
    }
}

/// Named trait values in the configured range. Read-only after creation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TraitComponent {
    pub values: BTreeMap<String, f64>,
}

impl TraitComponent {
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Highest-valued traits, ties broken by key order.
    pub fn dominant(&self, n: usize) -> Vec<(String, f64)> {
        let mut sorted: Vec<(String, f64)> =
            self.values.iter().map(|(k, v)| (k.clone(), *v)).collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted.truncate(n);
        sorted
    }
}

impl FromIterator<(String, f64)> for TraitComponent {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Parents, generation and descendants of an agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineageComponent {
    /// Empty for root agents, two entries for bred offspring.
    pub parents: Vec<AgentId>,
    pub generation: u32,
    pub descendants: Vec<AgentId>,
}

impl LineageComponent {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn offspring(a: (AgentId, u32), b: (AgentId, u32)) -> Self {
        Self {
            parents: vec![a.0, b.0],
            generation: a.1.max(b.1) + 1,
            descendants: Vec::new(),
        }
    }
}

/// Reproduction bookkeeping. Written only by the reproduction system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReproductionComponent {
    pub cooldown_until: f64,
    pub offspring_count: u32,
    pub eligible: bool,
}

impl ReproductionComponent {
    pub fn in_cooldown(&self, now: f64) -> bool {
        now < self.cooldown_until
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Logical simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Clock {
    pub time: f64,
    pub ticks: u64,
}

impl Clock {
    pub fn advance(&mut self, dt: f64) {
        self.time += dt;
        self.ticks += 1;
    }
}
