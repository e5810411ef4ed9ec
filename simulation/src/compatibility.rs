//! Compatibility Analyzer
//!
//! Scores how suitable two agents are as a breeding pair. The score combines
//! trait similarity, the spirit/style pairing table and a kinship factor.
//! Ineligible agents and close kin score exactly 0.

use serde::{Deserialize, Serialize};

use crate::components::{
    AgentComponent, AgentId, LifeStage, LifecycleComponent, LineageComponent, NamingStyle,
    ReproductionComponent, Spirit, TraitComponent,
};
use crate::config::{CompatibilityConfig, TraitRange};
use crate::error::Result;
use crate::pedigree::Pedigree;
use crate::store::EntityStore;

/// Snapshot of the components compatibility depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct MateProfile {
    pub id: AgentId,
    pub spirit: Spirit,
    pub style: NamingStyle,
    pub stage: LifeStage,
    pub cooldown_until: f64,
    pub offspring_count: u32,
    pub generation: u32,
    pub traits: TraitComponent,
}

impl MateProfile {
    /// `Ok(None)` when the entity lacks one of the required components.
    pub fn from_store(store: &EntityStore, id: AgentId) -> Result<Option<Self>> {
        let (Some(agent), Some(lifecycle), Some(repro), Some(traits)) = (
            store.get::<AgentComponent>(id)?,
            store.get::<LifecycleComponent>(id)?,
            store.get::<ReproductionComponent>(id)?,
            store.get::<TraitComponent>(id)?,
        ) else {
            return Ok(None);
        };
        let generation = store
            .get::<LineageComponent>(id)?
            .map(|l| l.generation)
            .unwrap_or(0);
        Ok(Some(Self {
            id,
            spirit: agent.spirit,
            style: agent.style,
            stage: lifecycle.stage,
            cooldown_until: repro.cooldown_until,
            offspring_count: repro.offspring_count,
            generation,
            traits: (*traits).clone(),
        }))
    }

    /// Mature, out of cooldown, and under the offspring cap.
    pub fn is_eligible(&self, now: f64, max_offspring: u32) -> bool {
        self.stage.is_mature() && now >= self.cooldown_until && self.offspring_count < max_offspring
    }
}

/// Everything outside the two agents that scoring needs.
#[derive(Debug, Clone, Copy)]
pub struct CompatibilityContext<'a> {
    pub now: f64,
    pub max_offspring: u32,
    pub range: TraitRange,
    pub config: &'a CompatibilityConfig,
    pub pedigree: &'a Pedigree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exclusion {
    SameAgent,
    Ineligible(AgentId),
    CloseKin { distance: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityBreakdown {
    pub score: f64,
    pub trait_similarity: f64,
    pub pairing_modifier: f64,
    /// `None` for unrelated agents.
    pub kinship_distance: Option<u32>,
    pub kin_factor: f64,
    pub exclusion: Option<Exclusion>,
}

/// Score in `[0, 1]`.
pub fn compatibility(a: &MateProfile, b: &MateProfile, ctx: &CompatibilityContext<'_>) -> f64 {
    analyze(a, b, ctx).score
}

/// Score together with the terms that produced it.
pub fn analyze(
    a: &MateProfile,
    b: &MateProfile,
    ctx: &CompatibilityContext<'_>,
) -> CompatibilityBreakdown {
    let trait_similarity = trait_similarity(&a.traits, &b.traits, ctx.range);
    let pairing_modifier = pairing_modifier((a.spirit, a.style), (b.spirit, b.style), ctx.config);
    let kinship_distance = ctx
        .pedigree
        .kinship_distance(a.id, b.id, ctx.config.kinship_depth);

    let exclusion = if a.id == b.id {
        Some(Exclusion::SameAgent)
    } else if !a.is_eligible(ctx.now, ctx.max_offspring) {
        Some(Exclusion::Ineligible(a.id))
    } else if !b.is_eligible(ctx.now, ctx.max_offspring) {
        Some(Exclusion::Ineligible(b.id))
    } else {
        kinship_distance
            .filter(|d| *d < ctx.config.min_generation_separation)
            .map(|distance| Exclusion::CloseKin { distance })
    };

    let kin_factor = kin_factor(kinship_distance, ctx.config.min_generation_separation);
    let score = match exclusion {
        Some(_) => 0.0,
        None => ((trait_similarity + pairing_modifier).clamp(0.0, 1.0) * kin_factor).clamp(0.0, 1.0),
    };

    CompatibilityBreakdown {
        score,
        trait_similarity,
        pairing_modifier,
        kinship_distance,
        kin_factor,
        exclusion,
    }
}

/// `1 - mean |a - b| / width` over shared keys. No shared keys is neutral (0.5).
pub fn trait_similarity(a: &TraitComponent, b: &TraitComponent, range: TraitRange) -> f64 {
    let width = range.width();
    let (total, count) = a
        .values
        .iter()
        .filter_map(|(key, va)| b.get(key).map(|vb| (va - vb).abs()))
        .fold((0.0, 0usize), |(sum, n), diff| (sum + diff, n + 1));
    if count == 0 || width <= 0.0 {
        return 0.5;
    }
    (1.0 - (total / count as f64) / width).clamp(0.0, 1.0)
}

pub fn pairing_modifier(
    a: (Spirit, NamingStyle),
    b: (Spirit, NamingStyle),
    config: &CompatibilityConfig,
) -> f64 {
    let mut modifier = 0.0;
    if a.0 == b.0 {
        modifier += config.same_spirit_bonus;
    }
    if a.1 == b.1 {
        modifier += config.same_style_bonus;
    }
    modifier
        + config
            .pairing_rules
            .iter()
            .filter_map(|rule| rule.modifier_for((a.0, b.0), (a.1, b.1)))
            .sum::<f64>()
}

/// Multiplier shrinking toward 0 as kin get closer to the exclusion threshold.
fn kin_factor(distance: Option<u32>, min_separation: u32) -> f64 {
    match distance {
        None => 1.0,
        Some(d) if d < min_separation => 0.0,
        Some(d) => 1.0 - 0.5f64.powi((d - min_separation + 1) as i32),
    }
}
