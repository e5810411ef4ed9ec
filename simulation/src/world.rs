//! World Simulation - main orchestrator
//!
//! A [`WorldSimulation`] owns its entity store, clock and random source. Two
//! instances never share memory; they only meet through a snapshot store.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::compatibility::{analyze, CompatibilityBreakdown, CompatibilityContext, MateProfile};
use crate::components::*;
use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::generation::{generate_traits, random_spirit, random_style, AgentParams};
use crate::names::{NameGenerator, SpiritNamer};
use crate::pedigree::Pedigree;
use crate::store::EntityStore;
use crate::systems::reproduction::refresh_eligibility;
use crate::systems::{self, ReproductionParams, TimeSystem};

/// Totals for one `step` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub ticks: u64,
    pub births: u32,
    pub stage_transitions: u32,
    pub deaths: u32,
    /// Clock time after the last tick.
    pub clock: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    /// Every agent ever created, deceased included.
    pub total: usize,
    pub living: usize,
    pub by_stage: BTreeMap<LifeStage, usize>,
    pub by_generation: BTreeMap<u32, usize>,
    pub by_spirit: BTreeMap<Spirit, usize>,
}

/// An agent seen from another agent's family tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relative {
    pub id: AgentId,
    pub name: String,
    pub generation: u32,
    /// Generations between the two agents.
    pub distance: u32,
    pub stage: Option<LifeStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageReport {
    pub id: AgentId,
    pub generation: u32,
    pub parents: Vec<AgentId>,
    pub ancestors: Vec<Relative>,
    pub descendants: Vec<Relative>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Recommended,
    Neutral,
    NotRecommended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub a: AgentId,
    pub b: AgentId,
    #[serde(flatten)]
    pub breakdown: CompatibilityBreakdown,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MateCandidate {
    pub id: AgentId,
    pub name: String,
    pub compatibility: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreedingStats {
    pub total_agents: usize,
    pub living_agents: usize,
    pub mature_agents: usize,
    pub eligible_agents: usize,
    pub total_offspring: u64,
    pub average_offspring_per_agent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: AgentId,
    pub name: String,
    pub spirit: Spirit,
    pub style: NamingStyle,
    pub dominant_traits: Vec<String>,
    pub summary: String,
}

/// Read-only status for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub clock: f64,
    pub ticks: u64,
    pub acceleration: f64,
    pub population: usize,
    pub living: usize,
}

/// Every component of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub agent: Option<AgentComponent>,
    pub lifecycle: Option<LifecycleComponent>,
    pub traits: Option<TraitComponent>,
    pub lineage: Option<LineageComponent>,
    pub reproduction: Option<ReproductionComponent>,
}

pub struct WorldSimulation {
    pub(crate) store: EntityStore,
    pub(crate) clock: Clock,
    pub(crate) time: TimeSystem,
    pub(crate) rng: ChaCha8Rng,
    config: SimulationConfig,
    namer: Box<dyn NameGenerator>,
}

impl WorldSimulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_namer(config, Box::new(SpiritNamer::new()))
    }

    pub fn with_namer(config: SimulationConfig, namer: Box<dyn NameGenerator>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: EntityStore::new(),
            clock: Clock::default(),
            time: TimeSystem::new(&config.time),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            namer,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn acceleration(&self) -> f64 {
        self.time.acceleration()
    }

    pub fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        self.time.set_acceleration(acceleration)
    }

    fn names(&self) -> HashSet<String> {
        self.store
            .raw()
            .query::<&AgentComponent>()
            .iter()
            .map(|(_, agent)| agent.name.clone())
            .collect()
    }

    /// Create a root agent (no parents, generation 0).
    pub fn create_agent(&mut self, params: AgentParams) -> Result<AgentId> {
        if let Some(name) = &params.name {
            if self.names().contains(name) {
                return Err(SimError::NameTaken(name.clone()));
            }
        }
        let id = match params.id {
            Some(id) => self.store.create_with_id(id)?,
            None => self.store.create(),
        };

        let spirit = params.spirit.unwrap_or_else(|| random_spirit(&mut self.rng));
        let style = params.style.unwrap_or_else(|| random_style(&mut self.rng));
        let range = self.config.traits;
        let traits: TraitComponent = match params.traits {
            Some(traits) => traits
                .values
                .into_iter()
                .map(|(k, v)| (k, range.clamp(v)))
                .collect(),
            None => generate_traits(spirit, range, &mut self.rng),
        };
        let name = match params.name {
            Some(name) => name,
            None => {
                let existing = self.names();
                self.namer.generate_name(spirit, style, &existing, &mut self.rng)
            }
        };

        let age = params.age.max(0.0);
        let stage = self.config.lifecycle.stage_for_age(age);
        let mut lifecycle = LifecycleComponent::with_stage(age, stage);
        if stage == LifeStage::Deceased {
            lifecycle.died_at = Some(self.clock.time);
        }

        tracing::info!(agent = %id, %name, %spirit, %style, age, "created agent");
        self.store.insert(id, AgentComponent { name, spirit, style })?;
        self.store.insert(id, lifecycle)?;
        self.store.insert(id, traits)?;
        self.store.insert(id, LineageComponent::root())?;
        self.store.insert(
            id,
            ReproductionComponent {
                cooldown_until: self.clock.time,
                offspring_count: 0,
                eligible: false,
            },
        )?;
        refresh_eligibility(&mut self.store, &self.config.reproduction, self.clock.time);
        Ok(id)
    }

    pub fn rename(&mut self, id: AgentId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let mut agent = self
            .store
            .cloned::<AgentComponent>(id)?
            .ok_or(SimError::NotFound(id))?;
        if agent.name == name {
            return Ok(());
        }
        if self.names().contains(&name) {
            return Err(SimError::NameTaken(name));
        }
        agent.name = name;
        self.store.insert(id, agent)
    }

    /// Run one full tick: clock, lifecycle, reproduction.
    fn tick(&mut self) -> Result<StepSummary> {
        let dt = self.time.advance(&mut self.clock);
        let now = self.clock.time;

        let lifecycle = systems::lifecycle_system(
            &mut self.store,
            &self.config.lifecycle,
            dt,
            now,
            &mut self.rng,
        )?;

        let params = ReproductionParams {
            reproduction: &self.config.reproduction,
            compatibility: &self.config.compatibility,
            range: self.config.traits,
            now,
        };
        let births = systems::reproduction_system(
            &mut self.store,
            &params,
            &mut *self.namer,
            &mut self.rng,
        )?;

        Ok(StepSummary {
            ticks: 1,
            births: births.len() as u32,
            stage_transitions: lifecycle.transitions,
            deaths: lifecycle.deaths,
            clock: now,
        })
    }

    /// Advance `n` ticks and total what happened.
    pub fn step(&mut self, n: u64) -> Result<StepSummary> {
        let mut summary = StepSummary {
            clock: self.clock.time,
            ..StepSummary::default()
        };
        for _ in 0..n {
            let tick = self.tick()?;
            summary.ticks += 1;
            summary.births += tick.births;
            summary.stage_transitions += tick.stage_transitions;
            summary.deaths += tick.deaths;
            summary.clock = tick.clock;
        }
        tracing::debug!(
            ticks = summary.ticks,
            births = summary.births,
            deaths = summary.deaths,
            clock = summary.clock,
            "step complete"
        );
        Ok(summary)
    }

    pub fn population_stats(&self) -> PopulationStats {
        let mut stats = PopulationStats {
            by_stage: LifeStage::ALL.iter().map(|s| (*s, 0)).collect(),
            ..PopulationStats::default()
        };
        for (_, (lifecycle, lineage, agent)) in self
            .store
            .raw()
            .query::<(
                &LifecycleComponent,
                Option<&LineageComponent>,
                Option<&AgentComponent>,
            )>()
            .iter()
        {
            stats.total += 1;
            if !lifecycle.is_deceased() {
                stats.living += 1;
            }
            *stats.by_stage.entry(lifecycle.stage).or_default() += 1;
            let generation = lineage.map(|l| l.generation).unwrap_or(0);
            *stats.by_generation.entry(generation).or_default() += 1;
            if let Some(agent) = agent {
                *stats.by_spirit.entry(agent.spirit).or_default() += 1;
            }
        }
        stats
    }

    fn relative(&self, id: AgentId, distance: u32) -> Result<Relative> {
        Ok(Relative {
            id,
            name: self
                .store
                .get::<AgentComponent>(id)?
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            generation: self
                .store
                .get::<LineageComponent>(id)?
                .map(|l| l.generation)
                .unwrap_or(0),
            distance,
            stage: self.store.get::<LifecycleComponent>(id)?.map(|l| l.stage),
        })
    }

    /// Full ancestry and descent of an agent, nearest first.
    pub fn lineage(&self, id: AgentId) -> Result<LineageReport> {
        let lineage = self
            .store
            .cloned::<LineageComponent>(id)?
            .ok_or(SimError::NotFound(id))?;

        let pedigree = Pedigree::from_store(&self.store);
        let mut ancestors: Vec<(AgentId, u32)> = pedigree
            .ancestors(id, u32::MAX)
            .into_iter()
            .filter(|(ancestor, _)| *ancestor != id)
            .collect();
        ancestors.sort_by_key(|(ancestor, distance)| (*distance, *ancestor));

        let mut descendants = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<(AgentId, u32)> =
            lineage.descendants.iter().map(|d| (*d, 1)).collect();
        while let Some((current, distance)) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            descendants.push((current, distance));
            if let Some(l) = self.store.get::<LineageComponent>(current)? {
                queue.extend(l.descendants.iter().map(|d| (*d, distance + 1)));
            }
        }
        descendants.sort_by_key(|(d, distance)| (*distance, *d));

        Ok(LineageReport {
            id,
            generation: lineage.generation,
            parents: lineage.parents.clone(),
            ancestors: ancestors
                .into_iter()
                .map(|(a, d)| self.relative(a, d))
                .collect::<Result<_>>()?,
            descendants: descendants
                .into_iter()
                .map(|(a, d)| self.relative(a, d))
                .collect::<Result<_>>()?,
        })
    }

    fn profile(&self, id: AgentId) -> Result<MateProfile> {
        MateProfile::from_store(&self.store, id)?.ok_or(SimError::NotFound(id))
    }

    /// Score breakdown for a pair, with a coarse recommendation.
    pub fn analyze_compatibility(&self, a: AgentId, b: AgentId) -> Result<CompatibilityReport> {
        let (pa, pb) = (self.profile(a)?, self.profile(b)?);
        let pedigree = Pedigree::from_store(&self.store);
        let breakdown = analyze(&pa, &pb, &self.compatibility_context(&pedigree));
        let recommendation = if breakdown.score > 0.6 {
            Recommendation::Recommended
        } else if breakdown.score < 0.4 {
            Recommendation::NotRecommended
        } else {
            Recommendation::Neutral
        };
        Ok(CompatibilityReport {
            a,
            b,
            breakdown,
            recommendation,
        })
    }

    fn compatibility_context<'a>(&'a self, pedigree: &'a Pedigree) -> CompatibilityContext<'a> {
        CompatibilityContext {
            now: self.clock.time,
            max_offspring: self.config.reproduction.max_offspring,
            range: self.config.traits,
            config: &self.config.compatibility,
            pedigree,
        }
    }

    /// Eligible mates clearing the breeding threshold, best first.
    pub fn find_compatible_mates(&self, id: AgentId, max_results: usize) -> Result<Vec<MateCandidate>> {
        let seeker = self.profile(id)?;
        let pedigree = Pedigree::from_store(&self.store);
        let ctx = self.compatibility_context(&pedigree);
        if !seeker.is_eligible(ctx.now, ctx.max_offspring) {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for other in self.store.ids().filter(|other| *other != id) {
            let Some(profile) = MateProfile::from_store(&self.store, other)? else {
                continue;
            };
            let score = analyze(&seeker, &profile, &ctx).score;
            if score > 0.0 && score >= self.config.reproduction.min_compatibility {
                let name = self
                    .store
                    .get::<AgentComponent>(other)?
                    .map(|a| a.name.clone())
                    .unwrap_or_default();
                candidates.push(MateCandidate {
                    id: other,
                    name,
                    compatibility: score,
                });
            }
        }
        candidates.sort_by(|a, b| {
            b.compatibility
                .total_cmp(&a.compatibility)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(max_results);
        Ok(candidates)
    }

    pub fn breeding_stats(&self) -> BreedingStats {
        let now = self.clock.time;
        let max = self.config.reproduction.max_offspring;
        let mut stats = BreedingStats::default();
        for (_, (lifecycle, repro)) in self
            .store
            .raw()
            .query::<(&LifecycleComponent, &ReproductionComponent)>()
            .iter()
        {
            stats.total_agents += 1;
            if !lifecycle.is_deceased() {
                stats.living_agents += 1;
            }
            if lifecycle.stage.is_mature() {
                stats.mature_agents += 1;
                if !repro.in_cooldown(now) && repro.offspring_count < max {
                    stats.eligible_agents += 1;
                }
            }
            stats.total_offspring += u64::from(repro.offspring_count);
        }
        if stats.total_agents > 0 {
            stats.average_offspring_per_agent =
                stats.total_offspring as f64 / stats.total_agents as f64;
        }
        stats
    }

    pub fn persona(&self, id: AgentId) -> Result<Persona> {
        let agent = self
            .store
            .cloned::<AgentComponent>(id)?
            .ok_or(SimError::NotFound(id))?;
        let dominant_traits: Vec<String> = self
            .store
            .get::<TraitComponent>(id)?
            .map(|t| t.dominant(3).into_iter().map(|(k, _)| k).collect())
            .unwrap_or_default();
        let summary = format!("A {} with {} style", agent.spirit, agent.style);
        Ok(Persona {
            id,
            name: agent.name,
            spirit: agent.spirit,
            style: agent.style,
            dominant_traits,
            summary,
        })
    }

    pub fn status(&self) -> SimulationStatus {
        let stats = self.population_stats();
        SimulationStatus {
            clock: self.clock.time,
            ticks: self.clock.ticks,
            acceleration: self.time.acceleration(),
            population: stats.total,
            living: stats.living,
        }
    }

    pub fn agent(&self, id: AgentId) -> Result<AgentRecord> {
        Ok(AgentRecord {
            id,
            agent: self.store.cloned(id)?,
            lifecycle: self.store.cloned(id)?,
            traits: self.store.cloned(id)?,
            lineage: self.store.cloned(id)?,
            reproduction: self.store.cloned(id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldSimulation {
        WorldSimulation::new(SimulationConfig::default()).unwrap()
    }

    #[test]
    fn test_create_agent_defaults() {
        let mut w = world();
        let id = w.create_agent(AgentParams::new().aged(20.0)).unwrap();
        let record = w.agent(id).unwrap();
        assert_eq!(record.lifecycle.unwrap().stage, LifeStage::Adult);
        assert_eq!(record.lineage.unwrap().generation, 0);
        assert!(!record.agent.unwrap().name.is_empty());
        assert!(!record.traits.unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_id_and_name() {
        let mut w = world();
        w.create_agent(AgentParams::new().with_id(AgentId(7)).named("Reynard-Prime-1"))
            .unwrap();
        assert!(matches!(
            w.create_agent(AgentParams::new().with_id(AgentId(7))),
            Err(SimError::DuplicateEntity(AgentId(7)))
        ));
        assert!(matches!(
            w.create_agent(AgentParams::new().named("Reynard-Prime-1")),
            Err(SimError::NameTaken(_))
        ));
    }

    #[test]
    fn test_rename() {
        let mut w = world();
        let a = w.create_agent(AgentParams::new().named("A")).unwrap();
        let b = w.create_agent(AgentParams::new().named("B")).unwrap();
        w.rename(a, "C").unwrap();
        assert_eq!(w.persona(a).unwrap().name, "C");
        assert!(matches!(w.rename(b, "C"), Err(SimError::NameTaken(_))));
        assert!(matches!(w.rename(AgentId(42), "D"), Err(SimError::NotFound(_))));
    }

    #[test]
    fn test_acceleration_scales_aging() {
        let mut w = world();
        let id = w.create_agent(AgentParams::new()).unwrap();
        w.set_acceleration(4.0).unwrap();
        w.step(1).unwrap();
        assert_eq!(w.agent(id).unwrap().lifecycle.unwrap().age, 4.0);
        assert_eq!(w.clock().time, 4.0);
        assert_eq!(w.status().acceleration, 4.0);
    }

    #[test]
    fn test_population_stats_counts_stages() {
        let mut w = world();
        w.create_agent(AgentParams::new()).unwrap();
        w.create_agent(AgentParams::new().aged(20.0)).unwrap();
        w.create_agent(AgentParams::new().aged(150.0)).unwrap();
        let stats = w.population_stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.living, 2);
        assert_eq!(stats.by_stage[&LifeStage::Infant], 1);
        assert_eq!(stats.by_stage[&LifeStage::Adult], 1);
        assert_eq!(stats.by_stage[&LifeStage::Deceased], 1);
        assert_eq!(stats.by_generation[&0], 3);
        assert_eq!(stats.by_spirit.values().sum::<usize>(), 3);
    }

    #[test]
    fn test_population_stats_counts_spirits() {
        let mut w = world();
        for spirit in [Spirit::Fox, Spirit::Fox, Spirit::Raven] {
            w.create_agent(AgentParams::new().spirit(spirit)).unwrap();
        }
        let stats = w.population_stats();
        assert_eq!(stats.by_spirit[&Spirit::Fox], 2);
        assert_eq!(stats.by_spirit[&Spirit::Raven], 1);
        assert!(!stats.by_spirit.contains_key(&Spirit::Bear));
    }

    #[test]
    fn test_created_adult_is_flagged_eligible() {
        let mut w = world();
        let adult = w.create_agent(AgentParams::new().aged(20.0)).unwrap();
        let child = w.create_agent(AgentParams::new().aged(5.0)).unwrap();
        assert!(w.agent(adult).unwrap().reproduction.unwrap().eligible);
        assert!(!w.agent(child).unwrap().reproduction.unwrap().eligible);
        assert_eq!(w.store().select::<ReproductionComponent>(|r| r.eligible), vec![adult]);
    }

    #[test]
    fn test_max_explicit_id_does_not_overflow() {
        let mut w = world();
        let last = w
            .create_agent(AgentParams::new().with_id(AgentId(u64::MAX)))
            .unwrap();
        let next = w.create_agent(AgentParams::new()).unwrap();
        assert_eq!(last, AgentId(u64::MAX));
        assert_eq!(next, AgentId(1));
    }

    #[test]
    fn test_persona_lists_dominant_traits() {
        let mut w = world();
        let traits: TraitComponent = [
            ("personality.cunning".to_string(), 0.9),
            ("personality.loyalty".to_string(), 0.1),
            ("physical.agility".to_string(), 0.8),
            ("ability.healer".to_string(), 0.7),
        ]
        .into_iter()
        .collect();
        let id = w
            .create_agent(AgentParams::new().spirit(Spirit::Fox).style(NamingStyle::Exo).traits(traits))
            .unwrap();
        let persona = w.persona(id).unwrap();
        assert_eq!(
            persona.dominant_traits,
            vec!["personality.cunning", "physical.agility", "ability.healer"]
        );
        assert_eq!(persona.summary, "A fox with exo style");
    }
}
