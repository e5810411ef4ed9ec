//! Reproduction System
//!
//! Pairs each eligible agent with its most compatible eligible mate and
//! produces one offspring per pair. Agents are visited in id order and each
//! takes part in at most one pairing per tick.

use rand::RngCore;
use rayon::prelude::*;
use std::collections::HashSet;

use crate::compatibility::{compatibility, CompatibilityContext, MateProfile};
use crate::components::{
    AgentComponent, AgentId, LifecycleComponent, LineageComponent, ReproductionComponent,
};
use crate::config::{CompatibilityConfig, ReproductionConfig, TraitRange};
use crate::error::Result;
use crate::inheritance::{inherit_with, InheritanceParams};
use crate::names::NameGenerator;
use crate::pedigree::Pedigree;
use crate::store::EntityStore;

/// Per-tick inputs.
#[derive(Debug, Clone, Copy)]
pub struct ReproductionParams<'a> {
    pub reproduction: &'a ReproductionConfig,
    pub compatibility: &'a CompatibilityConfig,
    pub range: TraitRange,
    pub now: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Birth {
    pub child: AgentId,
    pub parents: (AgentId, AgentId),
    pub compatibility: f64,
}

/// Recompute the eligibility flag for every agent. Returns how many are eligible.
pub fn refresh_eligibility(store: &mut EntityStore, config: &ReproductionConfig, now: f64) -> usize {
    let mut eligible = 0;
    for (_, (lifecycle, repro)) in store
        .raw_mut()
        .query_mut::<(&LifecycleComponent, &mut ReproductionComponent)>()
    {
        repro.eligible = lifecycle.stage.is_mature()
            && !repro.in_cooldown(now)
            && repro.offspring_count < config.max_offspring;
        if repro.eligible {
            eligible += 1;
        }
    }
    eligible
}

/// Greedy pairing over `profiles` (sorted by id). Returns index pairs and scores.
///
/// Each seeker takes the highest-scoring unpaired candidate; equal scores go
/// to the lower id. Pairs below `min_score` are dropped.
pub fn select_pairs(
    profiles: &[MateProfile],
    ctx: &CompatibilityContext<'_>,
    min_score: f64,
) -> Vec<(usize, usize, f64)> {
    let mut paired = vec![false; profiles.len()];
    let mut pairs = Vec::new();

    for (i, seeker) in profiles.iter().enumerate() {
        if paired[i] {
            continue;
        }
        let taken = &paired;
        let best = profiles
            .par_iter()
            .enumerate()
            .filter(|(j, _)| *j != i && !taken[*j])
            .map(|(j, candidate)| (j, compatibility(seeker, candidate, ctx)))
            .filter(|(_, score)| *score > 0.0)
            .max_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| profiles[b.0].id.cmp(&profiles[a.0].id))
            });

        if let Some((j, score)) = best {
            if score >= min_score {
                paired[i] = true;
                paired[j] = true;
                pairs.push((i, j, score));
            }
        }
    }

    pairs
}

/// Run one reproduction pass.
pub fn reproduction_system<R: RngCore>(
    store: &mut EntityStore,
    params: &ReproductionParams<'_>,
    namer: &mut dyn NameGenerator,
    rng: &mut R,
) -> Result<Vec<Birth>> {
    if refresh_eligibility(store, params.reproduction, params.now) < 2 {
        return Ok(Vec::new());
    }

    let mut profiles = Vec::new();
    for id in store.select::<ReproductionComponent>(|r| r.eligible) {
        if let Some(profile) = MateProfile::from_store(store, id)? {
            profiles.push(profile);
        }
    }

    let pedigree = Pedigree::from_store(store);
    let ctx = CompatibilityContext {
        now: params.now,
        max_offspring: params.reproduction.max_offspring,
        range: params.range,
        config: params.compatibility,
        pedigree: &pedigree,
    };
    let pairs = select_pairs(&profiles, &ctx, params.reproduction.min_compatibility);
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let inheritance = InheritanceParams::from_config(params.reproduction, params.range);
    let mut names: HashSet<String> = store
        .raw()
        .query::<&AgentComponent>()
        .iter()
        .map(|(_, agent)| agent.name.clone())
        .collect();

    let mut births = Vec::with_capacity(pairs.len());
    for (i, j, score) in pairs {
        let (a, b) = (&profiles[i], &profiles[j]);

        let traits = inherit_with(&a.traits, &b.traits, &inheritance, rng);
        // Spirit and style pass down from the first parent.
        let name = namer.generate_name(a.spirit, a.style, &names, rng);
        names.insert(name.clone());

        let child = store.create();
        store.insert(
            child,
            AgentComponent {
                name,
                spirit: a.spirit,
                style: a.style,
            },
        )?;
        store.insert(child, LifecycleComponent::newborn())?;
        store.insert(child, traits)?;
        store.insert(
            child,
            LineageComponent::offspring((a.id, a.generation), (b.id, b.generation)),
        )?;
        store.insert(
            child,
            ReproductionComponent {
                cooldown_until: params.now,
                offspring_count: 0,
                eligible: false,
            },
        )?;

        for parent in [a.id, b.id] {
            record_parenthood(store, parent, child, params)?;
        }

        tracing::debug!(%child, parent_a = %a.id, parent_b = %b.id, score, "offspring born");
        births.push(Birth {
            child,
            parents: (a.id, b.id),
            compatibility: score,
        });
    }

    Ok(births)
}

fn record_parenthood(
    store: &mut EntityStore,
    parent: AgentId,
    child: AgentId,
    params: &ReproductionParams<'_>,
) -> Result<()> {
    let recorded = match store.get_mut::<LineageComponent>(parent)? {
        Some(mut lineage) => {
            lineage.descendants.push(child);
            true
        }
        None => false,
    };
    if !recorded {
        let mut lineage = LineageComponent::root();
        lineage.descendants.push(child);
        store.insert(parent, lineage)?;
    }
    if let Some(mut repro) = store.get_mut::<ReproductionComponent>(parent)? {
        repro.cooldown_until = params.now + params.reproduction.cooldown;
        repro.offspring_count += 1;
        repro.eligible = false;
    }
    Ok(())
}
