//! Trait Inheritance
//!
//! Offspring traits are a blend of both parents' shared traits with a small
//! bounded mutation. Traits carried by only one parent are passed on with even
//! odds. All randomness comes from the caller's generator, so a seeded
//! generator reproduces the same offspring.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeSet;

use crate::components::TraitComponent;
use crate::config::{ReproductionConfig, TraitRange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InheritanceParams {
    /// Upper bound of the per-trait perturbation.
    pub mutation_rate: f64,
    /// Weight of parent A in the blend.
    pub blend_weight: f64,
    pub range: TraitRange,
}

impl Default for InheritanceParams {
    fn default() -> Self {
        Self {
            mutation_rate: 0.1,
            blend_weight: 0.5,
            range: TraitRange::default(),
        }
    }
}

impl InheritanceParams {
    pub fn from_config(reproduction: &ReproductionConfig, range: TraitRange) -> Self {
        Self {
            mutation_rate: reproduction.mutation_rate,
            blend_weight: reproduction.blend_weight,
            range,
        }
    }
}

/// Offspring traits from two parents using the arithmetic mean and default range.
pub fn inherit<R: Rng + ?Sized>(
    a: &TraitComponent,
    b: &TraitComponent,
    mutation_rate: f64,
    rng: &mut R,
) -> TraitComponent {
    let params = InheritanceParams {
        mutation_rate,
        ..InheritanceParams::default()
    };
    inherit_with(a, b, &params, rng)
}

pub fn inherit_with<R: Rng + ?Sized>(
    a: &TraitComponent,
    b: &TraitComponent,
    params: &InheritanceParams,
    rng: &mut R,
) -> TraitComponent {
    // Normal(0, rate/2) truncated to ±rate. None disables mutation.
    let noise = (params.mutation_rate.is_finite() && params.mutation_rate > 0.0)
        .then(|| Normal::new(0.0, params.mutation_rate / 2.0).ok())
        .flatten();
    let weight = params.blend_weight.clamp(0.0, 1.0);

    let keys: BTreeSet<&String> = a.values.keys().chain(b.values.keys()).collect();
    let mut offspring = TraitComponent::default();

    for key in keys {
        let value = match (a.get(key), b.get(key)) {
            (Some(va), Some(vb)) => {
                let blended = va * weight + vb * (1.0 - weight);
                let mutation = noise
                    .as_ref()
                    .map(|n| n.sample(rng).clamp(-params.mutation_rate, params.mutation_rate))
                    .unwrap_or(0.0);
                blended + mutation
            }
            (Some(v), None) | (None, Some(v)) => {
                if !rng.gen_bool(0.5) {
                    continue;
                }
                v
            }
            (None, None) => continue,
        };
        offspring.values.insert(key.to_string(), params.range.clamp(value));
    }

    offspring
}
