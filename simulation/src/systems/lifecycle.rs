//! Lifecycle System
//!
//! Ages every living agent and moves it forward through
//! Infant -> Juvenile -> Adult -> Elder -> Deceased. Elders may also die early
//! from a constant hazard. Deceased agents are skipped entirely.

use rand::Rng;

use crate::components::{LifeStage, LifecycleComponent};
use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    /// Stage boundaries crossed, deaths included.
    pub transitions: u32,
    pub deaths: u32,
}

/// Probability an Elder dies during `dt` given an annual `hazard`.
fn elder_death_chance(hazard: f64, dt: f64) -> f64 {
    1.0 - (1.0 - hazard).powf(dt)
}

/// Advance all living agents by `dt`. `now` is the clock time after the advance.
pub fn lifecycle_system<R: Rng + ?Sized>(
    store: &mut EntityStore,
    config: &LifecycleConfig,
    dt: f64,
    now: f64,
    rng: &mut R,
) -> Result<LifecycleReport> {
    let mut report = LifecycleReport::default();
    let living = store.select::<LifecycleComponent>(|l| !l.is_deceased());

    for id in living {
        let Some(mut lifecycle) = store.get_mut::<LifecycleComponent>(id)? else {
            continue;
        };

        lifecycle.age += dt.max(0.0);
        let mut target = config.stage_for_age(lifecycle.age);

        if target == LifeStage::Elder
            && config.elder_hazard > 0.0
            && rng.gen::<f64>() < elder_death_chance(config.elder_hazard, dt)
        {
            target = LifeStage::Deceased;
        }

        // One-way: thresholds changed at runtime never send an agent back.
        let target = target.max(lifecycle.stage);
        if target == lifecycle.stage {
            continue;
        }

        report.transitions += target as u32 - lifecycle.stage as u32;
        lifecycle.stage = target;
        lifecycle.mature = target.is_mature();
        if target == LifeStage::Deceased {
            lifecycle.died_at = Some(now);
            report.deaths += 1;
            tracing::debug!(agent = %id, age = lifecycle.age, "agent died");
        }
    }

    Ok(report)
}
