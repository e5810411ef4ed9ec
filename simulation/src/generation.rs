//! Root agent generation.
//!
//! Root agents have no parents. Anything the caller leaves out of
//! [`AgentParams`] is drawn from the world's generator: spirit, style, a full
//! trait set biased toward the spirit's signature traits, and a name.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::{AgentId, NamingStyle, Spirit, TraitComponent};
use crate::config::TraitRange;

const PERSONALITY: &[&str] = &[
    "dominance", "loyalty", "cunning", "aggression", "intelligence", "creativity", "playfulness",
    "protectiveness", "empathy", "charisma", "independence", "cooperation", "curiosity", "patience",
    "adaptability", "perfectionism",
];

const PHYSICAL: &[&str] = &[
    "size", "strength", "agility", "endurance", "appearance", "grace", "speed", "coordination",
    "stamina", "reflexes",
];

const ABILITIES: &[&str] = &[
    "strategist", "hunter", "mentor", "artist", "healer", "inventor", "explorer", "guardian",
    "diplomat", "leader", "scholar", "mediator",
];

/// Every trait key a root agent receives.
pub static STANDARD_TRAIT_KEYS: Lazy<Vec<String>> = Lazy::new(|| {
    let personality = PERSONALITY.iter().map(|t| format!("personality.{t}"));
    let physical = PHYSICAL.iter().map(|t| format!("physical.{t}"));
    let abilities = ABILITIES.iter().map(|t| format!("ability.{t}"));
    personality.chain(physical).chain(abilities).collect()
});

/// Added to a spirit's signature traits at generation.
const SIGNATURE_BIAS: f64 = 0.2;

pub fn signature_traits(spirit: Spirit) -> &'static [&'static str] {
    match spirit {
        Spirit::Fox => &["personality.cunning", "physical.agility", "ability.strategist"],
        Spirit::Wolf => &["personality.loyalty", "physical.endurance", "ability.hunter"],
        Spirit::Otter => &["personality.playfulness", "physical.agility", "ability.explorer"],
        Spirit::Eagle => &["personality.independence", "physical.speed", "ability.explorer"],
        Spirit::Lion => &["personality.dominance", "physical.strength", "ability.leader"],
        Spirit::Tiger => &["personality.aggression", "physical.strength", "ability.hunter"],
        Spirit::Dragon => &["personality.intelligence", "physical.size", "ability.guardian"],
        Spirit::Phoenix => &["personality.creativity", "physical.grace", "ability.healer"],
        Spirit::Raven => &["personality.curiosity", "personality.intelligence", "ability.scholar"],
        Spirit::Bear => &["personality.protectiveness", "physical.size", "ability.guardian"],
    }
}

/// Request to create a root agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentParams {
    /// Explicit id; allocated when `None`.
    pub id: Option<AgentId>,
    pub name: Option<String>,
    pub spirit: Option<Spirit>,
    pub style: Option<NamingStyle>,
    /// Initial age. Stage follows from the lifecycle thresholds.
    pub age: f64,
    pub traits: Option<TraitComponent>,
}

impl AgentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn spirit(mut self, spirit: Spirit) -> Self {
        self.spirit = Some(spirit);
        self
    }

    pub fn style(mut self, style: NamingStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn aged(mut self, age: f64) -> Self {
        self.age = age;
        self
    }

    pub fn traits(mut self, traits: TraitComponent) -> Self {
        self.traits = Some(traits);
        self
    }
}

pub fn random_spirit<R: Rng + ?Sized>(rng: &mut R) -> Spirit {
    *Spirit::ALL.choose(rng).unwrap_or(&Spirit::Fox)
}

pub fn random_style<R: Rng + ?Sized>(rng: &mut R) -> NamingStyle {
    *NamingStyle::ALL.choose(rng).unwrap_or(&NamingStyle::Foundation)
}

/// Full standard trait set, uniform in range with the spirit's signature traits raised.
pub fn generate_traits<R: Rng + ?Sized>(
    spirit: Spirit,
    range: TraitRange,
    rng: &mut R,
) -> TraitComponent {
    let signature = signature_traits(spirit);
    STANDARD_TRAIT_KEYS
        .iter()
        .map(|key| {
            let mut value = rng.gen_range(range.min..=range.max);
            if signature.contains(&key.as_str()) {
                value += SIGNATURE_BIAS * range.width();
            }
            (key.clone(), range.clamp(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_standard_keys() {
        assert_eq!(
            STANDARD_TRAIT_KEYS.len(),
            PERSONALITY.len() + PHYSICAL.len() + ABILITIES.len()
        );
        for spirit in Spirit::ALL {
            for key in signature_traits(spirit) {
                assert!(STANDARD_TRAIT_KEYS.iter().any(|k| k == key), "{key}");
            }
        }
    }

    #[test]
    fn test_generated_traits_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let range = TraitRange { min: 0.2, max: 0.8 };
        let traits = generate_traits(Spirit::Dragon, range, &mut rng);
        assert_eq!(traits.len(), STANDARD_TRAIT_KEYS.len());
        assert!(traits.values.values().all(|v| (0.2..=0.8).contains(v)));
    }
}
