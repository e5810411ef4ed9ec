//! Name Generation for Agents
//!
//! Names combine a spirit-specific base with a style-specific pattern, e.g.
//! `Vulpine-Sage-13` (foundation) or `Neon-Lupus-Grid` (cyberpunk). Draws come
//! from the world's seeded generator so naming is reproducible.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::collections::HashSet;

use crate::components::{NamingStyle, Spirit};

/// Naming strategy. Implementations must return a name absent from `existing`.
pub trait NameGenerator: Send {
    fn generate_name(
        &mut self,
        spirit: Spirit,
        style: NamingStyle,
        existing: &HashSet<String>,
        rng: &mut dyn RngCore,
    ) -> String;
}

const FOX_NAMES: &[&str] = &[
    "Vulpine", "Reynard", "Kitsune", "Fennec", "Vixen", "Trickster", "Ember", "Copper", "Swift",
    "Sly",
];
const WOLF_NAMES: &[&str] = &[
    "Lupus", "Lycan", "Fenrir", "Lobo", "Alpha", "Howl", "Shadow", "Grey", "Pack", "Moon",
];
const OTTER_NAMES: &[&str] = &[
    "Lutra", "Marina", "Splash", "Ripple", "Brook", "Pebble", "Kelp", "Tide", "Current", "Playful",
];
const EAGLE_NAMES: &[&str] = &[
    "Aquila", "Talon", "Soar", "Apex", "Summit", "Skyward", "Gale", "Crest", "Zenith", "Keen",
];
const LION_NAMES: &[&str] = &[
    "Leo", "Panthera", "Mane", "Regal", "Sovereign", "Pride", "Aslan", "Sun", "Valor", "Roar",
];
const TIGER_NAMES: &[&str] = &[
    "Tigris", "Stripe", "Bengal", "Amur", "Raja", "Prowl", "Fang", "Saber", "Blaze", "Jungle",
];
const DRAGON_NAMES: &[&str] = &[
    "Draco", "Wyrm", "Drake", "Smaug", "Scale", "Inferno", "Ancient", "Hoard", "Wyvern", "Tempest",
];
const PHOENIX_NAMES: &[&str] = &[
    "Fenix", "Pyre", "Rebirth", "Cinder", "Aurora", "Solar", "Flare", "Ascend", "Ash", "Radiant",
];
const RAVEN_NAMES: &[&str] = &[
    "Corvus", "Hugin", "Munin", "Omen", "Night", "Quill", "Riddle", "Obsidian", "Whisper", "Sable",
];
const BEAR_NAMES: &[&str] = &[
    "Ursa", "Ursus", "Grizzly", "Kodiak", "Bruin", "Honey", "Boulder", "Timber", "Den", "Thorn",
];

const FOUNDATION_SUFFIXES: &[&str] = &["Prime", "Sage", "Oracle", "Architect", "Keeper", "Scholar"];
const EXO_DESIGNATIONS: &[&str] = &["Strike", "Guard", "Sentinel", "Vanguard", "Warden", "Ranger"];
const MYTHIC_REFERENCES: &[&str] = &["Atlas", "Hermes", "Nyx", "Orion", "Athena", "Odin", "Freya"];
const MYTHIC_TITLES: &[&str] = &["the-Wise", "the-Bold", "the-Swift", "the-Elder", "the-Bright"];
const CYBER_PREFIXES: &[&str] = &["Cyber", "Neo", "Neon", "Quantum", "Synth", "Chrome"];
const CYBER_SUFFIXES: &[&str] = &["Nexus", "Grid", "Core", "Byte", "Node", "Pulse"];
const SCIENTIFIC_CLASSES: &[&str] = &["Alpha", "Beta", "Gamma", "Delta", "Sigma", "Omega"];

/// Attempts at a fresh combination before falling back to a numeric suffix.
const FRESH_ATTEMPTS: usize = 16;

pub fn spirit_names(spirit: Spirit) -> &'static [&'static str] {
    match spirit {
        Spirit::Fox => FOX_NAMES,
        Spirit::Wolf => WOLF_NAMES,
        Spirit::Otter => OTTER_NAMES,
        Spirit::Eagle => EAGLE_NAMES,
        Spirit::Lion => LION_NAMES,
        Spirit::Tiger => TIGER_NAMES,
        Spirit::Dragon => DRAGON_NAMES,
        Spirit::Phoenix => PHOENIX_NAMES,
        Spirit::Raven => RAVEN_NAMES,
        Spirit::Bear => BEAR_NAMES,
    }
}

fn pick(table: &'static [&'static str], rng: &mut dyn RngCore) -> &'static str {
    table.choose(rng).copied().unwrap_or("Agent")
}

/// Default naming strategy backed by the tables above.
#[derive(Debug, Clone, Default)]
pub struct SpiritNamer;

impl SpiritNamer {
    pub fn new() -> Self {
        Self
    }

    fn compose(spirit: Spirit, style: NamingStyle, rng: &mut dyn RngCore) -> String {
        let base = pick(spirit_names(spirit), rng);
        match style {
            NamingStyle::Foundation => {
                format!("{base}-{}-{}", pick(FOUNDATION_SUFFIXES, rng), rng.gen_range(1..=99))
            }
            NamingStyle::Exo => {
                format!("{base}-{}-{}", pick(EXO_DESIGNATIONS, rng), rng.gen_range(1..=99))
            }
            NamingStyle::Hybrid => {
                format!("{base}-{}-{}", pick(MYTHIC_REFERENCES, rng), pick(EXO_DESIGNATIONS, rng))
            }
            NamingStyle::Cyberpunk => {
                format!("{}-{base}-{}", pick(CYBER_PREFIXES, rng), pick(CYBER_SUFFIXES, rng))
            }
            NamingStyle::Mythological => {
                format!("{}-{base}-{}", pick(MYTHIC_REFERENCES, rng), pick(MYTHIC_TITLES, rng))
            }
            NamingStyle::Scientific => {
                format!("{base}-{}-{}", pick(SCIENTIFIC_CLASSES, rng), rng.gen_range(100..=999))
            }
        }
    }
}

impl NameGenerator for SpiritNamer {
    fn generate_name(
        &mut self,
        spirit: Spirit,
        style: NamingStyle,
        existing: &HashSet<String>,
        rng: &mut dyn RngCore,
    ) -> String {
        let mut candidate = Self::compose(spirit, style, rng);
        for _ in 1..FRESH_ATTEMPTS {
            if !existing.contains(&candidate) {
                return candidate;
            }
            candidate = Self::compose(spirit, style, rng);
        }
        let stem = candidate;
        (2u64..)
            .map(|n| format!("{stem}-{n}"))
            .find(|name| !existing.contains(name))
            .unwrap_or(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_name_uses_spirit_table() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let name = SpiritNamer::new().generate_name(
            Spirit::Fox,
            NamingStyle::Foundation,
            &HashSet::new(),
            &mut rng,
        );
        let base = name.split('-').next().unwrap();
        assert!(FOX_NAMES.contains(&base), "{name}");
    }

    #[test]
    fn test_names_never_collide() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut namer = SpiritNamer::new();
        let mut existing = HashSet::new();
        // Cyberpunk has only 360 combinations per spirit, so this forces suffixes.
        for _ in 0..600 {
            let name = namer.generate_name(Spirit::Bear, NamingStyle::Cyberpunk, &existing, &mut rng);
            assert!(existing.insert(name));
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(5);
        let mut b = ChaCha8Rng::seed_from_u64(5);
        let none = HashSet::new();
        assert_eq!(
            SpiritNamer.generate_name(Spirit::Raven, NamingStyle::Hybrid, &none, &mut a),
            SpiritNamer.generate_name(Spirit::Raven, NamingStyle::Hybrid, &none, &mut b),
        );
    }
}
