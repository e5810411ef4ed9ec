//! ECS Systems - process entities each tick
//!
//! Per tick the world runs, in this order: time (advance the clock),
//! lifecycle (age and stage), reproduction (pairing and births). Lifecycle
//! runs first so eligibility reflects the agent's current stage.

pub mod lifecycle;
pub mod reproduction;
pub mod time;

pub use lifecycle::{lifecycle_system, LifecycleReport};
pub use reproduction::{reproduction_system, Birth, ReproductionParams};
pub use time::TimeSystem;
