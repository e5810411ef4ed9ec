//! AgentWorld Simulation Engine
//!
//! Deterministic agent population simulation using ECS architecture: agents
//! age through life stages, pair up by compatibility, and pass blended traits
//! to offspring while the engine tracks their genealogy.

pub mod compatibility;
pub mod components;
pub mod config;
pub mod error;
pub mod generation;
pub mod inheritance;
pub mod names;
pub mod pedigree;
pub mod persistence;
pub mod runner;
pub mod store;
pub mod systems;
pub mod world;

pub use components::*;
pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use generation::AgentParams;
pub use persistence::{FileSnapshotStore, MemorySnapshotStore, SnapshotFormat, SnapshotStore};
pub use world::{StepSummary, WorldSimulation};
