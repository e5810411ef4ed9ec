//! Error types for the simulation engine.
//!
//! Every fallible operation returns [`SimError`] through the crate-level
//! [`Result`] alias. Pure computations (inheritance, compatibility) are total
//! and never produce one.

use crate::components::AgentId;

/// Errors surfaced by the entity store, the world, and the persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An explicit entity id was reused at creation.
    #[error("entity {0} already exists")]
    DuplicateEntity(AgentId),

    /// Lookup on an entity that is not in the store.
    #[error("entity {0} not found")]
    NotFound(AgentId),

    /// The snapshot location holds nothing to load.
    #[error("no snapshot at {0}")]
    SnapshotNotFound(String),

    /// The snapshot could not be decoded or failed an integrity check.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// The snapshot was written with a schema this build cannot read.
    #[error("unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the snapshot header.
        found: u32,
        /// Version this build reads and writes.
        supported: u32,
    },

    /// Transport-level persistence failure.
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Another agent already holds the requested name.
    #[error("name already taken: {0}")]
    NameTaken(String),

    /// The configuration is malformed or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
