//! Persistence module for saving and loading simulation state
//!
//! A snapshot carries every entity with its components plus the clock,
//! acceleration and random-source state. The schema version is the first
//! field in both encodings, so it can be read before the body is trusted.

use chrono::{DateTime, Utc};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use crate::components::*;
use crate::error::{Result, SimError};
use crate::store::EntityStore;
use crate::systems::reproduction::refresh_eligibility;
use crate::world::{AgentRecord, WorldSimulation};

/// Schema version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Snapshot Schema
// ============================================================================

/// Complete world state for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub clock: Clock,
    pub acceleration: f64,
    /// `None` once the id counter has run past `u64::MAX`.
    pub next_id: Option<u64>,
    pub rng: ChaCha8Rng,
    pub entities: Vec<AgentRecord>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Bincode,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SnapshotFormat::Bincode,
            _ => SnapshotFormat::Json,
        }
    }
}

pub fn encode(snapshot: &WorldSnapshot, format: SnapshotFormat) -> Result<Vec<u8>> {
    let bytes = match format {
        SnapshotFormat::Json => serde_json::to_vec(snapshot).map_err(io::Error::other)?,
        SnapshotFormat::Bincode => bincode::serialize(snapshot).map_err(io::Error::other)?,
    };
    Ok(bytes)
}

pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<WorldSnapshot> {
    let header: VersionHeader = match format {
        SnapshotFormat::Json => serde_json::from_slice(bytes)
            .map_err(|e| SimError::CorruptSnapshot(format!("unreadable header: {e}")))?,
        SnapshotFormat::Bincode => bincode::deserialize(bytes)
            .map_err(|e| SimError::CorruptSnapshot(format!("unreadable header: {e}")))?,
    };
    if header.version != SNAPSHOT_VERSION {
        return Err(SimError::UnsupportedVersion {
            found: header.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    match format {
        SnapshotFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| SimError::CorruptSnapshot(e.to_string()))
        }
        SnapshotFormat::Bincode => {
            bincode::deserialize(bytes).map_err(|e| SimError::CorruptSnapshot(e.to_string()))
        }
    }
}

// ============================================================================
// Persistence Gateway
// ============================================================================

/// Durable home for one snapshot.
///
/// Writes replace the previous snapshot atomically: a reader sees either the
/// old or the new snapshot, never a mix. Concurrent writers race and the last
/// one wins; callers that need more must coordinate themselves.
pub trait SnapshotStore {
    /// Human-readable location for logs and errors.
    fn location(&self) -> String;

    fn write_snapshot(&self, snapshot: &WorldSnapshot) -> Result<()>;

    fn read_snapshot(&self) -> Result<WorldSnapshot>;
}

/// Snapshot file on local disk.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
    format: SnapshotFormat,
}

impl FileSnapshotStore {
    /// Format follows the extension: `.bin`/`.bincode` is binary, anything else JSON.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = SnapshotFormat::from_path(&path);
        Self { path, format }
    }

    pub fn with_format(path: impl Into<PathBuf>, format: SnapshotFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn write_snapshot(&self, snapshot: &WorldSnapshot) -> Result<()> {
        let bytes = encode(snapshot, self.format)?;
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };

        // One temp file per write; persist renames it over the target.
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn read_snapshot(&self) -> Result<WorldSnapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SimError::SnapshotNotFound(self.location()))
            }
            Err(e) => return Err(e.into()),
        };
        decode(&bytes, self.format)
    }
}

/// In-process snapshot slot. Clones share the same slot, so several worlds in
/// one process can hand state to each other through it.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
    format: SnapshotFormat,
}

impl MemorySnapshotStore {
    pub fn new(format: SnapshotFormat) -> Self {
        Self {
            slot: Arc::default(),
            format,
        }
    }

    /// Replace the raw stored bytes.
    pub fn put_raw(&self, bytes: Vec<u8>) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(bytes);
        }
    }

    pub fn raw(&self) -> Option<Vec<u8>> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn write_snapshot(&self, snapshot: &WorldSnapshot) -> Result<()> {
        let bytes = encode(snapshot, self.format)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("snapshot slot poisoned"))?;
        *slot = Some(bytes);
        Ok(())
    }

    fn read_snapshot(&self) -> Result<WorldSnapshot> {
        let bytes = self
            .raw()
            .ok_or_else(|| SimError::SnapshotNotFound(self.location()))?;
        decode(&bytes, self.format)
    }
}

// ============================================================================
// Save / Load
// ============================================================================

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub population: usize,
    pub clock: Clock,
    pub saved_at: DateTime<Utc>,
}

impl WorldSimulation {
    /// Capture the full world state, entities in id order.
    pub fn snapshot(&self) -> Result<WorldSnapshot> {
        let entities = self
            .store
            .ids()
            .map(|id| self.agent(id))
            .collect::<Result<Vec<_>>>()?;
        Ok(WorldSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            clock: self.clock,
            acceleration: self.time.acceleration(),
            next_id: self.store.next_id(),
            rng: self.rng.clone(),
            entities,
        })
    }

    pub fn save(&self, store: &dyn SnapshotStore) -> Result<()> {
        let snapshot = self.snapshot()?;
        store.write_snapshot(&snapshot)?;
        tracing::info!(
            location = %store.location(),
            population = snapshot.entities.len(),
            clock = snapshot.clock.time,
            "saved snapshot"
        );
        Ok(())
    }

    /// Replace this world's state with the stored snapshot.
    ///
    /// Nothing changes unless the snapshot decodes and passes every integrity
    /// check. Config is not part of the snapshot; the instance keeps its own.
    pub fn load(&mut self, store: &dyn SnapshotStore) -> Result<LoadReport> {
        let result = store.read_snapshot().and_then(|snapshot| self.restore(snapshot));
        match &result {
            Ok(report) => tracing::info!(
                location = %store.location(),
                population = report.population,
                clock = report.clock.time,
                "loaded snapshot"
            ),
            Err(e) => tracing::warn!(location = %store.location(), error = %e, "load rejected"),
        }
        result
    }

    /// Validate and adopt a snapshot.
    pub fn restore(&mut self, snapshot: WorldSnapshot) -> Result<LoadReport> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SimError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        validate(&snapshot)?;

        let mut time = self.time.clone();
        time.set_acceleration(snapshot.acceleration)
            .map_err(|_| SimError::CorruptSnapshot("invalid acceleration".into()))?;

        let mut store = EntityStore::new();
        for record in &snapshot.entities {
            store
                .create_with_id(record.id)
                .map_err(|_| SimError::CorruptSnapshot(format!("duplicate entity {}", record.id)))?;
            if let Some(c) = record.agent.clone() {
                store.insert(record.id, c)?;
            }
            if let Some(c) = record.lifecycle.clone() {
                store.insert(record.id, c)?;
            }
            if let Some(c) = record.traits.clone() {
                store.insert(record.id, c)?;
            }
            if let Some(c) = record.lineage.clone() {
                store.insert(record.id, c)?;
            }
            if let Some(c) = record.reproduction.clone() {
                store.insert(record.id, c)?;
            }
        }
        store.set_next_id(snapshot.next_id);
        refresh_eligibility(&mut store, &self.config().reproduction, snapshot.clock.time);

        let report = LoadReport {
            population: store.len(),
            clock: snapshot.clock,
            saved_at: snapshot.saved_at,
        };
        self.store = store;
        self.clock = snapshot.clock;
        self.time = time;
        self.rng = snapshot.rng;
        Ok(report)
    }
}

/// Referential and genealogical integrity of a snapshot.
fn validate(snapshot: &WorldSnapshot) -> Result<()> {
    let corrupt = |msg: String| Err(SimError::CorruptSnapshot(msg));

    if !(snapshot.clock.time.is_finite() && snapshot.clock.time >= 0.0) {
        return corrupt("clock is not a finite non-negative time".into());
    }

    let mut ids = BTreeSet::new();
    for record in &snapshot.entities {
        if !ids.insert(record.id) {
            return corrupt(format!("duplicate entity {}", record.id));
        }
    }

    let lineages: BTreeMap<AgentId, &LineageComponent> = snapshot
        .entities
        .iter()
        .filter_map(|r| r.lineage.as_ref().map(|l| (r.id, l)))
        .collect();
    // Parent and descendant lists must mirror each other.
    let lists_descendant = |parent: &AgentId, child: AgentId| {
        lineages.get(parent).is_some_and(|l| l.descendants.contains(&child))
    };
    let lists_parent = |child: &AgentId, parent: AgentId| {
        lineages.get(child).is_some_and(|l| l.parents.contains(&parent))
    };

    for record in &snapshot.entities {
        let Some(lineage) = &record.lineage else {
            continue;
        };
        for parent in &lineage.parents {
            if !ids.contains(parent) {
                return corrupt(format!("entity {} references missing parent {parent}", record.id));
            }
            if !lists_descendant(parent, record.id) {
                return corrupt(format!(
                    "parent {parent} does not list {} as a descendant",
                    record.id
                ));
            }
        }
        for child in &lineage.descendants {
            if !ids.contains(child) {
                return corrupt(format!(
                    "entity {} references missing descendant {child}",
                    record.id
                ));
            }
            if !lists_parent(child, record.id) {
                return corrupt(format!(
                    "descendant {child} does not list {} as a parent",
                    record.id
                ));
            }
        }
        if !lineage.parents.is_empty() {
            // Generation strictly increasing along every edge also rules out cycles.
            let expected = lineage
                .parents
                .iter()
                .map(|p| lineages.get(p).map(|l| l.generation).unwrap_or(0))
                .max()
                .unwrap_or(0)
                + 1;
            if lineage.generation != expected {
                return corrupt(format!(
                    "entity {} has generation {} but its parents imply {expected}",
                    record.id, lineage.generation
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::generation::AgentParams;

    fn populated() -> WorldSimulation {
        let mut world = WorldSimulation::new(SimulationConfig::default()).unwrap();
        for age in [20.0, 22.0, 30.0, 5.0] {
            world.create_agent(AgentParams::new().aged(age)).unwrap();
        }
        world.step(3).unwrap();
        world
    }

    #[test]
    fn test_version_checked_before_body() {
        let store = MemorySnapshotStore::new(SnapshotFormat::Json);
        store.put_raw(br#"{ "version": 99, "whatever": true }"#.to_vec());
        let mut world = populated();
        let err = world.load(&store).unwrap_err();
        assert!(matches!(err, SimError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn test_bincode_version_header() {
        let world = populated();
        let mut bytes = encode(&world.snapshot().unwrap(), SnapshotFormat::Bincode).unwrap();
        bytes[..4].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode(&bytes, SnapshotFormat::Bincode),
            Err(SimError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(
            decode(b"not a snapshot", SnapshotFormat::Json),
            Err(SimError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_empty_store_is_not_found() {
        let mut world = populated();
        let store = MemorySnapshotStore::new(SnapshotFormat::Json);
        assert!(matches!(world.load(&store), Err(SimError::SnapshotNotFound(_))));
    }

    #[test]
    fn test_dangling_parent_rejected_and_world_untouched() {
        let mut world = populated();
        let before = world.snapshot().unwrap();

        let mut broken = before.clone();
        if let Some(lineage) = broken.entities[0].lineage.as_mut() {
            lineage.parents = vec![AgentId(900), AgentId(901)];
            lineage.generation = 1;
        }
        let err = world.restore(broken).unwrap_err();
        assert!(matches!(err, SimError::CorruptSnapshot(_)));

        let after = world.snapshot().unwrap();
        assert_eq!(before.entities, after.entities);
        assert_eq!(before.clock, after.clock);
    }

    fn root_record(id: u64, descendants: Vec<AgentId>) -> AgentRecord {
        AgentRecord {
            id: AgentId(id),
            agent: None,
            lifecycle: Some(LifecycleComponent::with_stage(20.0, LifeStage::Adult)),
            traits: None,
            lineage: Some(LineageComponent {
                descendants,
                ..LineageComponent::root()
            }),
            reproduction: Some(ReproductionComponent::default()),
        }
    }

    #[test]
    fn test_unreciprocated_descendant_rejected() {
        let mut world = populated();
        let mut snapshot = world.snapshot().unwrap();
        let next = snapshot.entities.iter().map(|r| r.id.0).max().unwrap_or(0);
        let (a, b) = (next + 1, next + 2);
        // Two roots claiming each other as offspring form a cycle.
        snapshot.entities.push(root_record(a, vec![AgentId(b)]));
        snapshot.entities.push(root_record(b, vec![AgentId(a)]));
        assert!(matches!(world.restore(snapshot), Err(SimError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_parent_missing_descendant_link_rejected() {
        let mut world = WorldSimulation::new(SimulationConfig::default()).unwrap();
        let mut snapshot = world.snapshot().unwrap();
        let mut child = root_record(3, Vec::new());
        if let Some(lineage) = child.lineage.as_mut() {
            lineage.parents = vec![AgentId(1), AgentId(2)];
            lineage.generation = 1;
        }
        snapshot.entities = vec![
            root_record(1, vec![AgentId(3)]),
            root_record(2, Vec::new()),
            child,
        ];
        assert!(matches!(
            world.restore(snapshot.clone()),
            Err(SimError::CorruptSnapshot(_))
        ));

        snapshot.entities[1] = root_record(2, vec![AgentId(3)]);
        assert_eq!(world.restore(snapshot).unwrap().population, 3);
        assert_eq!(world.lineage(AgentId(1)).unwrap().descendants[0].id, AgentId(3));
    }

    #[test]
    fn test_restore_refreshes_eligibility() {
        let mut world = WorldSimulation::new(SimulationConfig::default()).unwrap();
        let mut snapshot = world.snapshot().unwrap();
        snapshot.entities = vec![root_record(1, Vec::new())];
        world.restore(snapshot).unwrap();
        assert!(world.agent(AgentId(1)).unwrap().reproduction.unwrap().eligible);
    }

    #[test]
    fn test_max_id_snapshot_restores() {
        let mut world = WorldSimulation::new(SimulationConfig::default()).unwrap();
        let mut snapshot = world.snapshot().unwrap();
        snapshot.entities = vec![root_record(u64::MAX, Vec::new())];
        world.restore(snapshot).unwrap();
        assert_eq!(world.store().next_id(), None);
        let id = world.create_agent(AgentParams::new()).unwrap();
        assert_eq!(id, AgentId(1));
    }

    #[test]
    fn test_concurrent_writers_leave_a_complete_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("shared.json"));
        let small = WorldSimulation::new(SimulationConfig::default())
            .unwrap()
            .snapshot()
            .unwrap();
        let large = populated().snapshot().unwrap();
        let sizes = [small.entities.len(), large.entities.len()];

        std::thread::scope(|scope| {
            for snapshot in [small, large] {
                let store = store.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        store.write_snapshot(&snapshot).unwrap();
                    }
                });
            }
            let reader = store.clone();
            scope.spawn(move || {
                for _ in 0..50 {
                    match reader.read_snapshot() {
                        Ok(snapshot) => assert!(sizes.contains(&snapshot.entities.len())),
                        Err(SimError::SnapshotNotFound(_)) => {}
                        Err(e) => panic!("torn snapshot: {e}"),
                    }
                }
            });
        });

        let last = store.read_snapshot().unwrap();
        assert!(sizes.contains(&last.entities.len()));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_generation_mismatch_rejected() {
        let mut world = populated();
        let mut snapshot = world.snapshot().unwrap();
        let parents = vec![snapshot.entities[0].id, snapshot.entities[1].id];
        if let Some(lineage) = snapshot.entities[2].lineage.as_mut() {
            lineage.parents = parents;
            lineage.generation = 5;
        }
        assert!(matches!(world.restore(snapshot), Err(SimError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SnapshotFormat::from_path(Path::new("w.bin")), SnapshotFormat::Bincode);
        assert_eq!(SnapshotFormat::from_path(Path::new("w.json")), SnapshotFormat::Json);
    }
}
