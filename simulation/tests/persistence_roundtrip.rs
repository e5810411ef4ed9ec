use simulation::*;
use tempfile::tempdir;

fn populated(seed: u64) -> WorldSimulation {
    let mut config = SimulationConfig::default();
    config.seed = seed;
    let mut world = WorldSimulation::new(config).unwrap();
    for i in 0..16 {
        world
            .create_agent(AgentParams::new().aged(14.0 + i as f64 * 3.0))
            .unwrap();
    }
    world.set_acceleration(1.5).unwrap();
    world.step(12).unwrap();
    world
}

fn assert_same_state(a: &WorldSimulation, b: &WorldSimulation) {
    assert_eq!(a.snapshot().unwrap().entities, b.snapshot().unwrap().entities);
    assert_eq!(a.clock(), b.clock());
    assert_eq!(a.acceleration(), b.acceleration());
    assert_eq!(a.store().next_id(), b.store().next_id());
}

fn round_trip(store: &dyn SnapshotStore) {
    let mut original = populated(11);
    original.save(store).unwrap();

    let mut restored = WorldSimulation::new(SimulationConfig::default()).unwrap();
    let report = restored.load(store).unwrap();
    assert_eq!(report.population, original.store().len());
    assert_same_state(&original, &restored);

    // Random state travels with the snapshot, so both continue identically.
    original.step(20).unwrap();
    restored.step(20).unwrap();
    assert_same_state(&original, &restored);
}

#[test]
fn json_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("world.json");
    round_trip(&FileSnapshotStore::new(&path));
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("{\"version\":1"));
}

#[test]
fn bincode_file_round_trip() {
    let dir = tempdir().unwrap();
    round_trip(&FileSnapshotStore::new(dir.path().join("world.bin")));
}

#[test]
fn memory_round_trip_both_formats() {
    round_trip(&MemorySnapshotStore::new(SnapshotFormat::Json));
    round_trip(&MemorySnapshotStore::new(SnapshotFormat::Bincode));
}

#[test]
fn overwrite_leaves_no_temp_files() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path().join("overwrite.json"));
    let mut world = populated(3);
    world.save(&store).unwrap();
    world.step(5).unwrap();
    world.save(&store).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "overwrite.json")
        .collect();
    assert!(leftovers.is_empty());

    let mut loaded = WorldSimulation::new(SimulationConfig::default()).unwrap();
    loaded.load(&store).unwrap();
    assert_same_state(&world, &loaded);
}

#[test]
fn missing_file_is_snapshot_not_found() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path().join("never-written.json"));
    let mut world = populated(5);
    let before = world.snapshot().unwrap().entities;
    assert!(matches!(world.load(&store), Err(SimError::SnapshotNotFound(_))));
    assert_eq!(world.snapshot().unwrap().entities, before);
}

#[test]
fn instances_sharing_a_store_stay_independent() {
    let store = MemorySnapshotStore::new(SnapshotFormat::Json);
    let mut first = populated(21);
    let mut second = WorldSimulation::new(SimulationConfig::default()).unwrap();

    first.save(&store).unwrap();
    second.load(&store).unwrap();
    assert_same_state(&first, &second);

    let frozen = second.snapshot().unwrap().entities;
    first.step(10).unwrap();
    first.create_agent(AgentParams::new().aged(30.0)).unwrap();
    assert_ne!(first.store().len(), second.store().len());
    assert_eq!(second.snapshot().unwrap().entities, frozen);

    // A clone shares the slot, so the second world sees the newer save.
    first.save(&store.clone()).unwrap();
    second.load(&store).unwrap();
    assert_same_state(&first, &second);
}

#[test]
fn loaded_world_keeps_its_own_config() {
    let store = MemorySnapshotStore::new(SnapshotFormat::Bincode);
    populated(8).save(&store).unwrap();

    let mut config = SimulationConfig::default();
    config.reproduction.cooldown = 9.0;
    let mut world = WorldSimulation::new(config).unwrap();
    world.load(&store).unwrap();
    assert_eq!(world.config().reproduction.cooldown, 9.0);
}

#[test]
fn concurrent_instances_saving_to_one_file() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path().join("shared.bin"));
    let worlds = [populated(31), populated(32)];
    let populations: Vec<usize> = worlds.iter().map(|w| w.store().len()).collect();

    std::thread::scope(|scope| {
        for world in worlds {
            let store = store.clone();
            scope.spawn(move || {
                for _ in 0..40 {
                    world.save(&store).unwrap();
                }
            });
        }
    });

    let mut loaded = WorldSimulation::new(SimulationConfig::default()).unwrap();
    let report = loaded.load(&store).unwrap();
    assert!(populations.contains(&report.population));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
