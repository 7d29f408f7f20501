use std::collections::BTreeMap;

use growroom_engine::{
    DistributionPolicy, EditSession, EngineError, Room, RoomConfig, RowGroup, WriteMode,
    allocate, distribute, load_batch, parse_strain_requests, slot_key, summarize,
};

fn flower_room(tables: u32, lights: u32, plants_per_light: u32) -> Room {
    Room::new(RoomConfig::uniform(tables, lights, plants_per_light).unwrap())
}

fn ids(prefix: &str, n: usize) -> String {
    (0..n).map(|i| format!("{prefix}{i}\n")).collect()
}

#[test]
fn allocator_consumes_whole_slots_in_sequence() {
    let config = RoomConfig::uniform(5, 4, 15).unwrap();
    let requests = parse_strain_requests("A: 100\nB: 50").unwrap();
    let dist = allocate(&config, &requests);

    assert_eq!(dist.slots_used(), 11);
    assert_eq!(
        dist.usage_totals(),
        BTreeMap::from([("A".to_string(), 105), ("B".to_string(), 60)])
    );
    let strains: Vec<&str> = config
        .all_slots()
        .take(12)
        .map(|key| {
            dist.mapping
                .get(&key)
                .and_then(|slot| slot.strain_name.as_deref())
                .unwrap_or("")
        })
        .collect();
    assert_eq!(
        strains,
        ["A", "A", "A", "A", "A", "A", "A", "B", "B", "B", "B", ""]
    );
}

#[test]
fn allocator_exhaustion_reports_shortfall_not_error() {
    let config = RoomConfig::per_table(vec![3, 3], 15).unwrap();
    let requests = parse_strain_requests("A: 100\nB: 50").unwrap();
    let dist = allocate(&config, &requests);
    assert_eq!(dist.slots_used(), 6);
    assert_eq!(dist.total_for("A"), 90);
    assert_eq!(dist.total_for("B"), 0);
    assert_eq!(dist.totals[1].shortfall(), 50);
}

#[test]
fn uniqueness_holds_across_a_sequence_of_commits() {
    let mut room = flower_room(2, 3, 6);
    distribute(&mut room, "OG: 18\nHaze: 18", DistributionPolicy::RefuseIfAssigned).unwrap();

    let attempts = [
        (0, 0, "P0\nP1\nP2\n", true),
        (0, 1, "P2\nP3\n", false),
        (1, 0, "P4\nP5\nP6\nP7\nP8\nP9\nP10\n", true),
        (1, 2, "P9\nP11\n", false),
        (0, 0, "P1\nP0\n", true),
    ];
    for (table, light, batch, accepted) in attempts {
        let mut session = EditSession::new(room.config(), table, light, WriteMode::FullSlot).unwrap();
        session.load_batch(batch);
        match session.commit(&mut room) {
            Ok(_) => assert!(accepted, "commit to {table}-{light} should be refused"),
            Err(err) => {
                assert!(!accepted, "commit to {table}-{light} failed: {err}");
                assert!(matches!(err, EngineError::Validation { .. }));
            }
        }
        assert!(
            room.identifier_index().collisions().is_empty(),
            "identifier shared between slots after committing to {table}-{light}"
        );
    }
    assert_eq!(room.locate_plant("P3"), None);
    assert_eq!(room.locate_plant("P0").unwrap().position, 1);
    assert_eq!(room.locate_plant("P9").unwrap().slot, slot_key(1, 0));
    assert_eq!(room.locate_plant("P10"), None);
    assert_eq!(room.locate_plant("P2").unwrap().position, 2);
}

#[test]
fn failed_commit_leaves_plant_ids_unchanged() {
    let mut room = flower_room(1, 2, 4);
    let mut owner = EditSession::new(room.config(), 0, 0, WriteMode::FullSlot).unwrap();
    owner.set_cell(0, "TAKEN").unwrap();
    owner.commit(&mut room).unwrap();
    let before = room.slots().clone();

    let mut session = EditSession::new(room.config(), 0, 1, WriteMode::FullSlot).unwrap();
    session.set_cell(0, "UNIQUE").unwrap();
    session.set_cell(1, "TAKEN").unwrap();
    let report = session.validate(&room);
    assert_eq!(report.flags(), [true, false, true, true]);

    let err = session.commit(&mut room).unwrap_err();
    assert!(matches!(err, EngineError::Validation { ref invalid } if invalid.len() == 1));
    assert_eq!(room.slots(), &before);
}

#[test]
fn row_groups_commute_for_disjoint_identifiers() {
    let run = |order: [RowGroup; 2]| {
        let mut room = flower_room(1, 1, 7);
        let mut session = EditSession::new(room.config(), 0, 0, WriteMode::TwoRows).unwrap();
        for group in order {
            session.set_row_group(group);
            let prefix = match group {
                RowGroup::First => "F",
                RowGroup::Second => "S",
            };
            session.load_batch(&ids(prefix, 4));
            session.commit(&mut room).unwrap();
        }
        room.slot(slot_key(0, 0)).unwrap().plant_ids.clone()
    };
    let forward = run([RowGroup::First, RowGroup::Second]);
    let backward = run([RowGroup::Second, RowGroup::First]);
    assert_eq!(forward, backward);
    assert_eq!(forward, ["F0", "F1", "F2", "F3", "S0", "S1", "S2"]);
}

#[test]
fn aggregator_total_matches_chunk_cells() {
    let mut room = flower_room(3, 3, 5);
    distribute(
        &mut room,
        "Gelato: 12\nRuntz: 20\nZkittlez: 3",
        DistributionPolicy::RefuseIfAssigned,
    )
    .unwrap();
    let mut patched = serde_json::to_value(&room).unwrap();
    patched["strainAssignments"]["2-2"] =
        serde_json::json!({"chunk": ["Runtz", ["Gelato", "Runtz"], null, "", "Runtz"]});
    let room: Room = serde_json::from_value(patched).unwrap();

    let cells: usize = room
        .slots()
        .values()
        .map(|slot| slot.chunk_strains().count())
        .sum();
    let summary = summarize(&room);
    assert_eq!(usize::try_from(summary.total_plants()).unwrap(), cells);
    assert_eq!(summary.strain("Runtz").unwrap().lights_spanned, 5);
    assert_eq!(summary.strain("Gelato").unwrap().total_plants, 16);
}

#[test]
fn batch_overflow_keeps_first_lines_in_file_order() {
    let text = ids("B", 20);
    let batch = load_batch(&text, 15);
    assert_eq!(batch.dropped, 5);
    assert_eq!(batch.values.len(), 15);
    assert_eq!(batch.values[0], "B0");
    assert_eq!(batch.values[14], "B14");
    assert!(!batch.values.iter().any(|v| v == "B15"));
}
