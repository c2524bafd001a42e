//! Saved missions rebuild exactly, and missions whose target is gone stop
//! acting at once.

use colony_core::ai::AiRegistry;
use colony_core::config::AiConfig;
use colony_core::connection::RecordingConnection;
use colony_core::ids::{PlayerId, SettlementId, UnitId};
use colony_core::map::TilePos;
use colony_core::missions::{InvalidReason, Mission, MissionContext, Target, UnitMission};
use colony_core::persistence::MissionRecord;
use colony_core::player::Stance;
use colony_core::rng::AiRng;
use colony_core::server::LocalServer;
use colony_core::unit::UnitType;
use colony_core::world::World;
use colony_test_utils::fixtures::WorldBuilder;

struct Scene {
    world: World,
    dutch: PlayerId,
    sioux: PlayerId,
    colony: SettlementId,
    colonist: UnitId,
    soldier: UnitId,
    brave: UnitId,
}

fn scene() -> Scene {
    let mut builder = WorldBuilder::land(12, 8);
    let dutch = builder.european("Dutch", TilePos::new(0, 0), 100);
    let sioux = builder.natives("Sioux", &[(dutch, 300)]);
    let colony = builder.colony(dutch, TilePos::new(3, 3), 2);
    builder.camp(sioux, TilePos::new(9, 5));
    let colonist = builder.unit(dutch, UnitType::FreeColonist, TilePos::new(5, 2));
    let soldier = builder.unit(dutch, UnitType::VeteranSoldier, TilePos::new(3, 3));
    let brave = builder.unit(sioux, UnitType::Brave, TilePos::new(8, 5));
    if let Some(unit) = builder.world_mut().unit_mut(soldier) {
        unit.armed = true;
    }
    Scene {
        world: builder.build(),
        dutch,
        sioux,
        colony,
        colonist,
        soldier,
        brave,
    }
}

fn round_trip(world: &World, record: &MissionRecord) -> Mission {
    let json = serde_json::to_string(record).unwrap();
    let parsed: MissionRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(&parsed, record);
    parsed.restore(world).unwrap()
}

#[test]
fn test_records_rebuild_units_targets_and_flags() {
    let s = scene();
    let records = [
        MissionRecord::BuildColony {
            unit: s.colonist,
            target: Some(TilePos::new(7, 2)),
            colony_value: 42,
            do_not_give_up: true,
            colony_built: false,
        },
        MissionRecord::BuildColony {
            unit: s.colonist,
            target: None,
            colony_value: 0,
            do_not_give_up: false,
            colony_built: true,
        },
        MissionRecord::IndianDemand {
            unit: s.brave,
            colony: s.colony,
            completed: true,
        },
        MissionRecord::IndianDemand {
            unit: s.brave,
            colony: s.colony,
            completed: false,
        },
        MissionRecord::SeekAndDestroy {
            unit: s.soldier,
            target: Target::Unit(s.brave),
        },
        MissionRecord::SeekAndDestroy {
            unit: s.brave,
            target: Target::Settlement(s.colony),
        },
        MissionRecord::SeekAndDestroy {
            unit: s.soldier,
            target: Target::Tile(TilePos::new(6, 6)),
        },
        MissionRecord::DefendSettlement {
            unit: s.soldier,
            settlement: s.colony,
        },
        MissionRecord::WanderHostile { unit: s.brave },
        MissionRecord::IdleAtSettlement { unit: s.brave },
        MissionRecord::WorkInsideColony {
            unit: s.colonist,
            colony: s.colony,
        },
    ];

    for record in &records {
        let mission = round_trip(&s.world, record);
        assert_eq!(&MissionRecord::capture(&mission), record);
        assert_eq!(mission.name(), record.element_name());
    }
}

fn assert_inert(world: &mut World, mut mission: Mission) {
    let mut ai = AiRegistry::new();
    let config = AiConfig::default();
    let mut connection = RecordingConnection::new(LocalServer::default());
    let mut rng = AiRng::new(9);
    let mut ctx = MissionContext::new(world, &mut ai, &mut connection, &config, &mut rng);
    mission.do_mission(&mut ctx).unwrap();
    assert_eq!(connection.requests().count(), 0);
}

#[test]
fn test_defender_of_lost_settlement_stops() {
    let mut s = scene();
    let mission = round_trip(
        &s.world,
        &MissionRecord::DefendSettlement {
            unit: s.soldier,
            settlement: s.colony,
        },
    );
    s.world.dispose_settlement(s.colony);
    assert_eq!(
        mission.invalid_reason(&s.world, &AiRegistry::new()),
        Some(InvalidReason::TargetDisposed)
    );
    assert_inert(&mut s.world, mission);
}

#[test]
fn test_hunter_of_vanished_unit_stops() {
    let mut s = scene();
    s.world.set_stance(s.dutch, s.sioux, Stance::War);
    let mission = round_trip(
        &s.world,
        &MissionRecord::SeekAndDestroy {
            unit: s.soldier,
            target: Target::Unit(s.brave),
        },
    );
    s.world.dispose_unit(s.brave);
    assert_eq!(
        mission.invalid_reason(&s.world, &AiRegistry::new()),
        Some(InvalidReason::TargetDisposed)
    );
    assert_inert(&mut s.world, mission);
}

#[test]
fn test_builder_is_done_once_colony_stands() {
    let mut s = scene();
    let mission = round_trip(
        &s.world,
        &MissionRecord::BuildColony {
            unit: s.colonist,
            target: Some(TilePos::new(5, 2)),
            colony_value: 10,
            do_not_give_up: false,
            colony_built: true,
        },
    );
    assert_eq!(
        mission.invalid_reason(&s.world, &AiRegistry::new()),
        Some(InvalidReason::ColonyBuilt)
    );
    assert_inert(&mut s.world, mission);
}
