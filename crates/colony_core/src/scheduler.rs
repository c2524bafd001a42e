//! Once-per-turn orchestration of every AI unit.
//!
//! Missions never replace themselves (apart from explicit hand-offs); the
//! [`TurnScheduler`] does. Each turn it syncs the registry with the world,
//! refreshes colony wishes, replaces invalid missions through a
//! [`MissionChooser`], hands waiting cargo to carriers and finally gives
//! every mission one step, in unit handle order.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::{AiRegistry, GoodsLocation};
use crate::config::AiConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::ids::{PlayerId, UnitId};
use crate::map::TilePos;
use crate::missions::seek_and_destroy::find_target;
use crate::missions::transport::turn_distance;
use crate::missions::{
    BuildColonyMission, CashInTreasureTrainMission, DefendSettlementMission,
    IdleAtSettlementMission, IndianDemandMission, Mission, MissionContext, SeekAndDestroyMission,
    TransportMission, UnitMission, WanderHostileMission, WishRealizationMission,
    WorkInsideColonyMission,
};
use crate::player::{PlayerKind, TensionLevel};
use crate::rng::AiRng;
use crate::transportable::{carrier_point, TransportableRef};
use crate::unit::{Location, Unit};
use crate::world::World;

// ============================================================================
// Mission choice
// ============================================================================

/// Picks a mission for a unit that has none (or an invalid one).
pub trait MissionChooser {
    /// A fresh mission for `unit`, or `None` to leave it without one.
    fn choose(
        &mut self,
        world: &World,
        ai: &AiRegistry,
        unit: UnitId,
        config: &AiConfig,
        rng: &mut AiRng,
    ) -> Option<Mission>;
}

/// Default policy.
///
/// - Workers already inside a colony keep working there.
/// - Ships with a hold transport, treasure trains cash in.
/// - Native units extort a nearby colony whose owner they resent (one turn
///   in three), attack when a target is in range, wander if armed and
///   otherwise idle.
/// - European colonists found colonies while there are few, then answer
///   the best worker wish, then fill the nearest vacancy.
/// - European soldiers man under-defended colonies, then hunt.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMissionChooser;

impl StandardMissionChooser {
    fn native(world: &World, unit: &Unit, config: &AiConfig, rng: &mut AiRng) -> Option<Mission> {
        let here = world.unit_tile(unit.id)?;
        let natives = world.player(unit.owner)?;
        let resented = world
            .settlements()
            .filter(|s| s.is_colony() && here.distance(s.tile) <= config.search_range)
            .map(|s| (natives.tension_towards(s.owner).level(), s))
            .filter(|(level, _)| *level > TensionLevel::Content)
            .max_by_key(|(level, s)| (*level, Reverse(here.distance(s.tile)), Reverse(s.id)))
            .map(|(_, s)| s.id);
        if let Some(colony) = resented {
            if rng.next_below(3) == 0 {
                if let Ok(mission) = IndianDemandMission::new(world, unit.id, colony) {
                    return Some(Mission::IndianDemand(mission));
                }
            }
        }
        if unit.is_offensive() {
            if let Some((target, _)) = find_target(world, unit.id, config.seek_and_destroy_range) {
                if let Ok(mission) = SeekAndDestroyMission::new(world, unit.id, target) {
                    return Some(Mission::SeekAndDestroy(mission));
                }
            }
            if unit.armed || unit.mounted {
                return WanderHostileMission::new(world, unit.id).ok().map(Mission::WanderHostile);
            }
        }
        Some(Mission::IdleAtSettlement(IdleAtSettlementMission::for_unit(unit.id)))
    }

    fn colonist(world: &World, ai: &AiRegistry, unit: &Unit, config: &AiConfig) -> Option<Mission> {
        let here = world.unit_tile(unit.id);
        if world.colony_count(unit.owner) < config.few_colonies {
            return BuildColonyMission::new(world, unit.id).ok().map(Mission::BuildColony);
        }
        let wish = ai
            .wishes()
            .filter(|w| w.is_outstanding())
            .filter(|w| world.settlement(w.colony).is_some_and(|s| s.owner == unit.owner))
            .filter(|w| match w.kind {
                crate::ai::WishKind::Worker { unit_type } => unit_type.map_or(true, |t| t == unit.unit_type),
                crate::ai::WishKind::Goods { .. } => false,
            })
            .max_by_key(|w| (w.value, Reverse(w.id)));
        if let Some(wish) = wish {
            if let Ok(mission) = WishRealizationMission::new(world, ai, unit.id, wish.id) {
                return Some(Mission::WishRealization(mission));
            }
        }
        let vacancy = world
            .colonies_of(unit.owner)
            .filter(|s| s.vacancies() > 0)
            .min_by_key(|s| (here.map_or(0, |h| h.distance(s.tile)), s.id))
            .map(|s| s.id);
        if let Some(colony) = vacancy {
            return WorkInsideColonyMission::new(world, unit.id, colony).ok().map(Mission::WorkInsideColony);
        }
        BuildColonyMission::new(world, unit.id).ok().map(Mission::BuildColony)
    }

    fn soldier(world: &World, unit: &Unit, config: &AiConfig) -> Option<Mission> {
        let here = world.unit_tile(unit.id);
        let exposed = world
            .colonies_of(unit.owner)
            .filter(|s| world.defender_count(s.id) < config.minimum_defenders)
            .min_by_key(|s| (here.map_or(0, |h| h.distance(s.tile)), s.id))
            .map(|s| s.id);
        if let Some(colony) = exposed {
            if let Ok(mission) = DefendSettlementMission::new(world, unit.id, colony) {
                return Some(Mission::DefendSettlement(mission));
            }
        }
        if let Some((target, _)) = find_target(world, unit.id, config.seek_and_destroy_range) {
            if let Ok(mission) = SeekAndDestroyMission::new(world, unit.id, target) {
                return Some(Mission::SeekAndDestroy(mission));
            }
        }
        Some(Mission::IdleAtSettlement(IdleAtSettlementMission::for_unit(unit.id)))
    }
}

impl MissionChooser for StandardMissionChooser {
    fn choose(
        &mut self,
        world: &World,
        ai: &AiRegistry,
        unit: UnitId,
        config: &AiConfig,
        rng: &mut AiRng,
    ) -> Option<Mission> {
        let u = world.unit(unit)?;
        if let Location::Working(colony) = u.location {
            return WorkInsideColonyMission::new(world, unit, colony).ok().map(Mission::WorkInsideColony);
        }
        if u.is_carrier() {
            return TransportMission::new(world, unit).ok().map(Mission::Transport);
        }
        if u.is_treasure_train() {
            return CashInTreasureTrainMission::new(world, unit).ok().map(Mission::CashInTreasureTrain);
        }
        let native = world.player(u.owner).is_some_and(|p| p.kind == PlayerKind::Native);
        if native {
            return Self::native(world, u, config, rng);
        }
        if u.unit_type.is_colonist() && !u.armed {
            return Self::colonist(world, ai, u, config);
        }
        if u.is_offensive() && !u.is_naval() {
            return Self::soldier(world, u, config);
        }
        Some(Mission::IdleAtSettlement(IdleAtSettlementMission::for_unit(unit)))
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// What happened during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Turn number, starting at 0.
    pub turn: u32,
    /// Missions that got a step.
    pub missions_run: usize,
    /// Missions assigned in place of invalid or missing ones.
    pub missions_replaced: usize,
    /// AI units dropped because their unit is gone.
    pub units_dropped: usize,
    /// Items newly scheduled on a carrier.
    pub transports_assigned: usize,
    /// Requests the server refused.
    pub failed_requests: usize,
    /// Mission steps that ended in an error.
    pub mission_errors: usize,
}

/// Drives the AI players through their turns.
#[derive(Debug, Clone)]
pub struct TurnScheduler<C = StandardMissionChooser> {
    config: AiConfig,
    players: Vec<PlayerId>,
    chooser: C,
    turn: u32,
}

impl TurnScheduler<StandardMissionChooser> {
    /// Scheduler for `players` with the default mission policy.
    #[must_use]
    pub fn new(config: AiConfig, players: Vec<PlayerId>) -> Self {
        Self::with_chooser(config, players, StandardMissionChooser)
    }
}

impl<C: MissionChooser> TurnScheduler<C> {
    /// Scheduler with a custom mission policy.
    pub fn with_chooser(config: AiConfig, players: Vec<PlayerId>, chooser: C) -> Self {
        Self {
            config,
            players,
            chooser,
            turn: 0,
        }
    }

    /// Tuning constants.
    #[must_use]
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Players under AI control.
    #[must_use]
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    /// Number of turns run so far.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Run one AI turn.
    pub fn run_turn(
        &mut self,
        world: &mut World,
        ai: &mut AiRegistry,
        connection: &mut dyn Connection,
        rng: &mut AiRng,
    ) -> Result<TurnReport> {
        let mut report = TurnReport {
            turn: self.turn,
            ..TurnReport::default()
        };

        report.units_dropped = self.sync_units(world, ai);
        for &player in &self.players {
            if world.player(player).is_some_and(|p| p.is_european()) {
                ai.refresh_wishes(world, player, &self.config);
            }
        }
        report.missions_replaced = self.replace_missions(world, ai, rng);
        report.transports_assigned = self.assign_transport(world, ai);

        for unit in ai.unit_ids() {
            if !world.has_unit(unit) {
                continue;
            }
            let Some(mut mission) = ai.take_mission(unit) else {
                continue;
            };
            let mut ctx = MissionContext::new(world, ai, &mut *connection, &self.config, rng);
            let outcome = mission.do_mission(&mut ctx);
            report.failed_requests += ctx.failed_requests;
            report.missions_run += 1;
            if let Err(error) = outcome {
                warn!(%unit, mission = mission.name(), %error, "mission step failed");
                report.mission_errors += 1;
            }
            ai.restore_mission(unit, mission);
        }

        info!(
            turn = report.turn,
            run = report.missions_run,
            replaced = report.missions_replaced,
            assigned = report.transports_assigned,
            failed = report.failed_requests,
            "AI turn complete"
        );
        self.turn += 1;
        Ok(report)
    }

    /// Register new units of the AI players and drop AI units whose unit is
    /// gone. Returns how many were dropped.
    fn sync_units(&self, world: &World, ai: &mut AiRegistry) -> usize {
        let fresh: Vec<UnitId> = world
            .units()
            .filter(|u| self.players.contains(&u.owner) && ai.ai_unit(u.id).is_none())
            .map(|u| u.id)
            .collect();
        for unit in fresh {
            ai.register_unit(unit);
        }

        let gone: Vec<UnitId> = ai.unit_ids().into_iter().filter(|u| !world.has_unit(*u)).collect();
        for unit in &gone {
            if let Some(mut mission) = ai.take_mission(*unit) {
                mission.dispose(world, ai);
            }
            ai.remove_unit(*unit);
            debug!(%unit, "AI unit dropped");
        }
        gone.len()
    }

    fn replace_missions(&mut self, world: &World, ai: &mut AiRegistry, rng: &mut AiRng) -> usize {
        let mut replaced = 0;
        for unit in ai.unit_ids() {
            let reason = match ai.mission(unit) {
                Some(mission) => match mission.invalid_reason(world, ai) {
                    Some(reason) => Some(reason.to_string()),
                    None => continue,
                },
                None => None,
            };
            if let Some(mut old) = ai.take_mission(unit) {
                old.dispose(world, ai);
            }
            let Some(mission) = self.chooser.choose(world, ai, unit, &self.config, rng) else {
                continue;
            };
            debug!(
                %unit,
                reason = reason.as_deref().unwrap_or("none"),
                mission = mission.name(),
                "mission assigned"
            );
            if let Mission::WishRealization(m) = &mission {
                if let Some(wish) = ai.wish_mut(m.wish()) {
                    wish.transportable = Some(TransportableRef::Unit(unit));
                }
            }
            ai.set_mission(unit, mission);
            replaced += 1;
        }
        replaced
    }

    /// Whether an item is waiting for a carrier to be assigned.
    fn is_waiting(world: &World, ai: &AiRegistry, item: TransportableRef) -> bool {
        if item.transport(ai).is_some() {
            return false;
        }
        let placed = match item {
            TransportableRef::Unit(id) => world
                .unit(id)
                .is_some_and(|u| !u.is_carrier() && matches!(u.location, Location::Tile(_) | Location::Europe)),
            TransportableRef::Goods(id) => ai
                .goods(id)
                .is_some_and(|g| matches!(g.location, GoodsLocation::Settlement(_))),
        };
        placed && item.destination(world, ai).is_some()
    }

    fn item_owner(world: &World, ai: &AiRegistry, item: TransportableRef) -> Option<PlayerId> {
        match item {
            TransportableRef::Unit(id) => world.unit(id).map(|u| u.owner),
            TransportableRef::Goods(id) => match ai.goods(id)?.location {
                GoodsLocation::Settlement(s) => world.settlement(s).map(|s| s.owner),
                GoodsLocation::Carrier(c) => world.unit(c).map(|u| u.owner),
                GoodsLocation::Europe => None,
            },
        }
    }

    /// Hand waiting items to carriers, most urgent first, each to the
    /// nearest carrier of its owner with room to spare.
    fn assign_transport(&self, world: &World, ai: &mut AiRegistry) -> usize {
        let mut waiting: Vec<(u32, TransportableRef)> = ai
            .transportables()
            .into_iter()
            .filter(|item| Self::is_waiting(world, ai, *item))
            .map(|item| (item.priority(ai), item))
            .collect();
        waiting.sort_by_key(|(priority, item)| (Reverse(*priority), *item));

        let mut assigned = 0;
        for (priority, item) in waiting {
            let (Some(owner), Some(source)) = (Self::item_owner(world, ai, item), item.source(world, ai)) else {
                continue;
            };
            let entry = world.player(owner).map_or(TilePos::new(0, 0), |p| p.entry_location);
            let carrier = ai
                .ai_units()
                .filter_map(|a| match &a.mission {
                    Some(Mission::Transport(t)) => Some((a.unit, t)),
                    _ => None,
                })
                .filter_map(|(id, t)| {
                    let c = world.unit(id)?;
                    if c.owner != owner || c.is_sailing() {
                        return None;
                    }
                    let free = world.space_left(id).saturating_sub(t.reserved_space(world, ai));
                    if free < item.space_taken(world) {
                        return None;
                    }
                    let at = carrier_point(world, id)?;
                    Some((turn_distance(at, source, entry, c.max_moves(), self.config.sail_turns), id))
                })
                .min()
                .map(|(_, id)| id);
            let Some(carrier) = carrier else {
                continue;
            };
            let Some(Mission::Transport(mut transport)) = ai.take_mission(carrier) else {
                continue;
            };
            match transport.add_to_transport_list(world, ai, &self.config, item) {
                Ok(true) => {
                    debug!(%carrier, %item, priority, "transport assigned");
                    assigned += 1;
                }
                Ok(false) => {}
                Err(error) => warn!(%carrier, %item, %error, "transport refused"),
            }
            ai.restore_mission(carrier, Mission::Transport(transport));
        }
        assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RecordingConnection;
    use crate::map::{GameMap, Terrain};
    use crate::server::LocalServer;
    use crate::settlement::{ColonyData, SettlementKind};
    use crate::unit::UnitType;

    fn channel() -> World {
        let mut map = GameMap::new(10, 5, Terrain::Plains);
        for y in 0..5 {
            map.set_terrain(TilePos::new(4, y), Terrain::Ocean);
        }
        World::new(map)
    }

    #[test]
    fn test_chooser_matches_unit_kinds() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 1)));
        let treasure = world.spawn_unit(dutch, UnitType::TreasureTrain, Location::Tile(TilePos::new(1, 1)));
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(2, 2)));
        let ai = AiRegistry::new();
        let config = AiConfig::default();
        let mut rng = AiRng::new(3);
        let mut chooser = StandardMissionChooser;
        let mut choose = |unit| chooser.choose(&world, &ai, unit, &config, &mut rng).map(|m| m.name());
        assert_eq!(choose(ship), Some(TransportMission::NAME));
        assert_eq!(choose(treasure), Some(CashInTreasureTrainMission::NAME));
        assert_eq!(choose(colonist), Some(BuildColonyMission::NAME));
    }

    #[test]
    fn test_soldier_mans_exposed_colony() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colony = world.found_settlement(dutch, TilePos::new(2, 2), "Fort", SettlementKind::Colony(ColonyData::new(2)));
        let soldier = world.spawn_unit(dutch, UnitType::Artillery, Location::Tile(TilePos::new(1, 1)));
        let mission = StandardMissionChooser
            .choose(&world, &AiRegistry::new(), soldier, &AiConfig::default(), &mut AiRng::new(1))
            .unwrap();
        assert!(matches!(mission, Mission::DefendSettlement(m) if m.settlement() == colony));
    }

    #[test]
    fn test_drops_disposed_units() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(2, 2)));
        let mut ai = AiRegistry::new();
        let mut scheduler = TurnScheduler::new(AiConfig::default(), vec![dutch]);
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(1);

        let first = scheduler.run_turn(&mut world, &mut ai, &mut connection, &mut rng).unwrap();
        assert_eq!(first.missions_replaced, 1);
        assert!(ai.mission(colonist).is_some());

        world.dispose_unit(colonist);
        let second = scheduler.run_turn(&mut world, &mut ai, &mut connection, &mut rng).unwrap();
        assert_eq!(second.units_dropped, 1);
        assert_eq!(second.turn, 1);
        assert!(ai.ai_unit(colonist).is_none());
    }

    #[test]
    fn test_wish_realized_by_ferry() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 2)));
        let east = world.found_settlement(dutch, TilePos::new(5, 2), "East", SettlementKind::Colony(ColonyData::new(1)));
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 2)));
        let config = AiConfig {
            few_colonies: 0,
            ..AiConfig::default()
        };
        let mut ai = AiRegistry::new();
        let mut scheduler = TurnScheduler::new(config, vec![dutch]);
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(9);

        let report = scheduler.run_turn(&mut world, &mut ai, &mut connection, &mut rng).unwrap();
        assert_eq!(report.transports_assigned, 1);
        assert_eq!(world.unit(colonist).unwrap().location, Location::Working(east));
        assert!(ai.wishes().all(|w| w.colony != east || w.kind != crate::ai::WishKind::Worker { unit_type: None }));
        assert!(matches!(ai.mission(colonist), Some(Mission::WorkInsideColony(_))));
    }
}
