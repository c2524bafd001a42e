//! Carrier scheduling.
//!
//! A [`TransportMission`] drives one ship through its manifest: an ordered
//! list of [`TransportableRef`]s where an item still waiting for pickup
//! holds two slots (pickup, then drop-off) and an item already aboard holds
//! one. Whether an item is aboard is always read from the live world, never
//! stored, so the manifest cannot drift from the hold.
//!
//! Each turn the carrier loads and unloads whatever it can where it stands,
//! then sails for the first stop it has not reached yet, restocking again
//! after every leg. In Europe it sells, buys and recruits before heading
//! back.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::build_colony::find_colony_location;
use super::manifest::{self, Stop};
use super::{
    path_next_to, travel, BuildColonyMission, InvalidReason, Mission, MissionContext, UnitMission,
    WishRealizationMission, WorkInsideColonyMission,
};
use crate::ai::{AiGoods, AiRegistry, GoodsLocation, Wish, WishKind};
use crate::config::AiConfig;
use crate::error::{AiError, Result};
use crate::goods::{Goods, CARGO_SIZE};
use crate::ids::{AiGoodsId, PlayerId, UnitId};
use crate::map::{Terrain, TilePos};
use crate::pathfinding::{find_path, path_to_europe, CostDecider, Path, UNLIMITED_TURNS};
use crate::protocol::{ServerRequest, ServerResponse};
use crate::transportable::{carrier_point, unit_point, TransportPoint, TransportableRef, IMPORTANT_PRIORITY};
use crate::unit::{Location, Unit, UnitType};
use crate::world::World;

/// Estimated turns between two transport points.
///
/// Tiles are `moves` tiles apart per turn. Europe is `sail_turns` away from
/// the player's entry location.
#[must_use]
pub fn turn_distance(a: TransportPoint, b: TransportPoint, entry: TilePos, moves: u32, sail_turns: u32) -> u32 {
    let legs = |tiles: u32| tiles.div_ceil(moves.max(1));
    match (a, b) {
        (TransportPoint::Europe, TransportPoint::Europe) => 0,
        (TransportPoint::Tile(x), TransportPoint::Tile(y)) => legs(x.distance(y)),
        (TransportPoint::Europe, TransportPoint::Tile(t)) | (TransportPoint::Tile(t), TransportPoint::Europe) => {
            sail_turns + legs(entry.distance(t))
        }
    }
}

/// One resolved manifest slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    item: TransportableRef,
    point: Option<TransportPoint>,
    pickup: bool,
}

/// Carry units and goods for the owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportMission {
    unit: UnitId,
    transport_list: Vec<TransportableRef>,
}

impl TransportMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "transportMission";

    /// Mission for a ship with a hold.
    pub fn new(world: &World, unit: UnitId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if !u.is_carrier() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "unit has no hold",
            });
        }
        Ok(Self {
            unit,
            transport_list: Vec::new(),
        })
    }

    /// Rebuild from saved state. Links are expected to be restored with the
    /// items themselves.
    pub(crate) fn restored(unit: UnitId, transport_list: Vec<TransportableRef>) -> Self {
        Self { unit, transport_list }
    }

    /// The manifest, one entry per slot.
    #[must_use]
    pub fn transport_list(&self) -> &[TransportableRef] {
        &self.transport_list
    }

    /// Whether an item is on the manifest.
    #[must_use]
    pub fn is_listed(&self, item: TransportableRef) -> bool {
        self.transport_list.contains(&item)
    }

    /// Hold space claimed by listed items still waiting for pickup.
    #[must_use]
    pub fn reserved_space(&self, world: &World, ai: &AiRegistry) -> u32 {
        let waiting: BTreeSet<TransportableRef> = self
            .transport_list
            .iter()
            .copied()
            .filter(|i| !i.is_aboard(world, ai, self.unit))
            .collect();
        waiting.into_iter().map(|i| i.space_taken(world)).sum()
    }

    fn slot_count(&self, item: TransportableRef) -> usize {
        self.transport_list.iter().filter(|i| **i == item).count()
    }

    fn slots(&self, world: &World, ai: &AiRegistry) -> Vec<Slot> {
        let mut seen = BTreeSet::new();
        self.transport_list
            .iter()
            .map(|&item| {
                let first = seen.insert(item);
                let pickup = first && self.slot_count(item) > 1 && !item.is_aboard(world, ai, self.unit);
                let point = if pickup {
                    item.source(world, ai)
                } else {
                    item.destination(world, ai)
                };
                Slot { item, point, pickup }
            })
            .collect()
    }

    fn owner(&self, world: &World) -> Option<PlayerId> {
        world.unit(self.unit).map(|u| u.owner)
    }

    fn hold_is_empty(&self, world: &World) -> bool {
        world.units_aboard(self.unit).next().is_none()
            && world.unit(self.unit).map_or(true, |u| u.cargo.is_empty())
    }

    // ========================================================================
    // Manifest
    // ========================================================================

    /// Schedule an item on this carrier.
    ///
    /// Returns `Ok(false)` without changing anything if the item is already
    /// listed or its pickup or destination does not resolve.
    pub fn add_to_transport_list(
        &mut self,
        world: &World,
        ai: &mut AiRegistry,
        config: &AiConfig,
        item: TransportableRef,
    ) -> Result<bool> {
        if let TransportableRef::Unit(id) = item {
            if world.unit(id).is_some_and(Unit::is_carrier) {
                return Err(AiError::CarrierAsCargo(id));
            }
        }
        if self.is_listed(item) {
            return Ok(false);
        }
        let Some(destination) = item.destination(world, ai) else {
            debug!(carrier = %self.unit, %item, "no destination, not scheduled");
            return Ok(false);
        };
        let source = if item.is_aboard(world, ai, self.unit) {
            None
        } else {
            match item.source(world, ai) {
                Some(source) => Some(source),
                None => return Ok(false),
            }
        };
        let (Some(carrier), Some(carrier_at)) = (world.unit(self.unit), carrier_point(world, self.unit)) else {
            return Ok(false);
        };
        let entry = world.player(carrier.owner).map_or(TilePos::new(0, 0), |p| p.entry_location);
        let (moves, sail_turns) = (carrier.max_moves(), config.sail_turns);

        let stops: Vec<Stop<TransportableRef, TransportPoint>> = self
            .slots(world, ai)
            .into_iter()
            .map(|s| Stop {
                item: s.item,
                point: s.point,
            })
            .collect();
        let planned = manifest::insert(&stops, item, carrier_at, source, destination, |a, b| {
            turn_distance(a, b, entry, moves, sail_turns)
        });
        self.transport_list = planned.into_iter().map(|s| s.item).collect();
        ai.set_transport(item, Some(self.unit));
        debug!(carrier = %self.unit, %item, %destination, slots = self.transport_list.len(), "scheduled");
        Ok(true)
    }

    /// Drop every slot of an item and clear its carrier link. Returns
    /// whether the item was listed.
    pub fn remove_from_transport_list(&mut self, ai: &mut AiRegistry, item: TransportableRef) -> bool {
        let before = self.transport_list.len();
        self.transport_list.retain(|i| *i != item);
        if item.transport(ai) == Some(self.unit) {
            ai.set_transport(item, None);
        }
        before != self.transport_list.len()
    }

    fn drop_pickup_slot(&mut self, item: TransportableRef) {
        if let Some(index) = self.transport_list.iter().position(|i| *i == item) {
            self.transport_list.remove(index);
        }
    }

    /// Put everything already in the hold on the manifest.
    fn repopulate(&mut self, world: &World, ai: &mut AiRegistry, config: &AiConfig) {
        let aboard: Vec<TransportableRef> = world
            .units_aboard(self.unit)
            .map(|u| TransportableRef::Unit(u.id))
            .chain(
                ai.all_goods()
                    .filter(|g| g.location == GoodsLocation::Carrier(self.unit))
                    .map(|g| TransportableRef::Goods(g.id)),
            )
            .collect();
        for item in aboard {
            if let Err(error) = self.add_to_transport_list(world, ai, config, item) {
                debug!(carrier = %self.unit, %item, %error, "cannot list cargo");
            }
        }
    }

    // ========================================================================
    // Loading and unloading
    // ========================================================================

    /// Whether a passenger can get off here and make its own way.
    fn passenger_can_leave(world: &World, passenger: UnitId, here: TransportPoint, destination: Option<TransportPoint>) -> bool {
        match (destination, here) {
            (None, TransportPoint::Europe) => true,
            (None, TransportPoint::Tile(h)) => {
                let owner = world.unit(passenger).map(|u| u.owner);
                world.settlement_at(h).is_some_and(|s| Some(s.owner) == owner)
            }
            (Some(point), _) if point == here => true,
            (Some(TransportPoint::Tile(t)), TransportPoint::Tile(h)) => {
                world.map.is_land(t) && find_path(world, passenger, h, t, None, CostDecider::AvoidIllegal).is_some()
            }
            _ => false,
        }
    }

    /// Whether the carrier stands where a slot is served.
    fn at_stop(&self, world: &World, ai: &AiRegistry, slot: Slot, here: TransportPoint) -> bool {
        let Some(point) = slot.point else {
            return false;
        };
        match (slot.item, slot.pickup) {
            (TransportableRef::Unit(_), true) => match (point, here) {
                (TransportPoint::Tile(s), TransportPoint::Tile(h)) => s.distance(h) <= 1,
                _ => point == here,
            },
            (TransportableRef::Unit(u), false) => {
                slot.item.is_aboard(world, ai, self.unit) && Self::passenger_can_leave(world, u, here, Some(point))
            }
            (TransportableRef::Goods(_), _) => point == here,
        }
    }

    /// Unload, load, and unload again whatever can leave straight away.
    fn restock(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        self.unload_cargo(ctx)?;
        if self.load_cargo(ctx) {
            self.unload_cargo(ctx)?;
        }
        Ok(())
    }

    /// Forget items that are gone or no longer need this carrier.
    fn prune(&mut self, world: &World, ai: &mut AiRegistry) {
        let stale: BTreeSet<TransportableRef> = self
            .transport_list
            .iter()
            .copied()
            .filter(|item| {
                !item.exists(world, ai)
                    || (!item.is_aboard(world, ai, self.unit)
                        && (self.slot_count(*item) < 2 || item.destination(world, ai).is_none()))
            })
            .collect();
        for item in stale {
            debug!(carrier = %self.unit, %item, "dropping stale cargo");
            self.remove_from_transport_list(ai, item);
        }
    }

    /// Let passengers off and deliver goods whose stop has been reached.
    fn unload_cargo(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        let Some(here) = unit_point(ctx.world, self.unit) else {
            return Ok(());
        };
        let items: Vec<TransportableRef> = self.transport_list.clone();
        for item in items {
            if !self.is_listed(item) || !item.is_aboard(ctx.world, ctx.ai, self.unit) {
                continue;
            }
            let destination = item.destination(ctx.world, ctx.ai);
            match item {
                TransportableRef::Unit(passenger) => {
                    if !Self::passenger_can_leave(ctx.world, passenger, here, destination) {
                        continue;
                    }
                    self.deliver_unit(ctx, passenger)?;
                    if !item.is_aboard(ctx.world, ctx.ai, self.unit) {
                        debug!(carrier = %self.unit, unit = %passenger, "passenger delivered");
                        self.remove_from_transport_list(ctx.ai, item);
                    }
                }
                TransportableRef::Goods(id) => {
                    let Some(goods) = ctx.ai.goods(id).map(|g| g.goods) else {
                        self.remove_from_transport_list(ctx.ai, item);
                        continue;
                    };
                    if destination != Some(here) {
                        continue;
                    }
                    let request = match here {
                        TransportPoint::Europe => ServerRequest::SellGoods {
                            carrier: self.unit,
                            goods,
                        },
                        TransportPoint::Tile(_) => ServerRequest::UnloadCargo {
                            carrier: self.unit,
                            goods,
                        },
                    };
                    if !ctx.send(request) {
                        continue;
                    }
                    let satisfied: Vec<_> = ctx
                        .ai
                        .wishes()
                        .filter(|w| w.transportable == Some(item))
                        .map(|w| w.id)
                        .collect();
                    for wish in satisfied {
                        ctx.ai.remove_wish(wish);
                    }
                    self.remove_from_transport_list(ctx.ai, item);
                    ctx.ai.dispose_goods(id);
                    debug!(carrier = %self.unit, goods = %id, at = %here, "goods delivered");
                }
            }
        }
        Ok(())
    }

    /// Set a passenger down (in port or in Europe) and let its own mission
    /// take over.
    fn deliver_unit(&self, ctx: &mut MissionContext<'_>, passenger: UnitId) -> Result<()> {
        let docked = match ctx.world.unit(self.unit).map(|c| c.location) {
            Some(Location::Europe) => true,
            Some(Location::Tile(tile)) => ctx.world.map.is_land(tile),
            _ => false,
        };
        if docked {
            ctx.send(ServerRequest::Disembark { unit: passenger });
        }
        if let Some(mut mission) = ctx.ai.take_mission(passenger) {
            let outcome = mission.do_mission(ctx);
            ctx.ai.restore_mission(passenger, mission);
            outcome?;
        }
        Ok(())
    }

    /// Pick up everything waiting where the carrier stands.
    fn load_cargo(&mut self, ctx: &mut MissionContext<'_>) -> bool {
        let Some(here) = unit_point(ctx.world, self.unit) else {
            return false;
        };
        let mut any = false;
        let pending: Vec<Slot> = self
            .slots(ctx.world, ctx.ai)
            .into_iter()
            .filter(|s| s.pickup)
            .collect();
        for slot in pending {
            if !self.at_stop(ctx.world, ctx.ai, slot, here)
                || ctx.world.space_left(self.unit) < slot.item.space_taken(ctx.world)
            {
                continue;
            }
            let loaded = match slot.item {
                TransportableRef::Unit(unit) => ctx.send(ServerRequest::BoardShip {
                    unit,
                    carrier: self.unit,
                }),
                TransportableRef::Goods(id) => {
                    let Some(lot) = ctx.ai.goods(id).cloned() else {
                        continue;
                    };
                    let request = match lot.location {
                        GoodsLocation::Europe => ServerRequest::BuyGoods {
                            carrier: self.unit,
                            goods_type: lot.goods.goods_type,
                            amount: lot.goods.amount,
                        },
                        GoodsLocation::Settlement(_) => ServerRequest::LoadCargo {
                            carrier: self.unit,
                            goods: lot.goods,
                        },
                        GoodsLocation::Carrier(_) => continue,
                    };
                    let ok = ctx.send(request);
                    if let (true, Some(g)) = (ok, ctx.ai.goods_mut(id)) {
                        g.location = GoodsLocation::Carrier(self.unit);
                    }
                    ok
                }
            };
            if loaded {
                debug!(carrier = %self.unit, item = %slot.item, at = %here, "loaded");
                self.drop_pickup_slot(slot.item);
                any = true;
            }
        }
        any
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// First slot the carrier still has to sail to.
    fn next_stop(&self, world: &World, ai: &AiRegistry) -> Option<Slot> {
        let here = unit_point(world, self.unit)?;
        self.slots(world, ai)
            .into_iter()
            .find(|slot| slot.point.is_some() && !self.at_stop(world, ai, *slot, here))
    }

    /// Where the carrier has to be to serve a slot on `tile`.
    fn approach(&self, world: &World, slot: Slot, tile: TilePos) -> Option<Path> {
        let here = world.unit_tile(self.unit)?;
        let owner = self.owner(world)?;
        let target = match slot.item {
            TransportableRef::Unit(passenger) if !slot.pickup && world.map.is_land(tile) => {
                // sail to where the passenger would step ashore
                let path = find_path(world, passenger, here, tile, Some(self.unit), CostDecider::AvoidIllegal)?;
                let drop = path.steps.iter().position(|s| s.transport_drop)?;
                if drop == 0 {
                    path.start
                } else {
                    path.steps[drop - 1].tile
                }
            }
            _ => tile,
        };
        let enterable = world.map.is_water(target) || world.settlement_at(target).is_some_and(|s| s.owner == owner);
        if enterable {
            find_path(world, self.unit, here, target, None, CostDecider::AvoidIllegal)
        } else {
            path_next_to(world, self.unit, target, CostDecider::AvoidIllegal, UNLIMITED_TURNS)
        }
    }

    fn on_high_seas(&self, world: &World) -> bool {
        world
            .unit_tile(self.unit)
            .and_then(|t| world.map.terrain(t))
            == Some(Terrain::HighSeas)
            && matches!(world.unit(self.unit).map(|u| u.location), Some(Location::Tile(_)))
    }

    /// Sail one leg towards a stop.
    fn head_for(&self, ctx: &mut MissionContext<'_>, slot: Slot) {
        let this = self;
        let valid = |w: &World, ai: &AiRegistry| this.is_valid(w, ai);
        match slot.point {
            Some(TransportPoint::Europe) => {
                if !self.on_high_seas(ctx.world) {
                    let Some(path) = path_to_europe(ctx.world, self.unit) else {
                        return;
                    };
                    travel(ctx, self.unit, &path, &valid);
                }
                let moves_left = ctx.world.unit(self.unit).map_or(0, |u| u.moves_left);
                if self.on_high_seas(ctx.world) && moves_left > 0 {
                    ctx.send(ServerRequest::MoveToEurope { unit: self.unit });
                }
            }
            Some(TransportPoint::Tile(tile)) => {
                if let Some(path) = self.approach(ctx.world, slot, tile) {
                    travel(ctx, self.unit, &path, &valid);
                }
            }
            None => {}
        }
    }

    /// With nothing to do, wait in the nearest coastal colony.
    fn head_for_default(&self, ctx: &mut MissionContext<'_>) {
        let (Some(owner), Some(here)) = (self.owner(ctx.world), ctx.world.unit_tile(self.unit)) else {
            return;
        };
        let Some(port) = ctx
            .world
            .colonies_of(owner)
            .filter(|s| ctx.world.map.is_coastal(s.tile))
            .min_by_key(|s| (here.distance(s.tile), s.id))
            .map(|s| s.tile)
        else {
            return;
        };
        if port == here {
            return;
        }
        if let Some(path) = find_path(ctx.world, self.unit, here, port, None, CostDecider::AvoidIllegal) {
            let this = self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        }
    }

    // ========================================================================
    // Europe
    // ========================================================================

    fn in_europe(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        self.restock(ctx)?;
        self.buy_cargo(ctx)?;
        let Some(owner) = self.owner(ctx.world) else {
            return Ok(());
        };
        let gold = ctx.world.player(owner).map_or(0, |p| p.gold);
        if gold < ctx.config.minimum_gold_reserve || !self.hold_is_empty(ctx.world) {
            if ctx.send(ServerRequest::MoveToAmerica { unit: self.unit }) {
                info!(carrier = %self.unit, slots = self.transport_list.len(), gold, "sailing for America");
            }
        }
        Ok(())
    }

    /// Units waiting on the docks that no carrier has claimed, in handle order.
    fn dock_units(&self, world: &World, ai: &AiRegistry, owner: PlayerId, accept: impl Fn(&Unit) -> bool) -> Vec<UnitId> {
        world
            .units()
            .filter(|u| u.owner == owner && u.location == Location::Europe && !u.is_naval())
            .filter(|u| ai.ai_unit(u.id).map_or(true, |a| a.transport.is_none()))
            .filter(|u| accept(u))
            .map(|u| u.id)
            .collect()
    }

    /// Board a unit waiting in Europe and list it.
    fn take_aboard(&mut self, ctx: &mut MissionContext<'_>, unit: UnitId) -> Result<bool> {
        if !ctx.send(ServerRequest::BoardShip {
            unit,
            carrier: self.unit,
        }) {
            return Ok(false);
        }
        self.add_to_transport_list(ctx.world, ctx.ai, ctx.config, TransportableRef::Unit(unit))
    }

    /// Cheapest colonist to be had in Europe: one on the docks, then a
    /// recruit, then a trainee. Purchases need the gold in hand.
    fn obtain_colonist(&self, ctx: &mut MissionContext<'_>, owner: PlayerId, wanted: Option<UnitType>) -> Option<UnitId> {
        let matches = |t: UnitType| t.is_colonist() && wanted.map_or(true, |w| w == t);
        if let Some(unit) = self
            .dock_units(ctx.world, ctx.ai, owner, |u| matches(u.unit_type) && !u.armed)
            .first()
        {
            return Some(*unit);
        }
        let player = ctx.world.player(owner)?;
        let europe = player.europe.as_ref()?;
        let recruit = europe
            .recruitables
            .iter()
            .position(|t| matches(*t))
            .filter(|_| player.can_afford(europe.recruit_price));
        let request = match recruit {
            Some(slot) => ServerRequest::RecruitUnit { player: owner, slot },
            None => {
                let trainee = [
                    UnitType::FreeColonist,
                    UnitType::ExpertFisherman,
                    UnitType::ExpertFarmer,
                    UnitType::VeteranSoldier,
                ]
                .into_iter()
                .filter(|t| matches(*t))
                .filter_map(|t| t.training_price().map(|price| (price, t)))
                .filter(|(price, _)| player.can_afford(*price))
                .min()?;
                ServerRequest::TrainUnit {
                    player: owner,
                    unit_type: trainee.1,
                }
            }
        };
        match ctx.ask(request) {
            Some(ServerResponse::UnitCreated { unit }) => {
                debug!(carrier = %self.unit, %unit, "colonist acquired in Europe");
                Some(unit)
            }
            _ => None,
        }
    }

    /// Fill the hold in Europe.
    fn buy_cargo(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        let Some(owner) = self.owner(ctx.world) else {
            return Ok(());
        };
        let Some(entry) = ctx.world.player(owner).map(|p| p.entry_location) else {
            return Ok(());
        };

        // Few colonies: ship free colonists off to found more.
        if ctx.world.colony_count(owner) < ctx.config.few_colonies {
            let settlers = self.dock_units(ctx.world, ctx.ai, owner, |u| u.unit_type.is_colonist() && !u.armed);
            for settler in settlers {
                if ctx.world.space_left(self.unit) == 0 {
                    break;
                }
                let Some((site, _)) = find_colony_location(ctx.world, settler, entry, Some(self.unit), ctx.config) else {
                    break;
                };
                let mission = BuildColonyMission::with_target(ctx.world, settler, site, false)?;
                ctx.ai.set_mission(settler, Mission::BuildColony(mission));
                self.take_aboard(ctx, settler)?;
            }
        }

        // Wishes of colonies already on the route, plus the best one overall.
        let served: BTreeSet<TilePos> = self
            .slots(ctx.world, ctx.ai)
            .into_iter()
            .filter(|s| !s.pickup)
            .filter_map(|s| match s.point {
                Some(TransportPoint::Tile(tile)) => Some(tile),
                _ => None,
            })
            .collect();
        let owned = |w: &Wish| w.is_outstanding() && ctx.world.settlement(w.colony).is_some_and(|s| s.owner == owner);
        let mut wishes: Vec<Wish> = ctx
            .ai
            .wishes()
            .filter(|w| owned(w) && ctx.world.settlement(w.colony).is_some_and(|s| served.contains(&s.tile)))
            .copied()
            .collect();
        if let Some(best) = ctx
            .ai
            .wishes()
            .filter(|w| owned(w))
            .max_by_key(|w| (w.value, std::cmp::Reverse(w.id)))
        {
            if !wishes.iter().any(|w| w.id == best.id) {
                wishes.push(*best);
            }
        }
        for wish in wishes {
            if ctx.world.space_left(self.unit) == 0 {
                break;
            }
            self.fulfil_wish(ctx, owner, wish)?;
        }

        // Top up with cheap colonists for the nearest colony.
        let Some(colony) = ctx
            .world
            .colonies_of(owner)
            .min_by_key(|s| (entry.distance(s.tile), s.id))
            .map(|s| s.id)
        else {
            return Ok(());
        };
        while ctx.world.space_left(self.unit) > 0 {
            let Some(unit) = self.obtain_colonist(ctx, owner, None) else {
                break;
            };
            let mission = WorkInsideColonyMission::new(ctx.world, unit, colony)?;
            ctx.ai.set_mission(unit, Mission::WorkInsideColony(mission));
            if !self.take_aboard(ctx, unit)? {
                break;
            }
        }
        Ok(())
    }

    fn fulfil_wish(&mut self, ctx: &mut MissionContext<'_>, owner: PlayerId, wish: Wish) -> Result<()> {
        match wish.kind {
            WishKind::Worker { unit_type } => {
                let Some(unit) = self.obtain_colonist(ctx, owner, unit_type) else {
                    return Ok(());
                };
                let mission = WishRealizationMission::new(ctx.world, ctx.ai, unit, wish.id)?;
                ctx.ai.set_mission(unit, Mission::WishRealization(mission));
                if let Some(w) = ctx.ai.wish_mut(wish.id) {
                    w.transportable = Some(TransportableRef::Unit(unit));
                }
                self.take_aboard(ctx, unit)?;
            }
            WishKind::Goods { goods_type, amount } => {
                let amount = amount.min(CARGO_SIZE);
                let affordable = ctx
                    .world
                    .player(owner)
                    .is_some_and(|p| p.can_afford(goods_type.buy_price() * amount));
                let Some(tile) = ctx.world.settlement(wish.colony).map(|s| s.tile) else {
                    return Ok(());
                };
                if amount == 0
                    || !affordable
                    || !ctx.send(ServerRequest::BuyGoods {
                        carrier: self.unit,
                        goods_type,
                        amount,
                    })
                {
                    return Ok(());
                }
                let mut lot = AiGoods::new(
                    Goods::new(goods_type, amount),
                    GoodsLocation::Carrier(self.unit),
                    Some(TransportPoint::Tile(tile)),
                );
                lot.priority = IMPORTANT_PRIORITY;
                let id = ctx.ai.add_goods(lot);
                if let Some(w) = ctx.ai.wish_mut(wish.id) {
                    w.transportable = Some(TransportableRef::Goods(id));
                }
                self.add_to_transport_list(ctx.world, ctx.ai, ctx.config, TransportableRef::Goods(id))?;
            }
        }
        Ok(())
    }
}

impl UnitMission for TransportMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        match world.unit(self.unit) {
            None => Some(InvalidReason::UnitDisposed),
            Some(unit) if !unit.is_carrier() => Some(InvalidReason::NotACarrier),
            Some(_) => None,
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        self.prune(ctx.world, ctx.ai);
        if self.transport_list.is_empty() {
            self.repopulate(ctx.world, ctx.ai, ctx.config);
        }
        match ctx.world.unit(self.unit).map(|u| u.location) {
            Some(Location::Europe) => return self.in_europe(ctx),
            Some(Location::Sailing { .. }) | None => return Ok(()),
            Some(_) => {}
        }

        self.restock(ctx)?;
        for _ in 0..=self.transport_list.len() {
            let before = ctx.world.unit(self.unit).map(|u| u.location);
            if ctx.world.unit(self.unit).map_or(0, |u| u.moves_left) == 0 {
                break;
            }
            let Some(slot) = self.next_stop(ctx.world, ctx.ai) else {
                break;
            };
            self.head_for(ctx, slot);
            self.restock(ctx)?;
            let after = ctx.world.unit(self.unit).map(|u| u.location);
            if after == before || matches!(after, Some(Location::Sailing { .. })) {
                break;
            }
        }
        if self.transport_list.is_empty() && self.hold_is_empty(ctx.world) {
            self.head_for_default(ctx);
        }
        Ok(())
    }

    /// Everything aboard goes down with the mission; everything still
    /// waiting is released for another carrier.
    fn dispose(&mut self, world: &World, ai: &mut AiRegistry) {
        for item in std::mem::take(&mut self.transport_list) {
            if item.is_aboard(world, ai, self.unit) {
                continue;
            }
            if item.transport(ai) == Some(self.unit) {
                ai.set_transport(item, None);
            }
        }
        let passengers: Vec<UnitId> = world.units_aboard(self.unit).map(|u| u.id).collect();
        for passenger in passengers {
            ai.remove_unit(passenger);
        }
        let cargo: Vec<AiGoodsId> = ai
            .all_goods()
            .filter(|g| g.location == GoodsLocation::Carrier(self.unit))
            .map(|g| g.id)
            .collect();
        for lot in cargo {
            ai.dispose_goods(lot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::RecordingConnection;
    use crate::goods::GoodsType;
    use crate::map::GameMap;
    use crate::player::PlayerKind;
    use crate::rng::AiRng;
    use crate::server::LocalServer;
    use crate::settlement::{ColonyData, SettlementKind};

    /// Two land masses split by a channel at x = 4.
    fn channel() -> World {
        let mut map = GameMap::new(10, 5, Terrain::Plains);
        for y in 0..5 {
            map.set_terrain(TilePos::new(4, y), Terrain::Ocean);
        }
        World::new(map)
    }

    #[test]
    fn test_turn_distance() {
        let entry = TilePos::new(0, 0);
        let a = TransportPoint::Tile(TilePos::new(0, 0));
        let b = TransportPoint::Tile(TilePos::new(9, 2));
        assert_eq!(turn_distance(a, b, entry, 4, 3), 3);
        assert_eq!(turn_distance(a, a, entry, 4, 3), 0);
        assert_eq!(turn_distance(TransportPoint::Europe, b, entry, 4, 3), 6);
        assert_eq!(turn_distance(b, TransportPoint::Europe, entry, 4, 3), 6);
        assert_eq!(turn_distance(TransportPoint::Europe, TransportPoint::Europe, entry, 4, 3), 0);
    }

    #[test]
    fn test_carrier_is_not_cargo() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 2)));
        let other = world.spawn_unit(dutch, UnitType::Merchantman, Location::Tile(TilePos::new(4, 3)));
        let mut ai = AiRegistry::new();
        let mut mission = TransportMission::new(&world, ship).unwrap();
        let result = mission.add_to_transport_list(&world, &mut ai, &AiConfig::default(), TransportableRef::Unit(other));
        assert!(matches!(result, Err(AiError::CarrierAsCargo(id)) if id == other));
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Europe);
        assert!(TransportMission::new(&world, colonist).is_err());
    }

    #[test]
    fn test_unit_without_destination_is_rejected() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 2)));
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 2)));
        let mut ai = AiRegistry::new();
        ai.register_unit(colonist);
        let mut mission = TransportMission::new(&world, ship).unwrap();
        let added = mission
            .add_to_transport_list(&world, &mut ai, &AiConfig::default(), TransportableRef::Unit(colonist))
            .unwrap();
        assert!(!added);
        assert!(mission.transport_list().is_empty());
        assert_eq!(ai.ai_unit(colonist).unwrap().transport, None);
    }

    #[test]
    fn test_slots_and_links() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let east = world.found_settlement(dutch, TilePos::new(5, 2), "East", SettlementKind::Colony(ColonyData::new(2)));
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 2)));
        let walker = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(1, 1)));
        let rider = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Carrier(ship));
        let mut ai = AiRegistry::new();
        for unit in [walker, rider] {
            let work = WorkInsideColonyMission::new(&world, unit, east).unwrap();
            ai.set_mission(unit, Mission::WorkInsideColony(work));
        }
        let config = AiConfig::default();
        let mut mission = TransportMission::new(&world, ship).unwrap();

        assert!(mission.add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(walker)).unwrap());
        assert!(mission.add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(rider)).unwrap());
        let before = mission.transport_list().to_vec();
        assert!(!mission.add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(walker)).unwrap());
        assert_eq!(mission.transport_list(), before.as_slice());

        let count = |m: &TransportMission, u| m.transport_list().iter().filter(|i| **i == TransportableRef::Unit(u)).count();
        assert_eq!(count(&mission, walker), 2);
        assert_eq!(count(&mission, rider), 1);
        assert_eq!(ai.ai_unit(walker).unwrap().transport, Some(ship));

        assert!(mission.remove_from_transport_list(&mut ai, TransportableRef::Unit(walker)));
        assert_eq!(count(&mission, walker), 0);
        assert_eq!(ai.ai_unit(walker).unwrap().transport, None);
        assert_eq!(ai.ai_unit(rider).unwrap().transport, Some(ship));
    }

    #[test]
    fn test_ferries_colonist_across_channel() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let west = world.found_settlement(dutch, TilePos::new(3, 2), "West", SettlementKind::Colony(ColonyData::new(2)));
        let east = world.found_settlement(dutch, TilePos::new(5, 2), "East", SettlementKind::Colony(ColonyData::new(2)));
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(3, 2)));
        let colonist = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 2)));
        let mut ai = AiRegistry::new();
        let work = WorkInsideColonyMission::new(&world, colonist, east).unwrap();
        ai.set_mission(colonist, Mission::WorkInsideColony(work));
        let config = AiConfig::default();
        let mut mission = TransportMission::new(&world, ship).unwrap();
        assert!(mission
            .add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(colonist))
            .unwrap());

        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(5);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();

        assert!(connection
            .requests()
            .any(|r| matches!(r, ServerRequest::BoardShip { unit, .. } if *unit == colonist)));
        assert_eq!(world.unit(colonist).unwrap().location, Location::Working(east));
        assert!(mission.transport_list().is_empty());
        assert_eq!(ai.ai_unit(colonist).unwrap().transport, None);
        assert!(world.settlement(west).is_some());
    }

    #[test]
    fn test_sells_goods_in_europe() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Europe);
        world.unit_mut(ship).unwrap().cargo.push(Goods::new(GoodsType::Furs, 100));
        let mut ai = AiRegistry::new();
        let furs = ai.add_goods(AiGoods::new(
            Goods::new(GoodsType::Furs, 100),
            GoodsLocation::Carrier(ship),
            Some(TransportPoint::Europe),
        ));
        let config = AiConfig::default();
        let mut mission = TransportMission::new(&world, ship).unwrap();

        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(1);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();

        assert!(connection
            .requests()
            .any(|r| matches!(r, ServerRequest::SellGoods { .. })));
        assert_eq!(world.player(dutch).unwrap().gold, 400);
        assert!(ai.goods(furs).is_none());
        assert!(mission.transport_list().is_empty());
        // short of the reserve, the ship heads back at once
        assert!(matches!(
            world.unit(ship).unwrap().location,
            Location::Sailing { .. }
        ));
    }

    #[test]
    fn test_dispose_releases_waiting_cargo() {
        let mut world = channel();
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let east = world.found_settlement(dutch, TilePos::new(5, 2), "East", SettlementKind::Colony(ColonyData::new(2)));
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(4, 2)));
        let walker = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(1, 1)));
        let rider = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Carrier(ship));
        let mut ai = AiRegistry::new();
        let work = WorkInsideColonyMission::new(&world, walker, east).unwrap();
        ai.set_mission(walker, Mission::WorkInsideColony(work));
        let ride = WorkInsideColonyMission::new(&world, rider, east).unwrap();
        ai.set_mission(rider, Mission::WorkInsideColony(ride));
        let lot = ai.add_goods(AiGoods::new(
            Goods::new(GoodsType::Tools, 50),
            GoodsLocation::Carrier(ship),
            Some(TransportPoint::Tile(TilePos::new(5, 2))),
        ));
        let config = AiConfig::default();
        let mut mission = TransportMission::new(&world, ship).unwrap();
        mission.add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(walker)).unwrap();
        mission.add_to_transport_list(&world, &mut ai, &config, TransportableRef::Goods(lot)).unwrap();
        mission.add_to_transport_list(&world, &mut ai, &config, TransportableRef::Unit(rider)).unwrap();

        mission.dispose(&world, &mut ai);
        assert!(mission.transport_list().is_empty());
        assert_eq!(ai.ai_unit(walker).unwrap().transport, None);
        assert!(ai.goods(lot).is_none());
        assert!(ai.ai_unit(rider).is_none());
    }
}
