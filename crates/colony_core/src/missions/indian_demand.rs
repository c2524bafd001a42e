//! Native tribute demands.
//!
//! A brave first fetches a gift from its home camp (a random surplus stack
//! of New World goods), then walks to the target colony and demands
//! tribute. What it asks for depends on how tense relations are; the
//! colony's answer moves the tension up or down. The mission is spent after
//! a single exchange.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{move_randomly, path_next_to, standing_tile, travel, InvalidReason, MissionContext, UnitMission};
use crate::ai::AiRegistry;
use crate::error::{AiError, Result};
use crate::goods::{Goods, GoodsStore, GoodsType};
use crate::ids::{PlayerId, SettlementId, UnitId};
use crate::pathfinding::{find_path, CostDecider, UNLIMITED_TURNS};
use crate::player::TensionLevel;
use crate::protocol::{Demand, ServerRequest, ServerResponse};
use crate::world::{MoveType, World};

/// Highest difficulty level; acceptance relief shrinks towards it.
pub const MAX_DIFFICULTY: u32 = 4;

// ============================================================================
// Goods selection
// ============================================================================

/// Share of a stack scaled by difficulty: `amount * (difficulty + 1) / 6`.
#[must_use]
pub fn scaled_share(amount: u32, difficulty: u32) -> u32 {
    amount.saturating_mul(difficulty + 1) / 6
}

/// Demanded amount for a non-food stack: the scaled share, at least one.
#[must_use]
pub fn demand_amount(amount: u32, difficulty: u32) -> u32 {
    scaled_share(amount, difficulty).max(1)
}

/// Pick the goods to demand from a colony warehouse.
///
/// Friendly natives ask for the scaled share of the food stock; when that
/// share rounds down to nothing they fall back to the displeased choice and
/// never ask for food. Displeased ones ask for the most valuable stack that is neither food nor
/// military. Worse relations prefer military goods, then building material,
/// then trade goods, then refined goods. If the preferred categories are
/// empty the most valuable stack is taken.
#[must_use]
pub fn select_goods(store: &GoodsStore, level: TensionLevel, difficulty: u32) -> Option<Goods> {
    let most_valuable = |accept: &dyn Fn(GoodsType) -> bool| {
        store
            .stacks()
            .filter(|g| accept(g.goods_type))
            .max_by_key(|g| (g.sale_value(), std::cmp::Reverse(g.goods_type)))
    };
    let scaled = |g: Goods| Goods::new(g.goods_type, demand_amount(g.amount, difficulty));
    let civilian = || most_valuable(&|t| !t.is_food() && !t.is_military()).map(scaled);

    match level {
        TensionLevel::Happy | TensionLevel::Content => most_valuable(&GoodsType::is_food)
            .map(|g| Goods::new(g.goods_type, scaled_share(g.amount, difficulty)))
            .filter(|g| g.amount > 0)
            .or_else(civilian)
            .or_else(|| most_valuable(&|t| !t.is_food()).map(scaled)),
        TensionLevel::Displeased => civilian().or_else(|| most_valuable(&|_| true).map(scaled)),
        TensionLevel::Angry | TensionLevel::Hateful => {
            let tiers: [&dyn Fn(GoodsType) -> bool; 5] = [
                &GoodsType::is_military,
                &GoodsType::is_building_material,
                &GoodsType::is_trade_goods,
                &GoodsType::is_refined,
                &|_: GoodsType| true,
            ];
            tiers.into_iter().find_map(|tier| most_valuable(tier)).map(scaled)
        }
    }
}

// ============================================================================
// Mission
// ============================================================================

/// Demand tribute from one colony.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndianDemandMission {
    unit: UnitId,
    colony: SettlementId,
    completed: bool,
}

impl IndianDemandMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "indianDemandMission";

    /// Send a native unit to make a demand on `colony`.
    pub fn new(world: &World, unit: UnitId, colony: SettlementId) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if !u.unit_type.is_native() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "only native units make demands",
            });
        }
        if !world.settlement(colony).ok_or(AiError::UnknownSettlement(colony))?.is_colony() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "demands are made on colonies",
            });
        }
        Ok(Self {
            unit,
            colony,
            completed: false,
        })
    }

    /// Rebuild from saved state without checking the references.
    pub(crate) fn restored(unit: UnitId, colony: SettlementId, completed: bool) -> Self {
        Self {
            unit,
            colony,
            completed,
        }
    }

    /// The colony being squeezed.
    #[must_use]
    pub fn colony(&self) -> SettlementId {
        self.colony
    }

    /// Whether the demand has been made.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Pick up a gift at the home camp. Returns `false` while the unit is
    /// still on its way home.
    fn fetch_gift(&self, ctx: &mut MissionContext<'_>) -> bool {
        let keep = ctx.config.keep_raw_material;
        let Some((home, home_tile, candidates)) = ctx
            .world
            .unit(self.unit)
            .and_then(|u| u.home_settlement)
            .and_then(|id| ctx.world.settlement(id))
            .map(|s| {
                let candidates: Vec<(GoodsType, u32)> = s
                    .goods
                    .stacks()
                    .filter(|g| g.goods_type.is_new_world() && g.amount > keep)
                    .map(|g| (g.goods_type, g.amount - keep))
                    .collect();
                (s.id, s.tile, candidates)
            })
        else {
            return true;
        };
        if candidates.is_empty() {
            return true;
        }
        let Some(here) = ctx.world.unit_tile(self.unit) else {
            return false;
        };
        if here != home_tile {
            let Some(path) = find_path(ctx.world, self.unit, here, home_tile, None, CostDecider::AvoidIllegal) else {
                return true;
            };
            let this = &*self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
            if standing_tile(ctx.world, self.unit) != Some(home_tile) {
                return false;
            }
        }
        let (goods_type, surplus) = candidates[ctx.rng.next_below(candidates.len() as u32) as usize];
        let (min, max) = (ctx.config.gift_min, ctx.config.gift_max);
        let amount = (ctx.rng.next_range(min as i32, max as i32 + 1).max(1) as u32).min(surplus);
        let gift = Goods::new(goods_type, amount);
        if ctx.send(ServerRequest::LoadCargo {
            carrier: self.unit,
            goods: gift,
        }) {
            debug!(unit = %self.unit, camp = %home, ?goods_type, amount, "gift collected");
        }
        true
    }

    fn adjust_tension(ctx: &mut MissionContext<'_>, natives: PlayerId, colonist: PlayerId, delta: i32) -> TensionLevel {
        match ctx.world.player_mut(natives) {
            Some(player) => {
                let tension = player.tension.entry(colonist).or_default();
                tension.modify(delta);
                tension.level()
            }
            None => TensionLevel::Happy,
        }
    }

    fn finish(&mut self, ctx: &mut MissionContext<'_>) {
        self.completed = true;
        move_randomly(ctx, self.unit);
    }
}

impl UnitMission for IndianDemandMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        if !world.has_unit(self.unit) {
            Some(InvalidReason::UnitDisposed)
        } else if self.completed {
            Some(InvalidReason::Completed)
        } else if !world.settlement(self.colony).is_some_and(|s| s.is_colony()) {
            Some(InvalidReason::TargetDisposed)
        } else {
            None
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        let carrying = ctx.world.unit(self.unit).is_some_and(|u| !u.cargo.is_empty());
        if !carrying && !self.fetch_gift(ctx) {
            return Ok(());
        }

        let Some((colony_tile, colony_owner)) = ctx.world.settlement(self.colony).map(|s| (s.tile, s.owner)) else {
            return Ok(());
        };
        let Some(here) = standing_tile(ctx.world, self.unit) else {
            return Ok(());
        };
        if here.distance(colony_tile) > 1 {
            let Some(path) = path_next_to(ctx.world, self.unit, colony_tile, CostDecider::AvoidIllegal, UNLIMITED_TURNS) else {
                return Ok(());
            };
            let this = &*self;
            travel(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        }
        let Some(here) = standing_tile(ctx.world, self.unit) else {
            return Ok(());
        };
        if here.distance(colony_tile) > 1 {
            return Ok(());
        }

        let Some(natives) = ctx.world.unit(self.unit).map(|u| u.owner) else {
            return Ok(());
        };
        let level = ctx
            .world
            .player(natives)
            .map_or(TensionLevel::Happy, |p| p.tension_towards(colony_owner).level());
        let difficulty = ctx.world.difficulty;
        let selected = ctx
            .world
            .settlement(self.colony)
            .and_then(|s| select_goods(&s.goods, level, difficulty));
        let demand = match selected {
            Some(goods) => Demand::Goods(goods),
            None => {
                let treasury = ctx.world.player(colony_owner).map_or(0, |p| p.gold);
                let gold = treasury / ctx.config.demand_gold_divisor.max(1);
                if gold == 0 {
                    debug!(unit = %self.unit, colony = %self.colony, "nothing worth demanding");
                    self.finish(ctx);
                    return Ok(());
                }
                Demand::Gold(gold)
            }
        };

        let Some(ServerResponse::Demand { accepted }) = ctx.ask(ServerRequest::IndianDemand {
            unit: self.unit,
            colony: self.colony,
            demand,
        }) else {
            return Ok(());
        };
        let dx = difficulty as i32 + 1;
        if accepted {
            let relief = ctx.config.demand_accepted_relief * MAX_DIFFICULTY.saturating_sub(difficulty) as i32;
            let level = Self::adjust_tension(ctx, natives, colony_owner, -relief);
            let food = matches!(demand, Demand::Goods(g) if g.goods_type.is_food());
            let gift = ctx.world.unit(self.unit).and_then(|u| u.cargo.first().copied());
            if let (true, true, Some(gift)) = (food, level <= TensionLevel::Content, gift) {
                ctx.send(ServerRequest::DeliverGift {
                    unit: self.unit,
                    settlement: self.colony,
                    goods: gift,
                });
            }
        } else {
            let level = Self::adjust_tension(ctx, natives, colony_owner, ctx.config.demand_rejected_tension * dx);
            if level > TensionLevel::Content {
                if let Some(direction) = here.direction_to(colony_tile) {
                    if ctx.world.move_type_now(self.unit, direction) == MoveType::Attack {
                        ctx.send(ServerRequest::Attack {
                            unit: self.unit,
                            direction,
                        });
                    }
                }
            }
        }
        info!(unit = %self.unit, colony = %self.colony, accepted, "demand answered");
        self.finish(ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::connection::{RecordingConnection, ScriptedConnection};
    use crate::map::{GameMap, TilePos, Terrain};
    use crate::player::{PlayerKind, Tension};
    use crate::rng::AiRng;
    use crate::server::LocalServer;
    use crate::settlement::{ColonyData, NativeData, SettlementKind};
    use crate::unit::{Location, UnitType};

    fn store(stacks: &[(GoodsType, u32)]) -> GoodsStore {
        let mut store = GoodsStore::new();
        for (goods_type, amount) in stacks {
            store.add(*goods_type, *amount);
        }
        store
    }

    #[test]
    fn test_content_natives_want_food() {
        let store = store(&[(GoodsType::Food, 120)]);
        let goods = select_goods(&store, TensionLevel::Content, 2).unwrap();
        assert_eq!(goods, Goods::new(GoodsType::Food, 120 * 3 / 6));
    }

    #[test]
    fn test_food_share_is_not_capped() {
        let warehouse = store(&[(GoodsType::Food, 720)]);
        let goods = select_goods(&warehouse, TensionLevel::Content, 2).unwrap();
        assert_eq!(goods, Goods::new(GoodsType::Food, 360));
    }

    #[test]
    fn test_tiny_food_share_falls_through() {
        let goods = select_goods(&store(&[(GoodsType::Food, 3), (GoodsType::Furs, 12)]), TensionLevel::Content, 0).unwrap();
        assert_eq!(goods, Goods::new(GoodsType::Furs, 2));
        assert_eq!(select_goods(&store(&[(GoodsType::Food, 3)]), TensionLevel::Happy, 0), None);
    }

    #[test]
    fn test_angry_natives_want_weapons() {
        let warehouse = store(&[(GoodsType::Food, 200), (GoodsType::Cloth, 100), (GoodsType::Muskets, 30)]);
        let goods = select_goods(&warehouse, TensionLevel::Angry, 2).unwrap();
        assert_eq!(goods, Goods::new(GoodsType::Muskets, 15));
        let goods = select_goods(&store(&[(GoodsType::Muskets, 1)]), TensionLevel::Hateful, 2).unwrap();
        assert_eq!(goods.amount, 1);
    }

    #[test]
    fn test_displeased_skips_food_and_weapons() {
        let store = store(&[(GoodsType::Food, 200), (GoodsType::Furs, 50), (GoodsType::Horses, 100)]);
        let goods = select_goods(&store, TensionLevel::Displeased, 2).unwrap();
        assert_eq!(goods.goods_type, GoodsType::Furs);
    }

    #[test]
    fn test_fallback_and_empty_store() {
        let goods = select_goods(&store(&[(GoodsType::Ore, 60)]), TensionLevel::Happy, 5).unwrap();
        assert_eq!(goods, Goods::new(GoodsType::Ore, 60));
        assert_eq!(select_goods(&GoodsStore::new(), TensionLevel::Angry, 2), None);
    }

    struct Setup {
        world: World,
        natives: PlayerId,
        dutch: PlayerId,
        colony: SettlementId,
        camp: SettlementId,
    }

    fn setup() -> Setup {
        let mut world = World::new(GameMap::new(12, 5, Terrain::Plains));
        let natives = world.add_player("Arawak", PlayerKind::Native);
        let dutch = world.add_player("Dutch", PlayerKind::European);
        let camp = world.found_settlement(natives, TilePos::new(1, 2), "Camp", SettlementKind::Native(NativeData::default()));
        let colony = world.found_settlement(dutch, TilePos::new(6, 2), "Fort Orange", SettlementKind::Colony(ColonyData::new(2)));
        Setup {
            world,
            natives,
            dutch,
            colony,
            camp,
        }
    }

    fn run(world: &mut World, mission: &mut IndianDemandMission, seed: u64) -> Vec<ServerRequest> {
        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        let mut connection = RecordingConnection::new(LocalServer::default());
        let mut rng = AiRng::new(seed);
        let mut ctx = MissionContext::new(world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();
        connection.requests().cloned().collect()
    }

    #[test]
    fn test_accepted_demand_relieves_tension() {
        let Setup {
            mut world,
            natives,
            dutch,
            colony,
            ..
        } = setup();
        world.settlement_mut(colony).unwrap().goods.add(GoodsType::Food, 80);
        world.player_mut(natives).unwrap().tension.insert(dutch, Tension::new(300));
        let brave = world.spawn_unit(natives, UnitType::Brave, Location::Tile(TilePos::new(5, 2)));
        let mut mission = IndianDemandMission::new(&world, brave, colony).unwrap();

        let requests = run(&mut world, &mut mission, 1);
        assert!(matches!(
            requests.first(),
            Some(ServerRequest::IndianDemand {
                demand: Demand::Goods(Goods { goods_type: GoodsType::Food, amount: 40 }),
                ..
            })
        ));
        assert_eq!(world.settlement(colony).unwrap().goods.count(GoodsType::Food), 40);
        assert_eq!(world.player(natives).unwrap().tension_towards(dutch).value(), 200);
        assert!(mission.is_completed());
        assert_eq!(
            mission.invalid_reason(&world, &AiRegistry::new()),
            Some(InvalidReason::Completed)
        );
    }

    #[test]
    fn test_rejected_demand_raises_tension() {
        let Setup {
            mut world,
            natives,
            dutch,
            colony,
            ..
        } = setup();
        world.settlement_mut(colony).unwrap().goods.add(GoodsType::Cloth, 40);
        world.player_mut(natives).unwrap().tension.insert(dutch, Tension::new(650));
        let brave = world.spawn_unit(natives, UnitType::Brave, Location::Tile(TilePos::new(5, 2)));
        let mut mission = IndianDemandMission::new(&world, brave, colony).unwrap();

        let mut ai = AiRegistry::new();
        let config = AiConfig::default();
        let script = ScriptedConnection::accepting().then(Ok(ServerResponse::Demand { accepted: false }));
        let mut connection = RecordingConnection::new(script);
        let mut rng = AiRng::new(4);
        let mut ctx = MissionContext::new(&mut world, &mut ai, &mut connection, &config, &mut rng);
        mission.do_mission(&mut ctx).unwrap();

        let requests: Vec<_> = connection.requests().cloned().collect();
        assert_eq!(
            requests[0],
            ServerRequest::IndianDemand {
                unit: brave,
                colony,
                demand: Demand::Goods(Goods::new(GoodsType::Cloth, 20)),
            }
        );
        assert_eq!(requests[1], ServerRequest::Attack { unit: brave, direction: crate::map::Direction::E });
        assert_eq!(world.player(natives).unwrap().tension_towards(dutch).value(), 650 + 150);
        assert!(mission.is_completed());
    }

    #[test]
    fn test_fetches_gift_at_home_first() {
        let Setup {
            mut world,
            natives,
            colony,
            camp,
            ..
        } = setup();
        world.settlement_mut(camp).unwrap().goods.add(GoodsType::Furs, 60);
        let brave = world.spawn_unit(natives, UnitType::Brave, Location::Tile(TilePos::new(1, 2)));
        world.unit_mut(brave).unwrap().home_settlement = Some(camp);
        let mut mission = IndianDemandMission::new(&world, brave, colony).unwrap();
        let requests = run(&mut world, &mut mission, 6);
        let Some(ServerRequest::LoadCargo { goods, .. }) = requests.first() else {
            panic!("expected a load request, got {requests:?}");
        };
        assert_eq!(goods.goods_type, GoodsType::Furs);
        // only 10 furs lie above the keep threshold
        assert_eq!(goods.amount, 10);
        assert_eq!(world.unit(brave).unwrap().cargo, vec![*goods]);
    }

    #[test]
    fn test_penniless_colony_ends_mission() {
        let Setup {
            mut world,
            natives,
            colony,
            ..
        } = setup();
        let brave = world.spawn_unit(natives, UnitType::Brave, Location::Tile(TilePos::new(5, 2)));
        let mut mission = IndianDemandMission::new(&world, brave, colony).unwrap();
        let requests = run(&mut world, &mut mission, 2);
        assert!(requests.iter().all(|r| matches!(r, ServerRequest::Move { .. })));
        assert!(mission.is_completed());
    }
}
