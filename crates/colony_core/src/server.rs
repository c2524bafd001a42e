//! In-process server used by tests and the headless runner.
//!
//! [`LocalServer`] validates each request against the world and applies it
//! with a deliberately small rule set: terrain movement costs, a
//! deterministic strength comparison for combat, demands accepted whenever
//! the colony can pay, and the fixed price table of
//! [`GoodsType`](crate::goods::GoodsType). It is not a rules engine.

use tracing::{debug, trace};

use crate::combat::offence_power;
use crate::connection::{Connection, ConnectionError};
use crate::goods::{Goods, GoodsType, CARGO_SIZE};
use crate::ids::{PlayerId, SettlementId, UnitId};
use crate::map::Direction;
use crate::player::PlayerKind;
use crate::protocol::{Demand, ServerRequest, ServerResponse};
use crate::settlement::{ColonyData, SettlementKind};
use crate::unit::{Location, SailingTo, Unit, UnitState, UnitType};
use crate::world::{MoveType, World};

/// Work places of a freshly founded colony.
pub const NEW_COLONY_WORK_SLOTS: u32 = 3;

/// Gold found in a lost city rumour.
pub const RUMOUR_GOLD: u32 = 100;

/// Treasure left behind by a destroyed native camp.
pub const CAMP_TREASURE: u32 = 300;

/// Share of a treasure train kept by the crown, in percent.
pub const CASH_IN_FEE: u32 = 50;

/// Tension added when a native unit or camp is attacked.
pub const ATTACK_TENSION: i32 = 300;

/// Recruit price increase after each recruitment.
pub const RECRUIT_PRICE_STEP: u32 = 20;

type Reply = Result<ServerResponse, ConnectionError>;

/// Minimal deterministic server.
#[derive(Debug, Clone)]
pub struct LocalServer {
    sail_turns: u32,
}

impl Default for LocalServer {
    fn default() -> Self {
        Self::new(3)
    }
}

impl LocalServer {
    /// Server with the given ocean crossing time.
    #[must_use]
    pub fn new(sail_turns: u32) -> Self {
        Self {
            sail_turns: sail_turns.max(1),
        }
    }

    fn move_unit(world: &mut World, req: &ServerRequest, id: UnitId, direction: Direction, explore: bool) -> Reply {
        let move_type = world.move_type_now(id, direction);
        let allowed = if explore {
            move_type == MoveType::ExploreRumour
        } else {
            move_type.is_progressing() || move_type == MoveType::Embark
        };
        if !allowed {
            return Err(ConnectionError::rejected(req, format!("{move_type:?}")));
        }
        let from = world.unit_tile(id).ok_or_else(|| ConnectionError::rejected(req, "not on the map"))?;
        let to = world.map.step(from, direction).ok_or_else(|| ConnectionError::rejected(req, "off the map"))?;
        let cost = world.map.terrain(to).map_or(1, |t| t.move_cost());
        let owner = unit(world, req, id)?.owner;

        let carrier = if move_type == MoveType::Embark {
            world
                .units_at(to)
                .find(|c| c.owner == owner && c.is_carrier())
                .map(|c| c.id)
        } else {
            None
        };

        let u = unit_mut(world, req, id)?;
        if cost > u.moves_left && u.moves_left < u.max_moves() {
            return Err(ConnectionError::rejected(req, "not enough movement points"));
        }
        u.moves_left = u.moves_left.saturating_sub(cost);
        u.state = UnitState::Active;
        u.location = match carrier {
            Some(carrier) => {
                u.state = UnitState::Sentry;
                Location::Carrier(carrier)
            }
            None => Location::Tile(to),
        };

        if move_type == MoveType::ExploreRumour {
            if let Some(tile) = world.map.get_mut(to) {
                tile.rumour = false;
            }
            if let Some(player) = world.player_mut(owner) {
                player.gold += RUMOUR_GOLD;
            }
            debug!(unit = %id, tile = %to, "rumour explored");
        }
        Ok(ServerResponse::Ok)
    }

    fn attack(world: &mut World, req: &ServerRequest, id: UnitId, direction: Direction) -> Reply {
        if world.move_type_now(id, direction) != MoveType::Attack {
            return Err(ConnectionError::rejected(req, "nothing to attack"));
        }
        let from = world.unit_tile(id).ok_or_else(|| ConnectionError::rejected(req, "not on the map"))?;
        let to = world.map.step(from, direction).ok_or_else(|| ConnectionError::rejected(req, "off the map"))?;
        let attacker = unit(world, req, id)?.clone();
        let attack = offence_power(&attacker);
        let defender = world.best_defender_at(to).map(|d| (d.id, d.owner, world.defence_of(d)));
        let settlement = world.settlement_at(to).map(|s| (s.id, s.owner, s.is_colony()));

        let victim_owner = defender.map(|(_, owner, _)| owner).or(settlement.map(|(_, owner, _)| owner));
        if let Some(victim) = victim_owner {
            if world.player(victim).is_some_and(|p| p.kind == PlayerKind::Native) {
                if let Some(p) = world.player_mut(victim) {
                    p.tension.entry(attacker.owner).or_default().modify(ATTACK_TENSION);
                }
            }
        }

        match defender {
            Some((defender, _, defence)) => {
                if attack > defence {
                    debug!(attacker = %id, defender = %defender, "attack won");
                    lose_battle(world, defender);
                } else {
                    debug!(attacker = %id, defender = %defender, "attack lost");
                    lose_battle(world, id);
                }
            }
            None => match settlement {
                Some((camp, _, false)) => {
                    world.dispose_settlement(camp);
                    let treasure = world.spawn_unit(attacker.owner, UnitType::TreasureTrain, Location::Tile(to));
                    if let Some(t) = world.unit_mut(treasure) {
                        t.treasure = CAMP_TREASURE;
                    }
                    debug!(attacker = %id, tile = %to, "native camp destroyed");
                }
                Some((colony, _, true)) => pillage(world, colony),
                None => {}
            },
        }
        if let Some(u) = world.unit_mut(id) {
            u.moves_left = 0;
        }
        Ok(ServerResponse::Ok)
    }

    fn demand(world: &mut World, req: &ServerRequest, id: UnitId, colony: SettlementId, demand: Demand) -> Reply {
        let brave = unit(world, req, id)?.clone();
        let target = world
            .settlement(colony)
            .ok_or_else(|| ConnectionError::rejected(req, "no such colony"))?
            .clone();
        let here = world.unit_tile(id).ok_or_else(|| ConnectionError::rejected(req, "not on the map"))?;
        if here.distance(target.tile) > 1 {
            return Err(ConnectionError::rejected(req, "too far from the colony"));
        }
        let accepted = match demand {
            Demand::Goods(goods) => {
                let ok = target.goods.count(goods.goods_type) >= goods.amount;
                if ok {
                    if let Some(s) = world.settlement_mut(colony) {
                        s.goods.remove(goods.goods_type, goods.amount);
                    }
                    if let Some(home) = brave.home_settlement.and_then(|h| world.settlement_mut(h)) {
                        home.goods.add(goods.goods_type, goods.amount);
                    }
                }
                ok
            }
            Demand::Gold(amount) => {
                let ok = world.player(target.owner).is_some_and(|p| p.can_afford(amount));
                if ok {
                    if let Some(p) = world.player_mut(target.owner) {
                        p.gold -= amount;
                    }
                    if let Some(p) = world.player_mut(brave.owner) {
                        p.gold += amount;
                    }
                }
                ok
            }
        };
        Ok(ServerResponse::Demand { accepted })
    }

    fn europe_purchase(world: &mut World, req: &ServerRequest, player: PlayerId, unit_type: UnitType, price: u32) -> Reply {
        let p = world
            .player_mut(player)
            .ok_or_else(|| ConnectionError::rejected(req, "no such player"))?;
        if p.europe.is_none() || !p.can_afford(price) {
            return Err(ConnectionError::rejected(req, "cannot afford"));
        }
        p.gold -= price;
        let unit = world.spawn_unit(player, unit_type, Location::Europe);
        Ok(ServerResponse::UnitCreated { unit })
    }
}

fn unit<'w>(world: &'w World, req: &ServerRequest, id: UnitId) -> Result<&'w Unit, ConnectionError> {
    world
        .unit(id)
        .ok_or_else(|| ConnectionError::rejected(req, format!("no such unit {id}")))
}

fn unit_mut<'w>(world: &'w mut World, req: &ServerRequest, id: UnitId) -> Result<&'w mut Unit, ConnectionError> {
    world
        .unit_mut(id)
        .ok_or_else(|| ConnectionError::rejected(req, format!("no such unit {id}")))
}

/// The loser drops its equipment; unequipped losers are destroyed.
fn lose_battle(world: &mut World, id: UnitId) {
    let Some(u) = world.unit_mut(id) else {
        return;
    };
    u.state = UnitState::Active;
    if u.mounted {
        u.mounted = false;
    } else if u.armed {
        u.armed = false;
    } else {
        world.dispose_unit(id);
    }
}

/// Undefended colonies lose half of their most valuable stack.
fn pillage(world: &mut World, colony: SettlementId) {
    let Some(s) = world.settlement_mut(colony) else {
        return;
    };
    if let Some(best) = s.goods.stacks().max_by_key(Goods::sale_value) {
        s.goods.remove(best.goods_type, best.amount / 2);
    }
}

/// Settlement the carrier is docked in, if it is its owner's.
fn docked_settlement(world: &World, carrier: &Unit) -> Option<SettlementId> {
    let tile = world.unit_tile(carrier.id)?;
    world
        .settlement_at(tile)
        .filter(|s| s.owner == carrier.owner)
        .map(|s| s.id)
}

/// Whether `goods` fit the carrier, merging into an existing stack if possible.
fn add_cargo(world: &World, carrier: &mut Unit, goods: Goods) -> bool {
    if goods.amount == 0 || goods.amount > CARGO_SIZE {
        return false;
    }
    if let Some(stack) = carrier
        .cargo
        .iter_mut()
        .find(|g| g.goods_type == goods.goods_type && g.amount + goods.amount <= CARGO_SIZE)
    {
        stack.amount += goods.amount;
        return true;
    }
    if world.space_left(carrier.id) == 0 {
        return false;
    }
    carrier.cargo.push(goods);
    true
}

/// Remove `goods` from a carrier's hold.
fn take_cargo(carrier: &mut Unit, goods: Goods) -> bool {
    let Some(index) = carrier
        .cargo
        .iter()
        .position(|g| g.goods_type == goods.goods_type && g.amount >= goods.amount)
    else {
        return false;
    };
    carrier.cargo[index].amount -= goods.amount;
    if carrier.cargo[index].amount == 0 {
        carrier.cargo.remove(index);
    }
    true
}

impl Connection for LocalServer {
    fn ask(&mut self, world: &mut World, request: &ServerRequest) -> Reply {
        trace!(request = request.name(), "server request");
        let req = request;
        match request {
            ServerRequest::Move { unit, direction } => Self::move_unit(world, req, *unit, *direction, false),
            ServerRequest::Explore { unit, direction } => Self::move_unit(world, req, *unit, *direction, true),
            ServerRequest::Attack { unit, direction } => Self::attack(world, req, *unit, *direction),

            ServerRequest::BuildColony { unit: id, name } => {
                let u = unit(world, req, *id)?.clone();
                let Location::Tile(tile) = u.location else {
                    return Err(ConnectionError::rejected(req, "not on a tile"));
                };
                if !u.unit_type.is_colonist() || u.moves_left == 0 {
                    return Err(ConnectionError::rejected(req, "unit cannot build"));
                }
                if world.colony_value_for(u.owner, tile) <= 0 {
                    return Err(ConnectionError::rejected(req, "site not available"));
                }
                let colony = world.found_settlement(u.owner, tile, name.clone(), SettlementKind::Colony(ColonyData::new(NEW_COLONY_WORK_SLOTS)));
                if let Some(s) = world.settlement_mut(colony) {
                    if u.armed {
                        s.goods.add(GoodsType::Muskets, 50);
                    }
                    if let Some(data) = s.colony_mut() {
                        data.workers.push(*id);
                    }
                }
                let founder = unit_mut(world, req, *id)?;
                founder.armed = false;
                founder.moves_left = 0;
                founder.location = Location::Working(colony);
                Ok(ServerResponse::Ok)
            }

            ServerRequest::ChangeState { unit: id, state } => {
                let u = unit_mut(world, req, *id)?;
                u.state = match state {
                    UnitState::Fortified | UnitState::Fortifying if u.state == UnitState::Fortified => UnitState::Fortified,
                    UnitState::Fortified | UnitState::Fortifying => {
                        u.moves_left = 0;
                        UnitState::Fortifying
                    }
                    other => *other,
                };
                Ok(ServerResponse::Ok)
            }

            ServerRequest::MoveToEurope { unit: id } => {
                let tile = world.unit_tile(*id);
                let on_high_seas = tile.and_then(|t| world.map.terrain(t)) == Some(crate::map::Terrain::HighSeas);
                let u = unit_mut(world, req, *id)?;
                if !u.is_naval() || !on_high_seas || !matches!(u.location, Location::Tile(_)) {
                    return Err(ConnectionError::rejected(req, "not on the high seas"));
                }
                u.location = Location::Sailing { destination: SailingTo::Europe, turns_left: self.sail_turns };
                u.moves_left = 0;
                Ok(ServerResponse::Ok)
            }

            ServerRequest::MoveToAmerica { unit: id } => {
                let u = unit_mut(world, req, *id)?;
                if !u.is_naval() || u.location != Location::Europe {
                    return Err(ConnectionError::rejected(req, "not in Europe"));
                }
                u.location = Location::Sailing { destination: SailingTo::America, turns_left: self.sail_turns };
                u.moves_left = 0;
                Ok(ServerResponse::Ok)
            }

            ServerRequest::IndianDemand { unit, colony, demand } => Self::demand(world, req, *unit, *colony, *demand),

            ServerRequest::DeliverGift { unit: id, settlement, goods } => {
                let here = world.unit_tile(*id).ok_or_else(|| ConnectionError::rejected(req, "not on the map"))?;
                let target = world.settlement(*settlement).map(|s| s.tile).ok_or_else(|| ConnectionError::rejected(req, "no such settlement"))?;
                if here.distance(target) > 1 {
                    return Err(ConnectionError::rejected(req, "too far"));
                }
                if !take_cargo(unit_mut(world, req, *id)?, *goods) {
                    return Err(ConnectionError::rejected(req, "gift not carried"));
                }
                if let Some(s) = world.settlement_mut(*settlement) {
                    s.goods.add(goods.goods_type, goods.amount);
                }
                Ok(ServerResponse::Ok)
            }

            ServerRequest::BoardShip { unit: id, carrier } => {
                let u = unit(world, req, *id)?.clone();
                let c = unit(world, req, *carrier)?.clone();
                if u.is_naval() || !c.is_carrier() || u.owner != c.owner || u.id == c.id {
                    return Err(ConnectionError::rejected(req, "cannot board"));
                }
                if world.space_left(c.id) < u.unit_type.space_taken() {
                    return Err(ConnectionError::rejected(req, "no space"));
                }
                let together = (u.location == Location::Europe && c.location == Location::Europe)
                    || match (world.unit_tile(u.id), world.unit_tile(c.id)) {
                        (Some(a), Some(b)) => a.distance(b) <= 1 && matches!(u.location, Location::Tile(_)),
                        _ => false,
                    };
                if !together {
                    return Err(ConnectionError::rejected(req, "carrier not here"));
                }
                let u = unit_mut(world, req, *id)?;
                u.location = Location::Carrier(*carrier);
                u.state = UnitState::Sentry;
                Ok(ServerResponse::Ok)
            }

            ServerRequest::BuyGoods { carrier, goods_type, amount } => {
                let mut c = unit(world, req, *carrier)?.clone();
                if c.location != Location::Europe {
                    return Err(ConnectionError::rejected(req, "not in Europe"));
                }
                let price = goods_type.buy_price() * amount;
                if !world.player(c.owner).is_some_and(|p| p.can_afford(price)) {
                    return Err(ConnectionError::rejected(req, "cannot afford"));
                }
                if !add_cargo(world, &mut c, Goods::new(*goods_type, *amount)) {
                    return Err(ConnectionError::rejected(req, "no space"));
                }
                if let Some(p) = world.player_mut(c.owner) {
                    p.gold -= price;
                }
                *unit_mut(world, req, *carrier)? = c;
                Ok(ServerResponse::Ok)
            }

            ServerRequest::SellGoods { carrier, goods } => {
                let c = unit_mut(world, req, *carrier)?;
                if c.location != Location::Europe || !take_cargo(c, *goods) {
                    return Err(ConnectionError::rejected(req, "nothing to sell here"));
                }
                let owner = c.owner;
                if let Some(p) = world.player_mut(owner) {
                    p.gold += goods.sale_value();
                }
                Ok(ServerResponse::Ok)
            }

            ServerRequest::LoadCargo { carrier, goods } => {
                let mut c = unit(world, req, *carrier)?.clone();
                let colony = docked_settlement(world, &c).ok_or_else(|| ConnectionError::rejected(req, "not in port"))?;
                let held = world.settlement(colony).map_or(0, |s| s.goods.count(goods.goods_type));
                if held < goods.amount || !add_cargo(world, &mut c, *goods) {
                    return Err(ConnectionError::rejected(req, "cannot load"));
                }
                if let Some(s) = world.settlement_mut(colony) {
                    s.goods.remove(goods.goods_type, goods.amount);
                }
                *unit_mut(world, req, *carrier)? = c;
                Ok(ServerResponse::Ok)
            }

            ServerRequest::UnloadCargo { carrier, goods } => {
                let c = unit(world, req, *carrier)?.clone();
                let colony = docked_settlement(world, &c).ok_or_else(|| ConnectionError::rejected(req, "not in port"))?;
                if !take_cargo(unit_mut(world, req, *carrier)?, *goods) {
                    return Err(ConnectionError::rejected(req, "not carried"));
                }
                if let Some(s) = world.settlement_mut(colony) {
                    s.goods.add(goods.goods_type, goods.amount);
                }
                Ok(ServerResponse::Ok)
            }

            ServerRequest::Disembark { unit: id } => {
                let Location::Carrier(carrier) = unit(world, req, *id)?.location else {
                    return Err(ConnectionError::rejected(req, "not aboard"));
                };
                let carrier_location = unit(world, req, carrier)?.location;
                let landing = match carrier_location {
                    Location::Europe => Location::Europe,
                    Location::Tile(tile) if world.map.is_land(tile) => Location::Tile(tile),
                    _ => return Err(ConnectionError::rejected(req, "carrier at sea")),
                };
                let u = unit_mut(world, req, *id)?;
                u.location = landing;
                u.state = UnitState::Active;
                Ok(ServerResponse::Ok)
            }

            ServerRequest::CashInTreasureTrain { unit: id } => {
                let u = unit(world, req, *id)?.clone();
                let eligible = u.is_treasure_train()
                    && matches!(u.location, Location::Tile(_))
                    && world.unit_tile(*id).is_some_and(|t| world.is_cash_in_tile(u.owner, t));
                if !eligible {
                    return Err(ConnectionError::rejected(req, "cannot cash in here"));
                }
                let amount = u.treasure * (100 - CASH_IN_FEE) / 100;
                if let Some(p) = world.player_mut(u.owner) {
                    p.gold += amount;
                }
                world.dispose_unit(*id);
                debug!(unit = %id, amount, "treasure cashed in");
                Ok(ServerResponse::CashIn { amount })
            }

            ServerRequest::RecruitUnit { player, slot } => {
                let (unit_type, price) = world
                    .player(*player)
                    .and_then(|p| p.europe.as_ref())
                    .and_then(|e| e.recruitables.get(*slot).map(|t| (*t, e.recruit_price)))
                    .ok_or_else(|| ConnectionError::rejected(req, "nothing to recruit"))?;
                let reply = Self::europe_purchase(world, req, *player, unit_type, price)?;
                if let Some(europe) = world.player_mut(*player).and_then(|p| p.europe.as_mut()) {
                    europe.recruitables.remove(*slot);
                    europe.recruitables.push(UnitType::FreeColonist);
                    europe.recruit_price += RECRUIT_PRICE_STEP;
                }
                Ok(reply)
            }

            ServerRequest::TrainUnit { player, unit_type } => {
                let price = unit_type
                    .training_price()
                    .ok_or_else(|| ConnectionError::rejected(req, "cannot be trained"))?;
                Self::europe_purchase(world, req, *player, *unit_type, price)
            }

            ServerRequest::JoinColony { unit: id, colony } => {
                let u = unit(world, req, *id)?.clone();
                let s = world.settlement(*colony).ok_or_else(|| ConnectionError::rejected(req, "no such colony"))?;
                if !u.unit_type.is_colonist() || s.owner != u.owner || s.vacancies() == 0 || u.location != Location::Tile(s.tile) {
                    return Err(ConnectionError::rejected(req, "cannot join"));
                }
                if let Some(data) = world.settlement_mut(*colony).and_then(|s| s.colony_mut()) {
                    data.workers.push(*id);
                }
                let u = unit_mut(world, req, *id)?;
                u.location = Location::Working(*colony);
                u.moves_left = 0;
                Ok(ServerResponse::Ok)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{GameMap, Terrain, TilePos};

    fn setup() -> (World, LocalServer, PlayerId) {
        let mut map = GameMap::new(8, 6, Terrain::Plains);
        for y in 0..6 {
            map.set_terrain(TilePos::new(0, y), Terrain::HighSeas);
            map.set_terrain(TilePos::new(1, y), Terrain::Ocean);
        }
        let mut world = World::new(map);
        let dutch = world.add_player("Dutch", PlayerKind::European);
        (world, LocalServer::new(2), dutch)
    }

    #[test]
    fn test_move_spends_terrain_cost() {
        let (mut world, mut server, dutch) = setup();
        world.map.set_terrain(TilePos::new(4, 2), Terrain::Hills);
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(3, 2)));
        server.ask(&mut world, &ServerRequest::Move { unit: u, direction: Direction::E }).unwrap();
        assert_eq!(world.unit(u).unwrap().moves_left, 1);
        assert_eq!(world.unit_tile(u), Some(TilePos::new(4, 2)));
        // one point left is not enough for more hills
        world.map.set_terrain(TilePos::new(5, 2), Terrain::Hills);
        assert!(server.ask(&mut world, &ServerRequest::Move { unit: u, direction: Direction::E }).is_err());
    }

    #[test]
    fn test_build_colony_turns_founder_into_worker() {
        let (mut world, mut server, dutch) = setup();
        let u = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(4, 3)));
        server
            .ask(&mut world, &ServerRequest::BuildColony { unit: u, name: "Fort Nassau".into() })
            .unwrap();
        let colony = world.settlement_at(TilePos::new(4, 3)).unwrap();
        assert_eq!(colony.colony().unwrap().workers, vec![u]);
        assert_eq!(world.unit(u).unwrap().location, Location::Working(colony.id));
    }

    #[test]
    fn test_sailing_round_trip() {
        let (mut world, mut server, dutch) = setup();
        world.player_mut(dutch).unwrap().entry_location = TilePos::new(0, 4);
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Tile(TilePos::new(0, 2)));
        server.ask(&mut world, &ServerRequest::MoveToEurope { unit: ship }).unwrap();
        world.advance_turn();
        world.advance_turn();
        assert_eq!(world.unit(ship).unwrap().location, Location::Europe);
        server.ask(&mut world, &ServerRequest::MoveToAmerica { unit: ship }).unwrap();
        world.advance_turn();
        world.advance_turn();
        assert_eq!(world.unit_tile(ship), Some(TilePos::new(0, 4)));
    }

    #[test]
    fn test_buy_and_sell_goods() {
        let (mut world, mut server, dutch) = setup();
        world.player_mut(dutch).unwrap().gold = 1000;
        let ship = world.spawn_unit(dutch, UnitType::Caravel, Location::Europe);
        server
            .ask(&mut world, &ServerRequest::BuyGoods { carrier: ship, goods_type: GoodsType::Tools, amount: 100 })
            .unwrap();
        assert_eq!(world.player(dutch).unwrap().gold, 800);
        server
            .ask(&mut world, &ServerRequest::SellGoods { carrier: ship, goods: Goods::new(GoodsType::Tools, 100) })
            .unwrap();
        assert_eq!(world.player(dutch).unwrap().gold, 900);
        assert!(world.unit(ship).unwrap().cargo.is_empty());
    }

    #[test]
    fn test_demand_accepted_only_when_colony_can_pay() {
        let (mut world, mut server, dutch) = setup();
        let natives = world.add_player("Sioux", PlayerKind::Native);
        let colony = world.found_settlement(dutch, TilePos::new(5, 3), "Colony", SettlementKind::Colony(ColonyData::new(2)));
        world.settlement_mut(colony).unwrap().goods.add(GoodsType::Food, 40);
        let brave = world.spawn_unit(natives, UnitType::Brave, Location::Tile(TilePos::new(6, 3)));
        let ask = |amount| ServerRequest::IndianDemand {
            unit: brave,
            colony,
            demand: Demand::Goods(Goods::new(GoodsType::Food, amount)),
        };
        assert_eq!(server.ask(&mut world, &ask(60)), Ok(ServerResponse::Demand { accepted: false }));
        assert_eq!(server.ask(&mut world, &ask(30)), Ok(ServerResponse::Demand { accepted: true }));
        assert_eq!(world.settlement(colony).unwrap().goods.count(GoodsType::Food), 10);
    }

    #[test]
    fn test_cash_in_requires_coastal_colony() {
        let (mut world, mut server, dutch) = setup();
        let tile = TilePos::new(2, 2);
        world.found_settlement(dutch, tile, "Port", SettlementKind::Colony(ColonyData::new(2)));
        let train = world.spawn_unit(dutch, UnitType::TreasureTrain, Location::Tile(tile));
        world.unit_mut(train).unwrap().treasure = 1000;
        let reply = server.ask(&mut world, &ServerRequest::CashInTreasureTrain { unit: train });
        assert_eq!(reply, Ok(ServerResponse::CashIn { amount: 500 }));
        assert!(!world.has_unit(train));
        assert_eq!(world.player(dutch).unwrap().gold, 500);
    }
}
