//! AI bookkeeping layered over the world.
//!
//! The [`AiRegistry`] is an arena of AI wrappers keyed by typed handles:
//! [`AiUnit`] pairs a world unit with its current mission and carrier,
//! [`AiGoods`] tracks a goods lot the AI wants moved, and [`Wish`] records
//! what a colony is waiting for. All maps are ordered so that iteration is
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiConfig;
use crate::goods::{Goods, GoodsType, CARGO_SIZE};
use crate::ids::{AiGoodsId, PlayerId, SettlementId, UnitId, WishId};
use crate::missions::Mission;
use crate::transportable::{TransportPoint, TransportableRef, NORMAL_PRIORITY};
use crate::unit::UnitType;
use crate::world::World;

/// Base value of a colony's wish for another worker.
pub const WORKER_WISH_VALUE: i32 = 100;

/// Base value of a colony's wish for goods.
pub const GOODS_WISH_VALUE: i32 = 50;

/// AI state attached to one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct AiUnit {
    /// The world unit.
    pub unit: UnitId,
    /// Current mission, if any.
    pub mission: Option<Mission>,
    /// Carrier this unit is scheduled on.
    pub transport: Option<UnitId>,
    /// Created for a forward reference during restore and not yet loaded.
    pub placeholder: bool,
}

impl AiUnit {
    /// Wrapper without a mission.
    #[must_use]
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            mission: None,
            transport: None,
            placeholder: false,
        }
    }
}

/// Where an AI goods lot currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoodsLocation {
    /// In a settlement's warehouse.
    Settlement(SettlementId),
    /// On the market in Europe.
    Europe,
    /// In a carrier's hold.
    Carrier(UnitId),
}

/// A goods lot the AI wants moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiGoods {
    /// Registry handle, assigned on insertion.
    pub id: AiGoodsId,
    /// What and how much.
    pub goods: Goods,
    /// Where the lot is.
    pub location: GoodsLocation,
    /// Where the lot should go.
    pub destination: Option<TransportPoint>,
    /// Transport priority.
    pub priority: u32,
    /// Carrier the lot is scheduled on.
    pub transport: Option<UnitId>,
    /// Created for a forward reference during restore and not yet loaded.
    pub placeholder: bool,
}

impl AiGoods {
    /// A lot with normal priority and no carrier.
    #[must_use]
    pub fn new(goods: Goods, location: GoodsLocation, destination: Option<TransportPoint>) -> Self {
        Self {
            id: AiGoodsId(0),
            goods,
            location,
            destination,
            priority: NORMAL_PRIORITY,
            transport: None,
            placeholder: false,
        }
    }
}

/// What a colony wishes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WishKind {
    /// Another worker, optionally of a given type.
    Worker {
        /// Preferred unit type.
        unit_type: Option<UnitType>,
    },
    /// A delivery of goods.
    Goods {
        /// Wanted goods.
        goods_type: GoodsType,
        /// Wanted amount.
        amount: u32,
    },
}

/// A colony's outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wish {
    /// Registry handle.
    pub id: WishId,
    /// The wishing colony.
    pub colony: SettlementId,
    /// How much the colony wants it.
    pub value: i32,
    /// What is wished for.
    pub kind: WishKind,
    /// What is on its way to satisfy the wish.
    pub transportable: Option<TransportableRef>,
}

impl Wish {
    /// Whether nothing has been assigned to this wish yet.
    #[must_use]
    pub fn is_outstanding(&self) -> bool {
        self.transportable.is_none()
    }
}

/// Arena of AI wrappers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiRegistry {
    units: BTreeMap<UnitId, AiUnit>,
    goods: BTreeMap<AiGoodsId, AiGoods>,
    wishes: BTreeMap<WishId, Wish>,
    next_goods: u32,
    next_wish: u32,
}

impl AiRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Units
    // ========================================================================

    /// Register a unit, keeping any existing wrapper.
    pub fn register_unit(&mut self, unit: UnitId) -> &mut AiUnit {
        self.units.entry(unit).or_insert_with(|| AiUnit::new(unit))
    }

    /// AI wrapper of a unit.
    #[must_use]
    pub fn ai_unit(&self, unit: UnitId) -> Option<&AiUnit> {
        self.units.get(&unit)
    }

    /// Mutable AI wrapper of a unit.
    pub fn ai_unit_mut(&mut self, unit: UnitId) -> Option<&mut AiUnit> {
        self.units.get_mut(&unit)
    }

    /// All AI units in handle order.
    pub fn ai_units(&self) -> impl Iterator<Item = &AiUnit> {
        self.units.values()
    }

    /// Handles of all AI units.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Current mission of a unit.
    #[must_use]
    pub fn mission(&self, unit: UnitId) -> Option<&Mission> {
        self.units.get(&unit)?.mission.as_ref()
    }

    /// Give a unit a new mission, registering the unit if needed. Returns
    /// the mission it replaces.
    pub fn set_mission(&mut self, unit: UnitId, mission: Mission) -> Option<Mission> {
        self.register_unit(unit).mission.replace(mission)
    }

    /// Take a unit's mission out for a step.
    pub fn take_mission(&mut self, unit: UnitId) -> Option<Mission> {
        self.units.get_mut(&unit)?.mission.take()
    }

    /// Put a mission back after a step unless the step handed the unit a
    /// new mission. Returns `false` if the mission was dropped.
    pub fn restore_mission(&mut self, unit: UnitId, mission: Mission) -> bool {
        match self.units.get_mut(&unit) {
            Some(ai_unit) if ai_unit.mission.is_none() => {
                ai_unit.mission = Some(mission);
                true
            }
            _ => false,
        }
    }

    /// Drop a unit's AI state. Wishes it was meant to satisfy become
    /// outstanding again.
    pub fn remove_unit(&mut self, unit: UnitId) -> Option<AiUnit> {
        let removed = self.units.remove(&unit)?;
        self.unlink_wishes(TransportableRef::Unit(unit));
        Some(removed)
    }

    // ========================================================================
    // Goods
    // ========================================================================

    /// Insert a goods lot and assign its handle.
    pub fn add_goods(&mut self, mut goods: AiGoods) -> AiGoodsId {
        self.next_goods += 1;
        let id = AiGoodsId(self.next_goods);
        goods.id = id;
        self.goods.insert(id, goods);
        id
    }

    /// Insert a goods lot under a known handle (used by restore).
    pub fn insert_goods(&mut self, goods: AiGoods) {
        self.next_goods = self.next_goods.max(goods.id.raw());
        self.goods.insert(goods.id, goods);
    }

    /// Goods lot by handle.
    #[must_use]
    pub fn goods(&self, id: AiGoodsId) -> Option<&AiGoods> {
        self.goods.get(&id)
    }

    /// Mutable goods lot by handle.
    pub fn goods_mut(&mut self, id: AiGoodsId) -> Option<&mut AiGoods> {
        self.goods.get_mut(&id)
    }

    /// All goods lots in handle order.
    pub fn all_goods(&self) -> impl Iterator<Item = &AiGoods> {
        self.goods.values()
    }

    /// Forget a goods lot and unlink any wish waiting for it.
    pub fn dispose_goods(&mut self, id: AiGoodsId) -> Option<AiGoods> {
        let removed = self.goods.remove(&id)?;
        self.unlink_wishes(TransportableRef::Goods(id));
        Some(removed)
    }

    // ========================================================================
    // Transport links
    // ========================================================================

    /// Assign (or clear) the carrier of a transportable.
    pub fn set_transport(&mut self, item: TransportableRef, carrier: Option<UnitId>) {
        match item {
            TransportableRef::Unit(id) => {
                if let Some(u) = self.units.get_mut(&id) {
                    u.transport = carrier;
                }
            }
            TransportableRef::Goods(id) => {
                if let Some(g) = self.goods.get_mut(&id) {
                    g.transport = carrier;
                }
            }
        }
    }

    /// Every transportable the registry knows about, units first.
    #[must_use]
    pub fn transportables(&self) -> Vec<TransportableRef> {
        self.units
            .keys()
            .map(|id| TransportableRef::Unit(*id))
            .chain(self.goods.keys().map(|id| TransportableRef::Goods(*id)))
            .collect()
    }

    // ========================================================================
    // Wishes
    // ========================================================================

    /// All wishes in handle order.
    pub fn wishes(&self) -> impl Iterator<Item = &Wish> {
        self.wishes.values()
    }

    /// Wish by handle.
    #[must_use]
    pub fn wish(&self, id: WishId) -> Option<&Wish> {
        self.wishes.get(&id)
    }

    /// Mutable wish by handle.
    pub fn wish_mut(&mut self, id: WishId) -> Option<&mut Wish> {
        self.wishes.get_mut(&id)
    }

    /// Add a wish and assign its handle.
    pub fn add_wish(&mut self, colony: SettlementId, value: i32, kind: WishKind) -> WishId {
        self.next_wish += 1;
        let id = WishId(self.next_wish);
        self.wishes.insert(
            id,
            Wish {
                id,
                colony,
                value,
                kind,
                transportable: None,
            },
        );
        id
    }

    /// Insert a wish under a known handle (used by restore).
    pub fn insert_wish(&mut self, wish: Wish) {
        self.next_wish = self.next_wish.max(wish.id.raw());
        self.wishes.insert(wish.id, wish);
    }

    /// Remove a fulfilled or obsolete wish.
    pub fn remove_wish(&mut self, id: WishId) -> Option<Wish> {
        self.wishes.remove(&id)
    }

    fn unlink_wishes(&mut self, item: TransportableRef) {
        for wish in self.wishes.values_mut() {
            if wish.transportable == Some(item) {
                wish.transportable = None;
            }
        }
    }

    /// Bring the wishes of a player's colonies up to date.
    ///
    /// Each colony wishes for one worker per vacant work place and for a
    /// load of tools while its stock is at or below the threshold. Wishes of
    /// colonies that are gone are dropped, as are surplus worker wishes
    /// nobody has been assigned to.
    pub fn refresh_wishes(&mut self, world: &World, player: PlayerId, config: &AiConfig) {
        let stale: Vec<WishId> = self
            .wishes
            .values()
            .filter(|w| !world.settlement(w.colony).is_some_and(|s| s.is_colony()))
            .map(|w| w.id)
            .collect();
        for id in stale {
            debug!(wish = %id, "dropping stale wish");
            self.wishes.remove(&id);
        }

        // Links to things that no longer exist.
        let dangling: Vec<WishId> = self
            .wishes
            .values()
            .filter(|w| match w.transportable {
                Some(TransportableRef::Unit(u)) => !world.has_unit(u),
                Some(TransportableRef::Goods(g)) => !self.goods.contains_key(&g),
                None => false,
            })
            .map(|w| w.id)
            .collect();
        for id in dangling {
            if let Some(w) = self.wishes.get_mut(&id) {
                w.transportable = None;
            }
        }

        let colonies: Vec<(SettlementId, u32, u32)> = world
            .colonies_of(player)
            .map(|s| (s.id, s.vacancies(), s.goods.count(GoodsType::Tools)))
            .collect();
        for (colony, vacancies, tools) in colonies {
            let workers: Vec<&Wish> = self
                .wishes
                .values()
                .filter(|w| w.colony == colony && matches!(w.kind, WishKind::Worker { .. }))
                .collect();
            let wanted = vacancies as usize;
            if workers.len() > wanted {
                let surplus: Vec<WishId> = workers
                    .iter()
                    .rev()
                    .filter(|w| w.is_outstanding())
                    .take(workers.len() - wanted)
                    .map(|w| w.id)
                    .collect();
                for id in surplus {
                    self.wishes.remove(&id);
                }
            } else {
                for _ in workers.len()..wanted {
                    self.add_wish(
                        colony,
                        WORKER_WISH_VALUE + 10 * vacancies as i32,
                        WishKind::Worker { unit_type: None },
                    );
                }
            }

            let has_tools_wish = self.wishes.values().any(|w| {
                w.colony == colony
                    && matches!(
                        w.kind,
                        WishKind::Goods {
                            goods_type: GoodsType::Tools,
                            ..
                        }
                    )
            });
            if tools <= config.goods_wish_threshold && !has_tools_wish {
                self.add_wish(
                    colony,
                    GOODS_WISH_VALUE + (config.goods_wish_threshold - tools) as i32,
                    WishKind::Goods {
                        goods_type: GoodsType::Tools,
                        amount: CARGO_SIZE - tools,
                    },
                );
            } else if tools > config.goods_wish_threshold {
                self.wishes.retain(|_, w| {
                    !(w.colony == colony
                        && w.is_outstanding()
                        && matches!(
                            w.kind,
                            WishKind::Goods {
                                goods_type: GoodsType::Tools,
                                ..
                            }
                        ))
                });
            }
        }
    }
}
