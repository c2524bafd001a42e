//! Goods types, goods stacks and settlement warehouses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum amount in one cargo slot.
pub const CARGO_SIZE: u32 = 100;

/// Goods types, in catalogue order.
///
/// The declaration order matters: demand selection walks categories in this
/// order and takes the first match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GoodsType {
    /// Food (the primary food type).
    Food,
    /// Sugar.
    Sugar,
    /// Tobacco.
    Tobacco,
    /// Cotton.
    Cotton,
    /// Furs.
    Furs,
    /// Lumber.
    Lumber,
    /// Ore.
    Ore,
    /// Silver.
    Silver,
    /// Horses.
    Horses,
    /// Rum.
    Rum,
    /// Cigars.
    Cigars,
    /// Cloth.
    Cloth,
    /// Coats.
    Coats,
    /// Trade goods.
    TradeGoods,
    /// Tools.
    Tools,
    /// Muskets.
    Muskets,
}

impl GoodsType {
    /// All goods types in catalogue order.
    pub const ALL: [GoodsType; 16] = [
        GoodsType::Food,
        GoodsType::Sugar,
        GoodsType::Tobacco,
        GoodsType::Cotton,
        GoodsType::Furs,
        GoodsType::Lumber,
        GoodsType::Ore,
        GoodsType::Silver,
        GoodsType::Horses,
        GoodsType::Rum,
        GoodsType::Cigars,
        GoodsType::Cloth,
        GoodsType::Coats,
        GoodsType::TradeGoods,
        GoodsType::Tools,
        GoodsType::Muskets,
    ];

    /// Food types are eaten, not traded.
    #[must_use]
    pub const fn is_food(self) -> bool {
        matches!(self, Self::Food)
    }

    /// Goods used to arm or mount units.
    #[must_use]
    pub const fn is_military(self) -> bool {
        matches!(self, Self::Horses | Self::Muskets)
    }

    /// Storable goods consumed by construction.
    #[must_use]
    pub const fn is_building_material(self) -> bool {
        matches!(self, Self::Tools)
    }

    /// Goods made for trading with natives.
    #[must_use]
    pub const fn is_trade_goods(self) -> bool {
        matches!(self, Self::TradeGoods)
    }

    /// Goods produced from a raw material.
    #[must_use]
    pub const fn is_refined(self) -> bool {
        matches!(
            self,
            Self::Rum | Self::Cigars | Self::Cloth | Self::Coats | Self::Tools | Self::Muskets
        )
    }

    /// Raw goods native to the New World.
    #[must_use]
    pub const fn is_new_world(self) -> bool {
        matches!(
            self,
            Self::Sugar | Self::Tobacco | Self::Cotton | Self::Furs | Self::Silver
        )
    }

    /// Per-unit sale price in Europe.
    #[must_use]
    pub const fn sale_price(self) -> u32 {
        match self {
            Self::Food => 1,
            Self::Sugar | Self::Tobacco | Self::Cotton => 3,
            Self::Furs => 4,
            Self::Lumber => 1,
            Self::Ore => 2,
            Self::Silver => 19,
            Self::Horses => 2,
            Self::Rum | Self::Cigars | Self::Cloth | Self::Coats => 10,
            Self::TradeGoods => 1,
            Self::Tools => 1,
            Self::Muskets => 2,
        }
    }

    /// Per-unit purchase price in Europe.
    #[must_use]
    pub const fn buy_price(self) -> u32 {
        self.sale_price() + 1
    }
}

/// A stack of goods of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goods {
    /// Goods type.
    pub goods_type: GoodsType,
    /// Amount.
    pub amount: u32,
}

impl Goods {
    /// Create a stack.
    #[must_use]
    pub const fn new(goods_type: GoodsType, amount: u32) -> Self {
        Self { goods_type, amount }
    }

    /// Sale value of the whole stack in Europe.
    #[must_use]
    pub const fn sale_value(&self) -> u32 {
        self.goods_type.sale_price() * self.amount
    }
}

/// Warehouse of a settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoodsStore {
    amounts: BTreeMap<GoodsType, u32>,
}

impl GoodsStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount held of a type.
    #[must_use]
    pub fn count(&self, goods_type: GoodsType) -> u32 {
        self.amounts.get(&goods_type).copied().unwrap_or(0)
    }

    /// Add goods.
    pub fn add(&mut self, goods_type: GoodsType, amount: u32) {
        if amount > 0 {
            *self.amounts.entry(goods_type).or_insert(0) += amount;
        }
    }

    /// Remove up to `amount`; returns the amount actually removed.
    pub fn remove(&mut self, goods_type: GoodsType, amount: u32) -> u32 {
        let held = self.count(goods_type);
        let taken = held.min(amount);
        if taken == held {
            self.amounts.remove(&goods_type);
        } else {
            self.amounts.insert(goods_type, held - taken);
        }
        taken
    }

    /// Non-empty stacks in catalogue order.
    pub fn stacks(&self) -> impl Iterator<Item = Goods> + '_ {
        self.amounts
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(goods_type, amount)| Goods::new(*goods_type, *amount))
    }

    /// Whether the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks().next().is_none()
    }
}
