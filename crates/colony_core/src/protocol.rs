//! Requests the AI sends to the server and the replies it gets back.
//!
//! Every action a mission takes is one [`ServerRequest`]. The request names
//! match the server's message names so that a recorded request log reads the
//! same as a server trace:
//!
//! ```text
//! {"request":"move","unit":12,"direction":"NE"}
//! {"request":"buildColony","unit":12,"name":"New Amsterdam"}
//! {"request":"indianDemand","unit":31,"colony":4,"demand":{"goods":{"goods_type":"Food","amount":33}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::goods::{Goods, GoodsType};
use crate::ids::{PlayerId, SettlementId, UnitId};
use crate::map::Direction;
use crate::unit::{UnitState, UnitType};

// ============================================================================
// Requests (AI -> server)
// ============================================================================

/// What a native unit demands from a colony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Demand {
    /// A goods stack from the warehouse.
    Goods(Goods),
    /// Gold from the colony owner's treasury.
    Gold(u32),
}

/// A single action request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "camelCase")]
pub enum ServerRequest {
    /// Found a colony on the unit's tile.
    BuildColony { unit: UnitId, name: String },
    /// Attack the adjacent tile.
    Attack { unit: UnitId, direction: Direction },
    /// Change the unit's activity state (fortify, sentry).
    ChangeState { unit: UnitId, state: UnitState },
    /// Move one tile.
    Move { unit: UnitId, direction: Direction },
    /// Sail from the high seas to Europe.
    MoveToEurope { unit: UnitId },
    /// Sail from Europe to the New World.
    MoveToAmerica { unit: UnitId },
    /// Explore the lost city rumour on the adjacent tile.
    Explore { unit: UnitId, direction: Direction },
    /// Native demand for tribute.
    IndianDemand {
        unit: UnitId,
        colony: SettlementId,
        demand: Demand,
    },
    /// Hand the carried goods to a settlement as a gift.
    DeliverGift {
        unit: UnitId,
        settlement: SettlementId,
        goods: Goods,
    },
    /// Board a carrier.
    BoardShip { unit: UnitId, carrier: UnitId },
    /// Buy goods in Europe onto a carrier.
    BuyGoods {
        carrier: UnitId,
        goods_type: GoodsType,
        amount: u32,
    },
    /// Sell goods from a carrier in Europe.
    SellGoods { carrier: UnitId, goods: Goods },
    /// Load goods from the settlement the carrier is in.
    LoadCargo { carrier: UnitId, goods: Goods },
    /// Unload goods into the settlement the carrier is in.
    UnloadCargo { carrier: UnitId, goods: Goods },
    /// Leave the carrier.
    Disembark { unit: UnitId },
    /// Turn a treasure train into gold.
    CashInTreasureTrain { unit: UnitId },
    /// Recruit the unit waiting on the docks in the given slot.
    RecruitUnit { player: PlayerId, slot: usize },
    /// Train a unit of the given type in Europe.
    TrainUnit {
        player: PlayerId,
        unit_type: UnitType,
    },
    /// Take up a work place inside a colony.
    JoinColony { unit: UnitId, colony: SettlementId },
}

impl ServerRequest {
    /// Message name, as it appears in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BuildColony { .. } => "buildColony",
            Self::Attack { .. } => "attack",
            Self::ChangeState { .. } => "changeState",
            Self::Move { .. } => "move",
            Self::MoveToEurope { .. } => "moveToEurope",
            Self::MoveToAmerica { .. } => "moveToAmerica",
            Self::Explore { .. } => "explore",
            Self::IndianDemand { .. } => "indianDemand",
            Self::DeliverGift { .. } => "deliverGift",
            Self::BoardShip { .. } => "boardShip",
            Self::BuyGoods { .. } => "buyGoods",
            Self::SellGoods { .. } => "sellGoods",
            Self::LoadCargo { .. } => "loadCargo",
            Self::UnloadCargo { .. } => "unloadCargo",
            Self::Disembark { .. } => "disembark",
            Self::CashInTreasureTrain { .. } => "cashInTreasureTrain",
            Self::RecruitUnit { .. } => "recruitUnit",
            Self::TrainUnit { .. } => "trainUnit",
            Self::JoinColony { .. } => "joinColony",
        }
    }
}

// ============================================================================
// Responses (server -> AI)
// ============================================================================

/// Reply to a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "camelCase")]
pub enum ServerResponse {
    /// The request was carried out.
    Ok,
    /// Outcome of a native demand.
    Demand { accepted: bool },
    /// A unit was created (recruit, train, new colony founder replacement).
    UnitCreated { unit: UnitId },
    /// Gold received for a treasure train.
    CashIn { amount: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_names_match_serde_tags() {
        let request = ServerRequest::MoveToEurope { unit: UnitId(3) };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(&format!("\"request\":\"{}\"", request.name())));
    }

    #[test]
    fn test_demand_reply_round_trips() {
        let reply = ServerResponse::Demand { accepted: true };
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"reply":"demand","accepted":true}"#);
        let back: ServerResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reply);
    }
}
