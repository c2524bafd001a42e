//! Hunt down a unit or settlement and attack it.
//!
//! Targets are ranked by [`score_path`]: close targets beat distant ones by
//! 100 points per turn, and the rest of the score compares the attacker's
//! strength with what it would face. [`INVALID_SCORE`] marks targets that
//! must never be picked.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{move_towards, standing_tile, DefendSettlementMission, InvalidReason, Mission, MissionContext, Target, UnitMission};
use crate::ai::AiRegistry;
use crate::combat::offence_power;
use crate::error::{AiError, Result};
use crate::goal::{BestPathDecider, INVALID_SCORE};
use crate::ids::UnitId;
use crate::map::Direction;
use crate::math::{scaled, Fixed};
use crate::pathfinding::{find_path, search, CostDecider, Path};
use crate::protocol::ServerRequest;
use crate::settlement::Settlement;
use crate::transportable::{needs_transport, TransportPoint};
use crate::unit::Unit;
use crate::world::{MoveType, World};

/// Score of an adjacent target before any modifier.
pub const BASE_SCORE: i32 = 1020;

/// Penalty per turn of travel.
pub const TURN_PENALTY: i32 = 100;

// ============================================================================
// Scoring
// ============================================================================

/// Score of attacking `settlement` after `turns` turns of travel.
#[must_use]
pub fn score_settlement(world: &World, attacker: &Unit, settlement: &Settlement, turns: u32) -> i32 {
    if settlement_invalid_reason(world, attacker, settlement).is_some() {
        return INVALID_SCORE;
    }
    let mut score = BASE_SCORE - TURN_PENALTY * turns as i32 + scaled(offence_power(attacker), 50);
    if settlement.is_colony() {
        score -= 200 * settlement.stockade_level() as i32;
        score += 50 * world.units_at(settlement.tile).count() as i32;
    }
    if let Some(camp) = settlement.native() {
        score += camp.alarm_towards(attacker.owner).value() / 2;
    }
    score
}

/// Score of attacking `defender` after `turns` turns of travel.
#[must_use]
pub fn score_unit(world: &World, attacker: &Unit, defender: &Unit, turns: u32) -> i32 {
    let offence = offence_power(attacker);
    if offence <= Fixed::ZERO || unit_invalid_reason(world, attacker, defender).is_some() {
        return INVALID_SCORE;
    }
    let Some(tile) = world.unit_tile(defender.id) else {
        return INVALID_SCORE;
    };
    let mut score = BASE_SCORE - TURN_PENALTY * turns as i32 + scaled(offence - world.defence_of(defender), 100);
    if world
        .units_at(tile)
        .any(|u| u.is_treasure_train() && u.owner != attacker.owner)
    {
        score += 1000;
    }
    if defender.is_naval() && world.map.is_land(tile) {
        score += 500;
    }
    if defender.unit_type.is_expert_soldier() && !defender.armed {
        score += 100;
    }
    score
}

/// Score the target at the end of `path`.
#[must_use]
pub fn score_path(world: &World, attacker: &Unit, path: &Path) -> i32 {
    let tile = path.destination();
    if let Some(settlement) = world.settlement_at(tile) {
        return score_settlement(world, attacker, settlement, path.turns());
    }
    match world.best_defender_at(tile) {
        Some(defender) if defender.owner != attacker.owner => score_unit(world, attacker, defender, path.turns()),
        _ => INVALID_SCORE,
    }
}

/// Best target reachable within `max_turns`, with the path to it.
#[must_use]
pub fn find_target(world: &World, unit: UnitId, max_turns: u32) -> Option<(Target, Path)> {
    let mut decider = BestPathDecider::new(score_path);
    let path = search(world, unit, &mut decider, CostDecider::AvoidSettlementsAndBlockers, max_turns, None)?;
    let tile = path.destination();
    let target = match world.settlement_at(tile) {
        Some(s) => Target::Settlement(s.id),
        None => Target::Unit(world.best_defender_at(tile)?.id),
    };
    Some((target, path))
}

fn settlement_invalid_reason(world: &World, attacker: &Unit, settlement: &Settlement) -> Option<InvalidReason> {
    if settlement.owner == attacker.owner {
        Some(InvalidReason::TargetOwnedBySelf)
    } else if attacker.is_naval() {
        Some(InvalidReason::NavalAgainstSettlement)
    } else if !world.can_attack(attacker.owner, settlement.owner) {
        Some(InvalidReason::CannotAttack)
    } else {
        None
    }
}

fn unit_invalid_reason(world: &World, attacker: &Unit, defender: &Unit) -> Option<InvalidReason> {
    if defender.owner == attacker.owner {
        Some(InvalidReason::TargetOwnedBySelf)
    } else if !world.can_attack(attacker.owner, defender.owner) {
        Some(InvalidReason::CannotAttack)
    } else {
        None
    }
}

// ============================================================================
// Mission
// ============================================================================

/// Travel to a target and attack it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeekAndDestroyMission {
    unit: UnitId,
    target: Target,
}

impl SeekAndDestroyMission {
    /// Element name in saved games.
    pub const NAME: &'static str = "unitSeekAndDestroyMission";

    /// Send an offensive unit after `target`.
    pub fn new(world: &World, unit: UnitId, target: Target) -> Result<Self> {
        let u = world.unit(unit).ok_or(AiError::UnknownUnit(unit))?;
        if !u.is_offensive() {
            return Err(AiError::InvalidMissionUnit {
                mission: Self::NAME,
                unit,
                reason: "unit cannot attack",
            });
        }
        match target {
            Target::Settlement(id) => {
                world.settlement(id).ok_or(AiError::UnknownSettlement(id))?;
            }
            Target::Unit(id) => {
                world.unit(id).ok_or(AiError::UnknownUnit(id))?;
            }
            Target::Tile(_) => {}
        }
        Ok(Self { unit, target })
    }

    /// Rebuild from saved state without checking the references.
    pub(crate) fn restored(unit: UnitId, target: Target) -> Self {
        Self { unit, target }
    }

    /// The long-term target.
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Attack in `direction`, unless the unit is the last line of defence
    /// of the settlement it stands in. Returns `true` if the unit was
    /// reassigned instead.
    fn attack_or_defend(&self, ctx: &mut MissionContext<'_>, direction: Direction) -> Result<bool> {
        let home = standing_tile(ctx.world, self.unit)
            .and_then(|tile| ctx.world.settlement_at(tile))
            .filter(|s| ctx.world.unit(self.unit).is_some_and(|u| u.owner == s.owner && !u.is_naval()))
            .map(|s| s.id);
        if let Some(home) = home {
            if ctx.world.defender_count(home) < ctx.config.minimum_defenders {
                info!(unit = %self.unit, settlement = %home, "staying home to defend");
                let defend = DefendSettlementMission::new(ctx.world, self.unit, home)?;
                ctx.ai.set_mission(self.unit, Mission::DefendSettlement(defend));
                return Ok(true);
            }
        }
        ctx.send(ServerRequest::Attack {
            unit: self.unit,
            direction,
        });
        Ok(false)
    }
}

impl UnitMission for SeekAndDestroyMission {
    fn unit(&self) -> UnitId {
        self.unit
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn invalid_reason(&self, world: &World, _ai: &AiRegistry) -> Option<InvalidReason> {
        let Some(unit) = world.unit(self.unit) else {
            return Some(InvalidReason::UnitDisposed);
        };
        if !unit.is_offensive() {
            return Some(InvalidReason::NotOffensive);
        }
        match self.target {
            Target::Settlement(id) => match world.settlement(id) {
                Some(s) => settlement_invalid_reason(world, unit, s),
                None => Some(InvalidReason::TargetDisposed),
            },
            Target::Unit(id) => match world.unit(id) {
                Some(defender) => unit_invalid_reason(world, unit, defender),
                None => Some(InvalidReason::TargetDisposed),
            },
            Target::Tile(tile) => (!world.map.in_bounds(tile)).then_some(InvalidReason::TargetDisposed),
        }
    }

    fn do_mission(&mut self, ctx: &mut MissionContext<'_>) -> Result<()> {
        if !self.is_valid(ctx.world, ctx.ai) {
            return Ok(());
        }
        let Some(here) = standing_tile(ctx.world, self.unit) else {
            return Ok(());
        };
        // A target of opportunity is hit this turn without dropping the
        // long-term target.
        let target = match find_target(ctx.world, self.unit, ctx.config.opportunity_range) {
            Some((opportunity, _)) if opportunity != self.target => {
                debug!(unit = %self.unit, target = %opportunity, "target of opportunity");
                opportunity
            }
            _ => self.target,
        };
        let Some(tile) = target.tile(ctx.world) else {
            return Ok(());
        };
        let Some(path) = find_path(ctx.world, self.unit, here, tile, None, CostDecider::AvoidSettlementsAndBlockers) else {
            return Ok(());
        };
        let this = &*self;
        let pending = move_towards(ctx, self.unit, &path, &|w: &World, ai: &AiRegistry| this.is_valid(w, ai));
        let Some(direction) = pending else {
            return Ok(());
        };
        match ctx.world.move_type_now(self.unit, direction) {
            MoveType::Attack => {
                self.attack_or_defend(ctx, direction)?;
            }
            move_type if move_type.is_progressing() => {
                ctx.move_unit(self.unit, direction);
            }
            _ => {}
        }
        Ok(())
    }

    fn transport_destination(&self, world: &World, _ai: &AiRegistry) -> Option<TransportPoint> {
        if world.unit(self.unit)?.is_naval() {
            return None;
        }
        let tile = self.target.tile(world)?;
        needs_transport(world, self.unit, tile).then_some(TransportPoint::Tile(tile))
    }
}
