//! Combat power estimates.
//!
//! The AI never resolves combat itself; it only compares the numeric
//! strength signals the rules expose. Strength is built from a unit's base
//! values plus equipment, then scaled by percentage modifiers:
//! - Muskets add offence and defence
//! - Horses add offence and defence
//! - Expert soldiers get a bonus when armed
//! - Fortified units and settlement stockades boost defence

use crate::math::{percent, share, Fixed};
use crate::unit::{Unit, UnitState};

/// Offence added by muskets.
pub const ARMED_OFFENCE: u32 = 2;
/// Defence added by muskets.
pub const ARMED_DEFENCE: u32 = 1;
/// Offence added by horses.
pub const MOUNTED_OFFENCE: u32 = 1;
/// Defence added by horses.
pub const MOUNTED_DEFENCE: u32 = 1;
/// Percentage bonus for armed expert soldiers.
pub const VETERAN_BONUS: i32 = 50;
/// Percentage bonus for fortified units.
pub const FORTIFY_BONUS: i32 = 50;
/// Percentage bonus per stockade level.
pub const STOCKADE_BONUS: i32 = 100;

/// Offensive strength of a unit. Zero for units that cannot attack.
#[must_use]
pub fn offence_power(unit: &Unit) -> Fixed {
    let mut base = unit.unit_type.base_offence();
    if unit.armed {
        base += ARMED_OFFENCE;
    }
    if unit.mounted {
        base += MOUNTED_OFFENCE;
    }
    let mut power = Fixed::from_num(base);
    if unit.armed && unit.unit_type.is_expert_soldier() {
        power += power * percent(VETERAN_BONUS);
    }
    power
}

/// Defensive strength of a unit.
///
/// `stockade_level` is the level of the settlement the unit stands in, if
/// any. Units inside a settlement always count as fortified.
#[must_use]
pub fn defence_power(unit: &Unit, in_settlement: bool, stockade_level: u32) -> Fixed {
    let mut base = unit.unit_type.base_defence();
    if unit.armed {
        base += ARMED_DEFENCE;
    }
    if unit.mounted {
        base += MOUNTED_DEFENCE;
    }
    let base = Fixed::from_num(base);
    let mut bonus = 0;
    if unit.armed && unit.unit_type.is_expert_soldier() {
        bonus += VETERAN_BONUS;
    }
    if in_settlement || unit.state == UnitState::Fortified {
        bonus += FORTIFY_BONUS;
    }
    bonus += STOCKADE_BONUS * stockade_level as i32;
    base + base * percent(bonus)
}

/// Net advantage of attacking:
/// `our_attack / (our_attack + their_defence) - their_attack / (their_attack + our_defence)`.
///
/// Positive values favour the attacker.
#[must_use]
pub fn attack_advantage(
    our_attack: Fixed,
    our_defence: Fixed,
    their_attack: Fixed,
    their_defence: Fixed,
) -> Fixed {
    share(our_attack, their_defence) - share(their_attack, our_defence)
}
