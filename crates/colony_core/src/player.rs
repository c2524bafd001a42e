//! Players, diplomatic stance and native tension.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;
use crate::map::TilePos;
use crate::unit::UnitType;

/// Upper bound of the tension scale.
pub const TENSION_MAX: i32 = 1000;

/// Named bands of the tension scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TensionLevel {
    /// Up to 100.
    Happy,
    /// Up to 600.
    Content,
    /// Up to 700.
    Displeased,
    /// Up to 800.
    Angry,
    /// Anything above.
    Hateful,
}

impl TensionLevel {
    /// Inclusive upper limit of the band.
    #[must_use]
    pub const fn limit(self) -> i32 {
        match self {
            Self::Happy => 100,
            Self::Content => 600,
            Self::Displeased => 700,
            Self::Angry => 800,
            Self::Hateful => TENSION_MAX,
        }
    }
}

/// Scalar hostility of a native faction or camp towards a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tension(i32);

impl Tension {
    /// Tension with the given raw value, clamped to the scale.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self(value.clamp(0, TENSION_MAX))
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Band the value falls into.
    #[must_use]
    pub fn level(self) -> TensionLevel {
        [
            TensionLevel::Happy,
            TensionLevel::Content,
            TensionLevel::Displeased,
            TensionLevel::Angry,
        ]
        .into_iter()
        .find(|level| self.0 <= level.limit())
        .unwrap_or(TensionLevel::Hateful)
    }

    /// Add `delta`, clamping to the scale.
    pub fn modify(&mut self, delta: i32) {
        *self = Self::new(self.0.saturating_add(delta));
    }
}

/// Player kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerKind {
    /// A colonial power with access to Europe.
    European,
    /// A native nation.
    Native,
}

/// Diplomatic stance between two players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    /// Not yet met.
    #[default]
    UnContacted,
    /// At peace.
    Peace,
    /// At war.
    War,
}

/// The player's market and docks in the Old World.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Europe {
    /// Unit types currently offered on the docks for recruitment.
    pub recruitables: Vec<UnitType>,
    /// Current price of a recruit.
    pub recruit_price: u32,
}

impl Default for Europe {
    fn default() -> Self {
        Self {
            recruitables: vec![
                UnitType::FreeColonist,
                UnitType::IndenturedServant,
                UnitType::ExpertFarmer,
            ],
            recruit_price: 200,
        }
    }
}

/// A player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Player handle.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// European or native.
    pub kind: PlayerKind,
    /// Treasury.
    pub gold: u32,
    /// Tension towards other players (natives only).
    pub tension: BTreeMap<PlayerId, Tension>,
    /// Stance towards other players.
    pub stance: BTreeMap<PlayerId, Stance>,
    /// Europe (European players only).
    pub europe: Option<Europe>,
    /// Where ships from Europe arrive.
    pub entry_location: TilePos,
}

impl Player {
    /// Create a player with an empty treasury.
    #[must_use]
    pub fn new(id: PlayerId, name: impl Into<String>, kind: PlayerKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            gold: 0,
            tension: BTreeMap::new(),
            stance: BTreeMap::new(),
            europe: (kind == PlayerKind::European).then(Europe::default),
            entry_location: TilePos::new(0, 0),
        }
    }

    /// Whether this is a European player.
    #[must_use]
    pub fn is_european(&self) -> bool {
        self.kind == PlayerKind::European
    }

    /// Tension towards another player.
    #[must_use]
    pub fn tension_towards(&self, other: PlayerId) -> Tension {
        self.tension.get(&other).copied().unwrap_or_default()
    }

    /// Stance towards another player.
    #[must_use]
    pub fn stance_towards(&self, other: PlayerId) -> Stance {
        self.stance.get(&other).copied().unwrap_or_default()
    }

    /// Whether the player can pay `amount`.
    #[must_use]
    pub fn can_afford(&self, amount: u32) -> bool {
        self.gold >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tension_levels() {
        assert_eq!(Tension::new(0).level(), TensionLevel::Happy);
        assert_eq!(Tension::new(100).level(), TensionLevel::Happy);
        assert_eq!(Tension::new(101).level(), TensionLevel::Content);
        assert_eq!(Tension::new(650).level(), TensionLevel::Displeased);
        assert_eq!(Tension::new(750).level(), TensionLevel::Angry);
        assert_eq!(Tension::new(900).level(), TensionLevel::Hateful);
    }

    #[test]
    fn test_tension_clamps() {
        let mut t = Tension::new(950);
        t.modify(500);
        assert_eq!(t.value(), TENSION_MAX);
        t.modify(-5000);
        assert_eq!(t.value(), 0);
    }

    #[test]
    fn test_only_europeans_have_europe() {
        assert!(Player::new(PlayerId(1), "Dutch", PlayerKind::European)
            .europe
            .is_some());
        assert!(Player::new(PlayerId(2), "Arawak", PlayerKind::Native)
            .europe
            .is_none());
    }
}
