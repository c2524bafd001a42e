//! Error types for the AI mission core.

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::ids::{AiGoodsId, PlayerId, SettlementId, UnitId, WishId};

/// Result type alias using [`AiError`].
pub type Result<T> = std::result::Result<T, AiError>;

/// Top-level error type for the AI core.
///
/// Mission invalidation is not an error: it is reported through
/// [`InvalidReason`](crate::missions::InvalidReason). Errors are reserved for
/// programmer mistakes in mission assignment and for persistence failures.
#[derive(Debug, Error)]
pub enum AiError {
    /// A unit handle did not resolve.
    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// A settlement handle did not resolve.
    #[error("Unknown settlement: {0}")]
    UnknownSettlement(SettlementId),

    /// A player handle did not resolve.
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    /// An AI goods handle did not resolve.
    #[error("Unknown AI goods: {0}")]
    UnknownGoods(AiGoodsId),

    /// A wish handle did not resolve.
    #[error("Unknown wish: {0}")]
    UnknownWish(WishId),

    /// A mission was constructed for a unit that cannot carry it out.
    #[error("{mission} cannot be assigned to {unit}: {reason}")]
    InvalidMissionUnit {
        /// Mission element name.
        mission: &'static str,
        /// The offending unit.
        unit: UnitId,
        /// Why the unit was rejected.
        reason: &'static str,
    },

    /// A carrier was offered as cargo to another carrier.
    #[error("Carrier {0} cannot be added to a transport list")]
    CarrierAsCargo(UnitId),

    /// A request to the server failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Saving or restoring AI state failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    Config(String),
}
