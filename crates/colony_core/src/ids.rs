//! Typed handles into the world and AI registries.
//!
//! Every cross-object reference held by a mission is one of these handles,
//! resolved against the live registry on use. A handle that no longer
//! resolves means the referenced object was disposed.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Raw numeric value of the handle.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

handle!(
    /// Handle to a [`Unit`](crate::unit::Unit) in the world.
    UnitId,
    "unit"
);
handle!(
    /// Handle to a [`Settlement`](crate::settlement::Settlement) (colony or native camp).
    SettlementId,
    "settlement"
);
handle!(
    /// Handle to a [`Player`](crate::player::Player).
    PlayerId,
    "player"
);
handle!(
    /// Handle to an [`AiGoods`](crate::ai::AiGoods) wrapper in the AI registry.
    AiGoodsId,
    "goods"
);
handle!(
    /// Handle to a [`Wish`](crate::ai::Wish) in the AI registry.
    WishId,
    "wish"
);
