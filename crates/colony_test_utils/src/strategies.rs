//! Proptest strategies.
//!
//! These strategies generate random but reproducible inputs for
//! property-based testing of maps, cargo and manifests.

use colony_core::goods::{Goods, GoodsType};
use colony_core::map::{Direction, Terrain, TilePos};
use colony_core::missions::manifest::Stop;
use colony_core::unit::UnitType;
use proptest::prelude::*;

/// Generate a tile inside a `width` x `height` map.
pub fn arb_tile(width: u32, height: u32) -> impl Strategy<Value = TilePos> {
    (0..width, 0..height).prop_map(|(x, y)| TilePos::new(x, y))
}

/// Generate any compass direction.
pub fn arb_direction() -> impl Strategy<Value = Direction> {
    proptest::sample::select(Direction::ALL.to_vec())
}

/// Generate a land terrain.
pub fn arb_land() -> impl Strategy<Value = Terrain> {
    proptest::sample::select(vec![
        Terrain::Plains,
        Terrain::Grassland,
        Terrain::Prairie,
        Terrain::Forest,
        Terrain::Hills,
        Terrain::Mountains,
        Terrain::Tundra,
        Terrain::Arctic,
    ])
}

/// Generate a land unit type that can be carried.
pub fn arb_passenger() -> impl Strategy<Value = UnitType> {
    proptest::sample::select(vec![
        UnitType::FreeColonist,
        UnitType::IndenturedServant,
        UnitType::ExpertFarmer,
        UnitType::ExpertFisherman,
        UnitType::VeteranSoldier,
        UnitType::Artillery,
    ])
}

/// Generate a stack of goods (1-100 units).
pub fn arb_goods() -> impl Strategy<Value = Goods> {
    (proptest::sample::select(GoodsType::ALL.to_vec()), 1u32..=100).prop_map(|(t, n)| Goods::new(t, n))
}

/// One cargo request: an item with an optional pickup point and a
/// drop-off point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CargoRequest {
    /// Item identifier.
    pub item: u32,
    /// Pickup point, `None` if already aboard.
    pub source: Option<TilePos>,
    /// Drop-off point.
    pub destination: TilePos,
}

/// Generate cargo requests with distinct item ids on a small map.
pub fn arb_cargo_requests(max_len: usize) -> impl Strategy<Value = Vec<CargoRequest>> {
    proptest::collection::vec(
        (proptest::option::weighted(0.8, arb_tile(16, 16)), arb_tile(16, 16)),
        0..max_len,
    )
    .prop_map(|pairs| {
        pairs
            .into_iter()
            .zip(0u32..)
            .map(|((source, destination), item)| CargoRequest {
                item,
                source,
                destination,
            })
            .collect()
    })
}

/// Build a manifest by inserting `requests` one after another.
#[must_use]
pub fn build_manifest(carrier_at: TilePos, requests: &[CargoRequest]) -> Vec<Stop<u32, TilePos>> {
    requests.iter().fold(Vec::new(), |stops, r| {
        colony_core::missions::manifest::insert(&stops, r.item, carrier_at, r.source, r.destination, TilePos::distance)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_tiles_stay_in_bounds(tile in arb_tile(7, 3)) {
            prop_assert!(tile.x < 7 && tile.y < 3);
        }

        #[test]
        fn prop_requests_have_distinct_items(requests in arb_cargo_requests(12)) {
            let mut items: Vec<u32> = requests.iter().map(|r| r.item).collect();
            items.dedup();
            prop_assert_eq!(items.len(), requests.len());
        }
    }
}
