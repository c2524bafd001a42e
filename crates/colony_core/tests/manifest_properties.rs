//! Cargo manifest properties, checked through the pure insertion function
//! and through a live transport mission.

use colony_core::ai::{AiGoods, AiRegistry, GoodsLocation};
use colony_core::config::AiConfig;
use colony_core::goods::{Goods, GoodsType};
use colony_core::map::TilePos;
use colony_core::missions::manifest::insert;
use colony_core::missions::TransportMission;
use colony_core::transportable::{TransportPoint, TransportableRef};
use colony_core::unit::UnitType;
use colony_test_utils::fixtures::WorldBuilder;
use colony_test_utils::proptest::prelude::*;
use colony_test_utils::strategies::{arb_cargo_requests, arb_tile, build_manifest};

#[test]
fn test_nearest_pickup_is_listed_first() {
    let mut builder = WorldBuilder::land(20, 3);
    let dutch = builder.european("Dutch", TilePos::new(19, 1), 0);
    let here = builder.colony(dutch, TilePos::new(0, 1), 2);
    let far = builder.colony(dutch, TilePos::new(12, 1), 2);
    let ship = builder.unit(dutch, UnitType::Caravel, TilePos::new(0, 1));
    let world = builder.build();

    let mut ai = AiRegistry::new();
    let near_lot = ai.add_goods(AiGoods::new(
        Goods::new(GoodsType::Furs, 100),
        GoodsLocation::Settlement(here),
        Some(TransportPoint::Tile(TilePos::new(16, 1))),
    ));
    let far_lot = ai.add_goods(AiGoods::new(
        Goods::new(GoodsType::Sugar, 100),
        GoodsLocation::Settlement(far),
        Some(TransportPoint::Tile(TilePos::new(16, 1))),
    ));
    let aboard = ai.add_goods(AiGoods::new(
        Goods::new(GoodsType::Tools, 50),
        GoodsLocation::Carrier(ship),
        Some(TransportPoint::Tile(TilePos::new(4, 1))),
    ));

    let config = AiConfig::default();
    let mut mission = TransportMission::new(&world, ship).unwrap();
    for lot in [near_lot, far_lot, aboard] {
        assert!(mission
            .add_to_transport_list(&world, &mut ai, &config, TransportableRef::Goods(lot))
            .unwrap());
    }

    use TransportableRef::Goods as G;
    assert_eq!(
        mission.transport_list(),
        &[G(aboard), G(near_lot), G(near_lot), G(far_lot), G(far_lot)]
    );
    let first_pickup = |lot| mission.transport_list().iter().position(|i| *i == G(lot)).unwrap();
    assert!(first_pickup(near_lot) < first_pickup(far_lot));
}

#[test]
fn test_adding_twice_keeps_the_manifest() {
    let mut builder = WorldBuilder::land(10, 3);
    let dutch = builder.european("Dutch", TilePos::new(9, 1), 0);
    let colony = builder.colony(dutch, TilePos::new(6, 1), 2);
    let ship = builder.unit(dutch, UnitType::Caravel, TilePos::new(1, 1));
    let world = builder.build();

    let mut ai = AiRegistry::new();
    let lot = ai.add_goods(AiGoods::new(
        Goods::new(GoodsType::Lumber, 60),
        GoodsLocation::Settlement(colony),
        Some(TransportPoint::Tile(TilePos::new(1, 1))),
    ));

    let config = AiConfig::default();
    let mut mission = TransportMission::new(&world, ship).unwrap();
    assert!(mission
        .add_to_transport_list(&world, &mut ai, &config, TransportableRef::Goods(lot))
        .unwrap());
    let before = mission.transport_list().to_vec();
    assert!(!mission
        .add_to_transport_list(&world, &mut ai, &config, TransportableRef::Goods(lot))
        .unwrap());
    assert_eq!(mission.transport_list(), before.as_slice());
    assert_eq!(ai.goods(lot).unwrap().transport, Some(ship));
}

proptest! {
    #[test]
    fn prop_second_insert_is_a_no_op(
        requests in arb_cargo_requests(10),
        carrier_at in arb_tile(16, 16),
        pick in any::<prop::sample::Index>(),
    ) {
        let stops = build_manifest(carrier_at, &requests);
        if requests.is_empty() {
            return Ok(());
        }
        let r = requests[pick.index(requests.len())];
        let again = insert(&stops, r.item, carrier_at, r.source, r.destination, TilePos::distance);
        prop_assert_eq!(again, stops);
    }

    #[test]
    fn prop_slots_per_item(requests in arb_cargo_requests(12), carrier_at in arb_tile(16, 16)) {
        let stops = build_manifest(carrier_at, &requests);
        let expected: usize = requests.iter().map(|r| if r.source.is_some() { 2 } else { 1 }).sum();
        prop_assert_eq!(stops.len(), expected);

        for r in &requests {
            let at: Vec<usize> = stops
                .iter()
                .enumerate()
                .filter(|(_, s)| s.item == r.item)
                .map(|(i, _)| i)
                .collect();
            match r.source {
                Some(source) => {
                    prop_assert_eq!(at.len(), 2);
                    prop_assert_eq!(stops[at[0]].point, Some(source));
                    prop_assert_eq!(stops[at[1]].point, Some(r.destination));
                }
                None => {
                    prop_assert_eq!(at.len(), 1);
                    prop_assert_eq!(stops[at[0]].point, Some(r.destination));
                }
            }
        }
    }

    #[test]
    fn prop_insertion_never_reorders(requests in arb_cargo_requests(10), carrier_at in arb_tile(16, 16)) {
        let mut stops = Vec::new();
        for r in &requests {
            let next = insert(&stops, r.item, carrier_at, r.source, r.destination, TilePos::distance);
            let kept: Vec<_> = next.iter().filter(|s| s.item != r.item).copied().collect();
            prop_assert_eq!(&kept, &stops);
            stops = next;
        }
    }
}
