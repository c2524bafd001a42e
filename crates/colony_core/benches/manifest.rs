//! Manifest and path search benchmarks for colony_core.
//!
//! Run with: `cargo bench -p colony_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use colony_core::map::{GameMap, Terrain, TilePos};
use colony_core::missions::manifest::{insert, Stop};
use colony_core::pathfinding::{find_path, CostDecider};
use colony_core::unit::{Location, UnitType};
use colony_core::world::World;
use colony_core::player::PlayerKind;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn requests(n: u32) -> Vec<(u32, Option<TilePos>, TilePos)> {
    (0..n)
        .map(|i| {
            let source = (i % 3 != 0).then(|| TilePos::new((i * 7) % 40, (i * 13) % 40));
            (i, source, TilePos::new((i * 11) % 40, (i * 5) % 40))
        })
        .collect()
}

/// Grow a manifest one item at a time.
pub fn manifest_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest_insert");
    for n in [4u32, 16, 64] {
        let items = requests(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &items, |b, items| {
            b.iter(|| {
                let mut stops: Vec<Stop<u32, TilePos>> = Vec::new();
                for &(item, source, destination) in items {
                    stops = insert(&stops, item, TilePos::new(0, 0), source, destination, TilePos::distance);
                }
                black_box(stops)
            });
        });
    }
    group.finish();
}

/// Cross a 64x64 continent with a ridge in the way.
pub fn path_benchmark(c: &mut Criterion) {
    let mut map = GameMap::new(64, 64, Terrain::Plains);
    for y in 0..60 {
        map.set_terrain(TilePos::new(32, y), Terrain::Mountains);
    }
    let mut world = World::new(map);
    let dutch = world.add_player("Dutch", PlayerKind::European);
    let scout = world.spawn_unit(dutch, UnitType::FreeColonist, Location::Tile(TilePos::new(2, 2)));

    c.bench_function("find_path_64x64", |b| {
        b.iter(|| {
            black_box(find_path(
                &world,
                scout,
                TilePos::new(2, 2),
                TilePos::new(61, 5),
                None,
                CostDecider::AvoidIllegal,
            ))
        });
    });
}

criterion_group!(benches, manifest_benchmark, path_benchmark);
criterion_main!(benches);
