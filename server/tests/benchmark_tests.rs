//! Performance benchmarks for the hot per-tick paths
//!
//! The simulation has 25 ms per tick to clear and refill every quadtree,
//! advance every object, and serialize a full snapshot, while the worker
//! pool runs A* searches on the side. These tests time the critical pieces
//! with generous release-agnostic bounds: they exist to catch order-of-
//! magnitude regressions, not to be a profiler.
//!
//! ```bash
//! cargo test --release benchmark_
//! ```

use std::time::Instant;

use shared::math::{colliders_intersect, Aabb, Collider, Vec2, Vec3};
use shared::navmap::{Navmap, TileCoord, TileKind};
use shared::object::{Faction, ObjectData, ObjectType};
use shared::protocol::{decode, encode, Packet};
use shared::quadtree::Quadtree;
use shared::{MAP_TILE_SIZE, NAVMAP_SIZE};

use server::pathfind::astar;

fn open_navmap() -> Navmap {
    Navmap::new(
        NAVMAP_SIZE,
        MAP_TILE_SIZE,
        MAP_TILE_SIZE,
        vec![TileKind::Walkable; NAVMAP_SIZE * NAVMAP_SIZE],
    )
}

/// Maze-like navmap: horizontal walls with alternating gaps, the worst
/// realistic case for the 4-connected search.
fn maze_navmap() -> Navmap {
    let mut tiles = vec![TileKind::Walkable; NAVMAP_SIZE * NAVMAP_SIZE];
    for row in (4..NAVMAP_SIZE - 4).step_by(4) {
        for col in 0..NAVMAP_SIZE {
            tiles[row * NAVMAP_SIZE + col] = TileKind::Solid;
        }
        let gap = if (row / 4) % 2 == 0 { 1 } else { NAVMAP_SIZE - 2 };
        tiles[row * NAVMAP_SIZE + gap] = TileKind::Walkable;
    }
    Navmap::new(NAVMAP_SIZE, MAP_TILE_SIZE, MAP_TILE_SIZE, tiles)
}

fn sample_object(id: u32) -> ObjectData {
    let mut object = ObjectData::new_root(
        id,
        ObjectType::Player,
        Faction::Good,
        Vec3::new(id as f32 * 0.01, -(id as f32) * 0.01, 20.0),
        "forest_1".to_string(),
    );
    object.scale = 0.1;
    object
}

#[test]
fn benchmark_quadtree_rebuild() {
    // A busy map: 256 objects re-indexed from scratch, as the engine does
    // every tick.
    let mut tree = Quadtree::new(Aabb::new(
        Vec3::new(0.0, 0.0, 20.0),
        Vec3::new(8.0, 8.0, 1.0),
    ));
    let positions: Vec<Vec3> = (0..256)
        .map(|i| {
            let angle = i as f32 * 0.7;
            Vec3::new(angle.cos() * 3.5, angle.sin() * 3.5, 20.0)
        })
        .collect();

    let rebuilds = 1_000;
    let start = Instant::now();
    for _ in 0..rebuilds {
        tree.clear();
        for (i, position) in positions.iter().enumerate() {
            tree.insert(i as u32, *position, Vec3::new(0.1, 0.1, 1.0));
        }
    }
    let duration = start.elapsed();
    println!(
        "Quadtree rebuild: {} rebuilds of 256 objects in {:?} ({:.2} us/rebuild)",
        rebuilds,
        duration,
        duration.as_micros() as f64 / rebuilds as f64
    );

    // A rebuild has to fit comfortably inside a 25 ms tick.
    assert!(duration.as_millis() / rebuilds < 25);
}

#[test]
fn benchmark_quadtree_query() {
    let mut tree = Quadtree::new(Aabb::new(
        Vec3::new(0.0, 0.0, 20.0),
        Vec3::new(8.0, 8.0, 1.0),
    ));
    for i in 0..256u32 {
        let angle = i as f32 * 0.7;
        tree.insert(
            i,
            Vec3::new(angle.cos() * 3.5, angle.sin() * 3.5, 20.0),
            Vec3::new(0.1, 0.1, 1.0),
        );
    }

    let area = Aabb::new(Vec3::new(1.0, 1.0, 20.0), Vec3::new(2.0, 2.0, 1.0));
    let queries = 10_000;
    let start = Instant::now();
    let mut total_hits = 0usize;
    for _ in 0..queries {
        total_hits += tree.query(&area).len();
    }
    let duration = start.elapsed();
    println!(
        "Quadtree query: {} queries in {:?} ({:.2} ns/query, {} hits each)",
        queries,
        duration,
        duration.as_nanos() as f64 / queries as f64,
        total_hits / queries
    );
    assert!(duration.as_millis() < 5_000);
}

#[test]
fn benchmark_astar_open_ground() {
    let navmap = open_navmap();
    let origin = Vec2::ZERO;
    let start_pos = navmap.tile_to_world(TileCoord::new(2, 2), origin, 20.0);
    let target = navmap.tile_to_world(
        TileCoord::new(NAVMAP_SIZE as i32 - 3, NAVMAP_SIZE as i32 - 3),
        origin,
        20.0,
    );

    let searches = 50;
    let began = Instant::now();
    let mut waypoints = 0usize;
    for _ in 0..searches {
        waypoints = astar(start_pos, target, origin, &navmap).len();
    }
    let duration = began.elapsed();
    println!(
        "A* open ground: {} corner-to-corner searches in {:?} ({:.2} ms/search, {} waypoints)",
        searches,
        duration,
        duration.as_millis() as f64 / searches as f64,
        waypoints
    );
    assert_eq!(waypoints, 2 * (NAVMAP_SIZE - 5));
    // Chase re-planning runs every 50 ms per NPC; even the long diagonal
    // must stay far below that.
    assert!(duration.as_millis() / searches < 50);
}

#[test]
fn benchmark_astar_maze() {
    let navmap = maze_navmap();
    let origin = Vec2::ZERO;
    let start_pos = navmap.tile_to_world(TileCoord::new(64, 1), origin, 20.0);
    let target = navmap.tile_to_world(TileCoord::new(64, NAVMAP_SIZE as i32 - 2), origin, 20.0);

    let searches = 20;
    let began = Instant::now();
    let mut waypoints = 0usize;
    for _ in 0..searches {
        waypoints = astar(start_pos, target, origin, &navmap).len();
    }
    let duration = began.elapsed();
    println!(
        "A* maze: {} serpentine searches in {:?} ({:.2} ms/search, {} waypoints)",
        searches,
        duration,
        duration.as_millis() as f64 / searches as f64,
        waypoints
    );
    assert!(waypoints > NAVMAP_SIZE, "maze path should serpentine");
    assert!(duration.as_secs() < 30);
}

#[test]
fn benchmark_snapshot_serialization() {
    // 64 objects per snapshot, encoded one message per object like the
    // engine's broadcast loop.
    let objects: Vec<ObjectData> = (1..=64).map(sample_object).collect();

    let snapshots = 1_000;
    let start = Instant::now();
    let mut bytes_total = 0usize;
    for _ in 0..snapshots {
        for object in &objects {
            let bytes = encode(&Packet::ObjectStateUpdate {
                object: object.clone(),
            })
            .unwrap();
            bytes_total += bytes.len();
        }
    }
    let duration = start.elapsed();
    println!(
        "Snapshot encode: {} snapshots x 64 objects in {:?} ({:.2} us/snapshot, {} bytes each)",
        snapshots,
        duration,
        duration.as_micros() as f64 / snapshots as f64,
        bytes_total / snapshots / 64
    );
    // 40 snapshots per second must be a rounding error in the tick budget.
    assert!(duration.as_millis() / (snapshots as u128) < 25);
}

#[test]
fn benchmark_decode_round_trip() {
    let object = sample_object(9);
    let bytes = encode(&Packet::ObjectStateUpdate { object }).unwrap();

    let iterations = 10_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = decode(&bytes).unwrap();
    }
    let duration = start.elapsed();
    println!(
        "Decode: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );
    assert!(duration.as_millis() < 5_000);
}

#[test]
fn benchmark_collider_intersection() {
    let rect = Collider::rect(0.5, 0.5);
    let circle = Collider::circle(0.5);
    let a = Vec2::new(0.0, 0.0);
    let b = Vec2::new(0.05, 0.03);

    let iterations = 100_000;
    let start = Instant::now();
    let mut hits = 0u32;
    for i in 0..iterations {
        // Alternate shape pairs so neither branch dominates.
        let hit = if i % 2 == 0 {
            colliders_intersect(a, 0.1, &rect, b, 0.1, &rect)
        } else {
            colliders_intersect(a, 0.1, &rect, b, 0.125, &circle)
        };
        if hit {
            hits += 1;
        }
    }
    let duration = start.elapsed();
    println!(
        "Collider intersection: {} checks in {:?} ({:.2} ns/check, {} hits)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64,
        hits
    );
    assert!(duration.as_millis() < 1_000);
}
