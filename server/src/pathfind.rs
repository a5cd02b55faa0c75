//! A* pathfinding over navigation grids
//!
//! Runs on the worker-pool threads, never on the simulation thread. The
//! search is 4-connected (no diagonals) with Manhattan distance as the
//! heuristic and a unit step cost, so f = g + h never overestimates and the
//! first expansion of the goal tile is optimal.
//!
//! Nodes live by value in an arena keyed by tile coordinate; the open set
//! is a min-heap of lightweight `(f, col, row)` handles with lazy deletion,
//! and reconstruction is a single parent-pointer walk through the arena.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::Instant;

use log::warn;

use shared::math::{Vec2, Vec3};
use shared::navmap::{Navmap, TileCoord};

/// Wall-clock threshold above which a search is reported, in milliseconds
const EXCESSIVE_RUN_MS: u128 = 10;

#[derive(Debug, Clone, Copy)]
struct Node {
    g: u32,
    parent: Option<TileCoord>,
}

/// Computes a waypoint path from `start` to `target` on `navmap`
///
/// Returns world-space tile centers at the start's z, ordered so the front
/// element is the next step; the start tile itself is excluded. The result
/// is empty when start and target share a tile or when no route exists;
/// an empty path is a valid answer, not an error.
pub fn astar(start: Vec3, target: Vec3, map_origin: Vec2, navmap: &Navmap) -> VecDeque<Vec3> {
    let start_tile = navmap.world_to_tile(start, map_origin);
    let end_tile = navmap.world_to_tile(target, map_origin);

    if start_tile == end_tile {
        return VecDeque::new();
    }

    let began = Instant::now();

    let mut nodes: HashMap<TileCoord, Node> = HashMap::new();
    let mut open: BinaryHeap<Reverse<(u32, i32, i32)>> = BinaryHeap::new();
    let mut closed: HashSet<TileCoord> = HashSet::new();

    let heuristic = |tile: TileCoord| -> u32 {
        ((tile.col - end_tile.col).abs() + (tile.row - end_tile.row).abs()) as u32
    };

    nodes.insert(start_tile, Node { g: 0, parent: None });
    open.push(Reverse((heuristic(start_tile), start_tile.col, start_tile.row)));

    let mut reached_end = false;
    while let Some(Reverse((_, col, row))) = open.pop() {
        let current = TileCoord::new(col, row);
        if !closed.insert(current) {
            continue;
        }

        if current == end_tile {
            reached_end = true;
            break;
        }

        let current_g = nodes[&current].g;
        for (d_col, d_row) in [(0, 1), (1, 0), (0, -1), (-1, 0)] {
            let neighbor = current.offset(d_col, d_row);
            if !navmap.is_walkable(neighbor) || closed.contains(&neighbor) {
                continue;
            }

            let tentative_g = current_g + 1;
            let better = nodes.get(&neighbor).map_or(true, |n| tentative_g < n.g);
            if better {
                nodes.insert(
                    neighbor,
                    Node {
                        g: tentative_g,
                        parent: Some(current),
                    },
                );
                open.push(Reverse((
                    tentative_g + heuristic(neighbor),
                    neighbor.col,
                    neighbor.row,
                )));
            }
        }
    }

    let mut path = VecDeque::new();
    if reached_end {
        // Walk end -> start, then flip so the front is the next step.
        let mut cursor = Some(end_tile);
        while let Some(tile) = cursor {
            let node = &nodes[&tile];
            if node.parent.is_some() {
                path.push_front(navmap.tile_to_world(tile, map_origin, start.z));
            }
            cursor = node.parent;
        }
    }

    let elapsed_ms = began.elapsed().as_millis();
    if elapsed_ms > EXCESSIVE_RUN_MS {
        warn!(
            "Excessive pathfinding run: {} ms for {:?} -> {:?} ({} tiles expanded)",
            elapsed_ms,
            start_tile,
            end_tile,
            closed.len()
        );
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::navmap::TileKind;

    /// Builds a navmap from rows of '.' (walkable) and '#' (solid); the
    /// first string is the northernmost row, mirroring how the grids read
    /// in a text editor.
    fn grid(rows: &[&str]) -> Navmap {
        let size = rows.len();
        let mut tiles = vec![TileKind::Walkable; size * size];
        for (visual_row, line) in rows.iter().enumerate() {
            assert_eq!(line.len(), size);
            let grid_row = size - 1 - visual_row;
            for (col, ch) in line.chars().enumerate() {
                tiles[grid_row * size + col] = match ch {
                    '.' => TileKind::Walkable,
                    '#' => TileKind::Solid,
                    other => panic!("bad grid char {:?}", other),
                };
            }
        }
        Navmap::new(size, 1.0, 1.0, tiles)
    }

    fn center_of(navmap: &Navmap, col: i32, row: i32) -> Vec3 {
        navmap.tile_to_world(TileCoord::new(col, row), Vec2::ZERO, 0.0)
    }

    #[test]
    fn straight_corridor() {
        let navmap = grid(&["....", "....", "....", "...."]);
        let start = center_of(&navmap, 0, 0);
        let target = center_of(&navmap, 3, 0);

        let path = astar(start, target, Vec2::ZERO, &navmap);
        let expected: Vec<Vec3> = (1..=3).map(|col| center_of(&navmap, col, 0)).collect();
        assert_eq!(Vec::from(path), expected);
    }

    #[test]
    fn start_tile_is_excluded_and_front_is_next_step() {
        let navmap = grid(&["....", "....", "....", "...."]);
        let start = center_of(&navmap, 1, 1);
        let target = center_of(&navmap, 1, 3);

        let path = astar(start, target, Vec2::ZERO, &navmap);
        assert_eq!(path.len(), 2);
        let first = path.front().copied().unwrap();
        // The first waypoint is one tile from the start, never the start.
        assert_eq!(navmap.world_to_tile(first, Vec2::ZERO), TileCoord::new(1, 2));
    }

    #[test]
    fn routes_around_a_wall() {
        // Wall across the middle with a gap at the east end.
        let navmap = grid(&[
            ".....",
            ".....",
            "####.",
            ".....",
            ".....",
        ]);
        let start = center_of(&navmap, 0, 0);
        let target = center_of(&navmap, 0, 4);

        let path = astar(start, target, Vec2::ZERO, &navmap);
        assert!(!path.is_empty());
        // Every step is walkable and 4-adjacent to its predecessor.
        let mut prev = navmap.world_to_tile(start, Vec2::ZERO);
        for waypoint in &path {
            let tile = navmap.world_to_tile(*waypoint, Vec2::ZERO);
            assert!(navmap.is_walkable(tile));
            let manhattan = (tile.col - prev.col).abs() + (tile.row - prev.row).abs();
            assert_eq!(manhattan, 1, "non-adjacent step {:?} -> {:?}", prev, tile);
            prev = tile;
        }
        assert_eq!(prev, navmap.world_to_tile(target, Vec2::ZERO));
        // It must thread the gap in the east column.
        assert!(path
            .iter()
            .any(|w| navmap.world_to_tile(*w, Vec2::ZERO).col == 4));
    }

    #[test]
    fn unreachable_target_yields_empty_path() {
        let navmap = grid(&[
            ".....",
            "#####",
            ".....",
            ".....",
            ".....",
        ]);
        let start = center_of(&navmap, 2, 0);
        let target = center_of(&navmap, 2, 4);
        assert!(astar(start, target, Vec2::ZERO, &navmap).is_empty());
    }

    #[test]
    fn same_tile_yields_empty_path() {
        let navmap = grid(&["....", "....", "....", "...."]);
        let start = center_of(&navmap, 2, 2);
        // Different world point, same tile.
        let target = start + Vec3::new(0.2, -0.2, 0.0);
        assert!(astar(start, target, Vec2::ZERO, &navmap).is_empty());
    }

    #[test]
    fn out_of_bounds_target_is_unreachable() {
        let navmap = grid(&["....", "....", "....", "...."]);
        let start = center_of(&navmap, 1, 1);
        let target = Vec3::new(100.0, 100.0, 0.0);
        assert!(astar(start, target, Vec2::ZERO, &navmap).is_empty());
    }

    #[test]
    fn waypoints_carry_the_start_z() {
        let navmap = grid(&["....", "....", "....", "...."]);
        let start = center_of(&navmap, 0, 0) + Vec3::new(0.0, 0.0, 17.5);
        let target = center_of(&navmap, 2, 0);

        let path = astar(start, target, Vec2::ZERO, &navmap);
        assert!(!path.is_empty());
        assert!(path.iter().all(|w| w.z == 17.5));
    }

    #[test]
    fn identical_searches_produce_identical_paths() {
        // Ties on f-cost are broken by coordinate, so the search is fully
        // deterministic even on open ground where many optimal routes
        // exist.
        let navmap = grid(&["......", "......", "......", "......", "......", "......"]);
        let start = center_of(&navmap, 0, 0);
        let target = center_of(&navmap, 4, 3);

        let first = astar(start, target, Vec2::ZERO, &navmap);
        let second = astar(start, target, Vec2::ZERO, &navmap);
        assert_eq!(Vec::from(first), Vec::from(second));
    }

    #[test]
    fn path_length_is_optimal_on_open_ground() {
        let navmap = grid(&[
            "......",
            "......",
            "......",
            "......",
            "......",
            "......",
        ]);
        let start = center_of(&navmap, 0, 0);
        let target = center_of(&navmap, 3, 4);
        let path = astar(start, target, Vec2::ZERO, &navmap);
        // Manhattan distance = 3 + 4.
        assert_eq!(path.len(), 7);
    }
}
