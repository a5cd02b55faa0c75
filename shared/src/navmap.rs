//! Tile-based navigation grid
//!
//! One `Navmap` per map: a square grid of walkable/solid tiles decoded from
//! the map's navmap texture at startup and never mutated afterwards. All
//! movement legality checks (NPC loitering, A* pathfinding, line-of-sight
//! ray marching and projectile geometry collisions) resolve against it.
//!
//! Coordinate convention: +x is east and +y is north in world space; grid
//! column 0 is the western edge and grid row 0 the southern edge, so both
//! axes convert with the same floor expression. Out-of-bounds coordinates
//! read as solid, which turns the map border into an implicit wall.

use serde::{Deserialize, Serialize};

use crate::math::{Vec2, Vec3};

/// Walkability of one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Walkable,
    Solid,
}

/// Integer tile coordinate; may be out of bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub col: i32,
    pub row: i32,
}

impl TileCoord {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn offset(&self, d_col: i32, d_row: i32) -> TileCoord {
        TileCoord::new(self.col + d_col, self.row + d_row)
    }
}

/// Immutable square grid of tiles plus world/tile conversions
#[derive(Debug, Clone)]
pub struct Navmap {
    size: usize,
    tile_width: f32,
    tile_height: f32,
    /// Row-major, row 0 at the southern edge
    tiles: Vec<TileKind>,
}

impl Navmap {
    /// Builds a navmap from tiles already in grid order (row 0 south).
    ///
    /// Tile dimensions are world-space: `map_dimension * scale / size` per
    /// axis, computed by the loader.
    pub fn new(size: usize, tile_width: f32, tile_height: f32, tiles: Vec<TileKind>) -> Self {
        assert_eq!(tiles.len(), size * size, "navmap tile count must be size^2");
        Self {
            size,
            tile_width,
            tile_height,
            tiles,
        }
    }

    /// Grid side length in tiles
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn tile_width(&self) -> f32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f32 {
        self.tile_height
    }

    /// Tile lookup; anything outside the grid is solid
    pub fn tile_at(&self, coord: TileCoord) -> TileKind {
        let n = self.size as i32;
        if coord.col < 0 || coord.col >= n || coord.row < 0 || coord.row >= n {
            return TileKind::Solid;
        }
        self.tiles[coord.row as usize * self.size + coord.col as usize]
    }

    pub fn is_walkable(&self, coord: TileCoord) -> bool {
        self.tile_at(coord) == TileKind::Walkable
    }

    /// Snaps a world position to the tile containing it
    ///
    /// `origin` is the map center already in world space (manifest center
    /// times the global map scale). The z component is ignored.
    pub fn world_to_tile(&self, position: Vec3, origin: Vec2) -> TileCoord {
        let half_w = self.size as f32 * self.tile_width / 2.0;
        let half_h = self.size as f32 * self.tile_height / 2.0;
        let col = ((position.x - origin.x + half_w) / self.tile_width).floor() as i32;
        let row = ((position.y - origin.y + half_h) / self.tile_height).floor() as i32;
        TileCoord::new(col, row)
    }

    /// World position of a tile's center, at the caller-supplied z
    pub fn tile_to_world(&self, coord: TileCoord, origin: Vec2, z: f32) -> Vec3 {
        let half_w = self.size as f32 * self.tile_width / 2.0;
        let half_h = self.size as f32 * self.tile_height / 2.0;
        Vec3::new(
            origin.x - half_w + (coord.col as f32 + 0.5) * self.tile_width,
            origin.y - half_h + (coord.row as f32 + 0.5) * self.tile_height,
            z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn open_navmap(size: usize, tile: f32) -> Navmap {
        Navmap::new(size, tile, tile, vec![TileKind::Walkable; size * size])
    }

    #[test]
    fn world_to_tile_round_trip_hits_tile_center() {
        let navmap = open_navmap(8, 0.5);
        let origin = Vec2::new(10.0, -3.0);

        // An arbitrary in-bounds point.
        let p = Vec3::new(10.3, -2.4, 7.0);
        let coord = navmap.world_to_tile(p, origin);
        let center = navmap.tile_to_world(coord, origin, p.z);

        // The center must map back to the same tile, and re-converting the
        // center must be a fixed point.
        assert_eq!(navmap.world_to_tile(center, origin), coord);
        let center_again = navmap.tile_to_world(navmap.world_to_tile(center, origin), origin, p.z);
        assert_approx_eq!(center.x, center_again.x, 1e-6);
        assert_approx_eq!(center.y, center_again.y, 1e-6);
        assert_eq!(center.z, 7.0);
    }

    #[test]
    fn map_center_lands_in_the_middle_tile() {
        let navmap = open_navmap(128, 0.0625);
        let origin = Vec2::ZERO;
        let coord = navmap.world_to_tile(Vec3::new(0.0, 0.0, 0.0), origin);
        assert_eq!(coord, TileCoord::new(64, 64));
    }

    #[test]
    fn southern_and_western_edges_are_row_and_col_zero() {
        let navmap = open_navmap(4, 1.0);
        let origin = Vec2::ZERO;
        // Just inside the south-west corner.
        let coord = navmap.world_to_tile(Vec3::new(-1.9, -1.9, 0.0), origin);
        assert_eq!(coord, TileCoord::new(0, 0));
        // Just inside the north-east corner.
        let coord = navmap.world_to_tile(Vec3::new(1.9, 1.9, 0.0), origin);
        assert_eq!(coord, TileCoord::new(3, 3));
    }

    #[test]
    fn out_of_bounds_reads_solid() {
        let navmap = open_navmap(4, 1.0);
        assert_eq!(navmap.tile_at(TileCoord::new(-1, 0)), TileKind::Solid);
        assert_eq!(navmap.tile_at(TileCoord::new(0, -1)), TileKind::Solid);
        assert_eq!(navmap.tile_at(TileCoord::new(4, 0)), TileKind::Solid);
        assert_eq!(navmap.tile_at(TileCoord::new(0, 4)), TileKind::Solid);
        assert_eq!(navmap.tile_at(TileCoord::new(1, 1)), TileKind::Walkable);
    }

    #[test]
    fn solid_tiles_read_back() {
        let mut tiles = vec![TileKind::Walkable; 16];
        tiles[2 * 4 + 3] = TileKind::Solid;
        let navmap = Navmap::new(4, 1.0, 1.0, tiles);
        assert_eq!(navmap.tile_at(TileCoord::new(3, 2)), TileKind::Solid);
        assert!(!navmap.is_walkable(TileCoord::new(3, 2)));
        assert!(navmap.is_walkable(TileCoord::new(2, 2)));
    }

    #[test]
    #[should_panic]
    fn mismatched_tile_count_panics() {
        Navmap::new(4, 1.0, 1.0, vec![TileKind::Walkable; 15]);
    }

    #[test]
    fn rectangular_tiles_convert_per_axis() {
        let navmap = Navmap::new(4, 2.0, 0.5, vec![TileKind::Walkable; 16]);
        let origin = Vec2::ZERO;

        // Grid spans 8.0 wide and 2.0 tall.
        let coord = navmap.world_to_tile(Vec3::new(3.0, -0.9, 0.0), origin);
        assert_eq!(coord, TileCoord::new(3, 0));

        let center = navmap.tile_to_world(coord, origin, 5.0);
        assert_approx_eq!(center.x, 3.0, 1e-6);
        assert_approx_eq!(center.y, -0.75, 1e-6);
        assert_eq!(navmap.world_to_tile(center, origin), coord);
    }

    #[test]
    fn offset_origin_shifts_the_grid() {
        let navmap = open_navmap(4, 1.0);
        let east_origin = Vec2::new(10.0, 0.0);
        // The same world point lands four columns further west on a map
        // centered ten units east.
        let at_zero = navmap.world_to_tile(Vec3::new(1.5, 0.0, 0.0), Vec2::ZERO);
        let at_east = navmap.world_to_tile(Vec3::new(1.5, 0.0, 0.0), east_origin);
        assert_eq!(at_zero, TileCoord::new(3, 2));
        assert_eq!(at_east, TileCoord::new(-7, 2));
        assert_eq!(navmap.tile_at(at_east), TileKind::Solid);
    }
}
