//! Vector math, facing directions, colliders and axis-aligned boxes
//!
//! Everything here is shared between the authoritative server simulation and
//! client-side prediction, so all arithmetic sticks to plain `f32` operations
//! that behave identically on every platform.

use serde::{Deserialize, Serialize};

/// 2D vector used for map centers, dimensions and planar offsets
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// 3D vector used for object positions and velocities
///
/// The world is effectively planar: x runs east, y runs north, and z is a
/// render-layer coordinate that the simulation passes through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Planar projection, dropping z
    pub fn xy(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or zero when the length is zero
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len == 0.0 {
            Vec3::ZERO
        } else {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Eight-way facing used for animation and melee spawn offsets
///
/// The discriminants are part of the wire format and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Facing {
    pub const ALL: [Facing; 8] = [
        Facing::North,
        Facing::NorthEast,
        Facing::East,
        Facing::SouthEast,
        Facing::South,
        Facing::SouthWest,
        Facing::West,
        Facing::NorthWest,
    ];

    /// Unit step on the tile grid for this direction; +y is north
    pub fn grid_step(&self) -> (i32, i32) {
        match self {
            Facing::North => (0, 1),
            Facing::NorthEast => (1, 1),
            Facing::East => (1, 0),
            Facing::SouthEast => (1, -1),
            Facing::South => (0, -1),
            Facing::SouthWest => (-1, -1),
            Facing::West => (-1, 0),
            Facing::NorthWest => (-1, 1),
        }
    }

    /// Snaps a planar movement vector to the nearest of the eight directions
    ///
    /// Zero-length vectors keep no meaningful direction and map to South,
    /// matching the spawn-facing default.
    pub fn from_vec(v: Vec2) -> Facing {
        if v.x == 0.0 && v.y == 0.0 {
            return Facing::South;
        }
        // Octant selection: 45 degree sectors centered on each direction.
        let angle = v.y.atan2(v.x);
        let sector = (angle / std::f32::consts::FRAC_PI_4).round() as i32;
        match sector.rem_euclid(8) {
            0 => Facing::East,
            1 => Facing::NorthEast,
            2 => Facing::North,
            3 => Facing::NorthWest,
            4 => Facing::West,
            5 => Facing::SouthWest,
            6 => Facing::South,
            _ => Facing::SouthEast,
        }
    }
}

/// Collider shape tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColliderShape {
    Rect,
    Circle,
}

/// Collision volume attached to an object
///
/// Half extents are expressed relative to the owning object's scale: the
/// effective world-space half size is `half_extents * scale`. For circles
/// only `half_extents.x` is meaningful and acts as the radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub half_extents: Vec2,
}

impl Collider {
    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Self {
            shape: ColliderShape::Rect,
            half_extents: Vec2::new(half_width, half_height),
        }
    }

    pub fn circle(radius: f32) -> Self {
        Self {
            shape: ColliderShape::Circle,
            half_extents: Vec2::new(radius, radius),
        }
    }
}

/// Tests two scaled colliders at the given planar positions for overlap
///
/// Rect/rect uses the separating-axis test; circle/circle compares squared
/// center distance; the mixed case clamps the circle center onto the
/// rectangle and compares against the radius.
pub fn colliders_intersect(
    a_pos: Vec2,
    a_scale: f32,
    a: &Collider,
    b_pos: Vec2,
    b_scale: f32,
    b: &Collider,
) -> bool {
    let a_half = a.half_extents * a_scale;
    let b_half = b.half_extents * b_scale;

    match (a.shape, b.shape) {
        (ColliderShape::Rect, ColliderShape::Rect) => {
            (a_pos.x - b_pos.x).abs() < a_half.x + b_half.x
                && (a_pos.y - b_pos.y).abs() < a_half.y + b_half.y
        }
        (ColliderShape::Circle, ColliderShape::Circle) => {
            let dx = b_pos.x - a_pos.x;
            let dy = b_pos.y - a_pos.y;
            let reach = a_half.x + b_half.x;
            dx * dx + dy * dy < reach * reach
        }
        (ColliderShape::Rect, ColliderShape::Circle) => {
            rect_circle_overlap(a_pos, a_half, b_pos, b_half.x)
        }
        (ColliderShape::Circle, ColliderShape::Rect) => {
            rect_circle_overlap(b_pos, b_half, a_pos, a_half.x)
        }
    }
}

fn rect_circle_overlap(rect_center: Vec2, rect_half: Vec2, circle_center: Vec2, radius: f32) -> bool {
    let nearest_x = circle_center
        .x
        .clamp(rect_center.x - rect_half.x, rect_center.x + rect_half.x);
    let nearest_y = circle_center
        .y
        .clamp(rect_center.y - rect_half.y, rect_center.y + rect_half.y);
    let dx = circle_center.x - nearest_x;
    let dy = circle_center.y - nearest_y;
    dx * dx + dy * dy < radius * radius
}

/// Axis-aligned box parameterized by center and full size
///
/// Used by the per-map quadtrees; the z extent is carried along but never
/// drives subdivision, which happens on the xy plane only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec3,
    pub size: Vec3,
}

impl Aabb {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }

    pub fn min_x(&self) -> f32 {
        self.center.x - self.size.x / 2.0
    }

    pub fn max_x(&self) -> f32 {
        self.center.x + self.size.x / 2.0
    }

    pub fn min_y(&self) -> f32 {
        self.center.y - self.size.y / 2.0
    }

    pub fn max_y(&self) -> f32 {
        self.center.y + self.size.y / 2.0
    }

    /// Planar overlap test; touching edges do not count as intersection
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    /// True when `other` lies entirely inside this box on the xy plane
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn normalized_preserves_direction() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        let n = v.normalized();
        assert_approx_eq!(n.length(), 1.0, 1e-6);
        assert_approx_eq!(n.x, 0.6, 1e-6);
        assert_approx_eq!(n.y, 0.8, 1e-6);
    }

    #[test]
    fn normalized_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalized(), Vec3::ZERO);
    }

    #[test]
    fn facing_from_cardinal_vectors() {
        assert_eq!(Facing::from_vec(Vec2::new(1.0, 0.0)), Facing::East);
        assert_eq!(Facing::from_vec(Vec2::new(-1.0, 0.0)), Facing::West);
        assert_eq!(Facing::from_vec(Vec2::new(0.0, 1.0)), Facing::North);
        assert_eq!(Facing::from_vec(Vec2::new(0.0, -1.0)), Facing::South);
    }

    #[test]
    fn facing_from_diagonal_vectors() {
        assert_eq!(Facing::from_vec(Vec2::new(1.0, 1.0)), Facing::NorthEast);
        assert_eq!(Facing::from_vec(Vec2::new(-1.0, 1.0)), Facing::NorthWest);
        assert_eq!(Facing::from_vec(Vec2::new(-1.0, -1.0)), Facing::SouthWest);
        assert_eq!(Facing::from_vec(Vec2::new(1.0, -1.0)), Facing::SouthEast);
    }

    #[test]
    fn facing_zero_vector_defaults_south() {
        assert_eq!(Facing::from_vec(Vec2::ZERO), Facing::South);
    }

    #[test]
    fn grid_steps_cover_all_neighbors() {
        let mut seen = std::collections::HashSet::new();
        for facing in Facing::ALL {
            let step = facing.grid_step();
            assert_ne!(step, (0, 0));
            assert!(seen.insert(step));
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn rect_rect_overlap() {
        let a = Collider::rect(0.5, 0.5);
        let b = Collider::rect(0.5, 0.5);
        assert!(colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &a,
            Vec2::new(0.9, 0.0),
            1.0,
            &b
        ));
        assert!(!colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &a,
            Vec2::new(1.1, 0.0),
            1.0,
            &b
        ));
    }

    #[test]
    fn rect_rect_touching_edges_do_not_intersect() {
        let a = Collider::rect(0.5, 0.5);
        assert!(!colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &a,
            Vec2::new(1.0, 0.0),
            1.0,
            &a
        ));
    }

    #[test]
    fn scale_shrinks_colliders() {
        let a = Collider::rect(0.5, 0.5);
        // At scale 0.1 the effective half extent is 0.05.
        assert!(!colliders_intersect(
            Vec2::new(0.0, 0.0),
            0.1,
            &a,
            Vec2::new(0.2, 0.0),
            0.1,
            &a
        ));
        assert!(colliders_intersect(
            Vec2::new(0.0, 0.0),
            0.1,
            &a,
            Vec2::new(0.05, 0.0),
            0.1,
            &a
        ));
    }

    #[test]
    fn circle_circle_overlap() {
        let c = Collider::circle(0.5);
        assert!(colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &c,
            Vec2::new(0.9, 0.0),
            1.0,
            &c
        ));
        assert!(!colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &c,
            Vec2::new(1.1, 0.0),
            1.0,
            &c
        ));
    }

    #[test]
    fn rect_circle_overlap_near_corner() {
        let rect = Collider::rect(0.5, 0.5);
        let circle = Collider::circle(0.5);
        // Circle center just off the rect corner, within the radius.
        assert!(colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &rect,
            Vec2::new(0.8, 0.8),
            1.0,
            &circle
        ));
        // Far beyond the corner reach.
        assert!(!colliders_intersect(
            Vec2::new(0.0, 0.0),
            1.0,
            &rect,
            Vec2::new(1.0, 1.0),
            1.0,
            &circle
        ));
    }

    #[test]
    fn aabb_intersection_and_containment() {
        let a = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 2.0, 1.0));
        let b = Aabb::new(Vec3::new(0.5, 0.5, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let c = Aabb::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(a.intersects(&b));
        assert!(a.contains(&b));
        assert!(!a.intersects(&c));
        assert!(!a.contains(&c));
        assert!(!b.contains(&a));
    }
}
