//! 2D math helpers layered on top of `glam`.

use glam::Vec2;

/// Rotates `v` counter-clockwise by `angle` radians.
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Rotates a vector 90 degrees clockwise.
#[inline]
pub fn rotate90cw(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// Scalar 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of an out-of-plane scalar with a vector, `z × v`.
#[inline]
pub fn cross_zv(z: f32, v: Vec2) -> Vec2 {
    v.perp() * z
}

/// Maps a point from a local frame (`position`, `angle`) into world space.
#[inline]
pub fn to_global_frame(local: Vec2, position: Vec2, angle: f32) -> Vec2 {
    rotate(local, angle) + position
}

/// Maps a world point into the local frame described by `position` and `angle`.
#[inline]
pub fn to_local_frame(world: Vec2, position: Vec2, angle: f32) -> Vec2 {
    rotate(world - position, -angle)
}

/// Rotates a direction into the local frame without translating it.
#[inline]
pub fn vector_to_local_frame(world: Vec2, angle: f32) -> Vec2 {
    rotate(world, -angle)
}

/// Fraction along `p0 -> p1` where it crosses segment `q0 -> q1`, or `None`
/// when the segments do not intersect.
pub fn line_segments_intersection_fraction(p0: Vec2, p1: Vec2, q0: Vec2, q1: Vec2) -> Option<f32> {
    let s1 = p1 - p0;
    let s2 = q1 - q0;
    let denom = -s2.x * s1.y + s1.x * s2.y;
    if denom == 0.0 {
        return None;
    }
    let s = (-s1.y * (p0.x - q0.x) + s1.x * (p0.y - q0.y)) / denom;
    let t = (s2.x * (p0.y - q0.y) - s2.y * (p0.x - q0.x)) / denom;
    if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
        Some(t)
    } else {
        None
    }
}

/// Centroid of a triangle.
#[inline]
pub fn triangle_centroid(a: Vec2, b: Vec2, c: Vec2) -> Vec2 {
    (a + b + c) / 3.0
}

/// Signed area of a triangle, positive for counter-clockwise winding.
#[inline]
pub fn triangle_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    cross(b - a, c - a) * 0.5
}
