//! Separating-axis helpers and reference/incident edge clipping for convex
//! polygons.

use glam::Vec2;

use crate::core::shape::ConvexPolygon;
use crate::utils::math::{rotate, rotate90cw};

/// Borrowed polygon placed in the world.
///
/// Vertices and normals are in the polygon's own frame; the view applies the
/// pose on access so rectangles and tiles built on the stack need no
/// allocation.
#[derive(Debug, Clone, Copy)]
pub struct PolygonView<'a> {
    pub vertices: &'a [Vec2],
    pub normals: &'a [Vec2],
    pub position: Vec2,
    pub angle: f32,
}

impl<'a> PolygonView<'a> {
    pub fn new(vertices: &'a [Vec2], normals: &'a [Vec2], position: Vec2, angle: f32) -> Self {
        Self {
            vertices,
            normals,
            position,
            angle,
        }
    }

    pub fn from_polygon(polygon: &'a ConvexPolygon, position: Vec2, angle: f32) -> Self {
        Self::new(polygon.vertices(), polygon.normals(), position, angle)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn world_vertex(&self, i: usize) -> Vec2 {
        rotate(self.vertices[i], self.angle) + self.position
    }

    #[inline]
    pub fn world_normal(&self, i: usize) -> Vec2 {
        rotate(self.normals[i], self.angle)
    }

    /// Index of the vertex following `i`.
    #[inline]
    pub fn next(&self, i: usize) -> usize {
        if i + 1 < self.vertices.len() { i + 1 } else { 0 }
    }
}

/// Outward normals for a counter-clockwise vertex loop.
pub fn edge_normals<const N: usize>(vertices: &[Vec2; N]) -> [Vec2; N] {
    std::array::from_fn(|i| rotate90cw((vertices[(i + 1) % N] - vertices[i]).normalize_or_zero()))
}

/// Largest separation of `poly2` from any edge of `poly1`, with that edge's index.
///
/// For each edge normal of `poly1`, the deepest vertex of `poly2` gives the
/// separation along that axis; a positive result proves the polygons disjoint.
pub fn find_max_separation(poly1: &PolygonView, poly2: &PolygonView) -> (f32, usize) {
    let mut best_index = 0;
    let mut max_separation = f32::MIN;

    for i in 0..poly1.len() {
        let n = poly1.world_normal(i);
        let v1 = poly1.world_vertex(i);

        let mut si = f32::MAX;
        for j in 0..poly2.len() {
            let sij = n.dot(poly2.world_vertex(j) - v1);
            if sij < si {
                si = sij;
            }
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (max_separation, best_index)
}

/// Edge of `poly2` whose normal is most anti-parallel to edge `edge1` of `poly1`.
pub fn find_incident_edge(poly1: &PolygonView, edge1: usize, poly2: &PolygonView) -> [Vec2; 2] {
    let normal1 = poly1.world_normal(edge1);

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..poly2.len() {
        let dot = normal1.dot(poly2.world_normal(i));
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    [poly2.world_vertex(index), poly2.world_vertex(poly2.next(index))]
}

/// Clips segment `v_in` to the half-plane `normal·x <= offset`.
///
/// Returns the clipped points and how many of them are valid (0..=2).
pub fn clip_segment_to_line(v_in: [Vec2; 2], normal: Vec2, offset: f32) -> ([Vec2; 2], usize) {
    let mut v_out = [Vec2::ZERO; 2];
    let mut count = 0;

    let distance0 = normal.dot(v_in[0]) - offset;
    let distance1 = normal.dot(v_in[1]) - offset;

    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    if distance0 * distance1 < 0.0 && count < 2 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = v_in[0] + (v_in[1] - v_in[0]) * interp;
        count += 1;
    }

    (v_out, count)
}

/// Clipped incident edge against a reference face.
#[derive(Debug, Clone, Copy)]
pub struct ClipResult {
    /// True when `poly2` ended up as the reference polygon.
    pub flip: bool,
    /// Outward normal of the reference face, in world space.
    pub normal: Vec2,
    pub points: [Vec2; 2],
    /// Signed distance of each point from the reference face.
    pub separations: [f32; 2],
}

/// Separating-axis test followed by reference/incident clipping.
///
/// Returns `None` when an axis separates the polygons by more than
/// `total_radius` or clipping leaves fewer than two points. When both
/// polygons separate equally, `poly_a` is kept as the reference.
pub fn collide_polygons(
    poly_a: &PolygonView,
    poly_b: &PolygonView,
    total_radius: f32,
) -> Option<ClipResult> {
    let (separation_a, edge_a) = find_max_separation(poly_a, poly_b);
    if separation_a > total_radius {
        return None;
    }
    let (separation_b, edge_b) = find_max_separation(poly_b, poly_a);
    if separation_b > total_radius {
        return None;
    }

    let (poly1, poly2, edge1, flip) = if separation_b > separation_a {
        (poly_b, poly_a, edge_b, true)
    } else {
        (poly_a, poly_b, edge_a, false)
    };

    let incident = find_incident_edge(poly1, edge1, poly2);

    let v11 = poly1.world_vertex(edge1);
    let v12 = poly1.world_vertex(poly1.next(edge1));
    let tangent = (v12 - v11).normalize_or_zero();
    let normal = rotate90cw(tangent);

    let front_offset = normal.dot(v11);
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let (clip1, count) = clip_segment_to_line(incident, -tangent, side_offset1);
    if count < 2 {
        return None;
    }
    let (clip2, count) = clip_segment_to_line(clip1, tangent, side_offset2);
    if count < 2 {
        return None;
    }

    Some(ClipResult {
        flip,
        normal,
        points: clip2,
        separations: [
            normal.dot(clip2[0]) - front_offset,
            normal.dot(clip2[1]) - front_offset,
        ],
    })
}
