use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use super::types::{Aabb, MaterialId};
use crate::config::UNBOUNDED_EXTENT;
use crate::error::{PhysicsError, PhysicsResult};
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, rotate, rotate90cw, triangle_area, triangle_centroid};

/// Discriminant used by the narrowphase dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeKind {
    Circle,
    Particle,
    Plane,
    Line,
    Capsule,
    Box,
    Convex,
    Heightfield,
}

/// Convex polygon stored counter-clockwise around its centroid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexPolygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
    area: f32,
    bounding_radius: f32,
}

impl ConvexPolygon {
    /// Builds a polygon from vertices in either winding, recentred on its centroid.
    pub fn new(vertices: Vec<Vec2>) -> PhysicsResult<Self> {
        if vertices.len() < 3 {
            return Err(PhysicsError::InvalidShape(format!(
                "convex polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }

        let mut vertices = vertices;
        let signed_area: f32 = (1..vertices.len() - 1)
            .map(|i| triangle_area(vertices[0], vertices[i], vertices[i + 1]))
            .sum();
        if !signed_area.is_finite() || signed_area.abs() <= f32::EPSILON {
            return Err(PhysicsError::InvalidShape(
                "convex polygon has zero area".to_string(),
            ));
        }
        if signed_area < 0.0 {
            vertices.reverse();
        }

        let mut centroid = Vec2::ZERO;
        for i in 1..vertices.len() - 1 {
            let (a, b, c) = (vertices[0], vertices[i], vertices[i + 1]);
            centroid += triangle_centroid(a, b, c) * triangle_area(a, b, c);
        }
        centroid /= signed_area.abs();
        for v in &mut vertices {
            *v -= centroid;
        }

        let n = vertices.len();
        let normals = (0..n)
            .map(|i| rotate90cw((vertices[(i + 1) % n] - vertices[i]).normalize_or_zero()))
            .collect();
        let bounding_radius = vertices.iter().map(|v| v.length()).fold(0.0, f32::max);

        Ok(Self {
            vertices,
            normals,
            area: signed_area.abs(),
            bounding_radius,
        })
    }

    /// Axis-aligned rectangle centred on the origin.
    pub fn rectangle(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self {
            vertices: vec![
                Vec2::new(-hw, -hh),
                Vec2::new(hw, -hh),
                Vec2::new(hw, hh),
                Vec2::new(-hw, hh),
            ],
            normals: vec![Vec2::NEG_Y, Vec2::X, Vec2::Y, Vec2::NEG_X],
            area: width * height,
            bounding_radius: Vec2::new(hw, hh).length(),
        }
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Outward normal of edge `i -> i + 1`.
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        let n = self.vertices.len();
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for i in 0..n {
            let p0 = self.vertices[(i + n - 1) % n];
            let p1 = self.vertices[i];
            let a = cross(p0, p1).abs();
            let b = p1.dot(p1) + p1.dot(p0) + p0.dot(p0);
            numerator += a * b;
            denominator += a;
        }
        if denominator <= 0.0 {
            return 0.0;
        }
        (mass / 6.0) * (numerator / denominator)
    }

    /// True if `point` (polygon frame) lies inside or on the boundary.
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| (point - *v).dot(*n) <= 0.0)
    }
}

/// Height samples spaced `element_width` apart along local +X.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    heights: Vec<f32>,
    element_width: f32,
    min_value: f32,
    max_value: f32,
}

impl Heightfield {
    pub fn new(heights: Vec<f32>, element_width: f32) -> PhysicsResult<Self> {
        if heights.len() < 2 {
            return Err(PhysicsError::InvalidShape(
                "heightfield needs at least 2 samples".to_string(),
            ));
        }
        if !(element_width > 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "heightfield element width must be positive, got {element_width}"
            )));
        }
        let min_value = heights.iter().copied().fold(f32::MAX, f32::min);
        let max_value = heights.iter().copied().fold(f32::MIN, f32::max);
        Ok(Self {
            heights,
            element_width,
            min_value,
            max_value,
        })
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn element_width(&self) -> f32 {
        self.element_width
    }

    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    /// Total width covered by the samples.
    pub fn width(&self) -> f32 {
        self.element_width * (self.heights.len() - 1) as f32
    }

    /// Sample index range `[from, to]` overlapped by the local x interval.
    pub fn index_range(&self, lower_x: f32, upper_x: f32) -> (usize, usize) {
        let last = (self.heights.len() - 1) as f32;
        let from = (lower_x / self.element_width).floor().clamp(0.0, last) as usize;
        let to = (upper_x / self.element_width).ceil().clamp(0.0, last) as usize;
        (from, to)
    }

    /// Largest sample in `[from, to]`.
    pub fn max_in_range(&self, from: usize, to: usize) -> f32 {
        self.heights[from..=to]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max)
    }

    /// Segment endpoints `i -> i + 1` in the heightfield frame.
    pub fn segment(&self, i: usize) -> (Vec2, Vec2) {
        let w = self.element_width;
        (
            Vec2::new(i as f32 * w, self.heights[i]),
            Vec2::new((i + 1) as f32 * w, self.heights[i + 1]),
        )
    }
}

/// Geometry carried by a [`Shape`], in the shape's own frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeGeometry {
    Circle { radius: f32 },
    /// Dimensionless point.
    Particle,
    /// Infinite half-space below local +Y.
    Plane,
    /// Segment along local X, centred on the shape position.
    Line { length: f32 },
    /// Segment along local X swept by `radius`.
    Capsule { length: f32, radius: f32 },
    Box {
        width: f32,
        height: f32,
        polygon: ConvexPolygon,
    },
    Convex(ConvexPolygon),
    Heightfield(Heightfield),
}

impl ShapeGeometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeGeometry::Circle { .. } => ShapeKind::Circle,
            ShapeGeometry::Particle => ShapeKind::Particle,
            ShapeGeometry::Plane => ShapeKind::Plane,
            ShapeGeometry::Line { .. } => ShapeKind::Line,
            ShapeGeometry::Capsule { .. } => ShapeKind::Capsule,
            ShapeGeometry::Box { .. } => ShapeKind::Box,
            ShapeGeometry::Convex(_) => ShapeKind::Convex,
            ShapeGeometry::Heightfield(_) => ShapeKind::Heightfield,
        }
    }

    /// Polygon view shared by boxes and convex shapes.
    pub fn polygon(&self) -> Option<&ConvexPolygon> {
        match self {
            ShapeGeometry::Box { polygon, .. } | ShapeGeometry::Convex(polygon) => Some(polygon),
            _ => None,
        }
    }
}

/// Collision shape attached to a body at a local offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub geometry: ShapeGeometry,
    /// Offset from the body origin, in body frame.
    pub position: Vec2,
    pub angle: f32,
    pub collision_group: u32,
    pub collision_mask: u32,
    pub material: Option<MaterialId>,
    /// Sensors report overlap but never produce equations.
    pub sensor: bool,
    pub collision_response: bool,
}

impl Shape {
    pub fn new(geometry: ShapeGeometry) -> Self {
        Self {
            geometry,
            position: Vec2::ZERO,
            angle: 0.0,
            collision_group: 1,
            collision_mask: u32::MAX,
            material: None,
            sensor: false,
            collision_response: true,
        }
    }

    pub fn circle(radius: f32) -> Self {
        Self::new(ShapeGeometry::Circle { radius })
    }

    pub fn particle() -> Self {
        Self::new(ShapeGeometry::Particle)
    }

    pub fn plane() -> Self {
        Self::new(ShapeGeometry::Plane)
    }

    pub fn line(length: f32) -> Self {
        Self::new(ShapeGeometry::Line { length })
    }

    pub fn capsule(length: f32, radius: f32) -> Self {
        Self::new(ShapeGeometry::Capsule { length, radius })
    }

    pub fn rectangle(width: f32, height: f32) -> Self {
        Self::new(ShapeGeometry::Box {
            width,
            height,
            polygon: ConvexPolygon::rectangle(width, height),
        })
    }

    pub fn convex(vertices: Vec<Vec2>) -> PhysicsResult<Self> {
        Ok(Self::new(ShapeGeometry::Convex(ConvexPolygon::new(vertices)?)))
    }

    pub fn heightfield(heights: Vec<f32>, element_width: f32) -> PhysicsResult<Self> {
        Ok(Self::new(ShapeGeometry::Heightfield(Heightfield::new(
            heights,
            element_width,
        )?)))
    }

    pub fn with_offset(mut self, position: Vec2, angle: f32) -> Self {
        self.position = position;
        self.angle = angle;
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_group = group;
        self.collision_mask = mask;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn as_sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn with_collision_response(mut self, enabled: bool) -> Self {
        self.collision_response = enabled;
        self
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    /// Rejects geometry the narrowphase cannot handle.
    pub fn validate(&self) -> PhysicsResult<()> {
        let invalid = |what: String| Err(PhysicsError::InvalidShape(what));
        match &self.geometry {
            ShapeGeometry::Circle { radius } if !(*radius >= 0.0) => {
                invalid(format!("circle radius must be non-negative, got {radius}"))
            }
            ShapeGeometry::Line { length } if !(*length >= 0.0) => {
                invalid(format!("line length must be non-negative, got {length}"))
            }
            ShapeGeometry::Capsule { length, radius } if !(*length >= 0.0 && *radius >= 0.0) => {
                invalid(format!(
                    "capsule length and radius must be non-negative, got {length} and {radius}"
                ))
            }
            ShapeGeometry::Box { width, height, .. } if !(*width > 0.0 && *height > 0.0) => {
                invalid(format!("box extents must be positive, got {width}x{height}"))
            }
            _ if !self.position.is_finite() || !self.angle.is_finite() => {
                invalid("shape offset must be finite".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn bounding_radius(&self) -> f32 {
        match &self.geometry {
            ShapeGeometry::Circle { radius } => *radius,
            ShapeGeometry::Particle => 0.0,
            ShapeGeometry::Plane => f32::MAX,
            ShapeGeometry::Line { length } => length * 0.5,
            ShapeGeometry::Capsule { length, radius } => radius + length * 0.5,
            ShapeGeometry::Box { polygon, .. } | ShapeGeometry::Convex(polygon) => {
                polygon.bounding_radius()
            }
            ShapeGeometry::Heightfield(field) => {
                let corner = field.max_value().abs().max(field.min_value().abs());
                Vec2::new(field.width(), corner).length()
            }
        }
    }

    pub fn area(&self) -> f32 {
        match &self.geometry {
            ShapeGeometry::Circle { radius } => PI * radius * radius,
            ShapeGeometry::Capsule { length, radius } => {
                PI * radius * radius + 2.0 * radius * length
            }
            ShapeGeometry::Box { width, height, .. } => width * height,
            ShapeGeometry::Convex(polygon) => polygon.area(),
            ShapeGeometry::Particle
            | ShapeGeometry::Plane
            | ShapeGeometry::Line { .. }
            | ShapeGeometry::Heightfield(_) => 0.0,
        }
    }

    /// Moment of inertia about the shape's own origin for the given mass.
    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        match &self.geometry {
            ShapeGeometry::Circle { radius } => mass * radius * radius * 0.5,
            ShapeGeometry::Line { length } => mass * length * length / 12.0,
            ShapeGeometry::Capsule { length, radius } => {
                let w = length + radius;
                let h = radius * 2.0;
                mass * (h * h + w * w) / 12.0
            }
            ShapeGeometry::Box { width, height, .. } => {
                mass * (width * width + height * height) / 12.0
            }
            ShapeGeometry::Convex(polygon) => polygon.moment_of_inertia(mass),
            ShapeGeometry::Particle | ShapeGeometry::Plane | ShapeGeometry::Heightfield(_) => 0.0,
        }
    }

    /// World-space bounds when the shape sits at `position`/`angle`.
    pub fn compute_aabb(&self, position: Vec2, angle: f32) -> Aabb {
        match &self.geometry {
            ShapeGeometry::Circle { radius } => Aabb {
                lower: position - Vec2::splat(*radius),
                upper: position + Vec2::splat(*radius),
            },
            ShapeGeometry::Particle => Aabb {
                lower: position,
                upper: position,
            },
            ShapeGeometry::Plane => plane_aabb(position, angle),
            ShapeGeometry::Line { length } => {
                let half = Vec2::new(length * 0.5, 0.0);
                Aabb::from_points(&[-half, half], position, angle, 0.0)
            }
            ShapeGeometry::Capsule { length, radius } => {
                let half = Vec2::new(length * 0.5, 0.0);
                Aabb::from_points(&[-half, half], position, angle, *radius)
            }
            ShapeGeometry::Box { polygon, .. } | ShapeGeometry::Convex(polygon) => {
                Aabb::from_points(polygon.vertices(), position, angle, 0.0)
            }
            ShapeGeometry::Heightfield(field) => Aabb {
                lower: Vec2::new(position.x, -UNBOUNDED_EXTENT),
                upper: Vec2::new(position.x + field.width(), position.y + field.max_value()),
            },
        }
    }

    /// Point containment test with `point` in the shape's own frame.
    pub fn contains_local_point(&self, point: Vec2) -> bool {
        match &self.geometry {
            ShapeGeometry::Circle { radius } => point.length_squared() <= radius * radius,
            ShapeGeometry::Plane => point.y <= 0.0,
            ShapeGeometry::Capsule { length, radius } => {
                let x = point.x.clamp(-length * 0.5, length * 0.5);
                point.distance_squared(Vec2::new(x, 0.0)) <= radius * radius
            }
            ShapeGeometry::Box { polygon, .. } | ShapeGeometry::Convex(polygon) => {
                polygon.contains_point(point)
            }
            ShapeGeometry::Heightfield(field) => {
                if point.x < 0.0 || point.x > field.width() {
                    return false;
                }
                let (i, _) = field.index_range(point.x, point.x);
                let i = i.min(field.heights().len() - 2);
                let (a, b) = field.segment(i);
                let t = (point.x - a.x) / (b.x - a.x);
                point.y <= a.y + (b.y - a.y) * t
            }
            ShapeGeometry::Particle | ShapeGeometry::Line { .. } => false,
        }
    }
}

fn plane_aabb(position: Vec2, angle: f32) -> Aabb {
    let max = UNBOUNDED_EXTENT;
    let turned = angle.rem_euclid(TAU);
    let near = |target: f32| (turned - target).abs() < 1e-6;

    let (lower, upper) = if near(0.0) || near(TAU) {
        (Vec2::new(-max, -max), Vec2::new(max, 0.0))
    } else if near(FRAC_PI_2) {
        (Vec2::new(0.0, -max), Vec2::new(max, max))
    } else if near(PI) {
        (Vec2::new(-max, 0.0), Vec2::new(max, max))
    } else if near(3.0 * FRAC_PI_2) {
        (Vec2::new(-max, -max), Vec2::new(0.0, max))
    } else {
        (Vec2::splat(-max), Vec2::splat(max))
    };

    Aabb {
        lower: lower + position,
        upper: upper + position,
    }
}

/// Locates a shape by owning body and index within that body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShapeHandle {
    pub body: EntityId,
    pub index: usize,
}

impl ShapeHandle {
    pub fn new(body: EntityId, index: usize) -> Self {
        Self { body, index }
    }
}

/// World pose of a shape given its body's pose.
pub fn shape_world_pose(shape: &Shape, body_position: Vec2, body_angle: f32) -> (Vec2, f32) {
    (
        body_position + rotate(shape.position, body_angle),
        body_angle + shape.angle,
    )
}
