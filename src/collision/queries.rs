use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        rigidbody::RigidBody,
        shape::{Heightfield, Shape, ShapeGeometry, ShapeHandle, shape_world_pose},
        types::Aabb,
    },
    utils::{
        allocator::EntityId,
        math::{line_segments_intersection_fraction, rotate, to_local_frame},
    },
};

/// Which hits a ray keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RayMode {
    /// Only the hit nearest to `from`.
    #[default]
    Closest,
    /// Stop at the first hit found.
    Any,
    /// Every hit, in traversal order.
    All,
}

/// A single ray intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub body: EntityId,
    pub shape: ShapeHandle,
    pub point: Vec2,
    /// World-space surface normal at the hit.
    pub normal: Vec2,
    /// Position along the ray in `[0, 1]`.
    pub fraction: f32,
    pub distance: f32,
    /// Polygon edge or heightfield segment that was hit.
    pub face_index: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct RaycastResult {
    pub closest: Option<RaycastHit>,
    /// Filled only in [`RayMode::All`].
    pub hits: Vec<RaycastHit>,
    stopped: bool,
}

impl RaycastResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_hit(&self) -> bool {
        self.closest.is_some()
    }

    pub fn hit_point(&self) -> Option<Vec2> {
        self.closest.map(|hit| hit.point)
    }

    pub fn hit_distance(&self) -> Option<f32> {
        self.closest.map(|hit| hit.distance)
    }

    /// Ends the traversal; later hits are ignored.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn reset(&mut self) {
        self.closest = None;
        self.hits.clear();
        self.stopped = false;
    }

    pub fn sort_by_distance(&mut self) {
        self.hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
    }
}

/// Line segment query from `from` to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    pub from: Vec2,
    pub to: Vec2,
    pub mode: RayMode,
    pub collision_group: u32,
    pub collision_mask: u32,
    /// Ignore bodies and shapes with collision response turned off.
    pub check_collision_response: bool,
    /// Drop hits whose normal faces along the ray.
    pub skip_backfaces: bool,
    /// Ignore sensor shapes.
    pub skip_sensors: bool,
    direction: Vec2,
    length: f32,
}

impl Ray {
    pub fn new(from: Vec2, to: Vec2) -> Self {
        let mut ray = Self {
            from,
            to,
            mode: RayMode::Closest,
            collision_group: u32::MAX,
            collision_mask: u32::MAX,
            check_collision_response: true,
            skip_backfaces: false,
            skip_sensors: false,
            direction: Vec2::ZERO,
            length: 0.0,
        };
        ray.update();
        ray
    }

    pub fn with_mode(mut self, mode: RayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_group = group;
        self.collision_mask = mask;
        self
    }

    pub fn with_skip_backfaces(mut self, skip: bool) -> Self {
        self.skip_backfaces = skip;
        self
    }

    pub fn with_skip_sensors(mut self, skip: bool) -> Self {
        self.skip_sensors = skip;
        self
    }

    /// Recomputes the cached direction and length after `from`/`to` change.
    pub fn update(&mut self) {
        let delta = self.to - self.from;
        self.length = delta.length();
        self.direction = delta.normalize_or_zero();
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.from.min(self.to), self.from.max(self.to))
    }

    pub fn intersect_bodies<'a>(
        &self,
        result: &mut RaycastResult,
        bodies: impl IntoIterator<Item = &'a RigidBody>,
    ) {
        for body in bodies {
            if result.is_stopped() {
                break;
            }
            self.intersect_body(result, body);
        }
    }

    pub fn intersect_body(&self, result: &mut RaycastResult, body: &RigidBody) {
        if result.is_stopped() {
            return;
        }
        if self.check_collision_response && !body.collision_response {
            return;
        }
        if !self.overlaps_aabb(&body.aabb_at(body.pose())) {
            return;
        }

        for (index, shape) in body.shapes.iter().enumerate() {
            if (self.check_collision_response && !shape.collision_response)
                || (self.skip_sensors && shape.sensor)
            {
                continue;
            }
            if (self.collision_group & shape.collision_mask) == 0
                || (shape.collision_group & self.collision_mask) == 0
            {
                continue;
            }
            let (position, angle) = shape_world_pose(shape, body.position, body.angle);
            self.intersect_shape(result, body.id, index, shape, position, angle);
            if result.is_stopped() {
                break;
            }
        }
    }

    /// Slab test of the segment against an AABB.
    fn overlaps_aabb(&self, aabb: &Aabb) -> bool {
        let delta = self.to - self.from;
        let mut t_min = 0.0_f32;
        let mut t_max = 1.0_f32;

        for axis in 0..2 {
            let origin = self.from[axis];
            let d = delta[axis];
            if d.abs() < f32::EPSILON {
                if origin < aabb.lower[axis] || origin > aabb.upper[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (aabb.lower[axis] - origin) * inv;
            let mut t2 = (aabb.upper[axis] - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return false;
            }
        }
        true
    }

    fn intersect_shape(
        &self,
        result: &mut RaycastResult,
        body: EntityId,
        index: usize,
        shape: &Shape,
        position: Vec2,
        angle: f32,
    ) {
        let from = to_local_frame(self.from, position, angle);
        let to = to_local_frame(self.to, position, angle);
        let handle = ShapeHandle::new(body, index);

        let mut report = |fraction: f32, local_normal: Vec2, face_index: Option<usize>| {
            self.report_hit(
                result,
                body,
                handle,
                fraction,
                rotate(local_normal, angle),
                face_index,
            );
        };

        match &shape.geometry {
            ShapeGeometry::Circle { radius } => raycast_circle(from, to, Vec2::ZERO, *radius, &mut report),
            ShapeGeometry::Particle => {}
            ShapeGeometry::Plane => raycast_plane(from, to, &mut report),
            ShapeGeometry::Line { length } => raycast_line(from, to, length * 0.5, &mut report),
            ShapeGeometry::Capsule { length, radius } => {
                raycast_capsule(from, to, length * 0.5, *radius, &mut report)
            }
            ShapeGeometry::Box { polygon, .. } | ShapeGeometry::Convex(polygon) => {
                raycast_polygon(from, to, polygon.vertices(), polygon.normals(), &mut report)
            }
            ShapeGeometry::Heightfield(field) => raycast_heightfield(from, to, field, &mut report),
        }
    }

    fn report_hit(
        &self,
        result: &mut RaycastResult,
        body: EntityId,
        shape: ShapeHandle,
        fraction: f32,
        normal: Vec2,
        face_index: Option<usize>,
    ) {
        if result.is_stopped() {
            return;
        }
        if self.skip_backfaces && normal.dot(self.direction) > 0.0 {
            return;
        }

        let hit = RaycastHit {
            body,
            shape,
            point: self.from.lerp(self.to, fraction),
            normal,
            fraction,
            distance: self.length * fraction,
            face_index,
        };
        let nearer = result
            .closest
            .map_or(true, |closest| fraction < closest.fraction);

        match self.mode {
            RayMode::Closest => {
                if nearer {
                    result.closest = Some(hit);
                }
            }
            RayMode::Any => {
                result.closest = Some(hit);
                result.stop();
            }
            RayMode::All => {
                if nearer {
                    result.closest = Some(hit);
                }
                result.hits.push(hit);
            }
        }
    }
}

type Report<'r> = dyn FnMut(f32, Vec2, Option<usize>) + 'r;

fn raycast_circle(from: Vec2, to: Vec2, center: Vec2, radius: f32, report: &mut Report<'_>) {
    let d = to - from;
    let f = from - center;
    let a = d.length_squared();
    if a == 0.0 {
        return;
    }
    let b = 2.0 * f.dot(d);
    let c = f.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return;
    }

    let root = discriminant.sqrt();
    let roots = if root == 0.0 {
        [-b / (2.0 * a), f32::NAN]
    } else {
        [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
    };
    for t in roots {
        if (0.0..=1.0).contains(&t) {
            let point = from + d * t;
            report(t, (point - center).normalize_or_zero(), None);
        }
    }
}

fn raycast_plane(from: Vec2, to: Vec2, report: &mut Report<'_>) {
    if from.y == to.y || from.y * to.y > 0.0 {
        return;
    }
    let t = from.y / (from.y - to.y);
    if (0.0..=1.0).contains(&t) {
        report(t, Vec2::Y, None);
    }
}

fn raycast_line(from: Vec2, to: Vec2, half_length: f32, report: &mut Report<'_>) {
    let (l0, l1) = (Vec2::new(-half_length, 0.0), Vec2::new(half_length, 0.0));
    if let Some(t) = line_segments_intersection_fraction(from, to, l0, l1) {
        report(t, Vec2::Y, None);
    }
}

fn raycast_capsule(from: Vec2, to: Vec2, half_length: f32, radius: f32, report: &mut Report<'_>) {
    for (side, normal) in [(radius, Vec2::Y), (-radius, Vec2::NEG_Y)] {
        let l0 = Vec2::new(-half_length, side);
        let l1 = Vec2::new(half_length, side);
        if let Some(t) = line_segments_intersection_fraction(from, to, l0, l1) {
            report(t, normal, None);
        }
    }

    // End caps only count outside the straight section.
    for end in [-half_length, half_length] {
        let center = Vec2::new(end, 0.0);
        raycast_circle(from, to, center, radius, &mut |t, normal, face| {
            let x = (from + (to - from) * t).x;
            if (end < 0.0 && x <= end) || (end >= 0.0 && x >= end) {
                report(t, normal, face);
            }
        });
    }
}

fn raycast_polygon(from: Vec2, to: Vec2, vertices: &[Vec2], normals: &[Vec2], report: &mut Report<'_>) {
    let n = vertices.len();
    for i in 0..n {
        let q0 = vertices[i];
        let q1 = vertices[(i + 1) % n];
        if let Some(t) = line_segments_intersection_fraction(from, to, q0, q1) {
            report(t, normals[i], Some(i));
        }
    }
}

fn raycast_heightfield(from: Vec2, to: Vec2, field: &Heightfield, report: &mut Report<'_>) {
    for i in 0..field.heights().len() - 1 {
        let (v0, v1) = field.segment(i);
        if let Some(t) = line_segments_intersection_fraction(from, to, v0, v1) {
            report(t, (v1 - v0).perp().normalize_or_zero(), Some(i));
        }
    }
}
