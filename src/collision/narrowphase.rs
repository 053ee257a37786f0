//! Exact per-shape-pair contact generation.
//!
//! Every routine writes [`ContactEquation`]s whose `normal_a` points out of the
//! equation's body A. Friction rows are derived afterwards from the contacts a
//! single `collide` call produced, either one per contact or one averaged row
//! when friction reduction is enabled.

use glam::Vec2;

use super::clipping::{PolygonView, collide_polygons, edge_normals};
use crate::config::{
    DEFAULT_FRICTION, DEFAULT_RELAXATION, DEFAULT_SLIP_FORCE, DEFAULT_STIFFNESS,
    NARROWPHASE_CONTACT_SKIN_SIZE,
};
use crate::core::{
    rigidbody::{BodyPose, RigidBody},
    shape::{Heightfield, Shape, ShapeGeometry, ShapeHandle, ShapeKind, shape_world_pose},
    types::{Aabb, ContactMaterial},
};
use crate::dynamics::{contact::ContactEquation, friction::FrictionEquation};
use crate::utils::{
    allocator::EntityId,
    math::{rotate, rotate90cw},
    pool::Pool,
    tuple_dictionary::TupleDictionary,
};

/// Depth of the convex tiles synthesized under each heightfield segment.
const HEIGHTFIELD_TILE_DEPTH: f32 = 100.0;

/// A shape placed in the world for one narrowphase query.
#[derive(Debug, Clone, Copy)]
pub struct ShapeInstance<'a> {
    pub body: EntityId,
    /// Position of the owning body; contact points are stored relative to it.
    pub body_position: Vec2,
    pub shape: &'a Shape,
    pub handle: ShapeHandle,
    pub position: Vec2,
    pub angle: f32,
}

impl<'a> ShapeInstance<'a> {
    pub fn new(body: EntityId, pose: BodyPose, shape: &'a Shape, index: usize) -> Self {
        let (position, angle) = shape_world_pose(shape, pose.position, pose.angle);
        Self {
            body,
            body_position: pose.position,
            shape,
            handle: ShapeHandle::new(body, index),
            position,
            angle,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    fn radius(&self) -> f32 {
        match self.shape.geometry {
            ShapeGeometry::Circle { radius } | ShapeGeometry::Capsule { radius, .. } => radius,
            _ => 0.0,
        }
    }

    fn half_length(&self) -> f32 {
        match self.shape.geometry {
            ShapeGeometry::Line { length } | ShapeGeometry::Capsule { length, .. } => length * 0.5,
            _ => 0.0,
        }
    }

    fn polygon(&self) -> Option<PolygonView<'a>> {
        self.shape
            .geometry
            .polygon()
            .map(|polygon| PolygonView::from_polygon(polygon, self.position, self.angle))
    }

    fn heightfield(&self) -> Option<&'a Heightfield> {
        match &self.shape.geometry {
            ShapeGeometry::Heightfield(field) => Some(field),
            _ => None,
        }
    }

    /// World positions of the two segment endpoints of a line or capsule.
    fn segment_ends(&self) -> [Vec2; 2] {
        let half = Vec2::new(self.half_length(), 0.0);
        [
            self.position + rotate(-half, self.angle),
            self.position + rotate(half, self.angle),
        ]
    }

    /// Outward plane normal in world space.
    fn plane_normal(&self) -> Vec2 {
        rotate(Vec2::Y, self.angle)
    }
}

/// Whether two shapes' group/mask filters accept each other.
pub fn filters_match(a: &Shape, b: &Shape) -> bool {
    (a.collision_group & b.collision_mask) != 0 && (b.collision_group & a.collision_mask) != 0
}

/// Contact routine selected for a pair of shape kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    CircleCircle,
    CircleParticle,
    CirclePlane,
    CircleLine,
    CircleCapsule,
    CircleConvex,
    CircleHeightfield,
    ParticlePlane,
    ParticleCapsule,
    ParticleConvex,
    PlaneLine,
    PlaneCapsule,
    PlaneConvex,
    ConvexConvex,
    ConvexCapsule,
    CapsuleCapsule,
    CapsuleHeightfield,
    ConvexHeightfield,
    /// Line against line, capsule, box, or convex: always zero contacts.
    Unsupported,
}

fn canonical_routine(a: ShapeKind, b: ShapeKind) -> Option<Routine> {
    use ShapeKind as K;

    let routine = match (a, b) {
        (K::Circle, K::Circle) => Routine::CircleCircle,
        (K::Circle, K::Particle) => Routine::CircleParticle,
        (K::Circle, K::Plane) => Routine::CirclePlane,
        (K::Circle, K::Line) => Routine::CircleLine,
        (K::Circle, K::Capsule) => Routine::CircleCapsule,
        (K::Circle, K::Box | K::Convex) => Routine::CircleConvex,
        (K::Circle, K::Heightfield) => Routine::CircleHeightfield,
        (K::Particle, K::Plane) => Routine::ParticlePlane,
        (K::Particle, K::Capsule) => Routine::ParticleCapsule,
        (K::Particle, K::Box | K::Convex) => Routine::ParticleConvex,
        (K::Plane, K::Line) => Routine::PlaneLine,
        (K::Plane, K::Capsule) => Routine::PlaneCapsule,
        (K::Plane, K::Box | K::Convex) => Routine::PlaneConvex,
        (K::Box | K::Convex, K::Box | K::Convex) => Routine::ConvexConvex,
        (K::Box | K::Convex, K::Capsule) => Routine::ConvexCapsule,
        (K::Capsule, K::Capsule) => Routine::CapsuleCapsule,
        (K::Capsule, K::Heightfield) => Routine::CapsuleHeightfield,
        (K::Box | K::Convex, K::Heightfield) => Routine::ConvexHeightfield,
        (K::Line, K::Line | K::Capsule | K::Box | K::Convex) => Routine::Unsupported,
        _ => return None,
    };
    Some(routine)
}

/// Looks up the routine for an ordered pair of kinds. The flag is true when
/// the routine expects the shapes in the opposite order.
pub fn dispatch(a: ShapeKind, b: ShapeKind) -> Option<(Routine, bool)> {
    canonical_routine(a, b)
        .map(|routine| (routine, false))
        .or_else(|| canonical_routine(b, a).map(|routine| (routine, true)))
}

/// Rectangle spanning a capsule's straight section, in the capsule frame.
fn capsule_rectangle(half_length: f32, radius: f32) -> ([Vec2; 4], [Vec2; 4]) {
    let vertices = [
        Vec2::new(-half_length, -radius),
        Vec2::new(half_length, -radius),
        Vec2::new(half_length, radius),
        Vec2::new(-half_length, radius),
    ];
    (vertices, [Vec2::NEG_Y, Vec2::X, Vec2::Y, Vec2::NEG_X])
}

fn point_in_polygon(poly: &PolygonView, point: Vec2) -> bool {
    (0..poly.len()).all(|i| (point - poly.world_vertex(i)).dot(poly.world_normal(i)) <= 0.0)
}

/// Generates contact and friction equations for candidate shape pairs.
#[derive(Debug)]
pub struct Narrowphase {
    pub contact_equations: Vec<ContactEquation>,
    pub friction_equations: Vec<FrictionEquation>,

    pub enable_friction: bool,
    /// Collapse the contacts of one shape pair into a single friction row.
    pub enable_friction_reduction: bool,
    pub enabled_equations: bool,
    pub slip_force: f32,
    pub friction_coefficient: f32,
    pub surface_velocity: f32,
    pub restitution: f32,
    pub stiffness: f32,
    pub relaxation: f32,
    pub friction_stiffness: f32,
    pub friction_relaxation: f32,
    pub contact_skin_size: f32,

    contact_pool: Pool<ContactEquation>,
    friction_pool: Pool<FrictionEquation>,
    collided_last_step: TupleDictionary<EntityId, ()>,
}

impl Default for Narrowphase {
    fn default() -> Self {
        Self::new()
    }
}

impl Narrowphase {
    pub fn new() -> Self {
        Self {
            contact_equations: Vec::new(),
            friction_equations: Vec::new(),
            enable_friction: true,
            enable_friction_reduction: true,
            enabled_equations: true,
            slip_force: DEFAULT_SLIP_FORCE,
            friction_coefficient: DEFAULT_FRICTION,
            surface_velocity: 0.0,
            restitution: 0.0,
            stiffness: DEFAULT_STIFFNESS,
            relaxation: DEFAULT_RELAXATION,
            friction_stiffness: DEFAULT_STIFFNESS,
            friction_relaxation: DEFAULT_RELAXATION,
            contact_skin_size: NARROWPHASE_CONTACT_SKIN_SIZE,
            contact_pool: Pool::with_capacity(32),
            friction_pool: Pool::with_capacity(64),
            collided_last_step: TupleDictionary::new(),
        }
    }

    /// Remembers which bodies touched, then returns last step's equations to
    /// their pools.
    pub fn reset(&mut self) {
        self.collided_last_step.reset();
        for eq in &self.contact_equations {
            self.collided_last_step
                .set(eq.equation.body_a, eq.equation.body_b, ());
        }

        self.contact_pool.release_all(self.contact_equations.drain(..));
        self.friction_pool.release_all(self.friction_equations.drain(..));
    }

    /// Whether the two bodies had at least one contact in the previous step.
    pub fn collided_last_step(&self, a: EntityId, b: EntityId) -> bool {
        self.collided_last_step.contains(a, b)
    }

    /// Copies the per-pair parameters from a contact material.
    pub fn apply_contact_material(&mut self, material: &ContactMaterial) {
        self.friction_coefficient = material.friction;
        self.restitution = material.restitution;
        self.stiffness = material.stiffness;
        self.relaxation = material.relaxation;
        self.friction_stiffness = material.friction_stiffness;
        self.friction_relaxation = material.friction_relaxation;
        self.surface_velocity = material.surface_velocity;
        self.contact_skin_size = material.contact_skin_size;
    }

    /// Runs the routine for the pair and returns the number of contacts.
    ///
    /// With `just_test` nothing is emitted and any overlap returns 1.
    pub fn collide(&mut self, a: &ShapeInstance, b: &ShapeInstance, just_test: bool) -> usize {
        let Some((routine, swapped)) = dispatch(a.kind(), b.kind()) else {
            return 0;
        };
        let (first, second) = if swapped { (b, a) } else { (a, b) };

        let start = self.contact_equations.len();
        let count = self.run_routine(routine, first, second, just_test);

        if !just_test && count > 0 {
            self.add_friction(start);
        }
        count
    }

    /// Exact overlap test of two bodies at the given poses.
    pub fn bodies_overlap(
        &mut self,
        body_a: &RigidBody,
        pose_a: BodyPose,
        body_b: &RigidBody,
        pose_b: BodyPose,
        check_collision_masks: bool,
    ) -> bool {
        for (i, shape_a) in body_a.shapes.iter().enumerate() {
            let instance_a = ShapeInstance::new(body_a.id, pose_a, shape_a, i);
            for (j, shape_b) in body_b.shapes.iter().enumerate() {
                if check_collision_masks && !filters_match(shape_a, shape_b) {
                    continue;
                }
                let instance_b = ShapeInstance::new(body_b.id, pose_b, shape_b, j);
                if self.collide(&instance_a, &instance_b, true) > 0 {
                    return true;
                }
            }
        }
        false
    }

    pub fn create_contact_equation(
        &mut self,
        a: &ShapeInstance,
        b: &ShapeInstance,
    ) -> ContactEquation {
        let mut c = self.contact_pool.get();
        c.equation.body_a = a.body;
        c.equation.body_b = b.body;
        c.shape_a = a.handle;
        c.shape_b = b.handle;
        c.restitution = self.restitution;
        c.first_impact = !self.collided_last_step(a.body, b.body);
        c.equation.stiffness = self.stiffness;
        c.equation.relaxation = self.relaxation;
        c.equation.needs_update = true;
        c.equation.enabled = self.enabled_equations;
        c.equation.offset = self.contact_skin_size;
        c
    }

    pub fn create_friction_equation(
        &mut self,
        body_a: EntityId,
        body_b: EntityId,
        shape_a: ShapeHandle,
        shape_b: ShapeHandle,
    ) -> FrictionEquation {
        let mut f = self.friction_pool.get();
        f.equation.body_a = body_a;
        f.equation.body_b = body_b;
        f.shape_a = shape_a;
        f.shape_b = shape_b;
        f.equation.min_force = -self.slip_force;
        f.equation.max_force = self.slip_force;
        f.friction_coefficient = self.friction_coefficient;
        f.equation.relative_velocity = self.surface_velocity;
        f.equation.enabled = self.enabled_equations;
        f.equation.needs_update = true;
        f.equation.stiffness = self.friction_stiffness;
        f.equation.relaxation = self.friction_relaxation;
        f.contact_equations.clear();
        f
    }

    /// One friction row sharing the contact's points, tangent to its normal.
    pub fn create_friction_from_contact(&mut self, index: usize) -> FrictionEquation {
        let c = &self.contact_equations[index];
        let (body_a, body_b, shape_a, shape_b) =
            (c.equation.body_a, c.equation.body_b, c.shape_a, c.shape_b);
        let (point_a, point_b, normal) = (c.contact_point_a, c.contact_point_b, c.normal_a);

        let mut f = self.create_friction_equation(body_a, body_b, shape_a, shape_b);
        f.contact_point_a = point_a;
        f.contact_point_b = point_b;
        f.t = rotate90cw(normal);
        f.contact_equations.push(index);
        f
    }

    /// One friction row at the mean point and mean tangent of the contacts
    /// from `start` to the end of the contact list.
    pub fn create_friction_from_average(&mut self, start: usize) -> FrictionEquation {
        let last = self.contact_equations.len() - 1;
        let reference = &self.contact_equations[last];
        let (body_a, body_b, shape_a, shape_b) = (
            reference.equation.body_a,
            reference.equation.body_b,
            reference.shape_a,
            reference.shape_b,
        );

        let mut normal_sum = Vec2::ZERO;
        let mut point_a = Vec2::ZERO;
        let mut point_b = Vec2::ZERO;
        for c in &self.contact_equations[start..] {
            if c.equation.body_a == body_a {
                normal_sum += c.normal_a;
                point_a += c.contact_point_a;
                point_b += c.contact_point_b;
            } else {
                normal_sum -= c.normal_a;
                point_a += c.contact_point_b;
                point_b += c.contact_point_a;
            }
        }
        let inv_count = 1.0 / (last + 1 - start) as f32;

        let mut f = self.create_friction_equation(body_a, body_b, shape_a, shape_b);
        f.contact_point_a = point_a * inv_count;
        f.contact_point_b = point_b * inv_count;
        f.t = rotate90cw(normal_sum.normalize_or_zero());
        f.contact_equations.extend(start..=last);
        f
    }

    fn add_friction(&mut self, start: usize) {
        if !self.enable_friction || start >= self.contact_equations.len() {
            return;
        }
        if self.enable_friction_reduction {
            let f = self.create_friction_from_average(start);
            self.friction_equations.push(f);
        } else {
            for index in start..self.contact_equations.len() {
                let f = self.create_friction_from_contact(index);
                self.friction_equations.push(f);
            }
        }
    }

    /// Emits one contact given world points on each surface.
    fn push_contact(
        &mut self,
        a: &ShapeInstance,
        b: &ShapeInstance,
        normal_a: Vec2,
        world_point_a: Vec2,
        world_point_b: Vec2,
    ) {
        let mut c = self.create_contact_equation(a, b);
        c.normal_a = normal_a;
        c.contact_point_a = world_point_a - a.body_position;
        c.contact_point_b = world_point_b - b.body_position;
        self.contact_equations.push(c);
    }

    fn run_routine(
        &mut self,
        routine: Routine,
        a: &ShapeInstance,
        b: &ShapeInstance,
        just_test: bool,
    ) -> usize {
        match routine {
            Routine::CircleCircle => {
                self.circle_circle(a, a.position, a.radius(), b, b.position, b.radius(), just_test)
            }
            Routine::CircleParticle => self.circle_particle(a, a.position, a.radius(), b, just_test),
            Routine::CirclePlane => self.circle_plane(a, a.position, a.radius(), b, just_test),
            Routine::CircleLine => {
                self.circle_line(a, a.position, a.radius(), b, 0.0, just_test)
            }
            Routine::CircleCapsule => {
                self.circle_line(a, a.position, a.radius(), b, b.radius(), just_test)
            }
            Routine::CircleConvex => match b.polygon() {
                Some(poly) => self.circle_convex(a, a.position, a.radius(), b, &poly, just_test),
                None => 0,
            },
            Routine::CircleHeightfield => match b.heightfield() {
                Some(field) => {
                    self.circle_heightfield(a, a.position, a.radius(), b, field, just_test)
                }
                None => 0,
            },
            Routine::ParticlePlane => self.particle_plane(a, b, just_test),
            Routine::ParticleCapsule => {
                self.circle_line(a, a.position, 0.0, b, b.radius(), just_test)
            }
            Routine::ParticleConvex => match b.polygon() {
                Some(poly) => self.particle_convex(a, b, &poly, just_test),
                None => 0,
            },
            Routine::PlaneLine => self.plane_line(a, b, just_test),
            Routine::PlaneCapsule => self.plane_capsule(a, b, just_test),
            Routine::PlaneConvex => match b.polygon() {
                Some(poly) => self.plane_convex(a, b, &poly, just_test),
                None => 0,
            },
            Routine::ConvexConvex => match (a.polygon(), b.polygon()) {
                (Some(poly_a), Some(poly_b)) => {
                    self.convex_convex(a, &poly_a, b, &poly_b, just_test)
                }
                _ => 0,
            },
            Routine::ConvexCapsule => match a.polygon() {
                Some(poly) => self.convex_capsule(a, &poly, b, just_test),
                None => 0,
            },
            Routine::CapsuleCapsule => self.capsule_capsule(a, b, just_test),
            Routine::CapsuleHeightfield => match b.heightfield() {
                Some(field) => self.capsule_heightfield(a, b, field, just_test),
                None => 0,
            },
            Routine::ConvexHeightfield => match (a.polygon(), b.heightfield()) {
                (Some(poly), Some(field)) => {
                    self.convex_heightfield(a, &poly, b, field, just_test)
                }
                _ => 0,
            },
            Routine::Unsupported => 0,
        }
    }

    /// Two discs. Also used for capsule end caps.
    #[allow(clippy::too_many_arguments)]
    fn circle_circle(
        &mut self,
        a: &ShapeInstance,
        center_a: Vec2,
        radius_a: f32,
        b: &ShapeInstance,
        center_b: Vec2,
        radius_b: f32,
        just_test: bool,
    ) -> usize {
        let offset = center_b - center_a;
        let radius_sum = radius_a + radius_b;
        if offset.length_squared() >= radius_sum * radius_sum {
            return 0;
        }
        if just_test {
            return 1;
        }

        // Coincident centres have no defined direction; push along +Y.
        let normal = offset.try_normalize().unwrap_or(Vec2::Y);
        self.push_contact(
            a,
            b,
            normal,
            center_a + normal * radius_a,
            center_b - normal * radius_b,
        );
        1
    }

    fn circle_particle(
        &mut self,
        circle: &ShapeInstance,
        center: Vec2,
        radius: f32,
        particle: &ShapeInstance,
        just_test: bool,
    ) -> usize {
        let offset = particle.position - center;
        if offset.length_squared() > radius * radius {
            return 0;
        }
        if just_test {
            return 1;
        }

        let normal = offset.try_normalize().unwrap_or(Vec2::Y);
        self.push_contact(
            circle,
            particle,
            normal,
            center + normal * radius,
            particle.position,
        );
        1
    }

    /// Disc against a half-space. The plane is body A of the contact.
    fn circle_plane(
        &mut self,
        circle: &ShapeInstance,
        center: Vec2,
        radius: f32,
        plane: &ShapeInstance,
        just_test: bool,
    ) -> usize {
        let normal = plane.plane_normal();
        let height = normal.dot(center - plane.position);
        let gap = height - radius;
        if gap > 0.0 {
            return 0;
        }
        if just_test {
            return 1;
        }

        self.push_contact(
            plane,
            circle,
            normal,
            center - normal * height,
            center - normal * radius,
        );
        1
    }

    /// Disc against a segment swept by `line_radius` (zero for lines).
    fn circle_line(
        &mut self,
        circle: &ShapeInstance,
        center: Vec2,
        circle_radius: f32,
        line: &ShapeInstance,
        line_radius: f32,
        just_test: bool,
    ) -> usize {
        let [v0, v1] = line.segment_ends();
        let edge_unit = (v1 - v0).normalize_or_zero();
        let tangent = rotate90cw(edge_unit);
        let radius_sum = circle_radius + line_radius;

        let distance = (center - v0).dot(tangent);
        if distance.abs() < radius_sum {
            let ortho = tangent * distance;
            let side = (tangent * tangent.dot(center - line.position)).normalize_or_zero();
            let projected = center - ortho + side * line_radius;

            let pos = edge_unit.dot(projected);
            let pos0 = edge_unit.dot(v0);
            let pos1 = edge_unit.dot(v1);
            if pos > pos0 && pos < pos1 {
                if just_test {
                    return 1;
                }
                let normal = (-ortho).try_normalize().unwrap_or(-tangent);
                self.push_contact(
                    circle,
                    line,
                    normal,
                    center + normal * circle_radius,
                    projected,
                );
                return 1;
            }
        }

        for vertex in [v0, v1] {
            let offset = vertex - center;
            if offset.length_squared() < radius_sum * radius_sum {
                if just_test {
                    return 1;
                }
                let normal = offset.try_normalize().unwrap_or(Vec2::Y);
                self.push_contact(
                    circle,
                    line,
                    normal,
                    center + normal * circle_radius,
                    vertex - normal * line_radius,
                );
                return 1;
            }
        }
        0
    }

    /// Disc against a convex polygon.
    ///
    /// Tries the edge whose inward-pushed circle point lies inside the polygon
    /// at the smallest depth; falls back to the nearest vertex.
    fn circle_convex(
        &mut self,
        circle: &ShapeInstance,
        center: Vec2,
        radius: f32,
        convex: &ShapeInstance,
        poly: &PolygonView,
        just_test: bool,
    ) -> usize {
        let mut best: Option<(usize, Vec2)> = None;
        let mut min_distance = f32::MAX;

        for i in 0..poly.len() {
            let normal = poly.world_normal(i);
            let candidate = center - normal * radius;
            if !point_in_polygon(poly, candidate) {
                continue;
            }
            let distance = (poly.world_vertex(i) - candidate).dot(normal).abs();
            if distance < min_distance {
                min_distance = distance;
                best = Some((i, candidate));
            }
        }

        if let Some((edge, candidate)) = best {
            if just_test {
                return 1;
            }
            let normal = poly.world_normal(edge);
            self.push_contact(
                circle,
                convex,
                -normal,
                candidate,
                candidate + normal * min_distance,
            );
            return 1;
        }

        if radius > 0.0 {
            let closest = (0..poly.len())
                .map(|i| poly.world_vertex(i))
                .map(|vertex| (vertex, (vertex - center).length_squared()))
                .filter(|(_, d2)| *d2 < radius * radius)
                .min_by(|x, y| x.1.total_cmp(&y.1));

            if let Some((vertex, _)) = closest {
                if just_test {
                    return 1;
                }
                let normal = (vertex - center).try_normalize().unwrap_or(Vec2::Y);
                self.push_contact(circle, convex, normal, center + normal * radius, vertex);
                return 1;
            }
        }
        0
    }

    /// Disc against heightfield segments, then against sample points if no
    /// segment caught it. The heightfield is body A.
    fn circle_heightfield(
        &mut self,
        circle: &ShapeInstance,
        center: Vec2,
        radius: f32,
        hf: &ShapeInstance,
        field: &Heightfield,
        just_test: bool,
    ) -> usize {
        let origin = hf.position;
        let (from, to) =
            field.index_range(center.x - radius - origin.x, center.x + radius - origin.x);
        if center.y - radius > field.max_in_range(from, to) + origin.y {
            return 0;
        }

        let mut count = 0;
        for i in from..to {
            let (v0, v1) = field.segment(i);
            let (v0, v1) = (v0 + origin, v1 + origin);
            let normal = (v1 - v0).perp().normalize_or_zero();

            let candidate = center - normal * radius;
            let depth = (candidate - v0).dot(normal);
            if candidate.x >= v0.x && candidate.x < v1.x && depth <= 0.0 {
                if just_test {
                    return 1;
                }
                self.push_contact(hf, circle, normal, candidate - normal * depth, candidate);
                count += 1;
            }
        }

        if count == 0 && radius > 0.0 {
            let w = field.element_width();
            for i in from..=to {
                let vertex = Vec2::new(i as f32 * w, field.heights()[i]) + origin;
                let offset = center - vertex;
                if offset.length_squared() < radius * radius {
                    if just_test {
                        return 1;
                    }
                    let normal = offset.try_normalize().unwrap_or(Vec2::Y);
                    self.push_contact(hf, circle, normal, vertex, center - normal * radius);
                    count += 1;
                }
            }
        }
        count
    }

    fn particle_plane(
        &mut self,
        particle: &ShapeInstance,
        plane: &ShapeInstance,
        just_test: bool,
    ) -> usize {
        let normal = plane.plane_normal();
        let depth = normal.dot(particle.position - plane.position);
        if depth > 0.0 {
            return 0;
        }
        if just_test {
            return 1;
        }
        self.push_contact(
            plane,
            particle,
            normal,
            particle.position - normal * depth,
            particle.position,
        );
        1
    }

    /// Point inside a polygon is pushed out through the nearest edge.
    fn particle_convex(
        &mut self,
        particle: &ShapeInstance,
        convex: &ShapeInstance,
        poly: &PolygonView,
        just_test: bool,
    ) -> usize {
        let point = particle.position;
        if !point_in_polygon(poly, point) {
            return 0;
        }
        if just_test {
            return 1;
        }

        let mut best_normal = Vec2::Y;
        let mut best_depth = f32::MIN;
        for i in 0..poly.len() {
            let normal = poly.world_normal(i);
            let depth = (point - poly.world_vertex(i)).dot(normal);
            if depth > best_depth {
                best_depth = depth;
                best_normal = normal;
            }
        }

        self.push_contact(
            particle,
            convex,
            -best_normal,
            point,
            point - best_normal * best_depth,
        );
        1
    }

    fn plane_line(&mut self, plane: &ShapeInstance, line: &ShapeInstance, just_test: bool) -> usize {
        let normal = plane.plane_normal();
        let mut count = 0;
        for vertex in line.segment_ends() {
            let depth = normal.dot(vertex - plane.position);
            if depth < 0.0 {
                if just_test {
                    return 1;
                }
                self.push_contact(plane, line, normal, vertex - normal * depth, vertex);
                count += 1;
            }
        }
        count
    }

    fn plane_capsule(
        &mut self,
        plane: &ShapeInstance,
        capsule: &ShapeInstance,
        just_test: bool,
    ) -> usize {
        let radius = capsule.radius();
        let mut count = 0;
        for end in capsule.segment_ends() {
            count += self.circle_plane(capsule, end, radius, plane, just_test);
            if just_test && count > 0 {
                return 1;
            }
        }
        count
    }

    fn plane_convex(
        &mut self,
        plane: &ShapeInstance,
        convex: &ShapeInstance,
        poly: &PolygonView,
        just_test: bool,
    ) -> usize {
        let normal = plane.plane_normal();
        let mut count = 0;
        for i in 0..poly.len() {
            let vertex = poly.world_vertex(i);
            let depth = normal.dot(vertex - plane.position);
            if depth <= 0.0 {
                if just_test {
                    return 1;
                }
                self.push_contact(plane, convex, normal, vertex - normal * depth, vertex);
                count += 1;
            }
        }
        count
    }

    /// Separating-axis test with reference/incident clipping, up to two points.
    fn convex_convex(
        &mut self,
        a: &ShapeInstance,
        poly_a: &PolygonView,
        b: &ShapeInstance,
        poly_b: &PolygonView,
        just_test: bool,
    ) -> usize {
        let Some(clip) = collide_polygons(poly_a, poly_b, 0.0) else {
            return 0;
        };

        let mut count = 0;
        for (point, separation) in clip.points.into_iter().zip(clip.separations) {
            if separation > 0.0 {
                continue;
            }
            if just_test {
                return 1;
            }
            let on_reference = point - clip.normal * separation;
            if clip.flip {
                self.push_contact(a, b, -clip.normal, point, on_reference);
            } else {
                self.push_contact(a, b, clip.normal, on_reference, point);
            }
            count += 1;
        }
        count
    }

    /// End caps as discs plus the straight section as a rectangle.
    fn convex_capsule(
        &mut self,
        convex: &ShapeInstance,
        poly: &PolygonView,
        capsule: &ShapeInstance,
        just_test: bool,
    ) -> usize {
        let radius = capsule.radius();
        let mut count = 0;
        for end in capsule.segment_ends() {
            count += self.circle_convex(capsule, end, radius, convex, poly, just_test);
            if just_test && count > 0 {
                return 1;
            }
        }

        let half_length = capsule.half_length();
        if half_length > 0.0 {
            let (vertices, normals) = capsule_rectangle(half_length, radius);
            let rect = PolygonView::new(&vertices, &normals, capsule.position, capsule.angle);
            count += self.convex_convex(convex, poly, capsule, &rect, just_test);
        }
        count
    }

    /// Composite test: the four end-cap disc pairs, each cap against the
    /// other capsule's straight section, and the two straight sections.
    /// Tries rectangle against rectangle, then caps against the other
    /// rectangle, then cap against cap, stopping at the first stage that
    /// touches so one region never yields contacts from two stages.
    fn capsule_capsule(&mut self, a: &ShapeInstance, b: &ShapeInstance, just_test: bool) -> usize {
        let (radius_a, radius_b) = (a.radius(), b.radius());
        let (ends_a, ends_b) = (a.segment_ends(), b.segment_ends());
        let (vertices_a, normals_a) = capsule_rectangle(a.half_length(), radius_a);
        let (vertices_b, normals_b) = capsule_rectangle(b.half_length(), radius_b);
        let rect_a = PolygonView::new(&vertices_a, &normals_a, a.position, a.angle);
        let rect_b = PolygonView::new(&vertices_b, &normals_b, b.position, b.angle);
        let has_rect_a = a.half_length() > 0.0;
        let has_rect_b = b.half_length() > 0.0;

        if has_rect_a && has_rect_b {
            let count = self.convex_convex(a, &rect_a, b, &rect_b, just_test);
            if count > 0 {
                return count;
            }
        }

        let mut count = 0;
        if has_rect_a {
            for end_b in ends_b {
                count += self.circle_convex(b, end_b, radius_b, a, &rect_a, just_test);
            }
        }
        if has_rect_b {
            for end_a in ends_a {
                count += self.circle_convex(a, end_a, radius_a, b, &rect_b, just_test);
            }
        }
        if count > 0 {
            return if just_test { 1 } else { count };
        }

        for end_a in ends_a {
            for end_b in ends_b {
                count += self.circle_circle(a, end_a, radius_a, b, end_b, radius_b, just_test);
                if just_test && count > 0 {
                    return 1;
                }
            }
        }
        count
    }

    fn capsule_heightfield(
        &mut self,
        capsule: &ShapeInstance,
        hf: &ShapeInstance,
        field: &Heightfield,
        just_test: bool,
    ) -> usize {
        let radius = capsule.radius();
        let mut count = 0;
        for end in capsule.segment_ends() {
            count += self.circle_heightfield(capsule, end, radius, hf, field, just_test);
            if just_test && count > 0 {
                return 1;
            }
        }

        let half_length = capsule.half_length();
        if half_length > 0.0 {
            let (vertices, normals) = capsule_rectangle(half_length, radius);
            let rect = PolygonView::new(&vertices, &normals, capsule.position, capsule.angle);
            count += self.convex_heightfield(capsule, &rect, hf, field, just_test);
        }
        count
    }

    /// Each segment under the polygon becomes a deep convex tile tested with
    /// [`Narrowphase::convex_convex`].
    fn convex_heightfield(
        &mut self,
        convex: &ShapeInstance,
        poly: &PolygonView,
        hf: &ShapeInstance,
        field: &Heightfield,
        just_test: bool,
    ) -> usize {
        let origin = hf.position;
        let bounds = Aabb::from_points(poly.vertices, poly.position, poly.angle, 0.0);
        let (from, to) = field.index_range(bounds.lower.x - origin.x, bounds.upper.x - origin.x);
        if bounds.lower.y > field.max_in_range(from, to) + origin.y {
            return 0;
        }

        let depth = Vec2::new(0.0, HEIGHTFIELD_TILE_DEPTH);
        let mut count = 0;
        for i in from..to {
            let (v0, v1) = field.segment(i);
            let (v0, v1) = (v0 + origin, v1 + origin);
            let tile_position = (v0 + v1 - depth) * 0.5;
            let vertices = [
                v1 - tile_position,
                v0 - tile_position,
                v0 - tile_position - depth,
                v1 - tile_position - depth,
            ];
            let normals = edge_normals(&vertices);
            let tile = PolygonView::new(&vertices, &normals, tile_position, 0.0);

            count += self.convex_convex(convex, poly, hf, &tile, just_test);
            if just_test && count > 0 {
                return 1;
            }
        }
        count
    }
}
