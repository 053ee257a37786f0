use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::shape::{Shape, shape_world_pose};
use super::types::Aabb;
use crate::config::{
    DEFAULT_ANGULAR_DAMPING, DEFAULT_CCD_ITERATIONS, DEFAULT_LINEAR_DAMPING,
    DEFAULT_SLEEP_SPEED_LIMIT, DEFAULT_SLEEP_TIME_LIMIT,
};
use crate::error::PhysicsResult;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_zv, rotate, to_global_frame, to_local_frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    #[default]
    Dynamic,
    /// Never moves and has infinite mass.
    Static,
    /// Moves by its velocity only, unaffected by forces and contacts.
    Kinematic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SleepState {
    #[default]
    Awake,
    Sleepy,
    Sleeping,
}

/// Position and angle of a body, used for provisional moves during CCD.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyPose {
    pub position: Vec2,
    pub angle: f32,
}

impl BodyPose {
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }
}

/// Rigid body with kinematic state, mass properties, and attached shapes.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub id: EntityId,
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub angular_force: f32,

    pub mass: f32,
    pub inv_mass: f32,
    pub inertia: f32,
    pub inv_inertia: f32,
    /// Inverse mass seen by the solver; zero while sleeping or kinematic.
    pub inv_mass_solve: f32,
    pub inv_inertia_solve: f32,
    /// Per-axis factor derived from `fixed_x`/`fixed_y`.
    pub mass_multiplier: Vec2,
    pub fixed_x: bool,
    pub fixed_y: bool,
    pub fixed_rotation: bool,

    /// Constraint velocity accumulated by the solver during one solve.
    pub vlambda: Vec2,
    pub wlambda: f32,

    pub shapes: Vec<Shape>,
    pub damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub collision_response: bool,

    pub allow_sleep: bool,
    pub sleep_state: SleepState,
    pub sleep_speed_limit: f32,
    pub sleep_time_limit: f32,
    pub idle_time: f32,
    pub wants_to_sleep: bool,

    /// Speed above which CCD runs for this body; negative disables it.
    pub ccd_speed_threshold: f32,
    pub ccd_iterations: u32,

    pub previous_position: Vec2,
    pub previous_angle: f32,

    aabb: Aabb,
    aabb_needs_update: bool,
    bounding_radius: f32,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            id: EntityId::default(),
            body_type: BodyType::Dynamic,
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            angular_force: 0.0,
            mass: 1.0,
            inv_mass: 1.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            inv_mass_solve: 0.0,
            inv_inertia_solve: 0.0,
            mass_multiplier: Vec2::ONE,
            fixed_x: false,
            fixed_y: false,
            fixed_rotation: false,
            vlambda: Vec2::ZERO,
            wlambda: 0.0,
            shapes: Vec::new(),
            damping: DEFAULT_LINEAR_DAMPING,
            angular_damping: DEFAULT_ANGULAR_DAMPING,
            gravity_scale: 1.0,
            collision_response: true,
            allow_sleep: true,
            sleep_state: SleepState::Awake,
            sleep_speed_limit: DEFAULT_SLEEP_SPEED_LIMIT,
            sleep_time_limit: DEFAULT_SLEEP_TIME_LIMIT,
            idle_time: 0.0,
            wants_to_sleep: false,
            ccd_speed_threshold: -1.0,
            ccd_iterations: DEFAULT_CCD_ITERATIONS,
            previous_position: Vec2::ZERO,
            previous_angle: 0.0,
            aabb: Aabb::default(),
            aabb_needs_update: true,
            bounding_radius: 0.0,
        };
        body.update_mass_properties();
        body
    }
}

impl RigidBody {
    pub fn new(body_type: BodyType) -> Self {
        let mut body = Self {
            body_type,
            ..Self::default()
        };
        body.update_mass_properties();
        body
    }

    pub fn dynamic(mass: f32) -> Self {
        let mut body = Self::new(BodyType::Dynamic);
        body.mass = mass;
        body.update_mass_properties();
        body
    }

    pub fn fixed() -> Self {
        Self::new(BodyType::Static)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self.previous_position = position;
        self.aabb_needs_update = true;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self.previous_angle = angle;
        self.aabb_needs_update = true;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2, angular_velocity: f32) -> Self {
        self.velocity = velocity;
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_ccd(mut self, speed_threshold: f32, iterations: u32) -> Self {
        self.ccd_speed_threshold = speed_threshold;
        self.ccd_iterations = iterations;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self.update_mass_properties();
        self
    }

    pub fn with_fixed_axes(mut self, fixed_x: bool, fixed_y: bool) -> Self {
        self.fixed_x = fixed_x;
        self.fixed_y = fixed_y;
        self.update_mass_properties();
        self
    }

    /// Builder form of [`RigidBody::add_shape`].
    pub fn with_shape(mut self, shape: Shape) -> PhysicsResult<Self> {
        self.add_shape(shape)?;
        Ok(self)
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    /// Attaches a validated shape and refreshes derived properties.
    pub fn add_shape(&mut self, shape: Shape) -> PhysicsResult<usize> {
        shape.validate()?;
        self.shapes.push(shape);
        self.update_mass_properties();
        self.update_bounding_radius();
        self.aabb_needs_update = true;
        Ok(self.shapes.len() - 1)
    }

    pub fn remove_shape(&mut self, index: usize) -> Option<Shape> {
        if index >= self.shapes.len() {
            return None;
        }
        let shape = self.shapes.remove(index);
        self.update_mass_properties();
        self.update_bounding_radius();
        self.aabb_needs_update = true;
        Some(shape)
    }

    /// Recomputes inverse mass and inertia from `mass` and the attached shapes.
    pub fn update_mass_properties(&mut self) {
        self.mass_multiplier = Vec2::new(
            if self.fixed_x { 0.0 } else { 1.0 },
            if self.fixed_y { 0.0 } else { 1.0 },
        );

        if !self.is_dynamic() {
            self.inv_mass = 0.0;
            self.inertia = f32::MAX;
            self.inv_inertia = 0.0;
            self.update_solve_mass_properties();
            return;
        }

        self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        if self.fixed_rotation || self.shapes.is_empty() {
            self.inertia = f32::MAX;
            self.inv_inertia = 0.0;
        } else {
            let total_area: f32 = self.shapes.iter().map(Shape::area).sum();
            let count = self.shapes.len() as f32;
            let inertia: f32 = self
                .shapes
                .iter()
                .map(|shape| {
                    let m = if total_area > 0.0 {
                        self.mass * shape.area() / total_area
                    } else {
                        self.mass / count
                    };
                    shape.moment_of_inertia(m) + m * shape.position.length_squared()
                })
                .sum();
            self.inertia = inertia;
            self.inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
        }

        self.update_solve_mass_properties();
    }

    /// Solver-facing inverses: zero while sleeping or kinematic.
    pub fn update_solve_mass_properties(&mut self) {
        if self.is_sleeping() || self.is_kinematic() {
            self.inv_mass_solve = 0.0;
            self.inv_inertia_solve = 0.0;
        } else {
            self.inv_mass_solve = self.inv_mass;
            self.inv_inertia_solve = self.inv_inertia;
        }
    }

    pub fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .shapes
            .iter()
            .map(|shape| shape.position.length() + shape.bounding_radius())
            .fold(0.0, f32::max);
    }

    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn mark_aabb_dirty(&mut self) {
        self.aabb_needs_update = true;
    }

    pub fn aabb_needs_update(&self) -> bool {
        self.aabb_needs_update
    }

    /// Recomputes the cached AABB if it is stale.
    pub fn update_aabb(&mut self) {
        if self.aabb_needs_update {
            self.aabb = self.aabb_at(self.pose());
            self.aabb_needs_update = false;
        }
    }

    /// Cached AABB. Call [`RigidBody::update_aabb`] after moving the body.
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// AABB of all shapes if the body were at `pose`.
    pub fn aabb_at(&self, pose: BodyPose) -> Aabb {
        let mut shapes = self.shapes.iter().map(|shape| {
            let (position, angle) = shape_world_pose(shape, pose.position, pose.angle);
            shape.compute_aabb(position, angle)
        });
        let Some(mut aabb) = shapes.next() else {
            return Aabb::new(pose.position, pose.position);
        };
        for other in shapes {
            aabb.extend(&other);
        }
        aabb
    }

    pub fn pose(&self) -> BodyPose {
        BodyPose::new(self.position, self.angle)
    }

    pub fn set_pose(&mut self, pose: BodyPose) {
        self.position = pose.position;
        self.angle = pose.angle;
        self.aabb_needs_update = true;
    }

    pub fn to_world_frame(&self, local_point: Vec2) -> Vec2 {
        to_global_frame(local_point, self.position, self.angle)
    }

    pub fn to_local_frame(&self, world_point: Vec2) -> Vec2 {
        to_local_frame(world_point, self.position, self.angle)
    }

    pub fn vector_to_world_frame(&self, local_vector: Vec2) -> Vec2 {
        rotate(local_vector, self.angle)
    }

    /// Velocity of a point given relative to the body centre, `v + w × r`.
    pub fn velocity_at_point(&self, relative_point: Vec2) -> Vec2 {
        self.velocity + cross_zv(self.angular_velocity, relative_point)
    }

    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Applies a force at a point given relative to the body centre.
    pub fn apply_force_at(&mut self, force: Vec2, relative_point: Vec2) {
        self.force += force;
        self.angular_force += cross(relative_point, force);
    }

    pub fn apply_impulse_at(&mut self, impulse: Vec2, relative_point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity += impulse * self.inv_mass * self.mass_multiplier;
        self.angular_velocity += cross(relative_point, impulse) * self.inv_inertia;
    }

    pub fn clear_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.angular_force = 0.0;
    }

    /// Exponential velocity decay, `v *= (1 - d)^dt`.
    pub fn apply_damping(&mut self, dt: f32) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity *= (1.0 - self.damping).powf(dt);
        self.angular_velocity *= (1.0 - self.angular_damping).powf(dt);
    }

    pub fn reset_constraint_velocity(&mut self) {
        self.vlambda = Vec2::ZERO;
        self.wlambda = 0.0;
    }

    /// Folds the solver's constraint velocity into the body velocity.
    pub fn add_constraint_velocity(&mut self) {
        self.velocity += self.vlambda;
        self.angular_velocity += self.wlambda;
    }

    pub fn wake_up(&mut self) {
        let was_sleeping = self.is_sleeping();
        self.sleep_state = SleepState::Awake;
        self.idle_time = 0.0;
        self.wants_to_sleep = false;
        if was_sleeping {
            log::debug!("body {:?} woke up", self.id);
            self.update_solve_mass_properties();
        }
    }

    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
        self.clear_forces();
        self.update_solve_mass_properties();
    }

    /// Advances the idle timer and puts the body to sleep once it has been
    /// slow for longer than `sleep_time_limit`.
    pub fn sleep_tick(&mut self, dt: f32, dont_sleep: bool) {
        if !self.allow_sleep || self.is_sleeping() || !self.is_dynamic() {
            return;
        }
        self.wants_to_sleep = false;

        let speed_squared =
            self.velocity.length_squared() + self.angular_velocity * self.angular_velocity;
        if speed_squared >= self.sleep_speed_limit * self.sleep_speed_limit {
            self.idle_time = 0.0;
            self.sleep_state = SleepState::Awake;
        } else {
            self.idle_time += dt;
            self.sleep_state = SleepState::Sleepy;
        }

        if self.idle_time > self.sleep_time_limit {
            if dont_sleep {
                self.wants_to_sleep = true;
            } else {
                self.sleep();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn static_and_kinematic_bodies_have_zero_inverses() {
        let body = RigidBody::fixed()
            .with_shape(Shape::circle(1.0))
            .expect("valid shape");
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia, 0.0);

        let mut kinematic = RigidBody::kinematic();
        kinematic.update_solve_mass_properties();
        assert_eq!(kinematic.inv_mass_solve, 0.0);
    }

    #[test]
    fn offset_shape_adds_parallel_axis_term() {
        let centred = RigidBody::dynamic(2.0)
            .with_shape(Shape::circle(1.0))
            .expect("valid shape");
        let offset = RigidBody::dynamic(2.0)
            .with_shape(Shape::circle(1.0).with_offset(Vec2::new(1.0, 0.0), 0.0))
            .expect("valid shape");
        assert_relative_eq!(centred.inertia, 1.0, epsilon = 1e-6);
        assert_relative_eq!(offset.inertia, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn fixed_axes_zero_the_mass_multiplier() {
        let body = RigidBody::dynamic(1.0).with_fixed_axes(true, false);
        assert_eq!(body.mass_multiplier, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn sleeping_bodies_hide_their_mass_from_the_solver() {
        let mut body = RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(0.5))
            .expect("valid shape");
        body.sleep_time_limit = 0.5;
        for _ in 0..40 {
            body.sleep_tick(1.0 / 60.0, false);
        }
        assert!(body.is_sleeping());
        assert_eq!(body.inv_mass_solve, 0.0);

        body.wake_up();
        assert_eq!(body.sleep_state, SleepState::Awake);
        assert_relative_eq!(body.inv_mass_solve, 1.0);
    }

    #[test]
    fn moving_body_stays_awake() {
        let mut body = RigidBody::dynamic(1.0).with_velocity(Vec2::new(1.0, 0.0), 0.0);
        for _ in 0..120 {
            body.sleep_tick(1.0 / 60.0, false);
        }
        assert_eq!(body.sleep_state, SleepState::Awake);
    }

    #[test]
    fn aabb_is_lazy_and_follows_pose() {
        let mut body = RigidBody::dynamic(1.0)
            .with_shape(Shape::rectangle(2.0, 2.0))
            .expect("valid shape")
            .with_position(Vec2::new(3.0, 0.0));
        assert!(body.aabb_needs_update());
        body.update_aabb();
        assert_relative_eq!(body.aabb().lower.x, 2.0, epsilon = 1e-5);

        let moved = body.aabb_at(BodyPose::new(Vec2::ZERO, 0.0));
        assert_relative_eq!(moved.upper.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn damping_decays_velocity() {
        let mut body = RigidBody::dynamic(1.0).with_velocity(Vec2::new(2.0, 0.0), 1.0);
        body.apply_damping(1.0);
        assert_relative_eq!(body.velocity.x, 1.8, epsilon = 1e-5);
        assert_relative_eq!(body.angular_velocity, 0.9, epsilon = 1e-5);
    }
}
