use std::time::Instant;

use glam::Vec2;

use crate::{
    collision::{
        broadphase::{Broadphase, NaiveBroadphase, SweepAndPruneBroadphase},
        ccd::ContinuousCollision,
        narrowphase::{Narrowphase, ShapeInstance, filters_match},
        queries::{Ray, RayMode, RaycastResult},
    },
    config::{BroadphaseKind, DEFAULT_GRAVITY, SleepMode, WorldConfig},
    core::{
        rigidbody::RigidBody,
        shape::Shape,
        types::{Aabb, ContactMaterial, Material, MaterialId},
    },
    dynamics::{
        contact::ContactEquation,
        equation::SolverEquation,
        friction::FrictionEquation,
        integrator::Integrator,
        solver::{GsSolver, StepRows},
    },
    error::{PhysicsError, PhysicsResult},
    utils::{
        allocator::{Arena, EntityId},
        logging::log_step_health,
        profiling::{PhysicsProfiler, ScopedTimer},
        tuple_dictionary::TupleDictionary,
    },
};

/// Owns every body and runs the fixed-step simulation loop.
#[derive(Debug)]
pub struct World {
    pub config: WorldConfig,
    pub narrowphase: Narrowphase,
    pub solver: GsSolver,
    /// Parameters for shape pairs that carry no material.
    pub default_contact_material: ContactMaterial,
    bodies: Arena<RigidBody>,
    broadphase: Box<dyn Broadphase>,
    integrator: Integrator,
    ccd: ContinuousCollision,
    materials: Vec<Material>,
    contact_materials: Vec<ContactMaterial>,
    disabled_pairs: TupleDictionary<EntityId, ()>,
    equations: Vec<Box<dyn SolverEquation>>,
    profiler: PhysicsProfiler,
    pairs: Vec<(EntityId, EntityId)>,
    /// Reused id list for per-step passes over the arena.
    body_scratch: Vec<EntityId>,
    accumulator: f32,
    time: f32,
}

impl World {
    pub fn new(config: WorldConfig) -> PhysicsResult<Self> {
        if !(config.time_step > 0.0 && config.time_step.is_finite()) {
            return Err(PhysicsError::InvalidTimeStep(config.time_step));
        }
        if !(config.solver.tolerance >= 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "solver tolerance must be non-negative, got {}",
                config.solver.tolerance
            )));
        }
        if config.max_sub_steps == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max_sub_steps must be at least 1".to_string(),
            ));
        }

        let broadphase: Box<dyn Broadphase> = match config.broadphase {
            BroadphaseKind::Naive => Box::new(NaiveBroadphase::new(config.bounding_volume)),
            BroadphaseKind::SweepAndPrune => {
                Box::new(SweepAndPruneBroadphase::new(config.bounding_volume))
            }
        };

        let mut narrowphase = Narrowphase::new();
        narrowphase.enable_friction = config.enable_friction;
        narrowphase.enable_friction_reduction = config.enable_friction_reduction;

        log::debug!(
            "world created: {:?} broadphase, step {:.4} s",
            config.broadphase,
            config.time_step
        );

        Ok(Self {
            config,
            narrowphase,
            solver: GsSolver::new(config.solver),
            default_contact_material: ContactMaterial::default(),
            bodies: Arena::new(),
            broadphase,
            integrator: Integrator::new(),
            ccd: ContinuousCollision::new(),
            materials: Vec::new(),
            contact_materials: Vec::new(),
            disabled_pairs: TupleDictionary::new(),
            equations: Vec::new(),
            profiler: PhysicsProfiler::default(),
            pairs: Vec::new(),
            body_scratch: Vec::new(),
            accumulator: 0.0,
            time: 0.0,
        })
    }

    pub fn add_body(&mut self, body: RigidBody) -> EntityId {
        let id = self.bodies.insert_with(|id| {
            let mut body = body;
            body.id = id;
            body.update_aabb();
            body
        });
        self.broadphase.add_body(id);
        log::trace!("added body {id:?}");
        id
    }

    /// Removes a body along with any collision exceptions that mention it.
    /// Equations still referencing it contribute nothing.
    pub fn remove_body(&mut self, id: EntityId) -> PhysicsResult<RigidBody> {
        let body = self
            .bodies
            .remove(id)
            .ok_or(PhysicsError::BodyNotFound(id))?;
        self.broadphase.remove_body(id);

        let stale: Vec<(EntityId, EntityId)> = self
            .disabled_pairs
            .keys()
            .iter()
            .copied()
            .filter(|(a, b)| *a == id || *b == id)
            .collect();
        for (a, b) in stale {
            self.disabled_pairs.remove(a, b);
        }
        Ok(body)
    }

    pub fn body(&self, id: EntityId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    pub fn bodies(&self) -> impl Iterator<Item = &RigidBody> + '_ {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn add_shape(&mut self, body: EntityId, shape: Shape) -> PhysicsResult<usize> {
        self.bodies
            .get_mut(body)
            .ok_or(PhysicsError::BodyNotFound(body))?
            .add_shape(shape)
    }

    /// Swaps the broadphase, handing it the current body set.
    pub fn set_broadphase(&mut self, mut broadphase: Box<dyn Broadphase>) {
        broadphase.set_bodies(&self.bodies);
        self.broadphase = broadphase;
    }

    pub fn broadphase(&self) -> &dyn Broadphase {
        self.broadphase.as_ref()
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId((self.materials.len() - 1) as u32)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Registers parameters for a material pair, replacing an earlier entry
    /// for the same pair.
    pub fn add_contact_material(&mut self, material: ContactMaterial) {
        let same_pair = |existing: &ContactMaterial| {
            (existing.material_a == material.material_a
                && existing.material_b == material.material_b)
                || (existing.material_a == material.material_b
                    && existing.material_b == material.material_a)
        };
        self.contact_materials.retain(|existing| !same_pair(existing));
        self.contact_materials.push(material);
    }

    pub fn contact_material(&self, a: MaterialId, b: MaterialId) -> Option<&ContactMaterial> {
        self.contact_materials.iter().find(|cm| {
            (cm.material_a == Some(a) && cm.material_b == Some(b))
                || (cm.material_a == Some(b) && cm.material_b == Some(a))
        })
    }

    pub fn disable_body_collision(&mut self, a: EntityId, b: EntityId) {
        self.disabled_pairs.set(a, b, ());
    }

    pub fn enable_body_collision(&mut self, a: EntityId, b: EntityId) {
        self.disabled_pairs.remove(a, b);
    }

    /// Adds a user equation (motor, gear, lock) solved after contacts.
    pub fn add_equation(&mut self, equation: Box<dyn SolverEquation>) -> usize {
        self.equations.push(equation);
        self.equations.len() - 1
    }

    pub fn remove_equation(&mut self, index: usize) -> Option<Box<dyn SolverEquation>> {
        (index < self.equations.len()).then(|| self.equations.remove(index))
    }

    pub fn equations(&self) -> &[Box<dyn SolverEquation>] {
        &self.equations
    }

    pub fn equations_mut(&mut self) -> &mut [Box<dyn SolverEquation>] {
        &mut self.equations
    }

    pub fn contact_equations(&self) -> &[ContactEquation] {
        &self.narrowphase.contact_equations
    }

    pub fn friction_equations(&self) -> &[FrictionEquation] {
        &self.narrowphase.friction_equations
    }

    /// Simulated time advanced so far.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn profiler(&self) -> &PhysicsProfiler {
        &self.profiler
    }

    pub fn raycast(&mut self, ray: &Ray, result: &mut RaycastResult) -> bool {
        self.update_aabbs();
        ray.intersect_bodies(result, self.bodies.iter());
        if ray.mode == RayMode::All {
            result.sort_by_distance();
        }
        result.has_hit()
    }

    /// Bodies whose bounds overlap `aabb`.
    pub fn aabb_query(&mut self, aabb: &Aabb) -> Vec<EntityId> {
        self.update_aabbs();
        let mut out = Vec::new();
        self.broadphase.aabb_query(&self.bodies, aabb, &mut out);
        out
    }

    /// Advances by `dt` in fixed `config.time_step` increments, carrying the
    /// remainder to the next call. Returns the number of sub-steps taken.
    pub fn step(&mut self, dt: f32) -> PhysicsResult<u32> {
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }
        let h = self.config.time_step;
        self.accumulator += dt;

        let mut sub_steps = 0;
        while self.accumulator >= h && sub_steps < self.config.max_sub_steps {
            self.internal_step(h)?;
            self.accumulator -= h;
            sub_steps += 1;
        }
        if self.accumulator >= h {
            log::warn!(
                "dropping {:.4} s of simulation after {} sub-steps",
                self.accumulator,
                sub_steps
            );
            self.accumulator %= h;
        }
        Ok(sub_steps)
    }

    /// One full simulation step of length `dt`.
    pub fn internal_step(&mut self, dt: f32) -> PhysicsResult<()> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }
        let frame_start = Instant::now();
        let mut timing = PhysicsProfiler::default();

        self.apply_forces(dt);
        self.update_aabbs();

        {
            let _stage = ScopedTimer::new(&mut timing.broad_phase_time);
            self.find_pairs();
        }
        {
            let _stage = ScopedTimer::new(&mut timing.narrow_phase_time);
            self.run_narrowphase();
        }
        {
            let _stage = ScopedTimer::new(&mut timing.solver_time);
            self.solve(dt);
        }
        {
            let _stage = ScopedTimer::new(&mut timing.integrator_time);
            self.integrate(dt);
        }

        for body in self.bodies.iter_mut() {
            body.clear_forces();
        }
        if self.config.sleep_mode == SleepMode::BodySleeping {
            for body in self.bodies.iter_mut() {
                body.sleep_tick(dt, false);
            }
        }
        self.time += dt;

        timing.total_frame_time = frame_start.elapsed();
        timing.body_count = self.bodies.len();
        timing.pair_count = self.pairs.len();
        timing.contact_count = self.narrowphase.contact_equations.len();
        timing.friction_count = self.narrowphase.friction_equations.len();
        timing.solver_iterations = self.solver.used_iterations as usize;
        self.profiler = timing;
        self.profiler.report();
        log_step_health(&timing, &self.config);
        Ok(())
    }

    fn apply_forces(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        for body in self.bodies.iter_mut() {
            if !body.is_dynamic() || body.is_sleeping() {
                continue;
            }
            if self.config.apply_gravity {
                body.force += gravity * body.mass * body.gravity_scale;
            }
            if self.config.apply_damping {
                body.apply_damping(dt);
            }
        }
    }

    fn update_aabbs(&mut self) {
        for body in self.bodies.iter_mut() {
            if body.aabb_needs_update() {
                body.update_aabb();
            }
        }
    }

    fn find_pairs(&mut self) {
        self.pairs.clear();
        let candidates = self.broadphase.collision_pairs(&self.bodies);
        let disabled = &self.disabled_pairs;
        self.pairs.extend(
            candidates
                .iter()
                .copied()
                .filter(|&(a, b)| !disabled.contains(a, b)),
        );
    }

    /// Gravity magnitude used to estimate normal forces for friction.
    fn friction_gravity(&self) -> f32 {
        let g = self.config.gravity.length();
        if g > 0.0 {
            g
        } else {
            Vec2::from_array(DEFAULT_GRAVITY).length()
        }
    }

    fn resolve_contact_material(
        &self,
        a: Option<MaterialId>,
        b: Option<MaterialId>,
    ) -> ContactMaterial {
        if let (Some(a), Some(b)) = (a, b) {
            if let Some(explicit) = self.contact_material(a, b) {
                return *explicit;
            }
        }
        if a.is_none() && b.is_none() {
            return self.default_contact_material;
        }

        let lookup = |id: Option<MaterialId>| {
            id.and_then(|id| self.material(id))
                .copied()
                .unwrap_or_default()
        };
        let mixed = Material::combine(&lookup(a), &lookup(b));
        ContactMaterial {
            material_a: a,
            material_b: b,
            friction: mixed.friction,
            restitution: mixed.restitution,
            ..self.default_contact_material
        }
    }

    fn run_narrowphase(&mut self) {
        self.narrowphase.reset();
        let friction_gravity = self.friction_gravity();
        let pairs = std::mem::take(&mut self.pairs);
        let mut wake = std::mem::take(&mut self.body_scratch);
        wake.clear();

        for &(id_a, id_b) in &pairs {
            let (Some(a), Some(b)) = (self.bodies.get(id_a), self.bodies.get(id_b)) else {
                continue;
            };

            let inv_mass_sum = a.inv_mass + b.inv_mass;
            let reduced_mass = if inv_mass_sum > 0.0 { 1.0 / inv_mass_sum } else { 0.0 };
            let mut touched = false;

            for (i, shape_a) in a.shapes.iter().enumerate() {
                for (j, shape_b) in b.shapes.iter().enumerate() {
                    if !filters_match(shape_a, shape_b) {
                        continue;
                    }
                    let material = self.resolve_contact_material(shape_a.material, shape_b.material);
                    let slip_force = material.friction * friction_gravity * reduced_mass;

                    let np = &mut self.narrowphase;
                    np.apply_contact_material(&material);
                    np.slip_force = slip_force;
                    np.enabled_equations = a.collision_response
                        && b.collision_response
                        && shape_a.collision_response
                        && shape_b.collision_response;

                    let instance_a = ShapeInstance::new(id_a, a.pose(), shape_a, i);
                    let instance_b = ShapeInstance::new(id_b, b.pose(), shape_b, j);
                    let just_test = shape_a.sensor || shape_b.sensor;
                    let friction_start = np.friction_equations.len();

                    let count = np.collide(&instance_a, &instance_b, just_test);
                    if count == 0 {
                        continue;
                    }
                    if just_test {
                        log::trace!("sensor overlap between {id_a:?} and {id_b:?}");
                        continue;
                    }
                    touched = true;

                    let added = &mut np.friction_equations[friction_start..];
                    let share = slip_force / added.len().max(1) as f32;
                    for friction in added {
                        friction.set_slip_force(share);
                    }
                }
            }

            if touched {
                let fast = |body: &RigidBody| {
                    let speed_squared =
                        body.velocity.length_squared() + body.angular_velocity.powi(2);
                    speed_squared >= 2.0 * body.sleep_speed_limit.powi(2)
                };
                if a.is_sleeping() && fast(b) {
                    wake.push(id_a);
                }
                if b.is_sleeping() && fast(a) {
                    wake.push(id_b);
                }
            }
        }

        self.pairs = pairs;
        for &id in &wake {
            if let Some(body) = self.bodies.get_mut(id) {
                body.wake_up();
            }
        }
        self.body_scratch = wake;
    }

    /// Contacts first, in narrowphase order, so friction rows can find their
    /// source contacts; then friction; then user equations.
    fn solve(&mut self, dt: f32) {
        let mut rows = StepRows {
            contacts: &mut self.narrowphase.contact_equations,
            friction: &mut self.narrowphase.friction_equations,
            user: &mut self.equations,
        };
        self.solver.solve_rows(dt, &mut self.bodies, &mut rows);
    }

    fn integrate(&mut self, dt: f32) {
        let mut ids = std::mem::take(&mut self.body_scratch);
        ids.clear();
        ids.extend(self.bodies.ids());
        for &id in &ids {
            if let Some(body) = self.bodies.get_mut(id) {
                self.integrator.integrate_velocity(body, dt);
            }

            let impact = match self.bodies.get(id) {
                Some(body) if body.is_dynamic() && !body.is_sleeping() => self.ccd.time_of_impact(
                    body,
                    &self.bodies,
                    &mut self.narrowphase,
                    &self.disabled_pairs,
                    dt,
                ),
                _ => None,
            };

            if let Some(body) = self.bodies.get_mut(id) {
                match impact {
                    Some(impact) => {
                        body.previous_position = body.position;
                        body.previous_angle = body.angle;
                        body.set_pose(impact.pose);
                    }
                    None => self.integrator.integrate_position(body, dt),
                }
            }
        }
        self.body_scratch = ids;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;
    use approx::assert_relative_eq;

    fn world() -> World {
        World::new(WorldConfig::default()).expect("default config is valid")
    }

    #[test]
    fn rejects_bad_time_steps() {
        let config = WorldConfig {
            time_step: 0.0,
            ..WorldConfig::default()
        };
        assert!(matches!(
            World::new(config),
            Err(PhysicsError::InvalidTimeStep(_))
        ));

        let mut w = world();
        assert!(w.step(f32::NAN).is_err());
        assert!(w.internal_step(-1.0).is_err());
    }

    #[test]
    fn world_formats_with_debug() {
        let mut w = world();
        w.add_body(RigidBody::dynamic(1.0));
        assert!(format!("{w:?}").contains("bodies"));
    }

    #[test]
    fn accumulator_takes_fixed_sub_steps() {
        let mut w = world();
        assert_eq!(w.step(1.0 / 120.0).unwrap(), 0);
        assert_eq!(w.step(1.0 / 120.0 + 1e-6).unwrap(), 1);
        assert_relative_eq!(w.time(), 1.0 / 60.0, epsilon = 1e-6);
    }

    #[test]
    fn free_fall_matches_semi_implicit_euler() {
        let mut w = world();
        let id = w.add_body(
            RigidBody::dynamic(1.0)
                .with_shape(Shape::circle(0.5))
                .expect("valid shape")
                .with_damping(0.0, 0.0),
        );
        let h = w.config.time_step;
        w.internal_step(h).unwrap();

        let body = w.body(id).unwrap();
        let g = w.config.gravity.y;
        assert_relative_eq!(body.velocity.y, g * h, epsilon = 1e-5);
        assert_relative_eq!(body.position.y, g * h * h, epsilon = 1e-5);
        assert_eq!(body.force, Vec2::ZERO);
    }

    #[test]
    fn removing_a_body_clears_its_exceptions() {
        let mut w = world();
        let a = w.add_body(RigidBody::dynamic(1.0));
        let b = w.add_body(RigidBody::dynamic(1.0));
        w.disable_body_collision(a, b);
        w.remove_body(b).unwrap();
        assert!(w.disabled_pairs.is_empty());
        assert!(matches!(w.remove_body(b), Err(PhysicsError::BodyNotFound(_))));
        assert!(w.add_shape(b, Shape::circle(1.0)).is_err());
    }

    #[test]
    fn explicit_contact_material_wins_over_mixing() {
        let mut w = world();
        let rubber = w.add_material(Material::rubber());
        let ice = w.add_material(Material::ice());

        let mixed = w.resolve_contact_material(Some(rubber), Some(ice));
        assert_relative_eq!(mixed.friction, 0.03);

        w.add_contact_material(ContactMaterial::new(ice, rubber).with_friction(0.5));
        let explicit = w.resolve_contact_material(Some(rubber), Some(ice));
        assert_relative_eq!(explicit.friction, 0.5);

        let fallback = w.resolve_contact_material(None, None);
        assert_eq!(fallback, w.default_contact_material);
    }

    #[test]
    fn disabled_pairs_produce_no_contacts() {
        let mut w = world();
        let ground = w.add_body(
            RigidBody::fixed()
                .with_shape(Shape::plane())
                .expect("valid shape"),
        );
        let ball = w.add_body(
            RigidBody::dynamic(1.0)
                .with_shape(Shape::circle(1.0))
                .expect("valid shape")
                .with_position(Vec2::new(0.0, 0.5)),
        );
        w.disable_body_collision(ball, ground);
        w.internal_step(1.0 / 60.0).unwrap();
        assert!(w.contact_equations().is_empty());

        w.enable_body_collision(ground, ball);
        w.internal_step(1.0 / 60.0).unwrap();
        assert!(!w.contact_equations().is_empty());
        assert_eq!(w.friction_equations().len(), 1);
    }

    #[test]
    fn sensors_never_push() {
        let mut w = world();
        w.add_body(
            RigidBody::fixed()
                .with_shape(Shape::plane().as_sensor(true))
                .expect("valid shape"),
        );
        let ball = w.add_body(
            RigidBody::dynamic(1.0)
                .with_shape(Shape::circle(1.0))
                .expect("valid shape")
                .with_position(Vec2::new(0.0, 0.5)),
        );
        w.internal_step(1.0 / 60.0).unwrap();
        assert!(w.contact_equations().is_empty());
        assert!(w.body(ball).unwrap().velocity.y < 0.0);
    }
}
