use crate::config::SolverConfig;
use crate::core::rigidbody::RigidBody;
use crate::dynamics::contact::ContactEquation;
use crate::dynamics::equation::SolverEquation;
use crate::dynamics::friction::FrictionEquation;
use crate::utils::allocator::Arena;

/// Indexed access to the rows of one solve.
///
/// Row order is solve order. Contacts must come before any friction row that
/// names them as sources.
pub trait EquationRows {
    fn row_count(&self) -> usize;
    fn row(&self, index: usize) -> &dyn SolverEquation;
    fn row_mut(&mut self, index: usize) -> &mut dyn SolverEquation;
}

impl<'a> EquationRows for [&'a mut dyn SolverEquation] {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn row(&self, index: usize) -> &dyn SolverEquation {
        &*self[index]
    }

    fn row_mut(&mut self, index: usize) -> &mut dyn SolverEquation {
        &mut *self[index]
    }
}

/// The rows of a world step: narrowphase contacts, then friction, then user
/// equations, borrowed in place.
pub struct StepRows<'a> {
    pub contacts: &'a mut [ContactEquation],
    pub friction: &'a mut [FrictionEquation],
    pub user: &'a mut [Box<dyn SolverEquation>],
}

impl EquationRows for StepRows<'_> {
    fn row_count(&self) -> usize {
        self.contacts.len() + self.friction.len() + self.user.len()
    }

    fn row(&self, index: usize) -> &dyn SolverEquation {
        let friction_start = self.contacts.len();
        let user_start = friction_start + self.friction.len();
        if index < friction_start {
            &self.contacts[index]
        } else if index < user_start {
            &self.friction[index - friction_start]
        } else {
            self.user[index - user_start].as_ref()
        }
    }

    fn row_mut(&mut self, index: usize) -> &mut dyn SolverEquation {
        let friction_start = self.contacts.len();
        let user_start = friction_start + self.friction.len();
        if index < friction_start {
            &mut self.contacts[index]
        } else if index < user_start {
            &mut self.friction[index - friction_start]
        } else {
            self.user[index - user_start].as_mut()
        }
    }
}

/// Projected Gauss-Seidel solver over a flat list of equations.
///
/// Every `Δλ` is applied to the bodies' constraint velocities immediately so
/// later rows in the same sweep see it. Scratch buffers are kept between
/// solves.
#[derive(Debug, Clone, Default)]
pub struct GsSolver {
    pub config: SolverConfig,
    /// Sweeps run by the last main solve.
    pub used_iterations: u32,
    lambda: Vec<f32>,
    bs: Vec<f32>,
    inv_cs: Vec<f32>,
    contact_slots: Vec<usize>,
}

impl GsSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Solves all `equations` for step `h`, folds the resulting constraint
    /// velocities into `bodies`, and records each row's multiplier.
    pub fn solve(
        &mut self,
        h: f32,
        bodies: &mut Arena<RigidBody>,
        equations: &mut [&mut dyn SolverEquation],
    ) {
        self.solve_rows(h, bodies, equations);
    }

    /// [`GsSolver::solve`] over any row container.
    pub fn solve_rows<R: EquationRows + ?Sized>(
        &mut self,
        h: f32,
        bodies: &mut Arena<RigidBody>,
        rows: &mut R,
    ) {
        self.used_iterations = 0;
        for body in bodies.iter_mut() {
            body.update_solve_mass_properties();
            body.reset_constraint_velocity();
        }

        let n = rows.row_count();
        if n == 0 {
            return;
        }

        self.prepare(h, bodies, rows);

        if self.config.warm_starting {
            for (j, &lambda) in self.lambda.iter().enumerate() {
                let row = rows.row(j).equation();
                if let Some((bi, bj)) = bodies.get2_mut(row.body_a, row.body_b) {
                    row.add_to_wlambda(lambda, bi, bj);
                }
            }
        }

        let tolerance = self.config.tolerance * n as f32;
        let tolerance_squared = tolerance * tolerance;

        if self.config.friction_iterations > 0 {
            for _ in 0..self.config.friction_iterations {
                if self.sweep(h, bodies, rows) < tolerance_squared {
                    break;
                }
            }
            self.update_multipliers(h, rows);
            self.rescale_friction(rows);
        }

        for iteration in 0..self.config.iterations {
            self.used_iterations = iteration + 1;
            if self.sweep(h, bodies, rows) < tolerance_squared {
                break;
            }
        }

        for body in bodies.iter_mut() {
            body.add_constraint_velocity();
        }
        self.update_multipliers(h, rows);

        log::trace!(
            "solved {} equations in {} of {} iterations",
            n,
            self.used_iterations,
            self.config.iterations
        );
    }

    fn prepare<R: EquationRows + ?Sized>(
        &mut self,
        h: f32,
        bodies: &Arena<RigidBody>,
        rows: &mut R,
    ) {
        let n = rows.row_count();
        self.lambda.clear();
        self.bs.clear();
        self.inv_cs.clear();
        self.contact_slots.clear();
        self.lambda.reserve(n);
        self.bs.reserve(n);
        self.inv_cs.reserve(n);

        for slot in 0..n {
            let eq = rows.row_mut(slot);
            if eq.is_contact() {
                self.contact_slots.push(slot);
            }
            eq.equation_mut().prepare(h);

            let row = eq.equation();
            let warm = if self.config.warm_starting { row.lambda } else { 0.0 };
            let bodies_pair = bodies.get(row.body_a).zip(bodies.get(row.body_b));

            match bodies_pair {
                Some((bi, bj)) if row.enabled => {
                    let eps = row.epsilon;
                    // compute_b writes the Jacobian that invC reads.
                    let b = eq.compute_b(bi, bj, h);
                    let inv_c = eq.equation().compute_inv_c(eps, bi, bj);
                    self.bs.push(b);
                    self.inv_cs.push(inv_c);
                    self.lambda.push(warm);
                }
                _ => {
                    self.bs.push(0.0);
                    self.inv_cs.push(0.0);
                    self.lambda.push(0.0);
                }
            }
        }
    }

    /// One Gauss-Seidel pass; returns `(Σ|Δλ|)²`.
    fn sweep<R: EquationRows + ?Sized>(
        &mut self,
        h: f32,
        bodies: &mut Arena<RigidBody>,
        rows: &R,
    ) -> f32 {
        let mut total = 0.0;
        for j in 0..rows.row_count() {
            let row = rows.row(j).equation();
            if !row.enabled {
                continue;
            }
            let Some((bi, bj)) = bodies.get2_mut(row.body_a, row.body_b) else {
                continue;
            };

            let lambda_j = self.lambda[j];
            let gw_lambda = row.compute_gw_lambda(bi, bj);
            let mut delta = self.inv_cs[j] * (self.bs[j] - gw_lambda - row.epsilon * lambda_j);

            let lower = row.min_force * h;
            let upper = row.max_force * h;
            let next = lambda_j + delta;
            if next < lower {
                delta = lower - lambda_j;
            } else if next > upper {
                delta = upper - lambda_j;
            }

            self.lambda[j] += delta;
            row.add_to_wlambda(delta, bi, bj);
            total += delta.abs();
        }
        total * total
    }

    fn update_multipliers<R: EquationRows + ?Sized>(&self, h: f32, rows: &mut R) {
        let inv_h = 1.0 / h;
        for (j, &lambda) in self.lambda.iter().enumerate() {
            let row = rows.row_mut(j).equation_mut();
            row.lambda = lambda;
            row.multiplier = lambda * inv_h;
        }
    }

    /// Sets each friction row's bound to `μ · mean(source contact multipliers)`.
    fn rescale_friction<R: EquationRows + ?Sized>(&self, rows: &mut R) {
        for j in 0..rows.row_count() {
            let slip = match rows.row(j).friction_sources() {
                Some((sources, mu)) if !sources.is_empty() => {
                    let sum: f32 = sources
                        .iter()
                        .filter_map(|&ordinal| self.contact_slots.get(ordinal))
                        .map(|&slot| rows.row(slot).equation().multiplier)
                        .sum();
                    Some(mu * sum / sources.len() as f32)
                }
                _ => None,
            };
            if let Some(slip) = slip {
                rows.row_mut(j).set_slip_force(slip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::contact::ContactEquation;
    use crate::dynamics::friction::FrictionEquation;
    use crate::utils::allocator::EntityId;
    use crate::utils::pool::Pool;
    use approx::assert_relative_eq;
    use glam::Vec2;

    fn two_circles(gap: f32) -> (Arena<RigidBody>, EntityId, EntityId) {
        let mut bodies = Arena::new();
        let a = bodies.insert_with(|id| {
            let mut body = RigidBody::dynamic(1.0).with_position(Vec2::ZERO);
            body.id = id;
            body
        });
        let b = bodies.insert_with(|id| {
            let mut body = RigidBody::dynamic(1.0).with_position(Vec2::new(2.0 + gap, 0.0));
            body.id = id;
            body
        });
        (bodies, a, b)
    }

    fn contact(a: EntityId, b: EntityId) -> ContactEquation {
        let mut eq = ContactEquation::default();
        eq.equation.body_a = a;
        eq.equation.body_b = b;
        eq.normal_a = Vec2::X;
        eq.contact_point_a = Vec2::new(1.0, 0.0);
        eq.contact_point_b = Vec2::new(-1.0, 0.0);
        eq
    }

    #[test]
    fn resting_contact_converges_early() {
        let (mut bodies, a, b) = two_circles(0.0);
        let mut eq = contact(a, b);
        let mut solver = GsSolver::new(SolverConfig::default());

        solver.solve(1.0 / 60.0, &mut bodies, &mut [&mut eq]);

        assert!(solver.used_iterations < solver.config.iterations);
        let (bi, bj) = (bodies.get(a).unwrap(), bodies.get(b).unwrap());
        assert!(eq.compute_gq(bi, bj).abs() <= solver.config.tolerance);
        assert_relative_eq!(eq.equation.multiplier, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn overlapping_bodies_are_pushed_apart() {
        let (mut bodies, a, b) = two_circles(-0.1);
        let mut eq = contact(a, b);
        let mut solver = GsSolver::new(SolverConfig::default());

        solver.solve(1.0 / 60.0, &mut bodies, &mut [&mut eq]);

        let va = bodies.get(a).unwrap().velocity;
        let vb = bodies.get(b).unwrap().velocity;
        assert!(va.x < 0.0 && vb.x > 0.0);
        assert!(eq.equation.lambda > 0.0);
    }

    #[test]
    fn recycled_contact_row_stops_approach() {
        let (mut bodies, a, b) = two_circles(0.0);
        bodies.get_mut(a).unwrap().velocity = Vec2::new(1.0, 0.0);

        let mut pool: Pool<ContactEquation> = Pool::new();
        pool.release(contact(a, b));
        let mut eq = pool.get();
        assert_eq!(eq.equation.g, [0.0; 6]);
        eq.equation.body_a = a;
        eq.equation.body_b = b;
        eq.normal_a = Vec2::X;
        eq.contact_point_a = Vec2::new(1.0, 0.0);
        eq.contact_point_b = Vec2::new(-1.0, 0.0);

        let mut solver = GsSolver::new(SolverConfig::default());
        solver.solve(1.0 / 60.0, &mut bodies, &mut [&mut eq]);

        let (bi, bj) = (bodies.get(a).unwrap(), bodies.get(b).unwrap());
        assert!(eq.equation.lambda > 0.0);
        assert!(bj.velocity.x > 0.0);
        assert_relative_eq!(eq.velocity_along_normal(bi, bj), 0.0, epsilon = 0.1);
        assert_relative_eq!(bi.velocity.x + bj.velocity.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn contact_never_pulls() {
        let (mut bodies, a, b) = two_circles(0.0);
        bodies.get_mut(a).unwrap().velocity = Vec2::new(-1.0, 0.0);
        let mut eq = contact(a, b);
        let mut solver = GsSolver::new(SolverConfig::default());

        solver.solve(1.0 / 60.0, &mut bodies, &mut [&mut eq]);

        assert!(eq.equation.lambda >= 0.0);
        assert_relative_eq!(bodies.get(a).unwrap().velocity.x, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_body_contributes_nothing() {
        let (mut bodies, a, b) = two_circles(-0.1);
        let mut eq = contact(a, b);
        bodies.remove(b);
        let mut solver = GsSolver::new(SolverConfig::default());

        solver.solve(1.0 / 60.0, &mut bodies, &mut [&mut eq]);

        assert_eq!(eq.equation.lambda, 0.0);
        assert_eq!(bodies.get(a).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn friction_prepass_scales_slip_by_normal_force() {
        let (mut bodies, a, b) = two_circles(-0.05);
        bodies.get_mut(b).unwrap().velocity = Vec2::new(0.0, 1.0);
        let mut normal = contact(a, b);
        let mut friction = FrictionEquation::default();
        friction.equation.body_a = a;
        friction.equation.body_b = b;
        friction.t = Vec2::Y;
        friction.contact_point_a = normal.contact_point_a;
        friction.contact_point_b = normal.contact_point_b;
        friction.contact_equations.push(0);
        friction.friction_coefficient = 0.5;

        let config = SolverConfig {
            friction_iterations: 5,
            ..SolverConfig::default()
        };
        let mut solver = GsSolver::new(config);
        solver.solve(1.0 / 60.0, &mut bodies, &mut [&mut normal, &mut friction]);

        assert!(normal.equation.multiplier > 0.0);
        assert!(friction.slip_force() > 0.0);
        assert!(friction.slip_force() < f32::MAX);
        assert!(friction.equation.lambda.abs() <= friction.slip_force() / 60.0 + 1e-4);
    }

    #[test]
    fn step_rows_index_contacts_then_friction_then_user() {
        let (_, a, b) = two_circles(0.0);
        let mut contacts = vec![contact(a, b), contact(a, b)];
        let mut friction = vec![FrictionEquation::default()];
        let mut user: Vec<Box<dyn SolverEquation>> = vec![Box::new(contact(b, a))];
        let mut rows = StepRows {
            contacts: &mut contacts,
            friction: &mut friction,
            user: &mut user,
        };

        assert_eq!(rows.row_count(), 4);
        assert!(rows.row(1).is_contact());
        assert!(rows.row(2).friction_sources().is_some());
        assert_eq!(rows.row(3).equation().body_a, b);

        rows.row_mut(2).equation_mut().lambda = 2.0;
        assert_eq!(friction[0].equation.lambda, 2.0);
    }
}
