//! Constraint rows solved by the Gauss-Seidel solver.
//!
//! Each row holds a 6-entry Jacobian `G = [Gx_i, Gy_i, Gθ_i, Gx_j, Gy_j, Gθ_j]`
//! acting on two bodies plus the SPOOK stabilization parameters derived from
//! stiffness, relaxation, and the time step.

use glam::Vec2;
use std::fmt::Debug;

use crate::config::{DEFAULT_RELAXATION, DEFAULT_STIFFNESS, DEFAULT_TIME_STEP};
use crate::core::rigidbody::RigidBody;
use crate::utils::allocator::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub g: [f32; 6],
    /// Constant added to the constraint value `Gq`.
    pub offset: f32,
    pub min_force: f32,
    pub max_force: f32,
    pub stiffness: f32,
    pub relaxation: f32,
    pub a: f32,
    pub b: f32,
    pub epsilon: f32,
    pub timestep: f32,
    pub needs_update: bool,
    /// Force applied by the last solve, `lambda / h`.
    pub multiplier: f32,
    /// Target relative velocity added to `GW`, used by motors and conveyors.
    pub relative_velocity: f32,
    pub enabled: bool,
    /// Accumulated impulse from the last solve.
    pub lambda: f32,
    pub body_a: EntityId,
    pub body_b: EntityId,
}

impl Default for Equation {
    fn default() -> Self {
        Self::new(EntityId::default(), EntityId::default(), -f32::MAX, f32::MAX)
    }
}

impl Equation {
    pub fn new(body_a: EntityId, body_b: EntityId, min_force: f32, max_force: f32) -> Self {
        Self {
            g: [0.0; 6],
            offset: 0.0,
            min_force,
            max_force,
            stiffness: DEFAULT_STIFFNESS,
            relaxation: DEFAULT_RELAXATION,
            a: 0.0,
            b: 0.0,
            epsilon: 0.0,
            timestep: DEFAULT_TIME_STEP,
            needs_update: true,
            multiplier: 0.0,
            relative_velocity: 0.0,
            enabled: true,
            lambda: 0.0,
            body_a,
            body_b,
        }
    }

    /// Recomputes `a`, `b`, and `epsilon` from stiffness, relaxation, and step.
    pub fn update(&mut self) {
        let k = self.stiffness;
        let d = self.relaxation;
        let h = self.timestep;

        self.a = 4.0 / (h * (1.0 + 4.0 * d));
        self.b = (4.0 * d) / (1.0 + 4.0 * d);
        self.epsilon = 4.0 / (h * h * k * (1.0 + 4.0 * d));
        self.needs_update = false;
    }

    /// Refreshes the SPOOK parameters if the step changed or they are stale.
    pub fn prepare(&mut self, h: f32) {
        if self.needs_update || self.timestep != h {
            self.timestep = h;
            self.update();
        }
    }

    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness;
        self.needs_update = true;
    }

    pub fn set_relaxation(&mut self, relaxation: f32) {
        self.relaxation = relaxation;
        self.needs_update = true;
    }

    /// Multiplies `G` with a generalized vector of two bodies.
    #[inline]
    pub fn gmult(g: &[f32; 6], vi: Vec2, wi: f32, vj: Vec2, wj: f32) -> f32 {
        g[0] * vi.x + g[1] * vi.y + g[2] * wi + g[3] * vj.x + g[4] * vj.y + g[5] * wj
    }

    /// Constraint violation `G q + offset`.
    pub fn compute_gq(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        Self::gmult(&self.g, bi.position, bi.angle, bj.position, bj.angle) + self.offset
    }

    /// Constraint velocity `G W`, including the target relative velocity.
    pub fn compute_gw(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        Self::gmult(
            &self.g,
            bi.velocity,
            bi.angular_velocity,
            bj.velocity,
            bj.angular_velocity,
        ) + self.relative_velocity
    }

    /// Constraint velocity from the solver's accumulated `vlambda`/`wlambda`.
    pub fn compute_gw_lambda(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        Self::gmult(&self.g, bi.vlambda, bi.wlambda, bj.vlambda, bj.wlambda)
    }

    /// `G M⁻¹ f` for the external forces currently on the bodies.
    pub fn compute_gimf(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        let imf_i = bi.force * bi.mass_multiplier * bi.inv_mass_solve;
        let imf_j = bj.force * bj.mass_multiplier * bj.inv_mass_solve;
        Self::gmult(
            &self.g,
            imf_i,
            bi.angular_force * bi.inv_inertia_solve,
            imf_j,
            bj.angular_force * bj.inv_inertia_solve,
        )
    }

    /// Effective inverse mass along the row, `G M⁻¹ Gᵀ`.
    pub fn compute_gimgt(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        let g = &self.g;
        let mi = bi.inv_mass_solve;
        let mj = bj.inv_mass_solve;
        mi * bi.mass_multiplier.x * g[0] * g[0]
            + mi * bi.mass_multiplier.y * g[1] * g[1]
            + g[2] * g[2] * bi.inv_inertia_solve
            + mj * bj.mass_multiplier.x * g[3] * g[3]
            + mj * bj.mass_multiplier.y * g[4] * g[4]
            + g[5] * g[5] * bj.inv_inertia_solve
    }

    /// Right-hand side `B = -Gq·a - GW·b - h·GiMf` for a given `Gq`.
    pub fn compute_b_with(&self, gq: f32, bi: &RigidBody, bj: &RigidBody, h: f32) -> f32 {
        let gw = self.compute_gw(bi, bj);
        let gimf = self.compute_gimf(bi, bj);
        -gq * self.a - gw * self.b - h * gimf
    }

    /// `1 / (G M⁻¹ Gᵀ + eps)`, or zero when the row cannot move either body.
    pub fn compute_inv_c(&self, eps: f32, bi: &RigidBody, bj: &RigidBody) -> f32 {
        let denominator = self.compute_gimgt(bi, bj) + eps;
        if denominator > 0.0 && denominator.is_finite() {
            1.0 / denominator
        } else {
            0.0
        }
    }

    /// Applies `M⁻¹ Gᵀ Δλ` to both bodies' constraint velocities.
    pub fn add_to_wlambda(&self, delta_lambda: f32, bi: &mut RigidBody, bj: &mut RigidBody) {
        let g = &self.g;

        bi.vlambda += Vec2::new(g[0], g[1]) * bi.inv_mass_solve * delta_lambda * bi.mass_multiplier;
        bi.wlambda += bi.inv_inertia_solve * g[2] * delta_lambda;

        bj.vlambda += Vec2::new(g[3], g[4]) * bj.inv_mass_solve * delta_lambda * bj.mass_multiplier;
        bj.wlambda += bj.inv_inertia_solve * g[5] * delta_lambda;
    }

    /// Drops the body references so a pooled row cannot act on stale bodies.
    pub fn release_bodies(&mut self) {
        self.body_a = EntityId::default();
        self.body_b = EntityId::default();
    }

    /// Restores the pristine state of a freshly created row.
    pub(crate) fn reset_to(&mut self, min_force: f32, max_force: f32) {
        *self = Self::new(EntityId::default(), EntityId::default(), min_force, max_force);
    }
}

/// Seam between the solver and the concrete equation types.
///
/// Variants override [`SolverEquation::compute_gq`] or
/// [`SolverEquation::compute_b`]; everything else is shared through the base
/// [`Equation`].
pub trait SolverEquation: Debug {
    fn equation(&self) -> &Equation;

    fn equation_mut(&mut self) -> &mut Equation;

    fn compute_gq(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        self.equation().compute_gq(bi, bj)
    }

    fn compute_b(&mut self, bi: &RigidBody, bj: &RigidBody, h: f32) -> f32 {
        let gq = self.compute_gq(bi, bj);
        self.equation().compute_b_with(gq, bi, bj, h)
    }

    /// Whether this row is a normal contact, counted for friction sources.
    fn is_contact(&self) -> bool {
        false
    }

    /// Source contacts (ordinals among the contact rows) and friction
    /// coefficient, for rows whose bounds follow the normal force.
    fn friction_sources(&self) -> Option<(&[usize], f32)> {
        None
    }

    /// Sets symmetric force bounds `[-slip, slip]`.
    fn set_slip_force(&mut self, slip_force: f32) {
        let eq = self.equation_mut();
        eq.min_force = -slip_force;
        eq.max_force = slip_force;
    }
}

impl SolverEquation for Equation {
    fn equation(&self) -> &Equation {
        self
    }

    fn equation_mut(&mut self) -> &mut Equation {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spook_parameters_follow_stiffness_and_relaxation() {
        let mut eq = Equation::default();
        eq.stiffness = 1e6;
        eq.relaxation = 4.0;
        eq.prepare(1.0 / 60.0);

        let h = 1.0 / 60.0_f32;
        assert_relative_eq!(eq.a, 4.0 / (h * 17.0), epsilon = 1e-3);
        assert_relative_eq!(eq.b, 16.0 / 17.0, epsilon = 1e-6);
        assert_relative_eq!(eq.epsilon, 4.0 / (h * h * 1e6 * 17.0), epsilon = 1e-9);
        assert!(!eq.needs_update);
    }

    #[test]
    fn changing_stiffness_marks_row_stale() {
        let mut eq = Equation::default();
        eq.prepare(0.01);
        eq.set_stiffness(10.0);
        assert!(eq.needs_update);
        eq.prepare(0.01);
        assert_relative_eq!(eq.epsilon, 4.0 / (0.0001 * 10.0 * 17.0), epsilon = 1e-3);
    }

    #[test]
    fn inv_c_is_zero_without_mass_or_compliance() {
        let eq = Equation::default();
        let a = RigidBody::fixed();
        let b = RigidBody::fixed();
        assert_eq!(eq.compute_inv_c(0.0, &a, &b), 0.0);
    }

    #[test]
    fn add_to_wlambda_respects_mass_multiplier() {
        let mut eq = Equation::default();
        eq.g = [1.0, 1.0, 0.0, -1.0, -1.0, 0.0];
        let mut a = RigidBody::dynamic(1.0).with_fixed_axes(true, false);
        let mut b = RigidBody::dynamic(2.0);
        a.update_solve_mass_properties();
        b.update_solve_mass_properties();

        eq.add_to_wlambda(2.0, &mut a, &mut b);
        assert_eq!(a.vlambda, Vec2::new(0.0, 2.0));
        assert_eq!(b.vlambda, Vec2::new(-1.0, -1.0));
    }

    #[test]
    fn released_rows_lose_their_bodies() {
        let mut eq = Equation::new(EntityId::from_index(1), EntityId::from_index(2), 0.0, 1.0);
        eq.release_bodies();
        assert!(eq.body_a.is_null());
        assert!(eq.body_b.is_null());
    }
}
