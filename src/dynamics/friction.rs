use glam::Vec2;

use super::equation::{Equation, SolverEquation};
use crate::core::rigidbody::RigidBody;
use crate::core::shape::ShapeHandle;
use crate::utils::math::cross;
use crate::utils::pool::Poolable;

/// Tangential row bounded by `±slip_force`.
///
/// `contact_equations` holds the ordinals of the contact rows this row was
/// derived from; the solver's friction pre-pass rescales the slip force from
/// their multipliers.
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionEquation {
    pub equation: Equation,
    pub contact_point_a: Vec2,
    pub contact_point_b: Vec2,
    pub t: Vec2,
    pub contact_equations: Vec<usize>,
    pub friction_coefficient: f32,
    pub shape_a: ShapeHandle,
    pub shape_b: ShapeHandle,
}

impl Default for FrictionEquation {
    fn default() -> Self {
        Self {
            equation: Equation::default(),
            contact_point_a: Vec2::ZERO,
            contact_point_b: Vec2::ZERO,
            t: Vec2::ZERO,
            contact_equations: Vec::new(),
            friction_coefficient: 0.3,
            shape_a: ShapeHandle::default(),
            shape_b: ShapeHandle::default(),
        }
    }
}

impl FrictionEquation {
    pub fn slip_force(&self) -> f32 {
        self.equation.max_force
    }

    pub fn update_jacobian(&mut self) {
        let t = self.t;
        self.equation.g = [
            -t.x,
            -t.y,
            -cross(self.contact_point_a, t),
            t.x,
            t.y,
            cross(self.contact_point_b, t),
        ];
    }
}

impl SolverEquation for FrictionEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }

    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }

    fn compute_b(&mut self, bi: &RigidBody, bj: &RigidBody, h: f32) -> f32 {
        self.update_jacobian();
        let eq = &self.equation;
        -eq.compute_gw(bi, bj) * eq.b - h * eq.compute_gimf(bi, bj)
    }

    fn friction_sources(&self) -> Option<(&[usize], f32)> {
        Some((&self.contact_equations, self.friction_coefficient))
    }
}

impl Poolable for FrictionEquation {
    fn reset(&mut self) {
        self.equation.reset_to(-f32::MAX, f32::MAX);
        self.contact_point_a = Vec2::ZERO;
        self.contact_point_b = Vec2::ZERO;
        self.t = Vec2::ZERO;
        self.contact_equations.clear();
        self.friction_coefficient = 0.3;
        self.shape_a = ShapeHandle::default();
        self.shape_b = ShapeHandle::default();
    }
}
