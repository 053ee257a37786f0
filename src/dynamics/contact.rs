use glam::Vec2;

use super::equation::{Equation, SolverEquation};
use crate::core::rigidbody::RigidBody;
use crate::core::shape::ShapeHandle;
use crate::utils::math::cross;
use crate::utils::pool::Poolable;

/// Non-penetration row between two bodies at one contact point.
///
/// `normal_a` points out of shape A toward shape B. Contact points are
/// world-oriented offsets from each body's centre.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEquation {
    pub equation: Equation,
    pub contact_point_a: Vec2,
    pub contact_point_b: Vec2,
    pub normal_a: Vec2,
    pub restitution: f32,
    /// Set when the two bodies did not touch in the previous step.
    pub first_impact: bool,
    pub shape_a: ShapeHandle,
    pub shape_b: ShapeHandle,
}

impl Default for ContactEquation {
    fn default() -> Self {
        Self {
            equation: Equation::new(Default::default(), Default::default(), 0.0, f32::MAX),
            contact_point_a: Vec2::ZERO,
            contact_point_b: Vec2::ZERO,
            normal_a: Vec2::ZERO,
            restitution: 0.0,
            first_impact: false,
            shape_a: ShapeHandle::default(),
            shape_b: ShapeHandle::default(),
        }
    }
}

impl ContactEquation {
    /// Writes the Jacobian `[-n, -ri×n, n, rj×n]` from the current geometry.
    pub fn update_jacobian(&mut self) {
        let n = self.normal_a;
        let rixn = cross(self.contact_point_a, n);
        let rjxn = cross(self.contact_point_b, n);
        self.equation.g = [-n.x, -n.y, -rixn, n.x, n.y, rjxn];
    }

    /// Signed gap along the normal; negative while penetrating.
    pub fn penetration(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        let gap = bj.position + self.contact_point_b - bi.position - self.contact_point_a;
        self.normal_a.dot(gap)
    }

    /// Relative velocity of the contact points along the normal.
    pub fn velocity_along_normal(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        let vi = bi.velocity_at_point(self.contact_point_a);
        let vj = bj.velocity_at_point(self.contact_point_b);
        self.normal_a.dot(vi - vj)
    }
}

impl SolverEquation for ContactEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }

    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }

    fn compute_gq(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        self.penetration(bi, bj) + self.equation.offset
    }

    fn compute_b(&mut self, bi: &RigidBody, bj: &RigidBody, h: f32) -> f32 {
        self.update_jacobian();
        let eq = &self.equation;

        // New impacts with restitution target a bounce velocity instead of
        // correcting penetration.
        let (gq, gw) = if self.first_impact && self.restitution != 0.0 {
            (0.0, (1.0 / eq.b) * (1.0 + self.restitution) * eq.compute_gw(bi, bj))
        } else {
            (self.compute_gq(bi, bj), eq.compute_gw(bi, bj))
        };

        let gimf = eq.compute_gimf(bi, bj);
        -gq * eq.a - gw * eq.b - h * gimf
    }

    fn is_contact(&self) -> bool {
        true
    }
}

impl Poolable for ContactEquation {
    fn reset(&mut self) {
        self.equation.reset_to(0.0, f32::MAX);
        self.contact_point_a = Vec2::ZERO;
        self.contact_point_b = Vec2::ZERO;
        self.normal_a = Vec2::ZERO;
        self.restitution = 0.0;
        self.first_impact = false;
        self.shape_a = ShapeHandle::default();
        self.shape_b = ShapeHandle::default();
    }
}
