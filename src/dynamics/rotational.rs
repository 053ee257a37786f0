//! Angle-only rows used by gears, motors, and rotational locks.

use glam::Vec2;

use super::equation::{Equation, SolverEquation};
use crate::core::rigidbody::RigidBody;
use crate::utils::allocator::EntityId;
use crate::utils::math::rotate;

/// Keeps `ratio·θj - θi + angle` at zero, optionally torque limited.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleLockEquation {
    pub equation: Equation,
    pub angle: f32,
    ratio: f32,
}

impl AngleLockEquation {
    pub fn new(body_a: EntityId, body_b: EntityId, angle: f32, ratio: f32) -> Self {
        let mut equation = Equation::new(body_a, body_b, -f32::MAX, f32::MAX);
        equation.g = [0.0, 0.0, -1.0, 0.0, 0.0, ratio];
        Self {
            equation,
            angle,
            ratio,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio;
        self.equation.g[2] = -1.0;
        self.equation.g[5] = ratio;
    }

    pub fn set_max_torque(&mut self, torque: f32) {
        self.equation.max_force = torque;
        self.equation.min_force = -torque;
    }
}

impl SolverEquation for AngleLockEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }

    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }

    fn compute_gq(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        self.ratio * bj.angle - bi.angle + self.angle
    }
}

/// Drives the relative angular velocity `ratio·wj - wi` toward
/// `-relative_velocity`, acting as a motor.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationalVelocityEquation {
    pub equation: Equation,
    ratio: f32,
}

impl RotationalVelocityEquation {
    pub fn new(body_a: EntityId, body_b: EntityId) -> Self {
        let mut equation = Equation::new(body_a, body_b, -f32::MAX, f32::MAX);
        equation.g = [0.0, 0.0, -1.0, 0.0, 0.0, 1.0];
        equation.relative_velocity = 0.0;
        Self {
            equation,
            ratio: 1.0,
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio;
        self.equation.g[5] = ratio;
    }

    /// Motor speed, written into the row's target relative velocity.
    pub fn set_speed(&mut self, speed: f32) {
        self.equation.relative_velocity = speed;
    }

    pub fn set_max_torque(&mut self, torque: f32) {
        self.equation.max_force = torque;
        self.equation.min_force = -torque;
    }
}

impl SolverEquation for RotationalVelocityEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }

    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }

    fn compute_b(&mut self, bi: &RigidBody, bj: &RigidBody, h: f32) -> f32 {
        let eq = &self.equation;
        -eq.compute_gw(bi, bj) * eq.b - h * eq.compute_gimf(bi, bj)
    }
}

/// Locks the relative angle of two bodies at `angle`.
///
/// The violation is the dot product of body A's x axis, turned by `angle`,
/// with body B's y axis; it is zero when the axes are perpendicular.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationalLockEquation {
    pub equation: Equation,
    pub angle: f32,
}

impl RotationalLockEquation {
    pub fn new(body_a: EntityId, body_b: EntityId, angle: f32) -> Self {
        let mut equation = Equation::new(body_a, body_b, -f32::MAX, f32::MAX);
        equation.g = [0.0, 0.0, 1.0, 0.0, 0.0, -1.0];
        Self { equation, angle }
    }
}

impl SolverEquation for RotationalLockEquation {
    fn equation(&self) -> &Equation {
        &self.equation
    }

    fn equation_mut(&mut self) -> &mut Equation {
        &mut self.equation
    }

    fn compute_gq(&self, bi: &RigidBody, bj: &RigidBody) -> f32 {
        let axis_a = rotate(Vec2::X, bi.angle + self.angle);
        let axis_b = rotate(Vec2::Y, bj.angle);
        axis_a.dot(axis_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bodies(angle_a: f32, angle_b: f32) -> (RigidBody, RigidBody) {
        (
            RigidBody::dynamic(1.0).with_angle(angle_a),
            RigidBody::dynamic(1.0).with_angle(angle_b),
        )
    }

    #[test]
    fn angle_lock_measures_geared_offset() {
        let (a, b) = bodies(0.5, 0.25);
        let mut eq = AngleLockEquation::new(a.id, b.id, 0.0, 2.0);
        assert_relative_eq!(eq.compute_gq(&a, &b), 0.0, epsilon = 1e-6);

        eq.set_ratio(1.0);
        assert_relative_eq!(eq.compute_gq(&a, &b), -0.25, epsilon = 1e-6);
        assert_eq!(eq.equation.g[5], 1.0);

        eq.set_max_torque(3.0);
        assert_eq!(eq.equation.min_force, -3.0);
    }

    #[test]
    fn rotational_lock_is_zero_when_aligned() {
        let (a, b) = bodies(0.3, 0.3);
        let eq = RotationalLockEquation::new(a.id, b.id, 0.0);
        assert_relative_eq!(eq.compute_gq(&a, &b), 0.0, epsilon = 1e-6);

        let (a, b) = bodies(0.0, 0.2);
        assert!(eq.compute_gq(&a, &b).abs() > 0.1);
    }

    #[test]
    fn motor_rhs_ignores_position() {
        let (mut a, b) = bodies(1.0, -2.0);
        a.angular_velocity = 0.0;
        let mut eq = RotationalVelocityEquation::new(a.id, b.id);
        eq.set_speed(2.0);
        eq.equation.prepare(1.0 / 60.0);
        let rhs = eq.compute_b(&a, &b, 1.0 / 60.0);
        assert_relative_eq!(rhs, -2.0 * eq.equation.b, epsilon = 1e-6);
    }
}
