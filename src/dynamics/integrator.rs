use crate::core::rigidbody::RigidBody;

/// Semi-implicit Euler integration of planar bodies.
///
/// Velocities are advanced from accumulated forces first; positions then move
/// with the updated velocity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integrator;

impl Integrator {
    pub fn new() -> Self {
        Self
    }

    /// `v += f·dt·m⁻¹` per unlocked axis and `w += τ·dt·I⁻¹`.
    pub fn integrate_velocity(&self, body: &mut RigidBody, dt: f32) {
        if !body.is_dynamic() || body.is_sleeping() {
            return;
        }

        body.velocity += body.force * dt * body.inv_mass * body.mass_multiplier;
        if !body.fixed_rotation {
            body.angular_velocity += body.angular_force * body.inv_inertia * dt;
        }
    }

    /// Moves the body along its velocity and marks its bounds stale.
    pub fn integrate_position(&self, body: &mut RigidBody, dt: f32) {
        if body.is_static() || body.is_sleeping() {
            return;
        }

        body.previous_position = body.position;
        body.previous_angle = body.angle;

        body.position += body.velocity * dt;
        if !body.fixed_rotation {
            body.angle += body.angular_velocity * dt;
        }
        body.mark_aabb_dirty();
    }
}
