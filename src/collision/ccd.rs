use super::{
    broadphase::can_collide,
    narrowphase::Narrowphase,
    queries::{Ray, RayMode, RaycastResult},
};
use crate::{
    core::rigidbody::{BodyPose, RigidBody},
    utils::{
        allocator::{Arena, EntityId},
        tuple_dictionary::TupleDictionary,
    },
};

/// Where a fast body should stop this step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOfImpact {
    /// Fraction of the step's motion that is allowed.
    pub fraction: f32,
    pub pose: BodyPose,
    /// Body the motion ray ran into.
    pub other: EntityId,
}

/// Ray-based tunnelling prevention for bodies above their CCD speed.
#[derive(Debug, Default)]
pub struct ContinuousCollision {
    result: RaycastResult,
}

impl ContinuousCollision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `body` is moving fast enough to need a sweep.
    pub fn is_candidate(body: &RigidBody) -> bool {
        let threshold = body.ccd_speed_threshold;
        threshold >= 0.0 && body.velocity.length_squared() > threshold * threshold
    }

    /// Casts the body's centre along its motion for `dt`, then bisects the
    /// interval up to the first hit for the last overlapping time.
    ///
    /// Only solid shapes whose filters accept the body's own solid shapes can
    /// stop it. Returns `None` when the body is slow or nothing along the path
    /// qualifies.
    pub fn time_of_impact(
        &mut self,
        body: &RigidBody,
        bodies: &Arena<RigidBody>,
        narrowphase: &mut Narrowphase,
        ignored: &TupleDictionary<EntityId, ()>,
        dt: f32,
    ) -> Option<TimeOfImpact> {
        if !Self::is_candidate(body) {
            return None;
        }

        let start = body.pose();
        let motion = body.velocity * dt;
        let (group, mask) = body
            .shapes
            .iter()
            .filter(|shape| !shape.sensor)
            .fold((0, 0), |(group, mask), shape| {
                (group | shape.collision_group, mask | shape.collision_mask)
            });
        if group == 0 || mask == 0 {
            return None;
        }
        let ray = Ray::new(start.position, start.position + motion)
            .with_mode(RayMode::Closest)
            .with_collision_filter(group, mask)
            .with_skip_backfaces(true)
            .with_skip_sensors(true);

        let mut best: Option<(f32, EntityId)> = None;
        for other in bodies.iter() {
            if other.id == body.id
                || ignored.contains(body.id, other.id)
                || !can_collide(body, other)
            {
                continue;
            }
            self.result.reset();
            ray.intersect_body(&mut self.result, other);
            if let Some(hit) = self.result.closest {
                if best.map_or(true, |(fraction, _)| hit.fraction < fraction) {
                    best = Some((hit.fraction, other.id));
                }
            }
        }
        let (hit_fraction, other_id) = best?;
        let other = bodies.get(other_id)?;

        let pose_at = |t: f32| {
            BodyPose::new(
                start.position + motion * t,
                start.angle + body.angular_velocity * dt * t,
            )
        };
        let other_pose = other.pose();

        let mut lo = 0.0;
        let mut hi = hit_fraction;
        for _ in 0..body.ccd_iterations {
            let mid = (lo + hi) * 0.5;
            let pose = pose_at(mid);
            let overlapping = body.aabb_at(pose).overlaps(&other.aabb_at(other_pose))
                && narrowphase.bodies_overlap(body, pose, other, other_pose, true);
            if overlapping {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        log::debug!(
            "body {:?} swept into {:?}; advancing {:.3} of its motion",
            body.id,
            other_id,
            hi
        );

        Some(TimeOfImpact {
            fraction: hi,
            pose: pose_at(hi),
            other: other_id,
        })
    }
}
