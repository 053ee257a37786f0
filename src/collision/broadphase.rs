use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        rigidbody::{BodyType, RigidBody, SleepState},
        types::Aabb,
    },
    error::{PhysicsError, PhysicsResult},
    utils::allocator::{Arena, EntityId},
};

/// Coarse test used to accept a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BoundingVolume {
    /// Distance between centres against the sum of bounding radii.
    BoundingCircle,
    #[default]
    Aabb,
}

/// Proposes body pairs that may be touching. False positives are allowed,
/// false negatives are not.
///
/// Bodies must have up-to-date AABBs before [`Broadphase::collision_pairs`]
/// is called.
pub trait Broadphase: Debug {
    fn collision_pairs(&mut self, bodies: &Arena<RigidBody>) -> &[(EntityId, EntityId)];

    /// Appends every body whose AABB overlaps `aabb` to `out`.
    fn aabb_query(&self, bodies: &Arena<RigidBody>, aabb: &Aabb, out: &mut Vec<EntityId>) {
        for (id, body) in bodies.ids().zip(bodies.iter()) {
            if body.aabb().overlaps(aabb) {
                out.push(id);
            }
        }
    }

    fn add_body(&mut self, _id: EntityId) {}

    fn remove_body(&mut self, _id: EntityId) {}

    /// Resynchronises any internal body list with `bodies`.
    fn set_bodies(&mut self, _bodies: &Arena<RigidBody>) {}

    fn bounding_volume(&self) -> BoundingVolume;

    fn set_bounding_volume(&mut self, volume: BoundingVolume);
}

/// Policy gate applied before any geometry test.
pub fn can_collide(a: &RigidBody, b: &RigidBody) -> bool {
    use BodyType::{Kinematic, Static};

    match (a.body_type, b.body_type) {
        (Static, Static) | (Static, Kinematic) | (Kinematic, Static) | (Kinematic, Kinematic) => {
            return false;
        }
        _ => {}
    }

    let sleeping_a = a.sleep_state == SleepState::Sleeping;
    let sleeping_b = b.sleep_state == SleepState::Sleeping;
    if sleeping_a && sleeping_b {
        return false;
    }
    if (sleeping_a && b.body_type == Static) || (sleeping_b && a.body_type == Static) {
        return false;
    }
    true
}

pub fn bounding_radius_check(a: &RigidBody, b: &RigidBody) -> bool {
    let r = a.bounding_radius() + b.bounding_radius();
    a.position.distance_squared(b.position) <= r * r
}

pub fn aabb_check(a: &RigidBody, b: &RigidBody) -> bool {
    a.aabb().overlaps(b.aabb())
}

pub fn bounding_volume_check(a: &RigidBody, b: &RigidBody, volume: BoundingVolume) -> bool {
    match volume {
        BoundingVolume::BoundingCircle => bounding_radius_check(a, b),
        BoundingVolume::Aabb => aabb_check(a, b),
    }
}

/// Tests every pair of bodies. O(n²), mostly useful as a reference.
#[derive(Debug, Default)]
pub struct NaiveBroadphase {
    bounding_volume: BoundingVolume,
    pairs: Vec<(EntityId, EntityId)>,
}

impl NaiveBroadphase {
    pub fn new(bounding_volume: BoundingVolume) -> Self {
        Self {
            bounding_volume,
            pairs: Vec::new(),
        }
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &Arena<RigidBody>) -> &[(EntityId, EntityId)] {
        self.pairs.clear();
        for (i, (id_a, a)) in bodies.ids().zip(bodies.iter()).enumerate() {
            for (id_b, b) in bodies.ids().zip(bodies.iter()).skip(i + 1) {
                if can_collide(a, b) && bounding_volume_check(a, b, self.bounding_volume) {
                    self.pairs.push((id_a, id_b));
                }
            }
        }
        &self.pairs
    }

    fn bounding_volume(&self) -> BoundingVolume {
        self.bounding_volume
    }

    fn set_bounding_volume(&mut self, volume: BoundingVolume) {
        self.bounding_volume = volume;
    }
}

/// Sweep-and-prune along one axis.
///
/// The body list is kept sorted by AABB lower bound with an insertion sort,
/// which is close to linear when bodies move little between steps.
#[derive(Debug, Default)]
pub struct SweepAndPruneBroadphase {
    bounding_volume: BoundingVolume,
    axis_index: usize,
    axis_list: Vec<EntityId>,
    pairs: Vec<(EntityId, EntityId)>,
}

impl SweepAndPruneBroadphase {
    pub fn new(bounding_volume: BoundingVolume) -> Self {
        Self {
            bounding_volume,
            ..Self::default()
        }
    }

    pub fn axis_index(&self) -> usize {
        self.axis_index
    }

    /// Selects the sweep axis: 0 for X, 1 for Y.
    pub fn set_axis_index(&mut self, axis_index: usize) -> PhysicsResult<()> {
        if axis_index > 1 {
            return Err(PhysicsError::InvalidConfig(format!(
                "sweep axis must be 0 or 1, got {axis_index}"
            )));
        }
        self.axis_index = axis_index;
        Ok(())
    }

    /// Number of bodies tracked along the sweep axis.
    pub fn len(&self) -> usize {
        self.axis_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis_list.is_empty()
    }

    fn sort_axis_list(&mut self, bodies: &Arena<RigidBody>) {
        let axis = self.axis_index;
        let lower = |id: &EntityId| {
            bodies
                .get(*id)
                .map_or(f32::MAX, |body| body.aabb().lower[axis])
        };

        for i in 1..self.axis_list.len() {
            let current = self.axis_list[i];
            let key = lower(&current);
            let mut j = i;
            while j > 0 && lower(&self.axis_list[j - 1]) > key {
                self.axis_list[j] = self.axis_list[j - 1];
                j -= 1;
            }
            self.axis_list[j] = current;
        }
    }
}

impl Broadphase for SweepAndPruneBroadphase {
    fn collision_pairs(&mut self, bodies: &Arena<RigidBody>) -> &[(EntityId, EntityId)] {
        self.pairs.clear();
        self.axis_list.retain(|id| bodies.contains(*id));
        self.sort_axis_list(bodies);

        let axis = self.axis_index;
        for (i, id_a) in self.axis_list.iter().enumerate() {
            let Some(a) = bodies.get(*id_a) else {
                continue;
            };
            let upper = a.aabb().upper[axis];

            for id_b in &self.axis_list[i + 1..] {
                let Some(b) = bodies.get(*id_b) else {
                    continue;
                };
                if b.aabb().lower[axis] > upper {
                    break;
                }
                if can_collide(a, b) && bounding_volume_check(a, b, self.bounding_volume) {
                    self.pairs.push((*id_a, *id_b));
                }
            }
        }
        &self.pairs
    }

    fn add_body(&mut self, id: EntityId) {
        if !self.axis_list.contains(&id) {
            self.axis_list.push(id);
        }
    }

    fn remove_body(&mut self, id: EntityId) {
        self.axis_list.retain(|other| *other != id);
    }

    fn set_bodies(&mut self, bodies: &Arena<RigidBody>) {
        self.axis_list.clear();
        self.axis_list.extend(bodies.ids());
    }

    fn bounding_volume(&self) -> BoundingVolume {
        self.bounding_volume
    }

    fn set_bounding_volume(&mut self, volume: BoundingVolume) {
        self.bounding_volume = volume;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::Shape;
    use glam::Vec2;

    fn insert(bodies: &mut Arena<RigidBody>, body: RigidBody) -> EntityId {
        bodies.insert_with(|id| {
            let mut body = body;
            body.id = id;
            body.update_aabb();
            body
        })
    }

    fn circle_at(x: f32, y: f32) -> RigidBody {
        RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(0.5))
            .expect("valid shape")
            .with_position(Vec2::new(x, y))
    }

    #[test]
    fn static_and_kinematic_pairs_are_gated() {
        let fixed = RigidBody::fixed();
        let kinematic = RigidBody::kinematic();
        let dynamic = RigidBody::dynamic(1.0);

        assert!(!can_collide(&fixed, &fixed));
        assert!(!can_collide(&fixed, &kinematic));
        assert!(!can_collide(&kinematic, &kinematic));
        assert!(can_collide(&dynamic, &fixed));
        assert!(can_collide(&dynamic, &kinematic));

        let mut sleeping = RigidBody::dynamic(1.0);
        sleeping.sleep();
        assert!(!can_collide(&sleeping, &sleeping.clone()));
        assert!(!can_collide(&sleeping, &fixed));
        assert!(can_collide(&sleeping, &dynamic));
    }

    #[test]
    fn sweep_breaks_on_first_gap() {
        let mut bodies = Arena::new();
        let a = insert(&mut bodies, circle_at(0.0, 0.0));
        let b = insert(&mut bodies, circle_at(0.8, 0.0));
        insert(&mut bodies, circle_at(5.0, 0.0));

        let mut sap = SweepAndPruneBroadphase::new(BoundingVolume::Aabb);
        sap.set_bodies(&bodies);
        assert_eq!(sap.collision_pairs(&bodies), &[(a, b)]);
    }

    #[test]
    fn sweep_axis_is_validated() {
        let mut sap = SweepAndPruneBroadphase::default();
        assert!(sap.set_axis_index(1).is_ok());
        assert!(matches!(
            sap.set_axis_index(2),
            Err(PhysicsError::InvalidConfig(_))
        ));
        assert_eq!(sap.axis_index(), 1);
    }

    #[test]
    fn removed_bodies_leave_the_axis_list() {
        let mut bodies = Arena::new();
        let a = insert(&mut bodies, circle_at(0.0, 0.0));
        let b = insert(&mut bodies, circle_at(0.5, 0.0));
        let mut sap = SweepAndPruneBroadphase::default();
        sap.add_body(a);
        sap.add_body(b);
        sap.add_body(b);
        assert_eq!(sap.len(), 2);

        bodies.remove(b);
        sap.remove_body(b);
        assert!(sap.collision_pairs(&bodies).is_empty());
        assert_eq!(sap.len(), 1);
    }

    #[test]
    fn bounding_circle_check_uses_radii() {
        let a = circle_at(0.0, 0.0);
        let near = circle_at(0.9, 0.0);
        let far = circle_at(1.1, 0.0);
        assert!(bounding_radius_check(&a, &near));
        assert!(!bounding_radius_check(&a, &far));
    }

    #[test]
    fn aabb_query_finds_overlapping_bodies() {
        let mut bodies = Arena::new();
        let a = insert(&mut bodies, circle_at(0.0, 0.0));
        insert(&mut bodies, circle_at(10.0, 0.0));

        let naive = NaiveBroadphase::default();
        let mut out = Vec::new();
        naive.aabb_query(
            &bodies,
            &Aabb::new(Vec2::splat(-1.0), Vec2::splat(1.0)),
            &mut out,
        );
        assert_eq!(out, vec![a]);
    }
}
