use std::collections::HashSet;

use planar_impulse::*;

/// Small deterministic generator so layouts are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / ((1u64 << 24) as f32)
    }

    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }
}

fn random_layout(count: usize, seed: u64) -> Arena<RigidBody> {
    let mut rng = Lcg(seed);
    let mut bodies = Arena::new();
    for i in 0..count {
        let shape = if i % 3 == 0 {
            Shape::circle(rng.range(0.2, 1.0))
        } else {
            Shape::rectangle(rng.range(0.2, 2.0), rng.range(0.2, 2.0))
        };
        let body = if i % 7 == 0 {
            RigidBody::fixed()
        } else {
            RigidBody::dynamic(1.0)
        };
        let body = body
            .with_shape(shape)
            .expect("valid shape")
            .with_position(Vec2::new(rng.range(-20.0, 20.0), rng.range(-20.0, 20.0)))
            .with_angle(rng.range(0.0, std::f32::consts::TAU));
        bodies.insert_with(|id| {
            let mut body = body;
            body.id = id;
            body.update_aabb();
            body
        });
    }
    bodies
}

fn pair_set(pairs: &[(EntityId, EntityId)]) -> HashSet<(EntityId, EntityId)> {
    pairs
        .iter()
        .map(|&(a, b)| TupleDictionary::<EntityId, ()>::key(a, b))
        .collect()
}

#[test]
fn sweep_and_prune_matches_naive_on_random_layouts() {
    for seed in [1, 7, 42, 1234] {
        let bodies = random_layout(120, seed);

        let mut naive = NaiveBroadphase::new(BoundingVolume::Aabb);
        let expected = pair_set(naive.collision_pairs(&bodies));
        assert!(!expected.is_empty(), "seed {seed} produced no overlaps");

        for axis in [0, 1] {
            let mut sap = SweepAndPruneBroadphase::new(BoundingVolume::Aabb);
            sap.set_axis_index(axis).expect("valid axis");
            sap.set_bodies(&bodies);
            let pairs = sap.collision_pairs(&bodies).to_vec();
            assert_eq!(pair_set(&pairs).len(), pairs.len(), "duplicate pairs");
            assert_eq!(pair_set(&pairs), expected, "seed {seed} axis {axis}");
        }
    }
}

#[test]
fn sweep_and_prune_follows_moving_bodies() {
    let mut bodies = random_layout(40, 99);
    let mut sap = SweepAndPruneBroadphase::new(BoundingVolume::Aabb);
    sap.set_bodies(&bodies);
    sap.collision_pairs(&bodies);

    for body in bodies.iter_mut() {
        body.position = -body.position;
        body.update_aabb();
    }

    let mut naive = NaiveBroadphase::new(BoundingVolume::Aabb);
    let expected = pair_set(naive.collision_pairs(&bodies));
    assert_eq!(pair_set(sap.collision_pairs(&bodies)), expected);
}

#[test]
fn static_kinematic_and_sleeping_pairs_are_gated() {
    let mut bodies = Arena::new();
    let mut add = |body: RigidBody| {
        bodies.insert_with(|id| {
            let mut body = body
                .with_shape(Shape::circle(1.0))
                .expect("valid shape");
            body.id = id;
            body.update_aabb();
            body
        })
    };

    let ground = add(RigidBody::fixed());
    let platform = add(RigidBody::kinematic());
    let mut sleeper = RigidBody::dynamic(1.0);
    sleeper.sleep_state = SleepState::Sleeping;
    let sleeper_a = add(sleeper.clone());
    let sleeper_b = add(sleeper);
    let awake = add(RigidBody::dynamic(1.0));

    let mut naive = NaiveBroadphase::new(BoundingVolume::BoundingCircle);
    let pairs = pair_set(naive.collision_pairs(&bodies));

    let key = TupleDictionary::<EntityId, ()>::key;
    assert!(!pairs.contains(&key(ground, platform)));
    assert!(!pairs.contains(&key(sleeper_a, sleeper_b)));
    assert!(!pairs.contains(&key(ground, sleeper_a)));
    assert!(pairs.contains(&key(platform, sleeper_a)));
    assert!(pairs.contains(&key(awake, sleeper_b)));
    assert!(pairs.contains(&key(ground, awake)));
}

#[test]
fn world_aabb_query_returns_overlapping_bodies() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let near = world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(0.5))
            .expect("valid shape"),
    );
    world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(0.5))
            .expect("valid shape")
            .with_position(Vec2::new(10.0, 0.0)),
    );

    let hits = world.aabb_query(&Aabb::new(Vec2::splat(-1.0), Vec2::splat(1.0)));
    assert_eq!(hits, vec![near]);
}
