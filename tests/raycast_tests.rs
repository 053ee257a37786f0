use approx::assert_relative_eq;
use planar_impulse::*;

/// Three unit-diameter circles on the x axis at x = 2, 5 and 8.
fn make_world() -> (World, Vec<EntityId>) {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    let ids = [2.0, 5.0, 8.0]
        .into_iter()
        .enumerate()
        .map(|(i, x)| {
            world.add_body(
                RigidBody::fixed()
                    .with_shape(Shape::circle(0.5).with_collision_filter(1 << i, u32::MAX))
                    .expect("valid shape")
                    .with_position(Vec2::new(x, 0.0)),
            )
        })
        .collect();
    (world, ids)
}

fn cast(world: &mut World, ray: Ray) -> RaycastResult {
    let mut result = RaycastResult::new();
    world.raycast(&ray, &mut result);
    result
}

#[test]
fn closest_mode_reports_the_nearest_front_face() {
    let (mut world, ids) = make_world();
    let result = cast(&mut world, Ray::new(Vec2::ZERO, Vec2::new(10.0, 0.0)));

    let hit = result.closest.expect("ray crosses three circles");
    assert_eq!(hit.body, ids[0]);
    assert_eq!(hit.shape.index, 0);
    assert_relative_eq!(hit.point.x, 1.5, epsilon = 1e-5);
    assert_relative_eq!(hit.distance, 1.5, epsilon = 1e-5);
    assert_relative_eq!(hit.fraction, 0.15, epsilon = 1e-5);
    assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    assert!(result.hits.is_empty());
}

#[test]
fn all_mode_collects_every_crossing_sorted_by_distance() {
    let (mut world, ids) = make_world();
    let ray = Ray::new(Vec2::new(10.0, 0.0), Vec2::ZERO).with_mode(RayMode::All);
    let result = cast(&mut world, ray);

    // Each circle is entered and left once.
    assert_eq!(result.hits.len(), 6);
    for pair in result.hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    assert_eq!(result.hits[0].body, ids[2]);
    assert_relative_eq!(result.hits[0].point.x, 8.5, epsilon = 1e-5);
    assert_eq!(result.closest.map(|hit| hit.body), Some(ids[2]));
}

#[test]
fn skip_backfaces_drops_exit_points() {
    let (mut world, _) = make_world();
    let ray = Ray::new(Vec2::ZERO, Vec2::new(10.0, 0.0))
        .with_mode(RayMode::All)
        .with_skip_backfaces(true);
    let result = cast(&mut world, ray);

    assert_eq!(result.hits.len(), 3);
    for hit in &result.hits {
        assert!(hit.normal.dot(Vec2::X) < 0.0);
    }
}

#[test]
fn any_mode_stops_after_first_hit() {
    let (mut world, _) = make_world();
    let ray = Ray::new(Vec2::ZERO, Vec2::new(10.0, 0.0)).with_mode(RayMode::Any);
    let result = cast(&mut world, ray);

    assert!(result.has_hit());
    assert!(result.is_stopped());
    assert!(result.hits.is_empty());
}

#[test]
fn collision_filter_hides_masked_shapes() {
    let (mut world, ids) = make_world();
    let ray = Ray::new(Vec2::ZERO, Vec2::new(10.0, 0.0)).with_collision_filter(u32::MAX, 0b010);
    let result = cast(&mut world, ray);
    assert_eq!(result.closest.map(|hit| hit.body), Some(ids[1]));

    let blind = Ray::new(Vec2::ZERO, Vec2::new(10.0, 0.0)).with_collision_filter(u32::MAX, 0);
    assert!(!cast(&mut world, blind).has_hit());
}

#[test]
fn shapes_without_collision_response_are_optional_targets() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::rectangle(1.0, 1.0).with_collision_response(false))
            .expect("valid shape")
            .with_position(Vec2::new(3.0, 0.0)),
    );

    let mut ray = Ray::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
    assert!(!cast(&mut world, ray.clone()).has_hit());

    ray.check_collision_response = false;
    let hit = cast(&mut world, ray).closest.expect("ghost box is hit");
    assert_relative_eq!(hit.point.x, 2.5, epsilon = 1e-5);
    assert!(hit.face_index.is_some());
}

#[test]
fn ray_hits_ground_plane_and_heightfield() {
    let mut world = World::new(WorldConfig::default()).expect("valid config");
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::plane())
            .expect("valid shape")
            .with_position(Vec2::new(0.0, -1.0)),
    );
    let hill = world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::heightfield(vec![0.0, 1.0, 0.0], 1.0).expect("valid field"))
            .expect("valid shape")
            .with_position(Vec2::new(10.0, 0.0)),
    );

    let down = cast(&mut world, Ray::new(Vec2::new(0.0, 5.0), Vec2::new(0.0, -5.0)));
    let hit = down.closest.expect("plane is below");
    assert_relative_eq!(hit.point.y, -1.0, epsilon = 1e-5);
    assert_relative_eq!(hit.normal.y, 1.0, epsilon = 1e-5);

    let onto_hill = cast(&mut world, Ray::new(Vec2::new(10.5, 5.0), Vec2::new(10.5, 0.0)));
    let hit = onto_hill.closest.expect("heightfield slope is below");
    assert_eq!(hit.body, hill);
    assert_relative_eq!(hit.point.y, 0.5, epsilon = 1e-4);
    assert_eq!(hit.face_index, Some(0));
}
