use planar_impulse::*;

fn make_world() -> World {
    let config = WorldConfig {
        apply_gravity: false,
        ..WorldConfig::default()
    };
    World::new(config).expect("valid config")
}

fn add_wall(world: &mut World, x: f32) -> EntityId {
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::rectangle(0.1, 4.0))
            .expect("valid shape")
            .with_position(Vec2::new(x, 0.0)),
    )
}

fn add_bullet(world: &mut World, ccd: bool) -> EntityId {
    let body = RigidBody::dynamic(1.0)
        .with_shape(Shape::circle(0.1))
        .expect("valid shape")
        .with_velocity(Vec2::new(600.0, 0.0), 0.0)
        .with_damping(0.0, 0.0);
    let body = if ccd { body.with_ccd(1.0, 10) } else { body };
    world.add_body(body)
}

#[test]
fn fast_bullet_does_not_tunnel_through_wall() {
    let mut world = make_world();
    add_wall(&mut world, 5.0);
    let bullet = add_bullet(&mut world, true);

    for _ in 0..3 {
        world.internal_step(1.0 / 60.0).expect("step");
    }

    let body = world.body(bullet).expect("body exists");
    assert!(
        body.position.x < 5.0,
        "bullet passed the wall at x = {}",
        body.position.x
    );
}

#[test]
fn without_ccd_the_bullet_tunnels() {
    let mut world = make_world();
    add_wall(&mut world, 5.0);
    let bullet = add_bullet(&mut world, false);

    world.internal_step(1.0 / 60.0).expect("step");

    let body = world.body(bullet).expect("body exists");
    assert!(body.position.x > 5.0);
}

#[test]
fn ccd_ignores_disabled_pairs() {
    let mut world = make_world();
    let wall = add_wall(&mut world, 5.0);
    let bullet = add_bullet(&mut world, true);
    world.disable_body_collision(wall, bullet);

    world.internal_step(1.0 / 60.0).expect("step");

    let body = world.body(bullet).expect("body exists");
    assert!(body.position.x > 5.0);
}

#[test]
fn slow_bodies_skip_the_sweep() {
    let mut world = make_world();
    add_wall(&mut world, 5.0);
    let id = world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(0.1))
            .expect("valid shape")
            .with_velocity(Vec2::new(0.5, 0.0), 0.0)
            .with_damping(0.0, 0.0)
            .with_ccd(1.0, 10),
    );

    world.internal_step(1.0 / 60.0).expect("step");

    let body = world.body(id).expect("body exists");
    assert!(!ContinuousCollision::is_candidate(body));
    approx::assert_relative_eq!(body.position.x, 0.5 / 60.0, epsilon = 1e-6);
}

#[test]
fn bullet_keeps_its_motion_through_a_sensor() {
    let mut world = make_world();
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::rectangle(0.1, 4.0).as_sensor(true))
            .expect("valid shape")
            .with_position(Vec2::new(5.0, 0.0)),
    );
    let bullet = add_bullet(&mut world, true);

    world.internal_step(1.0 / 60.0).expect("step");

    let body = world.body(bullet).expect("body exists");
    approx::assert_relative_eq!(body.position.x, 10.0, epsilon = 1e-3);
}
