use approx::assert_relative_eq;
use planar_impulse::*;

fn make_world(config: WorldConfig) -> World {
    World::new(config).expect("valid config")
}

fn add_ground(world: &mut World) -> EntityId {
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::plane())
            .expect("valid shape"),
    )
}

#[test]
fn box_settles_on_ground_with_non_negative_impulses() {
    let mut world = make_world(WorldConfig::default());
    add_ground(&mut world);
    let crate_id = world.add_body(
        RigidBody::dynamic(2.0)
            .with_shape(Shape::rectangle(1.0, 1.0))
            .expect("valid shape")
            .with_position(Vec2::new(0.0, 1.0)),
    );

    for _ in 0..180 {
        world.internal_step(1.0 / 60.0).expect("step");
        for contact in world.contact_equations() {
            assert!(contact.equation.multiplier >= 0.0);
        }
    }

    let body = world.body(crate_id).expect("body exists");
    assert_relative_eq!(body.position.y, 0.5, epsilon = 0.02);
    assert!(body.velocity.length() < 0.05);
    assert!(body.angle.abs() < 0.01);
    assert_eq!(world.contact_equations().len(), 2);
}

#[test]
fn friction_brings_a_sliding_box_to_rest() {
    let mut world = make_world(WorldConfig::default());
    add_ground(&mut world);
    let slider = world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::rectangle(1.0, 1.0))
            .expect("valid shape")
            .with_position(Vec2::new(0.0, 0.5))
            .with_velocity(Vec2::new(2.0, 0.0), 0.0)
            .with_damping(0.0, 0.0),
    );

    for _ in 0..120 {
        world.internal_step(1.0 / 60.0).expect("step");
    }

    let body = world.body(slider).expect("body exists");
    assert!(body.velocity.x.abs() < 0.05, "still sliding: {:?}", body.velocity);
    // μg ≈ 2.93 m/s² stops a 2 m/s box after roughly 0.68 m.
    assert!(body.position.x > 0.4 && body.position.x < 1.0);
}

#[test]
fn frictionless_world_keeps_sliding() {
    let config = WorldConfig {
        enable_friction: false,
        ..WorldConfig::default()
    };
    let mut world = make_world(config);
    add_ground(&mut world);
    let slider = world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::rectangle(1.0, 1.0))
            .expect("valid shape")
            .with_position(Vec2::new(0.0, 0.5))
            .with_velocity(Vec2::new(2.0, 0.0), 0.0)
            .with_damping(0.0, 0.0),
    );

    for _ in 0..60 {
        world.internal_step(1.0 / 60.0).expect("step");
    }

    assert!(world.friction_equations().is_empty());
    let body = world.body(slider).expect("body exists");
    assert_relative_eq!(body.velocity.x, 2.0, epsilon = 1e-3);
}

#[test]
fn friction_prepass_keeps_stack_upright() {
    let config = WorldConfig {
        solver: SolverConfig {
            friction_iterations: 5,
            iterations: 20,
            ..SolverConfig::default()
        },
        ..WorldConfig::default()
    };
    let mut world = make_world(config);
    add_ground(&mut world);
    let boxes: Vec<EntityId> = (0..3)
        .map(|i| {
            world.add_body(
                RigidBody::dynamic(1.0)
                    .with_shape(Shape::rectangle(1.0, 1.0))
                    .expect("valid shape")
                    .with_position(Vec2::new(0.0, 0.5 + i as f32)),
            )
        })
        .collect();

    for _ in 0..240 {
        world.internal_step(1.0 / 60.0).expect("step");
    }

    for (i, id) in boxes.iter().enumerate() {
        let body = world.body(*id).expect("body exists");
        assert!(body.position.x.abs() < 0.05);
        assert_relative_eq!(body.position.y, 0.5 + i as f32, epsilon = 0.05);
    }
    for friction in world.friction_equations() {
        assert!(friction.slip_force() < f32::MAX);
    }
}

#[test]
fn solver_reports_iterations_used() {
    let mut world = make_world(WorldConfig::default());
    add_ground(&mut world);
    world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(0.5))
            .expect("valid shape")
            .with_position(Vec2::new(0.0, 0.49)),
    );
    world.internal_step(1.0 / 60.0).expect("step");

    assert!(world.solver.used_iterations >= 1);
    assert!(world.solver.used_iterations <= world.solver.config.iterations);
    assert_eq!(
        world.profiler().solver_iterations,
        world.solver.used_iterations as usize
    );
}
