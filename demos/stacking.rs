use planar_impulse::*;

fn main() -> PhysicsResult<()> {
    let config = WorldConfig {
        solver: SolverConfig {
            iterations: 20,
            friction_iterations: 5,
            ..SolverConfig::default()
        },
        sleep_mode: SleepMode::BodySleeping,
        ..WorldConfig::default()
    };
    let mut world = World::new(config)?;

    world.add_body(RigidBody::fixed().with_shape(Shape::plane())?);
    let boxes = (0..8)
        .map(|i| -> PhysicsResult<EntityId> {
            Ok(world.add_body(
                RigidBody::dynamic(1.0)
                    .with_shape(Shape::rectangle(1.0, 1.0))?
                    .with_position(Vec2::new(0.02 * i as f32, 0.5 + i as f32)),
            ))
        })
        .collect::<PhysicsResult<Vec<_>>>()?;

    for _ in 0..240 {
        world.step(1.0 / 60.0)?;
    }

    let profiler = world.profiler();
    println!(
        "{} contacts, {} friction rows, {} solver iterations",
        profiler.contact_count, profiler.friction_count, profiler.solver_iterations
    );
    for id in boxes {
        if let Some(body) = world.body(id) {
            println!(
                "box at ({:.3}, {:.3}) angle {:.4} {:?}",
                body.position.x, body.position.y, body.angle, body.sleep_state
            );
        }
    }
    Ok(())
}
