use planar_impulse::*;

fn main() -> PhysicsResult<()> {
    let config = WorldConfig {
        gravity: Vec2::new(0.0, -10.0),
        sleep_mode: SleepMode::BodySleeping,
        ..WorldConfig::default()
    };
    let mut world = World::new(config)?;

    world.add_body(RigidBody::fixed().with_shape(Shape::plane())?);
    let ball = world.add_body(
        RigidBody::dynamic(1.0)
            .with_shape(Shape::circle(1.0))?
            .with_position(Vec2::new(0.0, 5.0)),
    );

    for frame in 0..300 {
        world.step(1.0 / 60.0)?;
        if frame % 30 == 0 {
            if let Some(body) = world.body(ball) {
                println!(
                    "t = {:.2}s  y = {:.3}  vy = {:.3}  {:?}",
                    world.time(),
                    body.position.y,
                    body.velocity.y,
                    body.sleep_state
                );
            }
        }
    }
    Ok(())
}
