use planar_impulse::*;

fn main() -> PhysicsResult<()> {
    let mut world = World::new(WorldConfig::default())?;

    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::plane())?
            .with_position(Vec2::new(0.0, -2.0)),
    );
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::circle(1.0))?
            .with_position(Vec2::new(4.0, 0.0)),
    );
    world.add_body(
        RigidBody::fixed()
            .with_shape(Shape::capsule(2.0, 0.5))?
            .with_position(Vec2::new(8.0, 0.0))
            .with_angle(std::f32::consts::FRAC_PI_2),
    );

    let from = Vec2::new(-1.0, 0.0);
    let to = Vec2::new(12.0, -3.0);

    for mode in [RayMode::Closest, RayMode::Any, RayMode::All] {
        let ray = Ray::new(from, to).with_mode(mode);
        let mut result = RaycastResult::new();
        world.raycast(&ray, &mut result);

        println!("{mode:?}:");
        if mode == RayMode::All {
            for hit in &result.hits {
                println!(
                    "  body {:?} at {:?} normal {:?} distance {:.3}",
                    hit.body, hit.point, hit.normal, hit.distance
                );
            }
        } else if let Some(hit) = result.closest {
            println!(
                "  body {:?} at {:?} normal {:?} distance {:.3}",
                hit.body, hit.point, hit.normal, hit.distance
            );
        } else {
            println!("  no hit");
        }
    }

    let region = Aabb::new(Vec2::new(3.0, -1.0), Vec2::new(9.0, 1.0));
    println!("bodies in {region:?}: {:?}", world.aabb_query(&region));
    Ok(())
}
