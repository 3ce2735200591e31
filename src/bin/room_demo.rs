//! Furnished-room demo: builds the reference scene, runs a short placement
//! optimization and prints progress.

use anyhow::Result;
use soundtrace::math::Vec3;
use soundtrace::{Optimizer, Room, Scene, SceneObject, SimulationParams, SoundWorld};

fn furnished_room() -> Scene {
    let room = Room::default();
    let (w, d, h, t) = (room.width, room.depth, room.height, room.wall_thickness);
    let mut scene = Scene::new(room);

    // Shell
    scene.add_object(SceneObject::cuboid(
        "Ground",
        Vec3::ZERO,
        Vec3::new(w / 2.0, t / 2.0, d / 2.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "BackWall",
        Vec3::new(0.0, h / 2.0, -d / 2.0),
        Vec3::new(w / 2.0, h / 2.0, t / 2.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "FrontWall",
        Vec3::new(0.0, h / 2.0, d / 2.0),
        Vec3::new(w / 2.0, h / 2.0, t / 2.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "LeftWall",
        Vec3::new(-w / 2.0, h / 2.0, 0.0),
        Vec3::new(t / 2.0, h / 2.0, d / 2.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "RightWall",
        Vec3::new(w / 2.0, h / 2.0, 0.0),
        Vec3::new(t / 2.0, h / 2.0, d / 2.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "Ceiling",
        Vec3::new(0.0, h + t / 2.0, 0.0),
        Vec3::new(w / 2.0, t / 2.0, d / 2.0),
    ));

    // Furniture
    scene.add_object(SceneObject::cuboid(
        "Bookshelf-Left",
        Vec3::new(-w / 2.0 + 5.0, 1.5, 0.0),
        Vec3::new(1.0, 1.5, 3.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "Bookshelf-Right",
        Vec3::new(w / 2.0 - 5.0, 1.5, 0.0),
        Vec3::new(1.0, 1.5, 3.0),
    ));
    scene.add_object(SceneObject::cuboid(
        "Bookshelf-Back",
        Vec3::new(0.0, 1.5, -d / 2.0 + 3.0),
        Vec3::new(3.0, 1.5, 0.75),
    ));
    scene.add_object(SceneObject::cuboid(
        "Table-Center",
        Vec3::new(0.0, 0.75, 0.0),
        Vec3::new(2.5, 0.1, 1.25),
    ));
    scene.add_object(SceneObject::cuboid(
        "Table-Side-Left",
        Vec3::new(-w / 4.0, 0.7, d / 3.0),
        Vec3::new(1.0, 0.1, 0.6),
    ));
    scene.add_object(SceneObject::cuboid(
        "Table-Side-Right",
        Vec3::new(w / 4.0, 0.7, -d / 3.0),
        Vec3::new(1.25, 0.1, 0.75),
    ));
    let pillar_height = h - 0.1;
    for (name, x, z, half) in [
        ("Pillar-FrontLeft", -w / 3.0, d / 3.0, 0.4),
        ("Pillar-FrontRight", w / 3.0, d / 3.0, 0.4),
        ("Pillar-BackLeft", -w / 3.0, -d / 3.0, 0.3),
        ("Pillar-BackRight", w / 3.0, -d / 3.0, 0.3),
    ] {
        scene.add_object(SceneObject::cuboid(
            name,
            Vec3::new(x, pillar_height / 2.0, z),
            Vec3::new(half, pillar_height / 2.0, half),
        ));
    }
    scene.add_object(SceneObject::cuboid(
        "Couch-Left",
        Vec3::new(-w / 2.0 + 4.0, 0.5, d / 3.0),
        Vec3::new(1.5, 0.5, 0.75),
    ));
    scene.add_object(SceneObject::cuboid(
        "Couch-Right",
        Vec3::new(w / 2.0 - 4.0, 0.5, -d / 3.0),
        Vec3::new(1.5, 0.5, 0.75),
    ));
    scene.add_object(SceneObject::sphere(
        "PlantLeaves",
        Vec3::new(-w / 2.0 + 1.5, 1.0, d / 2.0 - 1.5),
        0.7,
    ));
    scene.add_object(SceneObject::sphere(
        "LampShade",
        Vec3::new(w / 3.0, 1.8, 0.0),
        0.6,
    ));

    scene.add_source(SceneObject::sphere("SoundSource", Vec3::new(0.0, 1.5, 5.0), 0.3));
    scene.add_listener(SceneObject::sphere("Listener", Vec3::new(0.0, 1.5, -5.0), 0.25));
    scene
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let params = SimulationParams::default().max_iterations(200);
    let mut world = SoundWorld::new(furnished_room(), params)?;

    let initial = world.evaluate()?;
    println!(
        "initial score {} ({} segments traced)",
        initial.score,
        initial.segments.len()
    );

    let mut optimizer = Optimizer::new();
    while let Some(report) = optimizer.step(&mut world)? {
        if report.iteration % 20 == 0 {
            println!(
                "iteration {:>4}  score {:>6}  best {:>6}",
                report.iteration,
                report.score,
                report.best_score.unwrap_or(0)
            );
        }
    }

    if let Some(best) = optimizer.best().cloned() {
        world.apply_snapshot(&best)?;
        println!(
            "best score {} at iteration {}: source {:?}, listener {:?}",
            best.score, best.iteration, best.source_pos, best.listener_pos
        );
    }
    Ok(())
}
