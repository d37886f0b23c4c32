//! Integration tests for the game loop with a live physics thread.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sleipnir::core::{Control, Instance, Lifetime, PhysicsBody, Position, SlotHandle, Timer};
use sleipnir::physics::BodyCollection;
use sleipnir::shared::math::Vec3;
use sleipnir::shared::EngineConfig;
use sleipnir::{
    BodyMemento, GameLoop, KinematicBackend, PhysicsBackend, PhysicsError, PhysicsResult, Shape,
    TimerSystem,
};

const FRAME: Duration = Duration::from_millis(4);

fn config() -> EngineConfig {
    EngineConfig {
        gravity: [0.0; 3],
        entity_capacity: 32,
        max_physics_objects: 32,
        ..EngineConfig::default()
    }
}

fn game_loop() -> GameLoop {
    let config = config();
    let backend = KinematicBackend::new(config.gravity());
    let mut game_loop = GameLoop::new(config).unwrap();
    game_loop.attach_physics(backend).unwrap();
    game_loop.attach_lifetime();
    game_loop
}

struct BrokenBackend;

impl PhysicsBackend for BrokenBackend {
    fn initialize(&mut self, _scenery: &mut Instance<BodyMemento>) -> PhysicsResult<()> {
        Err(PhysicsError::MissingShape(SlotHandle::UNKNOWN))
    }

    fn step(&mut self, _tick: Duration, _bodies: &mut BodyCollection) {}
}

/// Runs frames until `done` holds, sleeping between frames so the worker
/// keeps up.
fn run_until(game_loop: &mut GameLoop, mut done: impl FnMut(&GameLoop) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done(game_loop) {
        assert!(Instant::now() < deadline, "timed out running frames");
        game_loop.run_frame(FRAME);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_attach_physics_twice_fails() {
    let config = config();
    let result = game_loop().attach_physics(KinematicBackend::new(config.gravity()));
    assert!(matches!(result, Err(PhysicsError::AlreadyAttached)));
}

#[test]
fn test_failed_physics_start_keeps_loop_usable() {
    let mut game_loop = GameLoop::new(config()).unwrap();
    let id = game_loop.world_mut().spawn();

    let result = game_loop.attach_physics(BrokenBackend);
    assert!(matches!(result, Err(PhysicsError::MissingShape(_))));
    assert!(game_loop.physics_time().is_none());
    assert!(game_loop.world().is_alive(id));

    game_loop.run_frame(FRAME);
    assert_eq!(game_loop.now(), FRAME);

    game_loop
        .attach_physics(KinematicBackend::new(Vec3::ZERO))
        .unwrap();
    run_until(&mut game_loop, |game_loop| {
        game_loop.physics_time().is_some_and(|time| time > Duration::ZERO)
    });
}

#[test]
fn test_ground_plane_scenery_coexists_with_spawned_bodies() {
    let mut game_loop = GameLoop::new(config()).unwrap();
    game_loop
        .attach_physics(
            KinematicBackend::new(Vec3::new(0.0, -9.81, 0.0)).with_ground_plane(Vec3::Y, 0.0),
        )
        .unwrap();

    let mut batch = game_loop.clone_body_changes(0).unwrap();
    let handle = batch.add(BodyMemento::new(Shape::Sphere { radius: 0.5 }).with_position(Vec3::Y));
    batch.push(Duration::ZERO);

    let entity = game_loop.world_mut().spawn();
    game_loop.world_mut().insert(entity, Position::default());
    game_loop.world_mut().insert(entity, PhysicsBody::new(handle));

    run_until(&mut game_loop, |game_loop| {
        game_loop.now() >= Duration::from_millis(400)
    });
    let y = game_loop.world().get::<Position>(entity).unwrap().value.y;
    assert!((0.5 - 1e-3..0.6).contains(&y), "ball should rest on the ground, y = {y}");
}

#[test]
fn test_timers_run_in_game_loop() {
    let mut game_loop = game_loop();
    let ticks = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&ticks);
    let timers = TimerSystem::new(Arc::clone(game_loop.world_time()))
        .on_tick(move |_, _| counter.set(counter.get() + 1))
        .on_timeout(|world, id| {
            world.despawn(id);
        });
    game_loop.attach_timers(timers);

    let id = game_loop.world_mut().spawn();
    game_loop
        .world_mut()
        .insert(id, Timer::new(0, 8_000, 42_000));

    run_until(&mut game_loop, |game_loop| !game_loop.world().is_alive(id));
    assert_eq!(ticks.get(), 5);
    assert!(game_loop.now() >= Duration::from_millis(42));
}

#[test]
fn test_world_time_tracks_physics() {
    let mut game_loop = game_loop();
    run_until(&mut game_loop, |game_loop| {
        game_loop.now() >= Duration::from_millis(40)
    });

    let physics = game_loop.physics_time().unwrap();
    assert!(game_loop.now().saturating_sub(physics) <= FRAME * 2);
    game_loop.shutdown();
    assert!(game_loop.physics_time().is_none());
}

#[test]
fn test_control_force_moves_entity() {
    let mut game_loop = game_loop();

    let mut batch = game_loop.clone_body_changes(0).unwrap();
    let handle = batch.add(BodyMemento::new(Shape::Sphere { radius: 0.5 }).with_mass(1.0));
    batch.push(game_loop.now());

    let world = game_loop.world_mut();
    let entity = world.spawn();
    world.insert(entity, Position::default());
    world.insert(entity, PhysicsBody::new(handle));
    world.insert(
        entity,
        Control {
            force: Vec3::new(1_000.0, 0.0, 0.0),
        },
    );

    game_loop.run_frame(FRAME);
    assert!(!game_loop.world().has::<Control>(entity));

    run_until(&mut game_loop, |game_loop| {
        game_loop
            .world()
            .get::<Position>(entity)
            .is_some_and(|position| position.value.x > 0.0)
    });
    let position = game_loop.world().get::<Position>(entity).unwrap().value;
    assert_eq!(position.y, 0.0);
    assert_eq!(position.z, 0.0);
}

#[test]
fn test_expired_entity_releases_body() {
    let mut game_loop = game_loop();

    let mut batch = game_loop.clone_body_changes(0).unwrap();
    let handle = batch.add(BodyMemento::new(Shape::Sphere { radius: 0.5 }).with_position(Vec3::Y));
    batch.push(Duration::ZERO);

    let world = game_loop.world_mut();
    let doomed = world.spawn();
    world.insert(doomed, PhysicsBody::new(handle));
    world.insert(doomed, Lifetime { deadline_micros: 20_000 });

    let watcher = world.spawn();
    world.insert(watcher, Position::default());
    world.insert(watcher, PhysicsBody::new(handle));

    // The watcher sees the body once physics has integrated the add.
    run_until(&mut game_loop, |game_loop| {
        game_loop.world().get::<Position>(watcher).map(|p| p.value) == Some(Vec3::Y)
    });

    run_until(&mut game_loop, |game_loop| {
        game_loop
            .physics_time()
            .is_some_and(|time| time >= Duration::from_millis(40))
    });
    assert!(!game_loop.world().is_alive(doomed));

    // The body is gone, so the watcher keeps its last synced position.
    game_loop
        .world_mut()
        .get_mut::<Position>(watcher)
        .unwrap()
        .value = Vec3::ZERO;
    game_loop.run_frame(FRAME);
    assert_eq!(
        game_loop.world().get::<Position>(watcher).unwrap().value,
        Vec3::ZERO
    );
}
