//! Integration tests for the physics worker thread.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sleipnir::physics::{Engine, KinematicBackend, PhysicsThread, Shape, ThreadState};
use sleipnir::shared::math::Vec3;
use sleipnir::time::{TimeBase, TimeSystem, TimeWithPhysics, WorldTime};
use sleipnir::{BodyMemento, PhysicsError};

const TICK: Duration = Duration::from_millis(4);

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for physics");
        thread::sleep(Duration::from_millis(1));
    }
}

fn physics(world_time: &Arc<WorldTime>, gravity: Vec3) -> PhysicsThread<KinematicBackend> {
    PhysicsThread::new(
        Engine::new(KinematicBackend::new(gravity), 64),
        Arc::clone(world_time),
        TICK,
    )
}

fn catch_up(physics: &PhysicsThread<KinematicBackend>, world_time: &WorldTime, to: Duration) {
    world_time.set(to);
    wait_until(|| physics.current_time() + TICK >= to);
}

#[test]
fn test_spawned_body_appears_in_snapshot() {
    let world_time = Arc::new(WorldTime::default());
    let mut physics = physics(&world_time, Vec3::new(0.0, -9.81, 0.0));

    let mut batch = physics.clone_body_changes(0);
    let handle = batch.add(
        BodyMemento::new(Shape::Sphere { radius: 0.5 }).with_position(Vec3::new(0.0, 1.0, 0.0)),
    );
    batch.push(Duration::ZERO);

    physics.initialize().unwrap();
    physics.run().unwrap();
    catch_up(&physics, &world_time, Duration::from_millis(100));

    let section = physics.register_section();
    let positions = physics.body_positions(&section);
    assert_eq!(positions.time(), Duration::from_millis(96));
    let position = positions.get(handle).expect("body was integrated");
    assert!(position.y < 1.0, "gravity should pull the body down");
    assert_eq!(position.x, 0.0);

    drop(section);
    physics.join().unwrap();
    assert_eq!(physics.state(), ThreadState::Joined);
}

#[test]
fn test_delete_removes_body_from_snapshot() {
    let world_time = Arc::new(WorldTime::default());
    let mut physics = physics(&world_time, Vec3::ZERO);
    physics.initialize().unwrap();
    physics.run().unwrap();

    let mut batch = physics.clone_body_changes(0);
    let handle = batch.add(BodyMemento::new(Shape::Box {
        half_extents: Vec3::ONE,
    }));
    batch.push(Duration::ZERO);
    batch.delete(handle);
    batch.push(Duration::from_millis(20));

    let mut section = physics.register_section();
    catch_up(&physics, &world_time, Duration::from_millis(12));
    assert!(physics.body_positions(&section).get(handle).is_some());
    section.quiescent();

    catch_up(&physics, &world_time, Duration::from_millis(40));
    assert!(physics.body_positions(&section).get(handle).is_none());
}

#[test]
fn test_readers_never_see_time_go_backwards() {
    let world_time = Arc::new(WorldTime::default());
    let mut physics = physics(&world_time, Vec3::ZERO);

    let mut batch = physics.clone_body_changes(0);
    for i in 0..16 {
        batch.add(
            BodyMemento::new(Shape::Sphere { radius: 1.0 })
                .with_velocity(Vec3::new(1.0, 0.0, 0.0))
                .with_position(Vec3::new(0.0, i as f32, 0.0)),
        );
    }
    batch.push(Duration::ZERO);

    physics.initialize().unwrap();
    physics.run().unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut section = physics.register_section();
                let mut last = Duration::ZERO;
                for _ in 0..2_000 {
                    let positions = physics.body_positions(&section);
                    let time = positions.time();
                    assert!(time >= last);
                    assert!(positions.is_empty() || positions.len() == 16);
                    last = time;
                    section.quiescent();
                }
            });
        }

        let mut now = Duration::ZERO;
        for _ in 0..200 {
            now += TICK;
            world_time.set(now);
            thread::yield_now();
        }
    });

    catch_up(&physics, &world_time, TICK * 200);
    physics.join().unwrap();
    assert_eq!(physics.engine().unwrap().bodies().len(), 16);
}

#[test]
fn test_world_time_freezes_while_physics_lags() {
    let world_time = Arc::new(WorldTime::default());
    let physics = physics(&world_time, Vec3::ZERO);
    let mut time = TimeWithPhysics::new(
        TimeBase::new(Arc::clone(&world_time)),
        physics.clock(),
        TICK,
    );

    // The worker never runs, so physics time stays at zero.
    assert_eq!(time.update(TICK), TICK);
    assert_eq!(time.update(TICK), TICK);
    assert_eq!(time.update(TICK), Duration::ZERO);
    assert_eq!(time.update(TICK), Duration::ZERO);
    assert_eq!(world_time.now(), TICK * 2);
}

#[test]
fn test_time_resumes_after_physics_catches_up() {
    let world_time = Arc::new(WorldTime::default());
    let mut physics = physics(&world_time, Vec3::ZERO);
    let mut time = TimeWithPhysics::new(
        TimeBase::new(Arc::clone(&world_time)),
        physics.clock(),
        TICK,
    );

    world_time.set(Duration::from_millis(50));
    assert_eq!(time.update(TICK), Duration::ZERO);

    physics.initialize().unwrap();
    physics.run().unwrap();
    wait_until(|| time.lag() <= TICK);
    assert_eq!(time.update(TICK), TICK);
}

#[test]
fn test_drop_joins_running_worker() {
    let world_time = Arc::new(WorldTime::default());
    let mut physics = physics(&world_time, Vec3::ZERO);
    physics.initialize().unwrap();
    physics.run().unwrap();
    world_time.set(Duration::from_millis(8));
    drop(physics);
}

#[test]
fn test_shapeless_add_panics_worker_in_debug() {
    if !cfg!(debug_assertions) {
        return;
    }
    let world_time = Arc::new(WorldTime::default());
    let mut physics = physics(&world_time, Vec3::ZERO);
    let mut batch = physics.clone_body_changes(0);
    batch.add(BodyMemento::mass(1.0));
    batch.push(Duration::ZERO);

    physics.initialize().unwrap();
    physics.run().unwrap();
    world_time.set(Duration::from_millis(20));
    wait_until(|| physics.current_time() >= TICK);

    assert!(matches!(physics.join(), Err(PhysicsError::WorkerPanicked)));
    assert_eq!(physics.state(), ThreadState::Joined);
    assert!(physics.engine().is_none());
}
