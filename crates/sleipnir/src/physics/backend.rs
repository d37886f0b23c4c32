//! # Physics Backends
//!
//! The physics thread drives any [`PhysicsBackend`]. The backend owns the
//! stepping math; the thread owns timing, the ledger and the snapshot.
//!
//! [`KinematicBackend`] is the reference implementation: semi-implicit Euler
//! with gravity, damping, terminal velocity and contact against static planes.

use std::time::Duration;

use sleipnir_core::Instance;
use sleipnir_shared::math::Vec3;
use tracing::{debug, info};

use super::body::{BodyCollection, BodyMemento, BodyObject, Shape};
use crate::error::PhysicsResult;

/// Fastest a body may fall along gravity, in units per second.
pub const TERMINAL_VELOCITY: f32 = 200.0;

/// Simulation step contract.
pub trait PhysicsBackend: Send + 'static {
    /// Called once on the physics thread's owner before the worker starts.
    ///
    /// Scenery is recorded into `scenery`, a batch on the engine's ledger, so
    /// its handles come from the same allocator as every producer's. The
    /// engine integrates the batch right after this returns.
    ///
    /// # Errors
    ///
    /// Any error aborts initialization; the thread stays
    /// [`Created`](super::ThreadState::Created).
    fn initialize(&mut self, scenery: &mut Instance<BodyMemento>) -> PhysicsResult<()> {
        let _ = scenery;
        Ok(())
    }

    /// Advances every body by `tick`.
    fn step(&mut self, tick: Duration, bodies: &mut BodyCollection);
}

/// Gravity-and-planes integrator.
#[derive(Debug, Clone)]
pub struct KinematicBackend {
    gravity: Vec3,
    ground: Option<(Vec3, f32)>,
    planes: Vec<(Vec3, f32)>,
}

impl KinematicBackend {
    /// Creates a backend pulling every dynamic body along `gravity`.
    #[must_use]
    pub const fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ground: None,
            planes: Vec::new(),
        }
    }

    /// Adds a static ground plane `normal · p = offset` at initialization.
    #[must_use]
    pub fn with_ground_plane(mut self, normal: Vec3, offset: f32) -> Self {
        self.ground = Some((normal, offset));
        self
    }

    /// Gravity applied to dynamic bodies.
    #[inline]
    #[must_use]
    pub const fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn integrate(&self, body: &mut BodyObject, dt: f32) {
        let acceleration = body.linear.force * (1.0 / body.mass) + self.gravity;
        let retained = (1.0 - body.damping).clamp(0.0, 1.0).powf(dt);

        let linear = &mut body.linear;
        linear.velocity += acceleration * dt;
        linear.velocity *= retained;
        clamp_fall_speed(&mut linear.velocity, self.gravity);
        linear.position += linear.velocity * dt;
        linear.force = Vec3::ZERO;

        let inertia = body.shape.inertia(body.mass);
        let angular = &mut body.angular;
        if inertia.is_finite() && inertia > 0.0 {
            angular.velocity += angular.torque * (dt / inertia);
        }
        angular.velocity *= retained;
        angular.orientation = angular.orientation.integrate(angular.velocity, dt);
        angular.torque = Vec3::ZERO;
    }

    fn resolve_contacts(&self, body: &mut BodyObject) {
        for &(normal, offset) in &self.planes {
            let reach = match body.shape {
                Shape::Sphere { radius } => radius,
                Shape::Box { half_extents } => {
                    (half_extents.x * normal.x).abs()
                        + (half_extents.y * normal.y).abs()
                        + (half_extents.z * normal.z).abs()
                }
                Shape::Plane { .. } => continue,
            };
            let depth = body.linear.position.dot(normal) - offset - reach;
            if depth < 0.0 {
                body.linear.position += normal * -depth;
                let approach = body.linear.velocity.dot(normal);
                if approach < 0.0 {
                    body.linear.velocity += normal * -approach;
                }
            }
        }
    }
}

impl Default for KinematicBackend {
    fn default() -> Self {
        Self::new(Vec3::from_array(sleipnir_shared::constants::DEFAULT_GRAVITY))
    }
}

fn clamp_fall_speed(velocity: &mut Vec3, gravity: Vec3) {
    let g = gravity.length();
    if g <= f32::EPSILON {
        return;
    }
    let down = gravity * (1.0 / g);
    let fall = velocity.dot(down);
    if fall > TERMINAL_VELOCITY {
        *velocity += down * (TERMINAL_VELOCITY - fall);
    }
}

impl PhysicsBackend for KinematicBackend {
    fn initialize(&mut self, scenery: &mut Instance<BodyMemento>) -> PhysicsResult<()> {
        if let Some((normal, offset)) = self.ground {
            scenery.add(
                BodyMemento::new(Shape::Plane { normal, offset }).with_mass(f32::INFINITY),
            );
        }
        info!(
            ground = self.ground.is_some(),
            gravity = ?self.gravity,
            "kinematic backend initialized"
        );
        Ok(())
    }

    fn step(&mut self, tick: Duration, bodies: &mut BodyCollection) {
        let dt = tick.as_secs_f32();

        self.planes.clear();
        self.planes.extend(bodies.iter().filter_map(|body| match body.shape {
            Shape::Plane { normal, offset } if body.is_static() => Some((normal, offset)),
            _ => None,
        }));

        let mut moved = 0_usize;
        for body in bodies.iter_mut().filter(|body| !body.is_static()) {
            self.integrate(body, dt);
            self.resolve_contacts(body);
            moved += 1;
        }
        if moved > 0 {
            debug!(moved, planes = self.planes.len(), "step");
        }
    }
}
