//! # Rigid Bodies
//!
//! The physics-thread view of a body, the memento that describes changes to
//! it, and the handle-keyed collection the integrator applies changes to.

use std::collections::HashMap;
use std::ops::{Add, Mul};
use std::time::Duration;

use sleipnir_core::{Changes, Collection, Combinable, Memento, SlotHandle, SlotPool};
use sleipnir_shared::math::{Quaternion, Vec3};
use tracing::trace;

use crate::error::PhysicsError;

/// Handle naming a body across threads.
pub type BodyHandle = SlotHandle;

/// Change ledger carrying body mementos.
pub type BodyChanges = Changes<BodyMemento>;

// =============================================================================
// MOTION
// =============================================================================

/// Collision shape. Fixed once the body is spawned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    /// Infinite plane `normal . p = offset`.
    Plane {
        /// Unit normal.
        normal: Vec3,
        /// Distance from the origin along `normal`.
        offset: f32,
    },
    /// Axis-aligned box.
    Box {
        /// Half size along each axis.
        half_extents: Vec3,
    },
    /// Sphere centred on the body position.
    Sphere {
        /// Radius.
        radius: f32,
    },
}

impl Shape {
    /// Scalar moment of inertia for `mass`, or infinity for planes.
    #[must_use]
    pub fn inertia(&self, mass: f32) -> f32 {
        match *self {
            Self::Plane { .. } => f32::INFINITY,
            Self::Box { half_extents } => {
                let size = half_extents * 2.0;
                mass * size.length_squared() / 18.0
            }
            Self::Sphere { radius } => 0.4 * mass * radius * radius,
        }
    }
}

/// Translational state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinearMotion {
    /// Position in world units.
    pub position: Vec3,
    /// Velocity in units per second.
    pub velocity: Vec3,
    /// Force accumulated for the next step. Cleared after every step.
    pub force: Vec3,
}

impl Add for LinearMotion {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            position: self.position + rhs.position,
            velocity: self.velocity + rhs.velocity,
            force: self.force + rhs.force,
        }
    }
}

impl Mul for LinearMotion {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self {
            position: self.position * rhs.position,
            velocity: self.velocity * rhs.velocity,
            force: self.force * rhs.force,
        }
    }
}

/// Rotational state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AngularMotion {
    /// Orientation.
    pub orientation: Quaternion,
    /// Angular velocity in radians per second.
    pub velocity: Vec3,
    /// Torque accumulated for the next step. Cleared after every step.
    pub torque: Vec3,
}

impl AngularMotion {
    /// Motion that contributes nothing under [`Combine::Add`](sleipnir_core::Combine::Add).
    pub const ZERO: Self = Self {
        orientation: Quaternion::new(0.0, 0.0, 0.0, 0.0),
        velocity: Vec3::ZERO,
        torque: Vec3::ZERO,
    };
}

/// Orientations are summed and renormalized.
impl Add for AngularMotion {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            orientation: (self.orientation + rhs.orientation).normalized(),
            velocity: self.velocity + rhs.velocity,
            torque: self.torque + rhs.torque,
        }
    }
}

/// Orientations are composed.
impl Mul for AngularMotion {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self {
            orientation: (self.orientation * rhs.orientation).normalized(),
            velocity: self.velocity * rhs.velocity,
            torque: self.torque * rhs.torque,
        }
    }
}

// =============================================================================
// MEMENTO
// =============================================================================

/// A partial body description. Unset fields are left alone.
///
/// As an Add it must carry a shape; missing mass defaults to `1.0` and
/// missing damping to `0.0`. As a Modify the shape is ignored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodyMemento {
    /// Collision shape.
    pub shape: Option<Shape>,
    /// Translational state.
    pub linear: Option<LinearMotion>,
    /// Rotational state.
    pub angular: Option<AngularMotion>,
    /// Mass. `f32::INFINITY` makes the body static.
    pub mass: Option<f32>,
    /// Fraction of velocity lost per second, in `[0, 1]`.
    pub damping: Option<f32>,
}

impl Memento for BodyMemento {
    type Handle = BodyHandle;
}

impl BodyMemento {
    /// A memento describing a new body of `shape`.
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    /// Sets the position, leaving velocity and force zero.
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        let linear = self.linear.get_or_insert_with(LinearMotion::default);
        linear.position = position;
        self
    }

    /// Sets the velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        let linear = self.linear.get_or_insert_with(LinearMotion::default);
        linear.velocity = velocity;
        self
    }

    /// Sets the full translational state.
    #[must_use]
    pub const fn with_linear(mut self, linear: LinearMotion) -> Self {
        self.linear = Some(linear);
        self
    }

    /// Sets the full rotational state.
    #[must_use]
    pub const fn with_angular(mut self, angular: AngularMotion) -> Self {
        self.angular = Some(angular);
        self
    }

    /// Sets the mass.
    #[must_use]
    pub const fn with_mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Sets the damping.
    #[must_use]
    pub const fn with_damping(mut self, damping: f32) -> Self {
        self.damping = Some(damping);
        self
    }

    /// A Modify payload that adds `force` to the next step.
    #[must_use]
    pub fn force(force: Vec3) -> Self {
        Self {
            linear: Some(LinearMotion {
                force,
                ..LinearMotion::default()
            }),
            ..Self::default()
        }
    }

    /// A Modify payload that adds `mass`.
    #[must_use]
    pub fn mass(mass: f32) -> Self {
        Self::default().with_mass(mass)
    }
}

// =============================================================================
// BODY
// =============================================================================

/// A live body owned by the physics thread.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyObject {
    /// Handle the body was added under.
    pub handle: BodyHandle,
    /// Collision shape.
    pub shape: Shape,
    /// Translational state.
    pub linear: LinearMotion,
    /// Rotational state.
    pub angular: AngularMotion,
    /// Mass. Infinite for static bodies.
    pub mass: f32,
    /// Fraction of velocity lost per second.
    pub damping: f32,
}

impl BodyObject {
    /// Builds a body from its Add memento.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::MissingShape`] if the memento has no shape.
    pub fn from_memento(handle: BodyHandle, memento: BodyMemento) -> Result<Self, PhysicsError> {
        let shape = memento.shape.ok_or(PhysicsError::MissingShape(handle))?;
        Ok(Self {
            handle,
            shape,
            linear: memento.linear.unwrap_or_default(),
            angular: memento.angular.unwrap_or_default(),
            mass: memento.mass.unwrap_or(1.0),
            damping: memento.damping.unwrap_or(0.0),
        })
    }

    /// True for bodies that never move: infinite mass, or a mass that is not
    /// a positive number.
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        !(self.mass.is_finite() && self.mass > 0.0)
    }
}

impl Combinable<BodyMemento> for BodyObject {
    fn add_memento(&mut self, memento: &BodyMemento) {
        if memento.shape.is_some() {
            trace!(handle = %self.handle, "shape in a modify is ignored");
        }
        if let Some(linear) = memento.linear {
            self.linear = self.linear + linear;
        }
        if let Some(angular) = memento.angular {
            self.angular = self.angular + angular;
        }
        if let Some(mass) = memento.mass {
            // Infinite mass is absorbing.
            if !self.mass.is_infinite() {
                self.mass += mass;
            }
        }
        if let Some(damping) = memento.damping {
            debug_assert!(!damping.is_nan(), "NaN damping");
            self.damping += damping;
        }
    }

    fn multiply_memento(&mut self, memento: &BodyMemento) {
        if memento.shape.is_some() {
            trace!(handle = %self.handle, "shape in a modify is ignored");
        }
        if let Some(linear) = memento.linear {
            self.linear = self.linear * linear;
        }
        if let Some(angular) = memento.angular {
            self.angular = self.angular * angular;
        }
        if let Some(mass) = memento.mass {
            if !self.mass.is_infinite() {
                self.mass *= mass;
            }
        }
        if let Some(damping) = memento.damping {
            debug_assert!(!damping.is_nan(), "NaN damping");
            self.damping *= damping;
        }
    }
}

// =============================================================================
// COLLECTION
// =============================================================================

/// Every body the physics thread simulates.
#[derive(Debug, Default)]
pub struct BodyCollection {
    bodies: SlotPool<BodyObject>,
}

impl BodyCollection {
    /// Creates an empty collection sized for `capacity` bodies.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bodies: SlotPool::with_capacity(capacity),
        }
    }

    /// Number of live bodies.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True when no body is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Looks up a body.
    #[must_use]
    pub fn get(&self, handle: BodyHandle) -> Option<&BodyObject> {
        self.bodies.get(handle)
    }

    /// Iterates over live bodies.
    pub fn iter(&self) -> impl Iterator<Item = &BodyObject> {
        self.bodies.iter().map(|(_, body)| body)
    }

    /// Iterates mutably over live bodies.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BodyObject> {
        self.bodies.iter_mut().map(|(_, body)| body)
    }

    /// Positions of every live body at simulated time `time`.
    #[must_use]
    pub fn snapshot(&self, time: Duration) -> BodyPositions {
        BodyPositions {
            time,
            positions: self
                .bodies
                .iter()
                .map(|(handle, body)| (handle, body.linear.position))
                .collect(),
        }
    }
}

impl Collection<BodyMemento> for BodyCollection {
    type Object = BodyObject;
    type Error = PhysicsError;

    fn spawn(&mut self, handle: BodyHandle, memento: BodyMemento) -> Result<(), PhysicsError> {
        let body = BodyObject::from_memento(handle, memento)?;
        self.bodies.insert(handle, body)?;
        Ok(())
    }

    fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut BodyObject> {
        self.bodies.get_mut(handle)
    }

    fn delete(&mut self, handle: BodyHandle) -> bool {
        self.bodies.remove(handle).is_some()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Body positions as of one physics step. Published to the game thread.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BodyPositions {
    time: Duration,
    positions: HashMap<BodyHandle, Vec3>,
}

impl BodyPositions {
    /// Simulated time the snapshot was taken at.
    #[inline]
    #[must_use]
    pub const fn time(&self) -> Duration {
        self.time
    }

    /// Position of `handle`, if it was live.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: BodyHandle) -> Option<Vec3> {
        self.positions.get(&handle).copied()
    }

    /// Number of bodies in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True for an empty snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterates over `(handle, position)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, Vec3)> + '_ {
        self.positions.iter().map(|(&handle, &position)| (handle, position))
    }
}
