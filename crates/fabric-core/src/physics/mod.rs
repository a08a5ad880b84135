//! The integrator.
//!
//! Each pass advances the fabric clock by one tick:
//!
//! 1. Advance every span schedule, compute elastic stress and mass, and
//!    retire temporary intervals whose schedule has finished.
//! 2. Smooth velocities along each interval's axis.
//! 3. Per joint: apply the environment, convert force into velocity, and fold
//!    in the smoothing correction.
//! 4. Share the gravity each joint recorded along its intervals, blending
//!    across the ground plane.
//! 5. Move joints and reset their mass to the ambient baseline.
//!
//! Temporary and eliminated joints are carried along but never integrated.

pub mod elimination;
pub mod environment;
pub mod values;

use crate::fabric::{Fabric, FabricError};
use crate::id::IntervalId;
use crate::interval::Role;
use crate::transform::{PhysicsTransformation, Transformation};
use environment::Environment;
use glam::DVec3;
use values::{PhysicsConfig, PhysicsParam, PhysicsValues};

/// Mass every joint starts each iteration with.
pub const AMBIENT_JOINT_MASS: f64 = 0.1;

/// Mass per unit length contributed by intervals that cannot push.
pub const CABLE_MASS_FACTOR: f64 = 0.05;

/// Ticks over which a merged interval settles on its averaged length.
pub const INTERVAL_MERGE_ITERATIONS: u32 = 50;

pub struct Physics {
    values: PhysicsValues,
    environment: Box<dyn Environment>,
    iterations: u32,
}

impl std::fmt::Debug for Physics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Physics")
            .field("values", &self.values)
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl Physics {
    pub fn new(environment: impl Environment + 'static) -> Self {
        Self::with_config(environment, &PhysicsConfig::default())
    }

    pub fn with_config(environment: impl Environment + 'static, config: &PhysicsConfig) -> Self {
        Self {
            values: PhysicsValues::from_config(config),
            environment: Box::new(environment),
            iterations: config.iterations.max(1),
        }
    }

    pub fn values(&self) -> &PhysicsValues {
        &self.values
    }

    /// Stage a parameter change for the next iteration.
    pub fn set(&mut self, param: PhysicsParam, value: f64) {
        self.values.set(param, value);
    }

    fn iterate(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        self.values.latch();
        let elastic_factor = self.values.get(PhysicsParam::ElasticFactor);
        let age = fabric.advance_age();

        let intervals: Vec<IntervalId> = fabric.intervals.clone();
        let mut any_span_active = false;
        for &id in &intervals {
            if fabric.require_interval_mut(id)?.span.experience_time(age) {
                any_span_active = true;
            }
            if fabric.require_interval(id)?.role != Role::Eliminated {
                elastic(fabric, id, elastic_factor)?;
            }
            let interval = fabric.require_interval(id)?;
            if interval.role == Role::Temporary && !interval.span.is_active() {
                elimination::eliminate(fabric, id)?;
            }
        }
        if any_span_active {
            fabric.spans_were_active();
        }

        for &id in &intervals {
            if fabric.require_interval(id)?.role != Role::Eliminated {
                smooth_velocity(fabric, id)?;
            }
        }

        for &id in &fabric.joints {
            let Some(joint) = fabric.joint_store.get_mut(id) else {
                continue;
            };
            if !joint.is_integrated() {
                continue;
            }
            if joint.interval_mass == 0.0 {
                return Err(FabricError::NoMass(joint.who));
            }
            self.environment.exert_joint_physics(joint, &self.values);
            joint.velocity += joint.force / joint.interval_mass;
            joint.force = DVec3::ZERO;
            joint.velocity += joint.absorb_velocity;
            joint.absorb_velocity = DVec3::ZERO;
        }

        for &id in &intervals {
            if fabric.require_interval(id)?.role != Role::Eliminated {
                share_gravity(fabric, id)?;
            }
        }

        for &id in &fabric.joints {
            let Some(joint) = fabric.joint_store.get_mut(id) else {
                continue;
            };
            if !joint.is_integrated() {
                continue;
            }
            joint.location += joint.velocity;
            joint.interval_mass = AMBIENT_JOINT_MASS;
        }
        Ok(())
    }
}

impl Transformation for Physics {
    fn name(&self) -> &str {
        "physics"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        for _ in 0..self.iterations {
            self.iterate(fabric)?;
            self.environment.post_iterate(fabric)?;
        }
        Ok(())
    }
}

impl PhysicsTransformation for Physics {
    fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations;
    }

    fn iterations(&self) -> u32 {
        self.iterations
    }
}

// ---------------------------------------------------------------------------
// Per-interval steps
// ---------------------------------------------------------------------------

/// Hooke-style stress along the interval, pushing only if the role can push.
fn elastic(fabric: &mut Fabric, id: IntervalId, elastic_factor: f64) -> Result<(), FabricError> {
    let interval = fabric.require_interval(id)?;
    let (alpha, omega) = (interval.alpha, interval.omega);
    let (alpha_location, omega_location) = (fabric.location(alpha)?, fabric.location(omega)?);

    let interval = fabric.require_interval_mut(id)?;
    let unit = interval.measure(alpha_location, omega_location);
    if !interval.span.is_significant() {
        return Ok(());
    }
    let can_push = interval.role.can_push();
    let actual = interval.span.actual();
    let ideal = interval.span.current_ideal();
    let stress = elastic_factor * (actual - ideal) * if can_push { ideal * ideal } else { 1.0 };
    interval.span.set_stress(stress);
    let mass = if can_push {
        ideal * ideal * ideal
    } else {
        actual * CABLE_MASS_FACTOR
    };
    let push = can_push || stress > 0.0;

    let alpha = fabric.require_joint_mut(alpha)?;
    if push {
        alpha.force += unit * (stress / 2.0);
    }
    alpha.interval_mass += mass / 2.0;
    let omega = fabric.require_joint_mut(omega)?;
    if push {
        omega.force -= unit * (stress / 2.0);
    }
    omega.interval_mass += mass / 2.0;
    Ok(())
}

/// Pull both ends' axial velocity components toward their average.
fn smooth_velocity(fabric: &mut Fabric, id: IntervalId) -> Result<(), FabricError> {
    let interval = fabric.require_interval(id)?;
    let (alpha, omega) = (interval.alpha, interval.omega);
    let unit = interval.unit();
    let degree = interval.role.smoothing();

    let project = |velocity: DVec3| unit * (velocity.dot(unit) * degree);
    let alpha_projection = project(fabric.require_joint(alpha)?.velocity);
    let omega_projection = project(fabric.require_joint(omega)?.velocity);
    let average = (alpha_projection + omega_projection) * 0.5;

    fabric.require_joint_mut(alpha)?.absorb_velocity += average - alpha_projection;
    fabric.require_joint_mut(omega)?.absorb_velocity += average - omega_projection;
    Ok(())
}

/// Give both ends the gravity of the interval as a whole, weighting toward
/// the deeper end when the interval straddles the ground plane.
fn share_gravity(fabric: &mut Fabric, id: IntervalId) -> Result<(), FabricError> {
    let interval = fabric.require_interval(id)?;
    let (alpha, omega) = (interval.alpha, interval.omega);
    let a = fabric.require_joint(alpha)?;
    let o = fabric.require_joint(omega)?;
    let straddle = (a.altitude > 0.0) ^ (o.altitude > 0.0);
    let total = a.altitude.abs() + o.altitude.abs();
    let gravity = if straddle && total > 0.001 {
        a.gravity.lerp(o.gravity, o.altitude.abs() / total)
    } else {
        (a.gravity + o.gravity) * 0.5
    };
    fabric.require_joint_mut(alpha)?.velocity += gravity;
    fabric.require_joint_mut(omega)?.velocity += gravity;
    Ok(())
}
