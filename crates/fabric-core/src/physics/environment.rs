use super::values::{PhysicsParam, PhysicsValues};
use crate::fabric::{Fabric, FabricError};
use crate::joint::Joint;
use glam::DVec3;

/// The world a fabric lives in: gravity and drag applied per joint.
pub trait Environment: Send {
    /// Adjust the velocity of one joint before its accumulated force is
    /// folded in.
    fn exert_joint_physics(&self, joint: &mut Joint, values: &PhysicsValues);

    /// Hook run after every integrator pass.
    fn post_iterate(&mut self, _fabric: &mut Fabric) -> Result<(), FabricError> {
        Ok(())
    }
}

/// Half-thickness of the band around the ground plane where air and land
/// behaviour blend.
pub const JOINT_RADIUS: f64 = 0.01;

/// Gravity along -Z with a ground plane at z = 0.
///
/// Above the plane joints fall slowly through light air; below it they are
/// pushed back up and heavily damped. Inside the band of half-width
/// [`JOINT_RADIUS`] both effects blend linearly.
///
/// Drag acts on the velocity at once. Gravity is only recorded on the joint
/// and reaches its velocity when the integrator shares it along intervals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vertical;

impl Vertical {
    fn exert_gravity(joint: &mut Joint, value: f64) {
        joint.gravity = DVec3::new(0.0, 0.0, -value);
    }
}

impl Environment for Vertical {
    fn exert_joint_physics(&self, joint: &mut Joint, values: &PhysicsValues) {
        let air_gravity = values.get(PhysicsParam::AirGravity);
        let air_drag = values.get(PhysicsParam::AirDrag);
        let land_gravity = -air_gravity * values.get(PhysicsParam::LandGravity);
        let land_drag = air_drag * values.get(PhysicsParam::LandDrag);

        let altitude = joint.location.z;
        joint.altitude = altitude;
        let (gravity, drag) = if altitude > JOINT_RADIUS {
            (air_gravity, air_drag)
        } else if altitude < -JOINT_RADIUS {
            (land_gravity, land_drag)
        } else {
            let degree = (altitude + JOINT_RADIUS) / (JOINT_RADIUS * 2.0);
            (
                air_gravity * degree + land_gravity * (1.0 - degree),
                air_drag * degree + land_drag * (1.0 - degree),
            )
        };
        Self::exert_gravity(joint, gravity);
        joint.velocity *= 1.0 - drag;
    }
}

/// No gravity and no drag.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weightless;

impl Environment for Weightless {
    fn exert_joint_physics(&self, joint: &mut Joint, _values: &PhysicsValues) {
        joint.gravity = DVec3::ZERO;
    }
}
