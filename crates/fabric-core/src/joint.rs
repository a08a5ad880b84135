use crate::id::{IntervalId, JointId};
use crate::who::{Side, Who};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A point mass.
///
/// Mass is not stored permanently: the integrator rebuilds it every
/// iteration from the contributions of the joint's intervals, starting from
/// an ambient baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub(crate) who: Who,
    pub location: DVec3,
    pub velocity: DVec3,
    pub(crate) force: DVec3,
    pub(crate) absorb_velocity: DVec3,
    /// Gravity the environment recorded this tick. The integrator hands it
    /// to the joint's velocity through each of its intervals.
    pub gravity: DVec3,
    pub(crate) interval_mass: f64,
    /// Signed height above the environment's reference plane.
    pub altitude: f64,
    /// Opaque caller data carried through snapshots.
    pub payload: Option<Vec<u8>>,
}

impl Joint {
    pub fn new(who: Who, location: DVec3) -> Self {
        Self {
            who,
            location,
            velocity: DVec3::ZERO,
            force: DVec3::ZERO,
            absorb_velocity: DVec3::ZERO,
            gravity: DVec3::ZERO,
            interval_mass: 0.0,
            altitude: 0.0,
            payload: None,
        }
    }

    pub fn who(&self) -> Who {
        self.who
    }

    pub fn mass(&self) -> f64 {
        self.interval_mass
    }

    pub(crate) fn set_mass(&mut self, mass: f64) {
        self.interval_mass = mass;
    }

    pub fn is_eliminated(&self) -> bool {
        self.who.side == Side::Eliminated
    }

    /// Temporary and eliminated joints are carried along but never integrated.
    pub fn is_integrated(&self) -> bool {
        self.who.side.is_typed()
    }
}

/// Neighbourhood of one joint: its real intervals and the joints at their
/// other ends, in matching order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheath {
    pub joint: JointId,
    pub intervals: Vec<IntervalId>,
    pub others: Vec<JointId>,
}

impl Sheath {
    pub(crate) fn new(joint: JointId) -> Self {
        Self {
            joint,
            intervals: Vec::new(),
            others: Vec::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.intervals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_joint_is_at_rest_without_mass() {
        let joint = Joint::new(Who::new(Side::Middle, 0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(joint.velocity, DVec3::ZERO);
        assert_eq!(joint.mass(), 0.0);
        assert!(joint.is_integrated());
    }

    #[test]
    fn transient_sides_are_not_integrated() {
        let temporary = Joint::new(Who::new(Side::Temporary, 0), DVec3::ZERO);
        let eliminated = Joint::new(Who::new(Side::Eliminated, 0), DVec3::ZERO);
        assert!(!temporary.is_integrated());
        assert!(!eliminated.is_integrated());
        assert!(eliminated.is_eliminated());
    }
}
