use crate::fabric::{Fabric, FabricError};
use crate::id::JointId;
use glam::DVec3;

/// Midpoint and normal of a closed loop of joints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    pub midpoint: DVec3,
    pub normal: DVec3,
}

impl Ring {
    /// Measure a loop given its locations in order.
    ///
    /// The normal sums the unit crosses of consecutive rays from the
    /// midpoint; `forward` picks which way it points. A loop too flat to
    /// decide keeps the unnormalised sum.
    pub fn from_locations(locations: &[DVec3], forward: bool) -> Self {
        if locations.is_empty() {
            return Self {
                midpoint: DVec3::ZERO,
                normal: DVec3::ZERO,
            };
        }
        let midpoint = locations.iter().copied().sum::<DVec3>() / locations.len() as f64;
        let mut normal = DVec3::ZERO;
        for (walk, location) in locations.iter().enumerate() {
            let a = *location - midpoint;
            let b = locations[(walk + 1) % locations.len()] - midpoint;
            let cross = if forward { b.cross(a) } else { a.cross(b) };
            let span = cross.length();
            if span != 0.0 {
                normal += cross / span;
            }
        }
        let span = normal.length();
        if span > 0.0001 {
            normal /= span;
        }
        Self { midpoint, normal }
    }

    pub fn of(fabric: &Fabric, joints: &[JointId], forward: bool) -> Result<Self, FabricError> {
        let locations = joints
            .iter()
            .map(|joint| fabric.location(*joint))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_locations(&locations, forward))
    }
}
