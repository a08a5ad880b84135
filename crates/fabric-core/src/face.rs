use crate::id::{FaceId, IntervalId, JointId};
use crate::who::Side;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Winding order of a face; decides which way its normal points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    RightHanded,
    LeftHanded,
}

impl Order {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Order> {
        match ordinal {
            0 => Some(Order::RightHanded),
            1 => Some(Order::LeftHanded),
            _ => None,
        }
    }

    pub fn reversed(self) -> Order {
        match self {
            Order::RightHanded => Order::LeftHanded,
            Order::LeftHanded => Order::RightHanded,
        }
    }
}

/// Handedness of the twist a face imparts when opened up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Chirality {
    #[default]
    LeftHanded,
    RightHanded,
}

impl Chirality {
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Chirality> {
        match ordinal {
            0 => Some(Chirality::LeftHanded),
            1 => Some(Chirality::RightHanded),
            _ => None,
        }
    }
}

/// An ordered polygon of joints, normally a triangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub order: Order,
    pub chirality: Chirality,
    pub(crate) joints: Vec<JointId>,
    /// Interval whose stress colours the face.
    pub stress_interval: Option<IntervalId>,
    pub payload: Option<Vec<u8>>,
}

impl Face {
    pub fn new(order: Order, joints: Vec<JointId>) -> Self {
        Self::with_chirality(order, Chirality::default(), joints)
    }

    pub fn with_chirality(order: Order, chirality: Chirality, joints: Vec<JointId>) -> Self {
        Self {
            order,
            chirality,
            joints,
            stress_interval: None,
            payload: None,
        }
    }

    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    /// Joint at `index`, wrapping in both directions.
    pub fn joint(&self, index: isize) -> JointId {
        let count = self.joints.len() as isize;
        self.joints[index.rem_euclid(count) as usize]
    }

    pub fn contains(&self, joint: JointId) -> bool {
        self.joints.contains(&joint)
    }

    pub fn same_joints_as(&self, other: &Face) -> bool {
        other.joints.iter().all(|joint| self.joints.contains(joint))
    }

    /// Rotate the joint list one step: forward moves the first joint to the
    /// end, backward moves the last joint to the front.
    pub fn twist(&mut self, forward: bool) {
        if self.joints.is_empty() {
            return;
        }
        if forward {
            self.joints.rotate_left(1);
        } else {
            self.joints.rotate_right(1);
        }
    }

    pub(crate) fn replace(&mut self, from: JointId, to: JointId) -> bool {
        match self.joints.iter().position(|joint| *joint == from) {
            Some(index) => {
                self.joints[index] = to;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_joint(&mut self, index: usize, joint: JointId) {
        self.joints[index] = joint;
    }

    /// Side of the identity an apex raised over this face should take.
    ///
    /// The apex follows the majority of LEFT or RIGHT joints; an all-MIDDLE
    /// face picks a side from its winding, anything else stays in the middle.
    pub fn apex_side(&self, sides: &[Side]) -> Side {
        let count = |side: Side| sides.iter().filter(|s| **s == side).count();
        let (left, right) = (count(Side::Left), count(Side::Right));
        if left > right {
            Side::Left
        } else if left < right {
            Side::Right
        } else if count(Side::Middle) == 3 {
            match self.order {
                Order::RightHanded => Side::Right,
                Order::LeftHanded => Side::Left,
            }
        } else {
            Side::Middle
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry over joint locations (given in face order)
// ---------------------------------------------------------------------------

pub fn centroid(locations: &[DVec3]) -> DVec3 {
    if locations.is_empty() {
        return DVec3::ZERO;
    }
    locations.iter().copied().sum::<DVec3>() / locations.len() as f64
}

/// Location weighted per joint by the three given spans.
pub fn weighted_location(locations: &[DVec3; 3], spans: [f64; 3]) -> DVec3 {
    locations
        .iter()
        .zip(spans)
        .map(|(location, span)| *location * span)
        .sum()
}

/// Outward normal: the sum of the unit crosses of consecutive corner rays.
///
/// When the sum is nearly zero it is returned unnormalised.
pub fn normal(order: Order, locations: &[DVec3]) -> DVec3 {
    let mid = centroid(locations);
    let count = locations.len();
    let mut sum = DVec3::ZERO;
    for walk in 0..count {
        let a = locations[walk] - mid;
        let b = locations[(walk + 1) % count] - mid;
        let cross = match order {
            Order::RightHanded => b.cross(a),
            Order::LeftHanded => a.cross(b),
        };
        let span = cross.length();
        if span != 0.0 {
            sum += cross / span;
        }
    }
    let length = sum.length();
    if length > 0.0001 { sum / length } else { sum }
}

/// Mean distance of the corners from the centroid.
pub fn radius(locations: &[DVec3]) -> f64 {
    if locations.is_empty() {
        return 0.0;
    }
    let mid = centroid(locations);
    locations.iter().map(|l| l.distance(mid)).sum::<f64>() / locations.len() as f64
}

/// Two faces that mirror each other across the LEFT/RIGHT symmetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacePair {
    pub face0: FaceId,
    pub face1: FaceId,
}
