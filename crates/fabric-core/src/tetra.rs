use crate::id::JointId;
use glam::{DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

/// Corner pairs joined by the two bars: a-b and c-d.
pub const BAR_EDGES: [(usize, usize); 2] = [(0, 1), (2, 3)];

/// Corner pairs joined by the four cables: b-c, a-c, a-d, b-d.
pub const CABLE_EDGES: [(usize, usize); 4] = [(1, 2), (0, 2), (0, 3), (1, 3)];

/// Four joints forming a tetrahedron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tetra {
    pub(crate) joints: [JointId; 4],
    pub clockwise: bool,
}

impl Tetra {
    pub fn new(joints: [JointId; 4], clockwise: bool) -> Self {
        Self { joints, clockwise }
    }

    pub fn joints(&self) -> &[JointId; 4] {
        &self.joints
    }

    pub fn contains(&self, joint: JointId) -> bool {
        self.joints.contains(&joint)
    }

    /// Joints of `other` that also belong to this tetra, in `other`'s order.
    pub fn common_joints_with(&self, other: &Tetra) -> Vec<JointId> {
        other
            .joints
            .iter()
            .copied()
            .filter(|joint| self.joints.contains(joint))
            .collect()
    }

    pub(crate) fn replace(&mut self, from: JointId, to: JointId) {
        for joint in self.joints.iter_mut().filter(|joint| **joint == from) {
            *joint = to;
        }
    }
}

pub fn centroid(locations: &[DVec3; 4]) -> DVec3 {
    locations.iter().copied().sum::<DVec3>() / 4.0
}

pub fn radius(locations: &[DVec3; 4]) -> f64 {
    let mid = centroid(locations);
    locations.iter().map(|l| l.distance(mid)).sum::<f64>() / 4.0
}

/// Signed volume of the tetrahedron spanned by four corners.
pub fn current_volume(locations: &[DVec3; 4]) -> f64 {
    let [a, b, c, d] = locations.map(|l| DVec4::new(l.x, l.y, l.z, 1.0));
    DMat4::from_cols(a, b, c, d).determinant() / 6.0
}

/// Volume measure from the six edge lengths, calibrated so that a regular
/// tetrahedron with unit edges measures exactly one.
pub fn volume_from_edges(ab: f64, ac: f64, ad: f64, bc: f64, cd: f64, db: f64) -> f64 {
    // Edge quadrances indexed 0..6 in argument order.
    const OPEN: [[usize; 3]; 12] = [
        [5, 0, 1],
        [3, 0, 2],
        [0, 1, 4],
        [2, 1, 3],
        [4, 2, 0],
        [5, 2, 1],
        [4, 3, 0],
        [1, 3, 5],
        [1, 4, 5],
        [3, 4, 2],
        [0, 5, 4],
        [3, 5, 2],
    ];
    const CLOSED: [[usize; 3]; 4] = [[0, 1, 3], [3, 4, 5], [1, 2, 4], [0, 2, 5]];
    const OPPOSITE: [[usize; 2]; 3] = [[0, 4], [1, 5], [2, 3]];

    let q = [ab, ac, ad, bc, cd, db].map(|edge| edge * edge);
    let open: f64 = OPEN.iter().map(|[i, j, k]| q[*i] * q[*j] * q[*k]).sum();
    let closed: f64 = CLOSED.iter().map(|[i, j, k]| q[*i] * q[*j] * q[*k]).sum();
    let opposite: f64 = OPPOSITE
        .iter()
        .map(|[i, j]| q[*i] * q[*j] * (q[*i] + q[*j]))
        .sum();
    (open - closed - opposite) / 2.0
}
