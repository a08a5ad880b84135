use crate::id::JointId;
use serde::{Deserialize, Serialize};

/// A ring-pair of joints: the alpha ring occupies the first half of the
/// list and the omega ring the second half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertebra {
    pub(crate) joints: Vec<JointId>,
    pub right_handed: bool,
}

impl Vertebra {
    pub fn new(joints: Vec<JointId>, right_handed: bool) -> Self {
        Self {
            joints,
            right_handed,
        }
    }

    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    pub fn contains(&self, joint: JointId) -> bool {
        self.joints.contains(&joint)
    }

    /// One ring, rotated one step according to handedness so that it lines
    /// up with the ring of a neighbouring vertebra.
    pub fn ring(&self, alpha: bool) -> Vec<JointId> {
        let half = self.joints.len() / 2;
        let offset = if alpha { 0 } else { half };
        let mut ring = self.joints[offset..offset + half].to_vec();
        if !ring.is_empty() {
            if self.right_handed {
                ring.rotate_left(1);
            } else {
                ring.rotate_right(1);
            }
        }
        ring
    }

    pub(crate) fn replace(&mut self, from: JointId, to: JointId) {
        for joint in self.joints.iter_mut().filter(|joint| **joint == from) {
            *joint = to;
        }
    }
}
