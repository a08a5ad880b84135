//! Fusing two tetras that have grown into each other.

use super::joint_merge::JointMerge;
use crate::face::Face;
use crate::fabric::{Fabric, FabricError};
use crate::id::{FaceId, JointId, TetraId};
use crate::tetra::Tetra;
use crate::transform::{PeriodicTransformation, Transformation};
use glam::DVec3;

/// Faces of the two tetras whose normals agree at least this well are
/// fused.
const PARALLEL_DOT: f64 = 0.8;

/// Greedily pair each of `from` with the nearest still-unclaimed entry of
/// `to`, returning indices into `to`. Ties go to the earlier entry.
pub fn nearest_pairing(from: &[DVec3], to: &[DVec3]) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..to.len()).collect();
    let mut pairing = Vec::with_capacity(from.len());
    for location in from {
        let closest = remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                location
                    .distance(to[**a])
                    .total_cmp(&location.distance(to[**b]))
            })
            .map(|(slot, index)| (slot, *index));
        if let Some((slot, index)) = closest {
            pairing.push(index);
            remaining.remove(slot);
        }
    }
    pairing
}

/// Merge two tetras joint for joint.
///
/// Each joint of the first tetra is paired with the nearest remaining joint
/// of the second; distinct pairs are pulled together by a [`JointMerge`].
/// Nearly parallel faces of the two tetras are replaced by a single copy on
/// the merged joints, and one tetra takes the place of both.
#[derive(Debug, Clone)]
pub struct TetraAnnihilation {
    a: TetraId,
    b: TetraId,
    merged: Option<TetraId>,
}

impl TetraAnnihilation {
    pub fn new(a: TetraId, b: TetraId) -> Self {
        Self { a, b, merged: None }
    }

    /// The combined tetra, once created.
    pub fn merged(&self) -> Option<TetraId> {
        self.merged
    }

    fn locations(fabric: &Fabric, joints: &[JointId]) -> Result<Vec<DVec3>, FabricError> {
        joints.iter().map(|joint| fabric.location(*joint)).collect()
    }

    fn fuse_parallel_faces(&self, fabric: &mut Fabric) -> Result<Vec<FaceId>, FabricError> {
        let faces_a = fabric.faces_of_tetra(self.a)?;
        let faces_b = fabric.faces_of_tetra(self.b)?;
        let mut copies: Vec<FaceId> = Vec::new();
        for &face_a in &faces_a {
            if copies.contains(&face_a) || fabric.is_face_removed(face_a) {
                continue;
            }
            let normal_a = fabric.face_normal(face_a)?;
            for &face_b in &faces_b {
                if face_b == face_a || copies.contains(&face_b) || fabric.is_face_removed(face_b) {
                    continue;
                }
                if normal_a.dot(fabric.face_normal(face_b)?) > PARALLEL_DOT {
                    copies.push(face_b);
                    fabric.retire_face(face_a)?;
                    fabric.retire_face(face_b)?;
                    break;
                }
            }
        }
        Ok(copies)
    }
}

impl Transformation for TetraAnnihilation {
    fn name(&self) -> &str {
        "tetra annihilation"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        tracing::info!(age = fabric.age(), "tetra annihilation begins");
        let (joints_a, clockwise) = {
            let tetra = fabric.require_tetra(self.a)?;
            (*tetra.joints(), tetra.clockwise)
        };
        let joints_b = *fabric.require_tetra(self.b)?.joints();
        let pairing = nearest_pairing(
            &Self::locations(fabric, &joints_a)?,
            &Self::locations(fabric, &joints_b)?,
        );

        let mut merged_joints = [joints_a[0]; 4];
        for (walk, (&joint_a, &index)) in joints_a.iter().zip(&pairing).enumerate() {
            let joint_b = joints_b[index];
            if joint_a == joint_b {
                merged_joints[walk] = joint_a;
                continue;
            }
            tracing::info!(
                age = fabric.age(),
                a = %fabric.who_of(joint_a)?,
                b = %fabric.who_of(joint_b)?,
                "merging"
            );
            let mut merge = JointMerge::new(joint_a, joint_b);
            merge.transform(fabric)?;
            merged_joints[walk] = merge.middle().unwrap_or(joint_a);
        }

        let copies = self.fuse_parallel_faces(fabric)?;
        let merged_locations = Self::locations(fabric, &merged_joints)?;
        for original in copies {
            let (order, chirality, joints) = {
                let face = fabric.require_face(original)?;
                (face.order, face.chirality, face.joints().to_vec())
            };
            let pairing = nearest_pairing(&Self::locations(fabric, &joints)?, &merged_locations);
            let joints = pairing.into_iter().map(|index| merged_joints[index]).collect();
            fabric.add_face(Face::with_chirality(order, chirality, joints))?;
        }

        self.merged = Some(fabric.add_tetra(Tetra::new(merged_joints, clockwise))?);
        fabric.retire_tetra(self.a)?;
        fabric.retire_tetra(self.b)?;
        tracing::info!(age = fabric.age(), "tetra annihilation completes");
        Ok(())
    }
}

/// Annihilate the closest pair of tetras once their centroids come within
/// a threshold distance.
#[derive(Debug, Clone)]
pub struct PeriodicTetraAnnihilation {
    threshold: f64,
    finished: bool,
}

impl PeriodicTetraAnnihilation {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            finished: false,
        }
    }

    fn closest_pair(fabric: &Fabric) -> Result<Option<(TetraId, TetraId, f64)>, FabricError> {
        let centroids = fabric
            .tetras()
            .iter()
            .map(|id| fabric.tetra_centroid(*id).map(|c| (*id, c)))
            .collect::<Result<Vec<_>, _>>()?;
        let mut closest: Option<(TetraId, TetraId, f64)> = None;
        for (walk, (a, centroid_a)) in centroids.iter().enumerate() {
            for (b, centroid_b) in &centroids[walk + 1..] {
                let distance = centroid_a.distance(*centroid_b);
                if closest.is_none_or(|(_, _, best)| distance < best) {
                    closest = Some((*a, *b, distance));
                }
            }
        }
        Ok(closest)
    }
}

impl Transformation for PeriodicTetraAnnihilation {
    fn name(&self) -> &str {
        "periodic tetra annihilation"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        match Self::closest_pair(fabric)? {
            Some((a, b, distance)) if distance < self.threshold => {
                tracing::info!(age = fabric.age(), distance, "closest tetras");
                TetraAnnihilation::new(a, b).transform(fabric)?;
                self.finished = false;
            }
            _ => self.finished = true,
        }
        Ok(())
    }
}

impl PeriodicTransformation for PeriodicTetraAnnihilation {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory;
    use crate::interval::Role;
    use crate::transforms::OpenUp;
    use crate::who::Side;

    /// Open both faces of the double-face triangle, giving two tetras that
    /// share three joints with apexes on opposite sides.
    fn back_to_back() -> Fabric {
        let mut fabric = factory::double_face_triangle().unwrap();
        let [front, back] = [fabric.faces()[0], fabric.faces()[1]];
        for face in [front, back] {
            fabric
                .run_transformation(&mut OpenUp::new(face, 1.0, 100, Role::Spring))
                .unwrap();
        }
        fabric
    }

    #[test]
    fn pairing_is_greedy_and_exclusive() {
        let from = [DVec3::ZERO, DVec3::X * 0.1];
        let to = [DVec3::X * 0.2, DVec3::ZERO];
        assert_eq!(nearest_pairing(&from, &to), vec![1, 0]);
    }

    #[test]
    fn annihilation_merges_only_distinct_pairs() {
        let mut fabric = back_to_back();
        assert_eq!(fabric.tetras().len(), 2);
        let [a, b] = [fabric.tetras()[0], fabric.tetras()[1]];
        let shared: Vec<JointId> = fabric
            .tetra(a)
            .unwrap()
            .common_joints_with(fabric.tetra(b).unwrap());
        assert_eq!(shared.len(), 3);

        let mut annihilation = TetraAnnihilation::new(a, b);
        fabric.run_transformation(&mut annihilation).unwrap();
        assert_eq!(fabric.tetras().len(), 1);
        let merged = fabric.tetra(annihilation.merged().unwrap()).unwrap();
        for joint in shared {
            assert!(merged.contains(joint));
        }
        let temporary = merged
            .joints()
            .iter()
            .filter(|j| fabric.who_of(**j).unwrap().side == Side::Temporary)
            .count();
        assert_eq!(temporary, 1);
    }

    #[test]
    fn periodic_variant_respects_threshold() {
        let mut fabric = back_to_back();
        let mut far = PeriodicTetraAnnihilation::new(1e-6);
        fabric.run_transformation(&mut far).unwrap();
        assert!(far.is_finished());
        assert_eq!(fabric.tetras().len(), 2);

        let mut near = PeriodicTetraAnnihilation::new(1.0);
        fabric.run_transformation(&mut near).unwrap();
        assert!(!near.is_finished());
        assert_eq!(fabric.tetras().len(), 1);
    }
}
