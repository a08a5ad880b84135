use crate::fabric::{Fabric, FabricError};
use crate::id::JointId;
use crate::interval::Role;
use crate::transform::{PeriodicTransformation, Transformation};
use crate::who::{Side, Who};
use std::collections::BTreeSet;

/// Pull two joints together through a temporary midpoint joint.
///
/// Both joints get a temporary interval to the midpoint. As those expire,
/// elimination folds the midpoint into one joint and then the two joints
/// into each other.
#[derive(Debug, Clone)]
pub struct JointMerge {
    a: JointId,
    b: JointId,
    middle: Option<JointId>,
}

impl JointMerge {
    pub fn new(a: JointId, b: JointId) -> Self {
        Self { a, b, middle: None }
    }

    /// The temporary midpoint joint, once created.
    pub fn middle(&self) -> Option<JointId> {
        self.middle
    }
}

impl Transformation for JointMerge {
    fn name(&self) -> &str {
        "joint merge"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        for interval in fabric.real_intervals(self.a, self.b) {
            tracing::warn!(age = fabric.age(), ?interval, "removing unexpected interval");
            fabric.retire_interval(interval)?;
        }
        let who = fabric.create_who(Side::Temporary);
        let location = (fabric.location(self.a)? + fabric.location(self.b)?) * 0.5;
        let middle = fabric.add_joint(who, location)?;
        fabric.add_interval(self.a, middle, Role::Temporary)?;
        fabric.add_interval(self.b, middle, Role::Temporary)?;
        self.middle = Some(middle);
        Ok(())
    }
}

/// Scan every joint for pairs of incident intervals leaving it in nearly
/// the same direction and queue a [`JointMerge`] of their far ends.
///
/// A joint is claimed by at most one merge per scan, and each joint's
/// neighbourhood triggers at most one merge. The scan finishes once a pass
/// queues nothing.
#[derive(Debug, Clone)]
pub struct PeriodicJointMerge {
    threshold_dot: f64,
    finished: bool,
}

impl PeriodicJointMerge {
    pub fn new(threshold_degrees: f64) -> Self {
        Self {
            threshold_dot: threshold_degrees.to_radians().cos(),
            finished: false,
        }
    }
}

impl Transformation for PeriodicJointMerge {
    fn name(&self) -> &str {
        "periodic joint merge"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        let sheaths = fabric.sheath_map()?;
        let mut claimed: BTreeSet<Who> = BTreeSet::new();
        for sheath in sheaths.values() {
            let mut units = Vec::with_capacity(sheath.intervals.len());
            for &id in &sheath.intervals {
                let (alpha, omega) = fabric.interval_ends(id)?;
                let unit = (omega - alpha).normalize_or_zero();
                let from_here = fabric.require_interval(id)?.alpha() == sheath.joint;
                units.push(if from_here { -unit } else { unit });
            }
            'pairs: for walk_a in 0..units.len() {
                for walk_b in walk_a + 1..units.len() {
                    if units[walk_a].dot(units[walk_b]) <= self.threshold_dot {
                        continue;
                    }
                    let (a, b) = (sheath.others[walk_a], sheath.others[walk_b]);
                    let (who_a, who_b) = (fabric.who_of(a)?, fabric.who_of(b)?);
                    if claimed.contains(&who_a)
                        || claimed.contains(&who_b)
                        || !fabric.real_intervals(a, b).is_empty()
                    {
                        continue;
                    }
                    tracing::info!(age = fabric.age(), %who_a, %who_b, "triggered merge");
                    fabric.add_transformation(JointMerge::new(a, b));
                    claimed.insert(who_a);
                    claimed.insert(who_b);
                    break 'pairs;
                }
            }
        }
        self.finished = claimed.is_empty();
        Ok(())
    }
}

impl PeriodicTransformation for PeriodicJointMerge {
    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::from_fn;
    use glam::DVec3;

    /// M1 with springs out to M0 and M2, which lie on the same ray, and to
    /// M3 at a right angle.
    fn fan() -> (Fabric, [JointId; 4]) {
        let mut fabric = Fabric::new();
        fabric
            .run_transformation(&mut from_fn("joints", |f: &mut Fabric| {
                for location in [
                    DVec3::new(1.0, 0.0, 1.0),
                    DVec3::new(0.0, 0.0, 1.0),
                    DVec3::new(2.0, 0.0, 1.0),
                    DVec3::new(0.0, 1.0, 1.0),
                ] {
                    let who = f.create_who(Side::Middle);
                    f.add_joint(who, location)?;
                }
                Ok(())
            }))
            .unwrap();
        let joints = fabric.joints().to_vec();
        let [m0, m1, m2, m3] = [joints[0], joints[1], joints[2], joints[3]];
        fabric
            .run_transformation(&mut from_fn("springs", move |f: &mut Fabric| {
                f.add_interval(m0, m1, Role::Spring)?;
                f.add_interval(m1, m2, Role::Spring)?;
                f.add_interval(m1, m3, Role::Spring)?;
                Ok(())
            }))
            .unwrap();
        (fabric, [m0, m1, m2, m3])
    }

    #[test]
    fn merge_creates_temporary_middle() {
        let (mut fabric, [m0, _, m2, _]) = fan();
        let mut merge = JointMerge::new(m0, m2);
        fabric.run_transformation(&mut merge).unwrap();
        let middle = merge.middle().unwrap();
        let joint = fabric.joint(middle).unwrap();
        assert_eq!(joint.who().side, Side::Temporary);
        assert!((joint.location - DVec3::new(1.5, 0.0, 1.0)).length() < 1e-12);
        let temporaries = fabric
            .intervals()
            .iter()
            .filter(|id| fabric.interval(**id).unwrap().role() == Role::Temporary)
            .count();
        assert_eq!(temporaries, 2);
    }

    #[test]
    fn merge_retires_direct_intervals() {
        let (mut fabric, [m0, m1, _, _]) = fan();
        fabric.run_transformation(&mut JointMerge::new(m0, m1)).unwrap();
        assert!(fabric.real_intervals(m0, m1).is_empty());
    }

    #[test]
    fn periodic_merge_finds_joints_on_one_ray() {
        let (mut fabric, _) = fan();
        let mut periodic = PeriodicJointMerge::new(10.0);
        fabric.run_transformation(&mut periodic).unwrap();
        assert!(!periodic.is_finished());
        assert_eq!(fabric.pending_transformations(), 1);
        fabric.execute_transformations(None).unwrap();
        assert_eq!(fabric.joints().len(), 5);
    }

    #[test]
    fn periodic_merge_finishes_when_nothing_lines_up() {
        let mut fabric = crate::factory::double_face_triangle().unwrap();
        let mut periodic = PeriodicJointMerge::new(10.0);
        fabric.run_transformation(&mut periodic).unwrap();
        assert!(periodic.is_finished());
        assert!(!fabric.has_transformations());
    }
}
