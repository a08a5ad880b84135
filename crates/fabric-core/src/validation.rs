//! Whole-fabric consistency checks and fabric-to-fabric comparison.
//!
//! [`validate`] walks the committed collections and reports every broken
//! invariant instead of stopping at the first. [`diff_fabrics`] compares two
//! fabrics by identity rather than by arena slot, which is what a snapshot
//! round trip or a determinism check needs.

use crate::fabric::Fabric;
use crate::id::{IntervalId, JointId};
use crate::interval::Role;
use crate::who::Who;
use std::collections::{BTreeMap, HashSet};

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// One broken invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Edits are staged but not applied.
    PendingEdits,
    /// Two live joints share an identity.
    DuplicateWho(Who),
    /// A live joint carries the eliminated side.
    EliminatedJoint(Who),
    /// A live interval still has the eliminated role.
    EliminatedInterval(IntervalId),
    /// A live interval joins a joint to itself.
    CollapsedInterval(IntervalId),
    /// An entity of `kind` refers to a joint that is not live.
    DanglingJoint { kind: &'static str, joint: JointId },
    /// A face names a stress interval that is not live.
    DanglingStressInterval(IntervalId),
    /// An integrated joint has no mass after a physics step.
    NoMass(Who),
}

/// Check the structural invariants of a committed fabric.
pub fn validate(fabric: &Fabric) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !fabric.mods().is_empty() {
        violations.push(Violation::PendingEdits);
    }

    let live: HashSet<JointId> = fabric.joints().iter().copied().collect();
    let mut seen = HashSet::new();
    for &id in fabric.joints() {
        let Some(joint) = fabric.joint(id) else {
            continue;
        };
        if !seen.insert(joint.who()) {
            violations.push(Violation::DuplicateWho(joint.who()));
        }
        if joint.is_eliminated() {
            violations.push(Violation::EliminatedJoint(joint.who()));
        }
    }

    let dangling = |kind: &'static str, joint: JointId, out: &mut Vec<Violation>| {
        if !live.contains(&joint) {
            out.push(Violation::DanglingJoint { kind, joint });
        }
    };

    let intervals: HashSet<IntervalId> = fabric.intervals().iter().copied().collect();
    for &id in fabric.intervals() {
        let Some(interval) = fabric.interval(id) else {
            continue;
        };
        if interval.role() == Role::Eliminated {
            violations.push(Violation::EliminatedInterval(id));
        }
        if interval.alpha() == interval.omega() {
            violations.push(Violation::CollapsedInterval(id));
        }
        dangling("interval", interval.alpha(), &mut violations);
        dangling("interval", interval.omega(), &mut violations);
    }
    for &id in fabric.faces() {
        let Some(face) = fabric.face(id) else {
            continue;
        };
        for &joint in face.joints() {
            dangling("face", joint, &mut violations);
        }
        if let Some(stress) = face.stress_interval {
            if !intervals.contains(&stress) {
                violations.push(Violation::DanglingStressInterval(stress));
            }
        }
    }
    for &id in fabric.tetras() {
        if let Some(tetra) = fabric.tetra(id) {
            for &joint in tetra.joints() {
                dangling("tetra", joint, &mut violations);
            }
        }
    }
    for &id in fabric.vertebras() {
        if let Some(vertebra) = fabric.vertebra(id) {
            for &joint in vertebra.joints() {
                dangling("vertebra", joint, &mut violations);
            }
        }
    }
    violations
}

/// [`validate`], plus the requirement that every integrated joint carries
/// mass. Only meaningful right after a physics step.
pub fn validate_after_physics(fabric: &Fabric) -> Vec<Violation> {
    let mut violations = validate(fabric);
    for &id in fabric.joints() {
        if let Some(joint) = fabric.joint(id) {
            if joint.is_integrated() && joint.mass() <= 0.0 {
                violations.push(Violation::NoMass(joint.who()));
            }
        }
    }
    violations
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Difference between two fabrics, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FabricDiff {
    pub only_in_a: Vec<Who>,
    pub only_in_b: Vec<Who>,
    /// Joints present in both whose location differs by more than the
    /// tolerance.
    pub moved: Vec<Who>,
    /// Interval counts per role, where they differ: (role, a, b).
    pub role_counts: Vec<(Role, usize, usize)>,
    pub faces: (usize, usize),
    pub tetras: (usize, usize),
    pub vertebras: (usize, usize),
    pub ages: (u64, u64),
}

impl FabricDiff {
    pub fn is_identical(&self) -> bool {
        self.only_in_a.is_empty()
            && self.only_in_b.is_empty()
            && self.moved.is_empty()
            && self.role_counts.is_empty()
            && self.faces.0 == self.faces.1
            && self.tetras.0 == self.tetras.1
            && self.vertebras.0 == self.vertebras.1
            && self.ages.0 == self.ages.1
    }
}

fn locations_by_who(fabric: &Fabric) -> BTreeMap<Who, glam::DVec3> {
    fabric
        .joints()
        .iter()
        .filter_map(|id| fabric.joint(*id))
        .map(|joint| (joint.who(), joint.location))
        .collect()
}

fn roles(fabric: &Fabric) -> BTreeMap<Role, usize> {
    let mut counts = BTreeMap::new();
    for interval in fabric.intervals().iter().filter_map(|id| fabric.interval(*id)) {
        *counts.entry(interval.role()).or_insert(0) += 1;
    }
    counts
}

/// Compare two fabrics. Joint locations match within `tolerance`.
pub fn diff_fabrics(a: &Fabric, b: &Fabric, tolerance: f64) -> FabricDiff {
    let (joints_a, joints_b) = (locations_by_who(a), locations_by_who(b));
    let mut diff = FabricDiff {
        faces: (a.faces().len(), b.faces().len()),
        tetras: (a.tetras().len(), b.tetras().len()),
        vertebras: (a.vertebras().len(), b.vertebras().len()),
        ages: (a.age(), b.age()),
        ..FabricDiff::default()
    };
    for (who, location) in &joints_a {
        match joints_b.get(who) {
            None => diff.only_in_a.push(*who),
            Some(other) if location.distance(*other) > tolerance => diff.moved.push(*who),
            Some(_) => {}
        }
    }
    diff.only_in_b = joints_b
        .keys()
        .filter(|who| !joints_a.contains_key(who))
        .copied()
        .collect();

    let (roles_a, roles_b) = (roles(a), roles(b));
    for role in Role::ALL {
        let (count_a, count_b) = (
            roles_a.get(&role).copied().unwrap_or(0),
            roles_b.get(&role).copied().unwrap_or(0),
        );
        if count_a != count_b {
            diff.role_counts.push((role, count_a, count_b));
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory;
    use crate::fablob::Fablob;
    use crate::physics::Physics;
    use crate::physics::environment::Weightless;
    use crate::transform::{PhysicsTransformation, from_fn};
    use crate::who::Side;
    use glam::DVec3;

    #[test]
    fn canned_fabrics_are_valid() {
        for fabric in [
            factory::double_face_triangle().unwrap(),
            factory::octahedron().unwrap(),
            factory::truss().unwrap(),
        ] {
            assert_eq!(validate(&fabric), vec![]);
        }
    }

    #[test]
    fn fresh_joints_have_no_mass_until_physics_runs() {
        let mut fabric = factory::octahedron().unwrap();
        assert!(
            validate_after_physics(&fabric)
                .iter()
                .all(|v| matches!(v, Violation::NoMass(_)))
        );
        let mut physics = Physics::new(Weightless);
        physics.set_iterations(3);
        fabric.execute_transformations(Some(&mut physics)).unwrap();
        assert_eq!(validate_after_physics(&fabric), vec![]);
    }

    #[test]
    fn duplicate_identity_is_reported() {
        let mut fabric = Fabric::new();
        fabric
            .run_transformation(&mut from_fn("twins", |f: &mut Fabric| {
                f.add_joint(Who::new(Side::Middle, 1), DVec3::ZERO)?;
                f.add_joint(Who::new(Side::Middle, 1), DVec3::X)?;
                Ok(())
            }))
            .unwrap();
        assert_eq!(
            validate(&fabric),
            vec![Violation::DuplicateWho(Who::new(Side::Middle, 1))]
        );
    }

    #[test]
    fn staged_edits_are_reported() {
        let mut fabric = factory::double_face_triangle().unwrap();
        let face = fabric.faces()[0];
        fabric.remove_face(face).unwrap();
        assert!(validate(&fabric).contains(&Violation::PendingEdits));
    }

    #[test]
    fn round_trip_has_no_diff() {
        let fabric = factory::truss().unwrap();
        let restored = Fablob::from_fabric(&fabric).unwrap().to_fabric().unwrap();
        let diff = diff_fabrics(&fabric, &restored, 0.0);
        assert!(diff.is_identical(), "{diff:?}");
    }

    #[test]
    fn diff_pinpoints_moved_and_missing_joints() {
        let a = factory::double_face_triangle().unwrap();
        let mut b = factory::double_face_triangle().unwrap();
        let first = b.joints()[0];
        b.joint_mut(first).unwrap().location += DVec3::X;
        let who = b.who_of(first).unwrap();
        let diff = diff_fabrics(&a, &b, 1e-9);
        assert_eq!(diff.moved, vec![who]);
        assert!(!diff.is_identical());

        let empty = Fabric::new();
        let diff = diff_fabrics(&a, &empty, 1e-9);
        assert_eq!(diff.only_in_a.len(), 3);
        assert_eq!(diff.role_counts, vec![(Role::Spring, 3, 0)]);
    }
}
