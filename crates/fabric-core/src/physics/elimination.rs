//! Retiring an expired temporary interval by fusing its two ends.
//!
//! Which end survives is decided purely from the two identities by
//! [`decide`]. After the fusion, duplicate intervals at the survivor are
//! merged and duplicated or opposing faces around it are pruned.

use super::{AMBIENT_JOINT_MASS, INTERVAL_MERGE_ITERATIONS};
use crate::fabric::{Fabric, FabricError};
use crate::id::{IntervalId, JointId};
use crate::interval::Role;
use crate::joint::Joint;
use crate::who::{Side, Who};

/// Outcome of the elimination tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Survivor {
    Alpha,
    Omega,
    /// A LEFT/RIGHT mirror pair: both ends give way to a new MIDDLE joint.
    NewMiddle,
}

/// Decide which end of an expiring interval survives.
///
/// Transient joints never survive a typed one, MIDDLE beats LEFT and RIGHT,
/// and otherwise the lower sequence number wins. Two typed identities that
/// are equal cannot be told apart and are reported as an error.
pub fn decide(alpha: Who, omega: Who) -> Result<Survivor, FabricError> {
    use Side::*;
    let lower_id = || {
        if alpha.id < omega.id {
            Some(Survivor::Alpha)
        } else if alpha.id > omega.id {
            Some(Survivor::Omega)
        } else {
            None
        }
    };
    if alpha.side == omega.side {
        return match alpha.side {
            Temporary | Eliminated => Ok(Survivor::Omega),
            Left | Right | Middle => lower_id().ok_or(FabricError::SameJoint(alpha, omega)),
        };
    }
    match (alpha.side, omega.side) {
        (Temporary | Eliminated, _) => Ok(Survivor::Omega),
        (_, Temporary | Eliminated) => Ok(Survivor::Alpha),
        (Left | Right, Middle) => Ok(Survivor::Omega),
        (Middle, Left | Right) => Ok(Survivor::Alpha),
        (Left, Right) | (Right, Left) => Ok(lower_id().unwrap_or(Survivor::NewMiddle)),
        _ => Err(FabricError::UndecidableElimination(alpha, omega)),
    }
}

/// Retire `interval` and fuse its ends.
pub(crate) fn eliminate(fabric: &mut Fabric, interval: IntervalId) -> Result<(), FabricError> {
    let (alpha, omega) = {
        let interval = fabric.require_interval(interval)?;
        (interval.alpha(), interval.omega())
    };
    let (alpha_who, omega_who) = (fabric.who_of(alpha)?, fabric.who_of(omega)?);
    tracing::info!(age = fabric.age(), %alpha_who, %omega_who, "eliminating");
    fabric.remove_interval(interval)?;
    if !fabric.real_intervals(alpha, omega).is_empty() {
        return Err(FabricError::OtherIntervals(alpha_who, omega_who));
    }
    match decide(alpha_who, omega_who)? {
        Survivor::Alpha => replace(fabric, omega, alpha),
        Survivor::Omega => replace(fabric, alpha, omega),
        Survivor::NewMiddle => replace_to_middle(fabric, interval, alpha, omega),
    }
}

/// Fold `from` into `to`, which moves to their midpoint.
fn replace(fabric: &mut Fabric, from: JointId, to: JointId) -> Result<(), FabricError> {
    let midpoint = (fabric.location(from)? + fabric.location(to)?) * 0.5;
    fabric.require_joint_mut(to)?.location = midpoint;
    fabric.replace(from, to)?;
    fabric.retire_joint(from)?;
    merge_multiple_intervals(fabric, to)?;
    remove_redundant_faces(fabric, to)
}

/// Fold a mirror pair into a new MIDDLE joint between them.
fn replace_to_middle(
    fabric: &mut Fabric,
    interval: IntervalId,
    alpha: JointId,
    omega: JointId,
) -> Result<(), FabricError> {
    let who = fabric.create_who(Side::Middle);
    let mut joint = Joint::new(who, fabric.interval_midpoint(interval)?);
    joint.set_mass(AMBIENT_JOINT_MASS);
    let middle = fabric.insert_joint(joint)?;
    fabric.replace(alpha, middle)?;
    fabric.replace(omega, middle)?;
    fabric.retire_joint(alpha)?;
    fabric.retire_joint(omega)?;
    merge_multiple_intervals(fabric, middle)?;
    remove_redundant_faces(fabric, middle)?;
    remove_tetras_and_inner_faces(fabric, middle)
}

/// Merge every group of parallel real intervals at `joint` into one.
///
/// Running this on a joint without parallel intervals changes nothing.
pub fn merge_multiple_intervals(fabric: &mut Fabric, joint: JointId) -> Result<(), FabricError> {
    let mut others: Vec<JointId> = Vec::new();
    for id in fabric.intervals_of(joint) {
        let interval = fabric.require_interval(id)?;
        if !interval.role().is_structural() {
            continue;
        }
        let Some(other) = interval.other(joint) else {
            continue;
        };
        if fabric.require_joint(other)?.is_eliminated() {
            continue;
        }
        if let Some(index) = others.iter().position(|o| *o == other) {
            merge_pair(fabric, joint, other)?;
            others.swap_remove(index);
        } else {
            others.push(other);
        }
    }
    Ok(())
}

fn merge_pair(fabric: &mut Fabric, a: JointId, b: JointId) -> Result<(), FabricError> {
    let multiples = fabric.real_intervals(a, b);
    let mut role: Option<Role> = None;
    let mut total = 0.0;
    for &id in &multiples {
        let member = fabric.require_interval(id)?;
        role = match role {
            None => Some(member.role()),
            Some(role) if role == member.role() => Some(role),
            Some(_) => {
                tracing::info!("mixed roles merge into a spring");
                Some(Role::Spring)
            }
        };
        total += member.span.ultimate_ideal();
        tracing::debug!(age = fabric.age(), role = ?member.role(), "removing multiple");
        fabric.retire_interval(id)?;
    }
    let count = multiples.len().max(1) as f64;
    let merged = fabric.add_interval(a, b, role.unwrap_or(Role::Spring))?;
    fabric
        .require_interval_mut(merged)?
        .span
        .set_ideal(total / count, INTERVAL_MERGE_ITERATIONS);
    tracing::info!(
        age = fabric.age(),
        count = multiples.len(),
        "replaced multiple intervals with one"
    );
    Ok(())
}

/// Prune faces around `joint` that now share all their joints: agreeing
/// duplicates collapse to one, opposing pairs both go.
pub fn remove_redundant_faces(fabric: &mut Fabric, joint: JointId) -> Result<(), FabricError> {
    let faces = fabric.faces_of(joint);
    tracing::debug!(age = fabric.age(), count = faces.len(), "removing redundant faces");
    for (walk, &a) in faces.iter().enumerate() {
        if fabric.is_face_removed(a) {
            continue;
        }
        for &b in &faces[walk + 1..] {
            if fabric.is_face_removed(b) {
                continue;
            }
            let same = fabric.require_face(a)?.same_joints_as(fabric.require_face(b)?);
            if !same {
                continue;
            }
            let dot = fabric.face_normal(a)?.dot(fabric.face_normal(b)?);
            if dot > 0.0 {
                tracing::info!(age = fabric.age(), "double agreeing face, one removed");
                fabric.retire_face(b)?;
            } else {
                tracing::info!(age = fabric.age(), "opposing faces, both removed");
                fabric.retire_face(a)?;
                fabric.retire_face(b)?;
            }
        }
    }
    Ok(())
}

/// After a mirror merge, tetras around `joint` sharing a triangle lose the
/// faces on that triangle, and tetras sharing all four joints are
/// deduplicated.
fn remove_tetras_and_inner_faces(fabric: &mut Fabric, joint: JointId) -> Result<(), FabricError> {
    let tetras = fabric.tetras_of(joint);
    for (walk, &a) in tetras.iter().enumerate() {
        for &b in &tetras[walk + 1..] {
            let common = fabric
                .require_tetra(a)?
                .common_joints_with(fabric.require_tetra(b)?);
            match common.as_slice() {
                [x, y, z] => {
                    for face in fabric.faces_with(*x, *y, *z) {
                        fabric.retire_face(face)?;
                    }
                }
                [_, _, _, _] => fabric.retire_tetra(b)?,
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn who(side: Side, id: u32) -> Who {
        Who::new(side, id)
    }

    #[test]
    fn lower_id_survives_within_a_side() {
        for side in [Side::Middle, Side::Left, Side::Right] {
            assert_eq!(decide(who(side, 1), who(side, 2)).unwrap(), Survivor::Alpha);
            assert_eq!(decide(who(side, 5), who(side, 2)).unwrap(), Survivor::Omega);
        }
    }

    #[test]
    fn identical_typed_identities_are_an_error() {
        let err = decide(who(Side::Left, 3), who(Side::Left, 3)).unwrap_err();
        assert!(matches!(err, FabricError::SameJoint(..)));
    }

    #[test]
    fn transient_ends_never_survive_typed_ones() {
        assert_eq!(
            decide(who(Side::Temporary, 0), who(Side::Left, 9)).unwrap(),
            Survivor::Omega
        );
        assert_eq!(
            decide(who(Side::Middle, 9), who(Side::Eliminated, 0)).unwrap(),
            Survivor::Alpha
        );
        assert_eq!(
            decide(who(Side::Temporary, 4), who(Side::Temporary, 1)).unwrap(),
            Survivor::Omega
        );
    }

    #[test]
    fn middle_beats_left_and_right() {
        assert_eq!(
            decide(who(Side::Left, 0), who(Side::Middle, 7)).unwrap(),
            Survivor::Omega
        );
        assert_eq!(
            decide(who(Side::Middle, 7), who(Side::Right, 0)).unwrap(),
            Survivor::Alpha
        );
    }

    #[test]
    fn mirror_pair_creates_a_middle() {
        assert_eq!(
            decide(who(Side::Left, 4), who(Side::Right, 4)).unwrap(),
            Survivor::NewMiddle
        );
        assert_eq!(
            decide(who(Side::Right, 2), who(Side::Left, 4)).unwrap(),
            Survivor::Alpha
        );
    }
}
