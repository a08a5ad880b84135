//! Canned starting fabrics.
//!
//! Each builder stages its entities through a single transformation, so the
//! returned fabric has everything committed and nothing pending.

use crate::face::{Chirality, Face, Order};
use crate::fabric::{Fabric, FabricError};
use crate::geodesic;
use crate::id::{IntervalId, JointId};
use crate::interval::Role;
use crate::transform::from_fn;
use crate::vertebra::Vertebra;
use crate::who::Side;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

fn build(
    name: &str,
    f: impl FnMut(&mut Fabric) -> Result<(), FabricError> + Send,
) -> Result<Fabric, FabricError> {
    let mut fabric = Fabric::new();
    fabric.run_transformation(&mut from_fn(name, f))?;
    Ok(fabric)
}

fn joint(fabric: &mut Fabric, side: Side, location: DVec3) -> Result<JointId, FabricError> {
    let who = fabric.create_who(side);
    fabric.add_joint(who, location)
}

fn face(
    fabric: &mut Fabric,
    order: Order,
    joints: [JointId; 3],
    stress_interval: Option<IntervalId>,
) -> Result<(), FabricError> {
    let mut face = Face::new(order, joints.to_vec());
    face.stress_interval = stress_interval;
    fabric.add_face(face)?;
    Ok(())
}

/// Three MIDDLE joints, three unit springs, and a face of each winding over
/// the same triangle.
pub fn double_face_triangle() -> Result<Fabric, FabricError> {
    build("double face triangle", |fabric| {
        let radius = (3.0f64 / 4.0).sqrt() * 2.0 / 3.0;
        let mut joints = Vec::with_capacity(3);
        for walk in 0..3 {
            let angle = walk as f64 * PI * 2.0 / 3.0;
            let location = DVec3::new(
                radius * angle.cos(),
                0.0,
                radius + radius * angle.sin(),
            );
            joints.push(joint(fabric, Side::Middle, location)?);
        }
        for walk in 0..3 {
            let spring = fabric.add_interval(joints[walk], joints[(walk + 1) % 3], Role::Spring)?;
            fabric.require_interval_mut(spring)?.span.set_ideal(1.0, 0);
        }
        for order in [Order::RightHanded, Order::LeftHanded] {
            fabric.add_face(Face::new(order, joints.clone()))?;
        }
        Ok(())
    })
}

/// A square of MIDDLE joints in the x/z plane capped by a LEFT joint and its
/// RIGHT mirror, fully triangulated with springs.
pub fn octahedron() -> Result<Fabric, FabricError> {
    build("octahedron", |fabric| {
        let radius = 2f64.sqrt() / 2.0;
        let mut square = Vec::with_capacity(4);
        for walk in 0..4 {
            let angle = walk as f64 * PI / 2.0 + PI / 4.0;
            let location = DVec3::new(
                radius * angle.cos(),
                0.0,
                radius + radius * angle.sin(),
            );
            square.push(joint(fabric, Side::Middle, location)?);
        }
        let left = fabric.create_who(Side::Left);
        let right = left.opposite().unwrap_or(left);
        let left = fabric.add_joint(left, DVec3::new(0.0, -radius, radius))?;
        let right = fabric.add_joint(right, DVec3::new(0.0, radius, radius))?;
        for walk in 0..4 {
            fabric.add_interval(square[walk], square[(walk + 1) % 4], Role::Spring)?;
            fabric.add_interval(square[walk], left, Role::Spring)?;
            fabric.add_interval(square[walk], right, Role::Spring)?;
        }
        for walk in 0..4 {
            let next = square[(walk + 1) % 4];
            face(fabric, Order::LeftHanded, [left, square[walk], next], None)?;
            face(fabric, Order::RightHanded, [right, square[walk], next], None)?;
        }
        Ok(())
    })
}

/// A planar frame of six MIDDLE joints braced on either side by LEFT and
/// RIGHT joints, with each face coloured by the frame spring it rests on.
pub fn truss() -> Result<Fabric, FabricError> {
    build("truss", |fabric| {
        let middle = |fabric: &mut Fabric, x, z| joint(fabric, Side::Middle, DVec3::new(x, 0.0, z));
        let tz = middle(fabric, 0.0, 0.5)?;
        let tp = middle(fabric, 1.0, 0.5)?;
        let bp = middle(fabric, 1.0, -0.5)?;
        let bz = middle(fabric, 0.0, -0.5)?;
        let bn = middle(fabric, -1.0, -0.5)?;
        let tn = middle(fabric, -1.0, 0.5)?;
        let tztp = fabric.add_interval(tz, tp, Role::Spring)?;
        let tpbp = fabric.add_interval(tp, bp, Role::Spring)?;
        let bpbz = fabric.add_interval(bp, bz, Role::Spring)?;
        let bzbn = fabric.add_interval(bz, bn, Role::Spring)?;
        let bntn = fabric.add_interval(bn, tn, Role::Spring)?;
        let tntz = fabric.add_interval(tn, tz, Role::Spring)?;
        fabric.add_interval(tz, bz, Role::Spring)?;

        let rad = 2f64.sqrt() / 2.0;
        let lp = joint(fabric, Side::Left, DVec3::new(0.5, rad, 0.0))?;
        let rp = joint(fabric, Side::Right, DVec3::new(0.5, -rad, 0.0))?;
        let ln = joint(fabric, Side::Left, DVec3::new(-0.5, rad, 0.0))?;
        let rn = joint(fabric, Side::Right, DVec3::new(-0.5, -rad, 0.0))?;
        for (brace, frame) in [(lp, [tz, tp, bp, bz]), (rp, [tz, tp, bp, bz])] {
            for end in frame {
                fabric.add_interval(end, brace, Role::Spring)?;
            }
        }
        for (brace, frame) in [(ln, [bz, bn, tn, tz]), (rn, [bz, bn, tn, tz])] {
            for end in frame {
                fabric.add_interval(end, brace, Role::Spring)?;
            }
        }
        let lpln = fabric.add_interval(lp, ln, Role::Spring)?;
        let rprn = fabric.add_interval(rp, rn, Role::Spring)?;

        use Order::{LeftHanded as L, RightHanded as R};
        let faces = [
            (R, [tz, tp, rp], tztp),
            (R, [tp, bp, rp], tpbp),
            (R, [bp, bz, rp], bpbz),
            (L, [tz, tp, lp], tztp),
            (L, [tp, bp, lp], tpbp),
            (L, [bp, bz, lp], bpbz),
            (L, [tz, tn, rn], tntz),
            (L, [tn, bn, rn], bntn),
            (L, [bn, bz, rn], bzbn),
            (R, [tz, tn, ln], tntz),
            (R, [tn, bn, ln], bntn),
            (R, [bn, bz, ln], bzbn),
            (L, [tz, rn, rp], rprn),
            (L, [bz, ln, lp], lpln),
            (R, [tz, ln, lp], lpln),
            (R, [bz, rn, rp], rprn),
        ];
        for (order, joints, stress) in faces {
            face(fabric, order, joints, Some(stress))?;
        }
        Ok(())
    })
}

/// Two hexagonal rings of MIDDLE joints joined by cables and three bars,
/// committed as one [`Vertebra`]. The bars lean one way or the other by
/// chirality.
pub fn vertebra(chirality: Chirality) -> Result<Fabric, FabricError> {
    build("vertebra", move |fabric| {
        let (height, radius) = (1.0, 1.0);
        let mut all = Vec::with_capacity(12);
        for hex in 0..2 {
            let mut ring = Vec::with_capacity(6);
            for walk in 0..6 {
                let angle = walk as f64 * PI / 3.0;
                let location = DVec3::new(
                    radius * angle.sin(),
                    radius * angle.cos(),
                    height * hex as f64,
                );
                ring.push(joint(fabric, Side::Middle, location)?);
            }
            for walk in 0..6 {
                let cable = fabric.add_interval(ring[walk], ring[(walk + 1) % 6], Role::Cable)?;
                let span = &mut fabric.require_interval_mut(cable)?.span;
                let target = span.actual() * 0.5;
                span.set_ideal(target, 100);
            }
            let corners = [ring[5 - hex], ring[3 - hex], ring[1 - hex]];
            for walk in 0..3 {
                fabric.add_interval(corners[walk], corners[(walk + 1) % 3], Role::Spring)?;
            }
            let order = if hex == 0 {
                Order::RightHanded
            } else {
                Order::LeftHanded
            };
            face(fabric, order, corners, None)?;
            let lift = if hex == 0 { 0.25 } else { -0.25 };
            for corner in corners {
                fabric.require_joint_mut(corner)?.location.z += lift;
            }
            all.extend(ring);
        }
        for walk in 0..6 {
            let cable = fabric.add_interval(all[walk], all[walk + 6], Role::Cable)?;
            let span = &mut fabric.require_interval_mut(cable)?.span;
            let target = span.actual() * 0.9;
            span.set_ideal(target, 100);
            if walk % 2 == 0 {
                let across = 6 + (walk + 1 + chirality.ordinal() * 4) % 6;
                fabric.add_interval(all[walk], all[across], Role::Bar)?;
            }
        }
        fabric.add_vertebra(Vertebra::new(
            all.clone(),
            chirality == Chirality::RightHanded,
        ))?;
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Tensegrity sphere
// ---------------------------------------------------------------------------

/// Proportions of a [`tensegrity_sphere_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereShape {
    /// Bar length as a multiple of the geodesic edge.
    pub bar_extend: f64,
    /// Radians each bar is turned about the radius through its middle.
    pub bar_twist: f64,
    /// Common slack applied to every cable.
    pub relax: f64,
    /// Circle cable length factor, shared among a vertex's neighbours.
    pub circles: f64,
    /// Connector cable length factor.
    pub connector: f64,
}

impl Default for SphereShape {
    fn default() -> Self {
        Self {
            bar_extend: 1.2,
            bar_twist: 0.52,
            relax: 1.5,
            circles: 0.93,
            connector: 0.55,
        }
    }
}

/// [`tensegrity_sphere_with`] in the default shape.
pub fn tensegrity_sphere(frequency: usize, edge_length: f64) -> Result<Fabric, FabricError> {
    tensegrity_sphere_with(frequency, edge_length, SphereShape::default())
}

/// A geodesic tensegrity sphere.
///
/// Every geodesic vertex holds one MIDDLE joint per neighbour. Each
/// geodesic edge becomes a bar between the two vertices' joints, lengthened
/// about its middle and twisted about the radius. Circle cables tie each
/// vertex's joints into a ring, and one connector cable per bar joins the
/// ring joints that follow its two ends.
///
/// A frequency `f` sphere has `60 f²` joints, `30 f²` bars and `90 f²`
/// cables.
pub fn tensegrity_sphere_with(
    frequency: usize,
    edge_length: f64,
    shape: SphereShape,
) -> Result<Fabric, FabricError> {
    let vertices = geodesic::sphere(frequency);
    build("tensegrity sphere", move |fabric| {
        let scale = match vertices.first() {
            Some(corner) => {
                let near = vertices[corner.nearby[0]].location;
                edge_length / corner.location.distance(near)
            }
            None => return Ok(()),
        };
        let mut hubs: Vec<Vec<JointId>> = Vec::with_capacity(vertices.len());
        for vertex in &vertices {
            let mut hub = Vec::with_capacity(vertex.nearby.len());
            for _ in &vertex.nearby {
                hub.push(joint(fabric, Side::Middle, vertex.location * scale)?);
            }
            hubs.push(hub);
        }
        // Slot of `from` among the neighbours of `to`.
        let slot = |from: usize, to: usize| vertices[to].nearby.iter().position(|n| *n == from);

        let mut bars: Vec<(JointId, JointId)> = Vec::new();
        for (here, vertex) in vertices.iter().enumerate() {
            for (walk, &there) in vertex.nearby.iter().enumerate() {
                if there < here {
                    continue;
                }
                let back = slot(here, there).ok_or_else(|| {
                    FabricError::StructureGone(format!("sphere vertex {there} lost {here}"))
                })?;
                let (alpha, omega) = (hubs[here][walk], hubs[there][back]);
                sphere_bar(fabric, alpha, omega, &shape)?;
                bars.push((alpha, omega));
            }
        }

        // The ring joint following each joint around its vertex.
        let mut next: HashMap<JointId, JointId> = HashMap::new();
        for (vertex, hub) in vertices.iter().zip(&hubs) {
            let factor = shape.relax * shape.circles / vertex.nearby.len() as f64;
            for walk in 0..hub.len() {
                let (a, b) = (hub[walk], hub[(walk + 1) % hub.len()]);
                sphere_cable(fabric, a, b, factor)?;
                next.insert(a, b);
            }
        }
        for (alpha, omega) in bars {
            if let (Some(&a), Some(&b)) = (next.get(&alpha), next.get(&omega)) {
                sphere_cable(fabric, a, b, shape.relax * shape.connector)?;
            }
        }
        Ok(())
    })
}

/// Stage a bar, stretch it about its middle to its extended length and turn
/// it about the radius through that middle.
fn sphere_bar(
    fabric: &mut Fabric,
    alpha: JointId,
    omega: JointId,
    shape: &SphereShape,
) -> Result<(), FabricError> {
    let (from, to) = (fabric.location(alpha)?, fabric.location(omega)?);
    let length = from.distance(to);
    let ideal = length * shape.bar_extend;
    let unit = (to - from).normalize_or_zero();
    let middle = (from + to) * 0.5;
    let twist = DQuat::from_axis_angle(middle.normalize_or_zero(), -shape.bar_twist);
    fabric.require_joint_mut(alpha)?.location = twist * (middle - unit * (ideal / 2.0));
    fabric.require_joint_mut(omega)?.location = twist * (middle + unit * (ideal / 2.0));
    let bar = fabric.add_interval(alpha, omega, Role::Bar)?;
    fabric.require_interval_mut(bar)?.span.set_ideal(ideal, 0);
    Ok(())
}

fn sphere_cable(fabric: &mut Fabric, a: JointId, b: JointId, factor: f64) -> Result<(), FabricError> {
    let cable = fabric.add_interval(a, b, Role::Cable)?;
    let span = &mut fabric.require_interval_mut(cable)?.span;
    let ideal = span.current_ideal() * factor;
    span.set_ideal(ideal, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_face_triangle_counts() {
        let fabric = double_face_triangle().unwrap();
        assert_eq!(fabric.joints().len(), 3);
        assert_eq!(fabric.intervals().len(), 3);
        assert_eq!(fabric.faces().len(), 2);
        for &id in fabric.intervals() {
            let interval = fabric.interval(id).unwrap();
            assert_eq!(interval.span.current_ideal(), 1.0);
            assert!((interval.span.actual() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn double_face_triangle_faces_oppose() {
        let fabric = double_face_triangle().unwrap();
        let a = fabric.face_normal(fabric.faces()[0]).unwrap();
        let b = fabric.face_normal(fabric.faces()[1]).unwrap();
        assert!(a.dot(b) < -0.99);
    }

    #[test]
    fn octahedron_counts_and_mirror() {
        let fabric = octahedron().unwrap();
        assert_eq!(fabric.joints().len(), 6);
        assert_eq!(fabric.intervals().len(), 12);
        assert_eq!(fabric.faces().len(), 8);
        let left = fabric.who_of(fabric.joints()[4]).unwrap();
        let right = fabric.who_of(fabric.joints()[5]).unwrap();
        assert!(left.is_mirror_of(right));
    }

    #[test]
    fn truss_faces_carry_stress_intervals() {
        let fabric = truss().unwrap();
        assert_eq!(fabric.joints().len(), 10);
        assert_eq!(fabric.intervals().len(), 25);
        assert_eq!(fabric.faces().len(), 16);
        assert!(
            fabric
                .faces()
                .iter()
                .all(|f| fabric.face(*f).unwrap().stress_interval.is_some())
        );
    }

    #[test]
    fn vertebra_bars_follow_chirality() {
        let left = vertebra(Chirality::LeftHanded).unwrap();
        let right = vertebra(Chirality::RightHanded).unwrap();
        for fabric in [&left, &right] {
            assert_eq!(fabric.joints().len(), 12);
            assert_eq!(fabric.vertebras().len(), 1);
            let bars = fabric
                .intervals()
                .iter()
                .filter(|i| fabric.interval(**i).unwrap().role() == Role::Bar)
                .count();
            assert_eq!(bars, 3);
        }
        let bar_omega = |fabric: &Fabric| {
            fabric
                .intervals()
                .iter()
                .map(|i| fabric.interval(*i).unwrap())
                .find(|i| i.role() == Role::Bar)
                .map(|i| i.omega())
        };
        assert_ne!(
            left.joints().iter().position(|j| Some(*j) == bar_omega(&left)),
            right.joints().iter().position(|j| Some(*j) == bar_omega(&right))
        );
    }

    #[test]
    fn tensegrity_sphere_counts_follow_the_frequency() {
        for frequency in 1..=2 {
            let fabric = tensegrity_sphere(frequency, 1.0).unwrap();
            let f2 = frequency * frequency;
            assert_eq!(fabric.joints().len(), 60 * f2);
            assert_eq!(fabric.intervals().len(), 120 * f2);
            let count = |role: Role| {
                fabric
                    .intervals()
                    .iter()
                    .filter(|i| fabric.interval(**i).unwrap().role() == role)
                    .count()
            };
            assert_eq!(count(Role::Bar), 30 * f2);
            assert_eq!(count(Role::Cable), 90 * f2);
            assert!(fabric.faces().is_empty());
            assert_eq!(crate::validation::validate(&fabric), vec![]);
        }
    }

    #[test]
    fn tensegrity_sphere_bars_are_extended_edges() {
        let fabric = tensegrity_sphere(1, 2.0).unwrap();
        for &id in fabric.intervals() {
            let interval = fabric.interval(id).unwrap();
            if interval.role() != Role::Bar {
                continue;
            }
            let (alpha, omega) = fabric.interval_ends(id).unwrap();
            assert!((alpha.distance(omega) - 2.4).abs() < 1e-9);
            assert_eq!(interval.span.current_ideal(), interval.span.ultimate_ideal());
        }
    }

    #[test]
    fn tensegrity_sphere_holds_together_under_physics() {
        let mut fabric = tensegrity_sphere(1, 1.0).unwrap();
        let mut physics = crate::test_utils::weightless(20);
        fabric.run_transformation(&mut physics).unwrap();
        assert_eq!(crate::validation::validate_after_physics(&fabric), vec![]);
    }
}
