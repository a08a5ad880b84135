//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::fabric::{Fabric, FabricError};
use crate::factory;
use crate::id::{FaceId, JointId};
use crate::interval::Role;
use crate::physics::Physics;
use crate::physics::environment::Weightless;
use crate::transform::{PhysicsTransformation, from_fn};
use crate::transforms::{GrowVertebra, OpenUp};
use crate::who::Side;
use glam::DVec3;
use std::sync::{Arc, Mutex};

// ===========================================================================
// Counting
// ===========================================================================

/// Sizes of every live collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub joints: usize,
    pub intervals: usize,
    pub faces: usize,
    pub tetras: usize,
    pub vertebras: usize,
}

pub fn counts(fabric: &Fabric) -> Counts {
    Counts {
        joints: fabric.joints().len(),
        intervals: fabric.intervals().len(),
        faces: fabric.faces().len(),
        tetras: fabric.tetras().len(),
        vertebras: fabric.vertebras().len(),
    }
}

pub fn role_count(fabric: &Fabric, role: Role) -> usize {
    fabric
        .intervals()
        .iter()
        .filter_map(|id| fabric.interval(*id))
        .filter(|interval| interval.role() == role)
        .count()
}

// ===========================================================================
// Builders
// ===========================================================================

/// Commit joints at the given locations, all on `side`.
pub fn joints_at(fabric: &mut Fabric, side: Side, locations: &[DVec3]) -> Vec<JointId> {
    let locations = locations.to_vec();
    let before = fabric.joints().len();
    fabric
        .run_transformation(&mut from_fn("joints", move |f: &mut Fabric| {
            for location in &locations {
                let who = f.create_who(side);
                f.add_joint(who, *location)?;
            }
            Ok(())
        }))
        .expect("joints commit");
    fabric.joints()[before..].to_vec()
}

/// Open `face` with springs and report the three faces around the apex:
/// the first new face, the original face, and the second new face.
pub fn open(fabric: &mut Fabric, face: FaceId) -> Result<[FaceId; 3], FabricError> {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let mut open_up = OpenUp::new(face, 1.0, 100, Role::Spring).on_faces(move |_, faces| {
        *sink.lock().expect("callback lock") = Some(faces);
    });
    fabric.run_transformation(&mut open_up)?;
    let faces = seen.lock().expect("callback lock").take();
    faces.ok_or(FabricError::StructureGone(format!("face {face:?} did not open")))
}

/// A double-face triangle opened five times along a chain of faces:
/// 8 joints, 18 intervals, 12 faces.
pub fn pentagon() -> Fabric {
    let mut fabric = factory::double_face_triangle().expect("triangle");
    let first = fabric.faces()[0];
    let [a, _, _] = open(&mut fabric, first).expect("open");
    let [b, _, _] = open(&mut fabric, a).expect("open");
    let [_, c, _] = open(&mut fabric, b).expect("open");
    let [_, d, _] = open(&mut fabric, c).expect("open");
    open(&mut fabric, d).expect("open");
    fabric
}

/// A fresh braced ring of `bar_count * 2` joints.
pub fn grown_ring(bar_count: usize) -> Fabric {
    let mut fabric = Fabric::new();
    fabric.add_transformation(GrowVertebra::new(bar_count));
    fabric.execute_transformations(None).expect("ring grows");
    fabric
}

// ===========================================================================
// Physics
// ===========================================================================

/// Physics without gravity or ground, so tests only see elastic forces.
pub fn weightless(iterations: u32) -> Physics {
    let mut physics = Physics::new(Weightless);
    physics.set_iterations(iterations);
    physics
}

/// Run physics until no span schedule is active or `max_rounds` runs out.
/// Returns the number of rounds taken.
pub fn settle(fabric: &mut Fabric, physics: &mut Physics, max_rounds: usize) -> usize {
    for round in 0..max_rounds {
        fabric
            .execute_transformations(Some(&mut *physics))
            .expect("physics step");
        if !fabric.is_any_span_active() {
            return round + 1;
        }
    }
    max_rounds
}
