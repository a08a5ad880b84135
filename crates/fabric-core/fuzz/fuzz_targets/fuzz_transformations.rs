#![no_main]
use arbitrary::Arbitrary;
use fabric_core::fablob::Fablob;
use fabric_core::fabric::Fabric;
use fabric_core::factory;
use fabric_core::interval::Role;
use fabric_core::test_utils::*;
use fabric_core::transform::from_fn;
use fabric_core::transforms::{JointMerge, OpenUp, PeriodicTetraAnnihilation};
use fabric_core::validation::validate;
use libfuzzer_sys::fuzz_target;

/// A structured edit for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Open { face: u8 },
    RemoveJoint { index: u8 },
    RemoveInterval { index: u8 },
    Merge { a: u8, b: u8 },
    Annihilate,
    Physics { iterations: u8 },
    Snapshot,
}

/// Top-level fuzz input: a sequence of operations.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    ops: Vec<FuzzOp>,
}

fn pick<T: Copy>(items: &[T], index: u8) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index as usize % items.len()])
    }
}

fuzz_target!(|input: FuzzInput| {
    let Ok(mut fabric) = factory::double_face_triangle() else {
        return;
    };
    let mut physics = weightless(1);

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(100);

    for op in &input.ops[..max_ops] {
        let result = match op {
            FuzzOp::Open { face } => match pick(fabric.faces(), *face) {
                Some(face) => {
                    fabric.run_transformation(&mut OpenUp::new(face, 1.0, 50, Role::Spring))
                }
                None => Ok(()),
            },
            FuzzOp::RemoveJoint { index } => match pick(fabric.joints(), *index) {
                Some(joint) => fabric.run_transformation(&mut from_fn(
                    "remove joint",
                    move |f: &mut Fabric| f.remove_joint(joint),
                )),
                None => Ok(()),
            },
            FuzzOp::RemoveInterval { index } => match pick(fabric.intervals(), *index) {
                Some(interval) => fabric.run_transformation(&mut from_fn(
                    "remove interval",
                    move |f: &mut Fabric| f.remove_interval(interval),
                )),
                None => Ok(()),
            },
            FuzzOp::Merge { a, b } => {
                match (pick(fabric.joints(), *a), pick(fabric.joints(), *b)) {
                    (Some(a), Some(b)) if a != b => {
                        fabric.run_transformation(&mut JointMerge::new(a, b))
                    }
                    _ => Ok(()),
                }
            }
            FuzzOp::Annihilate => {
                fabric.run_transformation(&mut PeriodicTetraAnnihilation::new(0.5))
            }
            FuzzOp::Physics { iterations } => {
                let mut result = Ok(());
                for _ in 0..(*iterations % 16) {
                    result = fabric.execute_transformations(Some(&mut physics));
                    if result.is_err() {
                        break;
                    }
                }
                result
            }
            FuzzOp::Snapshot => {
                if let Ok(blob) = Fablob::from_fabric(&fabric) {
                    let _ = blob.to_fabric();
                }
                Ok(())
            }
        };
        // Failed edits roll back, failed physics does not.
        if result.is_err() && matches!(op, FuzzOp::Physics { .. }) {
            return;
        }
        let _ = validate(&fabric);
    }
});
