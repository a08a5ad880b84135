//! Save/load example: snapshot round-trip.
//!
//! Opens faces of a double-face triangle, relaxes it, keeps periodic
//! snapshots in a ring buffer, and restores the latest one from a
//! length-prefixed byte stream.
//!
//! Run with: `cargo run -p fabric-core --example save_load`

use fabric_core::fablob::{Fablob, SnapshotRingBuffer};
use fabric_core::factory;
use fabric_core::interval::Role;
use fabric_core::physics::Physics;
use fabric_core::physics::environment::Weightless;
use fabric_core::transform::PhysicsTransformation;
use fabric_core::transforms::OpenUp;
use fabric_core::validation::diff_fabrics;

fn main() {
    let mut fabric = factory::double_face_triangle().unwrap();
    for _ in 0..3 {
        let face = fabric.faces()[0];
        fabric
            .run_transformation(&mut OpenUp::new(face, 1.0, 100, Role::Spring))
            .unwrap();
    }

    let mut physics = Physics::new(Weightless);
    physics.set_iterations(25);
    let mut snapshots = SnapshotRingBuffer::new(4);
    for _ in 0..10 {
        fabric.execute_transformations(Some(&mut physics)).unwrap();
        snapshots.record(&fabric).unwrap();
    }
    println!(
        "Recorded {} snapshots, keeping {} (oldest at age {})",
        snapshots.recorded(),
        snapshots.len(),
        snapshots.get(0).map_or(0, |snapshot| snapshot.age)
    );

    let latest = snapshots.latest().unwrap();
    let mut stream = Vec::new();
    latest.blob.write_to(&mut stream).unwrap();
    println!("Latest snapshot: {} bytes on the wire", stream.len());

    let restored = Fablob::read_from(&mut stream.as_slice())
        .unwrap()
        .to_fabric()
        .unwrap();
    let diff = diff_fabrics(&fabric, &restored, 0.0);
    println!(
        "Restored at age {}: {} joints, {} intervals, {} faces",
        restored.age(),
        restored.joints().len(),
        restored.intervals().len(),
        restored.faces().len()
    );
    assert!(diff.is_identical(), "{diff:?}");
    println!("Round-trip identical.");
}
