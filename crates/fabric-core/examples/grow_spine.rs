//! Grow example: a ring extruded into a spine, settling under gravity.
//!
//! Grows a six-bar ring, extrudes it into four vertebrae, then runs the
//! vertical environment until no span schedule is active. Set `RUST_LOG`
//! (for example `RUST_LOG=fabric_core=debug`) to watch the growth steps.
//!
//! Run with: `cargo run -p fabric-core --example grow_spine`

use fabric_core::fabric::Fabric;
use fabric_core::interval::Role;
use fabric_core::physics::Physics;
use fabric_core::physics::environment::Vertical;
use fabric_core::transform::PhysicsTransformation;
use fabric_core::transforms::{AboveFloor, GrowVertebra};
use fabric_core::validation::validate_after_physics;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut fabric = Fabric::new();
    let mut grow = GrowVertebra::new(6);
    for _ in 0..5 {
        fabric.run_transformation(&mut grow).unwrap();
    }
    fabric.add_transformation(AboveFloor::new(0.5));

    println!(
        "Grown: {} joints, {} intervals, {} vertebrae",
        fabric.joints().len(),
        fabric.intervals().len(),
        fabric.vertebras().len()
    );

    let mut physics = Physics::new(Vertical);
    physics.set_iterations(100);
    let mut rounds = 0;
    loop {
        fabric.execute_transformations(Some(&mut physics)).unwrap();
        rounds += 1;
        if !fabric.is_any_span_active() || rounds >= 50 {
            break;
        }
    }

    let lowest = fabric
        .joints()
        .iter()
        .filter_map(|id| fabric.joint(*id))
        .map(|joint| joint.location.z)
        .fold(f64::INFINITY, f64::min);
    println!("Settled after {} iterations", fabric.age());
    println!("  lowest joint: z = {lowest:.4}");
    let centre = fabric.center();
    println!("  centre: ({:.3}, {:.3}, {:.3})", centre.x, centre.y, centre.z);

    for role in [Role::Bar, Role::Across, Role::Vertical, Role::Ring] {
        let stresses: Vec<f64> = fabric
            .intervals()
            .iter()
            .filter_map(|id| fabric.interval(*id))
            .filter(|interval| interval.role() == role)
            .map(|interval| interval.span.stress())
            .collect();
        let mean = stresses.iter().sum::<f64>() / stresses.len().max(1) as f64;
        println!("  {role:?}: {} intervals, mean stress {mean:+.6}", stresses.len());
    }

    let violations = validate_after_physics(&fabric);
    assert!(violations.is_empty(), "{violations:?}");
    println!("Fabric is consistent.");
}
