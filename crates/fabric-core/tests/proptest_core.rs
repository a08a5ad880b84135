//! Property-based tests for the fabric core.
//!
//! Uses proptest to generate identities, schedules and growth sequences,
//! then verify the invariants the simulator relies on.

use fabric_core::fablob::Fablob;
use fabric_core::fabric::Fabric;
use fabric_core::factory;
use fabric_core::interval::Role;
use fabric_core::physics::elimination::{Survivor, decide, merge_multiple_intervals};
use fabric_core::span::Span;
use fabric_core::test_utils::*;
use fabric_core::transform::from_fn;
use fabric_core::validation::{diff_fabrics, validate};
use fabric_core::who::{Side, Who};
use glam::DVec3;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![
        Just(Side::Middle),
        Just(Side::Left),
        Just(Side::Right),
        Just(Side::Temporary),
    ]
}

fn arb_who() -> impl Strategy<Value = Who> {
    (arb_side(), 0..50u32).prop_map(|(side, id)| Who::new(side, id))
}

/// Two identities that an elimination can always tell apart.
fn arb_distinct_pair() -> impl Strategy<Value = (Who, Who)> {
    (arb_who(), arb_who()).prop_filter("distinguishable", |(a, b)| {
        a != b && !(a.side == Side::Temporary && b.side == Side::Temporary)
    })
}

/// A fabric grown from the double-face triangle by opening the faces picked
/// by `picks`, each index taken modulo the current face count.
fn grown(picks: &[usize]) -> Fabric {
    let mut fabric = factory::double_face_triangle().unwrap();
    for pick in picks {
        let face = fabric.faces()[pick % fabric.faces().len()];
        open(&mut fabric, face).unwrap();
    }
    fabric
}

// ===========================================================================
// Elimination tie-break
// ===========================================================================

proptest! {
    #[test]
    fn tie_break_is_total_and_consistent((a, b) in arb_distinct_pair()) {
        let forward = decide(a, b).unwrap();
        let backward = decide(b, a).unwrap();
        let expected = match forward {
            Survivor::Alpha => Survivor::Omega,
            Survivor::Omega => Survivor::Alpha,
            Survivor::NewMiddle => Survivor::NewMiddle,
        };
        prop_assert_eq!(backward, expected);
    }

    #[test]
    fn typed_joints_outlive_temporary_ones(typed in arb_who(), id in 0..50u32) {
        prop_assume!(typed.side != Side::Temporary);
        let temporary = Who::new(Side::Temporary, id);
        prop_assert_eq!(decide(typed, temporary).unwrap(), Survivor::Alpha);
        prop_assert_eq!(decide(temporary, typed).unwrap(), Survivor::Omega);
    }

    #[test]
    fn mirror_pairs_yield_a_new_middle(id in 0..50u32) {
        let left = Who::new(Side::Left, id);
        let right = Who::new(Side::Right, id);
        prop_assert_eq!(decide(left, right).unwrap(), Survivor::NewMiddle);
    }
}

// ===========================================================================
// Span schedules
// ===========================================================================

proptest! {
    #[test]
    fn schedule_lands_on_its_target_tick(
        start in 0.1f64..10.0,
        target in 0.1f64..10.0,
        how_long in 1u32..300,
        first_age in 0u64..1000,
    ) {
        let mut span = Span::new(start);
        span.set_ideal(target, how_long);
        let (low, high) = (start.min(target), start.max(target));
        for tick in 0..u64::from(how_long) - 1 {
            prop_assert!(span.experience_time(first_age + tick));
            let ideal = span.current_ideal();
            prop_assert!(ideal >= low - 1e-9 && ideal <= high + 1e-9);
        }
        prop_assert!(!span.experience_time(first_age + u64::from(how_long) - 1));
        prop_assert_eq!(span.current_ideal(), target);
    }

    #[test]
    fn ultimate_ideal_is_the_last_target(
        targets in proptest::collection::vec((0.1f64..5.0, 0u32..20), 1..6),
    ) {
        let mut span = Span::new(1.0);
        for &(value, how_long) in &targets {
            span.set_ideal(value, how_long);
        }
        let last_scheduled = targets.iter().rev().find(|(_, how_long)| *how_long > 0);
        let expected = match last_scheduled {
            Some(&(value, _)) => value,
            None => targets.last().map(|(value, _)| *value).unwrap(),
        };
        prop_assert_eq!(span.ultimate_ideal(), expected);

        let mut age = 0;
        while span.experience_time(age) {
            age += 1;
        }
        prop_assert_eq!(span.current_ideal(), expected);
    }
}

// ===========================================================================
// Interval merging
// ===========================================================================

proptest! {
    #[test]
    fn merging_parallel_intervals_is_idempotent(
        multiplicity in proptest::collection::vec(1usize..4, 1..6),
    ) {
        let mut fabric = Fabric::new();
        let mut locations = vec![DVec3::ZERO];
        for walk in 0..multiplicity.len() {
            let angle = walk as f64;
            locations.push(DVec3::new(angle.cos(), angle.sin(), 0.0));
        }
        let joints = joints_at(&mut fabric, Side::Middle, &locations);
        let hub = joints[0];
        let spokes = joints[1..].to_vec();
        let copies = multiplicity.clone();
        fabric
            .run_transformation(&mut from_fn("spokes", move |f: &mut Fabric| {
                for (spoke, count) in spokes.iter().zip(&copies) {
                    for _ in 0..*count {
                        f.add_interval(hub, *spoke, Role::Spring)?;
                    }
                }
                Ok(())
            }))
            .unwrap();

        let merge = |fabric: &mut Fabric| {
            fabric
                .run_transformation(&mut from_fn("merge", move |f: &mut Fabric| {
                    merge_multiple_intervals(f, hub)
                }))
                .unwrap();
        };
        merge(&mut fabric);
        prop_assert_eq!(fabric.intervals().len(), multiplicity.len());
        let once: Vec<_> = fabric.intervals().to_vec();
        merge(&mut fabric);
        prop_assert_eq!(fabric.intervals().to_vec(), once);
        prop_assert_eq!(validate(&fabric), vec![]);
    }
}

// ===========================================================================
// Codec
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn codec_round_trip_preserves_grown_fabrics(
        picks in proptest::collection::vec(0usize..64, 0..6),
        iterations in 0u32..30,
    ) {
        let mut fabric = grown(&picks);
        let mut physics = weightless(iterations);
        fabric.execute_transformations(Some(&mut physics)).unwrap();

        let blob = Fablob::from_fabric(&fabric).unwrap();
        let restored = blob.to_fabric().unwrap();
        prop_assert!(diff_fabrics(&fabric, &restored, 0.0).is_identical());
        prop_assert_eq!(counts(&restored), counts(&fabric));
        prop_assert_eq!(restored.who_factory(), fabric.who_factory());

        let again = Fablob::from_fabric(&restored).unwrap();
        prop_assert_eq!(again.bytes(), blob.bytes());
    }

    #[test]
    fn growth_keeps_the_fabric_consistent(
        picks in proptest::collection::vec(0usize..64, 1..8),
    ) {
        let fabric = grown(&picks);
        prop_assert_eq!(fabric.joints().len(), 3 + picks.len());
        prop_assert_eq!(fabric.tetras().len(), picks.len());
        prop_assert_eq!(validate(&fabric), vec![]);
    }
}
