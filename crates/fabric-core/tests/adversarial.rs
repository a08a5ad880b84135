//! Adversarial input tests for the fabric core.
//!
//! Corrupt snapshots, stale handles and misuse of the staging API must end
//! in an error, never a panic.

use fabric_core::fablob::{Fablob, FablobError, MAGIC};
use fabric_core::fabric::{Fabric, FabricError};
use fabric_core::factory;
use fabric_core::interval::Role;
use fabric_core::physics::elimination::decide;
use fabric_core::test_utils::*;
use fabric_core::transform::from_fn;
use fabric_core::transforms::{ConnectVertebra, OpenUp, Relocator};
use fabric_core::validation::validate;
use fabric_core::who::{Side, Who};
use glam::DVec3;
use proptest::prelude::*;

/// Byte offset of the joint count: magic, age, last active age, five
/// identity marks and the empty payload flag.
const JOINT_COUNT_OFFSET: usize = 4 + 8 + 8 + 5 * 2 + 1;

fn blob_of(fabric: &Fabric) -> Vec<u8> {
    Fablob::from_fabric(fabric).unwrap().into_bytes()
}

fn decode(bytes: Vec<u8>) -> Result<Fabric, FablobError> {
    Fablob::from_bytes(bytes).to_fabric()
}

// ===========================================================================
// Corrupt snapshots
// ===========================================================================

#[test]
fn empty_input_is_truncated() {
    assert!(matches!(
        decode(Vec::new()),
        Err(FablobError::Truncated { position: 0, needed: 4 })
    ));
}

#[test]
fn wrong_magic_is_rejected() {
    let mut bytes = blob_of(&factory::double_face_triangle().unwrap());
    bytes[0] ^= 0xFF;
    assert!(matches!(decode(bytes), Err(FablobError::BadMagic(_))));
}

#[test]
fn every_truncation_of_a_real_blob_fails_cleanly() {
    let bytes = blob_of(&pentagon());
    for len in 0..bytes.len() {
        let result = decode(bytes[..len].to_vec());
        assert!(
            matches!(result, Err(FablobError::Truncated { .. })),
            "prefix of {len} bytes: {result:?}"
        );
    }
}

#[test]
fn negative_joint_count_is_rejected() {
    let mut bytes = blob_of(&Fabric::new());
    bytes[JOINT_COUNT_OFFSET..JOINT_COUNT_OFFSET + 2].copy_from_slice(&(-3i16).to_be_bytes());
    assert!(matches!(decode(bytes), Err(FablobError::NegativeCount(-3))));
}

#[test]
fn unknown_role_is_rejected() {
    let fabric = factory::double_face_triangle().unwrap();
    let mut bytes = blob_of(&fabric);
    // Three joints of: who, location, velocity, mass, empty payload.
    let joint_record = 2 + 3 * 8 + 3 * 8 + 8 + 1;
    let role_offset = JOINT_COUNT_OFFSET + 2 + 3 * joint_record + 2;
    assert_eq!(bytes[role_offset], Role::Spring.ordinal() as u8);
    bytes[role_offset] = 99;
    assert!(matches!(decode(bytes), Err(FablobError::UnknownRole(99))));
}

#[test]
fn unknown_side_is_rejected() {
    let mut bytes = blob_of(&factory::double_face_triangle().unwrap());
    let who = JOINT_COUNT_OFFSET + 2;
    bytes[who..who + 2].copy_from_slice(&(-1i16).to_be_bytes());
    assert!(matches!(decode(bytes), Err(FablobError::UnknownSide(-1))));
}

#[test]
fn duplicate_identity_is_rejected() {
    let mut fabric = Fabric::new();
    joints_at(&mut fabric, Side::Middle, &[DVec3::ZERO, DVec3::X]);
    let mut bytes = blob_of(&fabric);
    let joint_record = 2 + 3 * 8 + 3 * 8 + 8 + 1;
    let first = JOINT_COUNT_OFFSET + 2;
    let second = first + joint_record;
    let packed = [bytes[first], bytes[first + 1]];
    bytes[second..second + 2].copy_from_slice(&packed);
    assert!(matches!(decode(bytes), Err(FablobError::DuplicateWho(_))));
}

#[test]
fn trailing_garbage_after_a_valid_blob_is_ignored() {
    let fabric = pentagon();
    let mut bytes = blob_of(&fabric);
    bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let restored = decode(bytes).unwrap();
    assert_eq!(counts(&restored), counts(&fabric));
}

proptest! {
    #[test]
    fn random_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(bytes);
    }

    #[test]
    fn random_bodies_after_a_valid_magic_never_panic(
        body in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut bytes = MAGIC.to_be_bytes().to_vec();
        bytes.extend(body);
        if let Ok(fabric) = decode(bytes) {
            let _ = validate(&fabric);
        }
    }

    #[test]
    fn flipped_bytes_never_panic(position in any::<prop::sample::Index>(), mask in 1u8..=255) {
        let mut bytes = blob_of(&pentagon());
        let position = position.index(bytes.len());
        bytes[position] ^= mask;
        if let Ok(fabric) = decode(bytes) {
            let _ = validate(&fabric);
        }
    }
}

// ===========================================================================
// Encoding limits
// ===========================================================================

#[test]
fn identities_beyond_a_short_cannot_be_packed() {
    let mut fabric = Fabric::new();
    fabric
        .run_transformation(&mut from_fn("far", |f: &mut Fabric| {
            f.add_joint(Who::new(Side::Middle, 7000), DVec3::ZERO)?;
            Ok(())
        }))
        .unwrap();
    assert!(matches!(
        Fablob::from_fabric(&fabric),
        Err(FablobError::ShortOutOfRange(_))
    ));
}

#[test]
fn queued_work_blocks_snapshots() {
    let fabric = factory::double_face_triangle().unwrap();
    fabric.add_transformation(from_fn("noop", |_: &mut Fabric| Ok(())));
    assert!(matches!(
        Fablob::from_fabric(&fabric),
        Err(FablobError::PendingTransformations)
    ));
}

// ===========================================================================
// Misuse of the staging API
// ===========================================================================

#[test]
fn opening_a_removed_face_fails() {
    let mut fabric = factory::double_face_triangle().unwrap();
    let face = fabric.faces()[0];
    fabric
        .run_transformation(&mut from_fn("remove", move |f: &mut Fabric| f.remove_face(face)))
        .unwrap();
    let err = fabric
        .run_transformation(&mut OpenUp::new(face, 1.0, 100, Role::Spring))
        .unwrap_err();
    assert!(matches!(err, FabricError::StructureGone(_)));
}

#[test]
fn opening_a_face_without_edges_fails() {
    let mut fabric = factory::double_face_triangle().unwrap();
    let face = fabric.faces()[0];
    let edge = fabric.intervals()[0];
    fabric
        .run_transformation(&mut from_fn("cut", move |f: &mut Fabric| f.remove_interval(edge)))
        .unwrap();
    let err = fabric
        .run_transformation(&mut OpenUp::new(face, 1.0, 100, Role::Spring))
        .unwrap_err();
    assert!(matches!(err, FabricError::MissingInterval(..)));
}

#[test]
fn adding_an_interval_to_a_stale_joint_fails() {
    let mut fabric = factory::double_face_triangle().unwrap();
    let [a, b] = [fabric.joints()[0], fabric.joints()[1]];
    fabric
        .run_transformation(&mut from_fn("remove", move |f: &mut Fabric| f.remove_joint(a)))
        .unwrap();
    let err = fabric
        .run_transformation(&mut from_fn("stale", move |f: &mut Fabric| {
            f.add_interval(a, b, Role::Cable)?;
            Ok(())
        }))
        .unwrap_err();
    assert!(matches!(err, FabricError::JointNotFound(_)));
}

#[test]
fn identical_typed_identities_cannot_be_eliminated() {
    let who = Who::new(Side::Left, 3);
    assert!(matches!(decide(who, who), Err(FabricError::SameJoint(..))));
}

#[test]
fn connecting_a_missing_vertebra_fails() {
    let mut fabric = factory::vertebra(fabric_core::face::Chirality::LeftHanded).unwrap();
    let vertebra = fabric.vertebras()[0];
    fabric
        .run_transformation(&mut from_fn("remove", move |f: &mut Fabric| {
            f.remove_vertebra(vertebra)
        }))
        .unwrap();
    let err = fabric
        .run_transformation(&mut ConnectVertebra::new(vertebra, vertebra, false))
        .unwrap_err();
    assert!(matches!(err, FabricError::VertebraNotFound(_)));
}

#[test]
fn flat_basis_is_rejected() {
    let err = Relocator::new(DVec3::X, DVec3::Y, DVec3::X + DVec3::Y, DVec3::ZERO).unwrap_err();
    assert!(matches!(err, FabricError::DegenerateBasis));
}

#[test]
fn physics_without_mass_reports_the_joint() {
    let mut fabric = Fabric::new();
    joints_at(&mut fabric, Side::Middle, &[DVec3::ZERO]);
    let mut physics = weightless(1);
    let err = fabric.execute_transformations(Some(&mut physics)).unwrap_err();
    assert!(matches!(err, FabricError::NoMass(_)));
}
