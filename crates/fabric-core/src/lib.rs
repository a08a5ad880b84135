//! Fabric Core -- a mass-spring-bar simulator for tensegrity structures.
//!
//! A [`fabric::Fabric`] owns point-mass joints linked by intervals (springs,
//! bars, cables and friends), grouped into faces, tetrahedra and vertebrae.
//! Topology changes and physics steps are both transformations fed through
//! one FIFO queue.
//!
//! # Deferred Mutation Pattern
//!
//! A transformation never edits the live collections directly. It stages
//! additions and removals, and the fabric applies them once the
//! transformation returns:
//!
//! ```rust,ignore
//! fabric.add_transformation(OpenUp::new(face, 1.0, 100, Role::Spring));
//! fabric.execute_transformations(Some(&mut physics))?;
//! ```
//!
//! Staged entities are already visible to queries, so a transformation can
//! build on what it just created. Removing a joint cascades to every
//! interval, face, tetra and vertebra that references it.
//!
//! # Physics Pass
//!
//! Each [`physics::Physics`] iteration advances the clock, animates span
//! schedules, computes elastic stress, retires expired temporary intervals
//! through elimination, smooths velocities along interval axes, applies the
//! environment, and moves the joints.
//!
//! # Key Types
//!
//! - [`fabric::Fabric`] -- Entity arenas, queries, staging and the queue.
//! - [`who::Who`] -- Stable joint identity with a symmetry side.
//! - [`span::Span`] -- Actual and ideal length with a schedule of targets.
//! - [`transform::Transformation`] -- The queued edit contract.
//! - [`transforms`] -- Ring growth, face opening, merges, annihilation,
//!   relocation, bar columns.
//! - [`factory`] -- Canned fabrics, including geodesic tensegrity spheres.
//! - [`fablob::Fablob`] -- Big-endian binary snapshots.

pub mod face;
pub mod fablob;
pub mod fabric;
pub mod factory;
mod geodesic;
pub mod id;
pub mod interval;
pub mod joint;
pub mod mods;
pub mod physics;
pub mod span;
pub mod tetra;
pub mod transform;
pub mod transforms;
pub mod validation;
pub mod vertebra;
pub mod who;

#[cfg(feature = "data-loader")]
pub mod config;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
