//! Topology transformations.
//!
//! Each type here is a self-contained request that edits a fabric only
//! through its staged add/remove sets. Consistency problems abort the
//! transformation with a [`FabricError`](crate::fabric::FabricError), and
//! [`Fabric::run_transformation`](crate::fabric::Fabric::run_transformation)
//! rolls back whatever was staged up to that point.

pub mod above_floor;
pub mod bar_to_column;
pub mod connect_vertebra;
pub mod grow_vertebra;
pub mod joint_merge;
pub mod open_up;
pub mod relocator;
pub mod ring;
pub mod tetra_annihilation;

pub use above_floor::AboveFloor;
pub use bar_to_column::BarToColumn;
pub use connect_vertebra::ConnectVertebra;
pub use grow_vertebra::{GrowVertebra, GrowthConfig};
pub use joint_merge::{JointMerge, PeriodicJointMerge};
pub use open_up::OpenUp;
pub use relocator::Relocator;
pub use ring::Ring;
pub use tetra_annihilation::{PeriodicTetraAnnihilation, TetraAnnihilation};
