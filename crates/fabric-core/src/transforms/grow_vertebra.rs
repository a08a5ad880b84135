//! Ring growth.
//!
//! A fresh [`GrowVertebra`] first lays down a flat ring of joints braced
//! with scaffold springs. Every later run extrudes a copy of its ring along
//! the ring normal, ties the two rings together with across cables, bars
//! and verticals, and commits the pair as a [`Vertebra`].

use super::ring::Ring;
use crate::fabric::{Fabric, FabricError};
use crate::id::{IntervalId, JointId, VertebraId};
use crate::interval::Role;
use crate::transform::Transformation;
use crate::vertebra::Vertebra;
use crate::who::Side;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Ticks over which new intervals settle on their target length.
pub const TICKS_TO_IDEAL: u32 = 500;

const FRESH_DISPLACEMENT: f64 = 0.3;
const EXTEND_DISPLACEMENT: f64 = 0.1;
const RING_PUCKER: f64 = 0.03;

/// Target lengths per role for grown intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub lengths: BTreeMap<Role, f64>,
    pub ticks: u32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        let lengths = [
            (Role::RingBar, 0.6),
            (Role::Ring, 0.6),
            (Role::Scaffold, 1.3),
            (Role::Across, 0.4),
            (Role::Horizontal, 1.3),
            (Role::Vertical, 1.7),
            (Role::Bar, 1.7),
        ];
        Self {
            lengths: lengths.into_iter().collect(),
            ticks: TICKS_TO_IDEAL,
        }
    }
}

impl GrowthConfig {
    /// Target length for `role`, falling back to the built-in table for
    /// roles the map leaves out.
    pub fn length(&self, role: Role) -> Option<f64> {
        self.lengths
            .get(&role)
            .copied()
            .or_else(|| Self::default().lengths.get(&role).copied())
    }
}

#[derive(Debug, Clone)]
enum Source {
    Fresh { ring_size: usize },
    Ring { joints: Vec<JointId> },
    Vertebra { vertebra: VertebraId, alpha: bool, zigzag: bool },
}

#[derive(Debug, Clone)]
pub struct GrowVertebra {
    config: GrowthConfig,
    source: Source,
    right_handed: bool,
    vertebra: Option<VertebraId>,
}

impl GrowVertebra {
    /// Start a new ring of `bar_count * 2` joints.
    pub fn new(bar_count: usize) -> Self {
        Self {
            config: GrowthConfig::default(),
            source: Source::Fresh {
                ring_size: bar_count * 2,
            },
            right_handed: false,
            vertebra: None,
        }
    }

    /// Extrude from one ring of an existing vertebra. `zigzag` flips the
    /// handedness of the new vertebra relative to the old one.
    pub fn from_vertebra(vertebra: VertebraId, alpha: bool, zigzag: bool) -> Self {
        Self {
            config: GrowthConfig::default(),
            source: Source::Vertebra {
                vertebra,
                alpha,
                zigzag,
            },
            right_handed: false,
            vertebra: None,
        }
    }

    pub fn with_config(mut self, config: GrowthConfig) -> Self {
        self.config = config;
        self
    }

    /// The vertebra committed by the latest extrusion.
    pub fn vertebra(&self) -> Option<VertebraId> {
        self.vertebra
    }

    /// The ring laid down by the first run, once there is one.
    pub fn ring(&self) -> Option<&[JointId]> {
        match &self.source {
            Source::Ring { joints } => Some(joints),
            _ => None,
        }
    }

    fn connect(
        &self,
        fabric: &mut Fabric,
        alpha: JointId,
        omega: JointId,
        role: Role,
    ) -> Result<IntervalId, FabricError> {
        let length = self
            .config
            .length(role)
            .ok_or(FabricError::NoGrowthLength(role))?;
        let id = fabric.add_interval(alpha, omega, role)?;
        fabric
            .require_interval_mut(id)?
            .span
            .set_ideal(length, self.config.ticks);
        Ok(id)
    }

    fn create_ring(&self, fabric: &mut Fabric, ring_size: usize) -> Result<Vec<JointId>, FabricError> {
        let radius = ring_size as f64 / 10.0;
        let mut joints = Vec::with_capacity(ring_size);
        for walk in 0..ring_size {
            let angle = walk as f64 * 2.0 * PI / ring_size as f64;
            let who = fabric.create_who(Side::Middle);
            let location = DVec3::new(radius * angle.cos(), radius * angle.sin(), 0.0);
            joints.push(fabric.add_joint(who, location)?);
        }
        let ring = Ring::of(fabric, &joints, true)?;
        for &joint in joints.iter().skip(1).step_by(2) {
            fabric.require_joint_mut(joint)?.location += ring.normal * RING_PUCKER;
        }
        for walk in 0..ring_size {
            let even = walk % 2 == 0;
            let (connector, brace) = if even {
                (Role::RingBar, Role::Scaffold)
            } else {
                (Role::Ring, Role::Horizontal)
            };
            self.connect(fabric, joints[walk], joints[(walk + 1) % ring_size], connector)?;
            self.connect(fabric, joints[walk], joints[(walk + 2) % ring_size], brace)?;
        }
        tracing::debug!(age = fabric.age(), ring_size, "ring created");
        Ok(joints)
    }

    fn create_other_joints(
        fabric: &mut Fabric,
        joints: &[JointId],
        right_handed: bool,
        displacement: f64,
    ) -> Result<Vec<JointId>, FabricError> {
        let ring = Ring::of(fabric, joints, right_handed)?;
        let mut others = Vec::with_capacity(joints.len());
        for &joint in joints {
            let who = fabric.who_of(joint)?;
            let who = fabric.create_another_like(who);
            let location = fabric.location(joint)? + ring.normal * displacement;
            others.push(fabric.add_joint(who, location)?);
        }
        Ok(others)
    }

    /// Drop the scaffold braces that held a ring flat while it had no
    /// neighbour.
    fn remove_scaffold(fabric: &mut Fabric, joints: &[JointId]) -> Result<(), FabricError> {
        let count = joints.len();
        for walk in 0..count {
            let Some(brace) = fabric.interval_between(joints[walk], joints[(walk + 2) % count])?
            else {
                continue;
            };
            if fabric.require_interval(brace)?.role() == Role::Scaffold {
                fabric.remove_interval(brace)?;
            }
        }
        Ok(())
    }

    fn extrude(
        &mut self,
        fabric: &mut Fabric,
        joints: Vec<JointId>,
        displacement: f64,
    ) -> Result<(), FabricError> {
        Self::remove_scaffold(fabric, &joints)?;
        let others = Self::create_other_joints(fabric, &joints, self.right_handed, displacement)?;
        let count = joints.len();
        let (alpha, omega) = if self.right_handed {
            (&joints, &others)
        } else {
            (&others, &joints)
        };
        for walk in 0..count {
            self.connect(fabric, alpha[walk], omega[(walk + 1) % count], Role::Across)?;
            if walk % 2 == 1 {
                let bar = self.connect(fabric, alpha[walk], omega[(walk + 2) % count], Role::Bar)?;
                self.connect(fabric, alpha[walk], omega[walk], Role::Vertical)?;
                let mid_bar = fabric.interval_midpoint(bar)?;
                let neighbour = fabric.require_joint_mut(others[(walk + 1) % count])?;
                neighbour.location = (neighbour.location + mid_bar) * 0.5;
            }
        }
        for walk in 0..count {
            let even = walk % 2 == 0;
            let (brace, connector) = if even {
                (Role::Scaffold, Role::Ring)
            } else {
                (Role::Horizontal, Role::RingBar)
            };
            self.connect(fabric, others[walk], others[(walk + 2) % count], brace)?;
            self.connect(fabric, others[walk], others[(walk + 1) % count], connector)?;
        }
        let mut members = joints;
        members.extend_from_slice(&others);
        let vertebra = fabric.add_vertebra(Vertebra::new(members, self.right_handed))?;
        tracing::debug!(age = fabric.age(), count, "vertebra grown");
        self.vertebra = Some(vertebra);
        self.source = Source::Ring { joints: others };
        Ok(())
    }
}

impl Transformation for GrowVertebra {
    fn name(&self) -> &str {
        "grow vertebra"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        match self.source.clone() {
            Source::Fresh { ring_size } => {
                let joints = self.create_ring(fabric, ring_size)?;
                self.source = Source::Ring { joints };
                Ok(())
            }
            Source::Ring { joints } => self.extrude(fabric, joints, FRESH_DISPLACEMENT),
            Source::Vertebra {
                vertebra,
                alpha,
                zigzag,
            } => {
                let vertebra = fabric.require_vertebra(vertebra)?;
                self.right_handed = zigzag ^ vertebra.right_handed;
                let joints = vertebra.ring(alpha);
                self.extrude(fabric, joints, EXTEND_DISPLACEMENT)
            }
        }
    }
}
