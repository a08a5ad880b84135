use crate::id::JointId;
use crate::span::{MINIMUM_SPAN, Span};
use glam::DVec3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

const BAR_SMOOTH: f64 = 0.6;
const SPRING_SMOOTH: f64 = 0.03;
const CABLE_SMOOTH: f64 = 0.01;

/// Structural category of an interval.
///
/// The declaration order is the codec ordinal; append new roles at the end
/// of the live roles, before `Temporary`, only together with a format bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Spring,
    RingSpring,
    Muscle,
    Bar,
    Cable,
    CounterCable,
    HorizontalCable,
    RingCable,
    VerticalCable,
    Ring,
    RingBar,
    Scaffold,
    Across,
    Horizontal,
    Vertical,
    Temporary,
    Eliminated,
}

/// Static attributes of a role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleAttributes {
    /// Whether the interval resists compression as well as tension.
    pub can_push: bool,
    /// Fraction of the axial velocity difference removed per iteration.
    pub smoothing: f64,
}

impl RoleAttributes {
    const fn new(can_push: bool, smoothing: f64) -> Self {
        Self {
            can_push,
            smoothing,
        }
    }
}

/// Indexed by `Role as usize`.
const ROLE_TABLE: [RoleAttributes; Role::COUNT] = [
    RoleAttributes::new(true, SPRING_SMOOTH),  // Spring
    RoleAttributes::new(true, SPRING_SMOOTH),  // RingSpring
    RoleAttributes::new(true, SPRING_SMOOTH),  // Muscle
    RoleAttributes::new(true, BAR_SMOOTH),     // Bar
    RoleAttributes::new(false, CABLE_SMOOTH),  // Cable
    RoleAttributes::new(false, CABLE_SMOOTH),  // CounterCable
    RoleAttributes::new(false, CABLE_SMOOTH),  // HorizontalCable
    RoleAttributes::new(false, CABLE_SMOOTH),  // RingCable
    RoleAttributes::new(false, CABLE_SMOOTH),  // VerticalCable
    RoleAttributes::new(false, CABLE_SMOOTH),  // Ring
    RoleAttributes::new(true, BAR_SMOOTH),     // RingBar
    RoleAttributes::new(true, SPRING_SMOOTH),  // Scaffold
    RoleAttributes::new(false, CABLE_SMOOTH),  // Across
    RoleAttributes::new(false, CABLE_SMOOTH),  // Horizontal
    RoleAttributes::new(false, CABLE_SMOOTH),  // Vertical
    RoleAttributes::new(false, CABLE_SMOOTH),  // Temporary
    RoleAttributes::new(false, CABLE_SMOOTH),  // Eliminated
];

impl Role {
    pub const COUNT: usize = 17;

    pub const ALL: [Role; Role::COUNT] = [
        Role::Spring,
        Role::RingSpring,
        Role::Muscle,
        Role::Bar,
        Role::Cable,
        Role::CounterCable,
        Role::HorizontalCable,
        Role::RingCable,
        Role::VerticalCable,
        Role::Ring,
        Role::RingBar,
        Role::Scaffold,
        Role::Across,
        Role::Horizontal,
        Role::Vertical,
        Role::Temporary,
        Role::Eliminated,
    ];

    pub fn attributes(self) -> RoleAttributes {
        ROLE_TABLE[self as usize]
    }

    pub fn can_push(self) -> bool {
        self.attributes().can_push
    }

    pub fn smoothing(self) -> f64 {
        self.attributes().smoothing
    }

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Role> {
        Self::ALL.get(ordinal).copied()
    }

    /// Neither temporary nor eliminated.
    pub fn is_structural(self) -> bool {
        !matches!(self, Role::Temporary | Role::Eliminated)
    }
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// A link between two joints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub(crate) role: Role,
    pub(crate) alpha: JointId,
    pub(crate) omega: JointId,
    pub span: Span,
    unit: DVec3,
    /// Opaque caller data carried through snapshots.
    pub payload: Option<Vec<u8>>,
}

impl Interval {
    pub fn new(alpha: JointId, omega: JointId, role: Role, span: Span) -> Self {
        Self {
            role,
            alpha,
            omega,
            span,
            unit: DVec3::Z,
            payload: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn alpha(&self) -> JointId {
        self.alpha
    }

    pub fn omega(&self) -> JointId {
        self.omega
    }

    /// One of the two ends.
    pub fn end(&self, omega: bool) -> JointId {
        if omega { self.omega } else { self.alpha }
    }

    pub fn connects(&self, a: JointId, b: JointId) -> bool {
        (self.alpha == a && self.omega == b) || (self.alpha == b && self.omega == a)
    }

    pub fn contains(&self, joint: JointId) -> bool {
        self.alpha == joint || self.omega == joint
    }

    /// The end opposite `joint`, or `None` if `joint` is not an end.
    pub fn other(&self, joint: JointId) -> Option<JointId> {
        if joint == self.alpha {
            Some(self.omega)
        } else if joint == self.omega {
            Some(self.alpha)
        } else {
            None
        }
    }

    /// Unit axis from alpha toward omega as of the last [`Interval::measure`].
    pub fn unit(&self) -> DVec3 {
        self.unit
    }

    /// Recompute the actual length and unit axis from the end locations.
    ///
    /// Below the significance threshold the axis falls back to +Z.
    pub(crate) fn measure(&mut self, alpha: DVec3, omega: DVec3) -> DVec3 {
        let delta = omega - alpha;
        let actual = delta.length();
        self.span.set_actual(actual);
        self.unit = if actual > MINIMUM_SPAN {
            delta / actual
        } else {
            DVec3::Z
        };
        self.unit
    }

    /// Swap one end for another joint.
    ///
    /// Returns `true` when the swap would collapse the interval onto a single
    /// joint; the interval is left unchanged in that case and the caller is
    /// expected to retire it. Eliminated intervals are never rewired.
    pub(crate) fn replace(&mut self, from: JointId, to: JointId) -> bool {
        if self.role == Role::Eliminated {
            return false;
        }
        if from == self.alpha {
            if to == self.omega {
                return true;
            }
            self.alpha = to;
        } else if from == self.omega {
            if to == self.alpha {
                return true;
            }
            self.omega = to;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn two_joints() -> (JointId, JointId, JointId) {
        let mut arena = SlotMap::<JointId, ()>::with_key();
        (arena.insert(()), arena.insert(()), arena.insert(()))
    }

    #[test]
    fn role_table_matches_declaration_order() {
        for (index, role) in Role::ALL.iter().enumerate() {
            assert_eq!(role.ordinal(), index);
            assert_eq!(Role::from_ordinal(index), Some(*role));
        }
        assert!(Role::from_ordinal(Role::COUNT).is_none());
    }

    #[test]
    fn bars_push_and_cables_do_not() {
        assert!(Role::Bar.can_push());
        assert!(Role::RingBar.can_push());
        assert!(Role::Spring.can_push());
        assert!(!Role::Cable.can_push());
        assert!(!Role::Ring.can_push());
        assert!(!Role::Temporary.can_push());
        assert_eq!(Role::Bar.smoothing(), 0.6);
        assert_eq!(Role::Across.smoothing(), 0.01);
    }

    #[test]
    fn measure_falls_back_to_z_axis_when_degenerate() {
        let (a, b, _) = two_joints();
        let mut interval = Interval::new(a, b, Role::Cable, Span::new(1.0));
        let unit = interval.measure(DVec3::ONE, DVec3::ONE);
        assert_eq!(unit, DVec3::Z);
        assert_eq!(interval.span.actual(), 0.0);

        let unit = interval.measure(DVec3::ZERO, DVec3::new(3.0, 0.0, 4.0));
        assert!((unit - DVec3::new(0.6, 0.0, 0.8)).length() < 1e-12);
        assert_eq!(interval.span.actual(), 5.0);
    }

    #[test]
    fn replace_rewires_or_reports_collapse() {
        let (a, b, c) = two_joints();
        let mut interval = Interval::new(a, b, Role::Spring, Span::new(1.0));
        assert!(!interval.replace(a, c));
        assert!(interval.connects(b, c));
        assert!(interval.replace(c, b));
        assert!(interval.connects(b, c));
    }

    #[test]
    fn other_end() {
        let (a, b, c) = two_joints();
        let interval = Interval::new(a, b, Role::Spring, Span::new(1.0));
        assert_eq!(interval.other(a), Some(b));
        assert_eq!(interval.other(b), Some(a));
        assert_eq!(interval.other(c), None);
    }
}
