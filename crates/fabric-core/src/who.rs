//! Stable joint identities.
//!
//! A [`Who`] names a joint independently of where it is stored. The [`Side`]
//! partitions identities into symmetry classes: LEFT and RIGHT joints with the
//! same sequence number are mirror images of each other, which is what lets
//! the elimination procedure fold bilateral structure onto a middle axis.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Symmetry class of a joint identity.
///
/// The declaration order is significant: it is the ordinal used by the
/// binary codec and the primary sort key of [`Who`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Middle,
    Left,
    Right,
    Temporary,
    Eliminated,
}

impl Side {
    /// Every side, in ordinal order.
    pub const ALL: [Side; 5] = [
        Side::Middle,
        Side::Left,
        Side::Right,
        Side::Temporary,
        Side::Eliminated,
    ];

    /// Number of symmetry classes.
    pub const COUNT: usize = 5;

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Side> {
        Self::ALL.get(ordinal).copied()
    }

    /// Typed sides are the ones that can survive an elimination.
    pub fn is_typed(self) -> bool {
        matches!(self, Side::Middle | Side::Left | Side::Right)
    }

    fn initial(self) -> char {
        match self {
            Side::Middle => 'M',
            Side::Left => 'L',
            Side::Right => 'R',
            Side::Temporary => 'T',
            Side::Eliminated => 'E',
        }
    }
}

// ---------------------------------------------------------------------------
// Who
// ---------------------------------------------------------------------------

/// A (side, sequence-number) pair identifying a joint.
///
/// Ordering is by side ordinal first, then by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Who {
    pub side: Side,
    pub id: u32,
}

impl Who {
    pub fn new(side: Side, id: u32) -> Self {
        Self { side, id }
    }

    /// The mirror-image identity.
    ///
    /// LEFT and RIGHT swap, MIDDLE is its own opposite, and the transient
    /// sides have none.
    pub fn opposite(self) -> Option<Who> {
        match self.side {
            Side::Left => Some(Who::new(Side::Right, self.id)),
            Side::Right => Some(Who::new(Side::Left, self.id)),
            Side::Middle => Some(self),
            Side::Temporary | Side::Eliminated => None,
        }
    }

    /// True when the two identities are a LEFT/RIGHT mirror pair.
    pub fn is_mirror_of(self, other: Who) -> bool {
        self.id == other.id
            && matches!(
                (self.side, other.side),
                (Side::Left, Side::Right) | (Side::Right, Side::Left)
            )
    }
}

impl fmt::Display for Who {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.side.initial(), self.id)
    }
}

// ---------------------------------------------------------------------------
// WhoFactory
// ---------------------------------------------------------------------------

/// Issues fresh sequence numbers per side.
///
/// Each side keeps a high-water mark. A mark of `None` means "unknown": the
/// next request for that side scans the identities it is given and resumes
/// after the largest one found. This is how a restored fabric avoids reusing
/// numbers it has never issued itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoFactory {
    marks: [Option<u32>; Side::COUNT],
}

impl WhoFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore explicit high-water marks (as stored by the codec).
    pub fn with_marks(marks: [Option<u32>; Side::COUNT]) -> Self {
        Self { marks }
    }

    pub fn marks(&self) -> [Option<u32>; Side::COUNT] {
        self.marks
    }

    /// Issue the next identity on `side`.
    ///
    /// `existing` is only consulted when the side's mark is unknown.
    pub fn create<I>(&mut self, side: Side, existing: I) -> Who
    where
        I: IntoIterator<Item = Who>,
    {
        let slot = &mut self.marks[side.ordinal()];
        if slot.is_none() {
            *slot = existing
                .into_iter()
                .filter(|who| who.side == side)
                .map(|who| who.id)
                .max();
        }
        let next = slot.map_or(0, |mark| mark + 1);
        *slot = Some(next);
        Who::new(side, next)
    }
}
