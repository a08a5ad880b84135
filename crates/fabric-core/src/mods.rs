//! Staged add/remove sets.
//!
//! Nothing enters or leaves a fabric's live collections while a
//! transformation runs. Entities are inserted into the arena when staged so
//! they can be referenced immediately, but they only become part of the live
//! (ordered) collection when their [`Mod`] is applied. Removal is likewise
//! deferred to the apply step.

use crate::fabric::FabricError;
use crate::id::{FaceId, IntervalId, JointId, TetraId, VertebraId};
use slotmap::{Key, SlotMap};
use std::collections::HashSet;

/// Outcome of a successful [`Mod::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The entity was still only staged for addition; it will never appear.
    CancelledAdd,
    /// The entity leaves the live collection at the next apply.
    Scheduled,
}

/// Pending changes to one kind of entity.
#[derive(Debug, Clone)]
pub struct Mod<K: Key> {
    kind: &'static str,
    add: Vec<K>,
    remove: Vec<K>,
    cancelled: Vec<K>,
}

impl<K: Key> Mod<K> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            add: Vec::new(),
            remove: Vec::new(),
            cancelled: Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn added(&self) -> &[K] {
        &self.add
    }

    pub fn removed(&self) -> &[K] {
        &self.remove
    }

    /// Additions withdrawn in this batch.
    pub fn cancelled(&self) -> &[K] {
        &self.cancelled
    }

    pub fn is_added(&self, key: K) -> bool {
        self.add.contains(&key)
    }

    /// True if `key` is scheduled for removal or was an add that got
    /// cancelled in this batch.
    pub fn is_removed(&self, key: K) -> bool {
        self.remove.contains(&key) || self.cancelled.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.cancelled.is_empty()
    }

    /// Stage `key` for addition.
    ///
    /// Fails if `key` is already staged in either direction.
    pub fn add(&mut self, key: K) -> Result<(), FabricError> {
        if self.add.contains(&key) || self.is_removed(key) {
            return Err(FabricError::DuplicateAdd { kind: self.kind });
        }
        self.add.push(key);
        Ok(())
    }

    /// Stage `key` for removal, or cancel its pending addition.
    ///
    /// Fails if `key` is already staged for removal.
    pub fn remove(&mut self, key: K) -> Result<Removal, FabricError> {
        if let Some(index) = self.add.iter().position(|k| *k == key) {
            self.add.remove(index);
            self.cancelled.push(key);
            return Ok(Removal::CancelledAdd);
        }
        if self.is_removed(key) {
            return Err(FabricError::DuplicateRemove { kind: self.kind });
        }
        self.remove.push(key);
        Ok(Removal::Scheduled)
    }

    /// Reconcile the staged sets against the live list and the arena.
    ///
    /// Removals go first so that the live list order of survivors is kept;
    /// additions are appended in staging order.
    pub(crate) fn apply<V>(&mut self, live: &mut Vec<K>, store: &mut SlotMap<K, V>) {
        if !self.remove.is_empty() {
            let gone: HashSet<K> = self.remove.drain(..).collect();
            live.retain(|key| !gone.contains(key));
            for key in gone {
                store.remove(key);
            }
        }
        for key in self.cancelled.drain(..) {
            store.remove(key);
        }
        live.append(&mut self.add);
    }
}

/// One [`Mod`] per entity kind.
#[derive(Debug, Clone)]
pub struct Mods {
    pub joints: Mod<JointId>,
    pub intervals: Mod<IntervalId>,
    pub faces: Mod<FaceId>,
    pub tetras: Mod<TetraId>,
    pub vertebras: Mod<VertebraId>,
}

impl Default for Mods {
    fn default() -> Self {
        Self {
            joints: Mod::new("joint"),
            intervals: Mod::new("interval"),
            faces: Mod::new("face"),
            tetras: Mod::new("tetra"),
            vertebras: Mod::new("vertebra"),
        }
    }
}

impl Mods {
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
            && self.intervals.is_empty()
            && self.faces.is_empty()
            && self.tetras.is_empty()
            && self.vertebras.is_empty()
    }
}
