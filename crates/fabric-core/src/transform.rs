//! Transformation contracts and the FIFO queue that feeds them to a fabric.
//!
//! Transformations are queued by any thread (UI, scripting, a batch driver)
//! and drained by the single thread that owns the fabric. Each one runs to
//! completion and its staged edits are applied before the next one starts.

use crate::fabric::{Fabric, FabricError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An atomic edit of a fabric, expressed through its staged add/remove sets.
pub trait Transformation: Send {
    /// Short label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError>;
}

/// A transformation that advances the simulation clock.
pub trait PhysicsTransformation: Transformation {
    fn set_iterations(&mut self, iterations: u32);

    fn iterations(&self) -> u32;
}

/// A transformation meant to be resubmitted until it reports completion.
pub trait PeriodicTransformation: Transformation {
    fn is_finished(&self) -> bool;
}

/// Adapter turning a closure into a [`Transformation`].
pub struct FnTransformation<F> {
    name: String,
    f: F,
}

impl<F> Transformation for FnTransformation<F>
where
    F: FnMut(&mut Fabric) -> Result<(), FabricError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        (self.f)(fabric)
    }
}

/// Wrap `f` as a named transformation.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnTransformation<F>
where
    F: FnMut(&mut Fabric) -> Result<(), FabricError> + Send,
{
    FnTransformation {
        name: name.into(),
        f,
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

type Shared = Arc<Mutex<VecDeque<Box<dyn Transformation>>>>;

fn lock(queue: &Shared) -> MutexGuard<'_, VecDeque<Box<dyn Transformation>>> {
    // A panicking submitter cannot leave the deque half-modified.
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO of pending transformations owned by a fabric.
#[derive(Default)]
pub struct TransformationQueue {
    pending: Shared,
}

impl std::fmt::Debug for TransformationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationQueue")
            .field("pending", &self.len())
            .finish()
    }
}

impl TransformationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, transformation: Box<dyn Transformation>) {
        lock(&self.pending).push_back(transformation);
    }

    pub fn pop(&self) -> Option<Box<dyn Transformation>> {
        lock(&self.pending).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }

    /// A handle other threads can use to append to this queue.
    pub fn submitter(&self) -> TransformationSubmitter {
        TransformationSubmitter {
            pending: Arc::clone(&self.pending),
        }
    }
}

/// Cloneable, thread-safe append handle onto a fabric's queue.
#[derive(Clone)]
pub struct TransformationSubmitter {
    pending: Shared,
}

impl TransformationSubmitter {
    pub fn submit(&self, transformation: Box<dyn Transformation>) {
        lock(&self.pending).push_back(transformation);
    }

    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }
}
