//! The fabric aggregate: entity arenas, live collections, staged edits and
//! the transformation queue.
//!
//! Every entity lives in a `SlotMap` arena from the moment it is staged, so
//! transformations can reference what they just created. The ordered `Vec`
//! of keys per kind is the live collection; it only changes when a
//! transformation's [`Mods`] are applied. Queries look at both the live
//! collection and the pending additions.

use crate::face::{self, Face, FacePair};
use crate::id::{FaceId, IntervalId, JointId, TetraId, VertebraId};
use crate::interval::{Interval, Role};
use crate::joint::{Joint, Sheath};
use crate::mods::Mods;
use crate::span::Span;
use crate::tetra::{self, BAR_EDGES, CABLE_EDGES, Tetra};
use crate::transform::{
    PhysicsTransformation, Transformation, TransformationQueue, TransformationSubmitter,
};
use crate::vertebra::Vertebra;
use crate::who::{Side, Who, WhoFactory};
use glam::DVec3;
use slotmap::SlotMap;
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Consistency violations raised while querying or transforming a fabric.
///
/// None of these are recoverable for the operation that raised them.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    #[error("{kind} staged for addition twice")]
    DuplicateAdd { kind: &'static str },
    #[error("{kind} staged for removal twice")]
    DuplicateRemove { kind: &'static str },
    #[error("multiple intervals between {0} and {1}")]
    MultipleIntervals(Who, Who),
    #[error("no interval between {0} and {1}")]
    MissingInterval(Who, Who),
    #[error("face side missing between {0} and {1}")]
    SideMissing(Who, Who),
    #[error("degenerate face: {0:?}")]
    DegenerateFace(FaceId),
    #[error("only works for triangles, face has {0} joints")]
    NotTriangle(usize),
    #[error("joint {0} has been removed")]
    MissingJoint(Who),
    #[error("face {0:?} has been removed")]
    MissingFace(FaceId),
    #[error("structure gone: {0}")]
    StructureGone(String),
    #[error("no mass at joint {0}")]
    NoMass(Who),
    #[error("same joint? {0} and {1}")]
    SameJoint(Who, Who),
    #[error("cannot decide which joint to remove between {0} and {1}")]
    UndecidableElimination(Who, Who),
    #[error("other intervals still connect {0} and {1}")]
    OtherIntervals(Who, Who),
    #[error("no sheath found for {0}")]
    NoSheath(Who),
    #[error("no growth length for role {0:?}")]
    NoGrowthLength(Role),
    #[error("rings differ in size: {0} and {1}")]
    RingMismatch(usize, usize),
    #[error("basis vectors do not span space")]
    DegenerateBasis,
    #[error("joint not found: {0:?}")]
    JointNotFound(JointId),
    #[error("interval not found: {0:?}")]
    IntervalNotFound(IntervalId),
    #[error("face not found: {0:?}")]
    FaceNotFound(FaceId),
    #[error("tetra not found: {0:?}")]
    TetraNotFound(TetraId),
    #[error("vertebra not found: {0:?}")]
    VertebraNotFound(VertebraId),
}

/// Ticks over which a temporary interval shrinks to nothing: a fixed lead
/// plus this many ticks per unit of starting length.
const TEMPORARY_BASE_TICKS: u32 = 30;
const TEMPORARY_TICKS_PER_LENGTH: f64 = 100.0;

// ---------------------------------------------------------------------------
// Fabric
// ---------------------------------------------------------------------------

/// Copy of everything a transformation may edit, taken before it runs.
#[derive(Debug)]
struct Checkpoint {
    joint_store: SlotMap<JointId, Joint>,
    interval_store: SlotMap<IntervalId, Interval>,
    face_store: SlotMap<FaceId, Face>,
    tetra_store: SlotMap<TetraId, Tetra>,
    vertebra_store: SlotMap<VertebraId, Vertebra>,
    joints: Vec<JointId>,
    intervals: Vec<IntervalId>,
    faces: Vec<FaceId>,
    tetras: Vec<TetraId>,
    vertebras: Vec<VertebraId>,
    mods: Mods,
    who_factory: WhoFactory,
    last_span_active: Option<u64>,
    payload: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct Fabric {
    pub(crate) age: u64,
    pub(crate) last_span_active: Option<u64>,

    pub(crate) joint_store: SlotMap<JointId, Joint>,
    pub(crate) interval_store: SlotMap<IntervalId, Interval>,
    pub(crate) face_store: SlotMap<FaceId, Face>,
    pub(crate) tetra_store: SlotMap<TetraId, Tetra>,
    pub(crate) vertebra_store: SlotMap<VertebraId, Vertebra>,

    pub(crate) joints: Vec<JointId>,
    pub(crate) intervals: Vec<IntervalId>,
    pub(crate) faces: Vec<FaceId>,
    pub(crate) tetras: Vec<TetraId>,
    pub(crate) vertebras: Vec<VertebraId>,

    pub(crate) mods: Mods,
    pub(crate) who_factory: WhoFactory,
    transformations: TransformationQueue,

    /// Opaque caller data carried through snapshots.
    pub payload: Option<Vec<u8>>,
}

impl Fabric {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    pub fn age(&self) -> u64 {
        self.age
    }

    pub(crate) fn advance_age(&mut self) -> u64 {
        self.age += 1;
        self.age
    }

    /// Record that some span schedule was running at the current age.
    pub fn spans_were_active(&mut self) {
        self.last_span_active = Some(self.age);
    }

    /// Whether a span schedule was running during the latest iteration.
    pub fn is_any_span_active(&self) -> bool {
        self.last_span_active == Some(self.age)
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    /// Issue a fresh identity on `side`.
    pub fn create_who(&mut self, side: Side) -> Who {
        let store = &self.joint_store;
        let existing = self
            .joints
            .iter()
            .chain(self.mods.joints.added())
            .filter_map(|id| store.get(*id))
            .map(|joint| joint.who);
        self.who_factory.create(side, existing)
    }

    /// Issue a fresh identity on the same side as `who`.
    pub fn create_another_like(&mut self, who: Who) -> Who {
        self.create_who(who.side)
    }

    pub fn who_factory(&self) -> &WhoFactory {
        &self.who_factory
    }

    // -----------------------------------------------------------------------
    // Live collections and lookup
    // -----------------------------------------------------------------------

    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    pub fn intervals(&self) -> &[IntervalId] {
        &self.intervals
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    pub fn tetras(&self) -> &[TetraId] {
        &self.tetras
    }

    pub fn vertebras(&self) -> &[VertebraId] {
        &self.vertebras
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joint_store.get(id)
    }

    pub fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        self.joint_store.get_mut(id)
    }

    pub fn interval(&self, id: IntervalId) -> Option<&Interval> {
        self.interval_store.get(id)
    }

    pub fn interval_mut(&mut self, id: IntervalId) -> Option<&mut Interval> {
        self.interval_store.get_mut(id)
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.face_store.get(id)
    }

    pub fn face_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.face_store.get_mut(id)
    }

    pub fn tetra(&self, id: TetraId) -> Option<&Tetra> {
        self.tetra_store.get(id)
    }

    pub fn vertebra(&self, id: VertebraId) -> Option<&Vertebra> {
        self.vertebra_store.get(id)
    }

    pub(crate) fn require_joint(&self, id: JointId) -> Result<&Joint, FabricError> {
        self.joint_store.get(id).ok_or(FabricError::JointNotFound(id))
    }

    pub(crate) fn require_joint_mut(&mut self, id: JointId) -> Result<&mut Joint, FabricError> {
        self.joint_store
            .get_mut(id)
            .ok_or(FabricError::JointNotFound(id))
    }

    pub(crate) fn require_interval(&self, id: IntervalId) -> Result<&Interval, FabricError> {
        self.interval_store
            .get(id)
            .ok_or(FabricError::IntervalNotFound(id))
    }

    pub(crate) fn require_interval_mut(
        &mut self,
        id: IntervalId,
    ) -> Result<&mut Interval, FabricError> {
        self.interval_store
            .get_mut(id)
            .ok_or(FabricError::IntervalNotFound(id))
    }

    pub(crate) fn require_face(&self, id: FaceId) -> Result<&Face, FabricError> {
        self.face_store.get(id).ok_or(FabricError::FaceNotFound(id))
    }

    pub(crate) fn require_tetra(&self, id: TetraId) -> Result<&Tetra, FabricError> {
        self.tetra_store.get(id).ok_or(FabricError::TetraNotFound(id))
    }

    pub(crate) fn require_vertebra(&self, id: VertebraId) -> Result<&Vertebra, FabricError> {
        self.vertebra_store
            .get(id)
            .ok_or(FabricError::VertebraNotFound(id))
    }

    pub fn who_of(&self, joint: JointId) -> Result<Who, FabricError> {
        Ok(self.require_joint(joint)?.who)
    }

    pub fn location(&self, joint: JointId) -> Result<DVec3, FabricError> {
        Ok(self.require_joint(joint)?.location)
    }

    /// Live or staged joint carrying `who`.
    pub fn joint_by_who(&self, who: Who) -> Option<JointId> {
        self.all_joints()
            .find(|id| self.joint_store.get(*id).is_some_and(|joint| joint.who == who))
    }

    /// Live joints followed by joints staged for addition.
    pub fn all_joints(&self) -> impl Iterator<Item = JointId> + '_ {
        self.joints
            .iter()
            .chain(self.mods.joints.added())
            .copied()
    }

    pub fn all_intervals(&self) -> impl Iterator<Item = IntervalId> + '_ {
        self.intervals
            .iter()
            .chain(self.mods.intervals.added())
            .copied()
    }

    pub fn all_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.iter().chain(self.mods.faces.added()).copied()
    }

    pub fn all_tetras(&self) -> impl Iterator<Item = TetraId> + '_ {
        self.tetras.iter().chain(self.mods.tetras.added()).copied()
    }

    pub fn all_vertebras(&self) -> impl Iterator<Item = VertebraId> + '_ {
        self.vertebras
            .iter()
            .chain(self.mods.vertebras.added())
            .copied()
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    pub fn mods(&self) -> &Mods {
        &self.mods
    }

    /// Stage a fully built joint.
    pub fn insert_joint(&mut self, joint: Joint) -> Result<JointId, FabricError> {
        let id = self.joint_store.insert(joint);
        self.mods.joints.add(id)?;
        Ok(id)
    }

    /// Stage a new joint at rest.
    pub fn add_joint(&mut self, who: Who, location: DVec3) -> Result<JointId, FabricError> {
        self.insert_joint(Joint::new(who, location))
    }

    /// Stage a new interval whose ideal length is its current length.
    ///
    /// Temporary intervals immediately schedule their ideal down to zero, so
    /// they expire on their own.
    pub fn add_interval(
        &mut self,
        alpha: JointId,
        omega: JointId,
        role: Role,
    ) -> Result<IntervalId, FabricError> {
        let length = self.location(alpha)?.distance(self.location(omega)?);
        let mut span = Span::new(length);
        if role == Role::Temporary {
            let ticks = TEMPORARY_BASE_TICKS + (TEMPORARY_TICKS_PER_LENGTH * length) as u32;
            span.set_ideal(0.0, ticks);
        }
        let id = self
            .interval_store
            .insert(Interval::new(alpha, omega, role, span));
        self.mods.intervals.add(id)?;
        Ok(id)
    }

    pub fn add_face(&mut self, face: Face) -> Result<FaceId, FabricError> {
        let id = self.face_store.insert(face);
        self.mods.faces.add(id)?;
        Ok(id)
    }

    pub fn add_tetra(&mut self, tetra: Tetra) -> Result<TetraId, FabricError> {
        let id = self.tetra_store.insert(tetra);
        self.mods.tetras.add(id)?;
        Ok(id)
    }

    pub fn add_vertebra(&mut self, vertebra: Vertebra) -> Result<VertebraId, FabricError> {
        let id = self.vertebra_store.insert(vertebra);
        self.mods.vertebras.add(id)?;
        Ok(id)
    }

    /// Stage a joint for removal. Its identity moves to the eliminated side
    /// at once.
    pub fn remove_joint(&mut self, id: JointId) -> Result<(), FabricError> {
        self.require_joint(id)?;
        self.mods.joints.remove(id)?;
        let eliminated = self.create_who(Side::Eliminated);
        self.require_joint_mut(id)?.who = eliminated;
        Ok(())
    }

    /// Stage an interval for removal. Its role becomes eliminated at once.
    pub fn remove_interval(&mut self, id: IntervalId) -> Result<(), FabricError> {
        self.require_interval(id)?;
        self.mods.intervals.remove(id)?;
        self.require_interval_mut(id)?.role = Role::Eliminated;
        Ok(())
    }

    pub fn remove_face(&mut self, id: FaceId) -> Result<(), FabricError> {
        self.require_face(id)?;
        self.mods.faces.remove(id)?;
        Ok(())
    }

    pub fn remove_tetra(&mut self, id: TetraId) -> Result<(), FabricError> {
        self.require_tetra(id)?;
        self.mods.tetras.remove(id)?;
        Ok(())
    }

    pub fn remove_vertebra(&mut self, id: VertebraId) -> Result<(), FabricError> {
        self.require_vertebra(id)?;
        self.mods.vertebras.remove(id)?;
        Ok(())
    }

    pub fn is_joint_removed(&self, id: JointId) -> bool {
        self.mods.joints.is_removed(id)
    }

    pub fn is_interval_removed(&self, id: IntervalId) -> bool {
        self.mods.intervals.is_removed(id)
    }

    pub fn is_face_removed(&self, id: FaceId) -> bool {
        self.mods.faces.is_removed(id)
    }

    pub fn is_tetra_removed(&self, id: TetraId) -> bool {
        self.mods.tetras.is_removed(id)
    }

    // -----------------------------------------------------------------------
    // Interval queries
    // -----------------------------------------------------------------------

    /// An interval is real when neither it nor either end is retired and it
    /// is not temporary.
    pub fn is_real(&self, id: IntervalId) -> bool {
        let Some(interval) = self.interval_store.get(id) else {
            return false;
        };
        let end_alive = |joint: JointId| {
            self.joint_store
                .get(joint)
                .is_some_and(|joint| !joint.is_eliminated())
        };
        interval.role.is_structural() && end_alive(interval.alpha) && end_alive(interval.omega)
    }

    /// Real intervals touching `joint`.
    pub fn intervals_of(&self, joint: JointId) -> Vec<IntervalId> {
        self.all_intervals()
            .filter(|id| {
                self.interval_store
                    .get(*id)
                    .is_some_and(|interval| interval.contains(joint))
                    && self.is_real(*id)
            })
            .collect()
    }

    /// Real intervals joining `a` and `b`.
    pub fn real_intervals(&self, a: JointId, b: JointId) -> Vec<IntervalId> {
        self.all_intervals()
            .filter(|id| {
                self.interval_store
                    .get(*id)
                    .is_some_and(|interval| interval.connects(a, b))
                    && self.is_real(*id)
            })
            .collect()
    }

    /// The single real interval joining `a` and `b`, if any.
    pub fn interval_between(
        &self,
        a: JointId,
        b: JointId,
    ) -> Result<Option<IntervalId>, FabricError> {
        match self.real_intervals(a, b).as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => Err(FabricError::MultipleIntervals(
                self.who_of(a)?,
                self.who_of(b)?,
            )),
        }
    }

    pub fn interval_ends(&self, id: IntervalId) -> Result<(DVec3, DVec3), FabricError> {
        let interval = self.require_interval(id)?;
        Ok((self.location(interval.alpha)?, self.location(interval.omega)?))
    }

    pub fn interval_midpoint(&self, id: IntervalId) -> Result<DVec3, FabricError> {
        let (alpha, omega) = self.interval_ends(id)?;
        Ok((alpha + omega) * 0.5)
    }

    /// Neighbourhood of every non-eliminated joint, keyed and ordered by
    /// identity.
    pub fn sheath_map(&self) -> Result<BTreeMap<Who, Sheath>, FabricError> {
        let mut map = BTreeMap::new();
        for id in self.all_joints() {
            let joint = self.require_joint(id)?;
            if !joint.is_eliminated() {
                map.insert(joint.who, Sheath::new(id));
            }
        }
        for id in self.all_intervals() {
            if !self.is_real(id) {
                continue;
            }
            let interval = self.require_interval(id)?;
            let (alpha, omega) = (interval.alpha, interval.omega);
            let (alpha_who, omega_who) = (self.who_of(alpha)?, self.who_of(omega)?);
            if !map.contains_key(&omega_who) {
                return Err(FabricError::NoSheath(omega_who));
            }
            let sheath = map
                .get_mut(&alpha_who)
                .ok_or(FabricError::NoSheath(alpha_who))?;
            sheath.intervals.push(id);
            sheath.others.push(omega);
            if let Some(sheath) = map.get_mut(&omega_who) {
                sheath.intervals.push(id);
                sheath.others.push(alpha);
            }
        }
        Ok(map)
    }

    // -----------------------------------------------------------------------
    // Face queries
    // -----------------------------------------------------------------------

    pub fn face_locations(&self, id: FaceId) -> Result<Vec<DVec3>, FabricError> {
        self.require_face(id)?
            .joints
            .iter()
            .map(|joint| self.location(*joint))
            .collect()
    }

    pub fn face_location(&self, id: FaceId) -> Result<DVec3, FabricError> {
        Ok(face::centroid(&self.face_locations(id)?))
    }

    pub fn face_normal(&self, id: FaceId) -> Result<DVec3, FabricError> {
        let order = self.require_face(id)?.order;
        Ok(face::normal(order, &self.face_locations(id)?))
    }

    pub fn face_radius(&self, id: FaceId) -> Result<f64, FabricError> {
        Ok(face::radius(&self.face_locations(id)?))
    }

    /// Faces containing `joint`, including ones staged for removal.
    pub fn faces_of(&self, joint: JointId) -> Vec<FaceId> {
        self.all_faces()
            .filter(|id| self.face_store.get(*id).is_some_and(|f| f.contains(joint)))
            .collect()
    }

    /// Faces containing all three joints.
    pub fn faces_with(&self, a: JointId, b: JointId, c: JointId) -> Vec<FaceId> {
        self.all_faces()
            .filter(|id| {
                self.face_store
                    .get(*id)
                    .is_some_and(|f| f.contains(a) && f.contains(b) && f.contains(c))
            })
            .collect()
    }

    /// Faces whose joints carry all three identities.
    pub fn faces_by_who(&self, a: Who, b: Who, c: Who) -> Vec<FaceId> {
        self.all_faces()
            .filter(|id| {
                self.face_store.get(*id).is_some_and(|face| {
                    let whos: Vec<Who> = face
                        .joints
                        .iter()
                        .filter_map(|joint| self.joint_store.get(*joint))
                        .map(|joint| joint.who)
                        .collect();
                    [a, b, c].iter().all(|who| whos.contains(who))
                })
            })
            .collect()
    }

    /// Faces whose joints all belong to `tetra`.
    pub fn faces_of_tetra(&self, tetra: TetraId) -> Result<Vec<FaceId>, FabricError> {
        let tetra = self.require_tetra(tetra)?;
        Ok(self
            .all_faces()
            .filter(|id| {
                self.face_store
                    .get(*id)
                    .is_some_and(|face| face.joints.iter().all(|joint| tetra.contains(*joint)))
            })
            .collect())
    }

    /// The face whose joints mirror this face's joints.
    pub fn opposite_face(&self, id: FaceId) -> Result<Option<FaceId>, FabricError> {
        let face = self.require_face(id)?;
        if face.joints.len() < 3 {
            return Err(FabricError::NotTriangle(face.joints.len()));
        }
        let mut mirrored = Vec::with_capacity(3);
        for joint in &face.joints[..3] {
            match self.who_of(*joint)?.opposite() {
                Some(who) => mirrored.push(who),
                None => return Ok(None),
            }
        }
        let found = self.faces_by_who(mirrored[0], mirrored[1], mirrored[2]);
        Ok(match found.as_slice() {
            [only] if *only != id => Some(*only),
            [first, second] if *first == id => Some(*second),
            [first, second] if *second == id => Some(*first),
            _ => None,
        })
    }

    /// Live faces grouped with their mirror images.
    pub fn face_pairs(&self) -> Result<Vec<FacePair>, FabricError> {
        let mut paired = Vec::new();
        let mut pairs = Vec::new();
        for &id in &self.faces {
            if paired.contains(&id) {
                continue;
            }
            if let Some(opposite) = self.opposite_face(id)? {
                pairs.push(FacePair {
                    face0: id,
                    face1: opposite,
                });
                paired.push(opposite);
            }
        }
        Ok(pairs)
    }

    /// Real intervals along the edges of a face.
    pub fn face_intervals(&self, id: FaceId) -> Result<Vec<IntervalId>, FabricError> {
        let face = self.require_face(id)?;
        let count = face.joints.len();
        Ok((0..count)
            .flat_map(|walk| self.real_intervals(face.joints[walk], face.joints[(walk + 1) % count]))
            .collect())
    }

    /// Area by Heron's formula, taking each side as the mean ultimate ideal
    /// of the real intervals along it.
    pub fn area(&self, id: FaceId) -> Result<f64, FabricError> {
        let face = self.require_face(id)?;
        if face.joints.len() != 3 {
            return Err(FabricError::NotTriangle(face.joints.len()));
        }
        let mut sides = [0.0; 3];
        for (walk, side) in sides.iter_mut().enumerate() {
            let (a, b) = (face.joints[walk], face.joints[(walk + 1) % 3]);
            let along = self.real_intervals(a, b);
            if along.is_empty() {
                return Err(FabricError::SideMissing(self.who_of(a)?, self.who_of(b)?));
            }
            let total: f64 = along
                .iter()
                .map(|i| self.require_interval(*i).map(|i| i.span.ultimate_ideal()))
                .sum::<Result<f64, FabricError>>()?;
            *side = total / along.len() as f64;
        }
        let s = sides.iter().sum::<f64>() / 2.0;
        let squared = sides.iter().fold(s, |product, side| product * (s - side));
        if squared <= 0.0 {
            return Err(FabricError::DegenerateFace(id));
        }
        Ok(squared.sqrt())
    }

    // -----------------------------------------------------------------------
    // Tetra queries
    // -----------------------------------------------------------------------

    pub fn tetras_of(&self, joint: JointId) -> Vec<TetraId> {
        self.all_tetras()
            .filter(|id| self.tetra_store.get(*id).is_some_and(|t| t.contains(joint)))
            .collect()
    }

    pub fn tetra_locations(&self, id: TetraId) -> Result<[DVec3; 4], FabricError> {
        let [a, b, c, d] = self.require_tetra(id)?.joints;
        Ok([
            self.location(a)?,
            self.location(b)?,
            self.location(c)?,
            self.location(d)?,
        ])
    }

    pub fn tetra_centroid(&self, id: TetraId) -> Result<DVec3, FabricError> {
        Ok(tetra::centroid(&self.tetra_locations(id)?))
    }

    pub fn tetra_radius(&self, id: TetraId) -> Result<f64, FabricError> {
        Ok(tetra::radius(&self.tetra_locations(id)?))
    }

    pub fn tetra_current_volume(&self, id: TetraId) -> Result<f64, FabricError> {
        Ok(tetra::current_volume(&self.tetra_locations(id)?))
    }

    /// The real interval along one tetra edge, staging a cable if the edge is
    /// bare.
    fn tetra_edge(
        &mut self,
        id: TetraId,
        (i, j): (usize, usize),
    ) -> Result<IntervalId, FabricError> {
        let joints = self.require_tetra(id)?.joints;
        match self.interval_between(joints[i], joints[j])? {
            Some(interval) => Ok(interval),
            None => self.add_interval(joints[i], joints[j], Role::Cable),
        }
    }

    /// The a-b and c-d intervals.
    pub fn tetra_bars(&mut self, id: TetraId) -> Result<[IntervalId; 2], FabricError> {
        Ok([
            self.tetra_edge(id, BAR_EDGES[0])?,
            self.tetra_edge(id, BAR_EDGES[1])?,
        ])
    }

    /// The b-c, a-c, a-d and b-d intervals.
    pub fn tetra_cables(&mut self, id: TetraId) -> Result<[IntervalId; 4], FabricError> {
        Ok([
            self.tetra_edge(id, CABLE_EDGES[0])?,
            self.tetra_edge(id, CABLE_EDGES[1])?,
            self.tetra_edge(id, CABLE_EDGES[2])?,
            self.tetra_edge(id, CABLE_EDGES[3])?,
        ])
    }

    /// Rescale the cables so their total length is `factor` times the total
    /// bar length, over `ticks`.
    pub fn set_tetra_slack(
        &mut self,
        id: TetraId,
        factor: f64,
        ticks: u32,
    ) -> Result<(), FabricError> {
        let cables = self.tetra_cables(id)?;
        let bars = self.tetra_bars(id)?;
        let mut existing = 0.0;
        for cable in cables {
            existing += self.require_interval(cable)?.span.ultimate_ideal();
        }
        let mut ideal = 0.0;
        for bar in bars {
            ideal += self.require_interval(bar)?.span.ultimate_ideal();
        }
        let scale = ideal * factor / existing;
        for cable in cables {
            let span = &mut self.require_interval_mut(cable)?.span;
            let target = span.ultimate_ideal() * scale;
            span.set_ideal(target, ticks);
        }
        Ok(())
    }

    /// Volume measure from the ultimate ideals of all six edges.
    pub fn tetra_ideal_volume(&mut self, id: TetraId) -> Result<f64, FabricError> {
        let [ab, cd] = self.tetra_bars(id)?;
        let [bc, ac, ad, db] = self.tetra_cables(id)?;
        let ideal = |fabric: &Self, i: IntervalId| {
            fabric
                .require_interval(i)
                .map(|interval| interval.span.ultimate_ideal())
        };
        Ok(tetra::volume_from_edges(
            ideal(self, ab)?,
            ideal(self, ac)?,
            ideal(self, ad)?,
            ideal(self, bc)?,
            ideal(self, cd)?,
            ideal(self, db)?,
        ))
    }

    // -----------------------------------------------------------------------
    // Whole-fabric geometry
    // -----------------------------------------------------------------------

    /// Mean location of the live joints.
    pub fn center(&self) -> DVec3 {
        if self.joints.is_empty() {
            return DVec3::ZERO;
        }
        let sum: DVec3 = self
            .joints
            .iter()
            .filter_map(|id| self.joint_store.get(*id))
            .map(|joint| joint.location)
            .sum();
        sum / self.joints.len() as f64
    }

    /// Distance from `point` to the farthest live joint.
    pub fn radius_from(&self, point: DVec3) -> f64 {
        self.joints
            .iter()
            .filter_map(|id| self.joint_store.get(*id))
            .map(|joint| joint.location.distance_squared(point))
            .fold(0.0, f64::max)
            .sqrt()
    }

    pub fn vertebra_location(&self, id: VertebraId) -> Result<DVec3, FabricError> {
        let locations = self
            .require_vertebra(id)?
            .joints
            .iter()
            .map(|joint| self.location(*joint))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(face::centroid(&locations))
    }

    // -----------------------------------------------------------------------
    // Rewiring
    // -----------------------------------------------------------------------

    /// Point every live or staged reference to `from` at `to`.
    ///
    /// Intervals that would end up joining `to` to itself are retired.
    pub fn replace(&mut self, from: JointId, to: JointId) -> Result<(), FabricError> {
        let intervals: Vec<IntervalId> = self.all_intervals().collect();
        for id in intervals {
            let collapsed = self.require_interval_mut(id)?.replace(from, to);
            if collapsed && !self.is_interval_removed(id) {
                self.remove_interval(id)?;
            }
        }
        let faces: Vec<FaceId> = self.all_faces().collect();
        for id in faces {
            if let Some(face) = self.face_store.get_mut(id) {
                face.replace(from, to);
            }
        }
        let tetras: Vec<TetraId> = self.all_tetras().collect();
        for id in tetras {
            if let Some(tetra) = self.tetra_store.get_mut(id) {
                tetra.replace(from, to);
            }
        }
        let vertebras: Vec<VertebraId> = self.all_vertebras().collect();
        for id in vertebras {
            if let Some(vertebra) = self.vertebra_store.get_mut(id) {
                vertebra.replace(from, to);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transformations
    // -----------------------------------------------------------------------

    /// Queue a transformation behind any already pending.
    pub fn add_transformation<T: Transformation + 'static>(&self, transformation: T) {
        self.transformations.push(Box::new(transformation));
    }

    pub fn add_boxed_transformation(&self, transformation: Box<dyn Transformation>) {
        self.transformations.push(transformation);
    }

    /// Handle for queueing transformations from other threads.
    pub fn submitter(&self) -> TransformationSubmitter {
        self.transformations.submitter()
    }

    pub fn has_transformations(&self) -> bool {
        !self.transformations.is_empty()
    }

    pub fn pending_transformations(&self) -> usize {
        self.transformations.len()
    }

    /// Drain the queue, then run `physics` once if given.
    ///
    /// Queued transformations only run while no span schedule is active, or
    /// unconditionally when no physics is supplied. Transformations queued
    /// while draining run in the same pass.
    pub fn execute_transformations(
        &mut self,
        physics: Option<&mut dyn PhysicsTransformation>,
    ) -> Result<(), FabricError> {
        if physics.is_none() || !self.is_any_span_active() {
            while let Some(mut transformation) = self.transformations.pop() {
                self.run_transformation(transformation.as_mut())?;
            }
        }
        if let Some(physics) = physics {
            physics.transform(self)?;
            self.apply_mods()?;
        }
        Ok(())
    }

    /// Run one transformation now and apply the edits it staged.
    ///
    /// A transformation that fails leaves the fabric as it found it: staged
    /// entities leave their arenas, removal marks are undone and in-place
    /// edits are reverted.
    pub fn run_transformation(
        &mut self,
        transformation: &mut dyn Transformation,
    ) -> Result<(), FabricError> {
        let checkpoint = self.checkpoint();
        if let Err(err) = transformation.transform(self) {
            warn!(
                transformation = transformation.name(),
                error = %err,
                "transformation failed, discarding its edits"
            );
            self.restore(checkpoint);
            return Err(err);
        }
        self.apply_mods()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            joint_store: self.joint_store.clone(),
            interval_store: self.interval_store.clone(),
            face_store: self.face_store.clone(),
            tetra_store: self.tetra_store.clone(),
            vertebra_store: self.vertebra_store.clone(),
            joints: self.joints.clone(),
            intervals: self.intervals.clone(),
            faces: self.faces.clone(),
            tetras: self.tetras.clone(),
            vertebras: self.vertebras.clone(),
            mods: self.mods.clone(),
            who_factory: self.who_factory.clone(),
            last_span_active: self.last_span_active,
            payload: self.payload.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.joint_store = checkpoint.joint_store;
        self.interval_store = checkpoint.interval_store;
        self.face_store = checkpoint.face_store;
        self.tetra_store = checkpoint.tetra_store;
        self.vertebra_store = checkpoint.vertebra_store;
        self.joints = checkpoint.joints;
        self.intervals = checkpoint.intervals;
        self.faces = checkpoint.faces;
        self.tetras = checkpoint.tetras;
        self.vertebras = checkpoint.vertebras;
        self.mods = checkpoint.mods;
        self.who_factory = checkpoint.who_factory;
        self.last_span_active = checkpoint.last_span_active;
        self.payload = checkpoint.payload;
    }

    /// Cascade joint removals to everything referencing the removed joints,
    /// then reconcile every kind in dependency order.
    fn apply_mods(&mut self) -> Result<(), FabricError> {
        let gone: Vec<JointId> = self
            .mods
            .joints
            .removed()
            .iter()
            .chain(self.mods.joints.cancelled())
            .copied()
            .collect();
        for joint in gone {
            self.cascade_removal(joint)?;
        }
        if !self.mods.is_empty() {
            debug!(
                age = self.age,
                joints_added = self.mods.joints.added().len(),
                joints_removed = self.mods.joints.removed().len(),
                intervals_added = self.mods.intervals.added().len(),
                intervals_removed = self.mods.intervals.removed().len(),
                faces_added = self.mods.faces.added().len(),
                faces_removed = self.mods.faces.removed().len(),
                "applying staged edits"
            );
        }
        self.mods
            .vertebras
            .apply(&mut self.vertebras, &mut self.vertebra_store);
        self.mods.tetras.apply(&mut self.tetras, &mut self.tetra_store);
        self.mods.faces.apply(&mut self.faces, &mut self.face_store);
        self.mods
            .intervals
            .apply(&mut self.intervals, &mut self.interval_store);
        self.mods.joints.apply(&mut self.joints, &mut self.joint_store);
        Ok(())
    }

    fn cascade_removal(&mut self, joint: JointId) -> Result<(), FabricError> {
        let intervals: Vec<IntervalId> = self
            .all_intervals()
            .filter(|id| {
                self.interval_store
                    .get(*id)
                    .is_some_and(|i| i.role != Role::Eliminated && i.contains(joint))
            })
            .collect();
        for id in intervals {
            self.remove_interval(id)?;
        }
        let faces: Vec<FaceId> = self
            .faces_of(joint)
            .into_iter()
            .filter(|id| !self.is_face_removed(*id))
            .collect();
        for id in faces {
            self.remove_face(id)?;
        }
        let tetras: Vec<TetraId> = self
            .tetras_of(joint)
            .into_iter()
            .filter(|id| !self.is_tetra_removed(*id))
            .collect();
        for id in tetras {
            self.remove_tetra(id)?;
        }
        let vertebras: Vec<VertebraId> = self
            .all_vertebras()
            .filter(|id| {
                !self.mods.vertebras.is_removed(*id)
                    && self
                        .vertebra_store
                        .get(*id)
                        .is_some_and(|v| v.contains(joint))
            })
            .collect();
        for id in vertebras {
            self.remove_vertebra(id)?;
        }
        Ok(())
    }

    // Removal helpers for repair passes that may meet an entity more than
    // once.

    pub(crate) fn retire_interval(&mut self, id: IntervalId) -> Result<(), FabricError> {
        if self.is_interval_removed(id) {
            return Ok(());
        }
        self.remove_interval(id)
    }

    pub(crate) fn retire_face(&mut self, id: FaceId) -> Result<(), FabricError> {
        if self.is_face_removed(id) {
            return Ok(());
        }
        self.remove_face(id)
    }

    pub(crate) fn retire_tetra(&mut self, id: TetraId) -> Result<(), FabricError> {
        if self.is_tetra_removed(id) {
            return Ok(());
        }
        self.remove_tetra(id)
    }

    pub(crate) fn retire_joint(&mut self, id: JointId) -> Result<(), FabricError> {
        if self.is_joint_removed(id) {
            return Ok(());
        }
        self.remove_joint(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::Order;
    use crate::transform::from_fn;

    /// Three joints and three springs of unit length, committed.
    fn triangle() -> (Fabric, [JointId; 3]) {
        let mut fabric = Fabric::new();
        fabric
            .run_transformation(&mut from_fn("triangle", |f: &mut Fabric| {
                let corners = [
                    DVec3::new(0.0, 0.0, 0.0),
                    DVec3::new(1.0, 0.0, 0.0),
                    DVec3::new(0.5, 0.75f64.sqrt(), 0.0),
                ];
                let mut joints = Vec::new();
                for corner in corners {
                    let who = f.create_who(Side::Middle);
                    joints.push(f.add_joint(who, corner)?);
                }
                for walk in 0..3 {
                    f.add_interval(joints[walk], joints[(walk + 1) % 3], Role::Spring)?;
                }
                f.add_face(Face::new(Order::LeftHanded, joints))?;
                Ok(())
            }))
            .unwrap();
        let joints = [fabric.joints[0], fabric.joints[1], fabric.joints[2]];
        (fabric, joints)
    }

    #[test]
    fn staged_entities_appear_after_apply() {
        let (fabric, _) = triangle();
        assert_eq!(fabric.joints().len(), 3);
        assert_eq!(fabric.intervals().len(), 3);
        assert_eq!(fabric.faces().len(), 1);
        assert!(fabric.mods().is_empty());
    }

    #[test]
    fn queries_see_staged_additions() {
        let (mut fabric, [a, b, c]) = triangle();
        let extra = fabric.add_interval(a, b, Role::Cable).unwrap();
        assert_eq!(fabric.real_intervals(a, b).len(), 2);
        assert_eq!(fabric.intervals_of(c).len(), 2);
        assert!(matches!(
            fabric.interval_between(a, b),
            Err(FabricError::MultipleIntervals(..))
        ));
        fabric.remove_interval(extra).unwrap();
        assert_eq!(fabric.real_intervals(a, b).len(), 1);
    }

    #[test]
    fn removing_a_joint_cascades() {
        let (mut fabric, [a, _, _]) = triangle();
        fabric
            .run_transformation(&mut from_fn("remove", move |f: &mut Fabric| {
                f.remove_joint(a)
            }))
            .unwrap();
        assert_eq!(fabric.joints().len(), 2);
        assert_eq!(fabric.intervals().len(), 1);
        assert!(fabric.faces().is_empty());
        assert!(fabric.joint(a).is_none());
    }

    #[test]
    fn removed_joint_becomes_eliminated_until_applied() {
        let (mut fabric, [a, _, _]) = triangle();
        fabric.remove_joint(a).unwrap();
        assert_eq!(fabric.who_of(a).unwrap().side, Side::Eliminated);
        assert!(fabric.intervals_of(a).is_empty());
    }

    #[test]
    fn area_of_unit_triangle() {
        let (fabric, _) = triangle();
        let area = fabric.area(fabric.faces()[0]).unwrap();
        assert!((area - 3f64.sqrt() / 4.0).abs() < 1e-9);
    }

    #[test]
    fn area_needs_every_side() {
        let (mut fabric, [a, b, _]) = triangle();
        let side = fabric.interval_between(a, b).unwrap().unwrap();
        fabric.remove_interval(side).unwrap();
        let face = fabric.faces()[0];
        assert!(matches!(fabric.area(face), Err(FabricError::SideMissing(..))));
    }

    #[test]
    fn replace_collapses_shared_interval() {
        let (mut fabric, [a, b, c]) = triangle();
        fabric.replace(a, b).unwrap();
        assert!(fabric.interval_between(a, b).unwrap().is_none());
        assert_eq!(fabric.real_intervals(b, c).len(), 2);
        let face = fabric.face(fabric.faces()[0]).unwrap();
        assert!(!face.contains(a));
    }

    #[test]
    fn temporary_interval_schedules_its_own_expiry() {
        let (mut fabric, [a, b, _]) = triangle();
        let id = fabric.add_interval(a, b, Role::Temporary).unwrap();
        let span = &fabric.interval(id).unwrap().span;
        assert!(span.is_active());
        assert_eq!(span.ultimate_ideal(), 0.0);
        assert_eq!(span.futures().next().map(|f| f.how_long), Some(130));
        assert!(!fabric.is_real(id));
    }

    #[test]
    fn sheath_map_lists_neighbours() {
        let (fabric, [a, b, c]) = triangle();
        let map = fabric.sheath_map().unwrap();
        let sheath = &map[&fabric.who_of(a).unwrap()];
        assert_eq!(sheath.degree(), 2);
        assert!(sheath.others.contains(&b));
        assert!(sheath.others.contains(&c));
    }

    #[test]
    fn transformations_drain_in_fifo_order() {
        let (mut fabric, _) = triangle();
        let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        for label in ["one", "two", "three"] {
            let log = log.clone();
            fabric.add_transformation(from_fn(label, move |_f: &mut Fabric| {
                log.lock().unwrap().push(label);
                Ok(())
            }));
        }
        fabric.execute_transformations(None).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["one", "two", "three"]);
        assert!(!fabric.has_transformations());
    }

    #[test]
    fn failed_transformation_leaves_no_staged_joint() {
        let (mut fabric, _) = triangle();
        let err = fabric
            .run_transformation(&mut from_fn("doomed", |f: &mut Fabric| {
                let who = f.create_who(Side::Middle);
                f.add_joint(who, DVec3::Z)?;
                Err(FabricError::DegenerateBasis)
            }))
            .unwrap_err();
        assert!(matches!(err, FabricError::DegenerateBasis));
        assert!(fabric.mods.is_empty());
        assert_eq!(fabric.joint_store.len(), 3);

        fabric
            .run_transformation(&mut from_fn("noop", |_: &mut Fabric| Ok(())))
            .unwrap();
        assert_eq!(fabric.joints().len(), 3);
        assert_eq!(fabric.create_who(Side::Middle), Who::new(Side::Middle, 3));
    }

    #[test]
    fn failed_transformation_undoes_removals_and_edits() {
        let (mut fabric, joints) = triangle();
        let interval = fabric.intervals()[0];
        let before = fabric.joint(joints[0]).unwrap().location;
        fabric
            .run_transformation(&mut from_fn("doomed", move |f: &mut Fabric| {
                f.remove_interval(interval)?;
                f.remove_joint(joints[1])?;
                f.require_joint_mut(joints[0])?.location = DVec3::splat(9.0);
                Err(FabricError::DegenerateBasis)
            }))
            .unwrap_err();
        assert_eq!(fabric.interval(interval).unwrap().role, Role::Spring);
        assert_eq!(fabric.who_of(joints[1]).unwrap(), Who::new(Side::Middle, 1));
        assert_eq!(fabric.joint(joints[0]).unwrap().location, before);

        fabric
            .run_transformation(&mut from_fn("noop", |_: &mut Fabric| Ok(())))
            .unwrap();
        assert_eq!(fabric.joints().len(), 3);
        assert_eq!(fabric.intervals().len(), 3);
        assert_eq!(fabric.faces().len(), 1);
    }

    #[test]
    fn who_marks_resume_after_existing_joints() {
        let (mut fabric, _) = triangle();
        assert_eq!(fabric.create_who(Side::Middle), Who::new(Side::Middle, 3));
        assert_eq!(fabric.create_who(Side::Left), Who::new(Side::Left, 0));
    }

    #[test]
    fn center_and_radius() {
        let (fabric, _) = triangle();
        let center = fabric.center();
        assert!((center.x - 0.5).abs() < 1e-12);
        let radius = fabric.radius_from(center);
        assert!((radius - 1.0 / 3f64.sqrt()).abs() < 1e-9);
    }
}
