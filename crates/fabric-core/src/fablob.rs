//! Binary snapshots of a fabric.
//!
//! A [`Fablob`] is a flat big-endian byte image of a committed fabric: a
//! magic header, the clock and identity counters, then counted records for
//! joints, intervals, faces, tetras and vertebras. Joints are referenced by
//! their [`Who`], so the image does not depend on arena slots; a face's stress
//! interval is referenced by its position in the interval records.
//!
//! Also provides stream framing with a length prefix and a ring buffer of
//! blobs for rolling back to a known-good state.

use crate::face::{Chirality, Face, Order};
use crate::fabric::{Fabric, FabricError};
use crate::id::{IntervalId, JointId};
use crate::interval::{Interval, Role};
use crate::joint::Joint;
use crate::span::{Future, Span};
use crate::tetra::Tetra;
use crate::vertebra::Vertebra;
use crate::who::{Side, Who, WhoFactory};
use glam::DVec3;
use std::collections::HashMap;
use std::io::{Read, Write};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number opening every fablob.
pub const MAGIC: u32 = 0xFAB0_0B1E;

/// Who is packed into a short as `side + id * WHO_STRIDE`.
const WHO_STRIDE: i64 = Side::COUNT as i64;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FablobError {
    #[error("this is not a fabric: expected magic 0x{:08X}, got 0x{:08X}", MAGIC, .0)]
    BadMagic(u32),
    #[error("data truncated at byte {position}: needed {needed} more")]
    Truncated { position: usize, needed: usize },
    #[error("couldn't pack short {0}")]
    ShortOutOfRange(i64),
    #[error("couldn't pack byte {0}")]
    ByteOutOfRange(i64),
    #[error("length {0} does not fit a 4-byte prefix")]
    LengthOutOfRange(usize),
    #[error("unknown role ordinal {0}")]
    UnknownRole(i8),
    #[error("unknown side in packed identity {0}")]
    UnknownSide(i16),
    #[error("unknown face orientation {0}")]
    UnknownOrientation(i8),
    #[error("record refers to unknown joint {0}")]
    UnknownJoint(Who),
    #[error("record refers to unknown interval #{0}")]
    UnknownInterval(i16),
    #[error("identity {0} appears twice")]
    DuplicateWho(Who),
    #[error("negative count {0}")]
    NegativeCount(i64),
    #[error("cannot create a fablob when transformations are pending")]
    PendingTransformations,
    #[error("fabric inconsistent: {0}")]
    Fabric(#[from] FabricError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

fn length_prefix(len: usize) -> Result<u32, FablobError> {
    u32::try_from(len).map_err(|_| FablobError::LengthOutOfRange(len))
}

#[derive(Debug, Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn boolean(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    fn byte(&mut self, value: i64) -> Result<(), FablobError> {
        let value = i8::try_from(value).map_err(|_| FablobError::ByteOutOfRange(value))?;
        self.bytes.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn short(&mut self, value: i64) -> Result<(), FablobError> {
        let value = i16::try_from(value).map_err(|_| FablobError::ShortOutOfRange(value))?;
        self.bytes.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn int(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn long(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn double(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn arrow(&mut self, value: DVec3) {
        self.double(value.x);
        self.double(value.y);
        self.double(value.z);
    }

    fn count(&mut self, count: usize) -> Result<(), FablobError> {
        self.short(i64::try_from(count).unwrap_or(i64::MAX))
    }

    fn who(&mut self, who: Who) -> Result<(), FablobError> {
        self.short(who.side.ordinal() as i64 + i64::from(who.id) * WHO_STRIDE)
    }

    fn payload(&mut self, payload: Option<&Vec<u8>>) -> Result<(), FablobError> {
        self.boolean(payload.is_some());
        if let Some(bytes) = payload {
            self.int(length_prefix(bytes.len())?);
            self.bytes.extend_from_slice(bytes);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over a fablob's bytes. Every read checks the remaining length.
struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], FablobError> {
        let end = self.position + N;
        let slice = self
            .data
            .get(self.position..end)
            .ok_or_else(|| FablobError::Truncated {
                position: self.position,
                needed: end - self.data.len(),
            })?;
        self.position = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], FablobError> {
        let remaining = self.data.len() - self.position;
        if len > remaining {
            return Err(FablobError::Truncated {
                position: self.position,
                needed: len - remaining,
            });
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn boolean(&mut self) -> Result<bool, FablobError> {
        Ok(self.take::<1>()?[0] != 0)
    }

    fn byte(&mut self) -> Result<i8, FablobError> {
        Ok(i8::from_be_bytes(self.take()?))
    }

    fn short(&mut self) -> Result<i16, FablobError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    fn int(&mut self) -> Result<u32, FablobError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn long(&mut self) -> Result<i64, FablobError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    fn double(&mut self) -> Result<f64, FablobError> {
        Ok(f64::from_be_bytes(self.take()?))
    }

    fn arrow(&mut self) -> Result<DVec3, FablobError> {
        Ok(DVec3::new(self.double()?, self.double()?, self.double()?))
    }

    fn count(&mut self) -> Result<usize, FablobError> {
        let count = self.short()?;
        usize::try_from(count).map_err(|_| FablobError::NegativeCount(i64::from(count)))
    }

    fn small_count(&mut self) -> Result<usize, FablobError> {
        let count = self.byte()?;
        usize::try_from(count).map_err(|_| FablobError::NegativeCount(i64::from(count)))
    }

    fn who(&mut self) -> Result<Who, FablobError> {
        let packed = self.short()?;
        let value = i64::from(packed);
        if value < 0 {
            return Err(FablobError::UnknownSide(packed));
        }
        let side = Side::from_ordinal((value % WHO_STRIDE) as usize)
            .ok_or(FablobError::UnknownSide(packed))?;
        Ok(Who::new(side, (value / WHO_STRIDE) as u32))
    }

    fn payload(&mut self) -> Result<Option<Vec<u8>>, FablobError> {
        if !self.boolean()? {
            return Ok(None);
        }
        let len = self.int()? as usize;
        Ok(Some(self.bytes(len)?.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Fablob
// ---------------------------------------------------------------------------

/// A serialized fabric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fablob {
    bytes: Vec<u8>,
}

impl Fablob {
    /// Wrap bytes received from elsewhere. Nothing is checked until
    /// [`Fablob::to_fabric`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Snapshot a committed fabric.
    ///
    /// Refused while transformations are queued or edits are staged, since
    /// it would be undefined which state the blob represents.
    pub fn from_fabric(fabric: &Fabric) -> Result<Self, FablobError> {
        if fabric.has_transformations() || !fabric.mods().is_empty() {
            return Err(FablobError::PendingTransformations);
        }
        let mut out = Writer::default();
        out.int(MAGIC);
        pack_fabric(fabric, &mut out)?;
        tracing::debug!(
            age = fabric.age(),
            bytes = out.bytes.len(),
            joints = fabric.joints().len(),
            intervals = fabric.intervals().len(),
            "fablob packed"
        );
        Ok(Self { bytes: out.bytes })
    }

    /// Rebuild the fabric. Every entity arrives committed; no partial
    /// fabric is returned on error.
    pub fn to_fabric(&self) -> Result<Fabric, FablobError> {
        let mut input = Reader::new(&self.bytes);
        let magic = input.int()?;
        if magic != MAGIC {
            return Err(FablobError::BadMagic(magic));
        }
        unpack_fabric(&mut input)
    }

    /// Write with a 4-byte big-endian length prefix.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), FablobError> {
        let len = length_prefix(self.bytes.len())?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&self.bytes)?;
        Ok(())
    }

    /// Read one length-prefixed blob.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, FablobError> {
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix)?;
        let len = u32::from_be_bytes(prefix) as usize;
        let mut bytes = Vec::new();
        reader.take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() < len {
            return Err(FablobError::Truncated {
                position: bytes.len(),
                needed: len - bytes.len(),
            });
        }
        Ok(Self { bytes })
    }
}

fn mark_to_short(mark: Option<u32>) -> i64 {
    mark.map_or(-1, i64::from)
}

fn short_to_mark(value: i16) -> Option<u32> {
    u32::try_from(value).ok()
}

fn pack_fabric(fabric: &Fabric, out: &mut Writer) -> Result<(), FablobError> {
    out.long(i64::try_from(fabric.age).unwrap_or(i64::MAX));
    out.long(
        fabric
            .last_span_active
            .map_or(-1, |age| i64::try_from(age).unwrap_or(i64::MAX)),
    );
    for mark in fabric.who_factory.marks() {
        out.short(mark_to_short(mark))?;
    }
    out.payload(fabric.payload.as_ref())?;

    out.count(fabric.joints.len())?;
    for &id in &fabric.joints {
        let joint = fabric.require_joint(id)?;
        out.who(joint.who)?;
        out.arrow(joint.location);
        out.arrow(joint.velocity);
        out.double(joint.interval_mass);
        out.payload(joint.payload.as_ref())?;
    }

    let mut interval_index: HashMap<IntervalId, usize> = HashMap::new();
    out.count(fabric.intervals.len())?;
    for (index, &id) in fabric.intervals.iter().enumerate() {
        interval_index.insert(id, index);
        let interval = fabric.require_interval(id)?;
        out.byte(interval.role.ordinal() as i64)?;
        out.who(fabric.who_of(interval.alpha)?)?;
        out.who(fabric.who_of(interval.omega)?)?;
        pack_span(&interval.span, out)?;
        out.payload(interval.payload.as_ref())?;
    }

    out.count(fabric.faces.len())?;
    for &id in &fabric.faces {
        let face = fabric.require_face(id)?;
        out.byte((face.order.ordinal() + 2 * face.chirality.ordinal()) as i64)?;
        out.byte(face.joints.len() as i64)?;
        for &joint in &face.joints {
            out.who(fabric.who_of(joint)?)?;
        }
        let stress = face
            .stress_interval
            .and_then(|interval| interval_index.get(&interval));
        out.boolean(stress.is_some());
        if let Some(&index) = stress {
            out.count(index)?;
        }
        out.payload(face.payload.as_ref())?;
    }

    out.count(fabric.tetras.len())?;
    for &id in &fabric.tetras {
        let tetra = fabric.require_tetra(id)?;
        for &joint in &tetra.joints {
            out.who(fabric.who_of(joint)?)?;
        }
        out.boolean(tetra.clockwise);
    }

    out.count(fabric.vertebras.len())?;
    for &id in &fabric.vertebras {
        let vertebra = fabric.require_vertebra(id)?;
        out.boolean(vertebra.right_handed);
        out.byte(vertebra.joints.len() as i64)?;
        for &joint in &vertebra.joints {
            out.who(fabric.who_of(joint)?)?;
        }
    }
    Ok(())
}

fn pack_span(span: &Span, out: &mut Writer) -> Result<(), FablobError> {
    out.double(span.actual());
    out.double(span.current_ideal());
    out.double(span.stress());
    out.byte(span.chain_size() as i64)?;
    for future in span.futures() {
        out.double(future.initial);
        out.double(future.value);
        out.short(i64::from(future.how_long))?;
        out.long(
            future
                .when
                .map_or(-1, |when| i64::try_from(when).unwrap_or(i64::MAX)),
        );
    }
    Ok(())
}

fn unpack_span(input: &mut Reader<'_>) -> Result<Span, FablobError> {
    let mut span = Span::with_values(input.double()?, input.double()?, input.double()?);
    let chain = input.small_count()?;
    for _ in 0..chain {
        let initial = input.double()?;
        let value = input.double()?;
        let how_long = input.short()?;
        let how_long =
            u32::try_from(how_long).map_err(|_| FablobError::NegativeCount(i64::from(how_long)))?;
        let when = u64::try_from(input.long()?).ok();
        span.push_future(Future {
            initial,
            value,
            how_long,
            when,
        });
    }
    Ok(span)
}

fn lookup(input: &mut Reader<'_>, joints: &HashMap<Who, JointId>) -> Result<JointId, FablobError> {
    let who = input.who()?;
    joints.get(&who).copied().ok_or(FablobError::UnknownJoint(who))
}

fn unpack_fabric(input: &mut Reader<'_>) -> Result<Fabric, FablobError> {
    let mut fabric = Fabric::new();
    fabric.age = u64::try_from(input.long()?).unwrap_or(0);
    fabric.last_span_active = u64::try_from(input.long()?).ok();
    let mut marks = [None; Side::COUNT];
    for mark in &mut marks {
        *mark = short_to_mark(input.short()?);
    }
    fabric.who_factory = WhoFactory::with_marks(marks);
    fabric.payload = input.payload()?;

    let mut joints: HashMap<Who, JointId> = HashMap::new();
    for _ in 0..input.count()? {
        let who = input.who()?;
        let mut joint = Joint::new(who, input.arrow()?);
        joint.velocity = input.arrow()?;
        joint.set_mass(input.double()?);
        joint.payload = input.payload()?;
        let id = fabric.joint_store.insert(joint);
        if joints.insert(who, id).is_some() {
            return Err(FablobError::DuplicateWho(who));
        }
        fabric.joints.push(id);
    }
    for _ in 0..input.count()? {
        let ordinal = input.byte()?;
        let role = usize::try_from(ordinal)
            .ok()
            .and_then(Role::from_ordinal)
            .ok_or(FablobError::UnknownRole(ordinal))?;
        let alpha = lookup(input, &joints)?;
        let omega = lookup(input, &joints)?;
        let mut interval = Interval::new(alpha, omega, role, unpack_span(input)?);
        interval.payload = input.payload()?;
        let id = fabric.interval_store.insert(interval);
        fabric.intervals.push(id);
    }

    for _ in 0..input.count()? {
        let orientation = input.byte()?;
        let (order, chirality) = usize::try_from(orientation)
            .ok()
            .and_then(|value| {
                Some((Order::from_ordinal(value % 2)?, Chirality::from_ordinal(value / 2)?))
            })
            .ok_or(FablobError::UnknownOrientation(orientation))?;
        let count = input.small_count()?;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            members.push(lookup(input, &joints)?);
        }
        let mut face = Face::with_chirality(order, chirality, members);
        if input.boolean()? {
            let index = input.short()?;
            let interval = usize::try_from(index)
                .ok()
                .and_then(|index| fabric.intervals.get(index))
                .ok_or(FablobError::UnknownInterval(index))?;
            face.stress_interval = Some(*interval);
        }
        face.payload = input.payload()?;
        let id = fabric.face_store.insert(face);
        fabric.faces.push(id);
    }

    for _ in 0..input.count()? {
        let corners = [
            lookup(input, &joints)?,
            lookup(input, &joints)?,
            lookup(input, &joints)?,
            lookup(input, &joints)?,
        ];
        let tetra = Tetra::new(corners, input.boolean()?);
        let id = fabric.tetra_store.insert(tetra);
        fabric.tetras.push(id);
    }

    for _ in 0..input.count()? {
        let right_handed = input.boolean()?;
        let count = input.small_count()?;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            members.push(lookup(input, &joints)?);
        }
        let id = fabric
            .vertebra_store
            .insert(Vertebra::new(members, right_handed));
        fabric.vertebras.push(id);
    }

    tracing::debug!(
        age = fabric.age,
        joints = fabric.joints.len(),
        intervals = fabric.intervals.len(),
        faces = fabric.faces.len(),
        "fablob unpacked"
    );
    Ok(fabric)
}

// ---------------------------------------------------------------------------
// SnapshotRingBuffer
// ---------------------------------------------------------------------------

/// A blob together with the fabric age it was taken at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub age: u64,
    pub blob: Fablob,
}

/// Fixed-capacity history of fablobs. Once full, each new snapshot evicts
/// the oldest.
#[derive(Debug)]
pub struct SnapshotRingBuffer {
    slots: Vec<Option<Snapshot>>,
    next: usize,
    len: usize,
    recorded: u64,
}

impl SnapshotRingBuffer {
    /// Capacity is at least one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            next: 0,
            len: 0,
            recorded: 0,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        let capacity = self.capacity();
        self.slots[self.next] = Some(snapshot);
        self.next = (self.next + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
        self.recorded += 1;
    }

    /// Snapshot the fabric at its current age.
    pub fn record(&mut self, fabric: &Fabric) -> Result<(), FablobError> {
        let blob = Fablob::from_fabric(fabric)?;
        self.push(Snapshot {
            age: fabric.age(),
            blob,
        });
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Snapshots ever pushed, evicted ones included.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Index 0 is the oldest snapshot still held.
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        if index >= self.len {
            return None;
        }
        let oldest = if self.len < self.capacity() { 0 } else { self.next };
        self.slots[(oldest + index) % self.capacity()].as_ref()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.len.checked_sub(1).and_then(|index| self.get(index))
    }

    /// Rebuild the most recent snapshot's fabric.
    pub fn restore_latest(&self) -> Option<Result<Fabric, FablobError>> {
        self.latest().map(|snapshot| snapshot.blob.to_fabric())
    }
}
