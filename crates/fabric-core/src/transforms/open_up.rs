use crate::face::{Chirality, Face, Order};
use crate::fabric::{Fabric, FabricError};
use crate::id::{FaceId, IntervalId, JointId};
use crate::interval::Role;
use crate::tetra::Tetra;
use crate::transform::Transformation;

/// Distance along the face normal at which the apex starts.
pub const INITIAL_SPAN: f64 = 0.07;

type FacesCallback = Box<dyn FnMut(&mut Fabric, [FaceId; 3]) + Send>;

/// Open a triangular face like a book.
///
/// A new apex joint rises from the face's first corner. Springs copied from
/// the two edges at that corner reach the apex, an expanding interval of
/// the chosen role pushes it out, two new faces close the sides, and the
/// four joints form a new tetra. The original face moves onto the apex.
pub struct OpenUp {
    face: FaceId,
    span_factor: f64,
    ticks_to_ideal: u32,
    role: Role,
    use_chirality: bool,
    callback: Option<FacesCallback>,
}

impl std::fmt::Debug for OpenUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenUp")
            .field("face", &self.face)
            .field("span_factor", &self.span_factor)
            .field("ticks_to_ideal", &self.ticks_to_ideal)
            .field("role", &self.role)
            .field("use_chirality", &self.use_chirality)
            .finish_non_exhaustive()
    }
}

impl OpenUp {
    pub fn new(face: FaceId, span_factor: f64, ticks_to_ideal: u32, role: Role) -> Self {
        Self {
            face,
            span_factor,
            ticks_to_ideal,
            role,
            use_chirality: false,
            callback: None,
        }
    }

    /// Twist the opened face by its chirality afterwards.
    pub fn use_chirality(mut self, use_chirality: bool) -> Self {
        self.use_chirality = use_chirality;
        self
    }

    /// Receive the three faces around the apex: the first new face, the
    /// original, and the second new face.
    pub fn on_faces(mut self, callback: impl FnMut(&mut Fabric, [FaceId; 3]) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    fn validate(&self, fabric: &Fabric) -> Result<[JointId; 3], FabricError> {
        let live = fabric.all_faces().any(|id| id == self.face);
        if !live || fabric.is_face_removed(self.face) {
            return Err(FabricError::StructureGone(format!(
                "face {:?} is gone",
                self.face
            )));
        }
        let joints = fabric.require_face(self.face)?.joints();
        let &[j0, j1, j2] = joints else {
            return Err(FabricError::NotTriangle(joints.len()));
        };
        for joint in [j0, j1, j2] {
            let alive = fabric.all_joints().any(|id| id == joint);
            if !alive || fabric.is_joint_removed(joint) {
                return Err(FabricError::MissingJoint(fabric.who_of(joint)?));
            }
        }
        for (a, b) in [(j1, j2), (j2, j0), (j0, j1)] {
            if fabric.interval_between(a, b)?.is_none() {
                return Err(FabricError::MissingInterval(
                    fabric.who_of(a)?,
                    fabric.who_of(b)?,
                ));
            }
        }
        Ok([j0, j1, j2])
    }

    /// Spring from `joint` to the apex, scaled from the edge `j0`-`joint`.
    fn copy_interval(
        &self,
        fabric: &mut Fabric,
        j0: JointId,
        apex: JointId,
        joint: JointId,
    ) -> Result<f64, FabricError> {
        let old = fabric
            .interval_between(j0, joint)?
            .ok_or(FabricError::MissingInterval(fabric.who_of(j0)?, fabric.who_of(joint)?))?;
        let ideal = fabric.require_interval(old)?.span.ultimate_ideal() * self.span_factor;
        let spring = fabric.add_interval(joint, apex, Role::Spring)?;
        let span = &mut fabric.require_interval_mut(spring)?.span;
        span.set_ideal(ideal, self.ticks_to_ideal);
        Ok(span.ultimate_ideal())
    }

    fn side_face(
        &self,
        fabric: &mut Fabric,
        order: Order,
        chirality: Chirality,
        joints: [JointId; 3],
        expanding: IntervalId,
    ) -> Result<FaceId, FabricError> {
        let mut face = Face::with_chirality(order, chirality, joints.to_vec());
        if self.role == Role::Muscle {
            face.stress_interval = Some(expanding);
        }
        fabric.add_face(face)
    }
}

impl Transformation for OpenUp {
    fn name(&self) -> &str {
        "open up"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        let [j0, j1, j2] = self.validate(fabric)?;
        let (order, chirality) = {
            let face = fabric.require_face(self.face)?;
            (face.order, face.chirality)
        };
        let sides = [fabric.who_of(j0)?.side, fabric.who_of(j1)?.side, fabric.who_of(j2)?.side];
        let side = fabric.require_face(self.face)?.apex_side(&sides);
        let who = fabric.create_who(side);
        let location = fabric.location(j0)? + fabric.face_normal(self.face)? * INITIAL_SPAN;
        let apex = fabric.add_joint(who, location)?;

        let span1 = self.copy_interval(fabric, j0, apex, j1)?;
        let span2 = self.copy_interval(fabric, j0, apex, j2)?;
        let expanding = fabric.add_interval(j0, apex, self.role)?;
        fabric
            .require_interval_mut(expanding)?
            .span
            .set_ideal((span1 + span2) / 2.0, self.ticks_to_ideal);

        let face0 = self.side_face(fabric, order, chirality, [apex, j0, j1], expanding)?;
        let face1 = self.side_face(fabric, order, chirality, [apex, j2, j0], expanding)?;
        fabric.add_tetra(Tetra::new([j0, apex, j1, j2], order == Order::LeftHanded))?;

        let face = fabric.face_mut(self.face).ok_or(FabricError::FaceNotFound(self.face))?;
        face.set_joint(0, apex);
        if self.use_chirality {
            let forward = face.chirality == Chirality::RightHanded;
            face.twist(forward);
        }
        tracing::debug!(age = fabric.age(), %who, "face opened");
        if let Some(callback) = self.callback.as_mut() {
            callback(fabric, [face0, self.face, face1]);
        }
        Ok(())
    }
}
