use slotmap::new_key_type;

new_key_type! {
    /// Identifies a joint (point mass) in a fabric's entity arena.
    pub struct JointId;

    /// Identifies an interval (elastic or rigid link) in the arena.
    pub struct IntervalId;

    /// Identifies a face (usually a triangle of joints).
    pub struct FaceId;

    /// Identifies a tetrahedron of four joints.
    pub struct TetraId;

    /// Identifies a vertebra (a ring-pair of joints).
    pub struct VertebraId;
}
