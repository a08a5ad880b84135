use crate::fabric::{Fabric, FabricError};
use crate::transform::Transformation;
use glam::{DMat3, DVec3};

/// Reseat a whole fabric in a new coordinate frame.
///
/// Locations are expressed in the frame spanned by the three axes, then
/// shifted by `origin`. Velocities are zeroed.
#[derive(Debug, Clone, Copy)]
pub struct Relocator {
    inverse: DMat3,
    origin: DVec3,
}

impl Relocator {
    /// Fails if the axes do not span space.
    pub fn new(x: DVec3, y: DVec3, z: DVec3, origin: DVec3) -> Result<Self, FabricError> {
        let basis = DMat3::from_cols(x, y, z).transpose();
        if basis.determinant().abs() < 1e-12 {
            return Err(FabricError::DegenerateBasis);
        }
        Ok(Self {
            inverse: basis.inverse(),
            origin,
        })
    }
}

impl Transformation for Relocator {
    fn name(&self) -> &str {
        "relocator"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        for id in fabric.joints().to_vec() {
            let joint = fabric.require_joint_mut(id)?;
            joint.location = self.inverse * joint.location + self.origin;
            joint.velocity = DVec3::ZERO;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory;

    #[test]
    fn identity_basis_only_translates() {
        let mut fabric = factory::double_face_triangle().unwrap();
        let before = fabric.location(fabric.joints()[0]).unwrap();
        let shift = DVec3::new(1.0, 2.0, 3.0);
        let mut relocator = Relocator::new(DVec3::X, DVec3::Y, DVec3::Z, shift).unwrap();
        fabric.run_transformation(&mut relocator).unwrap();
        let after = fabric.location(fabric.joints()[0]).unwrap();
        assert!((after - before - shift).length() < 1e-12);
    }

    #[test]
    fn swapped_axes_swap_coordinates() {
        let mut fabric = factory::double_face_triangle().unwrap();
        let id = fabric.joints()[0];
        fabric.joint_mut(id).unwrap().velocity = DVec3::ONE;
        let before = fabric.location(id).unwrap();
        let mut relocator = Relocator::new(DVec3::Z, DVec3::Y, DVec3::X, DVec3::ZERO).unwrap();
        fabric.run_transformation(&mut relocator).unwrap();
        let after = fabric.location(id).unwrap();
        assert!((after - DVec3::new(before.z, before.y, before.x)).length() < 1e-12);
        assert_eq!(fabric.joint(id).unwrap().velocity, DVec3::ZERO);
    }

    #[test]
    fn flat_basis_is_rejected() {
        let err = Relocator::new(DVec3::X, DVec3::Y, DVec3::X, DVec3::ZERO).unwrap_err();
        assert!(matches!(err, FabricError::DegenerateBasis));
    }
}
