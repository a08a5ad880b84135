use crate::fabric::{Fabric, FabricError};
use crate::transform::Transformation;
use glam::DVec3;

/// Centre a fabric over the origin in x and y and lift it out of the floor.
///
/// Anything below z = 0 is raised so the lowest joint sits at `height`; a
/// fabric already above the floor is raised by `height`. Velocities are
/// zeroed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AboveFloor {
    pub height: f64,
}

impl AboveFloor {
    pub fn new(height: f64) -> Self {
        Self { height }
    }
}

impl Transformation for AboveFloor {
    fn name(&self) -> &str {
        "above floor"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        let ids = fabric.joints().to_vec();
        if ids.is_empty() {
            return Ok(());
        }
        let mut lowest: f64 = 0.0;
        let mut sum = DVec3::ZERO;
        for &id in &ids {
            let location = fabric.location(id)?;
            sum += location;
            lowest = lowest.min(location.z);
        }
        let average = sum / ids.len() as f64;
        let shift = DVec3::new(-average.x, -average.y, self.height - lowest);
        for id in ids {
            let joint = fabric.require_joint_mut(id)?;
            joint.location += shift;
            joint.velocity = DVec3::ZERO;
        }
        Ok(())
    }
}
