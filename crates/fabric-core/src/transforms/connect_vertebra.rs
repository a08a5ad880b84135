use crate::fabric::{Fabric, FabricError};
use crate::id::VertebraId;
use crate::interval::Role;
use crate::transform::Transformation;

/// Tie the omega ring of one vertebra to the alpha ring of another with
/// temporary intervals, which later collapse the rings onto each other.
///
/// A reversed connection walks the first ring backwards, closing a chain of
/// vertebrae into a non-orientable loop.
#[derive(Debug, Clone)]
pub struct ConnectVertebra {
    alpha: VertebraId,
    omega: VertebraId,
    reversed: bool,
}

impl ConnectVertebra {
    pub fn new(alpha: VertebraId, omega: VertebraId, reversed: bool) -> Self {
        Self {
            alpha,
            omega,
            reversed,
        }
    }
}

impl Transformation for ConnectVertebra {
    fn name(&self) -> &str {
        "connect vertebra"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        let mut alpha_ring = fabric.require_vertebra(self.alpha)?.ring(false);
        let omega_ring = fabric.require_vertebra(self.omega)?.ring(true);
        if alpha_ring.len() != omega_ring.len() {
            return Err(FabricError::RingMismatch(alpha_ring.len(), omega_ring.len()));
        }
        if self.reversed {
            alpha_ring.reverse();
        } else if !alpha_ring.is_empty() {
            alpha_ring.rotate_left(1);
        }
        for (alpha, omega) in alpha_ring.into_iter().zip(omega_ring) {
            fabric.add_interval(alpha, omega, Role::Temporary)?;
        }
        Ok(())
    }
}
