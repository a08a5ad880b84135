use crate::fabric::{Fabric, FabricError};
use crate::id::{IntervalId, JointId};
use crate::interval::Role;
use crate::transform::Transformation;
use glam::DVec3;
use std::f64::consts::TAU;

/// Where a column joint sits along its piece of the bar.
const CONNECT_POSITION: f64 = 0.75;

/// Replace the span of a bar with a column of shorter bars.
///
/// The bar is cut into `length` layers. Each layer holds `circumference`
/// short bars spaced evenly around the original axis, their ends copying
/// the sides of the original ends. Within a layer every short bar is tied
/// to both neighbours: a new joint three quarters of the way along the bar
/// is held by an across cable from the near end and ring cables to the far
/// end and the neighbour's far end, and an across cable runs from the far
/// end to the neighbour's near end.
///
/// The original bar is left in place.
#[derive(Debug, Clone)]
pub struct BarToColumn {
    bar: IntervalId,
    length: usize,
    circumference: usize,
}

impl BarToColumn {
    pub fn new(bar: IntervalId, length: usize, circumference: usize) -> Self {
        Self {
            bar,
            length,
            circumference,
        }
    }

    /// Stage one short bar of the column.
    fn piece(
        fabric: &mut Fabric,
        ends: (JointId, JointId),
        alpha: DVec3,
        omega: DVec3,
    ) -> Result<(JointId, JointId), FabricError> {
        let alpha_who = fabric.who_of(ends.0)?;
        let omega_who = fabric.who_of(ends.1)?;
        let alpha_who = fabric.create_another_like(alpha_who);
        let alpha = fabric.add_joint(alpha_who, alpha)?;
        let omega_who = fabric.create_another_like(omega_who);
        let omega = fabric.add_joint(omega_who, omega)?;
        fabric.add_interval(alpha, omega, Role::Bar)?;
        Ok((alpha, omega))
    }

    /// Tie the bar `a0`-`a1` to its neighbour `b0`-`b1`.
    fn connect(
        fabric: &mut Fabric,
        (a0, a1): (JointId, JointId),
        (b0, b1): (JointId, JointId),
    ) -> Result<(), FabricError> {
        let location = fabric.location(a0)?.lerp(fabric.location(a1)?, CONNECT_POSITION);
        let who = fabric.who_of(a1)?;
        let who = fabric.create_another_like(who);
        let p = fabric.add_joint(who, location)?;
        fabric.add_interval(a0, p, Role::Across)?;
        fabric.add_interval(a1, p, Role::Ring)?;
        fabric.add_interval(p, b1, Role::Ring)?;
        fabric.add_interval(a1, b0, Role::Across)?;
        Ok(())
    }
}

impl Transformation for BarToColumn {
    fn name(&self) -> &str {
        "bar to column"
    }

    fn transform(&mut self, fabric: &mut Fabric) -> Result<(), FabricError> {
        let (ends, ideal) = {
            let bar = fabric.require_interval(self.bar)?;
            ((bar.alpha(), bar.omega()), bar.span.ultimate_ideal())
        };
        if self.length == 0 || self.circumference == 0 {
            return Ok(());
        }
        let (from, to) = (fabric.location(ends.0)?, fabric.location(ends.1)?);
        let unit = match (to - from).try_normalize() {
            Some(unit) => unit,
            None => DVec3::Z,
        };
        let (across, around) = unit.any_orthonormal_pair();
        let extend = ideal / self.length as f64 / 2.0;
        tracing::debug!(
            age = fabric.age(),
            length = self.length,
            circumference = self.circumference,
            "bar to column"
        );

        for along in 0..self.length {
            let middle = from.lerp(to, (along as f64 + 0.5) / self.length as f64);
            let mut layer = Vec::with_capacity(self.circumference);
            for count in 0..self.circumference {
                let angle = TAU * count as f64 / self.circumference as f64;
                let offset = (across * angle.cos() + around * angle.sin()) * extend;
                let alpha = middle - unit * extend + offset;
                let omega = middle + unit * extend + offset;
                layer.push(Self::piece(fabric, ends, alpha, omega)?);
            }
            let size = layer.len();
            for count in 0..size {
                let (a0, a1) = layer[count];
                let next = layer[(count + 1) % size];
                let prev = layer[(count + size - 1) % size];
                Self::connect(fabric, (a0, a1), next)?;
                Self::connect(fabric, (a1, a0), (prev.1, prev.0))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::role_count;
    use crate::transform::from_fn;
    use crate::validation::validate;
    use crate::who::Side;

    /// A lone bar of length 2 along X from a LEFT joint to a RIGHT joint.
    fn lone_bar() -> (Fabric, IntervalId) {
        let mut fabric = Fabric::new();
        fabric
            .run_transformation(&mut from_fn("bar", |f: &mut Fabric| {
                let left = f.create_who(Side::Left);
                let left = f.add_joint(left, DVec3::new(-1.0, 0.0, 1.0))?;
                let right = f.create_who(Side::Right);
                let right = f.add_joint(right, DVec3::new(1.0, 0.0, 1.0))?;
                f.add_interval(left, right, Role::Bar)?;
                Ok(())
            }))
            .unwrap();
        let bar = fabric.intervals()[0];
        (fabric, bar)
    }

    fn side_count(fabric: &Fabric, side: Side) -> usize {
        fabric
            .joints()
            .iter()
            .filter(|id| fabric.who_of(**id).unwrap().side == side)
            .count()
    }

    #[test]
    fn column_counts() {
        let (mut fabric, bar) = lone_bar();
        fabric.run_transformation(&mut BarToColumn::new(bar, 3, 4)).unwrap();
        // Per layer and position: two bar ends and two tie joints, one bar
        // and eight cables.
        assert_eq!(fabric.joints().len(), 2 + 3 * 4 * 4);
        assert_eq!(fabric.intervals().len(), 1 + 3 * 4 * 9);
        assert_eq!(role_count(&fabric, Role::Bar), 1 + 12);
        assert_eq!(role_count(&fabric, Role::Across), 48);
        assert_eq!(role_count(&fabric, Role::Ring), 48);
        assert_eq!(side_count(&fabric, Side::Left), 25);
        assert_eq!(side_count(&fabric, Side::Right), 25);
        assert_eq!(validate(&fabric), vec![]);
    }

    #[test]
    fn column_pieces_tile_the_bar() {
        let (mut fabric, bar) = lone_bar();
        fabric.run_transformation(&mut BarToColumn::new(bar, 2, 3)).unwrap();
        let mut xs: Vec<f64> = fabric
            .intervals()
            .iter()
            .filter(|id| **id != bar)
            .filter(|id| fabric.interval(**id).unwrap().role() == Role::Bar)
            .map(|id| {
                let (alpha, omega) = fabric.interval_ends(*id).unwrap();
                assert!((alpha.distance(omega) - 1.0).abs() < 1e-9);
                (alpha.x + omega.x) / 2.0
            })
            .collect();
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs.len(), 6);
        assert!(xs[..3].iter().all(|x| (x + 0.5).abs() < 1e-9));
        assert!(xs[3..].iter().all(|x| (x - 0.5).abs() < 1e-9));
    }

    #[test]
    fn empty_column_changes_nothing() {
        let (mut fabric, bar) = lone_bar();
        fabric.run_transformation(&mut BarToColumn::new(bar, 0, 4)).unwrap();
        assert_eq!(fabric.joints().len(), 2);
        assert_eq!(fabric.intervals().len(), 1);
    }

    #[test]
    fn missing_bar_is_an_error() {
        let (mut fabric, bar) = lone_bar();
        fabric
            .run_transformation(&mut from_fn("cut", move |f: &mut Fabric| f.remove_interval(bar)))
            .unwrap();
        let err = fabric
            .run_transformation(&mut BarToColumn::new(bar, 1, 3))
            .unwrap_err();
        assert!(matches!(err, FabricError::IntervalNotFound(_)));
    }
}
