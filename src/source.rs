// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use fixedbitset::FixedBitSet;
use ndarray::Array3;

use crate::core::{CartesianGrid, NDIM};
use crate::error::{EikonalError, Result};

/// Default value of nodes that are not seeded.
///
/// Must exceed every travel time the solve can produce.
pub const FAR_FIELD: f64 = 1e10;

/// Builder for the initial field `u0` of a forward solve.
///
/// All nodes start at the far-field value; seeds set individual nodes.
/// Overlapping seeds keep the smaller value. Seeded nodes are tracked, so
/// the far-field value can be replaced at any time without touching them.
#[derive(Debug, Clone)]
pub struct InitialField {
    grid: CartesianGrid,
    values: Vec<f64>,
    seeded: FixedBitSet,
    far_field: f64,
}

impl InitialField {
    /// Field over `grid` filled with [`FAR_FIELD`].
    pub fn new(grid: CartesianGrid) -> Self {
        InitialField {
            grid,
            values: vec![FAR_FIELD; grid.num_nodes()],
            seeded: FixedBitSet::with_capacity(grid.num_nodes()),
            far_field: FAR_FIELD,
        }
    }

    /// Replace the far-field value of every unseeded node (builder method).
    pub fn with_far_field(mut self, value: f64) -> Self {
        for (index, v) in self.values.iter_mut().enumerate() {
            if !self.seeded.contains(index) {
                *v = value;
            }
        }
        self.far_field = value;
        self
    }

    /// Value of the nodes no seed has touched.
    pub fn far_field(&self) -> f64 {
        self.far_field
    }

    fn lower(&mut self, flat: usize, value: f64) {
        let current = if self.seeded.contains(flat) {
            self.values[flat]
        } else {
            f64::INFINITY
        };
        self.values[flat] = current.min(value);
        self.seeded.insert(flat);
    }

    /// The grid this field lives on.
    pub fn grid(&self) -> &CartesianGrid {
        &self.grid
    }

    /// Seed a single node with `value`.
    ///
    /// # Errors
    /// Returns an error if the index lies outside the grid.
    pub fn seed_node(&mut self, idx: [usize; NDIM], value: f64) -> Result<()> {
        let shape = self.grid.shape();
        if idx.iter().zip(shape.iter()).any(|(&i, &s)| i >= s) {
            return Err(EikonalError::InvalidSource {
                coord: idx.iter().map(|&i| i as f64).collect(),
                reason: format!("node index outside grid of shape {:?}", shape),
            });
        }
        let flat = self.grid.nd_to_flat(idx);
        self.lower(flat, value);
        Ok(())
    }

    /// Seed a point source at physical coordinates `coord`.
    ///
    /// Every node within `2h` of the source gets the straight-ray travel
    /// time `f_source * distance`, with `f_source` the slowness of the node
    /// nearest to the source.
    ///
    /// # Errors
    /// Returns an error if the source lies outside the domain or `f` does
    /// not match the grid.
    pub fn add_point_source(&mut self, coord: [f64; NDIM], f: &[f64]) -> Result<()> {
        self.grid.check_field("f", f)?;
        let nearest = self.grid.nearest_node(coord)?;
        let f_source = f[self.grid.nd_to_flat(nearest)];

        let h = self.grid.spacing();
        let shape = self.grid.shape();
        let radius = 2.0 * h;

        let mut lo = [0usize; NDIM];
        let mut hi = [0usize; NDIM];
        for d in 0..NDIM {
            lo[d] = ((coord[d] - radius) / h).floor().max(0.0) as usize;
            hi[d] = ((coord[d] + radius) / h).ceil().min((shape[d] - 1) as f64) as usize;
        }

        for i in lo[0]..=hi[0] {
            for j in lo[1]..=hi[1] {
                for k in lo[2]..=hi[2] {
                    let node = self.grid.node_coord([i, j, k]);
                    let dist = node
                        .iter()
                        .zip(coord.iter())
                        .map(|(x, c)| (x - c) * (x - c))
                        .sum::<f64>()
                        .sqrt();
                    if dist <= radius {
                        let flat = self.grid.nd_to_flat([i, j, k]);
                        self.lower(flat, f_source * dist);
                    }
                }
            }
        }
        Ok(())
    }

    /// The field values, row-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the builder and return the row-major values.
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Consume the builder and return the field as a 3D array.
    pub fn into_array(self) -> Array3<f64> {
        let [m, n, l] = self.grid.shape();
        let grid = self.grid;
        Array3::from_shape_fn((m, n, l), |(i, j, k)| self.values[grid.nd_to_flat([i, j, k])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn starts_at_far_field() {
        let grid = CartesianGrid::new([2, 3, 4], 1.0).unwrap();
        let field = InitialField::new(grid);
        assert!(field.values().iter().all(|&v| v == FAR_FIELD));
        let field = field.with_far_field(f64::INFINITY);
        assert!(field.values().iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn seeds_keep_minimum() {
        let grid = CartesianGrid::new([3, 3, 3], 1.0).unwrap();
        let mut field = InitialField::new(grid);
        field.seed_node([1, 2, 0], 0.5).unwrap();
        field.seed_node([1, 2, 0], 0.8).unwrap();
        assert_eq!(field.values()[grid.nd_to_flat([1, 2, 0])], 0.5);

        let field = field.with_far_field(100.0);
        assert_eq!(field.values()[grid.nd_to_flat([1, 2, 0])], 0.5);
        assert_eq!(field.values()[0], 100.0);
    }

    #[test]
    fn far_field_can_be_replaced_repeatedly() {
        let grid = CartesianGrid::new([1, 1, 3], 1.0).unwrap();
        let field = InitialField::new(grid)
            .with_far_field(100.0)
            .with_far_field(f64::INFINITY);
        assert!(field.values().iter().all(|v| v.is_infinite()));
        assert!(field.far_field().is_infinite());
    }

    #[test]
    fn seed_at_far_field_value_is_kept() {
        let grid = CartesianGrid::new([1, 1, 3], 1.0).unwrap();
        let mut field = InitialField::new(grid);
        field.seed_node([0, 0, 1], FAR_FIELD).unwrap();
        let field = field.with_far_field(5.0);
        assert_eq!(field.values(), &[5.0, FAR_FIELD, 5.0]);
    }

    #[test]
    fn seed_above_far_field_is_set() {
        // a seed replaces the far-field value rather than combining with it
        let grid = CartesianGrid::new([1, 1, 2], 1.0).unwrap();
        let mut field = InitialField::new(grid).with_far_field(1.0);
        field.seed_node([0, 0, 0], 3.0).unwrap();
        field.seed_node([0, 0, 0], 4.0).unwrap();
        assert_eq!(field.values(), &[3.0, 1.0]);
    }

    #[test]
    fn seed_outside_grid_rejected() {
        let grid = CartesianGrid::new([3, 3, 3], 1.0).unwrap();
        let mut field = InitialField::new(grid);
        assert!(matches!(
            field.seed_node([0, 3, 0], 0.0),
            Err(EikonalError::InvalidSource { .. })
        ));
    }

    #[test]
    fn point_source_seeds_ball() {
        let grid = CartesianGrid::new([7, 7, 7], 0.5).unwrap();
        let f = vec![2.0; grid.num_nodes()];
        let mut field = InitialField::new(grid);
        field.add_point_source([1.5, 1.5, 1.5], &f).unwrap();

        let v = field.values();
        assert_eq!(v[grid.nd_to_flat([3, 3, 3])], 0.0);
        // one node away along an axis: distance h
        assert_abs_diff_eq!(v[grid.nd_to_flat([4, 3, 3])], 2.0 * 0.5, epsilon = 1e-12);
        // two nodes away: distance 2h, still in the ball
        assert_abs_diff_eq!(v[grid.nd_to_flat([3, 3, 5])], 2.0 * 1.0, epsilon = 1e-12);
        // diagonal (2, 2, 0) offset: distance 2.83h, outside
        assert_eq!(v[grid.nd_to_flat([5, 5, 3])], FAR_FIELD);
    }

    #[test]
    fn point_source_off_node() {
        let grid = CartesianGrid::new([4, 4, 4], 1.0).unwrap();
        let f = vec![1.0; grid.num_nodes()];
        let mut field = InitialField::new(grid);
        field.add_point_source([0.5, 0.0, 0.0], &f).unwrap();
        assert_abs_diff_eq!(field.values()[grid.nd_to_flat([0, 0, 0])], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(field.values()[grid.nd_to_flat([1, 0, 0])], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn point_source_outside_domain_rejected() {
        let grid = CartesianGrid::new([4, 4, 4], 1.0).unwrap();
        let f = vec![1.0; grid.num_nodes()];
        let mut field = InitialField::new(grid);
        assert!(matches!(
            field.add_point_source([0.0, 3.5, 0.0], &f),
            Err(EikonalError::InvalidSource { .. })
        ));
    }

    #[test]
    fn into_array_shape() {
        let grid = CartesianGrid::new([2, 3, 4], 1.0).unwrap();
        let mut field = InitialField::new(grid);
        field.seed_node([1, 2, 3], 0.0).unwrap();
        let arr = field.into_array();
        assert_eq!(arr.dim(), (2, 3, 4));
        assert_eq!(arr[[1, 2, 3]], 0.0);
    }
}
