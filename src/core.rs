// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{EikonalError, Result};

/// Number of spatial axes.
pub const NDIM: usize = 3;

/// A uniform 3D Cartesian grid.
///
/// Fields living on the grid (slowness, initial and travel-time fields,
/// gradients) are dense `f64` buffers in row-major order, so that node
/// `[i, j, k]` of an `(m, n, l)` grid lives at `i * n * l + j * l + k`.
/// The grid itself owns no field data; it only describes geometry and
/// indexing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianGrid {
    shape: [usize; NDIM],
    strides: [usize; NDIM],
    h: f64,
}

impl CartesianGrid {
    /// Create a new grid with the given shape and spacing.
    ///
    /// # Parameters
    /// - `shape`: Number of nodes along each axis (each must be >= 1)
    /// - `h`: Uniform grid spacing (must be positive and finite)
    ///
    /// # Errors
    /// Returns an error if an axis is empty or the spacing is invalid.
    pub fn new(shape: [usize; NDIM], h: f64) -> Result<Self> {
        if !h.is_finite() || h <= 0.0 {
            return Err(EikonalError::InvalidGridSpacing(h));
        }
        for (axis, &size) in shape.iter().enumerate() {
            if size == 0 {
                return Err(EikonalError::InvalidGridShape { axis, size });
            }
        }

        let mut strides = [0usize; NDIM];
        strides[NDIM - 1] = 1;
        for d in (0..NDIM - 1).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }

        Ok(CartesianGrid { shape, strides, h })
    }

    /// Number of nodes along each axis.
    pub fn shape(&self) -> [usize; NDIM] {
        self.shape
    }

    /// Row-major strides.
    pub fn strides(&self) -> [usize; NDIM] {
        self.strides
    }

    /// Uniform grid spacing.
    pub fn spacing(&self) -> f64 {
        self.h
    }

    /// Total number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.shape.iter().product()
    }

    /// Convert a 3D index to a flat row-major index.
    #[inline]
    pub fn nd_to_flat(&self, idx: [usize; NDIM]) -> usize {
        debug_assert!(
            idx.iter().zip(self.shape.iter()).all(|(&i, &s)| i < s),
            "index {:?} out of bounds for shape {:?}",
            idx,
            self.shape
        );
        idx[0] * self.strides[0] + idx[1] * self.strides[1] + idx[2]
    }

    /// Convert a flat row-major index to a 3D index.
    pub fn flat_to_nd(&self, flat: usize) -> [usize; NDIM] {
        debug_assert!(flat < self.num_nodes());
        let mut idx = [0usize; NDIM];
        let mut remainder = flat;
        for d in 0..NDIM {
            idx[d] = remainder / self.strides[d];
            remainder %= self.strides[d];
        }
        idx
    }

    /// Flat indices of the lower and upper neighbor of `idx` along `axis`.
    ///
    /// A side is `None` at the domain boundary; both are `None` on an axis
    /// of size 1.
    #[inline]
    pub fn axis_neighbors(
        &self,
        idx: [usize; NDIM],
        axis: usize,
    ) -> (Option<usize>, Option<usize>) {
        let flat = self.nd_to_flat(idx);
        let stride = self.strides[axis];
        let lo = (idx[axis] > 0).then(|| flat - stride);
        let hi = (idx[axis] + 1 < self.shape[axis]).then(|| flat + stride);
        (lo, hi)
    }

    /// Physical coordinates of a node.
    pub fn node_coord(&self, idx: [usize; NDIM]) -> [f64; NDIM] {
        idx.map(|i| i as f64 * self.h)
    }

    /// Check that a physical coordinate lies inside `[0, (size - 1) * h]`
    /// on every axis.
    pub fn check_coord(&self, coord: [f64; NDIM]) -> Result<()> {
        for (d, &c) in coord.iter().enumerate() {
            let max_coord = (self.shape[d] - 1) as f64 * self.h;
            if !c.is_finite() || c < 0.0 || c > max_coord {
                return Err(EikonalError::InvalidSource {
                    coord: coord.to_vec(),
                    reason: format!(
                        "coordinate {} on axis {} is outside domain [0, {}]",
                        c, d, max_coord
                    ),
                });
            }
        }
        Ok(())
    }

    /// The node nearest to a physical coordinate inside the domain.
    ///
    /// # Errors
    /// Returns an error if the coordinate lies outside the domain.
    pub fn nearest_node(&self, coord: [f64; NDIM]) -> Result<[usize; NDIM]> {
        self.check_coord(coord)?;
        let mut nearest = [0usize; NDIM];
        for d in 0..NDIM {
            nearest[d] = ((coord[d] / self.h).round() as usize).min(self.shape[d] - 1);
        }
        Ok(nearest)
    }

    /// Check that a field buffer has one value per node.
    pub fn check_field(&self, name: &'static str, field: &[f64]) -> Result<()> {
        if field.len() != self.num_nodes() {
            return Err(EikonalError::ShapeMismatch {
                name,
                expected: self.shape.to_vec(),
                got: vec![field.len()],
            });
        }
        Ok(())
    }
}
