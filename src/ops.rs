// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Differentiable eikonal operator over dense 3D arrays.
//!
//! These are the entry points a host (an autodiff framework, a tomography
//! loop) calls. They check the array preconditions and hand contiguous
//! row-major buffers to the solver and the adjoint.

use ndarray::Array3;

use crate::adjoint::{self, Gradients};
use crate::core::CartesianGrid;
use crate::error::{EikonalError, Result};
use crate::sweep::{FastSweepSolver, SweepReport};

/// Solve for the travel-time field with the default solver settings.
///
/// # Errors
/// Returns an error if the inputs differ in shape, are not contiguous in
/// row-major order, have an empty axis, or `h` is not positive and finite.
pub fn forward(u0: &Array3<f64>, f: &Array3<f64>, h: f64) -> Result<Array3<f64>> {
    EikonalOp::default().forward(u0, f, h)
}

/// Back-propagate `grad_u` through [`forward`], returning
/// `(grad_u0, grad_f)`.
///
/// # Errors
/// Returns an error on invalid inputs (as for [`forward`]) or if the adjoint
/// system cannot be solved.
pub fn backward(
    grad_u: &Array3<f64>,
    u: &Array3<f64>,
    u0: &Array3<f64>,
    f: &Array3<f64>,
    h: f64,
) -> Result<(Array3<f64>, Array3<f64>)> {
    let grid = grid_for(&[("grad_u", grad_u), ("u", u), ("u0", u0), ("f", f)], h)?;
    let grads = adjoint::backward(
        &grid,
        contiguous("grad_u", grad_u)?,
        contiguous("u", u)?,
        contiguous("u0", u0)?,
        contiguous("f", f)?,
    )?;
    into_arrays(&grid, grads)
}

/// Eikonal operator with a configured [`FastSweepSolver`].
#[derive(Debug, Default)]
pub struct EikonalOp {
    solver: FastSweepSolver,
}

impl EikonalOp {
    /// Wrap a configured solver.
    pub fn new(solver: FastSweepSolver) -> Self {
        EikonalOp { solver }
    }

    /// The wrapped solver.
    pub fn solver(&self) -> &FastSweepSolver {
        &self.solver
    }

    /// Solve for the travel-time field.
    ///
    /// # Errors
    /// See [`forward`].
    pub fn forward(&self, u0: &Array3<f64>, f: &Array3<f64>, h: f64) -> Result<Array3<f64>> {
        let (u, _) = self.solve(u0, f, h)?;
        Ok(u)
    }

    /// Solve for the travel-time field and return the convergence report.
    ///
    /// # Errors
    /// See [`forward`].
    pub fn solve(
        &self,
        u0: &Array3<f64>,
        f: &Array3<f64>,
        h: f64,
    ) -> Result<(Array3<f64>, SweepReport)> {
        let grid = grid_for(&[("u0", u0), ("f", f)], h)?;
        let solution = self
            .solver
            .solve(&grid, contiguous("u0", u0)?, contiguous("f", f)?)?;
        let u = Array3::from_shape_vec(u0.raw_dim(), solution.travel_time)
            .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))?;
        Ok((u, solution.report))
    }

    /// Run the forward pass and keep everything the backward pass needs.
    ///
    /// # Errors
    /// See [`forward`].
    pub fn record(&self, u0: Array3<f64>, f: Array3<f64>, h: f64) -> Result<EikonalTape> {
        let (u, report) = self.solve(&u0, &f, h)?;
        Ok(EikonalTape {
            u0,
            f,
            u,
            h,
            report,
        })
    }
}

/// A recorded forward pass.
#[derive(Debug, Clone)]
pub struct EikonalTape {
    u0: Array3<f64>,
    f: Array3<f64>,
    u: Array3<f64>,
    h: f64,
    report: SweepReport,
}

impl EikonalTape {
    /// The travel-time field produced by the forward pass.
    pub fn travel_time(&self) -> &Array3<f64> {
        &self.u
    }

    /// Convergence report of the forward pass.
    pub fn report(&self) -> &SweepReport {
        &self.report
    }

    /// Grid spacing used by the forward pass.
    pub fn spacing(&self) -> f64 {
        self.h
    }

    /// Back-propagate `grad_u`, returning `(grad_u0, grad_f)`.
    ///
    /// # Errors
    /// See [`backward`].
    pub fn backward(&self, grad_u: &Array3<f64>) -> Result<(Array3<f64>, Array3<f64>)> {
        backward(grad_u, &self.u, &self.u0, &self.f, self.h)
    }

    /// Release the recorded tensors as `(u0, f, u)`.
    pub fn into_parts(self) -> (Array3<f64>, Array3<f64>, Array3<f64>) {
        (self.u0, self.f, self.u)
    }
}

/// Build the grid shared by all `arrays`, checking that their shapes agree.
pub(crate) fn grid_for(arrays: &[(&'static str, &Array3<f64>)], h: f64) -> Result<CartesianGrid> {
    let (_, first) = arrays[0];
    let shape = first.dim();
    for &(name, array) in &arrays[1..] {
        if array.dim() != shape {
            return Err(EikonalError::ShapeMismatch {
                name,
                expected: first.shape().to_vec(),
                got: array.shape().to_vec(),
            });
        }
    }
    CartesianGrid::new([shape.0, shape.1, shape.2], h)
}

/// Borrow the row-major buffer of an array.
pub(crate) fn contiguous<'a>(name: &'static str, array: &'a Array3<f64>) -> Result<&'a [f64]> {
    array.as_slice().ok_or(EikonalError::NotContiguous(name))
}

fn into_arrays(grid: &CartesianGrid, grads: Gradients) -> Result<(Array3<f64>, Array3<f64>)> {
    let [m, n, l] = grid.shape();
    let to_array = |data: Vec<f64>| {
        Array3::from_shape_vec((m, n, l), data)
            .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))
    };
    Ok((to_array(grads.grad_u0)?, to_array(grads.grad_f)?))
}
