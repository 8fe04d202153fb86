// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use log::trace;
use ndarray::Array3;
use rayon::prelude::*;

use crate::adjoint;
use crate::error::{EikonalError, Result};
use crate::ops::{contiguous, grid_for};
use crate::sweep::FastSweepSolver;

/// Runs independent shots that share one slowness model.
///
/// Every shot is an ordinary single-threaded forward or backward call with
/// its own scratch buffers, so shots run in parallel on a rayon pool and
/// produce exactly what sequential calls would.
#[derive(Debug, Default)]
pub struct ShotBatch {
    solver: FastSweepSolver,
    num_threads: Option<usize>,
}

impl ShotBatch {
    /// Create a batch runner around a configured solver.
    pub fn new(solver: FastSweepSolver) -> Self {
        ShotBatch {
            solver,
            num_threads: None,
        }
    }

    /// Set the number of worker threads (builder method).
    /// If not specified, defaults to the number of available CPU cores.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    fn get_num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.get_num_threads())
            .build()
            .map_err(|e| EikonalError::Other(e.to_string()))
    }

    /// Solve every shot, returning travel-time fields in input order.
    ///
    /// # Errors
    /// Returns the first error of any shot (invalid inputs or thread pool
    /// creation failure).
    pub fn forward(
        &self,
        u0s: &[Array3<f64>],
        f: &Array3<f64>,
        h: f64,
    ) -> Result<Vec<Array3<f64>>> {
        let pool = self.pool()?;
        pool.install(|| {
            u0s.par_iter()
                .enumerate()
                .map(|(shot, u0)| {
                    trace!("forward shot {}", shot);
                    let grid = grid_for(&[("u0", u0), ("f", f)], h)?;
                    let solution =
                        self.solver
                            .solve(&grid, contiguous("u0", u0)?, contiguous("f", f)?)?;
                    Array3::from_shape_vec(u0.raw_dim(), solution.travel_time)
                        .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))
                })
                .collect()
        })
    }

    /// Back-propagate every shot.
    ///
    /// Returns the per-shot `grad_u0` in input order and the slowness
    /// gradient summed over shots.
    ///
    /// # Errors
    /// Returns an error if the slices differ in length, on invalid inputs,
    /// or if any adjoint solve fails.
    pub fn backward(
        &self,
        grad_us: &[Array3<f64>],
        us: &[Array3<f64>],
        u0s: &[Array3<f64>],
        f: &Array3<f64>,
        h: f64,
    ) -> Result<(Vec<Array3<f64>>, Array3<f64>)> {
        if grad_us.len() != u0s.len() || us.len() != u0s.len() {
            return Err(EikonalError::Other(format!(
                "shot count mismatch: {} initial fields, {} travel-time fields, {} gradients",
                u0s.len(),
                us.len(),
                grad_us.len()
            )));
        }

        let pool = self.pool()?;
        let per_shot: Vec<(Array3<f64>, Vec<f64>)> = pool.install(|| {
            (0..u0s.len())
                .into_par_iter()
                .map(|shot| {
                    trace!("backward shot {}", shot);
                    let (grad_u, u, u0) = (&grad_us[shot], &us[shot], &u0s[shot]);
                    let grid =
                        grid_for(&[("grad_u", grad_u), ("u", u), ("u0", u0), ("f", f)], h)?;
                    let grads = adjoint::backward(
                        &grid,
                        contiguous("grad_u", grad_u)?,
                        contiguous("u", u)?,
                        contiguous("u0", u0)?,
                        contiguous("f", f)?,
                    )?;
                    let grad_u0 = Array3::from_shape_vec(u0.raw_dim(), grads.grad_u0)
                        .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))?;
                    Ok((grad_u0, grads.grad_f))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        // Sum in shot order so the total does not depend on scheduling
        let mut grad_f = Array3::zeros(f.raw_dim());
        let mut grad_u0s = Vec::with_capacity(per_shot.len());
        for (grad_u0, shot_grad_f) in per_shot {
            for (total, g) in grad_f.iter_mut().zip(shot_grad_f) {
                *total += g;
            }
            grad_u0s.push(grad_u0);
        }
        Ok((grad_u0s, grad_f))
    }
}
