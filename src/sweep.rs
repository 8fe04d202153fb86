// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::core::{CartesianGrid, NDIM};
use crate::error::{EikonalError, Result};
use crate::update_kernels::update_node;

/// Default early-exit tolerance on the max-abs change over one cycle.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Default cap on the number of full eight-sweep cycles.
pub const DEFAULT_MAX_CYCLES: usize = 20;

/// Traversal direction of one Gauss-Seidel sweep: ascending (`+1`) or
/// descending (`-1`) along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SweepDirection(pub [i8; NDIM]);

/// The eight octant sweeps of one cycle, in the order they are applied.
///
/// The order is fixed so that the forward solution is reproducible bit for
/// bit.
pub const SWEEP_ORDER: [SweepDirection; 8] = [
    SweepDirection([1, 1, 1]),
    SweepDirection([-1, 1, 1]),
    SweepDirection([-1, -1, 1]),
    SweepDirection([1, -1, 1]),
    SweepDirection([1, -1, -1]),
    SweepDirection([1, 1, -1]),
    SweepDirection([-1, 1, -1]),
    SweepDirection([-1, -1, -1]),
];

impl SweepDirection {
    /// The `step`-th coordinate visited along `axis` for an axis of `len`
    /// nodes.
    #[inline]
    fn coord(self, axis: usize, step: usize, len: usize) -> usize {
        if self.0[axis] > 0 {
            step
        } else {
            len - 1 - step
        }
    }
}

/// Apply one directional sweep in place.
///
/// Every node is visited once in the order given by `dir` (axis 0
/// outermost) and lowered to the local update if that is smaller. Values
/// never increase.
pub fn sweep(grid: &CartesianGrid, u: &mut [f64], f: &[f64], dir: SweepDirection) {
    let [m, n, l] = grid.shape();
    for si in 0..m {
        let i = dir.coord(0, si, m);
        for sj in 0..n {
            let j = dir.coord(1, sj, n);
            for sk in 0..l {
                let k = dir.coord(2, sk, l);
                let idx = [i, j, k];
                let candidate = update_node(grid, u, f, idx);
                let flat = grid.nd_to_flat(idx);
                u[flat] = candidate.min(u[flat]);
            }
        }
    }
}

/// Progress information passed to the optional callback after each cycle.
#[derive(Debug, Clone, Copy)]
pub struct ProgressInfo {
    /// One-based index of the cycle just completed.
    pub cycle: usize,
    /// Max-abs change produced by that cycle.
    pub residual: f64,
    /// Elapsed time since the solve started.
    pub elapsed: Duration,
}

/// Outcome of a forward solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// Number of cycles executed.
    pub cycles: usize,
    /// Max-abs change of the last executed cycle.
    pub residual: f64,
    /// Whether the residual dropped below the tolerance before the cap.
    pub converged: bool,
}

/// Travel-time field together with its [`SweepReport`].
#[derive(Debug, Clone)]
pub struct Solution {
    /// Travel time per node, row-major.
    pub travel_time: Vec<f64>,
    /// Convergence summary.
    pub report: SweepReport,
}

/// Fast-sweeping solver for |∇u| = f on a [`CartesianGrid`].
///
/// Each cycle applies the eight sweeps of [`SWEEP_ORDER`]. The solve stops
/// once a cycle changes no node by more than the tolerance, or after the
/// cycle cap; hitting the cap is not an error.
pub struct FastSweepSolver {
    tolerance: f64,
    max_cycles: usize,
    progress_callback: Option<Box<dyn Fn(ProgressInfo) + Send + Sync>>,
}

impl Default for FastSweepSolver {
    fn default() -> Self {
        FastSweepSolver {
            tolerance: DEFAULT_TOLERANCE,
            max_cycles: DEFAULT_MAX_CYCLES,
            progress_callback: None,
        }
    }
}

impl std::fmt::Debug for FastSweepSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastSweepSolver")
            .field("tolerance", &self.tolerance)
            .field("max_cycles", &self.max_cycles)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl FastSweepSolver {
    /// Create a solver with the default tolerance (`1e-8`) and cycle cap (20).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the early-exit tolerance (builder method).
    ///
    /// # Errors
    /// Returns an error if the tolerance is not positive and finite.
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(EikonalError::InvalidTolerance(tolerance));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    /// Set the maximum number of cycles (builder method). Default is 20.
    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Set a callback invoked after every cycle (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(ProgressInfo) + Send + Sync>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The early-exit tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The cycle cap.
    pub fn max_cycles(&self) -> usize {
        self.max_cycles
    }

    /// Solve for the travel-time field starting from `u0`.
    ///
    /// # Parameters
    /// - `grid`: Grid geometry
    /// - `u0`: Initial field (seed values, far-field sentinel elsewhere)
    /// - `f`: Slowness per node
    ///
    /// # Errors
    /// Returns an error if either field does not match the grid.
    pub fn solve(&self, grid: &CartesianGrid, u0: &[f64], f: &[f64]) -> Result<Solution> {
        grid.check_field("u0", u0)?;
        grid.check_field("f", f)?;

        let start_time = Instant::now();
        let mut u = u0.to_vec();
        let mut u_old = vec![0.0; u.len()];
        let mut report = SweepReport {
            cycles: 0,
            residual: 0.0,
            converged: false,
        };

        for cycle in 1..=self.max_cycles {
            u_old.copy_from_slice(&u);
            for dir in SWEEP_ORDER {
                sweep(grid, &mut u, f, dir);
            }

            let residual = max_abs_diff(&u, &u_old);
            report.cycles = cycle;
            report.residual = residual;
            debug!("fast sweeping cycle {}: residual {:e}", cycle, residual);

            if let Some(cb) = &self.progress_callback {
                cb(ProgressInfo {
                    cycle,
                    residual,
                    elapsed: start_time.elapsed(),
                });
            }

            if residual < self.tolerance {
                report.converged = true;
                break;
            }
        }

        if !report.converged {
            warn!(
                "fast sweeping stopped after {} cycles without converging \
                 (residual {:e}, tolerance {:e})",
                report.cycles,
                report.residual,
                self.tolerance
            );
        }

        Ok(Solution {
            travel_time: u,
            report,
        })
    }
}

/// Max-abs elementwise difference. Pairs that are both infinite compare as
/// unchanged.
fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
