// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Adjoint-state gradients of the fast-sweeping fixed point.
//!
//! At convergence every relaxed node satisfies the local residual
//!
//! ```text
//! r_c(u, f) = sum over active axes of (u_c - u_nb)^2 - f_c^2 h^2 = 0
//! ```
//!
//! where `u_nb` is the upwind neighbor along the axis and an axis is active
//! when `u_c > u_nb`. With `A = dr/du` the slowness gradient of a loss `L`
//! is `dL/df = -lambda * dr/df`, where `A^T lambda = dL/du` restricted to
//! relaxed nodes. Frozen nodes take an identity row and column and only
//! pass their incoming gradient through to `u0`.

use fixedbitset::FixedBitSet;
use log::debug;

use crate::core::{CartesianGrid, NDIM};
use crate::error::Result;
use crate::sparse::TripletBuilder;
use crate::update_kernels::upwind_neighbor;

/// Nodes excluded from the adjoint system.
///
/// A node is frozen when its travel time equals the initial value exactly
/// (a seed or a node the sweeps never reached), or when it does not exceed
/// any of its upwind neighbors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenSet {
    bits: FixedBitSet,
}

impl FrozenSet {
    /// Empty set over `num_nodes` nodes.
    pub fn new(num_nodes: usize) -> Self {
        FrozenSet {
            bits: FixedBitSet::with_capacity(num_nodes),
        }
    }

    /// Mark a node as frozen.
    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.bits.insert(index);
    }

    /// Whether a node is frozen.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    /// Number of frozen nodes.
    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    /// Whether no node is frozen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frozen node indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }
}

/// Linearized fixed-point system, before frozen-node elimination.
#[derive(Debug, Clone)]
pub struct Linearization {
    /// Contributions to `dr/du`, one diagonal and one off-diagonal triplet
    /// per active axis of each relaxed node.
    pub system: TripletBuilder,
    /// Frozen nodes.
    pub frozen: FrozenSet,
}

impl Linearization {
    /// Decouple frozen nodes: drop every contribution in a frozen row or
    /// column and give each frozen node a unit diagonal.
    pub fn eliminate_frozen(mut self) -> TripletBuilder {
        let frozen = &self.frozen;
        self.system
            .zero_where(|row, col| frozen.contains(row) || frozen.contains(col));
        for index in frozen.iter() {
            self.system.push(index, index, 1.0);
        }
        self.system
    }
}

/// Build the linearization of the converged travel-time field `u`.
pub fn linearize(grid: &CartesianGrid, u: &[f64], u0: &[f64]) -> Linearization {
    let num_nodes = grid.num_nodes();
    let mut system = TripletBuilder::with_capacity(num_nodes, 2 * NDIM * num_nodes);
    let mut frozen = FrozenSet::new(num_nodes);

    for this in 0..num_nodes {
        if u[this] == u0[this] {
            frozen.insert(this);
            continue;
        }

        let idx = grid.flat_to_nd(this);
        let mut relaxed = false;
        for axis in 0..NDIM {
            let Some(nb) = upwind_neighbor(grid, u, idx, axis) else {
                continue;
            };
            if u[this] > nb.value {
                let d = 2.0 * (u[this] - nb.value);
                system.push(this, this, d);
                system.push(this, nb.index, -d);
                relaxed = true;
            }
        }
        if !relaxed {
            frozen.insert(this);
        }
    }

    Linearization { system, frozen }
}

/// Gradients of a loss with respect to the forward inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    /// Gradient with respect to the initial field.
    pub grad_u0: Vec<f64>,
    /// Gradient with respect to the slowness field.
    pub grad_f: Vec<f64>,
}

/// Back-propagate `grad_u` through the forward solve.
///
/// # Parameters
/// - `grid`: Grid geometry
/// - `grad_u`: Gradient of the loss with respect to the travel-time field
/// - `u`: Converged travel-time field
/// - `u0`: Initial field passed to the forward solve
/// - `f`: Slowness field passed to the forward solve
///
/// # Errors
/// Returns an error if a field does not match the grid, if the sparse LU
/// factorization fails, or if the adjoint solution is not finite.
pub fn backward(
    grid: &CartesianGrid,
    grad_u: &[f64],
    u: &[f64],
    u0: &[f64],
    f: &[f64],
) -> Result<Gradients> {
    grid.check_field("grad_u", grad_u)?;
    grid.check_field("u", u)?;
    grid.check_field("u0", u0)?;
    grid.check_field("f", f)?;

    let grad_u0: Vec<f64> = grad_u
        .iter()
        .zip(u.iter().zip(u0))
        .map(|(&g, (&ui, &u0i))| if ui == u0i { g } else { 0.0 })
        .collect();

    let linearization = linearize(grid, u, u0);
    let mut rhs = grad_u.to_vec();
    for index in linearization.frozen.iter() {
        rhs[index] = 0.0;
    }
    debug!(
        "adjoint system: {} nodes, {} frozen, {} triplets",
        grid.num_nodes(),
        linearization.frozen.len(),
        linearization.system.len()
    );

    let matrix = linearization.eliminate_frozen().transpose().assemble()?;
    let lambda = matrix.lu_solve(&rhs)?;
    debug!("adjoint solve done: nnz {}", matrix.nnz());

    // dr/df = -2 f h^2
    let h = grid.spacing();
    let grad_f = lambda
        .iter()
        .zip(f)
        .map(|(&l, &fi)| -l * (-2.0 * fi * h * h))
        .collect();

    Ok(Gradients { grad_u0, grad_f })
}
