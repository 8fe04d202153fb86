// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::{CartesianGrid, NDIM};

/// Solve the Godunov upwind update for a single node.
///
/// Given the one-sided neighbor minima `a1, a2, a3` along the three axes,
/// the node slowness `f` and spacing `h`, returns the value `x` satisfying
/// the discrete stencil
///
/// ```text
/// sum over active axes of (x - a)^2 = (f h)^2
/// ```
///
/// where an axis is active when its neighbor minimum lies below `x`. The
/// 1D candidate is tried first, then the two-neighbor quadratic, then the
/// three-neighbor quadratic.
///
/// Infinite neighbors are allowed and simply never become active. NaN
/// inputs, `f < 0` or `h <= 0` are outside the contract.
pub fn solve_local(a1: f64, a2: f64, a3: f64, f: f64, h: f64) -> f64 {
    let mut a = [a1, a2, a3];
    if a[0] > a[1] {
        a.swap(0, 1);
    }
    if a[0] > a[2] {
        a.swap(0, 2);
    }
    if a[1] > a[2] {
        a.swap(1, 2);
    }
    let [a1, a2, a3] = a;
    let fh_sq = f * f * h * h;

    let x = a1 + f * h;
    if x <= a2 {
        return x;
    }

    // x^2 - (a1 + a2) x + (a1^2 + a2^2 - (fh)^2) / 2 = 0
    let b = -(a1 + a2);
    let c = (a1 * a1 + a2 * a2 - fh_sq) / 2.0;
    let x = (-b + (b * b - 4.0 * c).sqrt()) / 2.0;
    if x <= a3 {
        return x;
    }

    // x^2 - 2/3 (a1 + a2 + a3) x + (a1^2 + a2^2 + a3^2 - (fh)^2) / 3 = 0
    let b = -2.0 * (a1 + a2 + a3) / 3.0;
    let c = (a1 * a1 + a2 * a2 + a3 * a3 - fh_sq) / 3.0;
    (-b + (b * b - 4.0 * c).sqrt()) / 2.0
}

/// The neighbor a node is upwinded from along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpwindNeighbor {
    /// Flat index of the selected neighbor.
    pub index: usize,
    /// Travel time at the selected neighbor (the one-sided minimum).
    pub value: f64,
}

/// Select the upwind neighbor of `idx` along `axis`.
///
/// With both neighbors available the lower one is taken only when the upper
/// one is strictly larger, so ties resolve to the upper neighbor. At a
/// domain boundary the single neighbor is taken. Returns `None` on an axis
/// of size 1.
#[inline]
pub fn upwind_neighbor(
    grid: &CartesianGrid,
    u: &[f64],
    idx: [usize; NDIM],
    axis: usize,
) -> Option<UpwindNeighbor> {
    let index = match grid.axis_neighbors(idx, axis) {
        (Some(lo), Some(hi)) => {
            if u[hi] > u[lo] {
                lo
            } else {
                hi
            }
        }
        (Some(lo), None) => lo,
        (None, Some(hi)) => hi,
        (None, None) => return None,
    };
    Some(UpwindNeighbor {
        index,
        value: u[index],
    })
}

/// One-sided neighbor minima along each axis, `+inf` where an axis has no
/// neighbor.
#[inline]
pub fn upwind_minima(grid: &CartesianGrid, u: &[f64], idx: [usize; NDIM]) -> [f64; NDIM] {
    let mut minima = [f64::INFINITY; NDIM];
    for (axis, min) in minima.iter_mut().enumerate() {
        if let Some(nb) = upwind_neighbor(grid, u, idx, axis) {
            *min = nb.value;
        }
    }
    minima
}

/// Candidate travel time for a node given the current field.
///
/// The caller decides whether to accept it; the sweep keeps the smaller of
/// this and the current value.
#[inline]
pub fn update_node(grid: &CartesianGrid, u: &[f64], f: &[f64], idx: [usize; NDIM]) -> f64 {
    let [a, b, c] = upwind_minima(grid, u, idx);
    solve_local(a, b, c, f[grid.nd_to_flat(idx)], grid.spacing())
}
