// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! A differentiable eikonal solver using the Fast Sweeping Method.
//!
//! The forward pass computes first-arrival travel times on a 3D Cartesian
//! grid by solving |∇u| = f with Godunov upwind updates over eight
//! alternating sweep orderings. The backward pass linearizes the converged
//! discrete system and solves the adjoint equations with a sparse LU
//! factorization, giving gradients with respect to the slowness field and
//! the initial field.

#![warn(missing_docs)]

pub mod adjoint;
/// Parallel execution of independent shots.
pub mod batch;
/// Core grid geometry.
pub mod core;
/// Error types for the library.
pub mod error;
/// File I/O for loading slowness fields and saving travel times.
pub mod io;
pub mod ops;
/// Initial travel-time fields.
pub mod source;
/// Sparse system assembly and LU solves.
pub mod sparse;
/// Fast sweeping forward solver.
pub mod sweep;
/// Local Godunov update kernels.
pub mod update_kernels;

pub use crate::adjoint::Gradients;
pub use crate::batch::ShotBatch;
pub use crate::core::CartesianGrid;
pub use crate::error::{EikonalError, Result};
pub use crate::ops::{backward, forward, EikonalOp, EikonalTape};
pub use crate::source::{InitialField, FAR_FIELD};
pub use crate::sweep::{FastSweepSolver, ProgressInfo, SweepReport};
