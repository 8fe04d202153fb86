// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Errors that can occur during grid setup, I/O, forward sweeping, or the
/// adjoint solve.
#[derive(Debug, Error)]
pub enum EikonalError {
    /// Grid shape is invalid (an axis has no nodes).
    #[error("invalid grid shape: axis {axis} has size {size} (must be >= 1)")]
    InvalidGridShape {
        /// The axis index.
        axis: usize,
        /// The size provided.
        size: usize,
    },
    /// Grid spacing is not positive and finite.
    #[error("invalid grid spacing: {0} (must be positive and finite)")]
    InvalidGridSpacing(f64),
    /// Sweep tolerance is not positive and finite.
    #[error("invalid tolerance: {0} (must be positive and finite)")]
    InvalidTolerance(f64),
    /// Array shape does not match the grid shape.
    #[error("shape mismatch for `{name}`: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Which input disagreed.
        name: &'static str,
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Array is not stored contiguously in row-major order.
    #[error("input `{0}` must be contiguous in row-major order")]
    NotContiguous(&'static str),
    /// Source location is invalid (outside the domain or off-grid).
    #[error("invalid source at {coord:?}: {reason}")]
    InvalidSource {
        /// The source coordinates.
        coord: Vec<f64>,
        /// Explanation of why it's invalid.
        reason: String,
    },
    /// Velocity value is not positive and finite.
    #[error("invalid velocity at index {index}: {value} (must be positive and finite)")]
    InvalidVelocity {
        /// The flat index of the invalid value.
        index: usize,
        /// The invalid value.
        value: f64,
    },
    /// Sparse assembly or LU factorization of the adjoint system failed.
    #[error("adjoint factorization failed: {0}")]
    Factorization(String),
    /// The adjoint solve produced a non-finite value (singular linearization).
    #[error("singular adjoint linearization: non-finite solution at cell {index}")]
    SingularLinearization {
        /// Flat index of the first non-finite entry.
        index: usize,
    },
    /// Unsupported data type in file.
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    #[error("unsupported file format: {0}")]
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    #[error("MAT variable '{expected}' not found; available variables: {available:?}")]
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Other error with a descriptive message.
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results with EikonalError.
pub type Result<T> = std::result::Result<T, EikonalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_grid_shape() {
        let e = EikonalError::InvalidGridShape { axis: 2, size: 0 };
        assert_eq!(
            e.to_string(),
            "invalid grid shape: axis 2 has size 0 (must be >= 1)"
        );
    }

    #[test]
    fn display_invalid_grid_spacing() {
        let e = EikonalError::InvalidGridSpacing(-1.0);
        assert_eq!(
            e.to_string(),
            "invalid grid spacing: -1 (must be positive and finite)"
        );
    }

    #[test]
    fn display_shape_mismatch_names_input() {
        let e = EikonalError::ShapeMismatch {
            name: "f",
            expected: vec![3, 3, 3],
            got: vec![3, 3, 2],
        };
        assert_eq!(
            e.to_string(),
            "shape mismatch for `f`: expected [3, 3, 3], got [3, 3, 2]"
        );
    }

    #[test]
    fn display_singular_linearization() {
        let e = EikonalError::SingularLinearization { index: 7 };
        assert!(e.to_string().contains("cell 7"));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e: EikonalError = io_err.into();
        assert!(matches!(e, EikonalError::Io(_)));
        assert!(e.to_string().contains("file not found"));
    }

    #[test]
    fn io_error_is_source() {
        use std::error::Error;
        let e = EikonalError::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert!(e.source().is_some());
        assert!(EikonalError::Other("y".into()).source().is_none());
    }

    #[test]
    fn display_mat_variable_not_found() {
        let e = EikonalError::MatVariableNotFound {
            expected: "slowness".to_string(),
            available: vec!["velocity".to_string(), "grid".to_string()],
        };
        assert!(e.to_string().contains("slowness"));
        assert!(e.to_string().contains("velocity"));
    }
}
