// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

/// Errors that can occur while building a marcher, loading volumes, or mapping connectivity.
#[derive(Debug)]
pub enum MarchError {
    /// Grid shape is invalid (dimension too small).
    InvalidGridShape {
        /// The axis index.
        axis: usize,
        /// The size provided.
        size: usize,
    },
    /// Voxel spacing is not positive and finite.
    InvalidGridSpacing {
        /// The axis index.
        axis: usize,
        /// The spacing provided.
        spacing: f64,
    },
    /// Buffer length or array shape does not match the grid.
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Seed voxel cannot start a front.
    InvalidSeed {
        /// The seed coordinates.
        coord: [usize; 3],
        /// Explanation of why it's invalid.
        reason: String,
    },
    /// Confidence exponent has no defined weighting.
    UnsupportedConfidenceExponent(f64),
    /// A tensor-weighted confidence norm was requested without a tensor-power field.
    MissingTensorPower(f64),
    /// Unsupported data type in file.
    UnsupportedDtype(String),
    /// Unsupported file format (unrecognized extension).
    UnsupportedFileFormat(String),
    /// Expected MAT variable not found in file.
    MatVariableNotFound {
        /// The variable name that was requested.
        expected: String,
        /// The variable names that are available.
        available: Vec<String>,
    },
    /// I/O error occurred.
    IoError(std::io::Error),
    /// Other error with a descriptive message.
    Other(String),
}

impl fmt::Display for MarchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarchError::InvalidGridShape { axis, size } => {
                write!(
                    f,
                    "invalid grid shape: axis {} has size {} (must be >= 3)",
                    axis, size
                )
            }
            MarchError::InvalidGridSpacing { axis, spacing } => {
                write!(
                    f,
                    "invalid voxel spacing on axis {}: {} (must be positive and finite)",
                    axis, spacing
                )
            }
            MarchError::ShapeMismatch { expected, got } => {
                write!(f, "shape mismatch: expected {:?}, got {:?}", expected, got)
            }
            MarchError::InvalidSeed { coord, reason } => {
                write!(f, "invalid seed at {:?}: {}", coord, reason)
            }
            MarchError::UnsupportedConfidenceExponent(alpha) => {
                write!(
                    f,
                    "unsupported confidence exponent {} (must be 0, -1 or positive)",
                    alpha
                )
            }
            MarchError::MissingTensorPower(alpha) => {
                write!(
                    f,
                    "confidence exponent {} needs a tensor-power field",
                    alpha
                )
            }
            MarchError::UnsupportedDtype(dtype) => {
                write!(f, "unsupported dtype: {}", dtype)
            }
            MarchError::UnsupportedFileFormat(ext) => {
                write!(f, "unsupported file format: {}", ext)
            }
            MarchError::MatVariableNotFound {
                expected,
                available,
            } => {
                write!(
                    f,
                    "MAT variable '{}' not found; available variables: {:?}",
                    expected, available
                )
            }
            MarchError::IoError(e) => write!(f, "I/O error: {}", e),
            MarchError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MarchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarchError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MarchError {
    fn from(e: std::io::Error) -> Self {
        MarchError::IoError(e)
    }
}

/// Convenience type alias for Results with MarchError.
pub type Result<T> = std::result::Result<T, MarchError>;
