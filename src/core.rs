// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{MarchError, Result};

/// Lifecycle state of a grid point during a march.
///
/// Far points have not been reached, Trial points sit in the queue with a
/// tentative value, Alive points are final. Forbidden points are excluded for
/// the whole lifetime of the marcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointState {
    /// Finalized.
    Alive,
    /// Queued with a tentative value.
    Trial,
    /// Not reached yet.
    Far,
    /// Permanently excluded.
    Forbidden,
}

impl PointState {
    /// True when the stored value may be read by neighbors.
    pub fn is_readable(self) -> bool {
        matches!(self, PointState::Alive | PointState::Trial)
    }
}

/// Regular 3D grid with per-axis voxel spacing.
///
/// Points are linearized in row-major order: the last axis is contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid3 {
    shape: [usize; 3],
    strides: [usize; 3],
    spacing: [f64; 3],
}

impl Grid3 {
    /// Create a grid with the given shape and voxel spacing.
    ///
    /// # Parameters
    /// - `shape`: Number of nodes along each axis (each must be >= 3 so the grid has an interior)
    /// - `spacing`: Voxel size along each axis (must be positive and finite)
    ///
    /// # Errors
    /// Returns an error if any axis is too short or any spacing is invalid.
    pub fn new(shape: [usize; 3], spacing: [f64; 3]) -> Result<Self> {
        for (axis, &size) in shape.iter().enumerate() {
            if size < 3 {
                return Err(MarchError::InvalidGridShape { axis, size });
            }
        }
        for (axis, &h) in spacing.iter().enumerate() {
            if !h.is_finite() || h <= 0.0 {
                return Err(MarchError::InvalidGridSpacing { axis, spacing: h });
            }
        }

        let strides = [shape[1] * shape[2], shape[2], 1];
        Ok(Grid3 {
            shape,
            strides,
            spacing,
        })
    }

    /// Grid with unit spacing on every axis.
    pub fn with_unit_spacing(shape: [usize; 3]) -> Result<Self> {
        Self::new(shape, [1.0; 3])
    }

    /// Number of nodes along each axis.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Row-major strides.
    pub fn strides(&self) -> [usize; 3] {
        self.strides
    }

    /// Voxel spacing along each axis.
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// Total number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.shape.iter().product()
    }

    /// Linear index of a coordinate.
    #[inline]
    pub fn offset(&self, coord: [usize; 3]) -> usize {
        coord[0] * self.strides[0] + coord[1] * self.strides[1] + coord[2]
    }

    /// Coordinate of a linear index.
    #[inline]
    pub fn coord(&self, index: usize) -> [usize; 3] {
        let x = index / self.strides[0];
        let rem = index % self.strides[0];
        [x, rem / self.strides[1], rem % self.strides[1]]
    }

    /// True if the coordinate lies inside the grid.
    pub fn contains(&self, coord: [usize; 3]) -> bool {
        coord.iter().zip(self.shape.iter()).all(|(&c, &n)| c < n)
    }

    /// True if the coordinate touches any face of the grid.
    pub fn is_boundary(&self, coord: [usize; 3]) -> bool {
        coord
            .iter()
            .zip(self.shape.iter())
            .any(|(&c, &n)| c == 0 || c + 1 == n)
    }

    /// Linear index of the neighbor one step along `axis` in direction `dir` (-1 or +1),
    /// or `None` when that step leaves the grid.
    #[inline]
    pub fn neighbor(&self, index: usize, axis: usize, dir: i8) -> Option<usize> {
        let c = self.coord(index)[axis];
        match dir {
            -1 if c > 0 => Some(index - self.strides[axis]),
            1 if c + 1 < self.shape[axis] => Some(index + self.strides[axis]),
            _ => None,
        }
    }

    /// The in-grid 6-connected neighbors of a point, axis by axis, low side first.
    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        (0..3).flat_map(move |axis| {
            [-1i8, 1]
                .into_iter()
                .filter_map(move |dir| self.neighbor(index, axis, dir))
        })
    }
}
