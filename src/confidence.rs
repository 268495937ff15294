// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Upwind confidence statistics of the optimal dynamics.
//!
//! Each accepted point blends the magnitude of its own dynamics with the
//! statistics of the neighbors the dynamics flow from, weighted by the
//! corresponding dynamics components. Seeds keep the initial accumulators
//! (zero mean and spread, infinite minimum).

use crate::core::Grid3;
use crate::error::{MarchError, Result};
use crate::marcher::{AcceptObserver, AcceptedPoint};
use crate::metric::{quadratic_form, tensor_matrix, TENSOR_COMPONENTS};

/// How the magnitude of a dynamics vector is measured.
#[derive(Debug, Clone, PartialEq)]
pub enum MagnitudeNorm {
    /// Plain Euclidean norm.
    Euclidean,
    /// `sqrt(v^T P v)` with `P` read from a component-major tensor field.
    Tensor(Vec<f64>),
}

impl MagnitudeNorm {
    /// Pick the norm for a confidence exponent.
    ///
    /// `alpha == 0` selects the Euclidean norm. `alpha == -1` or `alpha > 0`
    /// selects the tensor norm and needs the tensor field raised to `alpha`
    /// (see [`crate::power::tensor_power_field`]).
    ///
    /// # Errors
    /// `UnsupportedConfidenceExponent` for any other `alpha`, and
    /// `MissingTensorPower` when a tensor norm is selected without a field.
    pub fn from_exponent(alpha: f64, power: Option<Vec<f64>>) -> Result<Self> {
        if !Self::uses_tensor(alpha)? {
            return Ok(MagnitudeNorm::Euclidean);
        }
        power
            .map(MagnitudeNorm::Tensor)
            .ok_or(MarchError::MissingTensorPower(alpha))
    }

    /// True if `alpha` selects the tensor norm, so a power field is needed.
    ///
    /// # Errors
    /// `UnsupportedConfidenceExponent` unless `alpha` is 0, -1 or positive.
    pub fn uses_tensor(alpha: f64) -> Result<bool> {
        if alpha == 0.0 {
            Ok(false)
        } else if alpha == -1.0 || alpha > 0.0 {
            Ok(true)
        } else {
            Err(MarchError::UnsupportedConfidenceExponent(alpha))
        }
    }

    /// Squared magnitude of `v` at voxel `index`.
    pub fn magnitude_sq(&self, index: usize, num_nodes: usize, v: [f64; 3]) -> f64 {
        match self {
            MagnitudeNorm::Euclidean => v.iter().map(|c| c * c).sum(),
            MagnitudeNorm::Tensor(field) => {
                quadratic_form(&tensor_matrix(field, num_nodes, index), v)
            }
        }
    }
}

/// Post-processed confidence maps.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceMaps {
    /// Mean magnitude along the path.
    pub mean: Vec<f64>,
    /// Standard deviation of the magnitude along the path.
    pub std: Vec<f64>,
    /// Smallest magnitude along the path.
    pub min: Vec<f64>,
}

/// Accumulates confidence statistics as points are accepted.
#[derive(Debug, Clone)]
pub struct ConfidenceTracker<'a> {
    norm: &'a MagnitudeNorm,
    mean: Vec<f64>,
    std_accum: Vec<f64>,
    min: Vec<f64>,
}

impl<'a> ConfidenceTracker<'a> {
    /// Tracker for every point of `grid`.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if a tensor norm field does not have six
    /// components per voxel.
    pub fn new(grid: &Grid3, norm: &'a MagnitudeNorm) -> Result<Self> {
        let n = grid.num_nodes();
        if let MagnitudeNorm::Tensor(field) = norm {
            if field.len() != TENSOR_COMPONENTS * n {
                return Err(MarchError::ShapeMismatch {
                    expected: vec![TENSOR_COMPONENTS * n],
                    got: vec![field.len()],
                });
            }
        }
        Ok(ConfidenceTracker {
            norm,
            mean: vec![0.0; n],
            std_accum: vec![0.0; n],
            min: vec![f64::INFINITY; n],
        })
    }

    /// Raw path-weighted mean of the magnitude.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Raw path-weighted mean of the squared magnitude.
    pub fn std_accum(&self) -> &[f64] {
        &self.std_accum
    }

    /// Raw path minimum; `+inf` where nothing was accepted.
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    fn update(&mut self, grid: &Grid3, index: usize, dynamics: [f64; 3]) {
        let norm_sq = self.norm.magnitude_sq(index, grid.num_nodes(), dynamics);
        let norm = norm_sq.max(0.0).sqrt();

        let mut num_mean = norm;
        let mut num_std = norm_sq;
        let mut num_min = 0.0;
        let mut den = 0.0;
        for (axis, &d) in dynamics.iter().enumerate() {
            // Positive components flow from the lower neighbor.
            let (weight, dir) = if d > 0.0 {
                (d, -1)
            } else if d < 0.0 {
                (-d, 1)
            } else {
                continue;
            };
            let Some(nb) = grid.neighbor(index, axis, dir) else {
                continue;
            };
            den += weight;
            num_mean += weight * self.mean[nb];
            num_std += weight * self.std_accum[nb];
            num_min += weight * self.min[nb];
        }

        if den != 0.0 {
            self.mean[index] = num_mean / den;
            self.std_accum[index] = num_std / den;
            self.min[index] = norm.min(num_min / den);
        } else {
            self.mean[index] = 0.0;
            self.std_accum[index] = 0.0;
            self.min[index] = 0.0;
        }
    }

    /// Normalize the accumulators by the distance field.
    ///
    /// Seeds get zero everywhere. Elsewhere `mean = mean / distance` and
    /// `std = sqrt(max(std_accum / distance - mean^2, 0))`; untouched minima
    /// become zero.
    pub fn finalize(&self, distance: &[f64], seeds: &[usize]) -> ConfidenceMaps {
        let n = self.mean.len();
        let mut maps = ConfidenceMaps {
            mean: vec![0.0; n],
            std: vec![0.0; n],
            min: vec![0.0; n],
        };
        for i in 0..n {
            let d = distance[i];
            if d == 0.0 {
                continue;
            }
            let mean = self.mean[i] / d;
            maps.mean[i] = mean;
            maps.std[i] = (self.std_accum[i] / d - mean * mean).max(0.0).sqrt();
            maps.min[i] = if self.min[i].is_finite() {
                self.min[i]
            } else {
                0.0
            };
        }
        for &s in seeds {
            maps.mean[s] = 0.0;
            maps.std[s] = 0.0;
            maps.min[s] = 0.0;
        }
        maps
    }
}

impl AcceptObserver for ConfidenceTracker<'_> {
    fn on_accept(&mut self, point: &AcceptedPoint<'_>) {
        if !point.seeded {
            self.update(point.grid, point.index, point.dynamics);
        }
    }

    fn reset(&mut self) {
        self.mean.fill(0.0);
        self.std_accum.fill(0.0);
        self.min.fill(f64::INFINITY);
    }
}
