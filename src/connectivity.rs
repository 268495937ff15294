// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Geodesic connectivity maps from single seeds or whole regions.

use rayon::prelude::*;

use crate::confidence::{ConfidenceTracker, MagnitudeNorm};
use crate::core::Grid3;
use crate::error::{MarchError, Result};
use crate::marcher::{DynamicsField, Marcher};
use crate::metric::{TensorMetric, TENSOR_COMPONENTS};
use crate::scheme::SectorSolver;

/// Distance, dynamics and confidence maps of one or more seeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityMaps {
    /// Geodesic distance.
    pub distance: Vec<f64>,
    /// Optimal dynamics, component-major (`3 * num_nodes`).
    pub dynamics: Vec<f64>,
    /// Path mean of the dynamics magnitude.
    pub mean: Vec<f64>,
    /// Path standard deviation of the dynamics magnitude.
    pub std: Vec<f64>,
    /// Path minimum of the dynamics magnitude.
    pub min: Vec<f64>,
}

impl ConnectivityMaps {
    /// All-zero maps for `num_nodes` voxels.
    pub fn zeros(num_nodes: usize) -> Self {
        ConnectivityMaps {
            distance: vec![0.0; num_nodes],
            dynamics: vec![0.0; 3 * num_nodes],
            mean: vec![0.0; num_nodes],
            std: vec![0.0; num_nodes],
            min: vec![0.0; num_nodes],
        }
    }

    /// Add `other` element-wise.
    pub fn accumulate(mut self, other: ConnectivityMaps) -> Self {
        let add = |a: &mut Vec<f64>, b: Vec<f64>| {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        };
        add(&mut self.distance, other.distance);
        add(&mut self.dynamics, other.dynamics);
        add(&mut self.mean, other.mean);
        add(&mut self.std, other.std);
        add(&mut self.min, other.min);
        self
    }
}

/// Runs one marcher per seed over a shared tensor metric.
#[derive(Debug)]
pub struct ConnectivityMapper {
    metric: TensorMetric,
    norm: MagnitudeNorm,
    threads: Option<usize>,
    limit: Option<f64>,
    boundary_evaluation: bool,
}

impl ConnectivityMapper {
    /// Create a mapper.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if a tensor norm field does not fit the grid.
    pub fn new(metric: TensorMetric, norm: MagnitudeNorm) -> Result<Self> {
        let n = metric.grid().num_nodes();
        if let MagnitudeNorm::Tensor(field) = &norm {
            if field.len() != TENSOR_COMPONENTS * n {
                return Err(MarchError::ShapeMismatch {
                    expected: vec![TENSOR_COMPONENTS * n],
                    got: vec![field.len()],
                });
            }
        }
        Ok(ConnectivityMapper {
            metric,
            norm,
            threads: None,
            limit: None,
            boundary_evaluation: false,
        })
    }

    /// Worker threads for [`map_region`](Self::map_region) (builder method).
    /// Defaults to the available parallelism.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Stop each march once the front reaches `limit` (builder method).
    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate points on the grid faces too (builder method).
    pub fn with_boundary_evaluation(mut self, enabled: bool) -> Self {
        self.boundary_evaluation = enabled;
        self
    }

    /// The metric.
    pub fn metric(&self) -> &TensorMetric {
        &self.metric
    }

    /// The grid.
    pub fn grid(&self) -> &Grid3 {
        self.metric.grid()
    }

    fn get_num_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Maps for a single seed at distance zero.
    ///
    /// # Errors
    /// Returns `InvalidSeed` if the seed is outside the grid or excluded by
    /// the metric.
    pub fn map_seed(&self, seed: [usize; 3]) -> Result<ConnectivityMaps> {
        let grid = self.metric.grid();
        if !grid.contains(seed) {
            return Err(MarchError::InvalidSeed {
                coord: seed,
                reason: "outside the grid".to_string(),
            });
        }
        let index = grid.offset(seed);
        if !self.metric.is_admissible(index) {
            return Err(MarchError::InvalidSeed {
                coord: seed,
                reason: "excluded by the tensor mask".to_string(),
            });
        }

        let n = grid.num_nodes();
        let tracker = ConfidenceTracker::new(grid, &self.norm)?;
        let mut marcher = Marcher::new(
            grid.clone(),
            &self.metric,
            (DynamicsField::new(n), tracker),
        )
        .with_boundary_evaluation(self.boundary_evaluation);
        marcher.set_value(seed, 0.0)?;
        marcher.add_trial_point(seed)?;
        let summary = match self.limit {
            Some(limit) => marcher.run_until(limit),
            None => marcher.run(),
        };
        log::debug!("seed {:?}: {} points accepted", seed, summary.accepted);

        let (distance, (dynamics, tracker)) = marcher.into_parts();
        let confidence = tracker.finalize(&distance, &[index]);
        Ok(ConnectivityMaps {
            dynamics: dynamics.component_major(),
            mean: confidence.mean,
            std: confidence.std,
            min: confidence.min,
            distance,
        })
    }

    /// Sum of [`map_seed`](Self::map_seed) over every voxel with a positive
    /// region value.
    ///
    /// Region voxels the metric excludes are skipped with a warning.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if `roi` does not have one entry per voxel, or
    /// the first error of any seed run.
    pub fn map_region(&self, roi: &[f64]) -> Result<ConnectivityMaps> {
        let grid = self.metric.grid();
        let n = grid.num_nodes();
        if roi.len() != n {
            return Err(MarchError::ShapeMismatch {
                expected: vec![n],
                got: vec![roi.len()],
            });
        }

        let mut seeds = Vec::new();
        for (index, &v) in roi.iter().enumerate() {
            if !(v > 0.0) {
                continue;
            }
            if self.metric.is_admissible(index) {
                seeds.push(grid.coord(index));
            } else {
                log::warn!(
                    "region voxel {:?} is excluded by the tensor mask, skipping",
                    grid.coord(index)
                );
            }
        }

        let num_threads = self.get_num_threads();
        log::info!(
            "mapping region of {} seeds on {} threads",
            seeds.len(),
            num_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| MarchError::Other(e.to_string()))?;

        pool.install(|| {
            seeds
                .par_iter()
                .map(|&seed| self.map_seed(seed))
                .try_reduce(
                    || ConnectivityMaps::zeros(n),
                    |a, b| Ok(a.accumulate(b)),
                )
        })
    }
}
