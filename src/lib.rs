// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! An anisotropic fast-marching solver on regular 3D grids.
//!
//! The library computes the viscosity solution of the static Hamilton-Jacobi
//! equation `p^T B(x) p = 1`, where `B` is a per-voxel symmetric tensor, by a
//! best-first expansion from one or more seeds. Each accepted point also
//! records the optimal dynamics (the unit control direction of the geodesic)
//! and, optionally, upwind confidence statistics of that direction field.
//!
//! The engine ([`Marcher`]) is generic over a [`SectorSolver`], which supplies
//! the local root solves for the 27 sign sectors, and over an
//! [`AcceptObserver`], which is notified of every finalized point.
//! [`ConnectivityMapper`] wires the tensor metric, the dynamics recorder and
//! the confidence tracker together for single seeds or whole regions.

#![warn(missing_docs)]

pub mod confidence;
pub mod connectivity;
/// Grid geometry and point states.
pub mod core;
/// Error types for the library.
pub mod error;
/// File I/O for tensor, mask and result volumes.
pub mod io;
/// The fast-marching engine and its observers.
pub mod marcher;
pub mod metric;
pub mod power;
/// Addressable pairing heap.
pub mod queue;
pub mod scheme;

pub use crate::confidence::{ConfidenceMaps, ConfidenceTracker, MagnitudeNorm};
pub use crate::connectivity::{ConnectivityMapper, ConnectivityMaps};
pub use crate::core::{Grid3, PointState};
pub use crate::error::{MarchError, Result};
pub use crate::marcher::{
    AcceptObserver, AcceptedPoint, DynamicsField, Marcher, Orientation, RunSummary,
};
pub use crate::metric::TensorMetric;
pub use crate::power::tensor_power_field;
pub use crate::queue::{NodeHandle, PairingHeap};
pub use crate::scheme::{solve_point, SectorSolver};
