// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Anisotropic metric driven by a per-voxel symmetric tensor.
//!
//! The local Hamiltonian is `p^T B p - 1` where `B` is the 3x3 tensor of the
//! voxel. Face sectors use the pseudo-inverse of a 2x2 principal block of
//! `pinv(B)`, edge sectors use `1 / pinv(B)[i][i]`.

use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

use crate::core::Grid3;
use crate::error::{MarchError, Result};
use crate::scheme::{solve_quadratic, SectorRoot, SectorSolver};

/// Number of stored components per tensor: `Dxx, Dxy, Dxz, Dyy, Dyz, Dzz`.
pub const TENSOR_COMPONENTS: usize = 6;

/// Singular values below this are treated as zero by the pseudo-inverses.
const PINV_EPS: f64 = 1e-12;

/// Rebuild the symmetric matrix of voxel `index` from a component-major tensor field.
///
/// Component `c` of voxel `n` lives at `tensor[n + c * num_nodes]`.
#[inline]
pub fn tensor_matrix(tensor: &[f64], num_nodes: usize, index: usize) -> Matrix3<f64> {
    let c = |k: usize| tensor[index + k * num_nodes];
    Matrix3::new(
        c(0), c(1), c(2), //
        c(1), c(3), c(4), //
        c(2), c(4), c(5),
    )
}

/// Quadratic form `v^T m v`.
#[inline]
pub fn quadratic_form(m: &Matrix3<f64>, v: [f64; 3]) -> f64 {
    let v = Vector3::from(v);
    v.dot(&(m * v))
}

/// Per-voxel descriptor of the local Hamiltonian.
#[derive(Debug, Clone)]
pub struct Hamiltonian {
    b: Matrix3<f64>,
    inv_b: Matrix3<f64>,
    /// `pinv` of the 2x2 block of `inv_b` that excludes axis `k`.
    face: [Matrix2<f64>; 3],
    /// `1 / inv_b[k][k]`.
    edge: [f64; 3],
}

impl Hamiltonian {
    /// Build the descriptor, or `None` if the tensor or one of the principal
    /// 2x2 blocks of its pseudo-inverse is zero.
    pub fn from_tensor(b: Matrix3<f64>) -> Option<Self> {
        if upper_is_zero3(&b) {
            return None;
        }
        let inv_b = b.pseudo_inverse(PINV_EPS).ok()?;

        let mut face = [Matrix2::zeros(); 3];
        for (zero_axis, slot) in face.iter_mut().enumerate() {
            let (p, q) = kept_axes(zero_axis);
            let block = Matrix2::new(
                inv_b[(p, p)], inv_b[(p, q)], //
                inv_b[(q, p)], inv_b[(q, q)],
            );
            if block[(0, 0)] == 0.0 && block[(0, 1)] == 0.0 && block[(1, 1)] == 0.0 {
                return None;
            }
            *slot = block.pseudo_inverse(PINV_EPS).ok()?;
        }

        let edge = [
            1.0 / inv_b[(0, 0)],
            1.0 / inv_b[(1, 1)],
            1.0 / inv_b[(2, 2)],
        ];

        Some(Hamiltonian {
            b,
            inv_b,
            face,
            edge,
        })
    }

    /// The tensor itself.
    pub fn tensor(&self) -> &Matrix3<f64> {
        &self.b
    }

    /// Pseudo-inverse of the tensor.
    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inv_b
    }
}

fn upper_is_zero3(m: &Matrix3<f64>) -> bool {
    [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]
        .iter()
        .all(|&ij| m[ij] == 0.0)
}

fn kept_axes(zero_axis: usize) -> (usize, usize) {
    match zero_axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Closed-form 1D solve: `root = u + h / sqrt(c)` with dynamics `-s * sqrt(c)`.
///
/// Valid only for `c > 0`.
pub fn solve_in_dim1(c: f64, u: f64, s: i8, h: f64) -> Option<(f64, f64)> {
    if !(c > 0.0) || !c.is_finite() {
        return None;
    }
    let sqrt_c = c.sqrt();
    Some((u + h / sqrt_c, -(s as f64) * sqrt_c))
}

/// Tensor-driven implementation of the sector hooks.
#[derive(Debug, Clone)]
pub struct TensorMetric {
    grid: Grid3,
    cells: Vec<Option<Hamiltonian>>,
    tolerance: f64,
}

impl TensorMetric {
    /// Build descriptors for every voxel.
    ///
    /// `tensor` is component-major with six components per voxel. Voxels with a
    /// zero mask value or a degenerate tensor become inadmissible.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if the tensor or mask length does not fit the grid.
    pub fn new(grid: Grid3, tensor: &[f64], mask: Option<&[f64]>) -> Result<Self> {
        let n = grid.num_nodes();
        if tensor.len() != TENSOR_COMPONENTS * n {
            return Err(MarchError::ShapeMismatch {
                expected: vec![TENSOR_COMPONENTS * n],
                got: vec![tensor.len()],
            });
        }
        if let Some(m) = mask {
            if m.len() != n {
                return Err(MarchError::ShapeMismatch {
                    expected: vec![n],
                    got: vec![m.len()],
                });
            }
        }

        let mut discarded = 0usize;
        let cells: Vec<Option<Hamiltonian>> = (0..n)
            .map(|index| {
                if mask.is_some_and(|m| m[index] == 0.0) {
                    return None;
                }
                let cell = Hamiltonian::from_tensor(tensor_matrix(tensor, n, index));
                if cell.is_none() {
                    discarded += 1;
                    log::warn!(
                        "null tensor at {:?}, discarding from mask",
                        grid.coord(index)
                    );
                }
                cell
            })
            .collect();

        log::debug!(
            "tensor metric: {} voxels, {} admissible, {} degenerate",
            n,
            cells.iter().filter(|c| c.is_some()).count(),
            discarded
        );

        Ok(TensorMetric {
            grid,
            cells,
            tolerance: 0.0,
        })
    }

    /// Metric with the same tensor at every voxel.
    pub fn uniform(grid: Grid3, b: Matrix3<f64>) -> Result<Self> {
        let n = grid.num_nodes();
        let components = [
            b[(0, 0)],
            b[(0, 1)],
            b[(0, 2)],
            b[(1, 1)],
            b[(1, 2)],
            b[(2, 2)],
        ];
        let tensor: Vec<f64> = components
            .iter()
            .flat_map(|&c| std::iter::repeat(c).take(n))
            .collect();
        Self::new(grid, &tensor, None)
    }

    /// Require every control component to point inward by more than `tolerance`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The grid the metric was built on.
    pub fn grid(&self) -> &Grid3 {
        &self.grid
    }

    /// Descriptor of a voxel, `None` if it is excluded.
    pub fn hamiltonian(&self, index: usize) -> Option<&Hamiltonian> {
        self.cells.get(index).and_then(|c| c.as_ref())
    }

    /// Number of voxels excluded by the mask or by a degenerate tensor.
    pub fn num_excluded(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    #[inline]
    fn inward(&self, dynamics: f64, s: i8) -> bool {
        dynamics * (s as f64) < -self.tolerance
    }
}

impl SectorSolver for TensorMetric {
    fn is_admissible(&self, index: usize) -> bool {
        self.hamiltonian(index).is_some()
    }

    fn solve_full(&self, index: usize, u: [f64; 3], signs: [i8; 3]) -> Option<SectorRoot> {
        let ham = self.hamiltonian(index)?;
        let b = &ham.b;
        let h = self.grid.spacing();
        let dx: [f64; 3] = std::array::from_fn(|i| signs[i] as f64 * h[i]);

        let (a, bq, c) = full_coefficients(b, u, dx);
        let (t1, t2) = solve_quadratic(a, bq, c)?;

        [t1, t2].into_iter().find_map(|t| {
            let p = Vector3::new(
                (t - u[0]) / -dx[0],
                (t - u[1]) / -dx[1],
                (t - u[2]) / -dx[2],
            );
            let dynamics = b * p;
            let ok = (0..3).all(|i| self.inward(dynamics[i], signs[i]));
            ok.then(|| SectorRoot {
                root: t,
                dynamics: [dynamics[0], dynamics[1], dynamics[2]],
            })
        })
    }

    fn solve_face(
        &self,
        index: usize,
        u: [f64; 3],
        signs: [i8; 3],
        zero_axis: usize,
    ) -> Option<SectorRoot> {
        let ham = self.hamiltonian(index)?;
        let c = &ham.face[zero_axis];
        let (p, q) = kept_axes(zero_axis);
        let h = self.grid.spacing();
        let dx = [signs[p] as f64 * h[p], signs[q] as f64 * h[q]];
        let uu = [u[p], u[q]];

        let (a, bq, cq) = face_coefficients(c, uu, dx);
        let (t1, t2) = solve_quadratic(a, bq, cq)?;

        [t1, t2].into_iter().find_map(|t| {
            let grad = Vector2::new((t - uu[0]) / -dx[0], (t - uu[1]) / -dx[1]);
            let d = c * grad;
            let ok = self.inward(d[0], signs[p]) && self.inward(d[1], signs[q]);
            ok.then(|| {
                let mut dynamics = [0.0; 3];
                dynamics[p] = d[0];
                dynamics[q] = d[1];
                SectorRoot { root: t, dynamics }
            })
        })
    }

    fn solve_edge(
        &self,
        index: usize,
        u: [f64; 3],
        signs: [i8; 3],
        axis: usize,
    ) -> Option<SectorRoot> {
        let ham = self.hamiltonian(index)?;
        let h = self.grid.spacing()[axis];
        let (root, d) = solve_in_dim1(ham.edge[axis], u[axis], signs[axis], h)?;
        let mut dynamics = [0.0; 3];
        dynamics[axis] = d;
        Some(SectorRoot { root, dynamics })
    }

    /// Scale the control to unit length under `pinv(B)`.
    fn normalize_dynamics(&self, index: usize, raw: [f64; 3]) -> [f64; 3] {
        let Some(ham) = self.hamiltonian(index) else {
            return [0.0; 3];
        };
        let norm = quadratic_form(&ham.inv_b, raw).sqrt();
        if norm.is_finite() && norm > 0.0 {
            raw.map(|v| v / norm)
        } else {
            [0.0; 3]
        }
    }
}

/// Coefficients of `p_t^T B p_t = 1` for a full sector, scaled by `(dx1 dx2 dx3)^2`.
///
/// `dx` holds the signed spacings `s_i * h_i`.
fn full_coefficients(b: &Matrix3<f64>, u: [f64; 3], dx: [f64; 3]) -> (f64, f64, f64) {
    let [u1, u2, u3] = u;
    let [dx1, dx2, dx3] = dx;
    let (dx1_2, dx2_2, dx3_2) = (dx1 * dx1, dx2 * dx2, dx3 * dx3);

    let d1 = dx2_2 * dx3_2 * b[(0, 0)];
    let d2 = dx1_2 * dx3_2 * b[(1, 1)];
    let d3 = dx1_2 * dx2_2 * b[(2, 2)];
    let d12 = 2.0 * dx1 * dx2 * dx3_2 * b[(0, 1)];
    let d13 = 2.0 * dx1 * dx2_2 * dx3 * b[(0, 2)];
    let d23 = 2.0 * dx1_2 * dx2 * dx3 * b[(1, 2)];

    let a = d1 + d2 + d3 + d12 + d13 + d23;
    let bq = -2.0 * (d1 * u1 + d2 * u2 + d3 * u3)
        - d12 * (u1 + u2)
        - d13 * (u1 + u3)
        - d23 * (u2 + u3);
    let c = d1 * u1 * u1 + d2 * u2 * u2 + d3 * u3 * u3 + d12 * u1 * u2 + d13 * u1 * u3
        + d23 * u2 * u3
        - dx1_2 * dx2_2 * dx3_2;
    (a, bq, c)
}

/// 2D analogue of [`full_coefficients`].
fn face_coefficients(c: &Matrix2<f64>, u: [f64; 2], dx: [f64; 2]) -> (f64, f64, f64) {
    let [u1, u2] = u;
    let [dx1, dx2] = dx;
    let (dx1_2, dx2_2) = (dx1 * dx1, dx2 * dx2);

    let d1 = dx2_2 * c[(0, 0)];
    let d2 = dx1_2 * c[(1, 1)];
    let d12 = 2.0 * dx1 * dx2 * c[(0, 1)];

    let a = d1 + d2 + d12;
    let bq = -2.0 * d1 * u1 - 2.0 * d2 * u2 - d12 * (u1 + u2);
    let cq = d1 * u1 * u1 + d2 * u2 * u2 + d12 * u1 * u2 - dx1_2 * dx2_2;
    (a, bq, cq)
}
