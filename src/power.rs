// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Matrix power of a tensor field, used by the confidence norm.

use nalgebra::{Matrix3, SymmetricEigen};

use crate::error::{MarchError, Result};
use crate::metric::{tensor_matrix, TENSOR_COMPONENTS};

/// Raise every tensor of a component-major field to the power `alpha`.
///
/// Each tensor is diagonalized and rebuilt as `V diag(lambda^alpha) V^T`.
/// Non-positive eigenvalues contribute zero. `alpha` of 0 or 1 returns the
/// field unchanged.
///
/// # Errors
/// Returns `ShapeMismatch` if `tensor.len() != 6 * num_nodes`.
pub fn tensor_power_field(tensor: &[f64], num_nodes: usize, alpha: f64) -> Result<Vec<f64>> {
    if tensor.len() != TENSOR_COMPONENTS * num_nodes {
        return Err(MarchError::ShapeMismatch {
            expected: vec![TENSOR_COMPONENTS * num_nodes],
            got: vec![tensor.len()],
        });
    }
    let mut out = tensor.to_vec();
    if alpha == 0.0 || alpha == 1.0 {
        return Ok(out);
    }

    for index in 0..num_nodes {
        // Empty voxels are copied as they are.
        if !(tensor[index] > f64::EPSILON) {
            continue;
        }
        let p = matrix_power(tensor_matrix(tensor, num_nodes, index), alpha);
        let components = [
            p[(0, 0)],
            p[(0, 1)],
            p[(0, 2)],
            p[(1, 1)],
            p[(1, 2)],
            p[(2, 2)],
        ];
        for (c, value) in components.into_iter().enumerate() {
            out[index + c * num_nodes] = value;
        }
    }
    Ok(out)
}

fn matrix_power(m: Matrix3<f64>, alpha: f64) -> Matrix3<f64> {
    let eig = SymmetricEigen::new(m);
    let powered = eig
        .eigenvalues
        .map(|l| if l > 0.0 { l.powf(alpha) } else { 0.0 });
    eig.eigenvectors * Matrix3::from_diagonal(&powered) * eig.eigenvectors.transpose()
}
