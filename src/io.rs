// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::error::{MarchError, Result};
use crate::metric::TENSOR_COMPONENTS;

/// Supported file formats for volume I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// NumPy .npy format.
    Npy,
    /// MATLAB .mat format (Level 5).
    Mat,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("npy") => Ok(FileFormat::Npy),
        Some("mat") => Ok(FileFormat::Mat),
        Some(ext) => Err(MarchError::UnsupportedFileFormat(ext.to_string())),
        None => Err(MarchError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

fn load_npy(path: &Path) -> Result<ArrayD<f64>> {
    if let Ok(a) = ndarray_npy::read_npy::<_, ArrayD<f64>>(path) {
        return Ok(a);
    }
    if let Ok(a) = ndarray_npy::read_npy::<_, ArrayD<f32>>(path) {
        return Ok(a.mapv(|v| v as f64));
    }
    let a: ArrayD<u8> = ndarray_npy::read_npy(path)
        .map_err(|e| MarchError::UnsupportedDtype(format!("{}", e)))?;
    Ok(a.mapv(|v| v as f64))
}

fn load_mat(path: &Path, variable_name: &str) -> Result<ArrayD<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| MarchError::Other(format!("MAT parse error: {}", e)))?;

    let available: Vec<String> = mat.arrays().iter().map(|a| a.name().to_string()).collect();
    let array = mat
        .find_by_name(variable_name)
        .ok_or_else(|| MarchError::MatVariableNotFound {
            expected: variable_name.to_string(),
            available,
        })?;

    let data: Vec<f64> = match array.data() {
        matfile::NumericData::Double { real, .. } => real.clone(),
        matfile::NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        matfile::NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        _ => {
            return Err(MarchError::UnsupportedDtype(format!(
                "MAT variable '{}' is not double, single or uint8",
                variable_name
            )))
        }
    };

    // MATLAB stores column-major with the size listed first axis first.
    let shape = array.size().to_vec();
    let arr = ArrayD::from_shape_vec(IxDyn(&shape).f(), data)
        .map_err(|e| MarchError::Other(format!("shape error: {}", e)))?;
    Ok(arr)
}

/// Load a volume as a row-major array, inferring the format from the extension.
///
/// `.mat` files are read from variable `variable_name`.
pub fn load_volume(path: &Path, variable_name: &str) -> Result<ArrayD<f64>> {
    let arr = match infer_format(path)? {
        FileFormat::Npy => load_npy(path)?,
        FileFormat::Mat => load_mat(path, variable_name)?,
    };
    // Fortran-order .npy files would otherwise hand out column-major data.
    if arr.is_standard_layout() {
        Ok(arr)
    } else {
        Ok(arr.as_standard_layout().to_owned())
    }
}

/// Load a 3-D scalar field and check it against `expected_shape`.
pub fn load_scalar_field(
    path: &Path,
    variable_name: &str,
    expected_shape: [usize; 3],
) -> Result<Vec<f64>> {
    let arr = load_volume(path, variable_name)?;
    if arr.shape() != expected_shape {
        return Err(MarchError::ShapeMismatch {
            expected: expected_shape.to_vec(),
            got: arr.shape().to_vec(),
        });
    }
    Ok(arr.into_raw_vec())
}

/// Load a tensor field stored as `[6, nx, ny, nz]` or `[nx, ny, nz, 6]`.
///
/// Returns the grid shape and the field in component-major order
/// (`Dxx, Dxy, Dxz, Dyy, Dyz, Dzz`, each a full volume).
pub fn load_tensor_field(path: &Path, variable_name: &str) -> Result<([usize; 3], Vec<f64>)> {
    let arr = load_volume(path, variable_name)?;
    let shape = arr.shape().to_vec();
    if shape.len() != 4 {
        return Err(MarchError::ShapeMismatch {
            expected: vec![TENSOR_COMPONENTS, 0, 0, 0],
            got: shape,
        });
    }

    if shape[0] == TENSOR_COMPONENTS {
        Ok(([shape[1], shape[2], shape[3]], arr.into_raw_vec()))
    } else if shape[3] == TENSOR_COMPONENTS {
        let moved = arr.permuted_axes(IxDyn(&[3, 0, 1, 2]));
        let data = moved.as_standard_layout().to_owned().into_raw_vec();
        Ok(([shape[0], shape[1], shape[2]], data))
    } else {
        Err(MarchError::ShapeMismatch {
            expected: vec![TENSOR_COMPONENTS, 0, 0, 0],
            got: shape,
        })
    }
}

/// Save a row-major volume, inferring the format from the extension.
///
/// `.mat` files get a single double variable named `variable_name`.
pub fn save_volume(path: &Path, shape: &[usize], data: &[f64], variable_name: &str) -> Result<()> {
    let arr = ArrayD::from_shape_vec(IxDyn(shape), data.to_vec())
        .map_err(|e| MarchError::Other(format!("shape error: {}", e)))?;
    match infer_format(path)? {
        FileFormat::Npy => ndarray_npy::write_npy(path, &arr)
            .map_err(|e| MarchError::Other(format!("npy write error: {}", e))),
        FileFormat::Mat => {
            // Reversed-axes view in standard layout is the column-major data.
            let col_major = arr.t().as_standard_layout().to_owned().into_raw_vec();
            write_mat_level5(path, variable_name, shape, &col_major)
        }
    }
}

/// Minimal MAT-file Level 5 writer for a single real double array.
///
/// `matfile` only reads, so the handful of records needed are written here:
/// the 128-byte header and one uncompressed `miMATRIX` element holding the
/// array flags, dimensions, name and column-major data.
fn write_mat_level5(path: &Path, var_name: &str, dimensions: &[usize], data: &[f64]) -> Result<()> {
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MX_DOUBLE_CLASS: u32 = 6;

    let too_large = || MarchError::Other("array too large for a Level 5 MAT file".to_string());

    let mut flags = Vec::with_capacity(8);
    flags.extend_from_slice(&MX_DOUBLE_CLASS.to_le_bytes());
    flags.extend_from_slice(&0u32.to_le_bytes());

    let mut dims = Vec::with_capacity(4 * dimensions.len());
    for &d in dimensions {
        let d = i32::try_from(d).map_err(|_| too_large())?;
        dims.extend_from_slice(&d.to_le_bytes());
    }

    let mut real = Vec::with_capacity(8 * data.len());
    for v in data {
        real.extend_from_slice(&v.to_le_bytes());
    }

    let elements: [(u32, &[u8]); 4] = [
        (MI_UINT32, &flags),
        (MI_INT32, &dims),
        (MI_INT8, var_name.as_bytes()),
        (MI_DOUBLE, &real),
    ];
    let mut body = 0usize;
    for (_, bytes) in &elements {
        body += 8 + padded(bytes.len());
    }
    let body = u32::try_from(body).map_err(|_| too_large())?;

    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);

    // Header: 116 bytes of text, 8-byte subsystem offset, version, endian marker.
    let mut text = [b' '; 116];
    let desc = b"MATLAB 5.0 MAT-file, created by aniso-fmm";
    text[..desc.len()].copy_from_slice(desc);
    w.write_all(&text)?;
    w.write_all(&[0u8; 8])?;
    w.write_all(&0x0100u16.to_le_bytes())?;
    w.write_all(b"IM")?;

    w.write_all(&MI_MATRIX.to_le_bytes())?;
    w.write_all(&body.to_le_bytes())?;
    for (ty, bytes) in elements {
        let len = u32::try_from(bytes.len()).map_err(|_| too_large())?;
        w.write_all(&ty.to_le_bytes())?;
        w.write_all(&len.to_le_bytes())?;
        w.write_all(bytes)?;
        w.write_all(&[0u8; 8][..padded(bytes.len()) - bytes.len()])?;
    }

    w.flush()?;
    Ok(())
}

/// Round up to the 8-byte element alignment.
fn padded(len: usize) -> usize {
    len.div_ceil(8) * 8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: [usize; 3]) -> Vec<f64> {
        (0..shape.iter().product::<usize>()).map(|i| i as f64).collect()
    }

    #[test]
    fn npy_roundtrip() {
        let shape = [2, 3, 4];
        let data = ramp(shape);
        let tmp = std::env::temp_dir().join("aniso_fmm_test_roundtrip.npy");
        save_volume(&tmp, &shape, &data, "distance").unwrap();

        let loaded = load_scalar_field(&tmp, "distance", shape).unwrap();
        assert_eq!(loaded, data);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn npy_shape_mismatch() {
        let shape = [2, 3, 4];
        let tmp = std::env::temp_dir().join("aniso_fmm_test_shape_mismatch.npy");
        save_volume(&tmp, &shape, &ramp(shape), "distance").unwrap();

        let result = load_scalar_field(&tmp, "distance", [4, 3, 2]);
        assert!(matches!(result, Err(MarchError::ShapeMismatch { .. })));
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_roundtrip_keeps_axis_order() {
        let shape = [2, 3, 4];
        let data = ramp(shape);
        let tmp = std::env::temp_dir().join("aniso_fmm_test_roundtrip.mat");
        save_volume(&tmp, &shape, &data, "distance").unwrap();

        // The raw MAT payload is column-major with MATLAB size == shape.
        let file = std::fs::File::open(&tmp).unwrap();
        let mut reader = std::io::BufReader::new(file);
        let mat = matfile::MatFile::parse(&mut reader).unwrap();
        let arr = mat.find_by_name("distance").unwrap();
        assert_eq!(arr.size(), &[2, 3, 4]);
        match arr.data() {
            matfile::NumericData::Double { real, .. } => {
                // Element (1, 0, 0) is the second stored value.
                assert_eq!(real[1], data[12]);
            }
            _ => panic!("expected double data"),
        }

        let loaded = load_scalar_field(&tmp, "distance", shape).unwrap();
        for (i, (a, b)) in loaded.iter().zip(&data).enumerate() {
            assert!((a - b).abs() < 1e-12, "mismatch at {}: {} vs {}", i, a, b);
        }
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_missing_variable() {
        let shape = [3, 3, 3];
        let tmp = std::env::temp_dir().join("aniso_fmm_test_missing_var.mat");
        save_volume(&tmp, &shape, &ramp(shape), "mask").unwrap();
        let result = load_volume(&tmp, "tensor");
        match result {
            Err(MarchError::MatVariableNotFound { expected, available }) => {
                assert_eq!(expected, "tensor");
                assert_eq!(available, vec!["mask".to_string()]);
            }
            other => panic!("expected MatVariableNotFound, got {:?}", other),
        }
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn tensor_field_component_last() {
        let shape = [3, 3, 4];
        let n: usize = shape.iter().product();
        // Component c of voxel i holds 100 * c + i.
        let mut data = vec![0.0; n * 6];
        for i in 0..n {
            for c in 0..6 {
                data[i * 6 + c] = (100 * c + i) as f64;
            }
        }
        let tmp = std::env::temp_dir().join("aniso_fmm_test_tensor_last.npy");
        save_volume(&tmp, &[3, 3, 4, 6], &data, "tensor").unwrap();

        let (grid_shape, field) = load_tensor_field(&tmp, "tensor").unwrap();
        assert_eq!(grid_shape, shape);
        for i in 0..n {
            for c in 0..6 {
                assert_eq!(field[i + c * n], (100 * c + i) as f64);
            }
        }
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn tensor_field_component_first() {
        let n = 27;
        let data: Vec<f64> = (0..6 * n).map(|i| i as f64).collect();
        let tmp = std::env::temp_dir().join("aniso_fmm_test_tensor_first.npy");
        save_volume(&tmp, &[6, 3, 3, 3], &data, "tensor").unwrap();

        let (grid_shape, field) = load_tensor_field(&tmp, "tensor").unwrap();
        assert_eq!(grid_shape, [3, 3, 3]);
        assert_eq!(field, data);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn tensor_field_rejects_bad_shape() {
        let tmp = std::env::temp_dir().join("aniso_fmm_test_tensor_bad.npy");
        save_volume(&tmp, &[3, 3, 3], &ramp([3, 3, 3]), "tensor").unwrap();
        assert!(matches!(
            load_tensor_field(&tmp, "tensor"),
            Err(MarchError::ShapeMismatch { .. })
        ));
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn unsupported_format() {
        let path = Path::new("test.xyz");
        let result = infer_format(path);
        assert!(matches!(result, Err(MarchError::UnsupportedFileFormat(_))));
        assert!(matches!(
            infer_format(Path::new("volume")),
            Err(MarchError::UnsupportedFileFormat(_))
        ));
    }
}
