// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::io::Write;
use std::path::Path;

use ndarray::{Array3, ArrayD, Ix3, IxDyn, ShapeBuilder};

use crate::core::NDIM;
use crate::error::{EikonalError, Result};

/// Supported file formats for field I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
        Some(ext) => Err(EikonalError::UnsupportedFileFormat(ext.to_string())),
        None => Err(EikonalError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

fn check_shape(got: Vec<usize>, expected: [usize; NDIM]) -> Result<()> {
    if got != expected {
        return Err(EikonalError::ShapeMismatch {
            name: "file",
            expected: expected.to_vec(),
            got,
        });
    }
    Ok(())
}

/// Load a 3D field from a .npy file (f64, or f32 promoted to f64).
pub fn load_npy_field(path: &Path, expected_shape: [usize; NDIM]) -> Result<Array3<f64>> {
    let arr: ArrayD<f64> = match ndarray_npy::read_npy(path) {
        Ok(a) => a,
        Err(_) => {
            let arr32: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| EikonalError::UnsupportedDtype(format!("{}", e)))?;
            arr32.mapv(|v| v as f64)
        }
    };
    check_shape(arr.shape().to_vec(), expected_shape)?;

    // Fortran-ordered files come back in column-major layout
    let arr = arr
        .into_dimensionality::<Ix3>()
        .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))?;
    Ok(arr.as_standard_layout().into_owned())
}

/// Save a 3D field to a .npy file.
pub fn save_npy(field: &Array3<f64>, path: &Path) -> Result<()> {
    ndarray_npy::write_npy(path, field)
        .map_err(|e| EikonalError::Other(format!("npy write error: {}", e)))
}

/// Load a 3D field stored under `variable_name` in a .mat file.
///
/// MAT files are column-major; the stored shape may be either the expected
/// shape or its reverse.
pub fn load_mat_field(
    path: &Path,
    variable_name: &str,
    expected_shape: [usize; NDIM],
) -> Result<Array3<f64>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mat = matfile::MatFile::parse(&mut reader)
        .map_err(|e| EikonalError::Other(format!("MAT parse error: {}", e)))?;

    let available: Vec<String> = mat.arrays().iter().map(|a| a.name().to_string()).collect();
    let array =
        mat.find_by_name(variable_name)
            .ok_or_else(|| EikonalError::MatVariableNotFound {
                expected: variable_name.to_string(),
                available,
            })?;

    let data: Vec<f64> = match array.data() {
        matfile::NumericData::Double { real, imag: _ } => real.clone(),
        matfile::NumericData::Single { real, imag: _ } => real.iter().map(|&v| v as f64).collect(),
        _ => {
            return Err(EikonalError::UnsupportedDtype(
                "MAT file array is not f64 or f32".to_string(),
            ))
        }
    };

    let mat_shape: Vec<usize> = array.size().to_vec();
    let reversed: Vec<usize> = expected_shape.iter().rev().cloned().collect();
    let transposed = if mat_shape == expected_shape {
        false
    } else if mat_shape == reversed {
        true
    } else {
        return Err(EikonalError::ShapeMismatch {
            name: "file",
            expected: expected_shape.to_vec(),
            got: mat_shape,
        });
    };

    let arr = ArrayD::from_shape_vec(IxDyn(&mat_shape).f(), data)
        .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))?;
    let arr = if transposed { arr.reversed_axes() } else { arr };
    let arr = arr
        .into_dimensionality::<Ix3>()
        .map_err(|e| EikonalError::Other(format!("shape error: {}", e)))?;
    Ok(arr.as_standard_layout().into_owned())
}

/// Save a 3D field to an uncompressed MAT Level 5 file under `var_name`.
///
/// The `matfile` crate only reads, so the single-array writer is local.
pub fn save_mat(field: &Array3<f64>, path: &Path, var_name: &str) -> Result<()> {
    // MATLAB stores column-major with the dimensions in the same order
    let col_major: Vec<f64> = field.t().iter().copied().collect();
    let dims: Vec<usize> = field.shape().to_vec();
    write_mat_level5(path, var_name, &dims, &col_major)
}

/// Data element tag: 4-byte type, 4-byte payload size.
fn write_tag<W: Write>(w: &mut W, data_type: u32, size: u32) -> std::io::Result<()> {
    w.write_all(&data_type.to_le_bytes())?;
    w.write_all(&size.to_le_bytes())
}

fn padding(size: u32) -> usize {
    (size.div_ceil(8) * 8 - size) as usize
}

const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_DOUBLE_CLASS: u32 = 6;

fn write_mat_level5(path: &Path, var_name: &str, dims: &[usize], data: &[f64]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(file);

    // 128-byte header: text, subsystem offset, version, endian marker
    let mut header_text = [b' '; 116];
    let desc = b"MATLAB 5.0 MAT-file, created by eikonal-sweep";
    header_text[..desc.len()].copy_from_slice(desc);
    w.write_all(&header_text)?;
    w.write_all(&[0u8; 8])?;
    w.write_all(&0x0100u16.to_le_bytes())?;
    w.write_all(b"IM")?;

    let dims_size = (dims.len() * 4) as u32;
    let name_size = var_name.len() as u32;
    let real_size = (data.len() * 8) as u32;
    let matrix_size = 16
        + 8
        + dims_size
        + padding(dims_size) as u32
        + 8
        + name_size
        + padding(name_size) as u32
        + 8
        + real_size;

    write_tag(&mut w, MI_MATRIX, matrix_size)?;

    write_tag(&mut w, MI_UINT32, 8)?;
    w.write_all(&MX_DOUBLE_CLASS.to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;

    write_tag(&mut w, MI_INT32, dims_size)?;
    for &d in dims {
        w.write_all(&(d as i32).to_le_bytes())?;
    }
    w.write_all(&vec![0u8; padding(dims_size)])?;

    write_tag(&mut w, MI_INT8, name_size)?;
    w.write_all(var_name.as_bytes())?;
    w.write_all(&vec![0u8; padding(name_size)])?;

    write_tag(&mut w, MI_DOUBLE, real_size)?;
    for &val in data {
        w.write_all(&val.to_le_bytes())?;
    }

    w.flush()?;
    Ok(())
}

/// Convert velocity field to slowness (element-wise 1/v).
pub fn velocity_to_slowness(velocity: &Array3<f64>) -> Result<Array3<f64>> {
    if let Some((index, &value)) = velocity
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v <= 0.0)
    {
        return Err(EikonalError::InvalidVelocity { index, value });
    }
    Ok(velocity.mapv(|v| 1.0 / v))
}

/// Save a field, inferring the format from the extension. MAT files store
/// it under `var_name`.
pub fn save_field(field: &Array3<f64>, path: &Path, var_name: &str) -> Result<()> {
    match infer_format(path)? {
        FileFormat::Npy => save_npy(field, path),
        FileFormat::Mat => save_mat(field, path, var_name),
    }
}

/// Load a slowness field, inferring the format from the extension.
pub fn load_slowness(path: &Path, expected_shape: [usize; NDIM]) -> Result<Array3<f64>> {
    match infer_format(path)? {
        FileFormat::Npy => load_npy_field(path, expected_shape),
        FileFormat::Mat => load_mat_field(path, "slowness", expected_shape),
    }
}

/// Load a velocity field and convert it to slowness.
pub fn load_velocity_as_slowness(
    path: &Path,
    expected_shape: [usize; NDIM],
) -> Result<Array3<f64>> {
    let velocity = match infer_format(path)? {
        FileFormat::Npy => load_npy_field(path, expected_shape)?,
        FileFormat::Mat => load_mat_field(path, "velocity", expected_shape)?,
    };
    velocity_to_slowness(&velocity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Array3<f64> {
        Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f64)
    }

    #[test]
    fn npy_roundtrip() {
        let field = ramp();
        let tmp = std::env::temp_dir().join("eikonal_sweep_test_roundtrip.npy");
        save_npy(&field, &tmp).unwrap();
        let loaded = load_npy_field(&tmp, [2, 3, 4]).unwrap();
        assert_eq!(loaded, field);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn npy_shape_mismatch() {
        let tmp = std::env::temp_dir().join("eikonal_sweep_test_shape_mismatch.npy");
        save_npy(&ramp(), &tmp).unwrap();
        let result = load_npy_field(&tmp, [4, 3, 2]);
        assert!(matches!(result, Err(EikonalError::ShapeMismatch { .. })));
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn npy_f32_promoted() {
        let tmp = std::env::temp_dir().join("eikonal_sweep_test_f32.npy");
        let field32 = Array3::<f32>::from_elem((1, 2, 2), 0.5);
        ndarray_npy::write_npy(&tmp, &field32).unwrap();
        let loaded = load_npy_field(&tmp, [1, 2, 2]).unwrap();
        assert!(loaded.iter().all(|&v| v == 0.5));
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_roundtrip_preserves_layout() {
        let field = ramp();
        let tmp = std::env::temp_dir().join("eikonal_sweep_test_roundtrip.mat");
        save_mat(&field, &tmp, "traveltime").unwrap();

        let file = std::fs::File::open(&tmp).unwrap();
        let mut reader = std::io::BufReader::new(file);
        let mat = matfile::MatFile::parse(&mut reader).unwrap();
        let arr = mat.find_by_name("traveltime").unwrap();
        assert_eq!(arr.size().to_vec(), vec![2, 3, 4]);

        let loaded = load_mat_field(&tmp, "traveltime", [2, 3, 4]).unwrap();
        assert_eq!(loaded, field);
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn mat_missing_variable() {
        let tmp = std::env::temp_dir().join("eikonal_sweep_test_missing_var.mat");
        save_mat(&ramp(), &tmp, "velocity").unwrap();
        let result = load_mat_field(&tmp, "slowness", [2, 3, 4]);
        assert!(matches!(
            result,
            Err(EikonalError::MatVariableNotFound { .. })
        ));
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn velocity_to_slowness_valid() {
        let vel = Array3::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 4.0, 0.5]).unwrap();
        let slow = velocity_to_slowness(&vel).unwrap();
        assert_eq!(slow.into_raw_vec(), vec![1.0, 0.5, 0.25, 2.0]);
    }

    #[test]
    fn velocity_to_slowness_invalid() {
        let vel = Array3::from_shape_vec((1, 1, 3), vec![1.0, 0.0, 2.0]).unwrap();
        assert!(matches!(
            velocity_to_slowness(&vel),
            Err(EikonalError::InvalidVelocity { index: 1, .. })
        ));
        let vel = Array3::from_shape_vec((1, 1, 3), vec![1.0, 2.0, f64::NAN]).unwrap();
        assert!(matches!(
            velocity_to_slowness(&vel),
            Err(EikonalError::InvalidVelocity { index: 2, .. })
        ));
    }

    #[test]
    fn unsupported_format() {
        assert!(matches!(
            infer_format(Path::new("field.xyz")),
            Err(EikonalError::UnsupportedFileFormat(_))
        ));
        assert!(matches!(
            infer_format(Path::new("field")),
            Err(EikonalError::UnsupportedFileFormat(_))
        ));
        assert_eq!(infer_format(Path::new("a.mat")).unwrap(), FileFormat::Mat);
    }
}
