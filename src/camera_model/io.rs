use std::path::Path;

use log::{info, warn};
use nalgebra as na;

use super::CameraModel;
use crate::io::{read_param_rows, write_param_rows, ParamRow};

pub const CAMERA_MATRIX_LABEL: &str = "camera_matrix";
pub const DISTORTION_LABEL: &str = "distortion_coefficients";

/// Storage reservation bound for distortion coefficients.
pub const MAX_STORED_DIST: usize = 14;

/// Flatten the intrinsic matrix in row-major order for storage.
pub fn flatten_row_major(k: &na::Matrix3<f64>) -> Vec<f64> {
    let mut flat = Vec::with_capacity(9);
    for r in 0..3 {
        for c in 0..3 {
            flat.push(k[(r, c)]);
        }
    }
    flat
}

/// Reconstitute a calibrated model from the parameter store.
///
/// Requires both labeled rows with the right arities; on a missing file,
/// missing row, or arity mismatch the result is `Ok(None)` and the caller
/// keeps its current model. There is no partial update path.
pub fn load_camera_params(path: &Path, img_w_h: (u32, u32)) -> std::io::Result<Option<CameraModel>> {
    let rows = read_param_rows(path)?;
    let kmtx_row = rows.iter().find(|r| r.label == CAMERA_MATRIX_LABEL);
    let dist_row = rows.iter().find(|r| r.label == DISTORTION_LABEL);

    let (Some(kmtx_row), Some(dist_row)) = (kmtx_row, dist_row) else {
        if !rows.is_empty() {
            warn!("parameter store {:?} is missing a required row", path);
        }
        return Ok(None);
    };
    if kmtx_row.values.len() != 9 {
        warn!(
            "camera matrix row has {} values, expected 9",
            kmtx_row.values.len()
        );
        return Ok(None);
    }
    if dist_row.values.is_empty() || dist_row.values.len() > MAX_STORED_DIST {
        warn!(
            "distortion row has {} values, expected 1..={}",
            dist_row.values.len(),
            MAX_STORED_DIST
        );
        return Ok(None);
    }

    let kmtx = na::Matrix3::from_row_slice(&kmtx_row.values);
    if kmtx[(0, 0)] <= 0.0 || kmtx[(1, 1)] <= 0.0 {
        warn!("stored camera matrix has non-positive focal lengths");
        return Ok(None);
    }
    let dist = na::DVector::from_vec(dist_row.values.clone());
    info!("loaded camera parameters from {:?}", path);
    Ok(Some(CameraModel::calibrated(kmtx, dist, img_w_h)))
}

/// Persist the current model as the two labeled rows the loader expects.
/// The store is rewritten whole; earlier contents are replaced.
pub fn save_camera_params(path: &Path, camera: &CameraModel) -> std::io::Result<()> {
    let rows = vec![
        ParamRow {
            label: CAMERA_MATRIX_LABEL.to_string(),
            values: flatten_row_major(camera.intrinsics()),
        },
        ParamRow {
            label: DISTORTION_LABEL.to_string(),
            values: camera.distortion().iter().cloned().collect(),
        },
    ];
    write_param_rows(path, &rows)?;
    info!("wrote camera parameters to {:?}", path);
    Ok(())
}
