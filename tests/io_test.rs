use camera_pose_ar::camera_model::io::{
    load_camera_params, save_camera_params, CAMERA_MATRIX_LABEL, DISTORTION_LABEL,
};
use camera_pose_ar::camera_model::CameraModel;
use camera_pose_ar::io::{append_param_row, read_param_rows, write_param_rows, ParamRow};
use nalgebra as na;
use tempfile::TempDir;

#[test]
fn test_param_rows_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rows.csv");

    let rows = vec![
        ParamRow {
            label: "a".to_string(),
            values: vec![1.0, 2.5, -3.25],
        },
        ParamRow {
            label: "b".to_string(),
            values: vec![0.125],
        },
    ];
    write_param_rows(&path, &rows).unwrap();
    let back = read_param_rows(&path).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn test_append_param_row() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rows.csv");

    append_param_row(&path, "first", &[1.0, 2.0]).unwrap();
    append_param_row(&path, "second", &[3.0]).unwrap();

    let back = read_param_rows(&path).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[0].label, "first");
    assert_eq!(back[1].values, vec![3.0]);
}

#[test]
fn test_read_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let rows = read_param_rows(&dir.path().join("nope.csv")).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_camera_model_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("iparams.csv");

    let kmtx = na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
    let dist = na::dvector![0.1, -0.05, 0.0, 0.0, 0.0];
    let camera = CameraModel::calibrated(kmtx, dist.clone(), (640, 480));

    save_camera_params(&path, &camera).unwrap();
    let loaded = load_camera_params(&path, (640, 480)).unwrap().unwrap();

    assert!(loaded.is_calibrated());
    assert!((loaded.intrinsics() - kmtx).norm() < 1e-12);
    assert_eq!(loaded.distortion().len(), dist.len());
    assert!((loaded.distortion() - &dist).norm() < 1e-12);
}

#[test]
fn test_load_from_missing_file_keeps_uncalibrated() {
    let dir = TempDir::new().unwrap();
    let loaded = load_camera_params(&dir.path().join("nope.csv"), (640, 480)).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_load_rejects_truncated_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("iparams.csv");

    // Only one of the two required rows.
    append_param_row(
        &path,
        CAMERA_MATRIX_LABEL,
        &[500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0],
    )
    .unwrap();
    assert!(load_camera_params(&path, (640, 480)).unwrap().is_none());
}

#[test]
fn test_load_rejects_wrong_matrix_arity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("iparams.csv");

    append_param_row(&path, CAMERA_MATRIX_LABEL, &[1.0, 2.0, 3.0]).unwrap();
    append_param_row(&path, DISTORTION_LABEL, &[0.0, 0.0]).unwrap();
    assert!(load_camera_params(&path, (640, 480)).unwrap().is_none());
}

#[test]
fn test_load_rejects_oversized_distortion() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("iparams.csv");

    append_param_row(
        &path,
        CAMERA_MATRIX_LABEL,
        &[500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0],
    )
    .unwrap();
    append_param_row(&path, DISTORTION_LABEL, &vec![0.0; 15]).unwrap();
    assert!(load_camera_params(&path, (640, 480)).unwrap().is_none());
}
