use camera_pose_ar::board::Board;
use camera_pose_ar::camera_model::CameraModel;
use camera_pose_ar::detected_points::FrameFeature;
use camera_pose_ar::optimization::calibrate::{calibrate_camera, CalibrationOptions};
use camera_pose_ar::projection::project_points;
use camera_pose_ar::types::RvecTvec;
use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const IMG_W: u32 = 640;
const IMG_H: u32 = 480;

fn ground_truth_camera(dist: na::DVector<f64>) -> CameraModel {
    let kmtx = na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
    CameraModel::calibrated(kmtx, dist, (IMG_W, IMG_H))
}

/// Five distinct poses that keep the board in front of the camera with
/// enough tilt diversity for a well-conditioned solve.
fn synthetic_poses() -> Vec<RvecTvec> {
    [
        (0.10, 0.20, 0.05, 20.0),
        (-0.20, 0.10, -0.10, 22.0),
        (0.15, -0.15, 0.10, 18.0),
        (-0.10, -0.25, 0.20, 25.0),
        (0.25, 0.10, -0.05, 21.0),
    ]
    .iter()
    .map(|&(rx, ry, rz, z)| {
        RvecTvec::from_vec3(
            na::Vector3::new(rx, ry, rz),
            na::Vector3::new(-2.5, 4.0, z),
        )
    })
    .collect()
}

fn gaussian(rng: &mut impl Rng, sigma: f64) -> f64 {
    let u1: f64 = rng.random_range(1e-12..1.0);
    let u2: f64 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * sigma
}

fn synthetic_views(
    camera: &CameraModel,
    board: &Board,
    noise_sigma: f64,
    seed: u64,
) -> Vec<FrameFeature> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    synthetic_poses()
        .iter()
        .enumerate()
        .map(|(i, pose)| {
            let mut p2ds = project_points(&board.points, pose, camera);
            if noise_sigma > 0.0 {
                for p in &mut p2ds {
                    p.x += gaussian(&mut rng, noise_sigma) as f32;
                    p.y += gaussian(&mut rng, noise_sigma) as f32;
                }
            }
            FrameFeature::from_detection(i as i64, (IMG_W, IMG_H), p2ds, board)
        })
        .collect()
}

fn assert_intrinsics_close(k_est: &na::Matrix3<f64>, k_gt: &na::Matrix3<f64>, rel_tol: f64) {
    for (label, idx) in [("fx", (0, 0)), ("fy", (1, 1)), ("cx", (0, 2)), ("cy", (1, 2))] {
        let est = k_est[idx];
        let gt = k_gt[idx];
        assert!(
            (est - gt).abs() / gt < rel_tol,
            "{} off by more than {:.1}%: {} vs {}",
            label,
            rel_tol * 100.0,
            est,
            gt
        );
    }
}

#[test]
fn test_noise_free_calibration_recovers_ground_truth() {
    let camera_gt = ground_truth_camera(na::DVector::zeros(5));
    let board = Board::new(9, 6, 1.0);
    let views = synthetic_views(&camera_gt, &board, 0.0, 0);

    let initial = CameraModel::uncalibrated(IMG_W, IMG_H);
    let result = calibrate_camera(&views, &initial, &CalibrationOptions::default())
        .expect("solve failed");

    assert_intrinsics_close(&result.intrinsics, camera_gt.intrinsics(), 0.005);
    assert!(
        result.rms_error < 0.05,
        "noise-free rms should be near zero, got {}",
        result.rms_error
    );
    assert_eq!(result.view_poses.len(), views.len());

    // Per-view extrinsics come back too.
    for (pose, gt) in result.view_poses.iter().zip(synthetic_poses().iter()) {
        assert!((pose.tvec() - gt.tvec()).norm() < 0.1);
    }
}

#[test]
fn test_noise_free_calibration_with_distortion() {
    let dist_gt = na::dvector![-0.05, 0.01, 0.0, 0.0, 0.0];
    let camera_gt = ground_truth_camera(dist_gt.clone());
    let board = Board::new(9, 6, 1.0);
    let views = synthetic_views(&camera_gt, &board, 0.0, 0);

    let initial = CameraModel::uncalibrated(IMG_W, IMG_H);
    let result = calibrate_camera(&views, &initial, &CalibrationOptions::default())
        .expect("solve failed");

    assert_intrinsics_close(&result.intrinsics, camera_gt.intrinsics(), 0.01);
    assert!(
        (result.distortion[0] - dist_gt[0]).abs() < 0.01,
        "k1 not recovered: {}",
        result.distortion[0]
    );
    assert!(result.rms_error < 0.05);
}

#[test]
fn test_noisy_calibration_stays_close() {
    // sigma = 0.2 px pixel noise, the interactive workflow's nominal level.
    let camera_gt = ground_truth_camera(na::DVector::zeros(5));
    let board = Board::new(9, 6, 1.0);
    let views = synthetic_views(&camera_gt, &board, 0.2, 7);

    let initial = CameraModel::uncalibrated(IMG_W, IMG_H);
    let result = calibrate_camera(&views, &initial, &CalibrationOptions::default())
        .expect("solve failed");

    assert_intrinsics_close(&result.intrinsics, camera_gt.intrinsics(), 0.02);
    assert!(
        result.rms_error < 1.0,
        "rms should stay under a pixel, got {}",
        result.rms_error
    );
}

#[test]
fn test_recalibration_uses_full_dataset_and_overwrites() {
    let camera_gt = ground_truth_camera(na::DVector::zeros(5));
    let board = Board::new(9, 6, 1.0);
    let views = synthetic_views(&camera_gt, &board, 0.0, 0);

    let mut camera = CameraModel::uncalibrated(IMG_W, IMG_H);
    let first = calibrate_camera(&views, &camera, &CalibrationOptions::default()).unwrap();
    camera.update_from(&first);
    assert!(camera.is_calibrated());

    // Second solve seeds from the calibrated model and must stay consistent.
    let second = calibrate_camera(&views, &camera, &CalibrationOptions::default()).unwrap();
    camera.update_from(&second);
    assert_intrinsics_close(&second.intrinsics, camera_gt.intrinsics(), 0.005);
    assert!(camera.is_calibrated());
}

#[test]
fn test_fixed_aspect_ratio_ties_focals() {
    let camera_gt = ground_truth_camera(na::DVector::zeros(5));
    let board = Board::new(9, 6, 1.0);
    let views = synthetic_views(&camera_gt, &board, 0.2, 11);

    let initial = CameraModel::uncalibrated(IMG_W, IMG_H);
    let opts = CalibrationOptions {
        fix_aspect_ratio: true,
    };
    let result = calibrate_camera(&views, &initial, &opts).expect("solve failed");

    // The uncalibrated default has ratio 1, so fx == fy exactly.
    assert!(
        (result.intrinsics[(0, 0)] - result.intrinsics[(1, 1)]).abs() < 1e-9,
        "fixed aspect ratio must tie the focal lengths"
    );
}

#[test]
fn test_calibrate_rejects_empty_input() {
    let initial = CameraModel::uncalibrated(IMG_W, IMG_H);
    assert!(calibrate_camera(&[], &initial, &CalibrationOptions::default()).is_none());
}
