use camera_pose_ar::board::{board_grid, Board};
use camera_pose_ar::camera_model::CameraModel;
use camera_pose_ar::detected_points::FrameFeature;
use camera_pose_ar::optimization::linear::solve_pnp;
use camera_pose_ar::projection::project_points;
use camera_pose_ar::types::RvecTvec;
use nalgebra as na;

fn test_camera(dist: na::DVector<f64>) -> CameraModel {
    let kmtx = na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
    CameraModel::calibrated(kmtx, dist, (640, 480))
}

fn observed_view(camera: &CameraModel, pose: &RvecTvec, board: &Board) -> FrameFeature {
    let p2ds = project_points(&board.points, pose, camera);
    FrameFeature::from_detection(0, camera.img_w_h(), p2ds, board)
}

fn assert_pose_close(estimated: &RvecTvec, expected: &RvecTvec, tol: f64) {
    assert!(
        (estimated.tvec() - expected.tvec()).norm() < tol,
        "translation error: {} vs {}",
        estimated.tvec(),
        expected.tvec()
    );
    let r_est = na::Rotation3::from_scaled_axis(*estimated.rvec());
    let r_gt = na::Rotation3::from_scaled_axis(*expected.rvec());
    let r_diff = r_est.matrix().transpose() * r_gt.matrix();
    let angle = ((r_diff.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos();
    assert!(angle < tol, "rotation error too large: {}", angle);
}

#[test]
fn test_pnp_round_trip_no_distortion() {
    let camera = test_camera(na::DVector::zeros(5));
    let board = Board::new(4, 3, 1.0);
    let pose_gt = RvecTvec::from_vec3(
        na::Vector3::new(0.1, -0.2, 0.05),
        na::Vector3::new(-1.0, 1.5, 12.0),
    );

    let frame = observed_view(&camera, &pose_gt, &board);
    let pose = solve_pnp(&frame, &camera).expect("pnp failed");
    assert_pose_close(&pose, &pose_gt, 1e-3);
}

#[test]
fn test_pnp_round_trip_with_distortion() {
    let camera = test_camera(na::dvector![-0.1, 0.02, 0.001, -0.001, 0.0]);
    let board = Board::new(6, 4, 1.0);
    let pose_gt = RvecTvec::from_vec3(
        na::Vector3::new(-0.15, 0.1, 0.2),
        na::Vector3::new(-1.5, 2.0, 15.0),
    );

    let frame = observed_view(&camera, &pose_gt, &board);
    let pose = solve_pnp(&frame, &camera).expect("pnp failed");
    // The iterative undistortion bounds accuracy here.
    assert_pose_close(&pose, &pose_gt, 1e-2);
}

#[test]
fn test_pnp_each_frame_is_independent() {
    let camera = test_camera(na::DVector::zeros(5));
    let board = Board::new(4, 3, 1.0);
    let pose_a = RvecTvec::from_vec3(
        na::Vector3::new(0.2, 0.0, 0.0),
        na::Vector3::new(0.0, 1.0, 10.0),
    );
    let pose_b = RvecTvec::from_vec3(
        na::Vector3::new(0.0, -0.25, 0.1),
        na::Vector3::new(-2.0, 0.5, 20.0),
    );

    // Same estimator, two frames, no carried state.
    let frame_a = observed_view(&camera, &pose_a, &board);
    let frame_b = observed_view(&camera, &pose_b, &board);
    let est_a = solve_pnp(&frame_a, &camera).unwrap();
    let est_b = solve_pnp(&frame_b, &camera).unwrap();
    let est_a2 = solve_pnp(&frame_a, &camera).unwrap();

    assert_pose_close(&est_a, &pose_a, 1e-3);
    assert_pose_close(&est_b, &pose_b, 1e-3);
    assert_pose_close(&est_a2, &est_a, 1e-12);
}

#[test]
fn test_pnp_rejects_tiny_point_sets() {
    let camera = test_camera(na::DVector::zeros(5));
    let board = Board::new(1, 3, 1.0);
    let pose = RvecTvec::from_vec3(na::Vector3::zeros(), na::Vector3::new(0.0, 0.0, 5.0));
    let frame = observed_view(&camera, &pose, &board);
    assert!(solve_pnp(&frame, &camera).is_none());
}
