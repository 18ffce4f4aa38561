use camera_pose_ar::camera_model::CameraModel;
use camera_pose_ar::detected_points::FrameFeature;
use camera_pose_ar::board::Board;
use camera_pose_ar::projection::{project_points, reprojection_rms};
use camera_pose_ar::types::RvecTvec;
use nalgebra as na;

fn test_camera(dist: na::DVector<f64>) -> CameraModel {
    let kmtx = na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
    CameraModel::calibrated(kmtx, dist, (640, 480))
}

fn identity_pose_at(z: f64) -> RvecTvec {
    RvecTvec::from_vec3(na::Vector3::zeros(), na::Vector3::new(0.0, 0.0, z))
}

#[test]
fn test_on_axis_point_hits_principal_point() {
    let camera = test_camera(na::DVector::zeros(5));
    let p2ds = project_points(&[glam::Vec3::ZERO], &identity_pose_at(1.0), &camera);
    assert!((p2ds[0].x - 320.0).abs() < 1e-4);
    assert!((p2ds[0].y - 240.0).abs() < 1e-4);
}

#[test]
fn test_known_off_axis_projection() {
    let camera = test_camera(na::DVector::zeros(5));
    // x/z = 0.5 -> u = fx * 0.5 + cx.
    let p2ds = project_points(
        &[glam::Vec3::new(1.0, 0.0, 0.0)],
        &identity_pose_at(2.0),
        &camera,
    );
    assert!((p2ds[0].x - (500.0 * 0.5 + 320.0)).abs() < 1e-3);
    assert!((p2ds[0].y - 240.0).abs() < 1e-3);
}

#[test]
fn test_projection_preserves_order() {
    let camera = test_camera(na::DVector::zeros(5));
    let p3ds = vec![
        glam::Vec3::new(-1.0, 0.0, 0.0),
        glam::Vec3::new(0.0, 0.0, 0.0),
        glam::Vec3::new(1.0, 0.0, 0.0),
    ];
    let p2ds = project_points(&p3ds, &identity_pose_at(5.0), &camera);
    assert_eq!(p2ds.len(), 3);
    assert!(p2ds[0].x < p2ds[1].x && p2ds[1].x < p2ds[2].x);
}

#[test]
fn test_barrel_distortion_pulls_points_inward() {
    let no_dist = test_camera(na::DVector::zeros(5));
    let barrel = test_camera(na::dvector![-0.2, 0.0, 0.0, 0.0, 0.0]);

    let p3ds = vec![glam::Vec3::new(2.0, 1.0, 0.0)];
    let pose = identity_pose_at(5.0);
    let clean = project_points(&p3ds, &pose, &no_dist)[0];
    let warped = project_points(&p3ds, &pose, &barrel)[0];

    let center = glam::Vec2::new(320.0, 240.0);
    assert!(
        (warped - center).length() < (clean - center).length(),
        "negative k1 must shrink the projected radius"
    );
}

#[test]
fn test_tangential_terms_shift_projection() {
    let no_dist = test_camera(na::DVector::zeros(5));
    let tangential = test_camera(na::dvector![0.0, 0.0, 0.01, 0.0, 0.0]);

    let p3ds = vec![glam::Vec3::new(1.5, 1.0, 0.0)];
    let pose = identity_pose_at(4.0);
    let clean = project_points(&p3ds, &pose, &no_dist)[0];
    let shifted = project_points(&p3ds, &pose, &tangential)[0];
    assert!((shifted - clean).length() > 0.1);
}

#[test]
fn test_rms_zero_for_perfect_observations() {
    let camera = test_camera(na::dvector![-0.05, 0.01, 0.0, 0.0, 0.0]);
    let board = Board::new(5, 4, 1.0);
    let pose = RvecTvec::from_vec3(
        na::Vector3::new(0.1, -0.1, 0.0),
        na::Vector3::new(-1.0, 2.0, 10.0),
    );
    let p2ds = project_points(&board.points, &pose, &camera);
    let view = FrameFeature::from_detection(0, (640, 480), p2ds, &board);

    let rms = reprojection_rms(&[view], &[pose], &camera);
    assert!(rms < 1e-9, "perfect observations must give zero rms, got {}", rms);
}

#[test]
fn test_rms_counts_known_offset() {
    let camera = test_camera(na::DVector::zeros(5));
    let board = Board::new(2, 2, 1.0);
    let pose = identity_pose_at(10.0);

    let mut p2ds = project_points(&board.points, &pose, &camera);
    for p in &mut p2ds {
        p.x += 1.0; // uniform 1px offset
    }
    let view = FrameFeature::from_detection(0, (640, 480), p2ds, &board);
    let rms = reprojection_rms(&[view], &[pose], &camera);
    assert!((rms - 1.0).abs() < 1e-6, "expected 1px rms, got {}", rms);
}
