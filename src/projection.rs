use nalgebra as na;
use rayon::prelude::*;

use crate::camera_model::CameraModel;
use crate::detected_points::FrameFeature;
use crate::types::RvecTvec;

/// Project board-frame 3D points into pixel coordinates through the full
/// camera model (rigid transform, distortion, intrinsics). Order-preserving
/// and unfiltered: overlay vertices may land outside the frame.
pub fn project_points(
    p3ds: &[glam::Vec3],
    rtvec: &RvecTvec,
    camera: &CameraModel,
) -> Vec<glam::Vec2> {
    let pinhole = camera.pinhole();
    let transform = rtvec.to_na_isometry3();
    p3ds.iter()
        .map(|p| {
            let p_cam =
                transform * na::Point3::new(p.x as f64, p.y as f64, p.z as f64);
            let uv = pinhole.project_one(&p_cam.coords);
            glam::Vec2::new(uv.x as f32, uv.y as f32)
        })
        .collect()
}

/// Root-mean-square pixel distance between observations and the model's
/// predictions over every point of every view. The solver's quality
/// signal; diagnostic only, never a gate.
pub fn reprojection_rms(
    views: &[FrameFeature],
    poses: &[RvecTvec],
    camera: &CameraModel,
) -> f64 {
    assert_eq!(views.len(), poses.len(), "one pose per view");
    let (sum_sq, count) = views
        .par_iter()
        .zip(poses.par_iter())
        .map(|(view, pose)| {
            let projected = project_points(&view.p3ds(), pose, camera);
            let sq: f64 = view
                .features
                .iter()
                .zip(projected.iter())
                .map(|(f, p)| {
                    let dx = (f.p2d.x - p.x) as f64;
                    let dy = (f.p2d.y - p.y) as f64;
                    dx * dx + dy * dy
                })
                .sum();
            (sq, view.len())
        })
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt()
}
