use std::collections::HashMap;

use log::{debug, info, warn};
use nalgebra as na;
use tiny_solver::Optimizer;

use super::factors::PlanarReprojectionFactor;
use super::homography::dlt_homography;
use super::linear::{estimate_intrinsics_from_homographies, pose_from_homography};
use crate::camera_model::CameraModel;
use crate::detected_points::FrameFeature;
use crate::projection::reprojection_rms;
use crate::types::RvecTvec;

/// Distortion terms the solver estimates: k1 k2 p1 p2 k3.
pub const SOLVED_DIST_TERMS: usize = 5;

#[derive(Debug, Clone)]
pub struct CalibrationOptions {
    /// Tie fy to fx by the ratio of the initial matrix. One parameter
    /// less, and a better-conditioned solve with few views.
    pub fix_aspect_ratio: bool,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            fix_aspect_ratio: true,
        }
    }
}

/// Output of a full calibration solve. Always a best-effort result; fit
/// quality is reported through `rms_error`, never used to reject.
#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub intrinsics: na::Matrix3<f64>,
    pub distortion: na::DVector<f64>,
    pub view_poses: Vec<RvecTvec>,
    pub rms_error: f64,
}

fn board_plane_points(view: &FrameFeature) -> Vec<glam::Vec2> {
    view.features
        .iter()
        .map(|f| glam::Vec2::new(f.p3d.x, f.p3d.y))
        .collect()
}

/// Seed focal lengths and principal point for the joint refinement.
fn seed_intrinsics(
    homographies: &[na::Matrix3<f64>],
    initial: &CameraModel,
) -> na::Matrix3<f64> {
    if initial.is_calibrated() {
        return *initial.intrinsics();
    }
    if let Some(kmtx) = estimate_intrinsics_from_homographies(homographies) {
        return kmtx;
    }
    // Rough field-of-view guess around the frame center; only reached when
    // the view geometry defeats the closed-form estimate.
    debug!("falling back to a heuristic intrinsics seed");
    let (w, h) = initial.img_w_h();
    let f = w.max(h) as f64 * 1.2;
    let mut kmtx = na::Matrix3::identity();
    kmtx[(0, 0)] = f;
    kmtx[(1, 1)] = f;
    kmtx[(0, 2)] = w as f64 / 2.0;
    kmtx[(1, 2)] = h as f64 / 2.0;
    kmtx
}

/// Jointly refine intrinsics, distortion, and one pose per accumulated
/// view, minimizing squared pixel reprojection error over the whole
/// dataset.
///
/// The solve is seeded from the current model (or Zhang's closed-form
/// estimate when uncalibrated), iterates with tiny-solver over all
/// parameters, and reports the achieved RMS. Every invocation consumes the
/// full set of views; callers overwrite their model with the result
/// unconditionally.
pub fn calibrate_camera(
    views: &[FrameFeature],
    initial: &CameraModel,
    opts: &CalibrationOptions,
) -> Option<CalibrationResult> {
    if views.is_empty() {
        debug!("no views to calibrate from");
        return None;
    }
    for (i, view) in views.iter().enumerate() {
        if view.len() < 4 {
            debug!("view {} has too few points ({})", i, view.len());
            return None;
        }
    }

    let homographies: Vec<na::Matrix3<f64>> = views
        .iter()
        .map(|v| dlt_homography(&board_plane_points(v), &v.p2ds()))
        .collect::<Option<Vec<_>>>()?;

    let kmtx0 = seed_intrinsics(&homographies, initial);
    let aspect_ratio = if opts.fix_aspect_ratio {
        Some(initial.aspect_ratio())
    } else {
        None
    };

    let mut problem = tiny_solver::Problem::new();
    let mut initial_values = HashMap::<String, na::DVector<f64>>::new();

    let cam0 = match aspect_ratio {
        // Single focal parameter; fy stays at f * ratio inside the factor.
        Some(ratio) => na::dvector![
            (kmtx0[(0, 0)] + kmtx0[(1, 1)] / ratio) / 2.0,
            kmtx0[(0, 2)],
            kmtx0[(1, 2)]
        ],
        None => na::dvector![
            kmtx0[(0, 0)],
            kmtx0[(1, 1)],
            kmtx0[(0, 2)],
            kmtx0[(1, 2)]
        ],
    };
    let cam_len = cam0.len();
    initial_values.insert("cam".to_string(), cam0);

    let mut dist0 = na::DVector::zeros(SOLVED_DIST_TERMS);
    for (i, v) in initial
        .distortion()
        .iter()
        .take(SOLVED_DIST_TERMS)
        .enumerate()
    {
        dist0[i] = *v;
    }
    initial_values.insert("dist".to_string(), dist0);

    for (i, (view, hmtx)) in views.iter().zip(homographies.iter()).enumerate() {
        let pose0 = pose_from_homography(&kmtx0, hmtx)?;
        initial_values.insert(format!("rvec{}", i), pose0.na_rvec());
        initial_values.insert(format!("tvec{}", i), pose0.na_tvec());

        for feature in &view.features {
            let factor = PlanarReprojectionFactor::new(
                &feature.p3d,
                &feature.p2d,
                aspect_ratio,
            );
            problem.add_residual_block(
                2,
                vec![
                    ("cam".to_string(), cam_len),
                    ("dist".to_string(), SOLVED_DIST_TERMS),
                    (format!("rvec{}", i), 3),
                    (format!("tvec{}", i), 3),
                ],
                Box::new(factor),
                None,
            );
        }
    }

    let optimizer = tiny_solver::GaussNewtonOptimizer {};
    let result = optimizer.optimize(&problem, &initial_values, None);

    let cam = result.get("cam")?;
    let dist = result.get("dist")?;
    let (fx, fy, cx, cy) = match aspect_ratio {
        Some(ratio) => (cam[0], cam[0] * ratio, cam[1], cam[2]),
        None => (cam[0], cam[1], cam[2], cam[3]),
    };
    if fx <= 0.0 || fy <= 0.0 {
        warn!("solve produced non-positive focal lengths, discarding");
        return None;
    }
    let intrinsics = na::Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0);
    let distortion = dist.clone();

    let mut view_poses = Vec::with_capacity(views.len());
    for i in 0..views.len() {
        let rvec = result.get(&format!("rvec{}", i))?;
        let tvec = result.get(&format!("tvec{}", i))?;
        view_poses.push(RvecTvec::new(rvec, tvec));
    }

    let solved = CameraModel::calibrated(intrinsics, distortion.clone(), initial.img_w_h());
    let rms_error = reprojection_rms(views, &view_poses, &solved);
    info!(
        "calibrated over {} views: fx={:.2} fy={:.2} cx={:.2} cy={:.2} rms={:.4}px",
        views.len(),
        fx,
        fy,
        cx,
        cy,
        rms_error
    );
    if rms_error > 1.0 {
        warn!("high reprojection error after solve: {:.3}px", rms_error);
    }

    Some(CalibrationResult {
        intrinsics,
        distortion,
        view_poses,
        rms_error,
    })
}
