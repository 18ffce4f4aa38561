pub mod io;
pub mod pinhole;

pub use pinhole::{distort_normalized, project_point, BrownConradyPinhole, MAX_ACTIVE_DIST};

use nalgebra as na;

use crate::optimization::calibrate::CalibrationResult;

/// Whether the model has ever been populated by a solve or a load.
/// Pose estimation is only attempted once calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Uncalibrated,
    Calibrated,
}

/// Intrinsic matrix + distortion coefficients + calibration state.
///
/// Mutated only by [`CameraModel::update_from`] (solver success) or by the
/// loader in [`io`]; readers always see a matched matrix/distortion pair.
#[derive(Debug, Clone)]
pub struct CameraModel {
    intrinsics: na::Matrix3<f64>,
    distortion: na::DVector<f64>,
    state: CalibrationState,
    img_w_h: (u32, u32),
}

impl CameraModel {
    /// Identity-like default before any calibration: unit focal lengths and
    /// the principal point at the frame center.
    pub fn uncalibrated(width: u32, height: u32) -> CameraModel {
        let mut k = na::Matrix3::identity();
        k[(0, 2)] = width as f64 / 2.0;
        k[(1, 2)] = height as f64 / 2.0;
        CameraModel {
            intrinsics: k,
            distortion: na::DVector::zeros(0),
            state: CalibrationState::Uncalibrated,
            img_w_h: (width, height),
        }
    }

    pub fn calibrated(
        intrinsics: na::Matrix3<f64>,
        distortion: na::DVector<f64>,
        img_w_h: (u32, u32),
    ) -> CameraModel {
        debug_assert!(
            intrinsics[(0, 0)] > 0.0 && intrinsics[(1, 1)] > 0.0,
            "calibrated model must have positive focal lengths"
        );
        CameraModel {
            intrinsics,
            distortion,
            state: CalibrationState::Calibrated,
            img_w_h,
        }
    }

    pub fn intrinsics(&self) -> &na::Matrix3<f64> {
        &self.intrinsics
    }

    pub fn distortion(&self) -> &na::DVector<f64> {
        &self.distortion
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_calibrated(&self) -> bool {
        self.state == CalibrationState::Calibrated
    }

    pub fn img_w_h(&self) -> (u32, u32) {
        self.img_w_h
    }

    /// fy / fx of the current matrix; ties the focal lengths during a
    /// fixed-aspect-ratio solve.
    pub fn aspect_ratio(&self) -> f64 {
        self.intrinsics[(1, 1)] / self.intrinsics[(0, 0)]
    }

    /// Replace intrinsics and distortion from a successful solve and mark
    /// the model calibrated. Never called with a partial result.
    pub fn update_from(&mut self, result: &CalibrationResult) {
        debug_assert!(
            result.intrinsics[(0, 0)] > 0.0 && result.intrinsics[(1, 1)] > 0.0,
            "solver produced non-positive focal lengths"
        );
        self.intrinsics = result.intrinsics;
        self.distortion = result.distortion.clone();
        self.state = CalibrationState::Calibrated;
    }

    /// Projection-ready view of the current parameters.
    pub fn pinhole(&self) -> BrownConradyPinhole<f64> {
        let mut params = Vec::with_capacity(4 + self.distortion.len());
        params.push(self.intrinsics[(0, 0)]);
        params.push(self.intrinsics[(1, 1)]);
        params.push(self.intrinsics[(0, 2)]);
        params.push(self.intrinsics[(1, 2)]);
        params.extend(self.distortion.iter());
        BrownConradyPinhole::new(
            &na::DVector::from_vec(params),
            self.img_w_h.0,
            self.img_w_h.1,
        )
    }
}
