use nalgebra as na;

/// Single-view extrinsics: axis-angle rotation and translation mapping
/// board coordinates into the camera frame. Valid only for the frame it
/// was estimated from.
#[derive(Debug, Clone)]
pub struct RvecTvec {
    rvec: na::Vector3<f64>,
    tvec: na::Vector3<f64>,
}

impl RvecTvec {
    pub fn new(rvec: &na::DVector<f64>, tvec: &na::DVector<f64>) -> RvecTvec {
        RvecTvec {
            rvec: na::Vector3::new(rvec[0], rvec[1], rvec[2]),
            tvec: na::Vector3::new(tvec[0], tvec[1], tvec[2]),
        }
    }

    pub fn from_vec3(rvec: na::Vector3<f64>, tvec: na::Vector3<f64>) -> RvecTvec {
        RvecTvec { rvec, tvec }
    }

    pub fn rvec(&self) -> &na::Vector3<f64> {
        &self.rvec
    }

    pub fn tvec(&self) -> &na::Vector3<f64> {
        &self.tvec
    }

    pub fn na_rvec(&self) -> na::DVector<f64> {
        na::dvector![self.rvec.x, self.rvec.y, self.rvec.z]
    }

    pub fn na_tvec(&self) -> na::DVector<f64> {
        na::dvector![self.tvec.x, self.tvec.y, self.tvec.z]
    }

    pub fn to_na_isometry3(&self) -> na::Isometry3<f64> {
        na::Isometry3::new(self.tvec, self.rvec)
    }
}

pub trait ToRvecTvec {
    fn to_rvec_tvec(&self) -> RvecTvec;
}

impl ToRvecTvec for na::Isometry3<f64> {
    fn to_rvec_tvec(&self) -> RvecTvec {
        RvecTvec {
            rvec: self.rotation.scaled_axis(),
            tvec: self.translation.vector,
        }
    }
}
