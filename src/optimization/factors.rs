use nalgebra as na;
use num_dual::DualDVec64;
use tiny_solver::factors::Factor;

use crate::camera_model::pinhole::project_point;

/// Reprojection residual of one board point in one view.
///
/// Parameter blocks: `[cam, dist, rvec, tvec]`. With `aspect_ratio` set the
/// cam block is `[f, cx, cy]` and fy is tied to `f * ratio`; otherwise it
/// is `[fx, fy, cx, cy]`.
#[derive(Clone)]
pub struct PlanarReprojectionFactor {
    pub p3d: na::Point3<DualDVec64>,
    pub p2d: na::Vector2<DualDVec64>,
    pub aspect_ratio: Option<DualDVec64>,
}

impl PlanarReprojectionFactor {
    pub fn new(
        p3d: &glam::Vec3,
        p2d: &glam::Vec2,
        aspect_ratio: Option<f64>,
    ) -> PlanarReprojectionFactor {
        PlanarReprojectionFactor {
            p3d: na::Point3::new(
                DualDVec64::from_re(p3d.x as f64),
                DualDVec64::from_re(p3d.y as f64),
                DualDVec64::from_re(p3d.z as f64),
            ),
            p2d: na::Vector2::new(
                DualDVec64::from_re(p2d.x as f64),
                DualDVec64::from_re(p2d.y as f64),
            ),
            aspect_ratio: aspect_ratio.map(DualDVec64::from_re),
        }
    }
}

impl Factor for PlanarReprojectionFactor {
    fn residual_func(
        &self,
        params: &[na::DVector<DualDVec64>],
    ) -> na::DVector<DualDVec64> {
        let cam = &params[0];
        let dist: Vec<DualDVec64> = params[1].iter().cloned().collect();
        let (fx, fy, cx, cy) = match &self.aspect_ratio {
            Some(ratio) => (
                cam[0].clone(),
                cam[0].clone() * ratio.clone(),
                cam[1].clone(),
                cam[2].clone(),
            ),
            None => (
                cam[0].clone(),
                cam[1].clone(),
                cam[2].clone(),
                cam[3].clone(),
            ),
        };
        let rvec = na::Vector3::new(
            params[2][0].clone(),
            params[2][1].clone(),
            params[2][2].clone(),
        );
        let tvec = na::Vector3::new(
            params[3][0].clone(),
            params[3][1].clone(),
            params[3][2].clone(),
        );
        let transform = na::Isometry3::new(tvec, rvec);
        let p3d_t = transform * self.p3d.clone();
        let p3d_t = na::Vector3::new(p3d_t.x.clone(), p3d_t.y.clone(), p3d_t.z.clone());
        let p2d_p = project_point(&fx, &fy, &cx, &cy, &dist, &p3d_t);

        na::dvector![
            p2d_p[0].clone() - self.p2d[0].clone(),
            p2d_p[1].clone() - self.p2d[1].clone()
        ]
    }
}
